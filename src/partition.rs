//! Domain decomposition into boxes and their assignment to workers.
//!
//! Every worker builds the same `Partition` from the same inputs,
//! so no coordination is needed to agree on ownership.
//! The box order is canonical and is the order checkpoints use.

use crate::error::*;
use crate::geometry::*;
use crate::util::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition<const GRID_DIMENSION: usize> {
    boxes: Vec<AABB<GRID_DIMENSION>>,
    owners: Vec<usize>,
    n_workers: usize,
}

/// Split `geometry` into boxes no larger than `max_box_size` along any axis,
/// owned round robin by `n_workers` workers.
pub fn partition<const GRID_DIMENSION: usize>(
    geometry: &Geometry<GRID_DIMENSION>,
    max_box_size: i32,
    n_workers: usize,
) -> HeatResult<Partition<GRID_DIMENSION>> {
    profiling::scope!("partition");
    if max_box_size <= 0 {
        return Err(HeatError::InvalidDomain(format!(
            "max_box_size must be positive, got {max_box_size}"
        )));
    }
    let domain = *geometry.aabb();
    if !domain.check_validity() || domain.buffer_size() == 0 {
        return Err(HeatError::InvalidDomain(format!(
            "domain {domain} is empty"
        )));
    }

    let mut boxes = Vec::new();
    bisect(domain, max_box_size, &mut boxes);
    boxes.sort_by_key(|b| b.order_key());
    Partition::with_owners(boxes, n_workers)
}

/// Recursive bisection, lower half first.
fn bisect<const GRID_DIMENSION: usize>(
    aabb: AABB<GRID_DIMENSION>,
    max_box_size: i32,
    result: &mut Vec<AABB<GRID_DIMENSION>>,
) {
    let extents = aabb.exclusive_bounds();
    let mut split_axis = None;
    for d in 0..GRID_DIMENSION {
        if extents[d] > max_box_size
            && split_axis.map_or(true, |a: usize| extents[d] > extents[a])
        {
            split_axis = Some(d);
        }
    }

    match split_axis {
        None => result.push(aabb),
        Some(axis) => {
            let (lower, upper) = aabb.split(axis, extents[axis] / 2);
            bisect(lower, max_box_size, result);
            bisect(upper, max_box_size, result);
        }
    }
}

impl<const GRID_DIMENSION: usize> Partition<GRID_DIMENSION> {
    /// Rebuild a partition from a recorded box list, keeping its order.
    /// The boxes must exactly tile the domain.
    pub fn from_boxes(
        geometry: &Geometry<GRID_DIMENSION>,
        boxes: Vec<AABB<GRID_DIMENSION>>,
        n_workers: usize,
    ) -> HeatResult<Self> {
        check_tiling(geometry.aabb(), &boxes)?;
        Self::with_owners(boxes, n_workers)
    }

    fn with_owners(
        boxes: Vec<AABB<GRID_DIMENSION>>,
        n_workers: usize,
    ) -> HeatResult<Self> {
        if n_workers == 0 {
            return Err(HeatError::InvalidDomain(
                "at least one worker is required".to_string(),
            ));
        }
        let owners = (0..boxes.len()).map(|i| i % n_workers).collect();
        Ok(Partition {
            boxes,
            owners,
            n_workers,
        })
    }

    pub fn boxes(&self) -> &[AABB<GRID_DIMENSION>] {
        &self.boxes
    }

    pub fn owner(&self, box_index: usize) -> usize {
        self.owners[box_index]
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn n_workers(&self) -> usize {
        self.n_workers
    }

    /// Indices of the boxes owned by `rank`, in canonical order.
    pub fn local_indices(
        &self,
        rank: usize,
    ) -> impl Iterator<Item = usize> + '_ {
        self.owners
            .iter()
            .enumerate()
            .filter(move |(_, o)| **o == rank)
            .map(|(i, _)| i)
    }

    pub fn num_cells(&self) -> usize {
        self.boxes.iter().map(|b| b.buffer_size()).sum()
    }

    /// Same boxes in the same order, ownership may differ.
    pub fn same_layout(&self, other: &Self) -> bool {
        self.boxes == other.boxes
    }
}

fn check_tiling<const GRID_DIMENSION: usize>(
    domain: &AABB<GRID_DIMENSION>,
    boxes: &[AABB<GRID_DIMENSION>],
) -> HeatResult<()> {
    let mut covered = 0;
    for (i, b) in boxes.iter().enumerate() {
        if !b.check_validity() || !domain.contains_aabb(b) {
            return Err(HeatError::InvalidDomain(format!(
                "box {i} {b} is not inside domain {domain}"
            )));
        }
        for (j, other) in boxes.iter().enumerate().take(i) {
            if b.intersects(other) {
                return Err(HeatError::InvalidDomain(format!(
                    "box {i} {b} overlaps box {j} {other}"
                )));
            }
        }
        covered += b.buffer_size();
    }
    // Disjoint and inside, so equal counts means exact cover.
    if covered != domain.buffer_size() {
        return Err(HeatError::InvalidDomain(format!(
            "boxes cover {covered} of {} cells",
            domain.buffer_size()
        )));
    }
    Ok(())
}
