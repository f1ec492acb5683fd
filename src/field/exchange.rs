//! Halo exchange plan.
//!
//! Each ghost cell of a box is the periodic image of exactly one valid
//! cell of some box. A `CopyTag` names one rectangular piece of that
//! relation. Every worker derives the same global tag order, so a sender
//! can pack and a receiver unpack without exchanging any metadata.

use crate::geometry::*;
use crate::partition::*;
use crate::util::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyTag<const GRID_DIMENSION: usize> {
    pub src_box: usize,
    pub dst_box: usize,
    /// Region to fill, in the destination's coordinates.
    pub dst_region: AABB<GRID_DIMENSION>,
    /// Source coordinate is `dst coordinate - shift`.
    pub shift: Coord<GRID_DIMENSION>,
}

impl<const GRID_DIMENSION: usize> CopyTag<GRID_DIMENSION> {
    pub fn src_region(&self) -> AABB<GRID_DIMENSION> {
        self.dst_region.shift(&(-self.shift))
    }
}

/// Tags touching one worker, in global plan order.
#[derive(Debug, Clone)]
pub struct ExchangePlan<const GRID_DIMENSION: usize> {
    rank: usize,
    tags: Vec<CopyTag<GRID_DIMENSION>>,
    owners: Vec<usize>,
}

impl<const GRID_DIMENSION: usize> ExchangePlan<GRID_DIMENSION> {
    pub fn new(
        geometry: &Geometry<GRID_DIMENSION>,
        partition: &Partition<GRID_DIMENSION>,
        n_ghost: usize,
        rank: usize,
    ) -> Self {
        profiling::scope!("exchange_plan");
        let shifts = geometry.periodic_shifts();
        let boxes = partition.boxes();
        let owners: Vec<usize> = (0..boxes.len()).map(|i| partition.owner(i)).collect();
        let mut tags = Vec::new();
        for (dst_box, dst) in boxes.iter().enumerate() {
            let grown = dst.grow(n_ghost as i32);
            for (src_box, src) in boxes.iter().enumerate() {
                if owners[dst_box] != rank && owners[src_box] != rank {
                    continue;
                }
                for shift in &shifts {
                    if src_box == dst_box && shift.iter().all(|s| *s == 0) {
                        continue;
                    }
                    if let Some(dst_region) = grown.intersection(&src.shift(shift)) {
                        tags.push(CopyTag {
                            src_box,
                            dst_box,
                            dst_region,
                            shift: *shift,
                        });
                    }
                }
            }
        }
        ExchangePlan { rank, tags, owners }
    }

    /// Both ends owned here.
    pub fn local_tags(&self) -> impl Iterator<Item = &CopyTag<GRID_DIMENSION>> {
        self.tags.iter().filter(move |t| {
            self.owners[t.src_box] == self.rank && self.owners[t.dst_box] == self.rank
        })
    }

    /// We own the source, `peer` owns the destination.
    pub fn send_tags(
        &self,
        peer: usize,
    ) -> impl Iterator<Item = &CopyTag<GRID_DIMENSION>> {
        self.tags.iter().filter(move |t| {
            self.owners[t.src_box] == self.rank && self.owners[t.dst_box] == peer
        })
    }

    /// `peer` owns the source, we own the destination.
    pub fn recv_tags(
        &self,
        peer: usize,
    ) -> impl Iterator<Item = &CopyTag<GRID_DIMENSION>> {
        self.tags.iter().filter(move |t| {
            self.owners[t.src_box] == peer && self.owners[t.dst_box] == self.rank
        })
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use std::collections::HashMap;

    // Every ghost cell of every box is filled exactly once,
    // from the periodic image of the cell.
    fn check_plan<const GRID_DIMENSION: usize>(n_cell: i32, max: i32) {
        let geom = Geometry::<GRID_DIMENSION>::new(n_cell).unwrap();
        let p = partition(&geom, max, 1).unwrap();
        let plan = ExchangePlan::new(&geom, &p, 1, 0);
        let n = geom.n_cell();

        let mut filled = HashMap::new();
        for t in plan.local_tags() {
            let src = p.boxes()[t.src_box];
            assert!(src.contains_aabb(&t.src_region()));
            for c in t.dst_region.coord_iter() {
                assert!(!p.boxes()[t.dst_box].contains(&c), "{:?} is a valid cell", c);
                let prev = filled.insert((t.dst_box, c), c - t.shift);
                assert!(prev.is_none(), "{:?} filled twice", c);
            }
        }

        for (i, b) in p.boxes().iter().enumerate() {
            for c in b.grow(1).coord_iter() {
                if b.contains(&c) {
                    assert!(!filled.contains_key(&(i, c)));
                    continue;
                }
                let src = filled[&(i, c)];
                for d in 0..GRID_DIMENSION {
                    assert_eq!(src[d], c[d].rem_euclid(n[d]));
                }
            }
        }
    }

    #[test]
    fn plan_2d_test() {
        check_plan::<2>(8, 8);
        check_plan::<2>(8, 3);
        check_plan::<2>(5, 1);
    }

    #[test]
    fn plan_3d_test() {
        check_plan::<3>(4, 4);
        check_plan::<3>(6, 2);
    }

    #[test]
    fn single_box_copies_only_images_test() {
        let geom = Geometry::<2>::new(6).unwrap();
        let p = partition(&geom, 6, 1).unwrap();
        let plan = ExchangePlan::new(&geom, &p, 1, 0);
        assert_eq!(plan.len(), 8);
        assert!(plan.local_tags().all(|t| t.shift != vector![0, 0]));
    }

    #[test]
    fn send_recv_symmetry_test() {
        let geom = Geometry::<2>::new(12).unwrap();
        let p = partition(&geom, 4, 3).unwrap();
        for a in 0..3 {
            for b in 0..3 {
                if a == b {
                    continue;
                }
                let plan_a = ExchangePlan::new(&geom, &p, 1, a);
                let plan_b = ExchangePlan::new(&geom, &p, 1, b);
                let sent: Vec<_> = plan_a.send_tags(b).copied().collect();
                let received: Vec<_> = plan_b.recv_tags(a).copied().collect();
                assert!(!sent.is_empty());
                assert_eq!(sent, received);
            }
        }
    }
}
