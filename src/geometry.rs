//! The problem domain: a cubic index space `[0, n)^d` mapped onto
//! the physical unit box `[0, 1]^d`, periodic on every axis.

use crate::error::*;
use crate::util::*;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Geometry<const GRID_DIMENSION: usize> {
    aabb: AABB<GRID_DIMENSION>,
    prob_lo: RealVec<GRID_DIMENSION>,
    prob_hi: RealVec<GRID_DIMENSION>,
    periodic: [bool; GRID_DIMENSION],
}

impl<const GRID_DIMENSION: usize> Geometry<GRID_DIMENSION> {
    /// `n_cell` cells along each axis over the unit box.
    pub fn new(n_cell: i32) -> HeatResult<Self> {
        if GRID_DIMENSION != 2 && GRID_DIMENSION != 3 {
            return Err(HeatError::InvalidDomain(format!(
                "only 2 or 3 dimensions are supported, got {GRID_DIMENSION}"
            )));
        }
        if n_cell <= 0 {
            return Err(HeatError::InvalidDomain(format!(
                "n_cell must be positive, got {n_cell}"
            )));
        }
        let aabb = AABB::from_mm(Coord::zeros(), Coord::repeat(n_cell - 1));
        Ok(Geometry {
            aabb,
            prob_lo: RealVec::zeros(),
            prob_hi: RealVec::repeat(1.0),
            periodic: [true; GRID_DIMENSION],
        })
    }

    /// Index space covered by the domain.
    pub fn aabb(&self) -> &AABB<GRID_DIMENSION> {
        &self.aabb
    }

    pub fn n_cell(&self) -> Coord<GRID_DIMENSION> {
        self.aabb.exclusive_bounds()
    }

    pub fn prob_lo(&self) -> &RealVec<GRID_DIMENSION> {
        &self.prob_lo
    }

    pub fn prob_hi(&self) -> &RealVec<GRID_DIMENSION> {
        &self.prob_hi
    }

    pub fn is_periodic(&self, axis: usize) -> bool {
        self.periodic[axis]
    }

    /// Cell size along each axis.
    pub fn cell_size(&self) -> RealVec<GRID_DIMENSION> {
        let n = self.n_cell();
        RealVec::from_fn(|d, _| {
            (self.prob_hi[d] - self.prob_lo[d]) / n[d] as f64
        })
    }

    /// Physical position of a cell center.
    pub fn cell_center(
        &self,
        coord: &Coord<GRID_DIMENSION>,
    ) -> RealVec<GRID_DIMENSION> {
        let dx = self.cell_size();
        RealVec::from_fn(|d, _| {
            self.prob_lo[d] + (coord[d] as f64 + 0.5) * dx[d]
        })
    }

    /// Every periodic image offset of the domain,
    /// `{-n, 0, n}` per periodic axis, in a fixed order.
    /// The zero offset is included.
    pub fn periodic_shifts(&self) -> Vec<Coord<GRID_DIMENSION>> {
        let n = self.n_cell();
        let mut shifts = vec![Coord::zeros()];
        for d in 0..GRID_DIMENSION {
            if !self.is_periodic(d) {
                continue;
            }
            let mut next = Vec::with_capacity(shifts.len() * 3);
            for s in &shifts {
                for k in [-1, 0, 1] {
                    let mut shifted = *s;
                    shifted[d] = k * n[d];
                    next.push(shifted);
                }
            }
            shifts = next;
        }
        shifts
    }
}
