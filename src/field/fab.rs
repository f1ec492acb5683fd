use crate::domain::*;
use crate::error::*;
use crate::util::*;

/// Storage for one box: `n_comp` buffers, each covering
/// the valid box grown by the ghost layer.
pub struct Fab<const GRID_DIMENSION: usize> {
    valid: AABB<GRID_DIMENSION>,
    n_ghost: usize,
    comps: Vec<OwnedDomain<GRID_DIMENSION>>,
}

impl<const GRID_DIMENSION: usize> Fab<GRID_DIMENSION> {
    pub fn new(
        valid: AABB<GRID_DIMENSION>,
        n_comp: usize,
        n_ghost: usize,
    ) -> HeatResult<Self> {
        let grown = valid.grow(n_ghost as i32);
        let comps = (0..n_comp)
            .map(|_| OwnedDomain::new(grown))
            .collect::<HeatResult<Vec<_>>>()?;
        Ok(Fab {
            valid,
            n_ghost,
            comps,
        })
    }

    /// Cells this box owns.
    pub fn valid(&self) -> &AABB<GRID_DIMENSION> {
        &self.valid
    }

    /// Valid cells plus the ghost layer.
    pub fn grown(&self) -> AABB<GRID_DIMENSION> {
        self.valid.grow(self.n_ghost as i32)
    }

    pub fn n_comp(&self) -> usize {
        self.comps.len()
    }

    pub fn comp(&self, c: usize) -> &OwnedDomain<GRID_DIMENSION> {
        &self.comps[c]
    }

    pub fn comp_mut(&mut self, c: usize) -> &mut OwnedDomain<GRID_DIMENSION> {
        &mut self.comps[c]
    }

    pub fn comps(&self) -> &[OwnedDomain<GRID_DIMENSION>] {
        &self.comps
    }

    pub fn comps_mut(&mut self) -> &mut [OwnedDomain<GRID_DIMENSION>] {
        &mut self.comps
    }

    /// Valid values of every component, component major, linear order.
    pub fn valid_values(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.n_comp() * self.valid.buffer_size());
        for comp in &self.comps {
            comp.pack_region(&self.valid, &mut out);
        }
        out
    }

    /// Inverse of `valid_values`, `values` must be exactly sized.
    pub fn set_valid_values(&mut self, values: &[f64]) {
        let n = self.valid.buffer_size();
        debug_assert_eq!(values.len(), n * self.n_comp());
        let valid = self.valid;
        for (comp, chunk) in self.comps.iter_mut().zip(values.chunks(n)) {
            comp.unpack_region(&valid, chunk);
        }
    }
}
