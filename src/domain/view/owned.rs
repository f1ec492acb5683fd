use super::*;
use crate::error::*;
use crate::util::*;

/// Single component buffer covering `aabb`, zero initialized.
pub struct OwnedDomain<const GRID_DIMENSION: usize> {
    aabb: AABB<GRID_DIMENSION>,
    buffer: Vec<f64>,
}

impl<const GRID_DIMENSION: usize> OwnedDomain<GRID_DIMENSION> {
    /// Fails with `OutOfMemory` instead of aborting when the
    /// allocation can't be satisfied.
    pub fn new(aabb: AABB<GRID_DIMENSION>) -> HeatResult<Self> {
        let n = aabb.buffer_size();
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(n).map_err(|_| HeatError::OutOfMemory {
            bytes: n.saturating_mul(std::mem::size_of::<f64>()),
        })?;
        buffer.resize(n, 0.0);
        Ok(OwnedDomain { aabb, buffer })
    }

    #[track_caller]
    fn index_of(&self, world_coord: &Coord<GRID_DIMENSION>) -> usize {
        debug_assert!(
            self.aabb.contains(world_coord),
            "{world_coord:?} is outside {}",
            self.aabb
        );
        self.aabb.coord_to_linear(world_coord)
    }
}

impl<const GRID_DIMENSION: usize> DomainView<GRID_DIMENSION>
    for OwnedDomain<GRID_DIMENSION>
{
    fn aabb(&self) -> &AABB<GRID_DIMENSION> {
        &self.aabb
    }

    fn buffer(&self) -> &[f64] {
        &self.buffer
    }

    fn aabb_buffer_mut(&mut self) -> (&AABB<GRID_DIMENSION>, &mut [f64]) {
        (&self.aabb, &mut self.buffer)
    }

    #[track_caller]
    fn view(&self, world_coord: &Coord<GRID_DIMENSION>) -> f64 {
        self.buffer[self.index_of(world_coord)]
    }

    #[track_caller]
    fn set_coord(&mut self, world_coord: &Coord<GRID_DIMENSION>, value: f64) {
        let index = self.index_of(world_coord);
        self.buffer[index] = value;
    }
}
