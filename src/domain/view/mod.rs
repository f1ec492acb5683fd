mod owned;

pub use owned::*;

use crate::util::indexing::*;
use crate::util::*;
use rayon::prelude::*;

/// Values over a box, addressed by world coordinates.
pub trait DomainView<const GRID_DIMENSION: usize>: Sync {
    fn aabb(&self) -> &AABB<GRID_DIMENSION>;

    fn buffer(&self) -> &[f64];

    fn aabb_buffer_mut(&mut self) -> (&AABB<GRID_DIMENSION>, &mut [f64]);

    fn view(&self, world_coord: &Coord<GRID_DIMENSION>) -> f64;

    fn set_coord(&mut self, world_coord: &Coord<GRID_DIMENSION>, value: f64);

    /// Set every value, ghost cells included.
    fn par_set_values<F: Fn(Coord<GRID_DIMENSION>) -> f64 + Send + Sync>(&mut self, f: F) {
        let aabb = *self.aabb();
        self.par_set_region(&aabb, f);
    }

    /// Set every value inside `region` and nothing outside of it.
    /// Work is split into slabs along the outermost axis,
    /// `f` must be safe to call for distinct coords concurrently.
    fn par_set_region<F: Fn(Coord<GRID_DIMENSION>) -> f64 + Send + Sync>(
        &mut self,
        region: &AABB<GRID_DIMENSION>,
        f: F,
    ) {
        let (aabb, buffer) = self.aabb_buffer_mut();
        par_set_region_impl(buffer, aabb, region, f)
    }

    /// Append the values of `region` in linear order.
    fn pack_region(&self, region: &AABB<GRID_DIMENSION>, out: &mut Vec<f64>) {
        debug_assert!(self.aabb().contains_aabb(region));
        out.extend(region.coord_iter().map(|c| self.view(&c)));
    }

    /// Inverse of `pack_region`, returns the number of values consumed.
    fn unpack_region(
        &mut self,
        region: &AABB<GRID_DIMENSION>,
        values: &[f64],
    ) -> usize {
        debug_assert!(self.aabb().contains_aabb(region));
        let n = region.buffer_size();
        for (world_coord, value) in region.coord_iter().zip(&values[0..n]) {
            self.set_coord(&world_coord, *value);
        }
        n
    }

    /// Sum over `region` in linear order, so the result is reproducible.
    fn region_sum(&self, region: &AABB<GRID_DIMENSION>) -> f64 {
        region.coord_iter().map(|c| self.view(&c)).sum()
    }
}

fn par_set_region_impl<F, const GRID_DIMENSION: usize>(
    buffer: &mut [f64],
    aabb: &AABB<GRID_DIMENSION>,
    region: &AABB<GRID_DIMENSION>,
    f: F,
) where
    F: Fn(Coord<GRID_DIMENSION>) -> f64 + Send + Sync,
{
    debug_assert!(aabb.contains_aabb(region));
    let slab_size = linear_strides(&aabb.exclusive_bounds())[0];
    let first = (region.bounds[(0, 0)] - aabb.bounds[(0, 0)]) as usize;
    let count = region.exclusive_bounds()[0] as usize;
    buffer[0..aabb.buffer_size()]
        .par_chunks_mut(slab_size)
        .enumerate()
        .skip(first)
        .take(count)
        .for_each(|(i, slab): (usize, &mut [f64])| {
            let slab_offset = i * slab_size;
            let mut slab_region = *region;
            let x0 = aabb.bounds[(0, 0)] + i as i32;
            slab_region.bounds[(0, 0)] = x0;
            slab_region.bounds[(0, 1)] = x0;
            for world_coord in slab_region.coord_iter() {
                let linear_index = aabb.coord_to_linear(&world_coord);
                slab[linear_index - slab_offset] = f(world_coord);
            }
        });
}
