//! Explicit (forward Euler) heat update.
//!
//! Only stable for `dt` small compared to `dx^2`; this is not checked,
//! a too large step just blows up.

use crate::domain::*;
use crate::field::*;
use crate::util::*;

/// `output = input + dt * laplacian(input)` on every valid cell of every
/// owned box. Reads `input` including its ghost layer, which must have
/// been filled, and writes only the valid cells of `output`.
pub fn advance<const GRID_DIMENSION: usize>(
    input: &Field<GRID_DIMENSION>,
    output: &mut Field<GRID_DIMENSION>,
    dx: &RealVec<GRID_DIMENSION>,
    dt: f64,
) {
    profiling::scope!("par_stencil::advance");
    assert!(input.is_compatible(output));
    assert!(input.n_ghost() >= 1);

    for ((_, input_fab), (_, output_fab)) in input.fabs().zip(output.fabs_mut()) {
        let valid = *input_fab.valid();
        for c in 0..input_fab.n_comp() {
            let input_domain = input_fab.comp(c);
            output_fab.comp_mut(c).par_set_region(&valid, |world_coord| {
                heat_update(input_domain, &world_coord, dx, dt)
            });
        }
    }
}

/// Update for a single cell, axis terms summed in axis order.
pub fn heat_update<const GRID_DIMENSION: usize, DomainType>(
    input: &DomainType,
    world_coord: &Coord<GRID_DIMENSION>,
    dx: &RealVec<GRID_DIMENSION>,
    dt: f64,
) -> f64
where
    DomainType: DomainView<GRID_DIMENSION>,
{
    let middle = input.view(world_coord);
    let mut laplacian = 0.0;
    for d in 0..GRID_DIMENSION {
        let mut left = *world_coord;
        left[d] -= 1;
        let mut right = *world_coord;
        right[d] += 1;
        laplacian += (input.view(&right) - 2.0 * middle + input.view(&left))
            / (dx[d] * dx[d]);
    }
    middle + dt * laplacian
}

#[cfg(test)]
mod unit_test {
    use super::*;
    use crate::comm::*;
    use crate::geometry::*;
    use crate::partition::*;
    use float_cmp::assert_approx_eq;
    use std::sync::Arc;

    fn fields<const GRID_DIMENSION: usize>(
        n_cell: i32,
        max: i32,
    ) -> (Geometry<GRID_DIMENSION>, Field<GRID_DIMENSION>, Field<GRID_DIMENSION>) {
        let geom = Geometry::<GRID_DIMENSION>::new(n_cell).unwrap();
        let p = Arc::new(partition(&geom, max, 1).unwrap());
        let input = Field::define(&geom, p, 0, 1, 1).unwrap();
        let output = input.define_like().unwrap();
        (geom, input, output)
    }

    #[test]
    fn constant_field_test() {
        let (geom, mut input, mut output) = fields::<2>(16, 5);
        input.set_val(2.75);
        output.set_val(-1.0);
        advance(&input, &mut output, &geom.cell_size(), 0.0001);
        for (_, fab) in output.fabs() {
            for c in fab.grown().coord_iter() {
                let expected = if fab.valid().contains(&c) { 2.75 } else { -1.0 };
                assert_eq!(fab.comp(0).view(&c), expected);
            }
        }

        let (geom, mut input, mut output) = fields::<3>(6, 4);
        input.set_val(1.0 / 3.0);
        advance(&input, &mut output, &geom.cell_size(), 0.001);
        for (_, fab) in output.fabs() {
            for c in fab.valid().coord_iter() {
                assert_eq!(fab.comp(0).view(&c), 1.0 / 3.0);
            }
        }
    }

    #[test]
    fn conservation_test() {
        let (geom, mut input, mut output) = fields::<2>(12, 5);
        for (_, fab) in input.fabs_mut() {
            let valid = *fab.valid();
            fab.comp_mut(0).par_set_region(&valid, |c| {
                ((c[0] * 7 + c[1] * 3) % 11) as f64 * 0.1
            });
        }
        input.fill_boundary(&SingleWorker).unwrap();
        advance(&input, &mut output, &geom.cell_size(), 0.0005);
        let before = input.sum(0, &SingleWorker).unwrap();
        let after = output.sum(0, &SingleWorker).unwrap();
        assert_approx_eq!(f64, before, after, epsilon = 1e-10);
    }

    #[test]
    fn single_spike_test() {
        let (geom, mut input, mut output) = fields::<2>(4, 4);
        input.fab_mut(0).unwrap().comp_mut(0).set_coord(&vector![0, 0], 1.0);
        input.fill_boundary(&SingleWorker).unwrap();
        let dx = geom.cell_size();
        let dt = 0.001;
        advance(&input, &mut output, &dx, dt);

        let r = dt / (dx[0] * dx[0]);
        let out = output.fab(0).unwrap().comp(0);
        assert_approx_eq!(f64, out.view(&vector![0, 0]), 1.0 - 4.0 * r, ulps = 2);
        // Neighbors across the periodic wrap see the spike too.
        assert_approx_eq!(f64, out.view(&vector![3, 0]), r, ulps = 2);
        assert_approx_eq!(f64, out.view(&vector![0, 3]), r, ulps = 2);
        assert_approx_eq!(f64, out.view(&vector![1, 0]), r, ulps = 2);
        assert_eq!(out.view(&vector![2, 2]), 0.0);
    }
}
