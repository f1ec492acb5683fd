//! Field Initilization
//!
//! Use `DomainView::par_set_region` for custom needs.

use crate::domain::*;
use crate::field::*;

/// Gaussian bump on a unit background centered in the domain,
/// `phi = 1 + exp(-r^2 / variance)` sampled at cell centers.
/// Only valid cells are written.
pub fn gaussian_bump<const GRID_DIMENSION: usize>(
    field: &mut Field<GRID_DIMENSION>,
    variance: f64,
) {
    profiling::scope!("init::gaussian_bump");
    let geometry = *field.geometry();
    for (_, fab) in field.fabs_mut() {
        let valid = *fab.valid();
        for comp in fab.comps_mut() {
            comp.par_set_region(&valid, |coord| {
                let x = geometry.cell_center(&coord);
                let mut r_sq = 0.0;
                for d in 0..GRID_DIMENSION {
                    r_sq += (x[d] - 0.5) * (x[d] - 0.5);
                }
                1.0 + (-r_sq / variance).exp()
            });
        }
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::comm::*;
    use crate::geometry::*;
    use crate::partition::*;
    use float_cmp::assert_approx_eq;
    use nalgebra::vector;
    use std::sync::Arc;

    #[test]
    fn gaussian_bump_test() {
        let geom = Geometry::<2>::new(8).unwrap();
        let p = Arc::new(partition(&geom, 4, 1).unwrap());
        let mut field = Field::define(&geom, p, 0, 1, 1).unwrap();
        gaussian_bump(&mut field, 0.01);

        // Cell (3, 3) has its center at (0.4375, 0.4375).
        let v = field.fab(0).unwrap().comp(0).view(&vector![3, 3]);
        let r_sq = 2.0 * 0.0625 * 0.0625;
        assert_approx_eq!(f64, v, 1.0 + (-r_sq / 0.01f64).exp(), ulps = 2);

        // Symmetric about the center.
        let a = field.fab(0).unwrap().comp(0).view(&vector![0, 0]);
        let b = field.fab(3).unwrap().comp(0).view(&vector![7, 7]);
        assert_eq!(a, b);

        let max = field.max(0, &SingleWorker).unwrap();
        let min = field.min(0, &SingleWorker).unwrap();
        assert!(max < 2.0 && max > 1.4);
        assert!(min >= 1.0 && min < max);
    }
}
