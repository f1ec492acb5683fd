pub use nalgebra::{matrix, vector};

mod aabb;
pub mod indexing;
pub use aabb::*;

pub type Coord<const GRID_DIMENSION: usize> =
    nalgebra::SVector<i32, { GRID_DIMENSION }>;

/// Column 0 holds the inclusive min corner, column 1 the inclusive max.
pub type Bounds<const GRID_DIMENSION: usize> =
    nalgebra::SMatrix<i32, { GRID_DIMENSION }, 2>;

/// Physical (real valued) vector, e.g. cell sizes.
pub type RealVec<const GRID_DIMENSION: usize> =
    nalgebra::SVector<f64, { GRID_DIMENSION }>;
