//! Mapping between box-relative coordinates and positions in a flat buffer.
//!
//! Buffers are row major: the last axis is contiguous and axis 0 is the
//! slowest, so a buffer splits into slabs of constant axis 0 index.

use crate::util::*;

/// Cell count of a box with the given extents.
pub fn real_buffer_size<const GRID_DIMENSION: usize>(
    extents: &Coord<GRID_DIMENSION>,
) -> usize {
    extents.iter().map(|e| *e as usize).product()
}

/// Distance in the buffer between neighbors along each axis.
pub fn linear_strides<const GRID_DIMENSION: usize>(
    extents: &Coord<GRID_DIMENSION>,
) -> [usize; GRID_DIMENSION] {
    let mut strides = [1; GRID_DIMENSION];
    for d in (1..GRID_DIMENSION).rev() {
        strides[d - 1] = strides[d] * extents[d] as usize;
    }
    strides
}

/// `coord` is relative to the box min corner.
pub fn coord_to_linear<const GRID_DIMENSION: usize>(
    coord: &Coord<GRID_DIMENSION>,
    extents: &Coord<GRID_DIMENSION>,
) -> usize {
    let strides = linear_strides(extents);
    let mut index = 0;
    for d in 0..GRID_DIMENSION {
        debug_assert!((0..extents[d]).contains(&coord[d]));
        index += strides[d] * coord[d] as usize;
    }
    index
}

pub fn linear_to_coord<const GRID_DIMENSION: usize>(
    index: usize,
    extents: &Coord<GRID_DIMENSION>,
) -> Coord<GRID_DIMENSION> {
    let strides = linear_strides(extents);
    let mut rest = index;
    let mut coord = Coord::zeros();
    for d in 0..GRID_DIMENSION {
        coord[d] = (rest / strides[d]) as i32;
        rest %= strides[d];
    }
    coord
}
