use crate::util::indexing::*;
use crate::util::*;

/// Integer box of cells, inclusive of both corners.
/// Also the index space of any buffer laid out over it.
#[derive(Hash, Debug, Copy, Clone, Eq, PartialEq)]
pub struct AABB<const GRID_DIMENSION: usize> {
    pub bounds: Bounds<GRID_DIMENSION>,
}

impl<const GRID_DIMENSION: usize> std::fmt::Display for AABB<GRID_DIMENSION> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?} .. {:?}]", self.min().as_slice(), self.max().as_slice())
    }
}

impl<const GRID_DIMENSION: usize> AABB<GRID_DIMENSION> {
    #[inline]
    pub fn new(bounds: Bounds<GRID_DIMENSION>) -> Self {
        AABB { bounds }
    }

    pub fn from_mm(min: Coord<GRID_DIMENSION>, max: Coord<GRID_DIMENSION>) -> Self {
        AABB::new(Bounds::from_columns(&[min, max]))
    }

    /// `None` when a slice length differs from the dimension.
    pub fn from_corner_slices(min: &[i32], max: &[i32]) -> Option<Self> {
        (min.len() == GRID_DIMENSION && max.len() == GRID_DIMENSION).then(|| {
            Self::from_mm(Coord::from_column_slice(min), Coord::from_column_slice(max))
        })
    }

    pub fn min(&self) -> Coord<GRID_DIMENSION> {
        self.bounds.column(0).into()
    }

    pub fn max(&self) -> Coord<GRID_DIMENSION> {
        self.bounds.column(1).into()
    }

    /// Cell count along each axis, `[0, 9]` has extent 10.
    pub fn exclusive_bounds(&self) -> Coord<GRID_DIMENSION> {
        (self.max() - self.min()).add_scalar(1)
    }

    #[inline]
    pub fn buffer_size(&self) -> usize {
        real_buffer_size(&self.exclusive_bounds())
    }

    pub fn coord_to_linear(&self, coord: &Coord<GRID_DIMENSION>) -> usize {
        coord_to_linear(&(coord - self.min()), &self.exclusive_bounds())
    }

    pub fn linear_to_coord(&self, index: usize) -> Coord<GRID_DIMENSION> {
        linear_to_coord(index, &self.exclusive_bounds()) + self.min()
    }

    /// No axis has max below min.
    pub fn check_validity(&self) -> bool {
        (0..GRID_DIMENSION).all(|d| self.bounds[(d, 0)] <= self.bounds[(d, 1)])
    }

    pub fn contains(&self, coord: &Coord<GRID_DIMENSION>) -> bool {
        (0..GRID_DIMENSION)
            .all(|d| (self.bounds[(d, 0)]..=self.bounds[(d, 1)]).contains(&coord[d]))
    }

    pub fn contains_aabb(&self, other: &Self) -> bool {
        self.contains(&other.min()) && self.contains(&other.max())
    }

    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let overlap = AABB::from_mm(self.min().sup(&other.min()), self.max().inf(&other.max()));
        overlap.check_validity().then_some(overlap)
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.intersection(other).is_some()
    }

    /// Move every face out by `n` cells, in by `-n`.
    pub fn grow(&self, n: i32) -> Self {
        AABB::from_mm(self.min().add_scalar(-n), self.max().add_scalar(n))
    }

    pub fn shift(&self, offset: &Coord<GRID_DIMENSION>) -> Self {
        AABB::from_mm(self.min() + offset, self.max() + offset)
    }

    /// Cut across `axis`, the first piece keeps `lower_len` cells.
    pub fn split(&self, axis: usize, lower_len: i32) -> (Self, Self) {
        debug_assert!(0 < lower_len && lower_len < self.exclusive_bounds()[axis]);
        let cut = self.bounds[(axis, 0)] + lower_len;
        let mut lower = *self;
        let mut upper = *self;
        lower.bounds[(axis, 1)] = cut - 1;
        upper.bounds[(axis, 0)] = cut;
        (lower, upper)
    }

    /// Coordinates in buffer order.
    pub fn coord_iter(&self) -> impl Iterator<Item = Coord<GRID_DIMENSION>> + '_ {
        (0..self.buffer_size()).map(|i| self.linear_to_coord(i))
    }

    /// Sort key for canonical box order, the min corner, axis 0 first.
    pub fn order_key(&self) -> [i32; GRID_DIMENSION] {
        std::array::from_fn(|d| self.bounds[(d, 0)])
    }
}
