//! Per box storage, addressed by world coordinates.
//! A buffer covers one box of the grid, normally grown by the ghost layer,
//! and a view translates world coordinates into buffer positions.

mod view;

pub use view::*;
