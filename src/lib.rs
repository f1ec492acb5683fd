pub mod build_info;
pub mod checkpoint;
pub mod cli;
pub mod comm;
pub mod config;
pub mod domain;
pub mod driver;
pub mod error;
pub mod field;
pub mod geometry;
pub mod init;
pub mod par_stencil;
pub mod partition;
pub mod util;
pub mod vtk;
