use crate::error::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Run parameters, read once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Cells along each side of the square (or cubic) domain.
    pub n_cell: i32,

    /// Boxes are no larger than this along any axis.
    pub max_grid_size: i32,

    /// Last step to run.
    #[serde(default = "default_nsteps")]
    pub nsteps: usize,

    /// Time step. Must satisfy the explicit stability limit,
    /// roughly `dt <= dx^2 / (2 * dim)`, which is not checked.
    pub dt: f64,

    /// Write a plot file every `plot_int` steps, `<= 0` disables.
    #[serde(default = "default_disabled")]
    pub plot_int: i64,

    /// Write a checkpoint every `chk_int` steps, `<= 0` disables.
    #[serde(default = "default_disabled")]
    pub chk_int: i64,

    /// `<= 0` starts fresh, otherwise resume from the checkpoint
    /// written at this step.
    #[serde(default = "default_disabled")]
    pub restart: i64,

    /// Number of parallel workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Grid dimensionality, 2 or 3.
    #[serde(default = "default_dim")]
    pub dim: usize,

    /// Directory holding `chkNNNNN` checkpoint directories.
    #[serde(default = "default_root")]
    pub chk_root: PathBuf,

    /// Directory holding `pltNNNNN` plot directories.
    #[serde(default = "default_root")]
    pub plot_root: PathBuf,
}

fn default_nsteps() -> usize {
    10
}
fn default_disabled() -> i64 {
    -1
}
fn default_workers() -> usize {
    1
}
fn default_dim() -> usize {
    2
}
fn default_root() -> PathBuf {
    PathBuf::from(".")
}

impl Config {
    /// Required values, everything else defaulted.
    pub fn new(n_cell: i32, max_grid_size: i32, dt: f64) -> Self {
        Config {
            n_cell,
            max_grid_size,
            nsteps: default_nsteps(),
            dt,
            plot_int: default_disabled(),
            chk_int: default_disabled(),
            restart: default_disabled(),
            workers: default_workers(),
            dim: default_dim(),
            chk_root: default_root(),
            plot_root: default_root(),
        }
    }

    /// Not validated, callers may still override values.
    pub fn from_json_file(path: &Path) -> HeatResult<Self> {
        let file = std::fs::File::open(path)?;
        let config = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(config)
    }

    pub fn validate(&self) -> HeatResult<()> {
        if self.n_cell <= 0 {
            return Err(HeatError::InvalidConfig(format!(
                "n_cell must be positive, got {}",
                self.n_cell
            )));
        }
        if self.max_grid_size <= 0 {
            return Err(HeatError::InvalidConfig(format!(
                "max_grid_size must be positive, got {}",
                self.max_grid_size
            )));
        }
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(HeatError::InvalidConfig(format!(
                "dt must be positive and finite, got {}",
                self.dt
            )));
        }
        if self.workers == 0 {
            return Err(HeatError::InvalidConfig(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.dim != 2 && self.dim != 3 {
            return Err(HeatError::InvalidConfig(format!(
                "dim must be 2 or 3, got {}",
                self.dim
            )));
        }
        Ok(())
    }

    pub fn is_restart(&self) -> bool {
        self.restart > 0
    }

    pub fn plot_due(&self, step: usize) -> bool {
        self.plot_int > 0 && step as i64 % self.plot_int == 0
    }

    pub fn checkpoint_due(&self, step: usize) -> bool {
        self.chk_int > 0 && step as i64 % self.chk_int == 0
    }
}
