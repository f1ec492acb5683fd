use crate::build_info;
use crate::config::*;
use crate::error::*;
use clap::Parser;
use std::path::PathBuf;

/// Periodic heat equation with checkpoint and restart.
///
/// Values given on the command line override the `--inputs` file.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// JSON inputs file, used as the base configuration.
    #[arg(short, long)]
    pub inputs: Option<PathBuf>,

    /// Cells along each side of the domain.
    #[arg(short, long)]
    pub n_cell: Option<i32>,

    /// Largest box extent along any axis.
    #[arg(short, long)]
    pub max_grid_size: Option<i32>,

    /// Last step to run.
    #[arg(long)]
    pub nsteps: Option<usize>,

    /// Time step, not checked for stability.
    #[arg(long)]
    pub dt: Option<f64>,

    /// Plot every this many steps, <= 0 disables.
    #[arg(long, allow_hyphen_values = true)]
    pub plot_int: Option<i64>,

    /// Checkpoint every this many steps, <= 0 disables.
    #[arg(long, allow_hyphen_values = true)]
    pub chk_int: Option<i64>,

    /// Resume from the checkpoint of this step, <= 0 starts fresh.
    #[arg(long, allow_hyphen_values = true)]
    pub restart: Option<i64>,

    /// Number of workers sharing the boxes.
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Grid dimension, 2 or 3.
    #[arg(short, long)]
    pub dim: Option<usize>,

    /// Directory for checkpoints.
    #[arg(long)]
    pub chk_root: Option<PathBuf>,

    /// Directory for plot files.
    #[arg(long)]
    pub plot_root: Option<PathBuf>,

    /// The number of rayon threads, all cores if not given.
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Print build information and exit.
    #[arg(long)]
    pub build_info: bool,
}

impl Args {
    /// Parse arguments, set up logging and the thread pool.
    pub fn cli_setup(name: &str) -> Self {
        let args = Args::parse();

        if args.build_info {
            build_info::print_report(name);
            std::process::exit(0);
        }

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .init();

        let mut pool = rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("rayon_thread_{}", i));
        if let Some(threads) = args.threads {
            pool = pool.num_threads(threads);
        }
        if let Err(e) = pool.build_global() {
            log::warn!("could not configure the global thread pool: {e}");
        }

        args
    }

    /// Inputs file, if any, with command line overrides applied. Validated.
    pub fn config(&self) -> HeatResult<Config> {
        let mut config = match &self.inputs {
            Some(path) => Config::from_json_file(path)?,
            None => {
                let (Some(n_cell), Some(max_grid_size), Some(dt)) =
                    (self.n_cell, self.max_grid_size, self.dt)
                else {
                    return Err(HeatError::InvalidConfig(
                        "n_cell, max_grid_size and dt are required without --inputs"
                            .to_string(),
                    ));
                };
                Config::new(n_cell, max_grid_size, dt)
            }
        };

        if let Some(v) = self.n_cell {
            config.n_cell = v;
        }
        if let Some(v) = self.max_grid_size {
            config.max_grid_size = v;
        }
        if let Some(v) = self.nsteps {
            config.nsteps = v;
        }
        if let Some(v) = self.dt {
            config.dt = v;
        }
        if let Some(v) = self.plot_int {
            config.plot_int = v;
        }
        if let Some(v) = self.chk_int {
            config.chk_int = v;
        }
        if let Some(v) = self.restart {
            config.restart = v;
        }
        if let Some(v) = self.workers {
            config.workers = v;
        }
        if let Some(v) = self.dim {
            config.dim = v;
        }
        if let Some(v) = &self.chk_root {
            config.chk_root = v.clone();
        }
        if let Some(v) = &self.plot_root {
            config.plot_root = v.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

/// Serve profiling data while the returned server is alive.
#[cfg(feature = "profile-with-puffin")]
pub fn start_puffin_server() -> HeatResult<puffin_http::Server> {
    let server_addr = format!("127.0.0.1:{}", puffin_http::DEFAULT_PORT);
    log::info!("Run this to view profiling data:  puffin_viewer {server_addr}");
    let server = puffin_http::Server::new(&server_addr)
        .map_err(|e| HeatError::Io(std::io::Error::other(e.to_string())))?;
    profiling::puffin::set_scopes_on(true);
    Ok(server)
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn flags_only_test() {
        let args = Args::parse_from([
            "heat_restart",
            "--n-cell",
            "32",
            "--max-grid-size",
            "16",
            "--dt",
            "1e-5",
            "--chk-int",
            "-1",
            "--dim",
            "3",
        ]);
        let config = args.config().unwrap();
        assert_eq!(config.n_cell, 32);
        assert_eq!(config.dim, 3);
        assert_eq!(config.chk_int, -1);
        assert_eq!(config.nsteps, 10);
    }

    #[test]
    fn missing_required_test() {
        let args = Args::parse_from(["heat_restart", "--n-cell", "32"]);
        assert!(matches!(args.config(), Err(HeatError::InvalidConfig(_))));
    }

    #[test]
    fn inputs_override_test() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inputs.json");
        std::fs::write(
            &path,
            r#"{ "n_cell": 64, "max_grid_size": 32, "dt": 1e-5, "nsteps": 100, "chk_int": 10 }"#,
        )
        .unwrap();
        let args = Args::parse_from([
            "heat_restart",
            "--inputs",
            path.to_str().unwrap(),
            "--restart",
            "50",
        ]);
        let config = args.config().unwrap();
        assert_eq!(config.n_cell, 64);
        assert_eq!(config.nsteps, 100);
        assert_eq!(config.chk_int, 10);
        assert_eq!(config.restart, 50);

        let bad = Args::parse_from([
            "heat_restart",
            "--inputs",
            path.to_str().unwrap(),
            "--dt",
            "0",
        ]);
        assert!(bad.config().is_err());
    }
}
