use heatchk::cli::*;
use heatchk::comm::*;
use heatchk::config::*;
use heatchk::driver::*;
use heatchk::error::*;

fn main() {
    let args = Args::cli_setup("heat_restart");

    #[cfg(feature = "profile-with-puffin")]
    let _server = match start_puffin_server() {
        Ok(server) => Some(server),
        Err(e) => {
            log::warn!("profiling disabled: {e}");
            None
        }
    };

    if let Err(e) = run(&args) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> HeatResult<()> {
    let config = args.config()?;
    log::info!("{config:?}");
    let summary = match config.dim {
        2 => run_dim::<2>(&config)?,
        3 => run_dim::<3>(&config)?,
        d => {
            return Err(HeatError::InvalidConfig(format!(
                "dim must be 2 or 3, got {d}"
            )))
        }
    };
    println!(
        "step {} time {} sum {} min {} max {}",
        summary.last_step, summary.time, summary.sum, summary.min, summary.max
    );
    Ok(())
}

fn run_dim<const GRID_DIMENSION: usize>(config: &Config) -> HeatResult<RunSummary> {
    if config.workers == 1 {
        let mut sim = Simulation::<GRID_DIMENSION, _>::new(config, &SingleWorker)?;
        return sim.run();
    }

    let results = run_workers(config.workers, |comm| -> HeatResult<RunSummary> {
        let mut sim = Simulation::<GRID_DIMENSION, _>::new(config, &comm)?;
        sim.run()
    });
    // Rank 0's outcome, or the first failure.
    let mut summary = None;
    for result in results {
        let s = result?;
        summary.get_or_insert(s);
    }
    summary.ok_or_else(|| HeatError::Communication("no workers ran".to_string()))
}
