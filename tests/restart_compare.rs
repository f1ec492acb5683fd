use heatchk::checkpoint::*;
use heatchk::comm::*;
use heatchk::config::*;
use heatchk::driver::*;
use heatchk::error::*;
use heatchk::field::*;

use float_cmp::assert_approx_eq;
use std::path::Path;

type Snapshot = Vec<(usize, Vec<f64>)>;

fn snapshot<const GRID_DIMENSION: usize>(field: &Field<GRID_DIMENSION>) -> Snapshot {
    field
        .fabs()
        .map(|(i, fab)| (i, fab.valid_values()))
        .collect()
}

fn bits(snapshot: &Snapshot) -> Vec<(usize, Vec<u64>)> {
    snapshot
        .iter()
        .map(|(i, v)| (*i, v.iter().map(|x| x.to_bits()).collect()))
        .collect()
}

fn run_single<const GRID_DIMENSION: usize>(config: &Config) -> (RunSummary, Snapshot) {
    let mut sim = Simulation::<GRID_DIMENSION, _>::new(config, &SingleWorker).unwrap();
    let summary = sim.run().unwrap();
    (summary, snapshot(sim.field().unwrap()))
}

/// Per worker results merged back into box order.
fn run_threaded<const GRID_DIMENSION: usize>(
    config: &Config,
    n_workers: usize,
) -> (RunSummary, Snapshot) {
    let results = run_workers(n_workers, |comm| {
        let mut sim = Simulation::<GRID_DIMENSION, _>::new(config, &comm).unwrap();
        let summary = sim.run().unwrap();
        (summary, snapshot(sim.field().unwrap()))
    });
    let summary = results[0].0;
    let mut merged: Snapshot = Vec::new();
    for (s, boxes) in results {
        assert_eq!(s.sum.to_bits(), summary.sum.to_bits());
        merged.extend(boxes);
    }
    merged.sort_by_key(|(i, _)| *i);
    (summary, merged)
}

fn config_2d(root: &Path) -> Config {
    let mut config = Config::new(8, 8, 0.001);
    config.nsteps = 2;
    config.chk_int = 1;
    config.chk_root = root.to_path_buf();
    config
}

#[test]
fn smoothing_and_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_2d(dir.path());

    let initial = run_single::<2>(&Config {
        nsteps: 0,
        chk_int: -1,
        ..config.clone()
    })
    .0;
    let (summary, uninterrupted) = run_single::<2>(&config);
    assert_eq!(summary.last_step, 2);
    assert_eq!(summary.time, 0.001 + 0.001);

    // Diffusion flattens the bump and conserves the total.
    assert!(summary.max < initial.max);
    assert!(summary.min > initial.min);
    assert_approx_eq!(f64, summary.sum, initial.sum, epsilon = 1e-10);

    assert!(checkpoint_dir(dir.path(), 1).join("Header").is_file());
    assert!(checkpoint_dir(dir.path(), 2).join("Header").is_file());

    let restarted_config = Config {
        restart: 1,
        ..config.clone()
    };
    let mut sim = Simulation::<2, _>::new(&restarted_config, &SingleWorker).unwrap();
    sim.start().unwrap();
    assert_eq!(sim.step(), 2);
    assert_eq!(sim.time(), 0.001);
    let restarted = sim.run().unwrap();
    assert_eq!(restarted.time.to_bits(), summary.time.to_bits());
    assert_eq!(restarted.sum.to_bits(), summary.sum.to_bits());
    assert_eq!(
        bits(&snapshot(sim.field().unwrap())),
        bits(&uninterrupted)
    );
}

#[test]
fn threaded_matches_single_2d() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::new(12, 4, 0.0005);
    config.nsteps = 5;
    config.chk_root = dir.path().to_path_buf();

    let (single_summary, single) = run_single::<2>(&config);
    let (threaded_summary, threaded) = run_threaded::<2>(&config, 3);
    assert_eq!(single.len(), 16);
    assert_eq!(bits(&single), bits(&threaded));
    assert_eq!(single_summary.sum.to_bits(), threaded_summary.sum.to_bits());
    assert_eq!(single_summary.max.to_bits(), threaded_summary.max.to_bits());
}

#[test]
fn threaded_matches_single_3d() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::new(8, 4, 0.0005);
    config.dim = 3;
    config.nsteps = 3;
    config.chk_root = dir.path().to_path_buf();

    let (_, single) = run_single::<3>(&config);
    let (_, threaded) = run_threaded::<3>(&config, 2);
    assert_eq!(single.len(), 8);
    assert_eq!(bits(&single), bits(&threaded));
}

#[test]
fn restart_with_more_workers() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::new(12, 6, 0.0005);
    config.nsteps = 6;
    config.chk_int = 3;
    config.chk_root = dir.path().to_path_buf();

    let (summary, uninterrupted) = run_single::<2>(&config);

    config.restart = 3;
    let (restarted_summary, restarted) = run_threaded::<2>(&config, 3);
    assert_eq!(restarted_summary.last_step, 6);
    assert_eq!(restarted_summary.time.to_bits(), summary.time.to_bits());
    assert_eq!(bits(&restarted), bits(&uninterrupted));
}

#[test]
fn corrupt_checkpoint_stops_every_worker() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::new(8, 4, 0.001);
    config.nsteps = 1;
    config.chk_int = 1;
    config.chk_root = dir.path().to_path_buf();
    run_single::<2>(&config);

    let blob = checkpoint_dir(dir.path(), 1)
        .join("Level_0")
        .join("Cell_D_00003");
    std::fs::write(&blob, [0u8; 12]).unwrap();

    config.restart = 1;
    config.nsteps = 2;
    let errors = run_workers(2, |comm| {
        let mut sim = Simulation::<2, _>::new(&config, &comm).unwrap();
        sim.start().err()
    });
    // Box 3 belongs to rank 1, rank 0 learns of it through the collective.
    assert!(matches!(errors[1], Some(HeatError::CheckpointCorrupt { .. })));
    assert!(errors[0].is_some());
}

#[test]
fn failed_checkpoint_leaves_no_record() {
    let dir = tempfile::tempdir().unwrap();
    let not_a_dir = dir.path().join("chk_root");
    std::fs::write(&not_a_dir, "in the way").unwrap();

    let mut config = Config::new(8, 4, 0.001);
    config.nsteps = 2;
    config.chk_int = 1;
    config.chk_root = not_a_dir.clone();

    let outcomes = run_workers(2, |comm| {
        let mut sim = Simulation::<2, _>::new(&config, &comm).unwrap();
        let result = sim.run();
        (result.is_err(), sim.step())
    });
    for (failed, step) in outcomes {
        assert!(failed);
        // Failed while checkpointing step 1.
        assert_eq!(step, 1);
    }
    assert!(!checkpoint_dir(&not_a_dir, 1).exists());
    assert!(read_header(dir.path(), 1).is_err());
}
