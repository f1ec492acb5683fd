//! Time stepping loop with plot and checkpoint cadence.

use crate::checkpoint::*;
use crate::comm::*;
use crate::config::*;
use crate::error::*;
use crate::field::*;
use crate::geometry::*;
use crate::init::*;
use crate::par_stencil::*;
use crate::partition::*;
use crate::vtk::*;
use std::sync::Arc;

/// Variance of the initial bump.
pub const INITIAL_VARIANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Stepping,
    Done,
}

/// State of a finished run, identical on every worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Last step taken, the restart step if none were.
    pub last_step: usize,
    pub time: f64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

struct Fields<const GRID_DIMENSION: usize> {
    old: Field<GRID_DIMENSION>,
    new: Field<GRID_DIMENSION>,
}

pub struct Simulation<'a, const GRID_DIMENSION: usize, C: Communicator> {
    config: &'a Config,
    comm: &'a C,
    geometry: Geometry<GRID_DIMENSION>,
    plotter: Option<Box<dyn Plotter<GRID_DIMENSION> + 'a>>,
    fields: Option<Fields<GRID_DIMENSION>>,
    phase: Phase,
    time: f64,
    step: usize,
}

impl<'a, const GRID_DIMENSION: usize, C: Communicator> Simulation<'a, GRID_DIMENSION, C> {
    /// Plot files go to a `VtkPlotter` at `plot_root` unless
    /// replaced with `with_plotter`.
    pub fn new(config: &'a Config, comm: &'a C) -> HeatResult<Self> {
        config.validate()?;
        if config.dim != GRID_DIMENSION {
            return Err(HeatError::InvalidConfig(format!(
                "configured for {} dimensions, built for {GRID_DIMENSION}",
                config.dim
            )));
        }
        let geometry = Geometry::new(config.n_cell)?;
        let plotter: Option<Box<dyn Plotter<GRID_DIMENSION> + 'a>> = if config.plot_int > 0 {
            Some(Box::new(VtkPlotter::new(&config.plot_root)))
        } else {
            None
        };
        Ok(Simulation {
            config,
            comm,
            geometry,
            plotter,
            fields: None,
            phase: Phase::Init,
            time: 0.0,
            step: 0,
        })
    }

    pub fn with_plotter(mut self, plotter: Box<dyn Plotter<GRID_DIMENSION> + 'a>) -> Self {
        self.plotter = Some(plotter);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Next step to take.
    pub fn step(&self) -> usize {
        self.step
    }

    pub fn geometry(&self) -> &Geometry<GRID_DIMENSION> {
        &self.geometry
    }

    /// Current solution, `None` before `start`.
    pub fn field(&self) -> Option<&Field<GRID_DIMENSION>> {
        self.fields.as_ref().map(|f| &f.old)
    }

    /// Build the initial state, fresh or from the configured checkpoint.
    pub fn start(&mut self) -> HeatResult<()> {
        profiling::scope!("driver::start");
        assert_eq!(self.phase, Phase::Init, "start called twice");
        let config = self.config;

        let old = if config.is_restart() {
            let restart = config.restart as usize;
            let (time, old, p) =
                read_checkpoint(&config.chk_root, restart, &self.geometry, self.comm)?;
            if self.comm.is_root() {
                log::info!(
                    "Restarting from step {restart}, time {time}, {} boxes over {} workers",
                    p.len(),
                    p.n_workers()
                );
            }
            self.time = time;
            self.step = restart + 1;
            old
        } else {
            let p = Arc::new(partition(
                &self.geometry,
                config.max_grid_size,
                self.comm.size(),
            )?);
            if self.comm.is_root() {
                log::info!(
                    "Fresh start, {} cells in {} boxes over {} workers",
                    p.num_cells(),
                    p.len(),
                    p.n_workers()
                );
            }
            let mut old = Field::define(&self.geometry, p, self.comm.rank(), 1, 1)?;
            gaussian_bump(&mut old, INITIAL_VARIANCE);
            self.time = 0.0;
            self.step = 1;
            if let Some(plotter) = self.plotter.as_mut() {
                plotter.plot(0, 0.0, &old)?;
            }
            old
        };
        let new = old.define_like()?;
        self.fields = Some(Fields { old, new });
        self.phase = if self.step > config.nsteps {
            Phase::Done
        } else {
            Phase::Stepping
        };
        Ok(())
    }

    /// Take one step, then plot and checkpoint if due.
    pub fn advance_step(&mut self) -> HeatResult<()> {
        profiling::scope!("driver::advance_step");
        assert_eq!(self.phase, Phase::Stepping, "not stepping");
        let Some(fields) = self.fields.as_mut() else {
            panic!("stepping without fields");
        };
        let step = self.step;

        fields.old.fill_boundary(self.comm)?;
        advance(
            &fields.old,
            &mut fields.new,
            &self.geometry.cell_size(),
            self.config.dt,
        );
        self.time += self.config.dt;
        let n_comp = fields.old.n_comp();
        fields.old.copy_from(&fields.new, 0, 0, n_comp, 0);

        if self.comm.is_root() {
            log::info!("Advanced step {step}");
        }

        if self.config.plot_due(step) {
            if let Some(plotter) = self.plotter.as_mut() {
                plotter.plot(step, self.time, &fields.old)?;
            }
        }
        if self.config.checkpoint_due(step) {
            write_checkpoint(&self.config.chk_root, step, self.time, &fields.new, self.comm)?;
        }

        self.step += 1;
        if self.step > self.config.nsteps {
            self.phase = Phase::Done;
        }
        Ok(())
    }

    /// Run to `nsteps`, starting first if needed. Collective.
    pub fn run(&mut self) -> HeatResult<RunSummary> {
        if self.phase == Phase::Init {
            self.start()?;
        }
        while self.phase == Phase::Stepping {
            self.advance_step()?;
        }
        self.summary()
    }

    /// Global statistics of the current solution. Collective.
    pub fn summary(&self) -> HeatResult<RunSummary> {
        let Some(fields) = self.fields.as_ref() else {
            return Err(HeatError::InvalidConfig(
                "simulation has not been started".to_string(),
            ));
        };
        let summary = RunSummary {
            last_step: self.step.saturating_sub(1),
            time: self.time,
            sum: fields.old.sum(0, self.comm)?,
            min: fields.old.min(0, self.comm)?,
            max: fields.old.max(0, self.comm)?,
        };
        if self.comm.is_root() {
            log::info!(
                "Finished at step {}, time {}, sum {}",
                summary.last_step,
                summary.time,
                summary.sum
            );
        }
        Ok(summary)
    }
}
