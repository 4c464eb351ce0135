use std::{io::Write, path::PathBuf};

use bytemuck::bytes_of;
use faer::Col;
use thiserror::Error;

use crate::{
    assembly::{assemble, reserve_estimate, update_pressure},
    faer_add::{min_max, save_vector, write_col_bytes, VectorIoError},
    local::LocalCoefficients,
    mesh::RectangularMesh,
    problem::Problem,
    sim::Simulation,
    sparse::{SparseError, SparseMatrix},
    Float,
};

#[derive(Error, Debug)]
pub enum SimError {
    #[error("output error")]
    Io(#[from] std::io::Error),
    #[error("failed to write a snapshot")]
    Output(#[from] VectorIoError),
    #[error("failed to set up the trace system")]
    Sparse(#[from] SparseError),
    #[error("linear solve failed at step {step} (t = {time:e})")]
    Solve {
        step: usize,
        time: Float,
        #[source]
        source: SparseError,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// The evolving unknowns of a run.
#[derive(Debug, Clone)]
pub struct State {
    /// Cell pressures.
    pub pressure: Col<Float>,
    /// Edge trace pressures.
    pub trace: Col<Float>,
    pub time: Float,
    /// Number of completed time steps.
    pub step: usize,
    /// Index of the last snapshot taken, `0` being the initial condition.
    pub snapshot: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initialized,
    Stepping,
    Completed,
    Failed,
}

#[derive(Clone, Copy)]
pub struct ObsCtx<'pb, 'ctx> {
    sim: &'ctx Simulation<'pb>,
    state: &'ctx State,
    time_step: Float,
    nnz: usize,
}

impl<'pb, 'ctx> ObsCtx<'pb, 'ctx> {
    fn new(sim: &'ctx Simulation<'pb>, state: &'ctx State, time_step: Float, nnz: usize) -> Self {
        Self {
            sim,
            state,
            time_step,
            nnz,
        }
    }

    pub fn simulation(&self) -> &Simulation<'pb> {
        self.sim
    }

    pub fn problem(&self) -> &Problem<'pb> {
        self.sim.problem()
    }

    pub fn mesh(&self) -> &RectangularMesh {
        self.sim.problem().mesh()
    }

    pub fn state(&self) -> &State {
        self.state
    }

    pub fn step(&self) -> usize {
        self.state.step
    }

    pub fn time(&self) -> Float {
        self.state.time
    }

    pub fn snapshot(&self) -> usize {
        self.state.snapshot
    }

    pub fn pressure(&self) -> &Col<Float> {
        &self.state.pressure
    }

    pub fn trace(&self) -> &Col<Float> {
        &self.state.trace
    }

    /// Length of the last step taken, or the nominal step before the first.
    pub fn time_step(&self) -> Float {
        self.time_step
    }

    /// Stored entries of the last assembled matrix.
    pub fn nnz(&self) -> usize {
        self.nnz
    }
}

#[allow(unused_variables)]
pub trait Observer {
    fn at_startup(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        Ok(())
    }

    fn at_each_iteration(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        Ok(())
    }

    /// Called for the initial condition and then every time the simulated
    /// time reaches a snapshot boundary or the final time.
    fn at_snapshot(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        Ok(())
    }

    fn at_cleanup(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        Ok(())
    }
}

pub struct Driver<'pb, 'd> {
    pub(crate) sim: Simulation<'pb>,
    pub(crate) observers: Vec<Box<dyn Observer + 'd>>,
    state: State,
    phase: Phase,
}

impl<'pb, 'd> Driver<'pb, 'd> {
    pub fn new(sim: Simulation<'pb>) -> Self {
        let (pressure, trace) = sim.problem().initial_state();
        Self {
            sim,
            observers: Vec::new(),
            state: State {
                pressure,
                trace,
                time: 0.0,
                step: 0,
                snapshot: 0,
            },
            phase: Phase::Initialized,
        }
    }

    pub fn with_observer(mut self, observer: impl Observer + 'd) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn into_state(self) -> State {
        self.state
    }

    /// Runs the time loop up to the final time. A driver runs once; on error
    /// it is left in [`Phase::Failed`] with the state of the last completed
    /// step.
    pub fn run(&mut self) -> Result<(), SimError> {
        if self.phase != Phase::Initialized {
            return Err(SimError::Config(format!(
                "driver already ran (phase {:?})",
                self.phase
            )));
        }
        self.sim.validate().map_err(SimError::Config)?;

        let result = self.step_until_final_time();
        self.phase = if result.is_ok() {
            Phase::Completed
        } else {
            Phase::Failed
        };
        result
    }

    fn step_until_final_time(&mut self) -> Result<(), SimError> {
        let Self {
            sim,
            observers,
            state,
            phase,
        } = self;
        let sim: &Simulation = sim;

        let mesh = sim.problem().mesh();
        let physics = sim.problem().physics();
        let data = sim.problem().sample();
        let tau = sim.effective_time_step();
        let interval = sim.snapshot_interval();
        let final_time = sim.time_settings().final_time;
        let mobility = sim.time_settings().mobility;
        let eps = 1e-12 * final_time.max(interval);

        let edges = mesh.num_edges();
        let mut local = LocalCoefficients::new(mesh);
        let mut matrix = SparseMatrix::square(edges);
        let mut rhs = Col::<Float>::zeros(edges);

        for o in observers.iter_mut() {
            o.at_startup(ObsCtx::new(sim, state, tau, 0))?;
        }
        for o in observers.iter_mut() {
            o.at_snapshot(ObsCtx::new(sim, state, tau, 0))?;
        }

        *phase = Phase::Stepping;
        let mut next_snapshot = interval.min(final_time);

        while final_time - state.time > eps {
            let tau_n = tau
                .min(next_snapshot - state.time)
                .min(final_time - state.time);

            local.update_gravity(mesh, physics, &state.pressure);
            if state.step == 0 || sim.refreshes_mobility() {
                local.update_mobility(mesh, physics, mobility, &state.pressure, &state.trace);
            }
            local.update_accumulation(mesh, physics, &data.porosity, tau_n);

            matrix.set_size(edges, edges);
            matrix.reserve(reserve_estimate(mesh))?;
            assemble(mesh, &local, &data, &state.pressure, &mut matrix, &mut rhs)?;

            if let Err(source) = matrix.linear_solve(&mut state.trace, &rhs) {
                tracing::error!(
                    step = state.step + 1,
                    time = state.time,
                    "trace system could not be solved: {source}"
                );
                return Err(SimError::Solve {
                    step: state.step + 1,
                    time: state.time,
                    source,
                });
            }
            update_pressure(mesh, &local, &data, &state.trace, &mut state.pressure);

            state.time += tau_n;
            state.step += 1;
            for o in observers.iter_mut() {
                o.at_each_iteration(ObsCtx::new(sim, state, tau_n, matrix.nnz()))?;
            }

            if next_snapshot - state.time <= eps {
                state.time = next_snapshot;
                state.snapshot += 1;
                for o in observers.iter_mut() {
                    o.at_snapshot(ObsCtx::new(sim, state, tau_n, matrix.nnz()))?;
                }
                next_snapshot = ((state.snapshot + 1) as Float * interval).min(final_time);
            }
        }

        for o in observers.iter_mut() {
            o.at_cleanup(ObsCtx::new(sim, state, tau, matrix.nnz()))?;
        }
        Ok(())
    }
}

pub struct Logger;

impl Observer for Logger {
    fn at_startup(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        let mesh = ctx.mesh();
        tracing::event!(
            tracing::Level::INFO,
            "start of simulation of problem `{}` ({}x{} cells, hx={:e}, hy={:e}, τ={:e}, final time {:e})",
            ctx.problem().name(),
            mesh.rows(),
            mesh.cols(),
            mesh.dx(),
            mesh.dy(),
            ctx.time_step(),
            ctx.simulation().time_settings().final_time,
        );
        Ok(())
    }

    fn at_each_iteration(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        tracing::event!(
            tracing::Level::TRACE,
            "problem `{}`: step {}, t={:e}, τ={:e}, nnz={}",
            ctx.problem().name(),
            ctx.step(),
            ctx.time(),
            ctx.time_step(),
            ctx.nnz(),
        );
        Ok(())
    }

    fn at_snapshot(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        let (lo, hi) = min_max(ctx.pressure());
        tracing::event!(
            tracing::Level::DEBUG,
            "problem `{}`: snapshot {} at t={:e}, pressure in [{:e}, {:e}]",
            ctx.problem().name(),
            ctx.snapshot(),
            ctx.time(),
            lo,
            hi,
        );
        Ok(())
    }

    fn at_cleanup(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        tracing::event!(
            tracing::Level::INFO,
            "finished simulation of problem `{}` after {} steps",
            ctx.problem().name(),
            ctx.step(),
        );
        Ok(())
    }
}

/// Writes the cell pressures of every snapshot to `<prefix><index>.dat`, the
/// index zero-padded to five digits.
pub struct SnapshotWriter {
    prefix: String,
}

impl SnapshotWriter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn path(&self, index: usize) -> PathBuf {
        PathBuf::from(format!("{}{:05}.dat", self.prefix, index))
    }
}

impl Observer for SnapshotWriter {
    fn at_snapshot(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        save_vector(ctx.pressure(), self.path(ctx.snapshot()))?;
        Ok(())
    }
}

const RAW_HEADER: &[u8] = b"GASF1";
const RAW_MARKER: &[u8] = &[0xFF, 0xFF, 0xFF, 0xFF];

/// All snapshots in a single binary stream: a header describing the mesh,
/// then for each snapshot its time followed by the cell pressures, in native
/// byte order.
pub struct RawWriter<W> {
    output: W,
}

impl<W: Write> RawWriter<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }
}

fn header_u32(what: &str, value: usize) -> Result<u32, SimError> {
    u32::try_from(value)
        .map_err(|_| SimError::Config(format!("{what} {value} does not fit the raw stream header")))
}

impl<W: Write> Observer for RawWriter<W> {
    fn at_startup(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        let output = &mut self.output;
        let mesh = ctx.mesh();
        output.write_all(RAW_HEADER)?;
        output.write_all(bytes_of(&(std::mem::size_of::<Float>() as u8)))?;
        output.write_all(bytes_of(&header_u32("rows", mesh.rows())?))?;
        output.write_all(bytes_of(&header_u32("cols", mesh.cols())?))?;
        output.write_all(bytes_of(&mesh.width()))?;
        output.write_all(bytes_of(&mesh.height()))?;
        output.write_all(bytes_of(&ctx.time_step()))?;
        output.write_all(bytes_of(&ctx.simulation().time_settings().final_time))?;
        let name = ctx.problem().name().as_bytes();
        output.write_all(bytes_of(&header_u32("name length", name.len())?))?;
        output.write_all(name)?;
        output.write_all(RAW_MARKER)?;
        Ok(())
    }

    fn at_snapshot(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        self.output.write_all(bytes_of(&ctx.time()))?;
        write_col_bytes(ctx.pressure(), &mut self.output).map_err(SimError::from)
    }

    fn at_cleanup(&mut self, _ctx: ObsCtx) -> Result<(), SimError> {
        self.output.write_all(RAW_MARKER)?;
        self.output.flush().map_err(SimError::from)
    }
}

/// Keeps every snapshot in memory as `(time, pressure)`.
#[derive(Debug, Default)]
pub struct Recorder {
    pub snapshots: Vec<(Float, Col<Float>)>,
}

impl Observer for &mut Recorder {
    fn at_snapshot(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        self.snapshots.push((ctx.time(), ctx.pressure().clone()));
        Ok(())
    }
}
