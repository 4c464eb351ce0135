pub mod assembly;
pub mod bc;
pub mod config;
pub mod driver;
pub mod faer_add;
pub mod grid;
pub mod local;
pub mod mesh;
pub mod problem;
pub mod relaxation;
pub mod sim;
pub mod sparse;

pub type Float = f64;

pub use bc::{Boundary, BoundaryPolicy};
pub use config::{CaseConfig, ConfigError};
pub use driver::{
    Driver, Logger, ObsCtx, Observer, Phase, RawWriter, Recorder, SimError, SnapshotWriter, State,
};
pub use local::Mobility;
pub use mesh::{RectangularMesh, Side};
pub use problem::{PhysicalParameters, Problem};
pub use sim::{Resolution, Simulation, TimeSettings};
pub use sparse::{SparseError, SparseMatrix};
