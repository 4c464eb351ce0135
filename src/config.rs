//! JSON description of a simulation case.
//!
//! Every field is optional; missing ones take the values of the reference
//! case: a 1 cm square of air-filled porous medium at atmospheric pressure,
//! with a pressure rising linearly by 1 kPa along the top side.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    bc::BoundaryPolicy,
    mesh::RectangularMesh,
    problem::{PhysicalParameters, Problem},
    sim::{Simulation, TimeSettings},
    Float,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read the case file")]
    Io(#[from] std::io::Error),
    #[error("malformed case file")]
    Json(#[from] serde_json::Error),
    #[error("invalid case: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseConfig {
    pub name: String,
    pub width: Float,
    pub height: Float,
    pub physics: PhysicalParameters,
    pub boundary: BoundaryPolicy,
    pub initial_pressure: Float,
    /// Dirichlet pressure at `x = 0`.
    pub boundary_pressure: Float,
    /// Increase of the Dirichlet pressure across the width of the domain.
    pub boundary_pressure_gradient: Float,
    /// Uniform inflow on Neumann edges [kg/(m²·s)].
    pub neumann_flux: Float,
    /// Uniform mass source [kg/(m³·s)].
    pub source: Float,
    pub time: TimeSettings,
}

impl Default for CaseConfig {
    fn default() -> Self {
        Self {
            name: "gas".into(),
            width: 0.01,
            height: 0.01,
            physics: PhysicalParameters::default(),
            boundary: BoundaryPolicy::default(),
            initial_pressure: 1e5,
            boundary_pressure: 1e5,
            boundary_pressure_gradient: 1e3,
            neumann_flux: 0.0,
            source: 0.0,
            time: TimeSettings::default(),
        }
    }
}

impl CaseConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Builds the simulation on a `rows x cols` mesh.
    pub fn build(&self, rows: usize, cols: usize) -> Result<Simulation<'static>, ConfigError> {
        if rows == 0 || cols == 0 {
            return Err(ConfigError::Invalid(format!(
                "mesh needs at least one cell per direction, got {rows}x{cols}"
            )));
        }
        for (name, value) in [("width", self.width), ("height", self.height)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        let mesh = RectangularMesh::new(self.width, self.height, rows, cols)
            .with_boundary(self.boundary.clone());

        let (p0, pd, dpd, width) = (
            self.initial_pressure,
            self.boundary_pressure,
            self.boundary_pressure_gradient,
            self.width,
        );
        let (qn, f) = (self.neumann_flux, self.source);
        let problem = Problem::new(&self.name, mesh)
            .with_physics(self.physics)
            .with_initial_pressure(move |_, _| p0)
            .with_dirichlet(move |x, _| pd + dpd * x / width)
            .with_neumann(move |_, _| qn)
            .with_source(move |_, _| f);

        let sim = Simulation::new(problem).with_time_settings(self.time);
        sim.validate().map_err(ConfigError::Invalid)?;
        Ok(sim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bc::Boundary, local::Mobility, mesh::Side, sim::Resolution};

    #[test]
    fn reference_case() {
        let sim = CaseConfig::default().build(2, 4).unwrap();
        let mesh = sim.problem().mesh();
        assert_eq!(mesh.width(), 0.01);
        assert_eq!(sim.time_settings().final_time, 1.0);

        let data = sim.problem().sample();
        let top = mesh.edge_for_cell(7, Side::Top);
        // midpoint x = 0.00875
        assert!((data.dirichlet[top] - (1e5 + 875.0)).abs() < 1e-6);
    }

    #[test]
    fn partial_json() {
        let config = CaseConfig::from_json_str(
            r#"{
                "name": "column",
                "height": 0.02,
                "physics": { "gravity": 0.0 },
                "boundary": { "dirichlet": ["bottom", "top"] },
                "time": { "mobility": "upwind", "snapshot_period": { "delta": 0.25 } }
            }"#,
        )
        .unwrap();
        assert_eq!(config.name, "column");
        assert_eq!(config.width, 0.01);
        assert_eq!(config.height, 0.02);
        assert_eq!(config.physics.gravity, 0.0);
        assert_eq!(config.physics.porosity, 0.4);
        assert!(config.boundary.is_dirichlet(Boundary::Bottom));
        assert!(!config.boundary.is_dirichlet(Boundary::Left));
        assert_eq!(config.time.mobility, Mobility::Upwind);
        assert_eq!(config.time.snapshot_period, Resolution::Delta(0.25));
    }

    #[test]
    fn invalid_cases() {
        assert!(matches!(
            CaseConfig::from_json_str("{ \"width\": "),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            CaseConfig::default().build(0, 3),
            Err(ConfigError::Invalid(_))
        ));

        let mut config = CaseConfig::default();
        config.height = -1.0;
        assert!(matches!(config.build(2, 2), Err(ConfigError::Invalid(_))));

        let mut config = CaseConfig::default();
        config.time.final_time = 0.0;
        assert!(matches!(config.build(2, 2), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("case.json");
        fs::write(&path, r#"{ "initial_pressure": 2e5 }"#).unwrap();
        let config = CaseConfig::from_json_file(&path).unwrap();
        assert_eq!(config.initial_pressure, 2e5);

        assert!(matches!(
            CaseConfig::from_json_file(dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
