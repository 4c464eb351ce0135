use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{local::Mobility, problem::Problem, Float};

/// A period given either as a duration or as a number of time steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Delta(Float),
    Steps(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSettings {
    /// Base time step `τ₀`.
    pub time_step: Float,
    /// The effective step is `τ₀ · min(h_x, h_y)^order`.
    pub time_step_order: Float,
    pub final_time: Float,
    pub snapshot_period: Resolution,
    pub mobility: Mobility,
    /// Recompute the mobility every step instead of freezing it after the
    /// first one. Upwinding always recomputes it.
    pub refresh_mobility: bool,
}

impl Default for TimeSettings {
    fn default() -> Self {
        Self {
            time_step: 0.1,
            time_step_order: 0.0,
            final_time: 1.0,
            snapshot_period: Resolution::Delta(0.1),
            mobility: Mobility::Centred,
            refresh_mobility: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Simulation<'pb> {
    pub(crate) problem: Problem<'pb>,
    pub(crate) time: TimeSettings,
}

impl<'pb> Simulation<'pb> {
    pub fn new(problem: Problem<'pb>) -> Self {
        Self {
            problem,
            time: TimeSettings::default(),
        }
    }

    pub fn with_time_settings(mut self, time: TimeSettings) -> Self {
        self.time = time;
        self
    }

    pub fn with_time_step(mut self, tau: Float) -> Self {
        self.time.time_step = tau;
        self
    }

    pub fn with_time_step_order(mut self, order: Float) -> Self {
        self.time.time_step_order = order;
        self
    }

    pub fn with_final_time(mut self, t: Float) -> Self {
        self.time.final_time = t;
        self
    }

    pub fn with_snapshot_period(mut self, period: Resolution) -> Self {
        self.time.snapshot_period = period;
        self
    }

    pub fn with_mobility(mut self, mobility: Mobility) -> Self {
        self.time.mobility = mobility;
        self
    }

    pub fn with_refresh_mobility(mut self, refresh: bool) -> Self {
        self.time.refresh_mobility = refresh;
        self
    }

    pub fn problem(&self) -> &Problem<'pb> {
        &self.problem
    }

    pub fn time_settings(&self) -> &TimeSettings {
        &self.time
    }

    pub fn effective_time_step(&self) -> Float {
        let mesh = self.problem.mesh();
        self.time.time_step * mesh.dx().min(mesh.dy()).powf(self.time.time_step_order)
    }

    /// Simulated time between two snapshots.
    pub fn snapshot_interval(&self) -> Float {
        match self.time.snapshot_period {
            Resolution::Delta(delta) => delta,
            Resolution::Steps(steps) => steps as Float * self.effective_time_step(),
        }
    }

    pub fn refreshes_mobility(&self) -> bool {
        self.time.refresh_mobility || self.time.mobility == Mobility::Upwind
    }

    /// Checks the time settings, returning a description of the first
    /// problem found.
    pub fn validate(&self) -> Result<(), String> {
        let t = &self.time;
        let positive = |name: &str, value: Float| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(format!("{name} must be positive and finite, got {value}"))
            }
        };

        positive("time step", t.time_step)?;
        if !t.time_step_order.is_finite() {
            return Err(format!("time step order must be finite, got {}", t.time_step_order));
        }
        positive("effective time step", self.effective_time_step())?;
        positive("final time", t.final_time)?;
        match t.snapshot_period {
            Resolution::Delta(delta) => positive("snapshot period", delta)?,
            Resolution::Steps(0) => return Err("snapshot period must be at least one step".into()),
            Resolution::Steps(_) => {}
        }
        Ok(())
    }
}

impl fmt::Display for Simulation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mesh = self.problem.mesh();
        write!(
            f,
            "simulation of `{}` problem:\n\t- {}x{} cells, hx = {:e}, hy = {:e}\n\t- τ = {:e}, final time {:e}\n\t- {:?} mobility",
            self.problem.name(),
            mesh.rows(),
            mesh.cols(),
            mesh.dx(),
            mesh.dy(),
            self.effective_time_step(),
            self.time.final_time,
            self.time.mobility,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::RectangularMesh;

    fn sim() -> Simulation<'static> {
        Simulation::new(Problem::new("timing", RectangularMesh::new(1.0, 0.5, 5, 4)))
    }

    #[test]
    fn effective_step_scales_with_mesh() {
        let s = sim().with_time_step(2.0).with_time_step_order(1.0);
        // hx = 0.25, hy = 0.1
        assert!((s.effective_time_step() - 0.2).abs() < 1e-15);
        assert_eq!(sim().with_time_step(2.0).effective_time_step(), 2.0);
    }

    #[test]
    fn snapshot_interval_in_steps() {
        let s = sim()
            .with_time_step(0.5)
            .with_snapshot_period(Resolution::Steps(3));
        assert_eq!(s.snapshot_interval(), 1.5);
    }

    #[test]
    fn validation() {
        assert!(sim().validate().is_ok());
        assert!(sim().with_time_step(0.0).validate().is_err());
        assert!(sim().with_final_time(-1.0).validate().is_err());
        assert!(sim()
            .with_snapshot_period(Resolution::Steps(0))
            .validate()
            .is_err());
        assert!(sim()
            .with_snapshot_period(Resolution::Delta(Float::NAN))
            .validate()
            .is_err());
    }

    #[test]
    fn upwind_always_refreshes() {
        assert!(!sim().refreshes_mobility());
        assert!(sim().with_refresh_mobility(true).refreshes_mobility());
        assert!(sim().with_mobility(Mobility::Upwind).refreshes_mobility());
    }

    #[test]
    fn settings_from_json() {
        let t: TimeSettings =
            serde_json::from_str(r#"{ "final_time": 2.0, "snapshot_period": { "steps": 4 } }"#)
                .unwrap();
        assert_eq!(t.final_time, 2.0);
        assert_eq!(t.snapshot_period, Resolution::Steps(4));
        assert_eq!(t.time_step, 0.1);
    }
}
