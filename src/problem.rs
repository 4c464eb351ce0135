use core::fmt;
use std::rc::Rc;

use faer::Col;
use serde::{Deserialize, Serialize};

use crate::{mesh::RectangularMesh, Float};

/// Material and gas properties, in SI units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalParameters {
    pub porosity: Float,
    /// Intrinsic permeability [m²].
    pub permeability: Float,
    /// Dynamic viscosity [Pa·s].
    pub viscosity: Float,
    /// Molar mass [kg/mol].
    pub molar_mass: Float,
    /// Universal gas constant [J/(mol·K)].
    pub gas_constant: Float,
    /// Temperature [K].
    pub temperature: Float,
    /// Vertical component of gravity [m/s²], negative when pointing towards
    /// the bottom of the domain.
    pub gravity: Float,
}

impl Default for PhysicalParameters {
    fn default() -> Self {
        Self {
            porosity: 0.4,
            permeability: 1e-10,
            viscosity: 18.6e-6,
            molar_mass: 28.96e-3,
            gas_constant: 8.3144621,
            temperature: 300.0,
            gravity: -9.806,
        }
    }
}

impl PhysicalParameters {
    /// `κ = M / (R T)`, so that the ideal-gas density is `ρ = κ p`.
    pub fn gas_coefficient(&self) -> Float {
        self.molar_mass / (self.gas_constant * self.temperature)
    }

    pub fn density(&self, pressure: Float) -> Float {
        self.gas_coefficient() * pressure
    }
}

/// A scalar field given by its value at a point `(x, y)` of the domain.
pub trait Field: Fn(Float, Float) -> Float {}
impl<T> Field for T where T: Fn(Float, Float) -> Float {}

/// Per-cell and per-edge data sampled from a [`Problem`]. It doesn't change
/// during a run.
#[derive(Debug, Clone)]
pub struct FieldData {
    /// Porosity per cell.
    pub porosity: Col<Float>,
    /// Mass source per cell [kg/(m·s)], already integrated over the cell.
    pub source: Col<Float>,
    /// Prescribed pressure per edge, only read on Dirichlet edges.
    pub dirichlet: Col<Float>,
    /// Prescribed inflow per edge [kg/(m·s)], integrated over the edge, only
    /// read on Neumann edges.
    pub neumann: Col<Float>,
}

/// The immutable description of a simulation case: geometry, material,
/// boundary and initial data.
#[derive(Clone)]
pub struct Problem<'pb> {
    pub(crate) name: String,
    pub(crate) mesh: RectangularMesh,
    pub(crate) physics: PhysicalParameters,
    pub(crate) porosity: Option<Rc<dyn Field + 'pb>>,
    pub(crate) initial_pressure: Rc<dyn Field + 'pb>,
    pub(crate) dirichlet: Rc<dyn Field + 'pb>,
    pub(crate) neumann: Rc<dyn Field + 'pb>,
    pub(crate) source: Rc<dyn Field + 'pb>,
}

impl<'pb> Problem<'pb> {
    /// A problem at rest: uniform atmospheric pressure, the same pressure on
    /// the Dirichlet boundary, no flux and no sources.
    pub fn new(name: impl AsRef<str>, mesh: RectangularMesh) -> Self {
        Self {
            name: name.as_ref().to_string(),
            mesh,
            physics: PhysicalParameters::default(),
            porosity: None,
            initial_pressure: Rc::new(|_, _| 1e5),
            dirichlet: Rc::new(|_, _| 1e5),
            neumann: Rc::new(|_, _| 0.0),
            source: Rc::new(|_, _| 0.0),
        }
    }

    pub fn with_physics(mut self, physics: PhysicalParameters) -> Self {
        self.physics = physics;
        self
    }

    /// Spatially varying porosity, replaces the constant from the physical
    /// parameters.
    pub fn with_porosity(mut self, porosity: impl Field + 'pb) -> Self {
        self.porosity = Some(Rc::new(porosity));
        self
    }

    pub fn with_initial_pressure(mut self, p0: impl Field + 'pb) -> Self {
        self.initial_pressure = Rc::new(p0);
        self
    }

    /// Pressure prescribed on Dirichlet edges [Pa].
    pub fn with_dirichlet(mut self, pd: impl Field + 'pb) -> Self {
        self.dirichlet = Rc::new(pd);
        self
    }

    /// Mass inflow per unit edge length prescribed on Neumann edges
    /// [kg/(m²·s)]; positive values enter the domain.
    pub fn with_neumann(mut self, qn: impl Field + 'pb) -> Self {
        self.neumann = Rc::new(qn);
        self
    }

    /// Mass source per unit area [kg/(m³·s)].
    pub fn with_source(mut self, f: impl Field + 'pb) -> Self {
        self.source = Rc::new(f);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mesh(&self) -> &RectangularMesh {
        &self.mesh
    }

    pub fn physics(&self) -> &PhysicalParameters {
        &self.physics
    }

    fn on_cells(&self, f: &dyn Field) -> Col<Float> {
        Col::from_fn(self.mesh.num_cells(), |cell| {
            let (x, y) = self.mesh.cell_centre(cell);
            f(x, y)
        })
    }

    fn on_edges(&self, f: &dyn Field) -> Col<Float> {
        Col::from_fn(self.mesh.num_edges(), |edge| {
            let (x, y) = self.mesh.edge_midpoint(edge);
            f(x, y)
        })
    }

    /// Initial cell pressures and edge traces. Dirichlet traces start at their
    /// boundary value.
    pub fn initial_state(&self) -> (Col<Float>, Col<Float>) {
        let pressure = self.on_cells(&*self.initial_pressure);
        let trace = Col::from_fn(self.mesh.num_edges(), |edge| {
            let (x, y) = self.mesh.edge_midpoint(edge);
            if self.mesh.is_dirichlet_boundary(edge) {
                (self.dirichlet)(x, y)
            } else {
                (self.initial_pressure)(x, y)
            }
        });
        (pressure, trace)
    }

    pub fn sample(&self) -> FieldData {
        let porosity = match &self.porosity {
            Some(f) => self.on_cells(&**f),
            None => Col::from_fn(self.mesh.num_cells(), |_| self.physics.porosity),
        };

        let mut source = self.on_cells(&*self.source);
        let mut neumann = self.on_edges(&*self.neumann);
        for cell in 0..self.mesh.num_cells() {
            source[cell] *= self.mesh.cell_volume(cell);
        }
        for edge in 0..self.mesh.num_edges() {
            neumann[edge] *= self.mesh.edge_length(edge);
        }

        FieldData {
            porosity,
            source,
            dirichlet: self.on_edges(&*self.dirichlet),
            neumann,
        }
    }
}

impl fmt::Debug for Problem<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Problem")
            .field("name", &self.name)
            .field("mesh", &self.mesh)
            .field("physics", &self.physics)
            .field("porosity", &self.porosity.as_ref().map(|_| "<dyn Field>"))
            .field("initial_pressure", &"<dyn Field>")
            .field("dirichlet", &"<dyn Field>")
            .field("neumann", &"<dyn Field>")
            .field("source", &"<dyn Field>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Side;

    #[test]
    fn gas_coefficient() {
        let p = PhysicalParameters::default();
        let kappa = 28.96e-3 / (8.3144621 * 300.0);
        assert!((p.gas_coefficient() - kappa).abs() < 1e-15);
        assert!((p.density(1e5) - 1.161).abs() < 1e-3);
    }

    #[test]
    fn sampling_scales_by_measure() {
        let mesh = RectangularMesh::new(2.0, 1.0, 2, 2);
        let problem = Problem::new("sampled", mesh)
            .with_source(|_, _| 3.0)
            .with_neumann(|_, _| 2.0)
            .with_porosity(|x, _| if x < 1.0 { 0.1 } else { 0.2 });
        let data = problem.sample();
        // cells are 1.0 x 0.5
        assert_eq!(data.source[0], 1.5);
        // horizontal edges are 1.0 long, vertical ones 0.5
        assert_eq!(data.neumann[0], 2.0);
        assert_eq!(data.neumann[problem.mesh().num_edges() - 1], 1.0);
        assert_eq!(data.porosity[0], 0.1);
        assert_eq!(data.porosity[1], 0.2);
    }

    #[test]
    fn dirichlet_traces_start_at_boundary_value() {
        let mesh = RectangularMesh::new(1.0, 1.0, 2, 2);
        let problem = Problem::new("init", mesh)
            .with_initial_pressure(|_, _| 1.0)
            .with_dirichlet(|x, _| 10.0 + x);
        let (p, tp) = problem.initial_state();
        assert_eq!(p[3], 1.0);
        let top = problem.mesh().edge_for_cell(2, Side::Top);
        assert_eq!(tp[top], 10.25);
        assert_eq!(tp[0], 1.0);
    }

    #[test]
    fn parameters_from_partial_json() {
        let p: PhysicalParameters = serde_json::from_str(r#"{ "gravity": 0.0 }"#).unwrap();
        assert_eq!(p.gravity, 0.0);
        assert_eq!(p.porosity, 0.4);
    }
}
