//! Cell-local coefficients of the mixed-hybrid scheme.
//!
//! The mass flux leaving cell `K` through its side `s` is
//! `β_Ks (p_K - tp_s + G_Ks)`, with `tp_s` the trace pressure on the edge and
//! `G_Ks` the hydrostatic correction. Together with the accumulation term
//! `λ_K (p_K - p_K^old)` this gives the cell balance
//!
//! ```text
//! λ_K (p_K - p_K^old) + Σ_s β_Ks (p_K - tp_s + G_Ks) = F_K
//! ```
//!
//! which the global assembly uses to eliminate `p_K` in favour of the traces.

use faer::Col;
use serde::{Deserialize, Serialize};

use crate::{
    mesh::{RectangularMesh, Side},
    problem::PhysicalParameters,
    Float,
};

/// Which pressure the density inside the mobility `k ρ / μ` is evaluated at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mobility {
    /// The pressure of the cell itself.
    #[default]
    Centred,
    /// The pressure upstream of the edge, following the direction of the
    /// lagged flux.
    Upwind,
}

#[derive(Debug, Clone)]
pub struct LocalCoefficients {
    alpha: Col<Float>,
    beta: Vec<[Float; 4]>,
    lambda: Col<Float>,
    gravity: Vec<[Float; 4]>,
}

impl LocalCoefficients {
    pub fn new(mesh: &RectangularMesh) -> Self {
        let cells = mesh.num_cells();
        Self {
            alpha: Col::zeros(cells),
            beta: vec![[0.0; 4]; cells],
            lambda: Col::zeros(cells),
            gravity: vec![[0.0; 4]; cells],
        }
    }

    /// `α_K = Σ_s β_Ks`.
    #[inline]
    pub fn alpha(&self, cell: usize) -> Float {
        self.alpha[cell]
    }

    #[inline]
    pub fn beta(&self, cell: usize, side: Side) -> Float {
        self.beta[cell][side.index()]
    }

    #[inline]
    pub fn lambda(&self, cell: usize) -> Float {
        self.lambda[cell]
    }

    /// Hydrostatic correction `G_Ks`.
    #[inline]
    pub fn gravity(&self, cell: usize, side: Side) -> Float {
        self.gravity[cell][side.index()]
    }

    /// `λ_K + α_K`, the coefficient of `p_K` in the cell balance.
    #[inline]
    pub fn diagonal(&self, cell: usize) -> Float {
        self.lambda[cell] + self.alpha[cell]
    }

    /// Coupling between sides `e` and `f` of `cell` once `p_K` is eliminated:
    /// `δ_ef β_Ke - β_Ke β_Kf / (λ_K + α_K)`. Symmetric in `e` and `f`.
    #[inline]
    pub fn coupling(&self, cell: usize, e: Side, f: Side) -> Float {
        let be = self.beta(cell, e);
        let bf = self.beta(cell, f);
        let diag = if e == f { be } else { 0.0 };
        diag - be * bf / self.diagonal(cell)
    }

    /// `λ_K = φ_K κ |K| / τ`.
    pub fn update_accumulation(
        &mut self,
        mesh: &RectangularMesh,
        physics: &PhysicalParameters,
        porosity: &Col<Float>,
        tau: Float,
    ) {
        let kappa = physics.gas_coefficient();
        for cell in 0..mesh.num_cells() {
            self.lambda[cell] = porosity[cell] * kappa * mesh.cell_volume(cell) / tau;
        }
    }

    /// `G_Ks = ∓ ½ κ p_K g_y h_y` on the bottom/top side, zero on the vertical
    /// sides.
    pub fn update_gravity(
        &mut self,
        mesh: &RectangularMesh,
        physics: &PhysicalParameters,
        pressure: &Col<Float>,
    ) {
        let half_column = 0.5 * physics.gas_coefficient() * physics.gravity * mesh.dy();
        for (cell, g) in self.gravity.iter_mut().enumerate() {
            let value = half_column * pressure[cell];
            *g = [-value, value, 0.0, 0.0];
        }
    }

    /// `β_Ks = 2 k ρ / μ · (h_x / h_y or h_y / h_x)` and `α_K`.
    ///
    /// With [`Mobility::Upwind`] the density is taken upstream of each edge,
    /// judged from the current `pressure`, `trace` and gravity correction, so
    /// [`Self::update_gravity`] must run first.
    pub fn update_mobility(
        &mut self,
        mesh: &RectangularMesh,
        physics: &PhysicalParameters,
        mode: Mobility,
        pressure: &Col<Float>,
        trace: &Col<Float>,
    ) {
        let dxy = mesh.dx() / mesh.dy();
        let dyx = mesh.dy() / mesh.dx();
        let conductivity = 2.0 * physics.permeability / physics.viscosity;

        for cell in 0..mesh.num_cells() {
            let mut alpha = 0.0;
            for side in Side::ALL {
                let edge = mesh.edge_for_cell(cell, side);
                let upstream = match mode {
                    Mobility::Centred => pressure[cell],
                    Mobility::Upwind => {
                        let outflow = pressure[cell] - trace[edge] + self.gravity(cell, side);
                        if outflow >= 0.0 {
                            pressure[cell]
                        } else {
                            mesh.edge_cells(edge)
                                .find(|&other| other != cell)
                                .map_or(trace[edge], |other| pressure[other])
                        }
                    }
                };
                let ratio = if side.is_horizontal() { dxy } else { dyx };
                let beta = conductivity * physics.density(upstream) * ratio;
                self.beta[cell][side.index()] = beta;
                alpha += beta;
            }
            self.alpha[cell] = alpha;
        }
    }
}
