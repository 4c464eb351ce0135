//! Global system for the edge traces.
//!
//! Eliminating the cell pressure from the cell balance (see [`crate::local`])
//! and requiring flux continuity on every non-Dirichlet edge `E` gives
//!
//! ```text
//! Σ_{K ∋ E} Σ_{F ∈ K} A_K(E, F) (tp_F - G_KF)
//!     = Σ_{K ∋ E} β_KE / (λ_K + α_K) (F_K + λ_K p_K^old) + qN_E
//! ```
//!
//! with `A_K(E, F) = δ_EF β_KE - β_KE β_KF / (λ_K + α_K)`. Dirichlet rows are
//! replaced by `tp_E = pD_E` and Dirichlet columns moved to the right-hand
//! side, which keeps the matrix symmetric.

use faer::Col;

use crate::{
    local::LocalCoefficients,
    mesh::{RectangularMesh, Side},
    problem::FieldData,
    sparse::{SparseError, SparseMatrix},
    Float,
};

/// Upper bound on the number of non-zero entries of the trace system: at most
/// seven couplings for an edge shared by two cells, one for a Dirichlet row.
pub fn reserve_estimate(mesh: &RectangularMesh) -> usize {
    let dirichlet = mesh.num_dirichlet_edges();
    7 * (mesh.num_edges() - dirichlet) + dirichlet
}

/// Fills `matrix` and `rhs` with the trace system. The matrix must be empty
/// and sized `num_edges x num_edges`.
pub fn assemble(
    mesh: &RectangularMesh,
    local: &LocalCoefficients,
    data: &FieldData,
    pressure: &Col<Float>,
    matrix: &mut SparseMatrix,
    rhs: &mut Col<Float>,
) -> Result<(), SparseError> {
    for edge in 0..mesh.num_edges() {
        if mesh.is_dirichlet_boundary(edge) {
            matrix.set_element(edge, edge, 1.0)?;
            rhs[edge] = data.dirichlet[edge];
            continue;
        }

        let mut b = 0.0;
        for (cell, e) in mesh.edge_cell_sides(edge) {
            for f in Side::ALL {
                let other = mesh.edge_for_cell(cell, f);
                let a = local.coupling(cell, e, f);

                if mesh.is_dirichlet_boundary(other) {
                    b -= a * data.dirichlet[other];
                } else {
                    matrix.add_element(edge, other, a)?;
                }
                b += a * local.gravity(cell, f);
            }

            b += local.beta(cell, e) / local.diagonal(cell)
                * (data.source[cell] + local.lambda(cell) * pressure[cell]);
        }

        if mesh.is_neumann_boundary(edge) {
            b += data.neumann[edge];
        }
        rhs[edge] = b;
    }

    Ok(())
}

/// Recovers the cell pressures from the solved traces:
/// `p_K = (F_K + λ_K p_K^old + Σ_s β_Ks (tp_s - G_Ks)) / (λ_K + α_K)`.
pub fn update_pressure(
    mesh: &RectangularMesh,
    local: &LocalCoefficients,
    data: &FieldData,
    trace: &Col<Float>,
    pressure: &mut Col<Float>,
) {
    for cell in 0..mesh.num_cells() {
        let mut p = data.source[cell] + local.lambda(cell) * pressure[cell];
        for side in Side::ALL {
            let edge = mesh.edge_for_cell(cell, side);
            p += local.beta(cell, side) * (trace[edge] - local.gravity(cell, side));
        }
        pressure[cell] = p / local.diagonal(cell);
    }
}

/// Net mass flux leaving each cell, `Σ_s β_Ks (p_K - tp_s + G_Ks)`.
pub fn cell_outflow(
    mesh: &RectangularMesh,
    local: &LocalCoefficients,
    trace: &Col<Float>,
    pressure: &Col<Float>,
) -> Col<Float> {
    Col::from_fn(mesh.num_cells(), |cell| {
        Side::ALL
            .into_iter()
            .map(|side| {
                let edge = mesh.edge_for_cell(cell, side);
                local.beta(cell, side)
                    * (pressure[cell] - trace[edge] + local.gravity(cell, side))
            })
            .sum()
    })
}
