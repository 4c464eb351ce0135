//! Structured rectangular mesh.
//!
//! Cells are numbered row-major, left to right, with row 0 at the bottom of the
//! domain. Edges come in two contiguous blocks: first the horizontal edges, an
//! `(rows + 1) x cols` row-major grid, then the vertical edges, a
//! `rows x (cols + 1)` row-major grid.
//!
//! Indices passed to the queries must be in range; an out-of-range cell or edge
//! is a programming error and panics.

use crate::{
    bc::{Boundary, BoundaryPolicy},
    grid::Grid,
    Float,
};

/// Local position of an edge with respect to one of its cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Bottom,
    Top,
    Left,
    Right,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Bottom, Side::Top, Side::Left, Side::Right];

    /// Position of the side in [`Side::ALL`], used to index per-cell arrays.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn is_horizontal(self) -> bool {
        matches!(self, Side::Bottom | Side::Top)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RectangularMesh {
    x: Grid,
    y: Grid,
    boundary: BoundaryPolicy,
}

impl RectangularMesh {
    /// A `rows x cols` mesh of the `[0, width] x [0, height]` rectangle with the
    /// default boundary policy.
    pub fn new(width: Float, height: Float, rows: usize, cols: usize) -> Self {
        Self {
            x: Grid::from_steps(0.0, width, cols),
            y: Grid::from_steps(0.0, height, rows),
            boundary: BoundaryPolicy::default(),
        }
    }

    pub fn with_boundary(mut self, boundary: BoundaryPolicy) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn boundary(&self) -> &BoundaryPolicy {
        &self.boundary
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.y.steps()
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.x.steps()
    }

    #[inline]
    pub fn dx(&self) -> Float {
        self.x.step_size()
    }

    #[inline]
    pub fn dy(&self) -> Float {
        self.y.step_size()
    }

    pub fn width(&self) -> Float {
        self.x.length()
    }

    pub fn height(&self) -> Float {
        self.y.length()
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.rows() * self.cols()
    }

    #[inline]
    pub fn num_edges(&self) -> usize {
        self.num_horizontal_edges() + self.rows() * (self.cols() + 1)
    }

    #[inline]
    pub fn edges_per_cell(&self) -> usize {
        4
    }

    #[inline]
    fn num_horizontal_edges(&self) -> usize {
        (self.rows() + 1) * self.cols()
    }

    #[inline]
    fn check_cell(&self, cell: usize) {
        assert!(
            cell < self.num_cells(),
            "cell index {cell} out of range ({} cells)",
            self.num_cells()
        );
    }

    #[inline]
    fn check_edge(&self, edge: usize) {
        assert!(
            edge < self.num_edges(),
            "edge index {edge} out of range ({} edges)",
            self.num_edges()
        );
    }

    /// `(row, col)` of an edge within its own block.
    #[inline]
    fn edge_coordinates(&self, edge: usize) -> (usize, usize) {
        let h = self.num_horizontal_edges();
        if edge < h {
            (edge / self.cols(), edge % self.cols())
        } else {
            let e = edge - h;
            (e / (self.cols() + 1), e % (self.cols() + 1))
        }
    }

    /// Global index of the edge on the given side of `cell`.
    pub fn edge_for_cell(&self, cell: usize, side: Side) -> usize {
        self.check_cell(cell);
        let mut row = cell / self.cols();
        let mut col = cell % self.cols();

        match side {
            Side::Top => row += 1,
            Side::Right => col += 1,
            Side::Bottom | Side::Left => {}
        }

        if side.is_horizontal() {
            row * self.cols() + col
        } else {
            self.num_horizontal_edges() + row * (self.cols() + 1) + col
        }
    }

    /// All four edges of `cell`, in [`Side::ALL`] order.
    pub fn cell_edges(&self, cell: usize) -> [usize; 4] {
        Side::ALL.map(|side| self.edge_for_cell(cell, side))
    }

    /// The cell below (`order == 0`) or above (`order == 1`) a horizontal edge,
    /// left or right of a vertical one. `None` when the edge lies on the domain
    /// boundary and there is no cell on that side.
    pub fn cell_for_edge(&self, edge: usize, order: usize) -> Option<usize> {
        self.check_edge(edge);
        assert!(order < 2, "cell order must be 0 or 1, got {order}");
        let (row, col) = self.edge_coordinates(edge);

        let (row, col) = if self.is_horizontal_edge(edge) {
            let row = if order == 0 { row.checked_sub(1)? } else { row };
            (row < self.rows()).then_some((row, col))?
        } else {
            let col = if order == 0 { col.checked_sub(1)? } else { col };
            (col < self.cols()).then_some((row, col))?
        };

        Some(row * self.cols() + col)
    }

    /// Cells adjacent to `edge`, one entry for outer edges and two otherwise.
    pub fn edge_cells(&self, edge: usize) -> impl Iterator<Item = usize> + '_ {
        (0..2).filter_map(move |order| self.cell_for_edge(edge, order))
    }

    /// Cells adjacent to `edge` together with the side of each cell the edge
    /// lies on: the lower/left cell sees it as its top/right side.
    pub fn edge_cell_sides(&self, edge: usize) -> impl Iterator<Item = (usize, Side)> + '_ {
        let (lower, upper) = if self.is_horizontal_edge(edge) {
            (Side::Top, Side::Bottom)
        } else {
            (Side::Right, Side::Left)
        };
        [(0, lower), (1, upper)]
            .into_iter()
            .filter_map(move |(order, side)| Some((self.cell_for_edge(edge, order)?, side)))
    }

    /// Which side of `cell` the edge is on, if it is incident at all.
    pub fn edge_order(&self, cell: usize, edge: usize) -> Option<Side> {
        Side::ALL
            .into_iter()
            .find(|&side| self.edge_for_cell(cell, side) == edge)
    }

    #[inline]
    pub fn is_horizontal_edge(&self, edge: usize) -> bool {
        self.check_edge(edge);
        edge < self.num_horizontal_edges()
    }

    #[inline]
    pub fn is_vertical_edge(&self, edge: usize) -> bool {
        !self.is_horizontal_edge(edge)
    }

    /// Side of the domain an outer edge lies on, `None` for inner edges.
    pub fn boundary_side(&self, edge: usize) -> Option<Boundary> {
        let (row, col) = self.edge_coordinates(edge);
        if self.is_horizontal_edge(edge) {
            match row {
                0 => Some(Boundary::Bottom),
                r if r == self.rows() => Some(Boundary::Top),
                _ => None,
            }
        } else {
            match col {
                0 => Some(Boundary::Left),
                c if c == self.cols() => Some(Boundary::Right),
                _ => None,
            }
        }
    }

    pub fn is_inner_edge(&self, edge: usize) -> bool {
        self.boundary_side(edge).is_none()
    }

    pub fn is_outer_edge(&self, edge: usize) -> bool {
        !self.is_inner_edge(edge)
    }

    pub fn is_dirichlet_boundary(&self, edge: usize) -> bool {
        self.boundary_side(edge)
            .is_some_and(|side| self.boundary.is_dirichlet(side))
    }

    pub fn is_neumann_boundary(&self, edge: usize) -> bool {
        self.boundary_side(edge)
            .is_some_and(|side| !self.boundary.is_dirichlet(side))
    }

    fn boundary_len(&self, side: Boundary) -> usize {
        match side {
            Boundary::Bottom | Boundary::Top => self.cols(),
            Boundary::Left | Boundary::Right => self.rows(),
        }
    }

    pub fn num_outer_edges(&self) -> usize {
        2 * (self.rows() + self.cols())
    }

    pub fn num_dirichlet_edges(&self) -> usize {
        self.boundary
            .dirichlet_sides()
            .iter()
            .map(|&side| self.boundary_len(side))
            .sum()
    }

    pub fn num_neumann_edges(&self) -> usize {
        self.num_outer_edges() - self.num_dirichlet_edges()
    }

    pub fn cell_volume(&self, cell: usize) -> Float {
        self.check_cell(cell);
        self.dx() * self.dy()
    }

    pub fn edge_length(&self, edge: usize) -> Float {
        if self.is_horizontal_edge(edge) {
            self.dx()
        } else {
            self.dy()
        }
    }

    pub fn cell_centre(&self, cell: usize) -> (Float, Float) {
        self.check_cell(cell);
        let (row, col) = (cell / self.cols(), cell % self.cols());
        (self.x.centre(col), self.y.centre(row))
    }

    pub fn edge_midpoint(&self, edge: usize) -> (Float, Float) {
        let (row, col) = self.edge_coordinates(edge);
        if self.is_horizontal_edge(edge) {
            (self.x.centre(col), self.y.node(row))
        } else {
            (self.x.node(col), self.y.centre(row))
        }
    }
}
