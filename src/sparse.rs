//! Mutable sparse matrix in compressed row storage (CSR).
//!
//! Three parallel arrays describe the matrix: `values` holds the non-zero
//! entries left to right and top to bottom, `column_indices` the column of each
//! entry and `row_offsets[r]` the position in both arrays where row `r` starts.
//! Within a row the column indices are strictly increasing and no stored value
//! is ever exactly zero.
//!
//! `row_offsets` is grown lazily: only rows up to the last one that ever
//! received an entry are materialised. The missing trailing offsets all equal
//! the last stored one, so logically the array always has `rows + 1` entries.
//!
//! Insertion and deletion shift every entry stored after the affected position
//! and adjust all later row offsets, i.e. a single [`SparseMatrix::set_element`]
//! costs `O(nnz)` in the worst case. Assembly routines fill the matrix roughly
//! row by row and [`SparseMatrix::reserve`] up front to keep this cheap.

use std::{
    fmt,
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    panic::{self, AssertUnwindSafe},
    path::Path,
};

use faer::{
    prelude::Solve,
    sparse::{linalg::solvers::Lu, SparseColMatRef, SymbolicSparseColMatRef},
    Col,
};
use thiserror::Error;

use crate::Float;

#[derive(Error, Debug)]
pub enum SparseError {
    #[error("index ({row}, {col}) out of bounds for a {rows}x{cols} matrix")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
    #[error("can't solve a linear system with a non-square {rows}x{cols} matrix")]
    NotSquare { rows: usize, cols: usize },
    #[error("vector of length {found} doesn't match matrix order {expected}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("failed to reserve space for {0} non-zero elements")]
    Allocation(usize),
    #[error("factorization failed: {0}")]
    Factorization(String),
    #[error("solution has non-finite entries, matrix is numerically singular")]
    Singular,
    #[error("malformed CSR data: {0}")]
    Parse(String),
    #[error("CSR input/output error")]
    Io(#[from] io::Error),
}

pub struct SparseMatrix {
    rows: usize,
    cols: usize,
    values: Vec<Float>,
    column_indices: Vec<usize>,
    row_offsets: Vec<usize>,
    // LU factors of the transposed view, see `factorize`
    lu: Option<Lu<usize, Float>>,
}

impl SparseMatrix {
    pub fn new(rows: usize, cols: usize) -> Self {
        let mut m = Self {
            rows: 0,
            cols: 0,
            values: Vec::new(),
            column_indices: Vec::new(),
            row_offsets: Vec::new(),
            lu: None,
        };
        m.set_size(rows, cols);
        m
    }

    pub fn square(order: usize) -> Self {
        Self::new(order, order)
    }

    /// Drops every stored entry and the cached factorization, then sets the
    /// logical shape. Keeps the allocated capacity.
    pub fn set_size(&mut self, rows: usize, cols: usize) {
        self.rows = rows;
        self.cols = cols;
        self.values.clear();
        self.column_indices.clear();
        self.row_offsets.clear();
        self.row_offsets.push(0);
        self.lu = None;
    }

    /// Makes room for `n` non-zero elements in total. Never changes the
    /// matrix content.
    pub fn reserve(&mut self, n: usize) -> Result<(), SparseError> {
        let additional = n.saturating_sub(self.values.len());
        self.values
            .try_reserve(additional)
            .map_err(|_| SparseError::Allocation(n))?;
        self.column_indices
            .try_reserve(additional)
            .map_err(|_| SparseError::Allocation(n))?;
        self.row_offsets
            .try_reserve((self.rows + 1).saturating_sub(self.row_offsets.len()))
            .map_err(|_| SparseError::Allocation(n))
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of stored (non-zero) entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[Float] {
        &self.values
    }

    pub fn column_indices(&self) -> &[usize] {
        &self.column_indices
    }

    /// Row offsets padded to exactly `rows + 1` entries.
    pub fn row_offsets(&self) -> Vec<usize> {
        let mut offsets = self.row_offsets.clone();
        let last = self.nnz();
        offsets.resize(self.rows + 1, last);
        offsets
    }

    pub fn is_factorized(&self) -> bool {
        self.lu.is_some()
    }

    #[inline]
    fn check_bounds(&self, row: usize, col: usize) -> Result<(), SparseError> {
        if row >= self.rows || col >= self.cols {
            return Err(SparseError::OutOfBounds {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(())
    }

    /// Storage range of `row`, empty if the row isn't materialised yet.
    #[inline]
    fn row_range(&self, row: usize) -> std::ops::Range<usize> {
        if row + 1 < self.row_offsets.len() {
            self.row_offsets[row]..self.row_offsets[row + 1]
        } else {
            let end = self.nnz();
            end..end
        }
    }

    /// `Ok(position)` of the stored entry, or `Err(position)` where it would be
    /// inserted to keep the row sorted.
    #[inline]
    fn locate(&self, row: usize, col: usize) -> Result<usize, usize> {
        let range = self.row_range(row);
        let start = range.start;
        match self.column_indices[range].binary_search(&col) {
            Ok(i) => Ok(start + i),
            Err(i) => Err(start + i),
        }
    }

    /// Value at `(row, col)`, zero if nothing is stored there.
    ///
    /// # Panics
    ///
    /// If the indices are outside the matrix shape.
    pub fn get_element(&self, row: usize, col: usize) -> Float {
        assert!(
            row < self.rows && col < self.cols,
            "index ({row}, {col}) out of bounds for a {}x{} matrix",
            self.rows,
            self.cols
        );
        match self.locate(row, col) {
            Ok(i) => self.values[i],
            Err(_) => 0.0,
        }
    }

    /// Stores `value` at `(row, col)`.
    ///
    /// An existing entry is overwritten in place, a new non-zero value is
    /// inserted and a zero value removes the stored entry. Insertion and
    /// removal are `O(nnz)`. Any mutation drops the cached factorization.
    pub fn set_element(&mut self, row: usize, col: usize, value: Float) -> Result<(), SparseError> {
        self.check_bounds(row, col)?;

        match (self.locate(row, col), value == 0.0) {
            (Ok(i), false) => self.values[i] = value,
            (Ok(i), true) => {
                self.values.remove(i);
                self.column_indices.remove(i);
                for offset in &mut self.row_offsets[row + 1..] {
                    *offset -= 1;
                }
            }
            (Err(_), true) => return Ok(()),
            (Err(_), false) => {
                // materialise empty rows up to `row`
                while self.row_offsets.len() < row + 2 {
                    let last = *self.row_offsets.last().unwrap_or(&0);
                    self.row_offsets.push(last);
                }
                // the row range may have changed if the row was just created
                let i = match self.locate(row, col) {
                    Ok(i) | Err(i) => i,
                };
                self.values.insert(i, value);
                self.column_indices.insert(i, col);
                for offset in &mut self.row_offsets[row + 1..] {
                    *offset += 1;
                }
            }
        }

        self.lu = None;
        Ok(())
    }

    /// Adds `value` to the entry at `(row, col)`. An entry that cancels out
    /// exactly is removed.
    pub fn add_element(&mut self, row: usize, col: usize, value: Float) -> Result<(), SparseError> {
        self.check_bounds(row, col)?;
        if value == 0.0 {
            return Ok(());
        }
        let current = self.get_element(row, col);
        self.set_element(row, col, current + value)
    }

    /// Iterates over the stored entries as `(row, col, value)`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, Float)> + '_ {
        (0..self.row_offsets.len().saturating_sub(1)).flat_map(move |row| {
            self.row_range(row)
                .map(move |i| (row, self.column_indices[i], self.values[i]))
        })
    }

    /// `y = A x`.
    pub fn mul_vec(&self, x: &Col<Float>) -> Result<Col<Float>, SparseError> {
        if x.nrows() != self.cols {
            return Err(SparseError::DimensionMismatch {
                expected: self.cols,
                found: x.nrows(),
            });
        }
        let mut y = Col::<Float>::zeros(self.rows);
        for (row, col, value) in self.iter() {
            y[row] += value * x[col];
        }
        Ok(y)
    }

    /// Whether `|a_ij - a_ji| <= tol * max(|a_ij|, |a_ji|)` for every stored
    /// entry.
    pub fn is_symmetric(&self, tol: Float) -> bool {
        self.rows == self.cols
            && self.iter().all(|(row, col, value)| {
                let mirrored = self.get_element(col, row);
                (value - mirrored).abs() <= tol * value.abs().max(mirrored.abs())
            })
    }

    /// Factorizes the matrix with faer's sparse LU and caches the factors.
    ///
    /// faer works on compressed sparse columns. Reading the CSR arrays as CSC
    /// describes `A^T`, which is what gets factorized; [`Self::linear_solve`]
    /// then solves with the transposed factors, so no symmetry of `A` is
    /// required.
    ///
    /// A structurally or numerically singular matrix is reported as
    /// [`SparseError::Factorization`] and leaves no factorization cached.
    pub fn factorize(&mut self) -> Result<(), SparseError> {
        if self.rows != self.cols {
            return Err(SparseError::NotSquare {
                rows: self.rows,
                cols: self.cols,
            });
        }
        self.lu = None;

        let nnz = self.nnz();
        self.row_offsets.resize(self.rows + 1, nnz);

        let symbolic = SymbolicSparseColMatRef::new_checked(
            self.cols,
            self.rows,
            &self.row_offsets,
            None,
            &self.column_indices,
        );
        let transposed = SparseColMatRef::new(symbolic, &self.values);
        // faer panics on an exactly zero pivot instead of returning an error
        let lu = panic::catch_unwind(AssertUnwindSafe(|| transposed.sp_lu()))
            .map_err(|_| SparseError::Factorization("zero pivot".into()))?
            .map_err(|e| SparseError::Factorization(format!("{e:?}")))?;

        tracing::trace!(order = self.rows, nnz, "sparse LU factorization done");
        self.lu = Some(lu);
        Ok(())
    }

    /// Solves `A x = rhs`, factorizing first if no factorization is cached.
    pub fn linear_solve(&mut self, x: &mut Col<Float>, rhs: &Col<Float>) -> Result<(), SparseError> {
        if self.rows != self.cols {
            return Err(SparseError::NotSquare {
                rows: self.rows,
                cols: self.cols,
            });
        }
        for found in [x.nrows(), rhs.nrows()] {
            if found != self.rows {
                return Err(SparseError::DimensionMismatch {
                    expected: self.rows,
                    found,
                });
            }
        }

        if self.lu.is_none() {
            self.factorize()?;
        }
        let lu = self.lu.as_ref().ok_or(SparseError::Singular)?;

        // (A^T)^T x = rhs
        let solution = lu.solve_transpose(rhs);
        if (0..solution.nrows()).any(|i| !solution[i].is_finite()) {
            return Err(SparseError::Singular);
        }
        *x = solution;
        Ok(())
    }

    /// Writes the matrix as three lines: values, column indices, row offsets.
    pub fn save(&self, mut output: impl Write) -> Result<(), SparseError> {
        fn join<T: ToString>(items: impl Iterator<Item = T>) -> String {
            items.map(|t| t.to_string()).collect::<Vec<_>>().join(" ")
        }

        writeln!(output, "{}", join(self.values.iter()))?;
        writeln!(output, "{}", join(self.column_indices.iter()))?;
        writeln!(output, "{}", join(self.row_offsets().into_iter()))?;
        output.flush()?;
        Ok(())
    }

    /// Reads the three-line CSR format written by [`Self::save`] into a matrix
    /// of the current shape. On any error the matrix is left untouched.
    pub fn load(&mut self, input: impl BufRead) -> Result<(), SparseError> {
        fn parse<T: std::str::FromStr>(line: &str, what: &str) -> Result<Vec<T>, SparseError> {
            line.split_whitespace()
                .map(|token| {
                    token
                        .parse()
                        .map_err(|_| SparseError::Parse(format!("invalid {what} `{token}`")))
                })
                .collect()
        }

        let mut lines = input.lines();
        let mut next_line = |what: &str| -> Result<String, SparseError> {
            lines
                .next()
                .transpose()?
                .ok_or_else(|| SparseError::Parse(format!("missing {what} line")))
        };
        let values: Vec<Float> = parse(&next_line("values")?, "value")?;
        let column_indices: Vec<usize> = parse(&next_line("column indices")?, "column index")?;
        let row_offsets: Vec<usize> = parse(&next_line("row offsets")?, "row offset")?;

        if row_offsets.len() != self.rows + 1 {
            return Err(SparseError::Parse(format!(
                "expected {} row offsets, found {}",
                self.rows + 1,
                row_offsets.len()
            )));
        }
        if row_offsets[0] != 0 || row_offsets.windows(2).any(|w| w[0] > w[1]) {
            return Err(SparseError::Parse("row offsets must be non-decreasing from 0".into()));
        }
        if row_offsets[self.rows] != column_indices.len() || values.len() != column_indices.len() {
            return Err(SparseError::Parse(format!(
                "{} values and {} column indices for {} declared entries",
                values.len(),
                column_indices.len(),
                row_offsets[self.rows]
            )));
        }
        if values.iter().any(|&v| v == 0.0) {
            return Err(SparseError::Parse("explicit zero entry".into()));
        }
        for w in row_offsets.windows(2) {
            let row = &column_indices[w[0]..w[1]];
            if row.iter().any(|&c| c >= self.cols) || row.windows(2).any(|c| c[0] >= c[1]) {
                return Err(SparseError::Parse(
                    "column indices must be in range and strictly increasing within a row".into(),
                ));
            }
        }

        self.values = values;
        self.column_indices = column_indices;
        self.row_offsets = row_offsets;
        self.lu = None;
        Ok(())
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), SparseError> {
        self.save(BufWriter::new(File::create(path)?))
    }

    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<(), SparseError> {
        self.load(BufReader::new(File::open(path)?))
    }
}

impl Clone for SparseMatrix {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            values: self.values.clone(),
            column_indices: self.column_indices.clone(),
            row_offsets: self.row_offsets.clone(),
            lu: None,
        }
    }
}

impl fmt::Debug for SparseMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseMatrix")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("values", &self.values)
            .field("column_indices", &self.column_indices)
            .field("row_offsets", &self.row_offsets)
            .field("lu", &self.lu.as_ref().map(|_| "<cached>"))
            .finish()
    }
}
