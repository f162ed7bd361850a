//! Owned storage for the symmetric wavefront matrix.
//!
//! Cells live in a contiguous row-major `Array2<f64>`. The matrix is seeded on
//! its main diagonal and filled anti-diagonal by anti-diagonal; off-diagonal
//! values are written in symmetric pairs so either triangle can serve reads.
//!
//! This module also owns the textual result format. Every execution strategy
//! renders through [`Matrix::write_result`], which is what makes result files
//! comparable byte for byte.

use std::io::{self, Read, Write};

use ndarray::Array2;
use thiserror::Error;

use crate::kernel::MatrixRead;

/// Errors from matrix construction and result-file parsing.
#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("Matrix size must be at least 1, got {0}")]
    InvalidSize(usize),

    #[error("Malformed result text: {0}")]
    Malformed(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// An n×n matrix of `f64` cells, zero-filled on creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    cells: Array2<f64>,
}

impl Matrix {
    /// Create a zero-filled n×n matrix. The size must be at least 1.
    pub fn new(n: usize) -> Result<Self, MatrixError> {
        if n < 1 {
            return Err(MatrixError::InvalidSize(n));
        }
        Ok(Self {
            cells: Array2::zeros((n, n)),
        })
    }

    /// The dimension n.
    pub fn size(&self) -> usize {
        self.cells.nrows()
    }

    /// Read the cell at `(row, col)`.
    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.cells[[row, col]]
    }

    /// Write the cell at `(row, col)`.
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.cells[[row, col]] = value;
    }

    /// Write `value` to `(row, col)` and its mirror `(col, row)`.
    pub fn set_symmetric(&mut self, row: usize, col: usize, value: f64) {
        self.cells[[row, col]] = value;
        self.cells[[col, row]] = value;
    }

    /// Seed the main diagonal with `(i, i) = (i + 1) / n`.
    pub fn initialize_diagonal(&mut self) {
        let n = self.size();
        for i in 0..n {
            self.cells[[i, i]] = (i + 1) as f64 / n as f64;
        }
    }

    /// Copy the strict upper triangle onto the lower triangle.
    ///
    /// Used by strategies that fill only `(m, m + k)` cells during the sweep
    /// and restore symmetry once at the end.
    pub fn mirror_lower_from_upper(&mut self) {
        let n = self.size();
        for row in 0..n {
            for col in row + 1..n {
                self.cells[[col, row]] = self.cells[[row, col]];
            }
        }
    }

    /// The last element to be computed, `(0, n - 1)`.
    pub fn top_right(&self) -> f64 {
        self.cells[[0, self.size() - 1]]
    }

    /// Raw pointer to the contiguous row-major cell buffer.
    ///
    /// Cell `(row, col)` lives at offset `row * n + col`. The pointer is valid
    /// for `n * n` elements and stays valid while the borrow lives.
    pub fn as_mut_ptr(&mut self) -> *mut f64 {
        self.cells.as_mut_ptr()
    }

    /// Write the cell grid: n rows of fixed-width (10 columns, 2 decimals)
    /// cells, each followed by a single space.
    pub fn write_grid<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let n = self.size();
        for row in 0..n {
            for col in 0..n {
                write!(out, "{:>10.2} ", self.cells[[row, col]])?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    /// Write a result document: the dimension on its own line, then the grid.
    pub fn write_result<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{}", self.size())?;
        self.write_grid(out)
    }

    /// Parse a result document produced by [`Matrix::write_result`].
    ///
    /// Tokens are whitespace-separated: the dimension first, then n² cell
    /// values in row-major order.
    pub fn read_result<R: Read>(mut input: R) -> Result<Self, MatrixError> {
        let mut text = String::new();
        input.read_to_string(&mut text)?;
        let mut tokens = text.split_whitespace();

        let n: usize = tokens
            .next()
            .ok_or_else(|| MatrixError::Malformed("missing dimension header".into()))?
            .parse()
            .map_err(|_| MatrixError::Malformed("dimension is not an integer".into()))?;
        let mut matrix = Self::new(n)?;

        for row in 0..n {
            for col in 0..n {
                let token = tokens.next().ok_or_else(|| {
                    MatrixError::Malformed(format!(
                        "expected {} cells, ran out at ({row}, {col})",
                        n * n
                    ))
                })?;
                let value: f64 = token.parse().map_err(|_| {
                    MatrixError::Malformed(format!("cell ({row}, {col}) is not a number"))
                })?;
                matrix.set(row, col, value);
            }
        }

        Ok(matrix)
    }
}

impl MatrixRead for Matrix {
    fn size(&self) -> usize {
        self.size()
    }

    fn at(&self, row: usize, col: usize) -> f64 {
        self.cells[[row, col]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_size_is_rejected() {
        assert!(matches!(Matrix::new(0), Err(MatrixError::InvalidSize(0))));
    }

    #[test]
    fn diagonal_seed_for_n4() {
        let mut m = Matrix::new(4).unwrap();
        m.initialize_diagonal();
        assert_eq!(m.at(0, 0), 0.25);
        assert_eq!(m.at(1, 1), 0.5);
        assert_eq!(m.at(2, 2), 0.75);
        assert_eq!(m.at(3, 3), 1.0);
        // off-diagonals stay zero
        assert_eq!(m.at(0, 3), 0.0);
        assert_eq!(m.at(3, 0), 0.0);
    }

    #[test]
    fn symmetric_write_hits_both_triangles() {
        let mut m = Matrix::new(3).unwrap();
        m.set_symmetric(0, 2, 1.5);
        assert_eq!(m.at(0, 2), 1.5);
        assert_eq!(m.at(2, 0), 1.5);
    }

    #[test]
    fn mirror_fills_lower_triangle() {
        let mut m = Matrix::new(3).unwrap();
        m.set(0, 1, 1.0);
        m.set(0, 2, 2.0);
        m.set(1, 2, 3.0);
        m.mirror_lower_from_upper();
        assert_eq!(m.at(1, 0), 1.0);
        assert_eq!(m.at(2, 0), 2.0);
        assert_eq!(m.at(2, 1), 3.0);
    }

    #[test]
    fn grid_is_fixed_width() {
        let mut m = Matrix::new(2).unwrap();
        m.initialize_diagonal();
        let mut out = Vec::new();
        m.write_grid(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "      0.50       0.00 \n      0.00       1.00 \n");
    }

    #[test]
    fn result_document_round_trips() {
        // Values exactly representable at two decimals, so parsing the
        // rendered text recovers the cells bit for bit.
        let mut m = Matrix::new(3).unwrap();
        m.set(0, 0, 0.25);
        m.set(1, 1, 0.5);
        m.set(2, 2, 1.0);
        m.set_symmetric(0, 1, 0.25);
        m.set_symmetric(0, 2, -0.75);
        m.set_symmetric(1, 2, 1.5);

        let mut out = Vec::new();
        m.write_result(&mut out).unwrap();
        let parsed = Matrix::read_result(out.as_slice()).unwrap();
        assert_eq!(parsed, m);
    }

    #[test]
    fn truncated_document_is_malformed() {
        let err = Matrix::read_result("3\n1.0 2.0".as_bytes()).unwrap_err();
        assert!(matches!(err, MatrixError::Malformed(_)));
    }

    #[test]
    fn header_must_be_integral() {
        let err = Matrix::read_result("x\n".as_bytes()).unwrap_err();
        assert!(matches!(err, MatrixError::Malformed(_)));
    }
}
