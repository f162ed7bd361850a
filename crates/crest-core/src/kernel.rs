//! The dependency kernel evaluated for every off-diagonal element.
//!
//! Element `(m, m + k)` depends on two length-`k` arms of earlier
//! generations: the row arm, read right to left along row `m` from column
//! `m + k - 1` down to `m`, and the column arm, read top to bottom along
//! column `m + k` from row `m + 1` to `m + k` (taken from row `m + k` of the
//! lower triangle, which mirrors it). The element value is the real cube root
//! of their dot product.
//!
//! The accumulation order of [`arm_dot`] is fixed. Floating-point addition is
//! not associative, and cross-strategy result files are compared byte for
//! byte, so every strategy must fold the same products in the same order.

/// Read-only cell access.
///
/// The kernel is generic over this seam so it can run against [`Matrix`]
/// directly as well as against shared views used by parallel strategies.
///
/// [`Matrix`]: crate::matrix::Matrix
pub trait MatrixRead {
    /// The dimension n.
    fn size(&self) -> usize;

    /// Read the cell at `(row, col)`.
    fn at(&self, row: usize, col: usize) -> f64;
}

/// Dot product of the two dependency arms of element `(m, m + k)`.
///
/// Reads only cells on anti-diagonals strictly below `k`, so it is safe to
/// evaluate concurrently for every element of one generation.
pub fn arm_dot<M: MatrixRead + ?Sized>(matrix: &M, m: usize, k: usize) -> f64 {
    let mut acc = 0.0;
    for i in 0..k {
        acc += matrix.at(m, m + k - 1 - i) * matrix.at(m + k, m + 1 + i);
    }
    acc
}

/// Value of element `(m, m + k)`: the real cube root of [`arm_dot`].
///
/// `f64::cbrt` is defined for negative arguments, so the recurrence is total
/// even when the dot product goes negative.
pub fn element<M: MatrixRead + ?Sized>(matrix: &M, m: usize, k: usize) -> f64 {
    arm_dot(matrix, m, k).cbrt()
}
