//! # Crest Core
//!
//! The data model of the Crest engine. This crate owns the symmetric matrix
//! store that wavefront sweeps run over, and the dependency kernel that every
//! execution strategy evaluates.
//!
//! ## The computation
//!
//! An n×n matrix is seeded on its main diagonal and then filled one
//! anti-diagonal ("generation") at a time. Generation `k` holds the elements
//! `(m, m + k)` for `m < n - k`; each is a function of two length-`k` arms of
//! previously computed values, so elements within a generation are mutually
//! independent while consecutive generations are strictly ordered.
//!
//! ## Modules
//!
//! - [`matrix`]: owned matrix storage, diagonal seeding, symmetric writes,
//!   and the textual result format shared by every strategy.
//! - [`kernel`]: the [`kernel::MatrixRead`] access seam and the arm
//!   dot-product recurrence.

pub mod kernel;
pub mod matrix;

pub use kernel::{arm_dot, element, MatrixRead};
pub use matrix::{Matrix, MatrixError};
