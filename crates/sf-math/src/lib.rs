//! Stagefit linear algebra utilities.
//!
//! Matrices are `nalgebra` dense matrices. This crate adds the row-oriented
//! helpers the chain engine needs and maps solver failures to [`MathError`].

pub mod linalg;

pub use linalg::distance::*;
pub use linalg::matrix::*;
pub use linalg::solve::*;
pub use linalg::MathError;
