//! # Estimation Primitives
//!
//! The small statistical toolkit the trained policies are assembled from:
//! ordinary least squares, a whitened principal-component decomposition, the
//! inspection-only hold-out split and a handful of summary statistics.
//!
//! Everything here operates on `ndarray` views and returns owned, serializable
//! fitted values. Nothing is mutated after fitting.

pub mod ols;
pub mod pca;
pub mod split;
pub mod stats;

pub use ols::{LinearFit, fit_ols};
pub use pca::PcaFit;
pub use split::{HeldOutFit, HoldoutSplit, Partition};

use thiserror::Error;

/// A comprehensive error type for the estimation primitives.
#[derive(Error, Debug)]
pub enum EstimationError {
    #[error("Design matrix has {rows} rows but the target has {targets} values.")]
    RowCountMismatch { rows: usize, targets: usize },

    #[error("Input has {found} feature columns, but the model was fitted on {expected}.")]
    FeatureCountMismatch { found: usize, expected: usize },

    #[error("At least {required} rows are required for {operation}, but only {found} were given.")]
    InsufficientRows {
        operation: &'static str,
        found: usize,
        required: usize,
    },

    #[error("Cannot extract {requested} principal components from {available} feature columns.")]
    InvalidComponentCount { requested: usize, available: usize },

    #[error("Invalid hold-out split: {0}")]
    InvalidSplit(String),

    #[error("Eigendecomposition failed: {0}")]
    EigendecompositionFailed(ndarray_linalg::error::LinalgError),

    #[error(
        "Principal component {index} has variance {variance:.3e} and cannot be whitened. The input columns are constant."
    )]
    DegenerateComponent { index: usize, variance: f64 },

    #[error("Fitted parameters are inconsistent: {0}")]
    InconsistentFit(String),
}
