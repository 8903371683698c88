//! Ordinary least squares with an intercept.
//!
//! The intercept is absorbed by centering the design matrix and the target.
//! The centered normal equations are then solved through a symmetric
//! eigendecomposition of `XᵀX`, keeping only eigenpairs above a relative
//! cutoff. Rank-deficient designs (a protected attribute that never varies,
//! duplicated columns) thus fall back to the minimum-norm solution instead of
//! failing: a constant column gets a zero slope and the intercept becomes the
//! target mean.

use super::EstimationError;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use ndarray_linalg::{Eigh, UPLO};
use serde::{Deserialize, Serialize};

/// Eigenvalues of the centered Gram matrix below this fraction of the largest
/// eigenvalue are treated as zero when forming the pseudo-inverse.
pub const RANK_TOLERANCE: f64 = 1.0e-10;

/// A fitted linear model `ŷ = intercept + X · coefficients`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub intercept: f64,
    pub coefficients: Array1<f64>,
    /// Numerical rank of the centered design matrix.
    pub rank: usize,
}

/// Fits `y ~ 1 + X` by least squares.
pub fn fit_ols(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<LinearFit, EstimationError> {
    let (n_rows, n_features) = x.dim();
    if n_rows != y.len() {
        return Err(EstimationError::RowCountMismatch {
            rows: n_rows,
            targets: y.len(),
        });
    }

    let too_few = || EstimationError::InsufficientRows {
        operation: "least squares",
        found: n_rows,
        required: 1,
    };
    let x_mean = x.mean_axis(Axis(0)).ok_or_else(too_few)?;
    let y_mean = y.mean().ok_or_else(too_few)?;

    if n_features == 0 {
        return Ok(LinearFit {
            intercept: y_mean,
            coefficients: Array1::zeros(0),
            rank: 0,
        });
    }

    let x_centered = &x - &x_mean;
    let y_centered = &y - y_mean;
    let gram = x_centered.t().dot(&x_centered);
    let moment = x_centered.t().dot(&y_centered);

    let (eigenvalues, eigenvectors) = gram
        .eigh(UPLO::Lower)
        .map_err(EstimationError::EigendecompositionFailed)?;

    let largest = eigenvalues.iter().fold(0.0_f64, |acc, &value| acc.max(value));
    let cutoff = largest * RANK_TOLERANCE;

    let mut coefficients = Array1::<f64>::zeros(n_features);
    let mut rank = 0;
    for (j, &lambda) in eigenvalues.iter().enumerate() {
        if lambda <= cutoff || lambda <= 0.0 {
            continue;
        }
        let direction = eigenvectors.column(j);
        let weight = direction.dot(&moment) / lambda;
        coefficients.scaled_add(weight, &direction);
        rank += 1;
    }

    if rank < n_features {
        log::debug!(
            "Least squares design is rank deficient: rank {rank} of {n_features} columns; using the minimum-norm solution."
        );
    }

    let intercept = y_mean - x_mean.dot(&coefficients);
    Ok(LinearFit {
        intercept,
        coefficients,
        rank,
    })
}

impl LinearFit {
    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    /// Checks a fit read back from disk against the number of features it
    /// is meant to be applied to.
    pub fn validate(&self, n_features: usize) -> Result<(), EstimationError> {
        if self.n_features() != n_features {
            return Err(EstimationError::InconsistentFit(format!(
                "expected {n_features} regression coefficients, found {}",
                self.n_features()
            )));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(EstimationError::InconsistentFit(
                "regression parameters must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Predicts `ŷ` for every row of `x`.
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, EstimationError> {
        if x.ncols() != self.n_features() {
            return Err(EstimationError::FeatureCountMismatch {
                found: x.ncols(),
                expected: self.n_features(),
            });
        }
        Ok(x.dot(&self.coefficients) + self.intercept)
    }

    /// Observed minus predicted.
    pub fn residuals(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
    ) -> Result<Array1<f64>, EstimationError> {
        if x.nrows() != y.len() {
            return Err(EstimationError::RowCountMismatch {
                rows: x.nrows(),
                targets: y.len(),
            });
        }
        let predicted = self.predict(x)?;
        Ok(&y - &predicted)
    }
}
