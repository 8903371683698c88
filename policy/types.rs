use crate::estimate::EstimationError;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The three admission policies under comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Sum of standardized GPA and LSAT.
    Naive,
    /// Predicted first-year average from GPA and LSAT, ignoring protected attributes.
    Unaware,
    /// Latent ability recovered after removing the effect of race and sex.
    Fair,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 3] = [PolicyKind::Naive, PolicyKind::Unaware, PolicyKind::Fair];

    pub fn as_str(self) -> &'static str {
        match self {
            PolicyKind::Naive => "naive",
            PolicyKind::Unaware => "unaware",
            PolicyKind::Fair => "fair",
        }
    }

    pub fn requires_training(self) -> bool {
        !matches!(self, PolicyKind::Naive)
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while training or evaluating an admission policy.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Column '{column}' has {found} rows, but {expected} were expected.")]
    ShapeMismatch {
        column: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("No applicants were provided.")]
    EmptyInput,

    #[error("The number of seats must be a positive integer, got {0}.")]
    InvalidSeatCount(usize),

    #[error(
        "The {policy} policy has not been trained: the fitted '{missing}' parameters are missing."
    )]
    NotTrained {
        policy: PolicyKind,
        missing: &'static str,
    },

    #[error("The {policy} policy needs the '{column}' column, which the applicant table does not provide.")]
    MissingColumn {
        policy: PolicyKind,
        column: &'static str,
    },

    #[error("The fitted {policy} policy is unusable: {reason}")]
    InvalidParameters { policy: PolicyKind, reason: String },

    #[error("Estimation failed: {0}")]
    Estimation(#[from] EstimationError),
}

/// Checks that every named column has the same, non-zero length.
///
/// Returns the common row count. The first column sets the expected length.
pub fn check_columns(columns: &[(&'static str, ArrayView1<f64>)]) -> Result<usize, PolicyError> {
    let Some((_, first)) = columns.first() else {
        return Err(PolicyError::EmptyInput);
    };
    let expected = first.len();
    for (name, column) in columns.iter().skip(1) {
        if column.len() != expected {
            return Err(PolicyError::ShapeMismatch {
                column: *name,
                expected,
                found: column.len(),
            });
        }
    }
    if expected == 0 {
        return Err(PolicyError::EmptyInput);
    }
    Ok(expected)
}

/// Stacks equally long columns side by side into an `[n_rows, n_columns]` design matrix.
pub(crate) fn design_matrix(columns: &[ArrayView1<f64>]) -> Array2<f64> {
    let n_rows = columns.first().map_or(0, |c| c.len());
    let mut matrix = Array2::<f64>::zeros((n_rows, columns.len()));
    for (mut target, source) in matrix.columns_mut().into_iter().zip(columns.iter()) {
        target.assign(source);
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn matching_columns_report_row_count() {
        let g = array![1.0, 2.0, 3.0];
        let l = array![4.0, 5.0, 6.0];
        assert_eq!(check_columns(&[("gpa", g.view()), ("lsat", l.view())]).unwrap(), 3);
    }

    #[test]
    fn mismatched_column_is_named() {
        let g = array![1.0, 2.0, 3.0];
        let l = array![4.0, 5.0];
        match check_columns(&[("gpa", g.view()), ("lsat", l.view())]) {
            Err(PolicyError::ShapeMismatch {
                column,
                expected,
                found,
            }) => {
                assert_eq!(column, "lsat");
                assert_eq!(expected, 3);
                assert_eq!(found, 2);
            }
            other => panic!("expected ShapeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn empty_columns_are_rejected() {
        let empty = ndarray::Array1::<f64>::zeros(0);
        assert!(matches!(
            check_columns(&[("gpa", empty.view()), ("lsat", empty.view())]),
            Err(PolicyError::EmptyInput)
        ));
        assert!(matches!(check_columns(&[]), Err(PolicyError::EmptyInput)));
    }

    #[test]
    fn design_matrix_keeps_column_order() {
        let a = array![1.0, 2.0];
        let b = array![3.0, 4.0];
        let x = design_matrix(&[a.view(), b.view()]);
        assert_eq!(x, array![[1.0, 3.0], [2.0, 4.0]]);
    }

    #[test]
    fn only_naive_skips_training() {
        assert!(!PolicyKind::Naive.requires_training());
        assert!(PolicyKind::Unaware.requires_training());
        assert!(PolicyKind::Fair.requires_training());
        assert_eq!(PolicyKind::Fair.to_string(), "fair");
    }
}
