use super::EstimationError;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use ndarray_linalg::{Eigh, UPLO};
use serde::{Deserialize, Serialize};

/// Components whose variance falls below this floor cannot be whitened.
pub const VARIANCE_FLOOR: f64 = 1.0e-12;

/// A principal-component decomposition fitted on a sample.
///
/// The decomposition is computed from the eigendecomposition of the sample
/// covariance matrix (denominator `n - 1`). Each loading is oriented so that
/// its largest-magnitude entry is positive, which makes the fit deterministic
/// but says nothing about which direction is meaningful for the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaFit {
    /// Column means of the fitting sample.
    pub mean: Array1<f64>,
    /// Shape `[n_components, n_features]`; row `k` is the k-th loading vector.
    pub components: Array2<f64>,
    pub explained_variance: Array1<f64>,
    pub explained_variance_ratio: Array1<f64>,
    pub whiten: bool,
}

impl PcaFit {
    pub fn fit(
        x: ArrayView2<f64>,
        n_components: usize,
        whiten: bool,
    ) -> Result<Self, EstimationError> {
        let (n_rows, n_features) = x.dim();
        if n_rows < 2 {
            return Err(EstimationError::InsufficientRows {
                operation: "principal component analysis",
                found: n_rows,
                required: 2,
            });
        }
        if n_components == 0 || n_components > n_features {
            return Err(EstimationError::InvalidComponentCount {
                requested: n_components,
                available: n_features,
            });
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or(EstimationError::InsufficientRows {
                operation: "principal component analysis",
                found: n_rows,
                required: 2,
            })?;
        let centered = &x - &mean;
        let covariance = centered.t().dot(&centered) / (n_rows as f64 - 1.0);

        // Eigenvalues come back in ascending order.
        let (eigenvalues, eigenvectors) = covariance
            .eigh(UPLO::Lower)
            .map_err(EstimationError::EigendecompositionFailed)?;
        let total_variance: f64 = eigenvalues.iter().map(|&v| v.max(0.0)).sum();

        let mut components = Array2::<f64>::zeros((n_components, n_features));
        let mut explained_variance = Array1::<f64>::zeros(n_components);
        for k in 0..n_components {
            let source = n_features - 1 - k;
            let mut loading = eigenvectors.column(source).to_owned();
            orient_loading(&mut loading);
            components.row_mut(k).assign(&loading);
            explained_variance[k] = eigenvalues[source].max(0.0);
        }

        let explained_variance_ratio = if total_variance > 0.0 {
            &explained_variance / total_variance
        } else {
            Array1::zeros(n_components)
        };

        if whiten {
            check_whitenable(&explained_variance)?;
        }

        log::debug!(
            "Fitted {n_components} principal component(s) on {n_rows} rows; explained variance ratio {:?}",
            explained_variance_ratio.to_vec()
        );

        Ok(Self {
            mean,
            components,
            explained_variance,
            explained_variance_ratio,
            whiten,
        })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Checks that the fitted arrays agree with each other. A fit read back
    /// from disk may have been edited by hand.
    pub fn validate(&self) -> Result<(), EstimationError> {
        let (n_components, n_features) = self.components.dim();
        if n_components == 0 {
            return Err(EstimationError::InconsistentFit(
                "the decomposition has no components".to_string(),
            ));
        }
        if n_features != self.mean.len() {
            return Err(EstimationError::InconsistentFit(format!(
                "components span {n_features} features but the mean has {} entries",
                self.mean.len()
            )));
        }
        for (name, values) in [
            ("explained_variance", &self.explained_variance),
            ("explained_variance_ratio", &self.explained_variance_ratio),
        ] {
            if values.len() != n_components {
                return Err(EstimationError::InconsistentFit(format!(
                    "{name} has {} entries for {n_components} component(s)",
                    values.len()
                )));
            }
        }
        if self.whiten {
            check_whitenable(&self.explained_variance)?;
        }
        Ok(())
    }

    /// Projects `x` onto the fitted components. Returns `[n_rows, n_components]`.
    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, EstimationError> {
        self.validate()?;
        if x.ncols() != self.n_features() {
            return Err(EstimationError::FeatureCountMismatch {
                found: x.ncols(),
                expected: self.n_features(),
            });
        }
        let centered = &x - &self.mean;
        let mut scores = centered.dot(&self.components.t());
        if self.whiten {
            for (mut column, &variance) in scores
                .axis_iter_mut(Axis(1))
                .zip(self.explained_variance.iter())
            {
                column /= variance.sqrt();
            }
        }
        Ok(scores)
    }
}

fn check_whitenable(explained_variance: &Array1<f64>) -> Result<(), EstimationError> {
    for (index, &variance) in explained_variance.iter().enumerate() {
        if variance.is_nan() || variance <= VARIANCE_FLOOR {
            return Err(EstimationError::DegenerateComponent { index, variance });
        }
    }
    Ok(())
}

fn orient_loading(loading: &mut Array1<f64>) {
    let pivot = loading
        .iter()
        .copied()
        .max_by(|a, b| a.abs().total_cmp(&b.abs()))
        .unwrap_or(0.0);
    if pivot < 0.0 {
        loading.mapv_inplace(|v| -v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn sample_variance(values: &Array1<f64>) -> f64 {
        values.var(1.0)
    }

    #[test]
    fn perfectly_correlated_columns_have_one_component() {
        let t = array![-2.0, -1.0, 0.0, 1.0, 2.0, 3.0];
        let mut x = Array2::<f64>::zeros((t.len(), 2));
        x.column_mut(0).assign(&t);
        x.column_mut(1).assign(&t.mapv(|v| 2.0 * v + 1.0));

        let pca = PcaFit::fit(x.view(), 1, true).unwrap();

        assert_abs_diff_eq!(pca.explained_variance_ratio[0], 1.0, epsilon = 1e-9);
        let norm = 5.0_f64.sqrt();
        assert_abs_diff_eq!(pca.components[[0, 0]], 1.0 / norm, epsilon = 1e-9);
        assert_abs_diff_eq!(pca.components[[0, 1]], 2.0 / norm, epsilon = 1e-9);
    }

    #[test]
    fn whitened_scores_have_unit_variance() {
        let x = array![
            [1.0, 0.3],
            [2.0, -0.1],
            [0.5, 0.8],
            [3.0, 1.1],
            [-1.0, -0.4],
            [0.0, 0.2]
        ];
        let pca = PcaFit::fit(x.view(), 2, true).unwrap();
        let scores = pca.transform(x.view()).unwrap();

        for k in 0..2 {
            let column = scores.column(k).to_owned();
            assert_abs_diff_eq!(column.mean().unwrap(), 0.0, epsilon = 1e-9);
            assert_abs_diff_eq!(sample_variance(&column), 1.0, epsilon = 1e-9);
        }
        assert!(pca.explained_variance[0] >= pca.explained_variance[1]);
        assert_abs_diff_eq!(pca.explained_variance_ratio.sum(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn unwhitened_scores_carry_component_variance() {
        let x = array![[1.0, 2.0], [2.0, 1.0], [3.0, 5.0], [4.0, 3.0]];
        let pca = PcaFit::fit(x.view(), 1, false).unwrap();
        let scores = pca.transform(x.view()).unwrap().column(0).to_owned();
        assert_abs_diff_eq!(
            sample_variance(&scores),
            pca.explained_variance[0],
            epsilon = 1e-9
        );
    }

    #[test]
    fn constant_columns_cannot_be_whitened() {
        let x = Array2::<f64>::from_elem((4, 2), 3.0);
        assert!(matches!(
            PcaFit::fit(x.view(), 1, true),
            Err(EstimationError::DegenerateComponent { index: 0, .. })
        ));
        assert!(PcaFit::fit(x.view(), 1, false).is_ok());
    }

    #[test]
    fn rejects_too_few_rows_and_components() {
        let one_row = array![[1.0, 2.0]];
        assert!(matches!(
            PcaFit::fit(one_row.view(), 1, true),
            Err(EstimationError::InsufficientRows { required: 2, .. })
        ));

        let x = array![[1.0, 2.0], [2.0, 1.0], [0.0, 0.5]];
        assert!(matches!(
            PcaFit::fit(x.view(), 3, true),
            Err(EstimationError::InvalidComponentCount {
                requested: 3,
                available: 2
            })
        ));
    }

    #[test]
    fn transform_checks_feature_count() {
        let x = array![[1.0, 2.0], [2.0, 1.0], [0.0, 0.5]];
        let pca = PcaFit::fit(x.view(), 1, false).unwrap();
        let wrong = array![[1.0, 2.0, 3.0]];
        assert!(matches!(
            pca.transform(wrong.view()),
            Err(EstimationError::FeatureCountMismatch {
                found: 3,
                expected: 2
            })
        ));
    }

    #[test]
    fn inconsistent_fits_are_rejected_before_projection() {
        let x = array![[1.0, 2.0], [2.0, 1.0], [0.0, 0.5], [3.0, 2.5]];
        let pca = PcaFit::fit(x.view(), 1, true).unwrap();
        assert!(pca.validate().is_ok());

        let mut wide = pca.clone();
        wide.components = Array2::zeros((1, 3));
        assert!(matches!(wide.validate(), Err(EstimationError::InconsistentFit(_))));
        assert!(matches!(
            wide.transform(x.view()),
            Err(EstimationError::InconsistentFit(_))
        ));

        let mut short = pca.clone();
        short.explained_variance = Array1::zeros(0);
        assert!(matches!(short.transform(x.view()), Err(EstimationError::InconsistentFit(_))));

        let mut flat = pca;
        flat.explained_variance[0] = 0.0;
        assert!(matches!(
            flat.transform(x.view()),
            Err(EstimationError::DegenerateComponent { index: 0, .. })
        ));
    }
}
