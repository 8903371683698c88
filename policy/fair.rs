//! # Counterfactually Fair Policy
//!
//! Ranks applicants by a latent ability estimate from which the effect of the
//! protected attributes has been removed:
//!
//! 1. GPA and LSAT are each regressed on `[race, sex]` by least squares.
//! 2. The residuals `gpa - ĝpa` and `lsat - l̂sat` form a two-column matrix.
//! 3. A single whitened principal component of that matrix is the latent score.
//! 4. The score is multiplied by `±1` so that it correlates positively with GPA.
//!
//! Step 4 only resolves the sign ambiguity of the principal component; it is a
//! heuristic, not an identification guarantee. Orientation is tied to GPA
//! rather than to LSAT or to the first-year average.

use crate::estimate::stats::pearson;
use crate::estimate::{HoldoutSplit, LinearFit, PcaFit};
use crate::rank::{Selection, select_top};
use crate::types::{PolicyError, PolicyKind, check_columns, design_matrix};
use crate::unaware::format_optional;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Training options of the fair policy. `train` returns the fitted [`FairFit`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FairPolicy {
    pub split: HoldoutSplit,
}

/// Fitted parameters of the fair policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairFit {
    /// Regression of GPA on `[race, sex]`.
    pub gpa_regression: LinearFit,
    /// Regression of LSAT on `[race, sex]`.
    pub lsat_regression: LinearFit,
    /// Whitened single-component decomposition of `[gpa residual, lsat residual]`.
    pub component: PcaFit,
    /// Either `1.0` or `-1.0`.
    pub orientation: f64,
    pub diagnostics: FairDiagnostics,
}

/// Inspection-only statistics gathered while training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairDiagnostics {
    pub training_rows: usize,
    pub gpa_holdout_r2: Option<f64>,
    pub lsat_holdout_r2: Option<f64>,
    /// Share of residual variance captured by the latent component.
    pub explained_variance_ratio: f64,
    /// Correlation between the unoriented latent score and GPA.
    pub gpa_correlation: f64,
}

impl FairPolicy {
    pub fn new(split: HoldoutSplit) -> Self {
        Self { split }
    }

    pub fn train(
        &self,
        race: ArrayView1<f64>,
        sex: ArrayView1<f64>,
        gpa: ArrayView1<f64>,
        lsat: ArrayView1<f64>,
    ) -> Result<FairFit, PolicyError> {
        let n_rows = check_columns(&[
            ("race", race.view()),
            ("sex", sex.view()),
            ("gpa", gpa.view()),
            ("lsat", lsat.view()),
        ])?;
        let protected = design_matrix(&[race.view(), sex.view()]);

        // Both regressions draw their partitions from one generator.
        let mut rng = self.split.rng();
        let gpa_held_out = self.split.fit_ols(protected.view(), gpa, &mut rng)?;
        let lsat_held_out = self.split.fit_ols(protected.view(), lsat, &mut rng)?;

        let residuals = residual_matrix(
            &gpa_held_out.fit,
            &lsat_held_out.fit,
            &protected,
            gpa,
            lsat,
        )?;
        let component = PcaFit::fit(residuals.view(), 1, true)?;
        let latent = component.transform(residuals.view())?.column(0).to_owned();

        let gpa_correlation = pearson(latent.view(), gpa);
        let orientation = if gpa_correlation < 0.0 { -1.0 } else { 1.0 };
        if gpa_correlation.is_nan() {
            log::warn!(
                "Latent score has no defined correlation with GPA; keeping the decomposition's own orientation."
            );
        }

        let diagnostics = FairDiagnostics {
            training_rows: n_rows,
            gpa_holdout_r2: gpa_held_out.holdout_r2,
            lsat_holdout_r2: lsat_held_out.holdout_r2,
            explained_variance_ratio: component.explained_variance_ratio[0],
            gpa_correlation,
        };

        log::info!(
            "Fair policy fitted on {} rows: gpa = {:.4} + {:.4}*race + {:.4}*sex (hold-out R² {}), lsat = {:.4} + {:.4}*race + {:.4}*sex (hold-out R² {})",
            n_rows,
            gpa_held_out.fit.intercept,
            gpa_held_out.fit.coefficients[0],
            gpa_held_out.fit.coefficients[1],
            format_optional(diagnostics.gpa_holdout_r2),
            lsat_held_out.fit.intercept,
            lsat_held_out.fit.coefficients[0],
            lsat_held_out.fit.coefficients[1],
            format_optional(diagnostics.lsat_holdout_r2),
        );
        log::info!(
            "Latent component explains {:.1}% of residual variance; orientation {:+}",
            100.0 * diagnostics.explained_variance_ratio,
            orientation
        );

        Ok(FairFit {
            gpa_regression: gpa_held_out.fit,
            lsat_regression: lsat_held_out.fit,
            component,
            orientation,
            diagnostics,
        })
    }
}

impl FairFit {
    /// Checks that the regressions, the decomposition and the orientation fit
    /// together: both regressions map `[race, sex]`, the decomposition acts on
    /// the two residual columns and the orientation is a sign.
    pub fn validate(&self) -> Result<(), PolicyError> {
        self.gpa_regression.validate(2)?;
        self.lsat_regression.validate(2)?;
        self.component.validate()?;
        if self.component.n_features() != 2 {
            return Err(PolicyError::InvalidParameters {
                policy: PolicyKind::Fair,
                reason: format!(
                    "the latent decomposition spans {} residual columns instead of 2",
                    self.component.n_features()
                ),
            });
        }
        if self.orientation != 1.0 && self.orientation != -1.0 {
            return Err(PolicyError::InvalidParameters {
                policy: PolicyKind::Fair,
                reason: format!("orientation must be 1 or -1, got {}", self.orientation),
            });
        }
        Ok(())
    }

    /// GPA and LSAT with the fitted effect of race and sex removed.
    /// Returns `[n_rows, 2]`.
    pub fn residuals(
        &self,
        race: ArrayView1<f64>,
        sex: ArrayView1<f64>,
        gpa: ArrayView1<f64>,
        lsat: ArrayView1<f64>,
    ) -> Result<Array2<f64>, PolicyError> {
        check_columns(&[
            ("race", race.view()),
            ("sex", sex.view()),
            ("gpa", gpa.view()),
            ("lsat", lsat.view()),
        ])?;
        let protected = design_matrix(&[race.view(), sex.view()]);
        residual_matrix(
            &self.gpa_regression,
            &self.lsat_regression,
            &protected,
            gpa,
            lsat,
        )
    }

    /// Oriented latent ability estimate for every applicant.
    pub fn latent(
        &self,
        race: ArrayView1<f64>,
        sex: ArrayView1<f64>,
        gpa: ArrayView1<f64>,
        lsat: ArrayView1<f64>,
    ) -> Result<Array1<f64>, PolicyError> {
        let residuals = self.residuals(race, sex, gpa, lsat)?;
        let projected = self.component.transform(residuals.view())?;
        Ok(projected.column(0).mapv(|v| v * self.orientation))
    }

    pub fn select(
        &self,
        race: ArrayView1<f64>,
        sex: ArrayView1<f64>,
        gpa: ArrayView1<f64>,
        lsat: ArrayView1<f64>,
        nb_seats: usize,
    ) -> Result<Selection, PolicyError> {
        let scores = self.latent(race, sex, gpa, lsat)?;
        select_top(scores.view(), nb_seats)
    }

    pub fn evaluate(
        &self,
        race: ArrayView1<f64>,
        sex: ArrayView1<f64>,
        gpa: ArrayView1<f64>,
        lsat: ArrayView1<f64>,
        nb_seats: usize,
    ) -> Result<Array1<bool>, PolicyError> {
        Ok(self.select(race, sex, gpa, lsat, nb_seats)?.accepted)
    }
}

fn residual_matrix(
    gpa_regression: &LinearFit,
    lsat_regression: &LinearFit,
    protected: &Array2<f64>,
    gpa: ArrayView1<f64>,
    lsat: ArrayView1<f64>,
) -> Result<Array2<f64>, PolicyError> {
    let gpa_residual = gpa_regression.residuals(protected.view(), gpa)?;
    let lsat_residual = lsat_regression.residuals(protected.view(), lsat)?;
    Ok(design_matrix(&[gpa_residual.view(), lsat_residual.view()]))
}
