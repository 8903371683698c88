use crate::estimate::{HoldoutSplit, LinearFit};
use crate::rank::{Selection, select_top};
use crate::types::{PolicyError, check_columns, design_matrix};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

/// Predicts the first-year average from GPA and LSAT alone and ranks by it.
///
/// Protected attributes never enter the model. Training returns an
/// [`UnawareFit`]; only the fitted value can evaluate applicants.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UnawarePolicy {
    pub split: HoldoutSplit,
}

/// Fitted parameters of the unaware policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnawareFit {
    /// Regression of first-year average on `[gpa, lsat]`.
    pub regression: LinearFit,
    pub training_rows: usize,
    /// R² on the held-out rows. Inspection only.
    pub holdout_r2: Option<f64>,
}

impl UnawarePolicy {
    pub fn new(split: HoldoutSplit) -> Self {
        Self { split }
    }

    pub fn train(
        &self,
        gpa: ArrayView1<f64>,
        lsat: ArrayView1<f64>,
        first_year: ArrayView1<f64>,
    ) -> Result<UnawareFit, PolicyError> {
        let n_rows = check_columns(&[("gpa", gpa.view()), ("lsat", lsat.view()), ("first_year", first_year.view())])?;
        let x = design_matrix(&[gpa.view(), lsat.view()]);

        let mut rng = self.split.rng();
        let held_out = self.split.fit_ols(x.view(), first_year, &mut rng)?;
        let regression = held_out.fit;

        log::info!(
            "Unaware policy fitted on {} of {} rows: first_year = {:.4} + {:.4}*gpa + {:.4}*lsat (hold-out R² {})",
            held_out.training_rows,
            n_rows,
            regression.intercept,
            regression.coefficients[0],
            regression.coefficients[1],
            format_optional(held_out.holdout_r2)
        );

        Ok(UnawareFit {
            regression,
            training_rows: held_out.training_rows,
            holdout_r2: held_out.holdout_r2,
        })
    }
}

impl UnawareFit {
    /// The regression must map exactly `[gpa, lsat]`.
    pub fn validate(&self) -> Result<(), PolicyError> {
        Ok(self.regression.validate(2)?)
    }

    /// Predicted first-year average for every applicant.
    pub fn scores(
        &self,
        gpa: ArrayView1<f64>,
        lsat: ArrayView1<f64>,
    ) -> Result<Array1<f64>, PolicyError> {
        check_columns(&[("gpa", gpa.view()), ("lsat", lsat.view())])?;
        let x = design_matrix(&[gpa.view(), lsat.view()]);
        Ok(self.regression.predict(x.view())?)
    }

    pub fn select(
        &self,
        gpa: ArrayView1<f64>,
        lsat: ArrayView1<f64>,
        nb_seats: usize,
    ) -> Result<Selection, PolicyError> {
        let scores = self.scores(gpa, lsat)?;
        select_top(scores.view(), nb_seats)
    }

    pub fn evaluate(
        &self,
        gpa: ArrayView1<f64>,
        lsat: ArrayView1<f64>,
        nb_seats: usize,
    ) -> Result<Array1<bool>, PolicyError> {
        Ok(self.select(gpa, lsat, nb_seats)?.accepted)
    }
}

pub(crate) fn format_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"))
}
