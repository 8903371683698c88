//! # Counterfactual Audit
//!
//! Evaluates a policy on a simulated cohort and on the two cohorts obtained by
//! flipping race or sex for every applicant, with ability and noise held fixed.
//! A counterfactually fair policy makes the same decision for an applicant in
//! all three worlds.
//!
//! [`summarize`] reports the factual part of an audit on any applicant table,
//! including one loaded from disk.

use super::data::Applicants;
use super::simulate::{Cohort, ProtectedAttribute};
use crate::artifact::PolicyArtifact;
use crate::estimate::stats::{masked_mean, pearson};
use crate::rank::select_top;
use crate::types::{PolicyError, PolicyKind, check_columns};
use ndarray::{Array1, ArrayView1};

/// What a policy decided on one applicant table.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionSummary {
    pub policy: PolicyKind,
    pub nb_seats: usize,
    pub applicants: usize,
    pub accepted: usize,
    /// Acceptance rate among applicants with `race = 0` and `race = 1`.
    pub acceptance_rate_by_race: [Option<f64>; 2],
    /// Mean true ability of the admitted applicants, when the table carries it.
    pub admitted_mean_ability: Option<f64>,
    /// Correlation between the policy score and true ability, when the table carries it.
    pub score_ability_correlation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditReport {
    pub summary: DecisionSummary,
    /// Fraction of applicants whose decision changes when race is flipped.
    pub race_flip_rate: f64,
    /// Fraction of applicants whose decision changes when sex is flipped.
    pub sex_flip_rate: f64,
}

impl AuditReport {
    pub fn flip_rate(&self, attribute: ProtectedAttribute) -> f64 {
        match attribute {
            ProtectedAttribute::Race => self.race_flip_rate,
            ProtectedAttribute::Sex => self.sex_flip_rate,
        }
    }
}

/// Summarizes the decisions of `policy` on an applicant table.
///
/// `scores` and `accepted` hold one entry per applicant. Ability-based
/// figures are only reported when the table has an `ability` column, which
/// is the case for simulated cohorts.
pub fn summarize(
    policy: PolicyKind,
    applicants: &Applicants,
    scores: ArrayView1<f64>,
    accepted: ArrayView1<bool>,
    nb_seats: usize,
) -> Result<DecisionSummary, PolicyError> {
    let n_rows = check_columns(&[("race", applicants.race.view()), ("score", scores.view())])?;
    if accepted.len() != n_rows {
        return Err(PolicyError::ShapeMismatch {
            column: "admitted",
            expected: n_rows,
            found: accepted.len(),
        });
    }

    let acceptance = accepted.mapv(|a| if a { 1.0 } else { 0.0 });
    let acceptance_rate_by_race = [0.0, 1.0].map(|group| {
        let in_group: Array1<bool> = applicants.race.mapv(|r| r == group);
        masked_mean(acceptance.view(), in_group.view())
    });

    let ability = applicants.ability.as_ref();
    Ok(DecisionSummary {
        policy,
        nb_seats,
        applicants: n_rows,
        accepted: accepted.iter().filter(|&&a| a).count(),
        acceptance_rate_by_race,
        admitted_mean_ability: ability.and_then(|a| masked_mean(a.view(), accepted)),
        score_ability_correlation: ability.map(|a| pearson(scores, a.view())),
    })
}

pub fn audit(
    artifact: &PolicyArtifact,
    cohort: &Cohort,
    nb_seats: usize,
) -> Result<AuditReport, PolicyError> {
    let factual = cohort.applicants();
    let scores = artifact.scores(&factual)?;
    let decisions = select_top(scores.view(), nb_seats)?.accepted;

    let mut flip_rates = [0.0; 2];
    for (rate, attribute) in flip_rates.iter_mut().zip(ProtectedAttribute::ALL) {
        let counterfactual = cohort.counterfactual(attribute).applicants();
        let flipped = artifact.evaluate(&counterfactual, nb_seats)?;
        *rate = flip_rate(decisions.view(), flipped.view());
    }

    let report = AuditReport {
        summary: summarize(
            artifact.kind,
            &factual,
            scores.view(),
            decisions.view(),
            nb_seats,
        )?,
        race_flip_rate: flip_rates[0],
        sex_flip_rate: flip_rates[1],
    };
    log::debug!("Audit of the {} policy: {:?}", artifact.kind, report);
    Ok(report)
}

fn flip_rate(factual: ArrayView1<bool>, counterfactual: ArrayView1<bool>) -> f64 {
    if factual.is_empty() {
        return 0.0;
    }
    let flips = factual
        .iter()
        .zip(counterfactual.iter())
        .filter(|&(a, b)| a != b)
        .count();
    flips as f64 / factual.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort::{SimulationConfig, simulate};
    use crate::estimate::HoldoutSplit;

    fn cohort(rows: usize) -> Cohort {
        simulate(&SimulationConfig {
            rows,
            seed: 11,
            ..SimulationConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn naive_decisions_depend_on_race() {
        let cohort = cohort(600);
        let report = audit(&PolicyArtifact::naive(), &cohort, 120).unwrap();

        assert_eq!(report.summary.applicants, 600);
        assert_eq!(report.summary.accepted, 120);
        assert!(report.race_flip_rate > 0.05);
        let [group0, group1] = report.summary.acceptance_rate_by_race;
        assert!(group1.unwrap() > group0.unwrap());
    }

    #[test]
    fn fair_policy_flips_less_than_naive() {
        let cohort = cohort(2000);
        let fair = PolicyArtifact::train(
            PolicyKind::Fair,
            &cohort.applicants(),
            HoldoutSplit::seeded(0.2, 1),
        )
        .unwrap();

        let fair_report = audit(&fair, &cohort, 400).unwrap();
        let naive_report = audit(&PolicyArtifact::naive(), &cohort, 400).unwrap();

        for attribute in ProtectedAttribute::ALL {
            assert!(fair_report.flip_rate(attribute) < naive_report.flip_rate(attribute));
        }
        assert!(fair_report.race_flip_rate < 0.08);
        assert!(fair_report.summary.score_ability_correlation.unwrap() > 0.8);
        assert!(fair_report.summary.admitted_mean_ability.unwrap() > 0.5);
    }

    #[test]
    fn summary_uses_ability_only_when_present() {
        let mut applicants = Applicants {
            sample_ids: (1..=4).map(|i| i.to_string()).collect(),
            race: ndarray::array![0.0, 1.0, 0.0, 1.0],
            sex: ndarray::array![0.0, 0.0, 1.0, 1.0],
            gpa: ndarray::array![3.0, 3.5, 2.5, 3.8],
            lsat: ndarray::array![150.0, 160.0, 145.0, 170.0],
            first_year: None,
            ability: Some(ndarray::array![0.2, 0.9, -0.4, 1.1]),
        };
        let scores = ndarray::array![1.0, 2.0, 0.0, 3.0];
        let accepted = ndarray::array![false, true, false, true];

        let summary = summarize(
            PolicyKind::Naive,
            &applicants,
            scores.view(),
            accepted.view(),
            2,
        )
        .unwrap();
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.acceptance_rate_by_race, [Some(0.0), Some(1.0)]);
        assert!((summary.admitted_mean_ability.unwrap() - 1.0).abs() < 1e-12);
        assert!(summary.score_ability_correlation.unwrap() > 0.9);

        applicants.ability = None;
        let summary = summarize(
            PolicyKind::Naive,
            &applicants,
            scores.view(),
            accepted.view(),
            2,
        )
        .unwrap();
        assert_eq!(summary.admitted_mean_ability, None);
        assert_eq!(summary.score_ability_correlation, None);

        let short = ndarray::array![true];
        assert!(matches!(
            summarize(PolicyKind::Naive, &applicants, scores.view(), short.view(), 2),
            Err(PolicyError::ShapeMismatch { column: "admitted", .. })
        ));
    }

    #[test]
    fn flip_rate_counts_changed_decisions() {
        let a = ndarray::array![true, false, true, false];
        let b = ndarray::array![true, true, false, false];
        assert_eq!(flip_rate(a.view(), b.view()), 0.5);
    }
}
