//! Persisted admission policies.
//!
//! A [`PolicyArtifact`] is what `train` writes and `admit` reads: the policy
//! kind plus the fitted parameters that kind needs, serialized as TOML.

use crate::cohort::Applicants;
use crate::estimate::HoldoutSplit;
use crate::fair::{FairFit, FairPolicy};
use crate::naive::NaivePolicy;
use crate::rank::{Selection, select_top};
use crate::types::{PolicyError, PolicyKind};
use crate::unaware::{UnawareFit, UnawarePolicy};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Failed to read or write policy file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML policy file: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to serialize policy to TOML format: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Policy file holds unusable parameters: {0}")]
    InvalidParameters(#[from] PolicyError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyArtifact {
    pub kind: PolicyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unaware: Option<UnawareFit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fair: Option<FairFit>,
}

impl PolicyArtifact {
    pub fn naive() -> Self {
        Self {
            kind: PolicyKind::Naive,
            unaware: None,
            fair: None,
        }
    }

    pub fn from_unaware(fit: UnawareFit) -> Self {
        Self {
            kind: PolicyKind::Unaware,
            unaware: Some(fit),
            fair: None,
        }
    }

    pub fn from_fair(fit: FairFit) -> Self {
        Self {
            kind: PolicyKind::Fair,
            unaware: None,
            fair: Some(fit),
        }
    }

    /// Trains a policy of the given kind on an applicant table.
    pub fn train(
        kind: PolicyKind,
        applicants: &Applicants,
        split: HoldoutSplit,
    ) -> Result<Self, PolicyError> {
        match kind {
            PolicyKind::Naive => Ok(Self::naive()),
            PolicyKind::Unaware => {
                let first_year =
                    applicants
                        .first_year
                        .as_ref()
                        .ok_or(PolicyError::MissingColumn {
                            policy: kind,
                            column: "first_year",
                        })?;
                let fit = UnawarePolicy::new(split).train(
                    applicants.gpa.view(),
                    applicants.lsat.view(),
                    first_year.view(),
                )?;
                Ok(Self::from_unaware(fit))
            }
            PolicyKind::Fair => {
                let fit = FairPolicy::new(split).train(
                    applicants.race.view(),
                    applicants.sex.view(),
                    applicants.gpa.view(),
                    applicants.lsat.view(),
                )?;
                Ok(Self::from_fair(fit))
            }
        }
    }

    /// Policy score for every applicant; higher is better.
    pub fn scores(&self, applicants: &Applicants) -> Result<Array1<f64>, PolicyError> {
        let gpa = applicants.gpa.view();
        let lsat = applicants.lsat.view();
        match self.kind {
            PolicyKind::Naive => NaivePolicy.scores(gpa, lsat),
            PolicyKind::Unaware => self.unaware_fit()?.scores(gpa, lsat),
            PolicyKind::Fair => self.fair_fit()?.latent(
                applicants.race.view(),
                applicants.sex.view(),
                gpa,
                lsat,
            ),
        }
    }

    pub fn select(
        &self,
        applicants: &Applicants,
        nb_seats: usize,
    ) -> Result<Selection, PolicyError> {
        let scores = self.scores(applicants)?;
        select_top(scores.view(), nb_seats)
    }

    pub fn evaluate(
        &self,
        applicants: &Applicants,
        nb_seats: usize,
    ) -> Result<Array1<bool>, PolicyError> {
        Ok(self.select(applicants, nb_seats)?.accepted)
    }

    /// Checks every fitted section that is present. A missing section is
    /// reported as not trained when the artifact is first used.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if let Some(fit) = &self.unaware {
            fit.validate()?;
        }
        if let Some(fit) = &self.fair {
            fit.validate()?;
        }
        Ok(())
    }

    fn unaware_fit(&self) -> Result<&UnawareFit, PolicyError> {
        self.unaware.as_ref().ok_or(PolicyError::NotTrained {
            policy: self.kind,
            missing: "unaware",
        })
    }

    fn fair_fit(&self) -> Result<&FairFit, PolicyError> {
        self.fair.as_ref().ok_or(PolicyError::NotTrained {
            policy: self.kind,
            missing: "fair",
        })
    }

    /// Saves the policy to a human-readable TOML file.
    pub fn save(&self, path: &str) -> Result<(), ArtifactError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Loads a policy saved by [`PolicyArtifact::save`] and checks that its
    /// fitted parameters are consistent.
    pub fn load(path: &str) -> Result<Self, ArtifactError> {
        let toml_string = fs::read_to_string(path)?;
        let artifact: Self = toml::from_str(&toml_string)?;
        artifact.validate()?;
        Ok(artifact)
    }
}
