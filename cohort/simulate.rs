//! # Cohort Simulation
//!
//! Draws applicants from the structural causal model
//!
//! ```text
//! A ~ N(0, 1),  R ~ Bernoulli(race_rate),  S ~ Bernoulli(sex_rate)
//! X = intercept_X + w_A·A + w_R·R + w_S·S + σ_X·ε_X     for X in {G, L, F}
//! ```
//!
//! with independent standard normal `ε_X`. The exogenous draws, noise included,
//! are kept on the [`Cohort`], so a counterfactual cohort is an exact
//! intervention on the protected attribute: every other exogenous quantity is
//! held fixed and only the endogenous columns are recomputed.

use super::data::Applicants;
use ndarray::{Array1, Zip};
use rand::distributions::Bernoulli;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("'{name}' must be a probability in [0, 1], got {value}.")]
    InvalidProbability { name: &'static str, value: f64 },

    #[error("The noise scale of '{variable}' must be finite and non-negative, got {value}.")]
    InvalidNoiseScale { variable: &'static str, value: f64 },

    #[error("A cohort needs at least one applicant; 'rows' is 0.")]
    ZeroRows,

    #[error("Failed to read simulation config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse simulation config: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// One linear structural equation `X = intercept + ability·A + race·R + sex·S + noise_sd·ε`.
///
/// An equation listed in a config file must give all five coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructuralEquation {
    pub intercept: f64,
    pub ability: f64,
    pub race: f64,
    pub sex: f64,
    pub noise_sd: f64,
}

impl StructuralEquation {
    pub fn evaluate(&self, ability: f64, race: f64, sex: f64, noise: f64) -> f64 {
        self.intercept + self.ability * ability + self.race * race + self.sex * sex
            + self.noise_sd * noise
    }

    fn column(
        &self,
        ability: &Array1<f64>,
        race: &Array1<f64>,
        sex: &Array1<f64>,
        noise: &Array1<f64>,
    ) -> Array1<f64> {
        Zip::from(ability)
            .and(race)
            .and(sex)
            .and(noise)
            .map_collect(|&a, &r, &s, &e| self.evaluate(a, r, s, e))
    }
}

/// Parameters of a simulated cohort. Every field has a default, so a config
/// file only needs to list what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub rows: usize,
    pub seed: u64,
    /// Probability that `race = 1`.
    pub race_rate: f64,
    /// Probability that `sex = 1`.
    pub sex_rate: f64,
    pub gpa: StructuralEquation,
    pub lsat: StructuralEquation,
    pub first_year: StructuralEquation,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            rows: 2000,
            seed: 42,
            race_rate: 0.3,
            sex_rate: 0.5,
            gpa: StructuralEquation {
                intercept: 3.0,
                ability: 0.3,
                race: 0.25,
                sex: 0.1,
                noise_sd: 0.15,
            },
            lsat: StructuralEquation {
                intercept: 155.0,
                ability: 6.0,
                race: 4.0,
                sex: 1.5,
                noise_sd: 2.5,
            },
            first_year: StructuralEquation {
                intercept: 0.0,
                ability: 0.8,
                race: 0.3,
                sex: 0.1,
                noise_sd: 0.5,
            },
        }
    }
}

impl SimulationConfig {
    /// Reads a TOML config, filling unspecified fields with defaults.
    pub fn load(path: &str) -> Result<Self, SimulationError> {
        let toml_string = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&toml_string)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.rows == 0 {
            return Err(SimulationError::ZeroRows);
        }
        for (name, value) in [("race_rate", self.race_rate), ("sex_rate", self.sex_rate)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SimulationError::InvalidProbability { name, value });
            }
        }
        for (variable, equation) in self.equations() {
            let value = equation.noise_sd;
            if !value.is_finite() || value < 0.0 {
                return Err(SimulationError::InvalidNoiseScale { variable, value });
            }
        }
        Ok(())
    }

    fn equations(&self) -> [(&'static str, &StructuralEquation); 3] {
        [
            ("gpa", &self.gpa),
            ("lsat", &self.lsat),
            ("first_year", &self.first_year),
        ]
    }
}

/// A protected attribute that a counterfactual intervention can flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectedAttribute {
    Race,
    Sex,
}

impl ProtectedAttribute {
    pub const ALL: [ProtectedAttribute; 2] = [ProtectedAttribute::Race, ProtectedAttribute::Sex];

    pub fn as_str(self) -> &'static str {
        match self {
            ProtectedAttribute::Race => "race",
            ProtectedAttribute::Sex => "sex",
        }
    }
}

impl fmt::Display for ProtectedAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A simulated cohort together with the exogenous draws that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Cohort {
    pub config: SimulationConfig,
    pub ability: Array1<f64>,
    pub race: Array1<f64>,
    pub sex: Array1<f64>,
    pub gpa: Array1<f64>,
    pub lsat: Array1<f64>,
    pub first_year: Array1<f64>,
    gpa_noise: Array1<f64>,
    lsat_noise: Array1<f64>,
    first_year_noise: Array1<f64>,
}

/// Simulates `config.rows` applicants from a generator seeded with `config.seed`.
pub fn simulate(config: &SimulationConfig) -> Result<Cohort, SimulationError> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let n = config.rows;

    let ability = standard_normal(&mut rng, n);
    let race = bernoulli(&mut rng, n, "race_rate", config.race_rate)?;
    let sex = bernoulli(&mut rng, n, "sex_rate", config.sex_rate)?;
    let gpa_noise = standard_normal(&mut rng, n);
    let lsat_noise = standard_normal(&mut rng, n);
    let first_year_noise = standard_normal(&mut rng, n);

    let cohort = Cohort::from_exogenous(
        config.clone(),
        ability,
        race,
        sex,
        gpa_noise,
        lsat_noise,
        first_year_noise,
    );
    log::info!(
        "Simulated {} applicants (seed {}): {} with race = 1, {} with sex = 1",
        n,
        config.seed,
        cohort.race.sum(),
        cohort.sex.sum()
    );
    Ok(cohort)
}

fn standard_normal(rng: &mut StdRng, n: usize) -> Array1<f64> {
    (0..n).map(|_| rng.sample::<f64, _>(StandardNormal)).collect()
}

fn bernoulli(
    rng: &mut StdRng,
    n: usize,
    name: &'static str,
    p: f64,
) -> Result<Array1<f64>, SimulationError> {
    let distribution =
        Bernoulli::new(p).map_err(|_| SimulationError::InvalidProbability { name, value: p })?;
    Ok((0..n)
        .map(|_| if rng.sample(distribution) { 1.0 } else { 0.0 })
        .collect())
}

impl Cohort {
    fn from_exogenous(
        config: SimulationConfig,
        ability: Array1<f64>,
        race: Array1<f64>,
        sex: Array1<f64>,
        gpa_noise: Array1<f64>,
        lsat_noise: Array1<f64>,
        first_year_noise: Array1<f64>,
    ) -> Self {
        let gpa = config.gpa.column(&ability, &race, &sex, &gpa_noise);
        let lsat = config.lsat.column(&ability, &race, &sex, &lsat_noise);
        let first_year = config
            .first_year
            .column(&ability, &race, &sex, &first_year_noise);
        Self {
            config,
            ability,
            race,
            sex,
            gpa,
            lsat,
            first_year,
            gpa_noise,
            lsat_noise,
            first_year_noise,
        }
    }

    pub fn len(&self) -> usize {
        self.ability.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ability.is_empty()
    }

    /// The cohort in which `attribute` is flipped for every applicant while
    /// ability and noise stay as drawn.
    pub fn counterfactual(&self, attribute: ProtectedAttribute) -> Cohort {
        let flip = |column: &Array1<f64>| column.mapv(|v| 1.0 - v);
        let (race, sex) = match attribute {
            ProtectedAttribute::Race => (flip(&self.race), self.sex.clone()),
            ProtectedAttribute::Sex => (self.race.clone(), flip(&self.sex)),
        };
        Cohort::from_exogenous(
            self.config.clone(),
            self.ability.clone(),
            race,
            sex,
            self.gpa_noise.clone(),
            self.lsat_noise.clone(),
            self.first_year_noise.clone(),
        )
    }

    /// The observable applicant table, with true ability attached for auditing.
    pub fn applicants(&self) -> Applicants {
        Applicants {
            sample_ids: (1..=self.len()).map(|i| i.to_string()).collect(),
            race: self.race.clone(),
            sex: self.sex.clone(),
            gpa: self.gpa.clone(),
            lsat: self.lsat.clone(),
            first_year: Some(self.first_year.clone()),
            ability: Some(self.ability.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn small_config() -> SimulationConfig {
        SimulationConfig {
            rows: 300,
            seed: 7,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn simulation_is_reproducible_from_the_seed() {
        let first = simulate(&small_config()).unwrap();
        let second = simulate(&small_config()).unwrap();
        assert_eq!(first, second);

        let other = simulate(&SimulationConfig {
            seed: 8,
            ..small_config()
        })
        .unwrap();
        assert_ne!(first.ability, other.ability);
    }

    #[test]
    fn protected_attributes_are_binary() {
        let cohort = simulate(&small_config()).unwrap();
        assert_eq!(cohort.len(), 300);
        assert!(cohort.race.iter().all(|&r| r == 0.0 || r == 1.0));
        assert!(cohort.sex.iter().all(|&s| s == 0.0 || s == 1.0));
        assert!(cohort.race.sum() > 0.0 && cohort.race.sum() < 300.0);
    }

    #[test]
    fn noiseless_equations_are_exact() {
        let mut config = small_config();
        config.gpa = StructuralEquation {
            intercept: 1.0,
            ability: 2.0,
            race: 3.0,
            sex: 4.0,
            noise_sd: 0.0,
        };
        let cohort = simulate(&config).unwrap();
        for row in 0..cohort.len() {
            let expected = 1.0
                + 2.0 * cohort.ability[row]
                + 3.0 * cohort.race[row]
                + 4.0 * cohort.sex[row];
            assert_abs_diff_eq!(cohort.gpa[row], expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn counterfactual_shifts_only_by_the_attribute_effect() {
        let cohort = simulate(&small_config()).unwrap();
        let flipped = cohort.counterfactual(ProtectedAttribute::Race);
        let config = &cohort.config;

        assert_eq!(flipped.ability, cohort.ability);
        assert_eq!(flipped.sex, cohort.sex);
        for row in 0..cohort.len() {
            assert_eq!(flipped.race[row], 1.0 - cohort.race[row]);
            let direction = flipped.race[row] - cohort.race[row];
            assert_abs_diff_eq!(
                flipped.gpa[row] - cohort.gpa[row],
                direction * config.gpa.race,
                epsilon = 1e-9
            );
            assert_abs_diff_eq!(
                flipped.lsat[row] - cohort.lsat[row],
                direction * config.lsat.race,
                epsilon = 1e-9
            );
        }

        let restored = flipped.counterfactual(ProtectedAttribute::Race);
        for row in 0..cohort.len() {
            assert_abs_diff_eq!(restored.first_year[row], cohort.first_year[row], epsilon = 1e-12);
        }
    }

    #[test]
    fn partial_config_files_fall_back_to_defaults() {
        let config: SimulationConfig = toml::from_str(
            "rows = 50\n\n[lsat]\nintercept = 150.0\nability = 5.0\nrace = 0.0\nsex = 0.0\nnoise_sd = 2.0\n",
        )
        .unwrap();
        let defaults = SimulationConfig::default();
        assert_eq!(config.rows, 50);
        assert_eq!(config.seed, defaults.seed);
        assert_eq!(config.gpa, defaults.gpa);
        assert_eq!(config.lsat.race, 0.0);

        let incomplete: Result<SimulationConfig, _> = toml::from_str("[gpa]\nrace = 0.0\n");
        assert!(incomplete.is_err());
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let config = SimulationConfig {
            race_rate: 1.5,
            ..small_config()
        };
        assert!(matches!(
            simulate(&config),
            Err(SimulationError::InvalidProbability { name: "race_rate", .. })
        ));

        let mut config = small_config();
        config.first_year.noise_sd = -1.0;
        assert!(matches!(
            simulate(&config),
            Err(SimulationError::InvalidNoiseScale { variable: "first_year", .. })
        ));

        let config = SimulationConfig {
            rows: 0,
            ..small_config()
        };
        assert!(matches!(simulate(&config), Err(SimulationError::ZeroRows)));
    }
}
