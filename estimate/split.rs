use super::ols::{LinearFit, fit_ols};
use super::stats::r_squared;
use super::EstimationError;
use ndarray::{ArrayView1, ArrayView2, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

pub const DEFAULT_TEST_FRACTION: f64 = 0.33;

/// Random train / hold-out partition used while fitting a regression.
///
/// Only the training rows influence the fitted coefficients. The held-out rows
/// feed an inspection metric that is logged and stored next to the fit but
/// never used at evaluation time. Without a seed the partition is drawn from
/// entropy, and the fitted coefficients vary with it from run to run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldoutSplit {
    pub test_fraction: f64,
    pub seed: Option<u64>,
}

impl Default for HoldoutSplit {
    fn default() -> Self {
        Self {
            test_fraction: DEFAULT_TEST_FRACTION,
            seed: None,
        }
    }
}

/// Row indices of one partition, each list in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl HoldoutSplit {
    pub fn seeded(test_fraction: f64, seed: u64) -> Self {
        Self {
            test_fraction,
            seed: Some(seed),
        }
    }

    /// Uses every row for training.
    pub fn none() -> Self {
        Self {
            test_fraction: 0.0,
            seed: None,
        }
    }

    /// The generator every partition of one training run is drawn from.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    pub fn test_rows(&self, n_rows: usize) -> Result<usize, EstimationError> {
        if !(0.0..1.0).contains(&self.test_fraction) {
            return Err(EstimationError::InvalidSplit(format!(
                "test fraction must lie in [0, 1), got {}",
                self.test_fraction
            )));
        }
        let n_test = (self.test_fraction * n_rows as f64).ceil() as usize;
        if n_test >= n_rows {
            return Err(EstimationError::InvalidSplit(format!(
                "holding out {n_test} of {n_rows} rows leaves nothing to train on"
            )));
        }
        Ok(n_test)
    }

    pub fn partition(
        &self,
        n_rows: usize,
        rng: &mut StdRng,
    ) -> Result<Partition, EstimationError> {
        let n_test = self.test_rows(n_rows)?;
        let mut order: Vec<usize> = (0..n_rows).collect();
        if n_test > 0 {
            order.shuffle(rng);
        }
        let mut test = order[..n_test].to_vec();
        let mut train = order[n_test..].to_vec();
        test.sort_unstable();
        train.sort_unstable();
        Ok(Partition { train, test })
    }
}

/// A regression fitted on the training rows of one partition.
#[derive(Debug, Clone, PartialEq)]
pub struct HeldOutFit {
    pub fit: LinearFit,
    pub training_rows: usize,
    /// R² of the fit on the held-out rows; `None` without a usable hold-out.
    pub holdout_r2: Option<f64>,
}

impl HoldoutSplit {
    /// Partitions the rows, fits `y ~ 1 + X` on the training part and scores
    /// the held-out part.
    pub fn fit_ols(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        rng: &mut StdRng,
    ) -> Result<HeldOutFit, EstimationError> {
        if x.nrows() != y.len() {
            return Err(EstimationError::RowCountMismatch {
                rows: x.nrows(),
                targets: y.len(),
            });
        }
        let partition = self.partition(y.len(), rng)?;
        let x_train = x.select(Axis(0), &partition.train);
        let y_train = y.select(Axis(0), &partition.train);
        let fit = fit_ols(x_train.view(), y_train.view())?;

        let holdout_r2 = if partition.test.is_empty() {
            None
        } else {
            let x_test = x.select(Axis(0), &partition.test);
            let y_test = y.select(Axis(0), &partition.test);
            let predicted = fit.predict(x_test.view())?;
            r_squared(y_test.view(), predicted.view())
        };

        Ok(HeldOutFit {
            fit,
            training_rows: partition.train.len(),
            holdout_r2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_out_the_ceiling_of_the_fraction() {
        let split = HoldoutSplit::seeded(0.33, 7);
        let mut rng = split.rng();
        let partition = split.partition(10, &mut rng).unwrap();

        assert_eq!(partition.test.len(), 4);
        assert_eq!(partition.train.len(), 6);

        let mut all: Vec<usize> = partition
            .train
            .iter()
            .chain(partition.test.iter())
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn seeded_partitions_are_reproducible() {
        let split = HoldoutSplit::seeded(0.33, 2024);
        let first = split.partition(50, &mut split.rng()).unwrap();
        let second = split.partition(50, &mut split.rng()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn zero_fraction_trains_on_everything() {
        let split = HoldoutSplit::none();
        let partition = split.partition(5, &mut split.rng()).unwrap();
        assert!(partition.test.is_empty());
        assert_eq!(partition.train, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn held_out_fit_only_learns_from_training_rows() {
        let x = ndarray::array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = ndarray::array![1.0, 3.0, 5.0, 7.0, 9.0, 11.0];
        let split = HoldoutSplit::seeded(0.33, 3);
        let held_out = split.fit_ols(x.view(), y.view(), &mut split.rng()).unwrap();

        assert_eq!(held_out.training_rows, 4);
        assert!((held_out.fit.coefficients[0] - 2.0).abs() < 1e-9);
        assert!((held_out.holdout_r2.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_fractions_are_rejected() {
        for fraction in [-0.1, 1.0, 1.5, f64::NAN] {
            let split = HoldoutSplit::seeded(fraction, 1);
            assert!(matches!(
                split.partition(10, &mut split.rng()),
                Err(EstimationError::InvalidSplit(_))
            ));
        }
        let split = HoldoutSplit::seeded(0.5, 1);
        assert!(matches!(
            split.partition(1, &mut split.rng()),
            Err(EstimationError::InvalidSplit(_))
        ));
    }
}
