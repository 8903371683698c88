use crate::normalize::normalize;
use crate::rank::{Selection, select_top};
use crate::types::{PolicyError, check_columns};
use ndarray::{Array1, ArrayView1};

/// Ranks applicants by the sum of their standardized GPA and LSAT.
///
/// Needs no training and is usable as soon as it is constructed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NaivePolicy;

impl NaivePolicy {
    pub fn scores(
        &self,
        gpa: ArrayView1<f64>,
        lsat: ArrayView1<f64>,
    ) -> Result<Array1<f64>, PolicyError> {
        check_columns(&[("gpa", gpa.view()), ("lsat", lsat.view())])?;
        Ok(normalize(gpa) + normalize(lsat))
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

    /// Acceptance mask for the `nb_seats` best applicants.
    pub fn evaluate(
        &self,
        gpa: ArrayView1<f64>,
        lsat: ArrayView1<f64>,
        nb_seats: usize,
    ) -> Result<Array1<bool>, PolicyError> {
        Ok(self.select(gpa, lsat, nb_seats)?.accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn accepts_the_two_strongest_of_five() {
        let g = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let l = g.clone();

        let selection = NaivePolicy.select(g.view(), l.view(), 2).unwrap();

        assert_eq!(selection.order, vec![4, 3]);
        assert_eq!(
            NaivePolicy.evaluate(g.view(), l.view(), 2).unwrap(),
            array![false, false, false, true, true]
        );
    }

    #[test]
    fn seat_count_is_clamped_to_applicants() {
        let g = array![3.1, 2.5, 3.9];
        let l = array![160.0, 171.0, 150.0];
        let accepted = NaivePolicy.evaluate(g.view(), l.view(), 7).unwrap();
        assert_eq!(accepted, array![true, true, true]);
    }

    #[test]
    fn scales_are_equalized_before_summing() {
        // Row 0 leads on LSAT by a wide raw margin but trails on GPA by the
        // same number of standard deviations, so rows 0 and 1 tie.
        let g = array![1.0, 3.0, 2.0];
        let l = array![300.0, 100.0, 200.0];
        let scores = NaivePolicy.scores(g.view(), l.view()).unwrap();
        assert!((scores[0] - scores[1]).abs() < 1e-12);
    }

    #[test]
    fn mismatched_columns_fail_before_ranking() {
        let g = array![1.0, 2.0, 3.0];
        let l = array![1.0, 2.0];
        assert!(matches!(
            NaivePolicy.evaluate(g.view(), l.view(), 1),
            Err(PolicyError::ShapeMismatch { column: "lsat", .. })
        ));
    }
}
