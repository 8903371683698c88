use crate::types::PolicyError;
use ndarray::{Array1, ArrayView1};

/// The outcome of selecting the best-scoring applicants.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Accepted row indices, best score first.
    pub order: Vec<usize>,
    /// Acceptance mask with one entry per applicant.
    pub accepted: Array1<bool>,
}

impl Selection {
    pub fn n_accepted(&self) -> usize {
        self.order.len()
    }
}

/// Accepts the `min(nb_seats, n)` highest-scoring rows.
///
/// Rows are ordered by a stable descending sort, so among equal scores the
/// earlier row is preferred.
pub fn select_top(scores: ArrayView1<f64>, nb_seats: usize) -> Result<Selection, PolicyError> {
    if nb_seats == 0 {
        return Err(PolicyError::InvalidSeatCount(nb_seats));
    }
    let ranking = rank_descending(scores);
    let admitted = nb_seats.min(ranking.len());
    let order = ranking[..admitted].to_vec();

    let mut accepted = Array1::from_elem(scores.len(), false);
    for &row in &order {
        accepted[row] = true;
    }
    Ok(Selection { order, accepted })
}

/// All row indices, best score first.
pub fn rank_descending(scores: ArrayView1<f64>) -> Vec<usize> {
    let mut ranking: Vec<usize> = (0..scores.len()).collect();
    ranking.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    ranking
}
