use ndarray::ArrayView1;

/// Pearson correlation of two equally long samples.
///
/// Returns NaN when either sample has zero variance or the lengths differ.
pub fn pearson(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return f64::NAN;
    }
    let (Some(mean_a), Some(mean_b)) = (a.mean(), b.mean()) else {
        return f64::NAN;
    };

    let mut cross = 0.0;
    let mut ss_a = 0.0;
    let mut ss_b = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cross += dx * dy;
        ss_a += dx * dx;
        ss_b += dy * dy;
    }
    cross / (ss_a * ss_b).sqrt()
}

/// Coefficient of determination of `predicted` against `observed`.
///
/// `None` when there are fewer than two observations or the observed values
/// are constant.
pub fn r_squared(observed: ArrayView1<f64>, predicted: ArrayView1<f64>) -> Option<f64> {
    if observed.len() != predicted.len() || observed.len() < 2 {
        return None;
    }
    let mean = observed.mean()?;
    let total: f64 = observed.iter().map(|&y| (y - mean).powi(2)).sum();
    if total <= 0.0 {
        return None;
    }
    let residual: f64 = observed
        .iter()
        .zip(predicted.iter())
        .map(|(&y, &p)| (y - p).powi(2))
        .sum();
    Some(1.0 - residual / total)
}

/// Mean of the entries of `values` selected by `mask`, `None` if nothing is selected.
pub fn masked_mean(values: ArrayView1<f64>, mask: ArrayView1<bool>) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .zip(mask.iter())
        .filter(|&(_, &keep)| keep)
        .fold((0.0, 0usize), |(sum, count), (&v, _)| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn pearson_detects_direction() {
        let a = array![1.0, 2.0, 3.0, 4.0];
        let b = array![2.0, 4.1, 5.9, 8.0];
        let c = array![4.0, 3.0, 2.0, 1.0];
        assert!(pearson(a.view(), b.view()) > 0.99);
        assert_abs_diff_eq!(pearson(a.view(), c.view()), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn pearson_of_constant_is_nan() {
        let a = array![1.0, 1.0, 1.0];
        let b = array![1.0, 2.0, 3.0];
        assert!(pearson(a.view(), b.view()).is_nan());
        assert!(pearson(b.view(), array![1.0].view()).is_nan());
    }

    #[test]
    fn r_squared_of_perfect_fit_is_one() {
        let y = array![1.0, 2.0, 3.0];
        assert_eq!(r_squared(y.view(), y.view()), Some(1.0));
        let flat = array![2.0, 2.0, 2.0];
        assert_eq!(r_squared(y.view(), flat.view()), Some(0.0));
        assert_eq!(r_squared(flat.view(), y.view()), None);
        assert_eq!(r_squared(array![1.0].view(), array![1.0].view()), None);
    }

    #[test]
    fn masked_mean_ignores_rejected_rows() {
        let values = array![1.0, 10.0, 3.0];
        let mask = array![true, false, true];
        assert_eq!(masked_mean(values.view(), mask.view()), Some(2.0));
        let none = array![false, false, false];
        assert_eq!(masked_mean(values.view(), none.view()), None);
    }
}
