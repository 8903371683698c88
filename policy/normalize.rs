use ndarray::{Array1, ArrayView1};

/// Standardizes a column to zero mean and unit variance.
///
/// Uses the population standard deviation. A constant column divides by zero
/// and yields NaN scores; callers are expected to pass non-degenerate data.
pub fn normalize(x: ArrayView1<f64>) -> Array1<f64> {
    let mean = x.mean().unwrap_or(f64::NAN);
    let std = x.std(0.0);
    x.mapv(|v| (v - mean) / std)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn standardized_column_has_zero_mean_unit_variance() {
        let x = array![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let z = normalize(x.view());
        assert_abs_diff_eq!(z.mean().unwrap(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(z.std(0.0), 1.0, epsilon = 1e-12);
        // mean 5, population std 2
        assert_abs_diff_eq!(z[0], -1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(z[7], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn constant_column_propagates_nan() {
        let x = array![3.0, 3.0, 3.0];
        assert!(normalize(x.view()).iter().all(|v| v.is_nan()));
    }
}
