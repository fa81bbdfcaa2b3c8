//! Held-out evaluation metrics

use serde::{Deserialize, Serialize};

/// Regression metrics over aligned actual/predicted series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
}

impl RegressionMetrics {
    /// `None` when the series are empty or of different lengths.
    ///
    /// R² is reported as 0.0 when the actual series has zero variance.
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Option<Self> {
        let n = actual.len();
        if n == 0 || n != predicted.len() {
            return None;
        }

        let n_f = n as f64;
        let mut abs_sum = 0.0;
        let mut sq_sum = 0.0;
        for (a, p) in actual.iter().zip(predicted.iter()) {
            abs_sum += (a - p).abs();
            sq_sum += (a - p).powi(2);
        }

        let mean = actual.iter().sum::<f64>() / n_f;
        let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
        let r2 = if ss_tot != 0.0 { 1.0 - sq_sum / ss_tot } else { 0.0 };

        Some(Self {
            mae: abs_sum / n_f,
            rmse: (sq_sum / n_f).sqrt(),
            r2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let m = RegressionMetrics::compute(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.r2, 1.0);
    }

    #[test]
    fn test_known_errors() {
        let m = RegressionMetrics::compute(&[0.0, 0.0, 4.0, 4.0], &[1.0, 1.0, 3.0, 3.0]).unwrap();
        assert!((m.mae - 1.0).abs() < 1e-12);
        assert!((m.rmse - 1.0).abs() < 1e-12);
        // ss_tot = 16, ss_res = 4
        assert!((m.r2 - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_empty_or_mismatched() {
        assert!(RegressionMetrics::compute(&[], &[]).is_none());
        assert!(RegressionMetrics::compute(&[1.0], &[1.0, 2.0]).is_none());
    }

    #[test]
    fn test_constant_actuals_give_zero_r2() {
        let m = RegressionMetrics::compute(&[5.0, 5.0], &[4.0, 6.0]).unwrap();
        assert_eq!(m.r2, 0.0);
    }
}
