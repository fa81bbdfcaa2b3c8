//! Prediction post-processing
//!
//! Clips raw model output to physically possible demand and shapes the
//! optional comparison against an observed count.

use serde::{Deserialize, Serialize};

/// Floor of the percentage-error denominator
pub const MIN_ERROR_DENOMINATOR: f64 = 1.0;

/// Demand can never be negative
pub fn clip_non_negative(value: f64) -> f64 {
    value.max(0.0)
}

/// Round half away from zero to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// A served prediction, optionally compared to the observed demand
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutcome {
    pub prediction: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_abs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_pct: Option<f64>,
}

impl PredictionOutcome {
    /// Build the outcome from an already clipped prediction.
    ///
    /// Errors are computed on the unrounded values; every field is rounded
    /// to one decimal afterwards.
    pub fn new(prediction: f64, actual: Option<f64>) -> Self {
        let (error_abs, error_pct) = match actual {
            Some(actual) => {
                let abs = (prediction - actual).abs();
                let pct = abs / actual.max(MIN_ERROR_DENOMINATOR) * 100.0;
                (Some(round1(abs)), Some(round1(pct)))
            }
            None => (None, None),
        };

        Self {
            prediction: round1(prediction),
            actual: actual.map(round1),
            error_abs,
            error_pct,
        }
    }
}
