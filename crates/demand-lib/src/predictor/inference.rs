//! Single-observation inference against a loaded bundle

use super::features::{FeatureEngineer, FeatureSchema};
use super::output::{clip_non_negative, PredictionOutcome};
use crate::artifacts::ArtifactBundle;
use crate::error::{ModelError, PredictError};
use crate::model::DemandModel;
use crate::models::RawObservation;
use ndarray::Array2;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Latency above which a single prediction is logged as slow
const MAX_INFERENCE_MS: u128 = 5;

/// Engineer, reindex to `schema`, apply `model`, clip at zero
pub fn predict<M: DemandModel + ?Sized>(
    model: &M,
    schema: &FeatureSchema,
    raw: &RawObservation,
) -> Result<f64, PredictError> {
    let row = FeatureEngineer::engineer_one(raw);
    let values = schema.reindex(&row);
    let x = Array2::from_shape_vec((1, values.len()), values)
        .map_err(|e| ModelError::InvalidData(e.to_string()))?;

    let output = model.predict(&x)?;
    let value = output.first().copied().ok_or(PredictError::EmptyOutput)?;
    Ok(clip_non_negative(value))
}

/// Read-only predictor shared across request handlers
pub struct DemandPredictor {
    bundle: Arc<ArtifactBundle>,
    inference_count: AtomicU64,
    slow_inference_count: AtomicU64,
}

impl DemandPredictor {
    pub fn new(bundle: Arc<ArtifactBundle>) -> Self {
        Self {
            bundle,
            inference_count: AtomicU64::new(0),
            slow_inference_count: AtomicU64::new(0),
        }
    }

    pub fn bundle(&self) -> &ArtifactBundle {
        &self.bundle
    }

    pub fn run_id(&self) -> &str {
        self.bundle.run_id()
    }

    pub fn predict(&self, raw: &RawObservation) -> Result<f64, PredictError> {
        let start = Instant::now();
        let result = predict(self.bundle.pipeline(), self.bundle.feature_schema(), raw);

        let elapsed = start.elapsed();
        self.inference_count.fetch_add(1, Ordering::Relaxed);
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            self.slow_inference_count.fetch_add(1, Ordering::Relaxed);
            warn!(
                elapsed_ms = elapsed.as_millis(),
                "Inference exceeded {}ms target",
                MAX_INFERENCE_MS
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        result
    }

    /// Predict and compare against an observed count when one is given
    pub fn predict_with_actual(
        &self,
        raw: &RawObservation,
        actual: Option<f64>,
    ) -> Result<PredictionOutcome, PredictError> {
        let prediction = self.predict(raw)?;
        Ok(PredictionOutcome::new(prediction, actual))
    }

    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            total_inferences: self.inference_count.load(Ordering::Relaxed),
            slow_inferences: self.slow_inference_count.load(Ordering::Relaxed),
        }
    }

    /// The `n` schema columns with the highest importance, highest first
    pub fn top_features(&self, n: usize) -> Vec<FeatureImportance> {
        let mut ranked: Vec<FeatureImportance> = self
            .bundle
            .feature_schema()
            .columns()
            .iter()
            .zip(self.bundle.pipeline().feature_importances())
            .map(|(name, &importance)| FeatureImportance {
                name: name.clone(),
                importance,
            })
            .collect();
        ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        ranked.truncate(n);
        ranked
    }
}

/// Share of the total split gain credited to one schema column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub name: String,
    pub importance: f64,
}

/// Inference statistics
#[derive(Debug, Clone, Serialize)]
pub struct InferenceStats {
    pub total_inferences: u64,
    pub slow_inferences: u64,
}
