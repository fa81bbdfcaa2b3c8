//! Demand regression pipeline
//!
//! Standardization followed by gradient-boosted regression trees, fitted
//! and serialized as one unit.

mod boosting;
mod metrics;
mod scaler;
mod tree;

pub use boosting::{GradientBoostingRegressor, ModelParams};
pub use metrics::RegressionMetrics;
pub use scaler::StandardScaler;
pub use tree::{FeatureBins, RegressionTree, TreeLimits, TreeNode};

use crate::error::ModelError;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// A fitted model the predictor can apply
pub trait DemandModel: Send + Sync {
    /// Number of input columns the model was fitted on
    fn n_features(&self) -> usize;

    /// Raw (unclipped) demand for each row of `x`
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError>;
}

/// Scaler + boosted trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandPipeline {
    scaler: StandardScaler,
    regressor: GradientBoostingRegressor,
}

impl DemandPipeline {
    pub fn new(params: ModelParams) -> Self {
        Self {
            scaler: StandardScaler::new(),
            regressor: GradientBoostingRegressor::new(params),
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self, ModelError> {
        let scaled = self.scaler.fit_transform(x)?;
        self.regressor.fit(&scaled, y)?;
        Ok(self)
    }

    pub fn params(&self) -> &ModelParams {
        self.regressor.params()
    }

    pub fn feature_importances(&self) -> &[f64] {
        self.regressor.feature_importances()
    }

    /// True when the scaler and regressor agree on the input width and the
    /// trees only reference existing columns
    pub fn is_consistent(&self) -> bool {
        self.scaler.is_fitted()
            && self.scaler.n_features() == self.regressor.n_features()
            && self.regressor.is_consistent()
    }
}

impl DemandModel for DemandPipeline {
    fn n_features(&self) -> usize {
        self.regressor.n_features()
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let scaled = self.scaler.transform(x)?;
        self.regressor.predict(&scaled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_fit_predict() {
        let x = Array2::from_shape_fn((48, 2), |(i, j)| if j == 0 { (i % 24) as f64 } else { 0.5 });
        let y: Array1<f64> = x.column(0).mapv(|h| 100.0 + 50.0 * h);
        let mut pipeline = DemandPipeline::new(ModelParams {
            n_estimators: 50,
            max_depth: 4,
            ..Default::default()
        });
        pipeline.fit(&x, &y).unwrap();

        assert!(pipeline.is_consistent());
        assert_eq!(DemandModel::n_features(&pipeline), 2);
        let pred = pipeline.predict(&x).unwrap();
        let metrics =
            RegressionMetrics::compute(y.as_slice().unwrap(), pred.as_slice().unwrap()).unwrap();
        assert!(metrics.r2 > 0.95, "r2 = {}", metrics.r2);
    }

    #[test]
    fn test_unfitted_pipeline_is_inconsistent() {
        let pipeline = DemandPipeline::new(ModelParams::default());
        assert!(!pipeline.is_consistent());
        assert!(pipeline.predict(&Array2::zeros((1, 2))).is_err());
    }
}
