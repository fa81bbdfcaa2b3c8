//! Gradient boosted regression trees (squared-error loss)

use super::tree::{FeatureBins, RegressionTree, TreeLimits};
use crate::error::ModelError;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fixed hyperparameters of the boosted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Shrinkage applied to every tree
    pub learning_rate: f64,
    /// Minimum rows required to split a node
    pub min_samples_split: usize,
    /// Minimum rows in each leaf
    pub min_samples_leaf: usize,
    /// Histogram resolution per feature
    pub max_bins: usize,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            max_depth: 6,
            learning_rate: 0.1,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_bins: 255,
        }
    }
}

impl ModelParams {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.n_estimators == 0 {
            return Err(ModelError::InvalidData("n_estimators must be positive".to_string()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ModelError::InvalidData(format!(
                "learning_rate must be a positive finite number, got {}",
                self.learning_rate
            )));
        }
        if self.min_samples_split < 2 {
            return Err(ModelError::InvalidData("min_samples_split must be at least 2".to_string()));
        }
        Ok(())
    }

    fn limits(&self) -> TreeLimits {
        TreeLimits {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }
}

/// Gradient boosting regressor.
///
/// Starts from the target mean and adds `learning_rate * tree` per round,
/// each tree fitted to the current residuals. No row or column sampling,
/// so a fit is a pure function of its inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    params: ModelParams,
    initial_prediction: f64,
    trees: Vec<RegressionTree>,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl GradientBoostingRegressor {
    pub fn new(params: ModelParams) -> Self {
        Self {
            params,
            initial_prediction: 0.0,
            trees: Vec::new(),
            n_features: 0,
            feature_importances: Vec::new(),
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        self.params.validate()?;

        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(ModelError::InvalidData("Empty training set".to_string()));
        }
        if y.len() != n_samples {
            return Err(ModelError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::InvalidData("Target contains non-finite values".to_string()));
        }

        let bins = FeatureBins::build(x, self.params.max_bins)?;
        let limits = self.params.limits();
        let lr = self.params.learning_rate;

        self.n_features = x.ncols();
        self.initial_prediction = y.mean().unwrap_or(0.0);
        self.trees = Vec::with_capacity(self.params.n_estimators);
        self.feature_importances = vec![0.0; self.n_features];

        let mut predictions = vec![self.initial_prediction; n_samples];
        let mut residuals = vec![0.0; n_samples];

        for round in 0..self.params.n_estimators {
            for (r, (yi, pi)) in residuals.iter_mut().zip(y.iter().zip(predictions.iter())) {
                *r = yi - pi;
            }

            let (tree, fitted, importances) = RegressionTree::fit(&bins, &residuals, limits)?;

            for (p, f) in predictions.iter_mut().zip(fitted.iter()) {
                *p += lr * f;
            }
            for (acc, imp) in self.feature_importances.iter_mut().zip(importances.iter()) {
                *acc += imp;
            }
            self.trees.push(tree);

            if round % 50 == 0 {
                debug!(round, "Boosting round completed");
            }
        }

        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }

        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(ModelError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let lr = self.params.learning_rate;
        let predictions = x
            .axis_iter(Axis(0))
            .map(|row| {
                self.initial_prediction
                    + self
                        .trees
                        .iter()
                        .map(|tree| lr * tree.predict_row(row))
                        .sum::<f64>()
            })
            .collect();
        Ok(predictions)
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Normalized total split gain per feature
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// Structural self-check used after deserialization
    pub fn is_consistent(&self) -> bool {
        self.trees.len() == self.params.n_estimators
            && self.feature_importances.len() == self.n_features
            && self
                .trees
                .iter()
                .all(|t| t.max_feature_index().map_or(true, |i| i < self.n_features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((120, 2), |(i, j)| {
            if j == 0 {
                (i % 24) as f64
            } else {
                (i / 24) as f64
            }
        });
        let y = x
            .axis_iter(Axis(0))
            .map(|r| (if r[0] >= 7.0 && r[0] <= 9.0 { 300.0 } else { 40.0 }) + 10.0 * r[1])
            .collect();
        (x, y)
    }

    fn small_params() -> ModelParams {
        ModelParams {
            n_estimators: 40,
            max_depth: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_params() {
        let params = ModelParams::default();
        assert_eq!(params.n_estimators, 300);
        assert_eq!(params.max_depth, 6);
        assert_eq!(params.learning_rate, 0.1);
    }

    #[test]
    fn test_fit_reduces_error() {
        let (x, y) = regression_data();
        let mut model = GradientBoostingRegressor::new(small_params());
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&x).unwrap();
        let mean = y.mean().unwrap();
        let baseline: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
        let residual: f64 = y.iter().zip(pred.iter()).map(|(a, p)| (a - p).powi(2)).sum();
        assert!(residual < baseline * 0.05, "residual {} baseline {}", residual, baseline);
        assert_eq!(model.n_trees(), 40);
        assert!(model.is_consistent());
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = regression_data();
        let mut a = GradientBoostingRegressor::new(small_params());
        let mut b = GradientBoostingRegressor::new(small_params());
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_importances_sum_to_one() {
        let (x, y) = regression_data();
        let mut model = GradientBoostingRegressor::new(small_params());
        model.fit(&x, &y).unwrap();
        let total: f64 = model.feature_importances().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(model.feature_importances()[0] > model.feature_importances()[1]);
    }

    #[test]
    fn test_predict_rejects_wrong_width() {
        let (x, y) = regression_data();
        let mut model = GradientBoostingRegressor::new(small_params());
        model.fit(&x, &y).unwrap();
        let wide = Array2::zeros((1, 3));
        assert!(matches!(model.predict(&wide), Err(ModelError::ShapeError { .. })));
    }

    #[test]
    fn test_unfitted_predict_fails() {
        let model = GradientBoostingRegressor::new(small_params());
        assert!(matches!(
            model.predict(&Array2::zeros((1, 2))),
            Err(ModelError::NotFitted)
        ));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let (x, y) = regression_data();
        let mut model = GradientBoostingRegressor::new(ModelParams {
            learning_rate: 0.0,
            ..Default::default()
        });
        assert!(model.fit(&x, &y).is_err());
    }
}
