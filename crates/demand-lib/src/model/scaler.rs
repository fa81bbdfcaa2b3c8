//! Standardization step of the demand pipeline

use crate::error::ModelError;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Z-score scaler: `(x - mean) / std`, fitted per column.
///
/// Uses the population standard deviation; constant columns get a scale of
/// 1.0 so they pass through centred rather than dividing by zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        !self.mean.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self, ModelError> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(ModelError::InvalidData(format!(
                "Cannot fit scaler on a {}x{} matrix",
                x.nrows(),
                x.ncols()
            )));
        }

        let mean = x.mean_axis(Axis(0)).ok_or_else(|| {
            ModelError::InvalidData("Cannot compute column means".to_string())
        })?;
        let std = x.std_axis(Axis(0), 0.0);

        self.mean = mean.to_vec();
        self.scale = std
            .iter()
            .map(|&s| if s == 0.0 || !s.is_finite() { 1.0 } else { s })
            .collect();
        Ok(self)
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        if !self.is_fitted() {
            return Err(ModelError::NotFitted);
        }
        if x.ncols() != self.mean.len() {
            return Err(ModelError::ShapeError {
                expected: format!("{} columns", self.mean.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let mut out = x.clone();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (mean, scale) = (self.mean[j], self.scale[j]);
            column.mapv_inplace(|v| (v - mean) / scale);
        }
        Ok(out)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        self.fit(x)?;
        self.transform(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standardizes_columns() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]];
        let mut scaler = StandardScaler::new();
        let z = scaler.fit_transform(&x).unwrap();

        for column in z.axis_iter(Axis(1)) {
            assert!(column.mean().unwrap().abs() < 1e-12);
            assert!((column.std(0.0) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_constant_column_is_centred_only() {
        let x = array![[5.0, 1.0], [5.0, 2.0]];
        let mut scaler = StandardScaler::new();
        let z = scaler.fit_transform(&x).unwrap();
        assert_eq!(z[[0, 0]], 0.0);
        assert_eq!(z[[1, 0]], 0.0);
    }

    #[test]
    fn test_rejects_wrong_width() {
        let mut scaler = StandardScaler::new();
        scaler.fit(&array![[1.0, 2.0], [3.0, 4.0]]).unwrap();
        let err = scaler.transform(&array![[1.0, 2.0, 3.0]]).unwrap_err();
        assert!(matches!(err, ModelError::ShapeError { .. }));
    }

    #[test]
    fn test_unfitted_transform_fails() {
        let scaler = StandardScaler::new();
        assert!(matches!(
            scaler.transform(&array![[1.0]]),
            Err(ModelError::NotFitted)
        ));
    }
}
