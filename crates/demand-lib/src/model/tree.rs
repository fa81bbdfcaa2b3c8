//! Least-squares regression tree with histogram split search
//!
//! Features are quantised once per boosting fit (`FeatureBins`), so each
//! node only accumulates per-bin counts and sums instead of re-sorting its
//! rows. Thresholds live in the scaled input space, so
//! prediction does not need the bins.

use crate::error::ModelError;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Minimum reduction in squared error for a split to be kept
const MIN_GAIN: f64 = 1e-10;

/// Per-feature split candidates plus the binned training matrix
pub struct FeatureBins {
    thresholds: Vec<Vec<f64>>,
    /// Column-major bin codes: `codes[feature][row]`
    codes: Vec<Vec<u16>>,
    n_rows: usize,
}

impl FeatureBins {
    /// Quantise every column of `x` into at most `max_bins` ordered bins.
    ///
    /// With few distinct values every value gets its own bin; otherwise
    /// distinct values are grouped evenly. Thresholds sit halfway between
    /// the neighbouring distinct values of adjacent bins.
    pub fn build(x: &Array2<f64>, max_bins: usize) -> Result<Self, ModelError> {
        if max_bins < 2 || max_bins > usize::from(u16::MAX) {
            return Err(ModelError::InvalidData(format!(
                "max_bins must be in 2..={}, got {}",
                u16::MAX,
                max_bins
            )));
        }

        let mut thresholds = Vec::with_capacity(x.ncols());
        let mut codes = Vec::with_capacity(x.ncols());

        for column in x.columns() {
            let mut distinct: Vec<f64> = column.iter().copied().collect();
            if distinct.iter().any(|v| !v.is_finite()) {
                return Err(ModelError::InvalidData(
                    "Feature matrix contains non-finite values".to_string(),
                ));
            }
            distinct.sort_by(|a, b| a.total_cmp(b));
            distinct.dedup();

            let cuts = cut_points(&distinct, max_bins);
            let column_codes = column
                .iter()
                .map(|&v| cuts.partition_point(|&t| t < v) as u16)
                .collect();

            thresholds.push(cuts);
            codes.push(column_codes);
        }

        Ok(Self {
            thresholds,
            codes,
            n_rows: x.nrows(),
        })
    }

    pub fn n_features(&self) -> usize {
        self.thresholds.len()
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    fn n_bins(&self, feature: usize) -> usize {
        self.thresholds[feature].len() + 1
    }
}

fn cut_points(distinct: &[f64], max_bins: usize) -> Vec<f64> {
    let n = distinct.len();
    if n < 2 {
        return Vec::new();
    }
    let boundaries: Vec<usize> = if n <= max_bins {
        (1..n).collect()
    } else {
        let mut b: Vec<usize> = (1..max_bins).map(|i| i * n / max_bins).collect();
        b.dedup();
        b
    };
    boundaries
        .into_iter()
        .map(|i| (distinct[i - 1] + distinct[i]) / 2.0)
        .collect()
}

/// Decision tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy)]
pub struct TreeLimits {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

/// Regression tree fitted on binned features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    root: TreeNode,
}

struct SplitCandidate {
    feature: usize,
    bin: usize,
    gain: f64,
}

struct Builder<'a> {
    bins: &'a FeatureBins,
    targets: &'a [f64],
    limits: TreeLimits,
    fitted: Vec<f64>,
    importances: Vec<f64>,
}

impl RegressionTree {
    /// Fit to `targets` (one per row of `bins`).
    ///
    /// Returns the tree, each row's fitted leaf value, and the total gain
    /// contributed by each feature.
    pub fn fit(
        bins: &FeatureBins,
        targets: &[f64],
        limits: TreeLimits,
    ) -> Result<(Self, Vec<f64>, Vec<f64>), ModelError> {
        if targets.len() != bins.n_rows() {
            return Err(ModelError::ShapeError {
                expected: format!("{} targets", bins.n_rows()),
                actual: format!("{} targets", targets.len()),
            });
        }
        if targets.is_empty() {
            return Err(ModelError::InvalidData("Cannot fit a tree on zero rows".to_string()));
        }

        let mut builder = Builder {
            bins,
            targets,
            limits,
            fitted: vec![0.0; targets.len()],
            importances: vec![0.0; bins.n_features()],
        };
        let indices: Vec<usize> = (0..targets.len()).collect();
        let root = builder.grow(indices, 0);

        Ok((Self { root }, builder.fitted, builder.importances))
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }

    /// Largest feature index referenced by any split
    pub fn max_feature_index(&self) -> Option<usize> {
        fn walk(node: &TreeNode) -> Option<usize> {
            match node {
                TreeNode::Leaf { .. } => None,
                TreeNode::Split {
                    feature_idx,
                    left,
                    right,
                    ..
                } => [Some(*feature_idx), walk(left), walk(right)]
                    .into_iter()
                    .flatten()
                    .max(),
            }
        }
        walk(&self.root)
    }
}

impl Builder<'_> {
    fn grow(&mut self, indices: Vec<usize>, depth: usize) -> TreeNode {
        let n = indices.len();
        let sum: f64 = indices.iter().map(|&i| self.targets[i]).sum();

        let can_split = n >= self.limits.min_samples_split
            && n >= 2 * self.limits.min_samples_leaf
            && depth < self.limits.max_depth;

        let best = if can_split {
            self.best_split(&indices, sum)
        } else {
            None
        };

        match best {
            Some(split) => {
                self.importances[split.feature] += split.gain;
                let codes = &self.bins.codes[split.feature];
                let (left, right): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| usize::from(codes[i]) <= split.bin);

                TreeNode::Split {
                    feature_idx: split.feature,
                    threshold: self.bins.thresholds[split.feature][split.bin],
                    left: Box::new(self.grow(left, depth + 1)),
                    right: Box::new(self.grow(right, depth + 1)),
                    n_samples: n,
                }
            }
            None => {
                let value = sum / n as f64;
                for &i in &indices {
                    self.fitted[i] = value;
                }
                TreeNode::Leaf {
                    value,
                    n_samples: n,
                }
            }
        }
    }

    /// Best split over all features; ties keep the lowest feature and bin
    fn best_split(&self, indices: &[usize], sum: f64) -> Option<SplitCandidate> {
        let n = indices.len();
        let min_leaf = self.limits.min_samples_leaf.max(1);
        let parent_score = sum * sum / n as f64;
        let mut best: Option<SplitCandidate> = None;

        for feature in 0..self.bins.n_features() {
            let n_bins = self.bins.n_bins(feature);
            if n_bins < 2 {
                continue;
            }
            let codes = &self.bins.codes[feature];
            let mut counts = vec![0usize; n_bins];
            let mut sums = vec![0.0f64; n_bins];
            for &i in indices {
                let b = usize::from(codes[i]);
                counts[b] += 1;
                sums[b] += self.targets[i];
            }

            let mut left_n = 0usize;
            let mut left_sum = 0.0f64;
            for bin in 0..n_bins - 1 {
                left_n += counts[bin];
                left_sum += sums[bin];
                let right_n = n - left_n;
                if left_n < min_leaf || right_n < min_leaf {
                    continue;
                }
                if counts[bin] == 0 && bin > 0 {
                    // Same partition as the previous bin
                    continue;
                }
                let right_sum = sum - left_sum;
                let gain = left_sum * left_sum / left_n as f64
                    + right_sum * right_sum / right_n as f64
                    - parent_score;

                if gain > MIN_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate { feature, bin, gain });
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn limits(max_depth: usize) -> TreeLimits {
        TreeLimits {
            max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }

    #[test]
    fn test_cut_points_between_distinct_values() {
        assert_eq!(cut_points(&[1.0, 2.0, 4.0], 255), vec![1.5, 3.0]);
        assert!(cut_points(&[7.0], 255).is_empty());
        assert_eq!(cut_points(&(0..10).map(f64::from).collect::<Vec<_>>(), 4).len(), 3);
    }

    #[test]
    fn test_step_function_is_learned_exactly() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = [10.0, 10.0, 10.0, 50.0, 50.0, 50.0];
        let bins = FeatureBins::build(&x, 255).unwrap();
        let (tree, fitted, importances) = RegressionTree::fit(&bins, &y, limits(3)).unwrap();

        assert_eq!(fitted, y.to_vec());
        assert_eq!(tree.depth(), 1);
        assert!(importances[0] > 0.0);
        assert_eq!(tree.predict_row(array![2.4].view()), 10.0);
        assert_eq!(tree.predict_row(array![2.6].view()), 50.0);
    }

    #[test]
    fn test_constant_target_gives_single_leaf() {
        let x = array![[0.0, 1.0], [1.0, 0.0], [2.0, 1.0]];
        let bins = FeatureBins::build(&x, 255).unwrap();
        let (tree, fitted, _) = RegressionTree::fit(&bins, &[3.0, 3.0, 3.0], limits(6)).unwrap();
        assert_eq!(tree.depth(), 0);
        assert_eq!(fitted, vec![3.0, 3.0, 3.0]);
    }

    #[test]
    fn test_depth_limit_is_respected() {
        let x = Array2::from_shape_fn((64, 1), |(i, _)| i as f64);
        let y: Vec<f64> = (0..64).map(|i| (i * i) as f64).collect();
        let bins = FeatureBins::build(&x, 255).unwrap();
        let (tree, _, _) = RegressionTree::fit(&bins, &y, limits(2)).unwrap();
        assert!(tree.depth() <= 2);
    }

    #[test]
    fn test_min_samples_leaf_is_respected() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = [0.0, 0.0, 0.0, 100.0];
        let bins = FeatureBins::build(&x, 255).unwrap();
        let strict = TreeLimits {
            max_depth: 4,
            min_samples_split: 2,
            min_samples_leaf: 2,
        };
        let (tree, _, _) = RegressionTree::fit(&bins, &y, strict).unwrap();
        match tree.root {
            TreeNode::Split { ref left, ref right, .. } => {
                for child in [left, right] {
                    if let TreeNode::Leaf { n_samples, .. } = **child {
                        assert!(n_samples >= 2);
                    }
                }
            }
            TreeNode::Leaf { .. } => panic!("expected a split"),
        }
    }

    #[test]
    fn test_rejects_non_finite_features() {
        let x = array![[0.0], [f64::NAN]];
        assert!(FeatureBins::build(&x, 255).is_err());
    }
}
