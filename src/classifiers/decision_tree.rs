//! Decision tree classifier
//!
//! CART-style induction over Gini impurity. Leaves keep per-class
//! counts so a full probability distribution falls out of prediction.
//! Missing values follow the branch that absorbed the larger share of
//! training rows at that split.

use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{ModelyardError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        /// Class frequencies among training rows that reached this leaf
        counts: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        /// Where rows with a missing split value go
        missing_left: bool,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    n_classes: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_depth: Option<usize>,
    /// Features sampled per split; `None` considers all (forest trees
    /// set sqrt(n))
    pub max_features: Option<usize>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            n_classes: 0,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_depth: None,
            max_features: None,
        }
    }

    pub fn with_max_features(mut self, n: usize) -> Self {
        self.max_features = Some(n.max(1));
        self
    }

    pub fn fit(&mut self, data: &Dataset) -> Result<()> {
        let n_classes = data.schema().class_labels()?.len();
        let (x, y) = data.labeled()?;
        self.fit_arrays(&x, &y, n_classes, None)
    }

    /// Core induction on raw arrays; the forest calls this with a
    /// per-tree rng for feature subsampling.
    pub(crate) fn fit_arrays(
        &mut self,
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
        rng: Option<&mut ChaCha8Rng>,
    ) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(ModelyardError::Dataset(format!(
                "feature matrix has {} rows but {} labels",
                x.nrows(),
                y.len()
            )));
        }
        self.n_classes = n_classes;
        let indices: Vec<usize> = (0..x.nrows()).collect();
        let mut rng = rng.cloned();
        self.root = Some(self.build(x, y, &indices, 0, &mut rng));
        Ok(())
    }

    fn build(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        indices: &[usize],
        depth: usize,
        rng: &mut Option<ChaCha8Rng>,
    ) -> TreeNode {
        let counts = self.class_counts(y, indices);
        let stop = indices.len() < self.min_samples_split
            || self.max_depth.is_some_and(|d| depth >= d)
            || counts.iter().filter(|&&c| c > 0.0).count() <= 1;
        if stop {
            return TreeNode::Leaf { counts };
        }

        let Some((feature, threshold)) = self.find_best_split(x, y, indices, rng) else {
            return TreeNode::Leaf { counts };
        };

        let mut left_indices = Vec::new();
        let mut right_indices = Vec::new();
        let mut missing = Vec::new();
        for &i in indices {
            let v = x[[i, feature]];
            if v.is_nan() {
                missing.push(i);
            } else if v <= threshold {
                left_indices.push(i);
            } else {
                right_indices.push(i);
            }
        }
        let missing_left = left_indices.len() >= right_indices.len();
        if missing_left {
            left_indices.extend(missing);
        } else {
            right_indices.extend(missing);
        }

        if left_indices.len() < self.min_samples_leaf
            || right_indices.len() < self.min_samples_leaf
        {
            return TreeNode::Leaf { counts };
        }

        TreeNode::Split {
            feature,
            threshold,
            missing_left,
            left: Box::new(self.build(x, y, &left_indices, depth + 1, rng)),
            right: Box::new(self.build(x, y, &right_indices, depth + 1, rng)),
        }
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        indices: &[usize],
        rng: &mut Option<ChaCha8Rng>,
    ) -> Option<(usize, f64)> {
        let n_features = x.ncols();
        let candidate_features: Vec<usize> = match (self.max_features, rng) {
            (Some(k), Some(rng)) if k < n_features => {
                let mut all: Vec<usize> = (0..n_features).collect();
                all.shuffle(rng);
                all.truncate(k);
                all
            }
            _ => (0..n_features).collect(),
        };

        let parent = gini(&self.class_counts(y, indices));
        let min_leaf = self.min_samples_leaf;
        let n_classes = self.n_classes;

        // Each feature scans its own thresholds independently
        let per_feature: Vec<Option<(usize, f64, f64)>> = candidate_features
            .par_iter()
            .map(|&feature| {
                let mut values: Vec<f64> = indices
                    .iter()
                    .map(|&i| x[[i, feature]])
                    .filter(|v| !v.is_nan())
                    .collect();
                values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                values.dedup();

                let mut best: Option<(usize, f64, f64)> = None;
                for window in values.windows(2) {
                    let threshold = (window[0] + window[1]) / 2.0;
                    let mut left = vec![0.0; n_classes];
                    let mut right = vec![0.0; n_classes];
                    for &i in indices {
                        let v = x[[i, feature]];
                        if v.is_nan() {
                            continue;
                        }
                        if v <= threshold {
                            left[y[i]] += 1.0;
                        } else {
                            right[y[i]] += 1.0;
                        }
                    }
                    let n_left: f64 = left.iter().sum();
                    let n_right: f64 = right.iter().sum();
                    if (n_left as usize) < min_leaf || (n_right as usize) < min_leaf {
                        continue;
                    }
                    let weighted = (n_left * gini(&left) + n_right * gini(&right))
                        / (n_left + n_right);
                    let gain = parent - weighted;
                    if gain > best.map_or(0.0, |(_, _, g)| g) {
                        best = Some((feature, threshold, gain));
                    }
                }
                best
            })
            .collect();

        per_feature
            .into_iter()
            .flatten()
            .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(feature, threshold, _)| (feature, threshold))
    }

    fn class_counts(&self, y: &[usize], indices: &[usize]) -> Vec<f64> {
        let mut counts = vec![0.0; self.n_classes];
        for &i in indices {
            counts[y[i]] += 1.0;
        }
        counts
    }

    pub fn predict_distribution(&self, row: ArrayView1<f64>) -> Result<Array1<f64>> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| ModelyardError::Validation("classifier is not fitted".to_string()))?;
        let mut node = root;
        loop {
            match node {
                TreeNode::Leaf { counts } => {
                    let total: f64 = counts.iter().sum();
                    return Ok(Array1::from_iter(counts.iter().map(|&c| c / total)));
                }
                TreeNode::Split {
                    feature,
                    threshold,
                    missing_left,
                    left,
                    right,
                } => {
                    let v = row[*feature];
                    let go_left = if v.is_nan() { *missing_left } else { v <= *threshold };
                    node = if go_left { left } else { right };
                }
            }
        }
    }
}

fn gini(counts: &[f64]) -> f64 {
    let n: f64 = counts.iter().sum();
    if n == 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|&c| (c / n) * (c / n)).sum::<f64>()
}
