//! Random forest classifier
//!
//! Bagged ensemble of decision trees with per-split feature
//! subsampling. The predicted distribution is the average of the member
//! trees' leaf distributions.

use ndarray::{Array1, Array2, ArrayView1};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{ModelyardError, Result};

use super::decision_tree::DecisionTree;

const DEFAULT_N_TREES: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_classes: usize,
    pub n_trees: usize,
    pub seed: u64,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomForest {
    pub fn new() -> Self {
        Self {
            trees: Vec::new(),
            n_classes: 0,
            n_trees: DEFAULT_N_TREES,
            seed: 1,
        }
    }

    pub fn with_n_trees(mut self, n: usize) -> Self {
        self.n_trees = n.max(1);
        self
    }

    pub fn fit(&mut self, data: &Dataset) -> Result<()> {
        let n_classes = data.schema().class_labels()?.len();
        let (x, y) = data.labeled()?;
        self.n_classes = n_classes;

        let n_rows = x.nrows();
        let max_features = ((x.ncols() as f64).sqrt().ceil() as usize).max(1);
        let seed = self.seed;

        self.trees = (0..self.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(t as u64));
                let sample: Vec<usize> = (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect();
                let xb = Array2::from_shape_fn((n_rows, x.ncols()), |(r, c)| x[[sample[r], c]]);
                let yb: Vec<usize> = sample.iter().map(|&i| y[i]).collect();

                let mut tree = DecisionTree::new().with_max_features(max_features);
                tree.fit_arrays(&xb, &yb, n_classes, Some(&mut rng))?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    pub fn predict_distribution(&self, row: ArrayView1<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(ModelyardError::Validation(
                "classifier is not fitted".to_string(),
            ));
        }
        let mut acc = Array1::zeros(self.n_classes);
        for tree in &self.trees {
            acc = acc + tree.predict_distribution(row)?;
        }
        Ok(acc / self.trees.len() as f64)
    }
}
