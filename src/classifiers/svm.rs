//! Linear support vector machine
//!
//! One-vs-rest linear SVMs trained with stochastic subgradient descent
//! on the hinge loss (Pegasos-style schedule). Features are
//! standardized during fit; missing slots sit at the feature mean,
//! contributing nothing after standardization. Decision margins are
//! turned into a distribution with a softmax.

use ndarray::{Array1, ArrayView1};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{ModelyardError, Result};

const EPOCHS: usize = 100;
const LAMBDA: f64 = 1e-3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmClassifier {
    /// One weight vector per class (one-vs-rest)
    weights: Vec<Vec<f64>>,
    biases: Vec<f64>,
    means: Vec<f64>,
    stds: Vec<f64>,
    n_classes: usize,
    pub seed: u64,
}

impl Default for SvmClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SvmClassifier {
    pub fn new() -> Self {
        Self {
            weights: Vec::new(),
            biases: Vec::new(),
            means: Vec::new(),
            stds: Vec::new(),
            n_classes: 0,
            seed: 1,
        }
    }

    pub fn fit(&mut self, data: &Dataset) -> Result<()> {
        let n_classes = data.schema().class_labels()?.len();
        let (x, y) = data.labeled()?;
        let n_rows = x.nrows();
        let n_features = x.ncols();
        self.n_classes = n_classes;

        // Standardization statistics over non-missing values
        self.means = vec![0.0; n_features];
        self.stds = vec![1.0; n_features];
        for j in 0..n_features {
            let values: Vec<f64> = x.column(j).iter().copied().filter(|v| !v.is_nan()).collect();
            if values.is_empty() {
                continue;
            }
            let m = values.iter().sum::<f64>() / values.len() as f64;
            let var = values.iter().map(|&v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
            self.means[j] = m;
            self.stds[j] = if var > 0.0 { var.sqrt() } else { 1.0 };
        }

        let standardized: Vec<Vec<f64>> = (0..n_rows)
            .map(|i| (0..n_features).map(|j| self.standardize(j, x[[i, j]])).collect())
            .collect();

        self.weights = vec![vec![0.0; n_features]; n_classes];
        self.biases = vec![0.0; n_classes];
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..n_rows).collect();

        for class in 0..n_classes {
            let targets: Vec<f64> = y
                .iter()
                .map(|&label| if label == class { 1.0 } else { -1.0 })
                .collect();
            let w = &mut self.weights[class];
            let b = &mut self.biases[class];
            let mut t = 0usize;
            for _ in 0..EPOCHS {
                order.shuffle(&mut rng);
                for &i in &order {
                    t += 1;
                    let eta = 1.0 / (LAMBDA * t as f64);
                    let row = &standardized[i];
                    let margin = targets[i]
                        * (row.iter().zip(w.iter()).map(|(xi, wi)| xi * wi).sum::<f64>() + *b);
                    for wi in w.iter_mut() {
                        *wi *= 1.0 - eta * LAMBDA;
                    }
                    if margin < 1.0 {
                        for (wi, xi) in w.iter_mut().zip(row.iter()) {
                            *wi += eta * targets[i] * xi;
                        }
                        *b += eta * targets[i];
                    }
                }
            }
        }
        Ok(())
    }

    fn standardize(&self, feature: usize, v: f64) -> f64 {
        if v.is_nan() {
            0.0
        } else {
            (v - self.means[feature]) / self.stds[feature]
        }
    }

    pub fn predict_distribution(&self, row: ArrayView1<f64>) -> Result<Array1<f64>> {
        if self.weights.is_empty() {
            return Err(ModelyardError::Validation(
                "classifier is not fitted".to_string(),
            ));
        }
        if row.len() != self.means.len() {
            return Err(ModelyardError::Validation(format!(
                "feature row has {} slots, model expects {}",
                row.len(),
                self.means.len()
            )));
        }

        let standardized: Vec<f64> = row
            .iter()
            .enumerate()
            .map(|(j, &v)| self.standardize(j, v))
            .collect();

        let scores: Vec<f64> = (0..self.n_classes)
            .map(|class| {
                standardized
                    .iter()
                    .zip(self.weights[class].iter())
                    .map(|(xi, wi)| xi * wi)
                    .sum::<f64>()
                    + self.biases[class]
            })
            .collect();

        // Softmax over margins
        let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let sum: f64 = scores.iter().map(|&s| (s - max).exp()).sum();
        Ok(Array1::from_iter(scores.iter().map(|&s| (s - max).exp() / sum)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeDescriptor, AttributeSchema};
    use ndarray::array;

    fn separable_dataset() -> Dataset {
        let schema = AttributeSchema::new(
            "toy",
            vec![
                AttributeDescriptor::numeric("x", 0),
                AttributeDescriptor::numeric("y", 1),
                AttributeDescriptor::categorical("class", 2, vec!["neg".into(), "pos".into()]),
            ],
            None,
        )
        .unwrap();
        let rows = array![
            [-2.0, -2.0, 0.0],
            [-1.5, -1.0, 0.0],
            [-1.0, -2.5, 0.0],
            [-2.5, -1.5, 0.0],
            [2.0, 2.0, 1.0],
            [1.5, 1.0, 1.0],
            [1.0, 2.5, 1.0],
            [2.5, 1.5, 1.0],
        ];
        Dataset::new(schema, rows).unwrap()
    }

    #[test]
    fn test_separates_classes() {
        let data = separable_dataset();
        let mut svm = SvmClassifier::new();
        svm.fit(&data).unwrap();

        let dist = svm.predict_distribution(array![-2.0, -2.0].view()).unwrap();
        assert!(dist[0] > dist[1]);
        let dist = svm.predict_distribution(array![2.0, 2.0].view()).unwrap();
        assert!(dist[1] > dist[0]);
    }

    #[test]
    fn test_distribution_sums_to_one() {
        let data = separable_dataset();
        let mut svm = SvmClassifier::new();
        svm.fit(&data).unwrap();
        let dist = svm.predict_distribution(array![0.1, -0.2].view()).unwrap();
        assert!((dist.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_slot_neutral() {
        let data = separable_dataset();
        let mut svm = SvmClassifier::new();
        svm.fit(&data).unwrap();
        let dist = svm
            .predict_distribution(array![f64::NAN, f64::NAN].view())
            .unwrap();
        assert!((dist.sum() - 1.0).abs() < 1e-9);
    }
}
