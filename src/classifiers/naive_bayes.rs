//! Naive Bayes classifier
//!
//! Gaussian likelihoods for numeric attributes, Laplace-smoothed
//! frequency tables for categorical ones. Missing slots contribute no
//! likelihood term, at training and prediction time alike.

use std::f64::consts::PI;

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{ModelyardError, Result};
use crate::schema::AttributeKind;

const VAR_SMOOTHING: f64 = 1e-9;

/// Per-feature conditional model, indexed by class.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum FeatureModel {
    Gaussian { means: Vec<f64>, variances: Vec<f64> },
    /// probs[class][domain value]
    Table { probs: Vec<Vec<f64>> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NaiveBayes {
    priors: Vec<f64>,
    features: Vec<FeatureModel>,
    n_classes: usize,
}

impl Default for NaiveBayes {
    fn default() -> Self {
        Self::new()
    }
}

impl NaiveBayes {
    pub fn new() -> Self {
        Self {
            priors: Vec::new(),
            features: Vec::new(),
            n_classes: 0,
        }
    }

    pub fn fit(&mut self, data: &Dataset) -> Result<()> {
        let n_classes = data.schema().class_labels()?.len();
        let (x, y) = data.labeled()?;
        self.n_classes = n_classes;

        let mut class_counts = vec![0.0f64; n_classes];
        for &label in &y {
            class_counts[label] += 1.0;
        }
        let n = y.len() as f64;
        self.priors = class_counts.iter().map(|&c| c / n).collect();

        let feature_kinds: Vec<&AttributeKind> =
            data.schema().features().map(|a| &a.kind).collect();

        self.features = feature_kinds
            .iter()
            .enumerate()
            .map(|(j, kind)| match kind {
                AttributeKind::Numeric => {
                    let mut means = vec![0.0; n_classes];
                    let mut variances = vec![0.0; n_classes];
                    for class in 0..n_classes {
                        let values: Vec<f64> = y
                            .iter()
                            .enumerate()
                            .filter(|(_, &label)| label == class)
                            .map(|(i, _)| x[[i, j]])
                            .filter(|v| !v.is_nan())
                            .collect();
                        if values.is_empty() {
                            variances[class] = VAR_SMOOTHING;
                            continue;
                        }
                        let m = values.iter().sum::<f64>() / values.len() as f64;
                        let v = values.iter().map(|&v| (v - m).powi(2)).sum::<f64>()
                            / values.len() as f64;
                        means[class] = m;
                        variances[class] = v + VAR_SMOOTHING;
                    }
                    FeatureModel::Gaussian { means, variances }
                }
                AttributeKind::Categorical { domain } => {
                    let d = domain.len();
                    let mut probs = vec![vec![0.0f64; d]; n_classes];
                    let mut totals = vec![0.0f64; n_classes];
                    for (i, &label) in y.iter().enumerate() {
                        let v = x[[i, j]];
                        if v.is_nan() {
                            continue;
                        }
                        probs[label][v as usize] += 1.0;
                        totals[label] += 1.0;
                    }
                    // Laplace smoothing
                    for class in 0..n_classes {
                        for p in probs[class].iter_mut() {
                            *p = (*p + 1.0) / (totals[class] + d as f64);
                        }
                    }
                    FeatureModel::Table { probs }
                }
            })
            .collect();

        Ok(())
    }

    pub fn predict_distribution(&self, row: ArrayView1<f64>) -> Result<Array1<f64>> {
        if self.features.is_empty() {
            return Err(ModelyardError::Validation(
                "classifier is not fitted".to_string(),
            ));
        }
        if row.len() != self.features.len() {
            return Err(ModelyardError::Validation(format!(
                "feature row has {} slots, model expects {}",
                row.len(),
                self.features.len()
            )));
        }

        let mut log_probs: Vec<f64> = (0..self.n_classes)
            .map(|class| self.priors[class].max(f64::MIN_POSITIVE).ln())
            .collect();

        for (j, model) in self.features.iter().enumerate() {
            let v = row[j];
            if v.is_nan() {
                continue;
            }
            for (class, lp) in log_probs.iter_mut().enumerate() {
                *lp += match model {
                    FeatureModel::Gaussian { means, variances } => {
                        let var = variances[class];
                        -0.5 * ((v - means[class]).powi(2) / var + var.ln() + (2.0 * PI).ln())
                    }
                    FeatureModel::Table { probs } => {
                        // A value outside the training domain falls back to
                        // the smallest smoothed mass in the table
                        let floor = probs[class].iter().cloned().fold(1.0, f64::min);
                        probs[class].get(v as usize).copied().unwrap_or(floor).ln()
                    }
                };
            }
        }

        // Log-sum-exp normalization
        let max = log_probs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let sum: f64 = log_probs.iter().map(|&lp| (lp - max).exp()).sum();
        Ok(Array1::from_iter(
            log_probs.iter().map(|&lp| (lp - max).exp() / sum),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeDescriptor, AttributeSchema};
    use ndarray::array;

    fn mixed_dataset() -> Dataset {
        let schema = AttributeSchema::new(
            "mixed",
            vec![
                AttributeDescriptor::numeric("amount", 0),
                AttributeDescriptor::categorical(
                    "channel",
                    1,
                    vec!["web".into(), "branch".into()],
                ),
                AttributeDescriptor::categorical("fraud", 2, vec!["no".into(), "yes".into()]),
            ],
            None,
        )
        .unwrap();
        let rows = array![
            [10.0, 1.0, 0.0],
            [12.0, 1.0, 0.0],
            [11.0, 0.0, 0.0],
            [14.0, 1.0, 0.0],
            [95.0, 0.0, 1.0],
            [90.0, 0.0, 1.0],
            [105.0, 0.0, 1.0],
            [99.0, 1.0, 1.0],
        ];
        Dataset::new(schema, rows).unwrap()
    }

    #[test]
    fn test_separates_classes() {
        let data = mixed_dataset();
        let mut nb = NaiveBayes::new();
        nb.fit(&data).unwrap();

        let dist = nb.predict_distribution(array![11.0, 1.0].view()).unwrap();
        assert!(dist[0] > dist[1]);
        let dist = nb.predict_distribution(array![100.0, 0.0].view()).unwrap();
        assert!(dist[1] > dist[0]);
    }

    #[test]
    fn test_distribution_sums_to_one() {
        let data = mixed_dataset();
        let mut nb = NaiveBayes::new();
        nb.fit(&data).unwrap();
        let dist = nb.predict_distribution(array![50.0, 0.0].view()).unwrap();
        assert!((dist.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_slots_skipped() {
        let data = mixed_dataset();
        let mut nb = NaiveBayes::new();
        nb.fit(&data).unwrap();
        let dist = nb
            .predict_distribution(array![f64::NAN, f64::NAN].view())
            .unwrap();
        // With everything missing the distribution reduces to the priors
        assert!((dist[0] - 0.5).abs() < 1e-9);
        assert!((dist.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_wrong_row_length_rejected() {
        let data = mixed_dataset();
        let mut nb = NaiveBayes::new();
        nb.fit(&data).unwrap();
        assert!(nb.predict_distribution(array![1.0].view()).is_err());
    }
}
