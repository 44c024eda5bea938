//! Rule-based classifier
//!
//! Single-attribute rule induction (1R): every feature proposes a rule
//! set mapping its values to the majority class, and the feature with
//! the lowest training error wins. Numeric features are discretized
//! into equal-frequency bins; missing values get a bucket of their own.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{ModelyardError, Result};
use crate::schema::AttributeKind;

const MAX_BINS: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleClassifier {
    feature: usize,
    /// Bin edges for a numeric winning feature; empty for categorical
    thresholds: Vec<f64>,
    /// Class counts per bucket; the last bucket collects missing values
    buckets: Vec<Vec<f64>>,
    /// Class counts over the whole training set, the default rule
    default_counts: Vec<f64>,
    n_classes: usize,
    fitted: bool,
}

impl Default for RuleClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleClassifier {
    pub fn new() -> Self {
        Self {
            feature: 0,
            thresholds: Vec::new(),
            buckets: Vec::new(),
            default_counts: Vec::new(),
            n_classes: 0,
            fitted: false,
        }
    }

    pub fn fit(&mut self, data: &Dataset) -> Result<()> {
        let n_classes = data.schema().class_labels()?.len();
        let (x, y) = data.labeled()?;
        self.n_classes = n_classes;

        self.default_counts = vec![0.0; n_classes];
        for &label in &y {
            self.default_counts[label] += 1.0;
        }

        let kinds: Vec<&AttributeKind> = data.schema().features().map(|a| &a.kind).collect();

        let mut best: Option<(usize, Vec<f64>, Vec<Vec<f64>>, usize)> = None;
        for (j, kind) in kinds.iter().enumerate() {
            let thresholds = match kind {
                AttributeKind::Numeric => numeric_thresholds(&x, j),
                AttributeKind::Categorical { .. } => Vec::new(),
            };
            let n_buckets = match kind {
                AttributeKind::Numeric => thresholds.len() + 2, // bins + missing
                AttributeKind::Categorical { domain } => domain.len() + 1,
            };
            let mut buckets = vec![vec![0.0f64; n_classes]; n_buckets];
            for (i, &label) in y.iter().enumerate() {
                let bucket = bucket_of(x[[i, j]], &thresholds, n_buckets);
                buckets[bucket][label] += 1.0;
            }
            // Training error: rows not matching their bucket's majority class
            let errors: f64 = buckets
                .iter()
                .map(|counts| {
                    let total: f64 = counts.iter().sum();
                    total - counts.iter().cloned().fold(0.0, f64::max)
                })
                .sum();
            let better = match &best {
                None => true,
                Some((_, _, _, best_errors)) => (errors as usize) < *best_errors,
            };
            if better {
                best = Some((j, thresholds, buckets, errors as usize));
            }
        }

        let (feature, thresholds, buckets, _) = best.ok_or_else(|| {
            ModelyardError::Dataset("dataset has no feature attributes".to_string())
        })?;
        self.feature = feature;
        self.thresholds = thresholds;
        self.buckets = buckets;
        self.fitted = true;
        Ok(())
    }

    pub fn predict_distribution(&self, row: ArrayView1<f64>) -> Result<Array1<f64>> {
        if !self.fitted {
            return Err(ModelyardError::Validation(
                "classifier is not fitted".to_string(),
            ));
        }
        let v = row.get(self.feature).copied().unwrap_or(f64::NAN);
        let bucket = bucket_of(v, &self.thresholds, self.buckets.len());
        let counts = &self.buckets[bucket];
        let total: f64 = counts.iter().sum();
        // Empty bucket falls back to the default rule; Laplace smoothing
        // keeps every class reachable either way
        let source = if total > 0.0 { counts } else { &self.default_counts };
        let smoothed: Vec<f64> = source.iter().map(|&c| c + 1.0).collect();
        let sum: f64 = smoothed.iter().sum();
        Ok(Array1::from_iter(smoothed.iter().map(|&c| c / sum)))
    }
}

/// Equal-frequency bin edges over the non-missing values of one column.
fn numeric_thresholds(x: &Array2<f64>, feature: usize) -> Vec<f64> {
    let mut values: Vec<f64> = x
        .column(feature)
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    values.dedup();
    if values.len() < 2 {
        return Vec::new();
    }
    let n_bins = MAX_BINS.min(values.len());
    let mut thresholds = Vec::with_capacity(n_bins - 1);
    for k in 1..n_bins {
        let idx = k * values.len() / n_bins;
        let edge = (values[idx - 1] + values[idx.min(values.len() - 1)]) / 2.0;
        if thresholds.last() != Some(&edge) {
            thresholds.push(edge);
        }
    }
    thresholds
}

/// Bucket index for a value: threshold bins for numeric features, the
/// domain index for categorical ones, the final bucket for missing.
fn bucket_of(v: f64, thresholds: &[f64], n_buckets: usize) -> usize {
    if v.is_nan() {
        return n_buckets - 1;
    }
    if thresholds.is_empty() {
        // Categorical: value is a domain index; out-of-domain joins missing
        let idx = v as usize;
        if idx < n_buckets - 1 {
            idx
        } else {
            n_buckets - 1
        }
    } else {
        thresholds.iter().take_while(|&&t| v > t).count()
    }
}
