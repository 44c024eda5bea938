//! Model evaluation
//!
//! Confusion-matrix-based metrics: percent correct, kappa statistic,
//! weighted precision/recall/F1, plus the textual summary, matrix and
//! per-class breakdown views.

pub mod cross_validation;

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::{Dataset, DatasetLoader};
use crate::error::{ModelyardError, Result};
use crate::registry::{ModelRecord, ModelRegistry};
use crate::schema::AttributeKind;

/// Actual-vs-predicted label counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    labels: Vec<String>,
    /// counts[actual][predicted]
    counts: Vec<Vec<u64>>,
}

impl ConfusionMatrix {
    pub fn new(labels: Vec<String>) -> Self {
        let n = labels.len();
        Self {
            labels,
            counts: vec![vec![0; n]; n],
        }
    }

    pub fn record(&mut self, actual: usize, predicted: usize) {
        self.counts[actual][predicted] += 1;
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> u64 {
        (0..self.labels.len()).map(|i| self.counts[i][i]).sum()
    }

    /// Percent of correctly classified instances.
    pub fn accuracy_pct(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        100.0 * self.correct() as f64 / total as f64
    }

    /// Chance-corrected agreement between actual and predicted labels.
    pub fn kappa(&self) -> f64 {
        let total = self.total() as f64;
        if total == 0.0 {
            return 0.0;
        }
        let po = self.correct() as f64 / total;
        let pe: f64 = (0..self.labels.len())
            .map(|i| {
                let row: u64 = self.counts[i].iter().sum();
                let col: u64 = self.counts.iter().map(|r| r[i]).sum();
                (row as f64 / total) * (col as f64 / total)
            })
            .sum();
        if (1.0 - pe).abs() < f64::EPSILON {
            0.0
        } else {
            (po - pe) / (1.0 - pe)
        }
    }

    fn class_precision(&self, class: usize) -> f64 {
        let predicted: u64 = self.counts.iter().map(|r| r[class]).sum();
        if predicted == 0 {
            0.0
        } else {
            self.counts[class][class] as f64 / predicted as f64
        }
    }

    fn class_recall(&self, class: usize) -> f64 {
        let actual: u64 = self.counts[class].iter().sum();
        if actual == 0 {
            0.0
        } else {
            self.counts[class][class] as f64 / actual as f64
        }
    }

    fn class_f1(&self, class: usize) -> f64 {
        let p = self.class_precision(class);
        let r = self.class_recall(class);
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    fn weighted(&self, metric: impl Fn(usize) -> f64) -> f64 {
        let total = self.total() as f64;
        if total == 0.0 {
            return 0.0;
        }
        (0..self.labels.len())
            .map(|i| {
                let actual: u64 = self.counts[i].iter().sum();
                actual as f64 / total * metric(i)
            })
            .sum()
    }

    pub fn weighted_precision(&self) -> f64 {
        self.weighted(|i| self.class_precision(i))
    }

    pub fn weighted_recall(&self) -> f64 {
        self.weighted(|i| self.class_recall(i))
    }

    pub fn weighted_f1(&self) -> f64 {
        self.weighted(|i| self.class_f1(i))
    }

    pub fn to_summary_string(&self) -> String {
        let total = self.total();
        let correct = self.correct();
        format!(
            "Correctly Classified Instances   {:>6}   {:>8.4} %\n\
             Incorrectly Classified Instances {:>6}   {:>8.4} %\n\
             Kappa statistic                  {:>15.4}\n\
             Total Number of Instances        {:>6}\n",
            correct,
            self.accuracy_pct(),
            total - correct,
            100.0 - self.accuracy_pct(),
            self.kappa(),
            total
        )
    }

    pub fn to_matrix_string(&self) -> String {
        let mut out = String::from("=== Confusion Matrix ===\n\n");
        let tags: Vec<char> = (0..self.labels.len())
            .map(|i| (b'a' + (i % 26) as u8) as char)
            .collect();
        for tag in &tags {
            out.push_str(&format!("{:>6}", tag));
        }
        out.push_str("   <-- classified as\n");
        for (i, row) in self.counts.iter().enumerate() {
            for v in row {
                out.push_str(&format!("{:>6}", v));
            }
            out.push_str(&format!(" |  {} = {}\n", tags[i], self.labels[i]));
        }
        out
    }

    pub fn to_class_details_string(&self) -> String {
        let mut out = String::from("=== Detailed Accuracy By Class ===\n\n");
        out.push_str(&format!(
            "{:<16}{:>10}{:>10}{:>10}\n",
            "Class", "Precision", "Recall", "F1"
        ));
        for (i, label) in self.labels.iter().enumerate() {
            out.push_str(&format!(
                "{:<16}{:>10.4}{:>10.4}{:>10.4}\n",
                label,
                self.class_precision(i),
                self.class_recall(i),
                self.class_f1(i)
            ));
        }
        out.push_str(&format!(
            "{:<16}{:>10.4}{:>10.4}{:>10.4}\n",
            "Weighted Avg.",
            self.weighted_precision(),
            self.weighted_recall(),
            self.weighted_f1()
        ));
        out
    }
}

/// Evaluation metrics plus the human-readable report texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub model_name: String,
    pub accuracy: f64,
    pub kappa: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub summary: String,
    pub confusion_matrix: String,
    pub class_details: String,
}

impl EvaluationReport {
    pub fn from_matrix(model_name: impl Into<String>, matrix: &ConfusionMatrix) -> Self {
        Self {
            model_name: model_name.into(),
            accuracy: matrix.accuracy_pct(),
            kappa: matrix.kappa(),
            precision: matrix.weighted_precision(),
            recall: matrix.weighted_recall(),
            f1_score: matrix.weighted_f1(),
            summary: matrix.to_summary_string(),
            confusion_matrix: matrix.to_matrix_string(),
            class_details: matrix.to_class_details_string(),
        }
    }
}

/// Held-out evaluation of a registered model against a test dataset.
pub struct EvaluationService {
    registry: Arc<ModelRegistry>,
}

impl EvaluationService {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    /// Evaluate `model_name` over every labeled row of `test_source`.
    /// The test dataset's attribute count must agree with the model's
    /// schema; rows are re-aligned to the model schema by value so a
    /// test file with its own categorical orderings still evaluates
    /// correctly.
    pub fn evaluate(&self, model_name: &str, test_source: &Path) -> Result<EvaluationReport> {
        let record = self.registry.get(model_name)?;
        let test = DatasetLoader::load(test_source, None)?;

        if test.n_attributes() != record.schema.len() {
            return Err(ModelyardError::Dataset(format!(
                "test dataset has {} attributes, model '{}' was trained on {}",
                test.n_attributes(),
                model_name,
                record.schema.len()
            )));
        }

        let labels = record.schema.class_labels()?;
        let mut matrix = ConfusionMatrix::new(labels.to_vec());
        let test_class_index = test.schema().class_index();

        for r in 0..test.n_rows() {
            let Some(actual_label) = test.display_value(r, test_class_index) else {
                continue; // unlabeled test row
            };
            let actual = labels.iter().position(|l| *l == actual_label).ok_or_else(|| {
                ModelyardError::Dataset(format!(
                    "test class label '{}' not in model '{}' class domain",
                    actual_label, model_name
                ))
            })?;

            let row = align_row(&test, r, &record)?;
            let dist = record.classifier.predict_distribution(row.view())?;
            let predicted = argmax(dist.as_slice().unwrap_or(&[]));
            matrix.record(actual, predicted);
        }

        if matrix.total() == 0 {
            return Err(ModelyardError::Dataset(
                "test dataset has no labeled rows".to_string(),
            ));
        }

        info!(model = model_name, accuracy = matrix.accuracy_pct(), "evaluation finished");
        Ok(EvaluationReport::from_matrix(model_name, &matrix))
    }
}

/// Map one test row onto the model's training schema by position,
/// translating categorical values through the model's domains.
fn align_row(test: &Dataset, row: usize, record: &ModelRecord) -> Result<ndarray::Array1<f64>> {
    let class_index = record.schema.class_index();
    let mut out = Vec::with_capacity(record.schema.n_features());
    for attr in record.schema.attributes() {
        if attr.index == class_index {
            continue;
        }
        let raw = test.row(row)[attr.index];
        let slot = match &attr.kind {
            AttributeKind::Numeric => {
                if test.schema().attributes()[attr.index].kind.is_numeric() {
                    raw
                } else {
                    test.display_value(row, attr.index)
                        .and_then(|s| s.parse::<f64>().ok())
                        .unwrap_or(f64::NAN)
                }
            }
            AttributeKind::Categorical { domain } => test
                .display_value(row, attr.index)
                .and_then(|s| domain.iter().position(|v| *v == s))
                .map(|i| i as f64)
                .unwrap_or(f64::NAN),
        };
        out.push(slot);
    }
    Ok(ndarray::Array1::from_vec(out))
}

pub(crate) fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}
