//! Classification algorithms
//!
//! Every algorithm is reached through [`TrainedClassifier`], a tagged
//! variant exposing exactly two operations: `fit` on a dataset and
//! `predict_distribution` on a feature row. Downstream code never
//! branches on concrete classifier types.

pub mod decision_tree;
pub mod naive_bayes;
pub mod random_forest;
pub mod rule_based;
pub mod svm;

pub use decision_tree::DecisionTree;
pub use naive_bayes::NaiveBayes;
pub use random_forest::RandomForest;
pub use rule_based::RuleClassifier;
pub use svm::SvmClassifier;

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dataset::Dataset;
use crate::error::Result;

/// Recognized classification algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    DecisionTree,
    RandomForest,
    Svm,
    NaiveBayes,
    RuleBased,
}

impl Algorithm {
    /// Map an identifier to an algorithm. Unrecognized identifiers fall
    /// back to the decision tree rather than failing; this mirrors the
    /// documented default-fallback policy and is logged so typos are
    /// visible.
    pub fn parse(id: &str) -> Algorithm {
        let normalized: String = id
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match normalized.as_str() {
            "j48" | "decisiontree" | "tree" => Algorithm::DecisionTree,
            "randomforest" | "forest" => Algorithm::RandomForest,
            "smo" | "svm" | "supportvectormachine" => Algorithm::Svm,
            "naivebayes" | "bayes" | "nb" => Algorithm::NaiveBayes,
            "jrip" | "ripper" | "rulebased" | "rules" | "oner" => Algorithm::RuleBased,
            other => {
                warn!(algorithm = other, "unrecognized algorithm id, falling back to decision tree");
                Algorithm::DecisionTree
            }
        }
    }

    /// Canonical identifier used in responses and artifact metadata.
    pub fn id(&self) -> &'static str {
        match self {
            Algorithm::DecisionTree => "decision-tree",
            Algorithm::RandomForest => "random-forest",
            Algorithm::Svm => "svm",
            Algorithm::NaiveBayes => "naive-bayes",
            Algorithm::RuleBased => "rule-based",
        }
    }

    /// Instantiate an untrained classifier with this algorithm's fixed
    /// default hyperparameters.
    pub fn build(&self) -> TrainedClassifier {
        match self {
            Algorithm::DecisionTree => TrainedClassifier::DecisionTree(DecisionTree::new()),
            Algorithm::RandomForest => TrainedClassifier::RandomForest(RandomForest::new()),
            Algorithm::Svm => TrainedClassifier::Svm(SvmClassifier::new()),
            Algorithm::NaiveBayes => TrainedClassifier::NaiveBayes(NaiveBayes::new()),
            Algorithm::RuleBased => TrainedClassifier::RuleBased(RuleClassifier::new()),
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Enum holding trained classifier variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedClassifier {
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
    Svm(SvmClassifier),
    NaiveBayes(NaiveBayes),
    RuleBased(RuleClassifier),
}

impl TrainedClassifier {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            TrainedClassifier::DecisionTree(_) => Algorithm::DecisionTree,
            TrainedClassifier::RandomForest(_) => Algorithm::RandomForest,
            TrainedClassifier::Svm(_) => Algorithm::Svm,
            TrainedClassifier::NaiveBayes(_) => Algorithm::NaiveBayes,
            TrainedClassifier::RuleBased(_) => Algorithm::RuleBased,
        }
    }

    /// Fit on every labeled row of the dataset.
    pub fn fit(&mut self, data: &Dataset) -> Result<()> {
        match self {
            TrainedClassifier::DecisionTree(m) => m.fit(data),
            TrainedClassifier::RandomForest(m) => m.fit(data),
            TrainedClassifier::Svm(m) => m.fit(data),
            TrainedClassifier::NaiveBayes(m) => m.fit(data),
            TrainedClassifier::RuleBased(m) => m.fit(data),
        }
    }

    /// Per-class probability mass for one feature row, aligned with the
    /// class domain of the training schema. Values sum to 1.
    pub fn predict_distribution(&self, row: ArrayView1<f64>) -> Result<Array1<f64>> {
        match self {
            TrainedClassifier::DecisionTree(m) => m.predict_distribution(row),
            TrainedClassifier::RandomForest(m) => m.predict_distribution(row),
            TrainedClassifier::Svm(m) => m.predict_distribution(row),
            TrainedClassifier::NaiveBayes(m) => m.predict_distribution(row),
            TrainedClassifier::RuleBased(m) => m.predict_distribution(row),
        }
    }
}
