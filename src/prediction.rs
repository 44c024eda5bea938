//! Prediction serving
//!
//! Turns name/value feature maps into class predictions against a
//! registered model. Batch prediction is partial-tolerant: a bad item is
//! logged and skipped instead of failing the whole batch.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::evaluation::argmax;
use crate::registry::ModelRegistry;
use crate::vector::{FeatureMap, FeatureVectorBuilder};

/// One classified instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub prediction: String,
    pub confidence: f64,
    pub distribution: HashMap<String, f64>,
    pub model_name: String,
    pub algorithm: String,
}

/// Serves predictions out of the model registry.
pub struct PredictionService {
    registry: Arc<ModelRegistry>,
}

impl PredictionService {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    /// Classify one feature map. `model_name` of `None` uses the active
    /// model. The reported confidence is the winning class's share of
    /// the probability mass.
    pub fn predict(&self, features: &FeatureMap, model_name: Option<&str>) -> Result<Prediction> {
        let record = self.registry.resolve(model_name)?;
        let row = FeatureVectorBuilder::build(features, &record.schema)?;
        let dist = record.classifier.predict_distribution(row.view())?;
        let labels = record.schema.class_labels()?;

        let winner = argmax(dist.as_slice().unwrap_or(&[]));
        let distribution: HashMap<String, f64> = labels
            .iter()
            .cloned()
            .zip(dist.iter().copied())
            .collect();

        debug!(
            model = %record.name,
            prediction = %labels[winner],
            confidence = dist[winner],
            "classified instance"
        );
        Ok(Prediction {
            prediction: labels[winner].clone(),
            confidence: dist[winner],
            distribution,
            model_name: record.name.clone(),
            algorithm: record.algorithm.id().to_string(),
        })
    }

    /// Classify a batch of feature maps against one resolved model.
    /// Items that fail to build or classify are skipped with a warning,
    /// so one malformed instance never sinks the rest.
    pub fn predict_batch(
        &self,
        batch: &[FeatureMap],
        model_name: Option<&str>,
    ) -> Result<Vec<Prediction>> {
        // Resolve once so every item in the batch sees the same model
        // even if the active pointer moves mid-batch.
        let record = self.registry.resolve(model_name)?;
        let labels = record.schema.class_labels()?;

        let mut results = Vec::with_capacity(batch.len());
        for (i, features) in batch.iter().enumerate() {
            let outcome = FeatureVectorBuilder::build(features, &record.schema)
                .and_then(|row| record.classifier.predict_distribution(row.view()));
            match outcome {
                Ok(dist) => {
                    let winner = argmax(dist.as_slice().unwrap_or(&[]));
                    results.push(Prediction {
                        prediction: labels[winner].clone(),
                        confidence: dist[winner],
                        distribution: labels
                            .iter()
                            .cloned()
                            .zip(dist.iter().copied())
                            .collect(),
                        model_name: record.name.clone(),
                        algorithm: record.algorithm.id().to_string(),
                    });
                }
                Err(e) => warn!(item = i, error = %e, "skipping batch item"),
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifiers::Algorithm;
    use crate::dataset::Dataset;
    use crate::error::ModelyardError;
    use crate::registry::ModelRecord;
    use crate::schema::{AttributeDescriptor, AttributeSchema};
    use chrono::Utc;
    use ndarray::array;
    use serde_json::json;

    fn registry_with_model() -> Arc<ModelRegistry> {
        let schema = AttributeSchema::new(
            "toy",
            vec![
                AttributeDescriptor::numeric("x", 0),
                AttributeDescriptor::categorical("label", 1, vec!["neg".into(), "pos".into()]),
            ],
            None,
        )
        .unwrap();
        let data = Dataset::new(
            schema.clone(),
            array![
                [1.0, 0.0],
                [2.0, 0.0],
                [3.0, 0.0],
                [11.0, 1.0],
                [12.0, 1.0],
                [13.0, 1.0]
            ],
        )
        .unwrap();
        let mut classifier = Algorithm::DecisionTree.build();
        classifier.fit(&data).unwrap();

        let registry = Arc::new(ModelRegistry::new());
        registry.register(ModelRecord {
            name: "toy".to_string(),
            algorithm: Algorithm::DecisionTree,
            classifier,
            schema,
            trained_at: Utc::now(),
        });
        registry
    }

    fn features(x: f64) -> FeatureMap {
        let mut map = FeatureMap::new();
        map.insert("x".to_string(), json!(x));
        map
    }

    #[test]
    fn test_predict_uses_active_model() {
        let service = PredictionService::new(registry_with_model());
        let result = service.predict(&features(12.0), None).unwrap();
        assert_eq!(result.prediction, "pos");
        assert_eq!(result.model_name, "toy");
        assert!(result.confidence > 0.5);
        let total: f64 = result.distribution.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_predict_unknown_model_is_not_found() {
        let service = PredictionService::new(registry_with_model());
        assert!(matches!(
            service.predict(&features(1.0), Some("ghost")),
            Err(ModelyardError::NotFound(_))
        ));
    }

    #[test]
    fn test_batch_skips_bad_items() {
        let service = PredictionService::new(registry_with_model());
        let mut bad = FeatureMap::new();
        bad.insert("x".to_string(), json!("not-a-number"));

        let batch = vec![features(1.0), bad, features(12.0)];
        let results = service.predict_batch(&batch, None).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].prediction, "neg");
        assert_eq!(results[1].prediction, "pos");
    }

    #[test]
    fn test_batch_without_active_model_fails() {
        let service = PredictionService::new(Arc::new(ModelRegistry::new()));
        assert!(service.predict_batch(&[features(1.0)], None).is_err());
    }
}
