//! Training pipeline
//!
//! Ties loading, fitting, cross-validation, persistence and registration
//! together. A model is persisted to disk before it is registered, so a
//! registry entry always has a matching artifact pair and a crash between
//! the two steps leaves at worst an unreferenced artifact, never a
//! registered model that cannot be reloaded.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::classifiers::Algorithm;
use crate::dataset::{Dataset, DatasetLoader};
use crate::error::{ModelyardError, Result};
use crate::evaluation::cross_validation::cross_validate;
use crate::registry::{ModelRecord, ModelRegistry};
use crate::schema::{AttributeDescriptor, AttributeSchema};
use crate::storage::ArtifactStore;

/// Seed shared by every stochastic training step, for reproducible runs.
pub const TRAINING_SEED: u64 = 1;

/// Upper bound on cross-validation folds; small datasets use one fold
/// per row instead.
pub const MAX_CV_FOLDS: usize = 10;

pub const DEFAULT_MODEL_NAME: &str = "riskmodel";

/// Result of one training run, including cross-validated quality figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingOutcome {
    pub model_name: String,
    pub algorithm: String,
    pub training_time_ms: u64,
    pub accuracy: f64,
    pub kappa: f64,
    pub n_instances: usize,
    pub n_attributes: usize,
    pub summary: String,
    pub confusion_matrix: String,
}

/// Orchestrates train, persist and register for the model lifecycle.
pub struct TrainingPipeline {
    registry: Arc<ModelRegistry>,
    store: Arc<ArtifactStore>,
}

impl TrainingPipeline {
    pub fn new(registry: Arc<ModelRegistry>, store: Arc<ArtifactStore>) -> Self {
        Self { registry, store }
    }

    /// Train a model from a dataset file and register it under
    /// `model_name`, replacing any existing model of that name. The
    /// quality figures come from stratified cross-validation with
    /// `min(10, labeled rows)` folds.
    pub fn train(
        &self,
        source: &Path,
        algorithm_id: &str,
        model_name: &str,
        class_index: Option<usize>,
    ) -> Result<TrainingOutcome> {
        validate_model_name(model_name)?;
        let algorithm = Algorithm::parse(algorithm_id);
        let data = DatasetLoader::load(source, class_index)?;
        self.train_dataset(&data, algorithm, model_name)
    }

    fn train_dataset(
        &self,
        data: &Dataset,
        algorithm: Algorithm,
        model_name: &str,
    ) -> Result<TrainingOutcome> {
        let started = Instant::now();
        let (_, y) = data.labeled()?;
        if y.len() < 2 {
            return Err(ModelyardError::Validation(format!(
                "training needs at least 2 labeled rows, got {}",
                y.len()
            )));
        }

        let mut classifier = algorithm.build();
        classifier.fit(data)?;

        let folds = y.len().min(MAX_CV_FOLDS);
        let matrix = cross_validate(algorithm, data, folds, TRAINING_SEED)?;

        let record = ModelRecord {
            name: model_name.to_string(),
            algorithm,
            classifier,
            schema: data.schema().clone(),
            trained_at: Utc::now(),
        };

        // Persist and register under one write lock so the registry
        // entry and the on-disk artifact always come from the same
        // training run, and a failed persist mutates nothing.
        self.registry.commit(record, |r| self.store.save(r))?;

        let outcome = TrainingOutcome {
            model_name: model_name.to_string(),
            algorithm: algorithm.id().to_string(),
            training_time_ms: started.elapsed().as_millis() as u64,
            accuracy: matrix.accuracy_pct(),
            kappa: matrix.kappa(),
            n_instances: y.len(),
            n_attributes: data.n_attributes(),
            summary: matrix.to_summary_string(),
            confusion_matrix: matrix.to_matrix_string(),
        };
        info!(
            model = model_name,
            algorithm = algorithm.id(),
            accuracy = outcome.accuracy,
            folds,
            elapsed_ms = outcome.training_time_ms,
            "training finished"
        );
        Ok(outcome)
    }

    /// Load every persisted model into the registry. If the store holds
    /// nothing, a small built-in risk model is trained so the engine
    /// always starts with a usable active model.
    pub fn bootstrap(&self) -> Result<()> {
        let names = self.store.scan()?;
        for name in &names {
            match self.store.load(name) {
                Ok(record) => {
                    self.registry.register(record);
                }
                Err(e) => warn!(model = %name, error = %e, "skipping unreadable model artifact"),
            }
        }

        if self.registry.is_empty() {
            info!("no persisted models found, training default risk model");
            let data = default_risk_dataset()?;
            self.train_dataset(&data, Algorithm::DecisionTree, DEFAULT_MODEL_NAME)?;
        }
        Ok(())
    }

    /// Reload one model from disk into the registry, replacing the
    /// in-memory copy.
    pub fn load_model(&self, name: &str) -> Result<Arc<ModelRecord>> {
        let record = self.store.load(name)?;
        Ok(self.registry.register(record))
    }

    /// Remove a model from the registry and then its artifacts. The
    /// registry's active-model rule is enforced first, so a refused
    /// delete leaves the artifacts untouched.
    pub fn delete_model(&self, name: &str) -> Result<()> {
        self.registry.delete(name)?;
        self.store.delete(name)
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }
}

fn validate_model_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ModelyardError::Validation(
            "model name must not be empty".to_string(),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ModelyardError::Validation(format!(
            "model name '{}' may only contain letters, digits, '-' and '_'",
            name
        )));
    }
    Ok(())
}

/// Built-in credit-risk toy dataset used when the store starts empty.
fn default_risk_dataset() -> Result<Dataset> {
    let schema = AttributeSchema::new(
        "risk",
        vec![
            AttributeDescriptor::numeric("age", 0),
            AttributeDescriptor::numeric("income", 1),
            AttributeDescriptor::numeric("credit_score", 2),
            AttributeDescriptor::categorical(
                "risk",
                3,
                vec!["low".into(), "medium".into(), "high".into()],
            ),
        ],
        None,
    )?;
    let rows = Array2::from_shape_vec(
        (6, 4),
        vec![
            25.0, 30000.0, 650.0, 1.0, // medium
            45.0, 80000.0, 750.0, 0.0, // low
            35.0, 45000.0, 600.0, 2.0, // high
            28.0, 35000.0, 680.0, 1.0, // medium
            52.0, 95000.0, 780.0, 0.0, // low
            30.0, 28000.0, 580.0, 2.0, // high
        ],
    )
    .map_err(|e| ModelyardError::Dataset(e.to_string()))?;
    Dataset::new(schema, rows)
}

/// Deletes a temporary dataset file on drop, covering both the success
/// and every error path of a training run.
pub struct ScopedSource {
    path: PathBuf,
}

impl ScopedSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedSource {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove temporary dataset");
            }
        }
    }
}
