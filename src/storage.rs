//! Model artifact persistence
//!
//! Each model is stored as two JSON files under the base directory:
//! `<name>.model.json` holding the fitted classifier and metadata, and
//! `<name>.schema.json` holding the training schema. A model only counts
//! as persisted when both halves exist; a lone half is skipped on scan.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classifiers::{Algorithm, TrainedClassifier};
use crate::error::{ModelyardError, Result};
use crate::registry::ModelRecord;
use crate::schema::AttributeSchema;

const MODEL_SUFFIX: &str = ".model.json";
const SCHEMA_SUFFIX: &str = ".schema.json";

#[derive(Serialize, Deserialize)]
struct ModelArtifact {
    name: String,
    algorithm: Algorithm,
    trained_at: DateTime<Utc>,
    classifier: TrainedClassifier,
}

/// Directory-backed store for model/schema artifact pairs.
pub struct ArtifactStore {
    base_dir: PathBuf,
}

impl ArtifactStore {
    /// Open a store rooted at `base_dir`, creating the directory if
    /// needed.
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn model_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(format!("{}{}", name, MODEL_SUFFIX))
    }

    fn schema_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(format!("{}{}", name, SCHEMA_SUFFIX))
    }

    /// Persist both halves of a model. The schema half is written first
    /// so a model file never exists without its schema.
    pub fn save(&self, record: &ModelRecord) -> Result<()> {
        let schema_json = serde_json::to_string_pretty(&record.schema)?;
        fs::write(self.schema_path(&record.name), schema_json).map_err(|e| {
            ModelyardError::Storage(format!("writing schema for '{}': {}", record.name, e))
        })?;

        let artifact = ModelArtifact {
            name: record.name.clone(),
            algorithm: record.algorithm,
            trained_at: record.trained_at,
            classifier: record.classifier.clone(),
        };
        let model_json = serde_json::to_string(&artifact)?;
        fs::write(self.model_path(&record.name), model_json).map_err(|e| {
            ModelyardError::Storage(format!("writing model for '{}': {}", record.name, e))
        })?;

        debug!(model = %record.name, dir = %self.base_dir.display(), "persisted model artifacts");
        Ok(())
    }

    /// Load one model by name. Missing either half is a not-found error.
    pub fn load(&self, name: &str) -> Result<ModelRecord> {
        let model_path = self.model_path(name);
        let schema_path = self.schema_path(name);
        if !model_path.exists() || !schema_path.exists() {
            return Err(ModelyardError::NotFound(format!(
                "no persisted model named '{}'",
                name
            )));
        }

        let schema: AttributeSchema = serde_json::from_str(&fs::read_to_string(schema_path)?)?;
        let artifact: ModelArtifact = serde_json::from_str(&fs::read_to_string(model_path)?)?;

        Ok(ModelRecord {
            name: artifact.name,
            algorithm: artifact.algorithm,
            classifier: artifact.classifier,
            schema,
            trained_at: artifact.trained_at,
        })
    }

    /// Remove both artifact halves. Absent files are not an error.
    pub fn delete(&self, name: &str) -> Result<()> {
        for path in [self.model_path(name), self.schema_path(name)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(ModelyardError::Storage(format!(
                        "removing {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }
        Ok(())
    }

    /// Names of every model with a complete artifact pair on disk.
    /// Unreadable entries and half-written pairs are skipped with a
    /// warning rather than failing the whole scan.
    pub fn scan(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let Some(name) = file_name.strip_suffix(MODEL_SUFFIX) else {
                continue;
            };
            if self.schema_path(name).exists() {
                names.push(name.to_string());
            } else {
                warn!(model = name, "skipping model artifact without schema half");
            }
        }
        names.sort();
        Ok(names)
    }
}
