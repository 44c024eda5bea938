//! In-memory model registry
//!
//! Holds every trained model by name together with a single active
//! pointer. All reads and writes go through a `parking_lot` RwLock, and
//! records are handed out as `Arc`s so prediction keeps no lock held
//! while a classifier runs.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classifiers::{Algorithm, TrainedClassifier};
use crate::error::{ModelyardError, Result};
use crate::schema::AttributeSchema;

/// A trained model with the schema it was fitted against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRecord {
    pub name: String,
    pub algorithm: Algorithm,
    pub classifier: TrainedClassifier,
    pub schema: AttributeSchema,
    pub trained_at: DateTime<Utc>,
}

/// Listing entry describing one registered model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSummary {
    pub name: String,
    pub algorithm: String,
    pub schema: AttributeSchema,
    pub class_attribute: String,
    pub trained_at: DateTime<Utc>,
    pub active: bool,
}

#[derive(Default)]
struct RegistryState {
    models: HashMap<String, Arc<ModelRecord>>,
    active: Option<String>,
}

/// Thread-safe name-to-model map with one active model pointer.
#[derive(Default)]
pub struct ModelRegistry {
    state: RwLock<RegistryState>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a model. The first model registered becomes the
    /// active one; replacing an existing name keeps the active pointer
    /// where it was.
    pub fn register(&self, record: ModelRecord) -> Arc<ModelRecord> {
        let mut state = self.state.write();
        Self::insert(&mut state, record)
    }

    /// Persist and register as one exclusive step. The write lock is
    /// held across `persist`, so two concurrent retrains of the same
    /// name cannot interleave their disk writes and registry inserts;
    /// whichever commit runs last owns both the artifact and the entry.
    /// A failed persist leaves the registry untouched.
    pub fn commit<F>(&self, record: ModelRecord, persist: F) -> Result<Arc<ModelRecord>>
    where
        F: FnOnce(&ModelRecord) -> Result<()>,
    {
        let mut state = self.state.write();
        persist(&record)?;
        Ok(Self::insert(&mut state, record))
    }

    fn insert(state: &mut RegistryState, record: ModelRecord) -> Arc<ModelRecord> {
        let record = Arc::new(record);
        if state.active.is_none() {
            state.active = Some(record.name.clone());
            info!(model = %record.name, "registered as active model");
        } else {
            info!(model = %record.name, "registered model");
        }
        state.models.insert(record.name.clone(), Arc::clone(&record));
        record
    }

    /// Point the active marker at an existing model.
    pub fn activate(&self, name: &str) -> Result<()> {
        let mut state = self.state.write();
        if !state.models.contains_key(name) {
            return Err(ModelyardError::NotFound(format!("model '{}' not found", name)));
        }
        state.active = Some(name.to_string());
        info!(model = name, "activated model");
        Ok(())
    }

    /// Remove a model. Deleting the active model is refused while any
    /// other model exists; deleting the last model clears the active
    /// pointer.
    pub fn delete(&self, name: &str) -> Result<()> {
        let mut state = self.state.write();
        if !state.models.contains_key(name) {
            return Err(ModelyardError::NotFound(format!("model '{}' not found", name)));
        }
        if state.active.as_deref() == Some(name) && state.models.len() > 1 {
            return Err(ModelyardError::Conflict(format!(
                "model '{}' is active; activate another model before deleting it",
                name
            )));
        }
        state.models.remove(name);
        if state.active.as_deref() == Some(name) {
            state.active = None;
        }
        info!(model = name, "deleted model");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<ModelRecord>> {
        self.state
            .read()
            .models
            .get(name)
            .cloned()
            .ok_or_else(|| ModelyardError::NotFound(format!("model '{}' not found", name)))
    }

    /// Resolve an optional name: `Some` looks it up, `None` returns the
    /// active model.
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<ModelRecord>> {
        match name {
            Some(name) => self.get(name),
            None => {
                let state = self.state.read();
                let active = state.active.as_deref().ok_or_else(|| {
                    ModelyardError::NotFound("no active model is set".to_string())
                })?;
                state
                    .models
                    .get(active)
                    .cloned()
                    .ok_or_else(|| ModelyardError::NotFound(format!("model '{}' not found", active)))
            }
        }
    }

    pub fn active_name(&self) -> Option<String> {
        self.state.read().active.clone()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state.read().models.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().models.is_empty()
    }

    /// Summaries of every model, sorted by name for stable listings.
    pub fn list(&self) -> Vec<ModelSummary> {
        let state = self.state.read();
        let mut summaries: Vec<ModelSummary> = state
            .models
            .values()
            .map(|record| ModelSummary {
                name: record.name.clone(),
                algorithm: record.algorithm.id().to_string(),
                schema: record.schema.clone(),
                class_attribute: record.schema.class_attribute().name.clone(),
                trained_at: record.trained_at,
                active: state.active.as_deref() == Some(record.name.as_str()),
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }
}
