//! Modelyard - classifier lifecycle engine
//!
//! Trains, stores, serves and evaluates classification models over
//! schema-described tabular datasets (ARFF or CSV):
//!
//! - [`dataset`] - ARFF/CSV loading with schema inference
//! - [`schema`] - attribute descriptors and the training schema
//! - [`classifiers`] - the pluggable classification algorithms
//! - [`vector`] - feature maps to model-aligned feature rows
//! - [`training`] - train, cross-validate, persist, register
//! - [`registry`] - in-memory model registry with an active pointer
//! - [`storage`] - model/schema artifact pairs on disk
//! - [`prediction`] - single and batch classification
//! - [`evaluation`] - confusion-matrix metrics and reports
//! - [`cli`] - command-line interface

pub mod error;

pub mod classifiers;
pub mod dataset;
pub mod schema;
pub mod vector;

pub mod evaluation;
pub mod prediction;
pub mod registry;
pub mod storage;
pub mod training;

pub mod cli;

pub use classifiers::{Algorithm, TrainedClassifier};
pub use dataset::{Dataset, DatasetLoader};
pub use error::{ModelyardError, Result};
pub use evaluation::{ConfusionMatrix, EvaluationReport, EvaluationService};
pub use prediction::{Prediction, PredictionService};
pub use registry::{ModelRecord, ModelRegistry, ModelSummary};
pub use schema::{AttributeDescriptor, AttributeKind, AttributeSchema};
pub use storage::ArtifactStore;
pub use training::{ScopedSource, TrainingOutcome, TrainingPipeline};
pub use vector::{FeatureMap, FeatureVectorBuilder};
