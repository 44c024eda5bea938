//! Command-line interface
//!
//! One subcommand per lifecycle operation. Every command builds the
//! registry from the model directory first, so the CLI sees exactly the
//! models a long-running process would.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::error::Result;
use crate::evaluation::EvaluationService;
use crate::prediction::PredictionService;
use crate::registry::ModelRegistry;
use crate::storage::ArtifactStore;
use crate::training::TrainingPipeline;
use crate::vector::FeatureMap;

#[derive(Parser)]
#[command(name = "modelyard", about = "Classifier lifecycle engine", version)]
pub struct Cli {
    /// Directory holding persisted model artifacts
    #[arg(long, default_value = "models", global = true)]
    pub model_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model from an ARFF or CSV dataset
    Train {
        /// Path to the training dataset
        data: PathBuf,
        /// Algorithm identifier (J48, random-forest, SMO, naive-bayes, JRip)
        #[arg(long, default_value = "J48")]
        algorithm: String,
        /// Name to register the model under
        #[arg(long)]
        name: String,
        /// Class attribute index (defaults to the last column)
        #[arg(long)]
        class_index: Option<usize>,
    },
    /// Classify one instance from a JSON feature map
    Predict {
        /// Feature map, e.g. '{"age": 30, "income": 45000}'
        features: String,
        /// Model to use (defaults to the active model)
        #[arg(long)]
        model: Option<String>,
    },
    /// Classify a batch of instances from a JSON array file
    PredictBatch {
        /// Path to a JSON file holding an array of feature maps
        file: PathBuf,
        /// Model to use (defaults to the active model)
        #[arg(long)]
        model: Option<String>,
    },
    /// Evaluate a model against a held-out test dataset
    Evaluate {
        /// Model to evaluate
        model: String,
        /// Path to the test dataset
        data: PathBuf,
    },
    /// List registered models
    Models,
    /// Reload a model from its on-disk artifacts
    Load { name: String },
    /// Mark a model as the active one
    Activate { name: String },
    /// Delete a model and its artifacts
    Delete { name: String },
}

/// Shared setup: open the store, rebuild the registry from disk, train
/// the default model if the store is empty.
fn build_pipeline(model_dir: &PathBuf) -> Result<(Arc<ModelRegistry>, TrainingPipeline)> {
    let registry = Arc::new(ModelRegistry::new());
    let store = Arc::new(ArtifactStore::open(model_dir.clone())?);
    let pipeline = TrainingPipeline::new(Arc::clone(&registry), store);
    pipeline.bootstrap()?;
    Ok((registry, pipeline))
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let (registry, pipeline) = build_pipeline(&cli.model_dir)?;

    match cli.command {
        Commands::Train {
            data,
            algorithm,
            name,
            class_index,
        } => {
            let outcome = pipeline.train(&data, &algorithm, &name, class_index)?;
            println!(
                "Trained '{}' ({}) on {} instances in {} ms",
                outcome.model_name, outcome.algorithm, outcome.n_instances, outcome.training_time_ms
            );
            println!("\n{}", outcome.summary);
            println!("{}", outcome.confusion_matrix);
        }
        Commands::Predict { features, model } => {
            let features: FeatureMap = serde_json::from_str(&features)?;
            let service = PredictionService::new(registry);
            let result = service.predict(&features, model.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::PredictBatch { file, model } => {
            let batch: Vec<FeatureMap> = serde_json::from_str(&std::fs::read_to_string(file)?)?;
            let service = PredictionService::new(registry);
            let results = service.predict_batch(&batch, model.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::Evaluate { model, data } => {
            let service = EvaluationService::new(registry);
            let report = service.evaluate(&model, &data)?;
            println!("{}", report.summary);
            println!("{}", report.class_details);
            println!("{}", report.confusion_matrix);
        }
        Commands::Models => {
            for summary in registry.list() {
                println!(
                    "{}{}  {}  {} attributes, class '{}', trained {}",
                    summary.name,
                    if summary.active { " (active)" } else { "" },
                    summary.algorithm,
                    summary.schema.len(),
                    summary.class_attribute,
                    summary.trained_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
        }
        Commands::Load { name } => {
            let record = pipeline.load_model(&name)?;
            println!("Loaded '{}' ({})", record.name, record.algorithm.id());
        }
        Commands::Activate { name } => {
            registry.activate(&name)?;
            println!("Activated '{}'", name);
        }
        Commands::Delete { name } => {
            pipeline.delete_model(&name)?;
            println!("Deleted '{}'", name);
        }
    }
    Ok(())
}
