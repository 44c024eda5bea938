//! End-to-end lifecycle tests: train, persist, reload, predict,
//! evaluate, delete.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use modelyard::{
    ArtifactStore, EvaluationService, FeatureMap, ModelRegistry, ModelyardError,
    PredictionService, ScopedSource, TrainingPipeline,
};

fn pipeline(dir: &Path) -> (Arc<ModelRegistry>, TrainingPipeline) {
    let registry = Arc::new(ModelRegistry::new());
    let store = Arc::new(ArtifactStore::open(dir.join("models")).unwrap());
    let pipeline = TrainingPipeline::new(Arc::clone(&registry), store);
    (registry, pipeline)
}

fn write_risk_csv(dir: &Path) -> PathBuf {
    let path = dir.join("risk.csv");
    fs::write(
        &path,
        "age,income,credit_score,risk\n\
         25,30000,650,medium\n\
         45,80000,750,low\n\
         35,45000,600,high\n\
         28,35000,680,medium\n\
         52,95000,780,low\n\
         30,28000,580,high\n",
    )
    .unwrap();
    path
}

fn risk_features(age: f64, income: f64, score: f64) -> FeatureMap {
    let mut map = FeatureMap::new();
    map.insert("age".to_string(), json!(age));
    map.insert("income".to_string(), json!(income));
    map.insert("credit_score".to_string(), json!(score));
    map
}

#[test]
fn train_persist_reload_predicts_identically() {
    let dir = TempDir::new().unwrap();
    let (registry, pipeline) = pipeline(dir.path());
    let source = write_risk_csv(dir.path());

    pipeline.train(&source, "J48", "risk", None).unwrap();
    let service = PredictionService::new(Arc::clone(&registry));
    let before = service.predict(&risk_features(50.0, 90000.0, 770.0), None).unwrap();

    // Fresh process: empty registry rebuilt from the same artifact dir.
    let registry2 = Arc::new(ModelRegistry::new());
    let store2 = Arc::new(ArtifactStore::open(dir.path().join("models")).unwrap());
    let pipeline2 = TrainingPipeline::new(Arc::clone(&registry2), store2);
    pipeline2.bootstrap().unwrap();

    let service2 = PredictionService::new(registry2);
    let after = service2.predict(&risk_features(50.0, 90000.0, 770.0), None).unwrap();

    assert_eq!(before.prediction, after.prediction);
    for (label, mass) in &before.distribution {
        assert!((mass - after.distribution[label]).abs() < 1e-6);
    }
}

#[test]
fn risk_model_learns_training_patterns() {
    let dir = TempDir::new().unwrap();
    let (registry, pipeline) = pipeline(dir.path());
    let source = write_risk_csv(dir.path());
    pipeline.train(&source, "random-forest", "risk", None).unwrap();

    let service = PredictionService::new(registry);
    let high_earner = service.predict(&risk_features(48.0, 88000.0, 760.0), None).unwrap();
    assert_eq!(high_earner.prediction, "low");

    let low_score = service.predict(&risk_features(32.0, 30000.0, 585.0), None).unwrap();
    assert_eq!(low_score.prediction, "high");

    let total: f64 = high_earner.distribution.values().sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert!(high_earner.confidence > 0.0 && high_earner.confidence <= 1.0);
}

#[test]
fn every_algorithm_trains_on_the_risk_dataset() {
    let dir = TempDir::new().unwrap();
    let (registry, pipeline) = pipeline(dir.path());
    let source = write_risk_csv(dir.path());

    for (id, canonical) in [
        ("J48", "decision-tree"),
        ("random-forest", "random-forest"),
        ("SMO", "svm"),
        ("naive-bayes", "naive-bayes"),
        ("JRip", "rule-based"),
    ] {
        let name = format!("risk-{}", canonical);
        let outcome = pipeline.train(&source, id, &name, None).unwrap();
        assert_eq!(outcome.algorithm, canonical);
        assert_eq!(outcome.n_instances, 6);
        assert!(registry.contains(&name));
    }
    assert_eq!(registry.list().len(), 5);
}

#[test]
fn registry_state_survives_activate_and_delete() {
    let dir = TempDir::new().unwrap();
    let (registry, pipeline) = pipeline(dir.path());
    let source = write_risk_csv(dir.path());

    pipeline.train(&source, "tree", "a", None).unwrap();
    pipeline.train(&source, "tree", "b", None).unwrap();
    assert_eq!(registry.active_name().as_deref(), Some("a"));

    // Active model cannot be deleted while another exists.
    assert!(matches!(
        pipeline.delete_model("a"),
        Err(ModelyardError::Conflict(_))
    ));

    registry.activate("b").unwrap();
    pipeline.delete_model("a").unwrap();
    assert!(!dir.path().join("models/a.model.json").exists());

    // Deleting the last model clears the active pointer.
    pipeline.delete_model("b").unwrap();
    assert!(registry.is_empty());
    assert!(registry.resolve(None).is_err());
}

#[test]
fn batch_prediction_tolerates_bad_items() {
    let dir = TempDir::new().unwrap();
    let (registry, pipeline) = pipeline(dir.path());
    let source = write_risk_csv(dir.path());
    pipeline.train(&source, "J48", "risk", None).unwrap();

    let mut bad = FeatureMap::new();
    bad.insert("age".to_string(), json!("forty-ish"));

    let batch = vec![
        risk_features(45.0, 80000.0, 750.0),
        bad,
        risk_features(35.0, 45000.0, 600.0),
    ];
    let service = PredictionService::new(registry);
    let results = service.predict_batch(&batch, None).unwrap();
    assert_eq!(results.len(), 2);
}

#[test]
fn evaluation_against_held_out_arff() {
    let dir = TempDir::new().unwrap();
    let (registry, pipeline) = pipeline(dir.path());
    let source = write_risk_csv(dir.path());
    pipeline.train(&source, "J48", "risk", None).unwrap();

    let test_path = dir.path().join("test.arff");
    fs::write(
        &test_path,
        "@relation risk\n\
         @attribute age numeric\n\
         @attribute income numeric\n\
         @attribute credit_score numeric\n\
         @attribute risk {high,low,medium}\n\
         @data\n\
         44,78000,745,low\n\
         36,44000,605,high\n\
         26,31000,655,medium\n",
    )
    .unwrap();

    let service = EvaluationService::new(registry);
    let report = service.evaluate("risk", &test_path).unwrap();
    // The test file declares its class domain in a different order; the
    // report must still line up labels by value.
    assert!(report.accuracy >= 0.0 && report.accuracy <= 100.0);
    assert!(report.summary.contains("Total Number of Instances"));
    assert!(report.confusion_matrix.contains("= low"));

    assert!(matches!(
        service.evaluate("ghost", &test_path),
        Err(ModelyardError::NotFound(_))
    ));
}

#[test]
fn evaluation_rejects_mismatched_schema() {
    let dir = TempDir::new().unwrap();
    let (registry, pipeline) = pipeline(dir.path());
    let source = write_risk_csv(dir.path());
    pipeline.train(&source, "J48", "risk", None).unwrap();

    let narrow = dir.path().join("narrow.csv");
    fs::write(&narrow, "age,risk\n30,low\n40,high\n").unwrap();

    let service = EvaluationService::new(registry);
    assert!(matches!(
        service.evaluate("risk", &narrow),
        Err(ModelyardError::Dataset(_))
    ));
}

#[test]
fn scoped_upload_is_removed_after_training() {
    let dir = TempDir::new().unwrap();
    let (registry, pipeline) = pipeline(dir.path());
    let upload = ScopedSource::new(write_risk_csv(dir.path()));

    pipeline.train(upload.path(), "J48", "risk", None).unwrap();
    let path = upload.path().to_path_buf();
    drop(upload);

    assert!(!path.exists());
    assert!(registry.contains("risk"));

    // The failure path cleans up too.
    let bad = dir.path().join("bad.csv");
    fs::write(&bad, "only\n1\n").unwrap();
    let upload = ScopedSource::new(&bad);
    assert!(pipeline.train(upload.path(), "J48", "bad", None).is_err());
    drop(upload);
    assert!(!bad.exists());
}

#[test]
fn bootstrap_creates_default_model_once() {
    let dir = TempDir::new().unwrap();
    let (registry, pipeline) = pipeline(dir.path());
    pipeline.bootstrap().unwrap();
    assert_eq!(registry.active_name().as_deref(), Some("riskmodel"));

    let service = PredictionService::new(Arc::clone(&registry));
    let result = service.predict(&risk_features(52.0, 95000.0, 780.0), None).unwrap();
    assert_eq!(result.model_name, "riskmodel");

    // A second process over the same dir reloads instead of retraining.
    let registry2 = Arc::new(ModelRegistry::new());
    let store2 = Arc::new(ArtifactStore::open(dir.path().join("models")).unwrap());
    let pipeline2 = TrainingPipeline::new(Arc::clone(&registry2), store2);
    pipeline2.bootstrap().unwrap();
    assert_eq!(registry2.list().len(), 1);
}
