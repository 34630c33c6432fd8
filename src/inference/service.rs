//! Applies a persisted artifact to caller-supplied records.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use crate::common::error::{PipelineError, PipelineResult, ResultExt};
use crate::common::time;
use crate::data::domain::Record;
use crate::training::domain::{ModelArtifact, ModelRepo};

/// A loaded artifact ready to score records.
#[derive(Clone, Debug)]
pub struct Predictor {
    artifact: ModelArtifact,
    source: PathBuf,
}

impl Predictor {
    /// Fails with `ModelNotFound` when nothing exists at `path`.
    pub fn load(repo: &dyn ModelRepo, path: &Path) -> PipelineResult<Self> {
        let artifact = repo.load(path)?;
        Ok(Self {
            artifact,
            source: path.to_path_buf(),
        })
    }

    pub fn from_artifact(artifact: ModelArtifact, source: impl Into<PathBuf>) -> Self {
        Self {
            artifact,
            source: source.into(),
        }
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn predict_one(&self, record: &Record) -> PipelineResult<f64> {
        self.artifact.predict_record(record)
    }

    /// One prediction per record, in input order. The first bad record aborts the batch.
    pub fn predict(&self, records: &[Record]) -> PipelineResult<Vec<f64>> {
        if records.is_empty() {
            return Err(PipelineError::invalid("no records to score"));
        }
        let start = Instant::now();
        let predictions = records
            .iter()
            .enumerate()
            .map(|(idx, record)| {
                self.predict_one(record)
                    .wrap_err_with(|| format!("record {idx}"))
            })
            .collect::<PipelineResult<Vec<_>>>()?;
        debug!(first = ?predictions.first(), "batch scored");
        info!(
            records = records.len(),
            model = %self.artifact.metadata.model_kind,
            dur_ms = time::elapsed_ms(start),
            "predictions computed"
        );
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::ErrorCode;
    use crate::data::domain::Table;
    use crate::training::domain::{ArtifactMetadata, ModelKind, TrainedModel};
    use crate::training::linear::LinearModel;
    use crate::training::repo_fs::FsModelRepo;
    use crate::transform::domain::Preprocessor;
    use serde_json::json;
    use ndarray::array;
    use tempfile::tempdir;

    fn predictor() -> Predictor {
        let train = Table::new(
            vec!["x".into(), "target".into()],
            vec![vec!["1".into(), "0".into()], vec!["3".into(), "0".into()]],
        );
        // x is standardized with mean 2 and std 1.
        let preprocessor = Preprocessor::fit(&train, "target").unwrap();
        let artifact = ModelArtifact {
            metadata: ArtifactMetadata {
                crate_version: env!("CARGO_PKG_VERSION").into(),
                model_kind: ModelKind::LinearRegression,
                trained_at: "2024-01-01T00:00:00+00:00".into(),
                target_column: "target".into(),
                feature_names: preprocessor.feature_names(),
                dataset_fingerprint: String::new(),
                train_rows: 2,
                test_rows: 0,
                test_score: 1.0,
            },
            preprocessor,
            model: TrainedModel::LinearRegression(LinearModel {
                weights: array![10.0],
                intercept: 5.0,
            }),
        };
        Predictor::from_artifact(artifact, "memory")
    }

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn predicts_in_input_order() {
        let out = predictor()
            .predict(&[record(json!({"x": 3})), record(json!({"x": "1"}))])
            .unwrap();
        assert_eq!(out, vec![15.0, -5.0]);
    }

    #[test]
    fn null_features_are_imputed() {
        assert_eq!(predictor().predict_one(&record(json!({"x": null}))).unwrap(), 5.0);
        assert_eq!(predictor().predict_one(&record(json!({"x": ""}))).unwrap(), 5.0);
    }

    #[test]
    fn absent_features_are_invalid_input() {
        let err = predictor()
            .predict(&[record(json!({"x": 1})), record(json!({"y": 1}))])
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);
        assert!(err.chain().contains("missing feature column(s): x"));
    }

    #[test]
    fn empty_batch_is_invalid_input() {
        let err = predictor().predict(&[]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);
    }

    #[test]
    fn bad_record_reports_its_index() {
        let err = predictor()
            .predict(&[record(json!({"x": 1})), record(json!({"x": "abc"}))])
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);
        assert!(err.chain().starts_with("record 1"));
    }

    #[test]
    fn loading_without_artifact_is_model_not_found() {
        let dir = tempdir().unwrap();
        let err = Predictor::load(&FsModelRepo::new(), &dir.path().join("model.json")).unwrap_err();
        assert!(matches!(err, PipelineError::ModelNotFound { .. }));
    }
}
