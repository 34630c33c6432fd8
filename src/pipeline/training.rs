//! The training pipeline: ingest, transform, train, evaluate, persist.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::common::config::load_config;
use crate::common::error::{PipelineResult, ResultExt};
use crate::common::log::run_stage;
use crate::common::time;
use crate::data::domain::DatasetRepo;
use crate::data::repo_fs::FsDatasetRepo;
use crate::data::service::ingest;
use crate::evaluation::domain::EvaluationReport;
use crate::evaluation::service::evaluate;
use crate::training::domain::{ArtifactMetadata, ModelArtifact, ModelKind, ModelRepo};
use crate::training::repo_fs::FsModelRepo;
use crate::training::service::{train, CandidateScore};
use crate::transform::service::transform;

use super::settings::PipelineSettings;

/// What a successful run produced. Printed as JSON by the `train` binary.
#[derive(Clone, Debug, Serialize)]
pub struct TrainingSummary {
    pub raw_rows: usize,
    pub dataset_fingerprint: String,
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    pub train_transformed_path: PathBuf,
    pub test_transformed_path: PathBuf,
    pub model_path: PathBuf,
    pub model: ModelKind,
    pub test_score: f64,
    pub leaderboard: Vec<CandidateScore>,
    pub evaluation: EvaluationReport,
    pub dur_ms: u64,
}

pub struct TrainingPipeline {
    settings: PipelineSettings,
    datasets: Box<dyn DatasetRepo>,
    models: Box<dyn ModelRepo>,
}

impl TrainingPipeline {
    /// Pipeline backed by the filesystem repositories.
    pub fn new(settings: PipelineSettings) -> Self {
        Self::with_repos(
            settings,
            Box::new(FsDatasetRepo::new()),
            Box::new(FsModelRepo::new()),
        )
    }

    pub fn with_repos(
        settings: PipelineSettings,
        datasets: Box<dyn DatasetRepo>,
        models: Box<dyn ModelRepo>,
    ) -> Self {
        Self {
            settings,
            datasets,
            models,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run every stage once, in order. The first failure aborts the run.
    pub fn run(&self) -> PipelineResult<TrainingSummary> {
        let start = Instant::now();
        let s = &self.settings;
        info!(root = %s.layout.root().display(), "training pipeline started");

        s.layout.create().wrap_err("creating project directories")?;

        let ingested = run_stage("ingest", || ingest(self.datasets.as_ref(), &s.ingestion))
            .wrap_err("data ingestion")?;

        let transformed = run_stage("transform", || {
            transform(self.datasets.as_ref(), &s.transformation, &ingested.split)
        })
        .wrap_err("data transformation")?;

        let trained = run_stage("train", || {
            train(&s.trainer, &transformed.train, &transformed.test)
        })
        .wrap_err("model training")?;

        let evaluation = run_stage("evaluate", || {
            evaluate(&s.evaluation, &trained.model, &transformed.test)
        })
        .wrap_err("model evaluation")?;

        let artifact = ModelArtifact {
            metadata: ArtifactMetadata {
                crate_version: env!("CARGO_PKG_VERSION").to_string(),
                model_kind: trained.kind(),
                trained_at: time::timestamp(),
                target_column: s.transformation.target_column.clone(),
                feature_names: transformed.preprocessor.feature_names(),
                dataset_fingerprint: ingested.fingerprint.clone(),
                train_rows: transformed.train.len(),
                test_rows: transformed.test.len(),
                test_score: trained.test_score,
            },
            preprocessor: transformed.preprocessor.clone(),
            model: trained.model.clone(),
        };
        run_stage("persist", || self.models.save(&s.model_path, &artifact))
            .wrap_err("artifact persistence")?;

        let summary = TrainingSummary {
            raw_rows: ingested.raw_rows,
            dataset_fingerprint: ingested.fingerprint,
            train_path: ingested.train_path,
            test_path: ingested.test_path,
            train_transformed_path: transformed.train_path,
            test_transformed_path: transformed.test_path,
            model_path: s.model_path.clone(),
            model: trained.kind(),
            test_score: trained.test_score,
            leaderboard: trained.leaderboard,
            evaluation,
            dur_ms: time::elapsed_ms(start),
        };
        info!(
            model = %summary.model,
            r2 = summary.test_score,
            dur_ms = summary.dur_ms,
            "training pipeline finished"
        );
        Ok(summary)
    }
}

/// Load the YAML file at `config_path` and run the training pipeline under `root`.
pub fn train_from_config(config_path: &Path, root: &Path) -> PipelineResult<TrainingSummary> {
    let cfg = load_config(config_path).wrap_err("loading configuration")?;
    let settings = PipelineSettings::from_config(&cfg, root).wrap_err("reading pipeline settings")?;
    TrainingPipeline::new(settings).run()
}
