//! The prediction pipeline: load the artifact, score the records.

use std::path::Path;

use tracing::info;

use crate::common::config::load_config;
use crate::common::error::{PipelineResult, ResultExt};
use crate::common::log::run_stage;
use crate::data::domain::Record;
use crate::inference::domain::PredictionBatch;
use crate::inference::service::Predictor;
use crate::training::domain::ModelRepo;
use crate::training::repo_fs::FsModelRepo;

use super::settings::PredictionSettings;

pub struct PredictionPipeline {
    settings: PredictionSettings,
    models: Box<dyn ModelRepo>,
}

impl PredictionPipeline {
    pub fn new(settings: PredictionSettings) -> Self {
        Self::with_repo(settings, Box::new(FsModelRepo::new()))
    }

    pub fn with_repo(settings: PredictionSettings, models: Box<dyn ModelRepo>) -> Self {
        Self { settings, models }
    }

    /// Fails with `ModelNotFound` (wrapped) when no artifact was trained yet.
    pub fn load(&self) -> PipelineResult<Predictor> {
        run_stage("load_model", || {
            Predictor::load(self.models.as_ref(), &self.settings.model_path)
        })
        .wrap_err("loading model artifact")
    }

    pub fn run(&self, records: &[Record]) -> PipelineResult<PredictionBatch> {
        let predictor = self.load()?;
        let predictions = run_stage("predict", || predictor.predict(records))
            .wrap_err("scoring input records")?;
        info!(count = predictions.len(), "prediction pipeline finished");
        Ok(PredictionBatch::new(predictions))
    }
}

/// Load the YAML file at `config_path` and score `records` with the configured artifact.
pub fn predict_from_config(
    config_path: &Path,
    root: &Path,
    records: &[Record],
) -> PipelineResult<PredictionBatch> {
    let cfg = load_config(config_path).wrap_err("loading configuration")?;
    let settings =
        PredictionSettings::from_config(&cfg, root).wrap_err("reading prediction settings")?;
    PredictionPipeline::new(settings).run(records)
}
