//! Typed pipeline settings read from the configuration tree.
//!
//! Required keys: `data.raw_path`, `model.type`, `training.test_size` and
//! `training.random_state`. Everything else has a default. Relative paths
//! are resolved against the project root.

use std::path::{Path, PathBuf};

use crate::common::config::{Config, ConfigError};
use crate::common::layout::{ProjectLayout, PROCESSED_DATA_DIR};
use crate::data::domain::IngestionConfig;
use crate::evaluation::domain::{EvaluationConfig, Task, DEFAULT_THRESHOLD};
use crate::training::domain::{ModelSpec, TrainerConfig, DEFAULT_CV_FOLDS};
use crate::transform::domain::TransformationConfig;

pub const DEFAULT_TARGET_COLUMN: &str = "target";
pub const DEFAULT_MODEL_PATH: &str = "models/model.json";

#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub layout: ProjectLayout,
    pub ingestion: IngestionConfig,
    pub transformation: TransformationConfig,
    pub trainer: TrainerConfig,
    pub evaluation: EvaluationConfig,
    pub model_path: PathBuf,
}

impl PipelineSettings {
    pub fn from_config(cfg: &Config, root: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let layout = ProjectLayout::new(root.as_ref());

        let raw_path = layout.resolve(cfg.str("data.raw_path")?);
        let processed_dir =
            layout.resolve(cfg.opt_str("data.processed_dir")?.unwrap_or(PROCESSED_DATA_DIR));
        let target_column = cfg
            .opt_str("data.target_column")?
            .unwrap_or(DEFAULT_TARGET_COLUMN)
            .to_string();

        let test_size = cfg.f64("training.test_size")?;
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(ConfigError::InvalidValue {
                key: "training.test_size".into(),
                reason: format!("{test_size} is outside the open interval (0, 1)"),
            });
        }
        let random_state = cfg.u64("training.random_state")?;
        let min_score = cfg.opt_f64("training.min_score")?;
        let cv_folds = match cfg.opt_u64("training.cv_folds")? {
            None => DEFAULT_CV_FOLDS,
            Some(k) if k >= 2 => k as usize,
            Some(k) => {
                return Err(ConfigError::InvalidValue {
                    key: "training.cv_folds".into(),
                    reason: format!("{k} folds; at least 2 are needed"),
                })
            }
        };

        let spec = ModelSpec::from_config(cfg.str("model.type")?, cfg.lookup("model.params"))?;
        let model_path = layout.resolve(cfg.opt_str("model.path")?.unwrap_or(DEFAULT_MODEL_PATH));

        let evaluation = EvaluationConfig {
            task: match cfg.opt_str("evaluation.task")? {
                Some(name) => Task::parse("evaluation.task", name)?,
                None => Task::default(),
            },
            threshold: cfg.opt_f64("evaluation.threshold")?.unwrap_or(DEFAULT_THRESHOLD),
            report_path: cfg
                .opt_str("evaluation.report_path")?
                .map(|p| layout.resolve(p)),
        };

        Ok(Self {
            ingestion: IngestionConfig {
                raw_path,
                processed_dir: processed_dir.clone(),
                test_size,
                random_state,
            },
            transformation: TransformationConfig {
                target_column,
                processed_dir,
            },
            trainer: TrainerConfig {
                spec,
                min_score,
                cv_folds,
                random_state,
            },
            evaluation,
            model_path,
            layout,
        })
    }
}

/// Prediction only needs to know where the artifact lives.
#[derive(Clone, Debug)]
pub struct PredictionSettings {
    pub layout: ProjectLayout,
    pub model_path: PathBuf,
}

impl PredictionSettings {
    pub fn from_config(cfg: &Config, root: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let layout = ProjectLayout::new(root.as_ref());
        let model_path = layout.resolve(cfg.opt_str("model.path")?.unwrap_or(DEFAULT_MODEL_PATH));
        Ok(Self { layout, model_path })
    }
}
