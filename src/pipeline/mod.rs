//! Config-driven pipelines: one YAML file drives both training and prediction.

pub mod prediction;
pub mod settings;
pub mod training;

pub use prediction::{predict_from_config, PredictionPipeline};
pub use settings::{PipelineSettings, PredictionSettings};
pub use training::{train_from_config, TrainingPipeline, TrainingSummary};
