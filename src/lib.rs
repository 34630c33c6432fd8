// lib.rs - pipeline building blocks and the two config-driven pipelines
pub mod cli;
pub mod common;
pub mod data;
pub mod evaluation;
pub mod inference;
pub mod pipeline;
pub mod training;
pub mod transform;

pub use common::error::{ErrorCode, PipelineError, PipelineResult};
pub use pipeline::{predict_from_config, train_from_config, TrainingSummary};
