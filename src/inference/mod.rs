//! Inference domain: load an artifact and score JSON records.

pub mod domain;
pub mod service;

pub use domain::{parse_records, parse_records_str, PredictionBatch};
pub use service::Predictor;
