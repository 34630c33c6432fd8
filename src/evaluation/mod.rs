//! Evaluation of the selected model on the held-out split.

pub mod domain;
pub mod service;

pub use domain::{
    ClassificationMetrics, EvaluationConfig, EvaluationReport, Metrics, RegressionMetrics, Task,
};
