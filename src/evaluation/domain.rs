//! Metric and report types for the evaluation stage.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::common::config::ConfigError;

/// Default score below which evaluation logs a warning.
pub const DEFAULT_THRESHOLD: f64 = 0.6;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    #[default]
    Regression,
    Classification,
}

impl Task {
    pub fn parse(key: &str, name: &str) -> Result<Self, ConfigError> {
        match name {
            "regression" => Ok(Task::Regression),
            "classification" => Ok(Task::Classification),
            other => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                reason: format!("unknown task `{other}`, expected regression or classification"),
            }),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Task::Regression => "regression",
            Task::Classification => "classification",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
}

/// Support-weighted averages over the labels present in the truth.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Metrics {
    Regression(RegressionMetrics),
    Classification(ClassificationMetrics),
}

impl Metrics {
    /// Headline score compared against the threshold: R² or accuracy.
    pub fn score(&self) -> f64 {
        match self {
            Metrics::Regression(m) => m.r2,
            Metrics::Classification(m) => m.accuracy,
        }
    }
}

#[derive(Clone, Debug)]
pub struct EvaluationConfig {
    pub task: Task,
    pub threshold: f64,
    pub report_path: Option<PathBuf>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            task: Task::Regression,
            threshold: DEFAULT_THRESHOLD,
            report_path: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub metrics: Metrics,
    pub score: f64,
    pub threshold: f64,
    pub meets_threshold: bool,
    pub test_rows: usize,
}
