//! Request and response shapes for batch prediction.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::error::{PipelineError, PipelineResult};
use crate::data::domain::Record;

/// Printed by the `predict` binary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionBatch {
    pub predictions: Vec<f64>,
    pub count: usize,
}

impl PredictionBatch {
    pub fn new(predictions: Vec<f64>) -> Self {
        Self {
            count: predictions.len(),
            predictions,
        }
    }
}

/// Accepts a single object, an array of objects, or `{"data": [...]}`.
///
/// An object whose `data` member is an array is a batch envelope; its other
/// members are ignored. An empty batch is rejected.
pub fn parse_records(input: Value) -> PipelineResult<Vec<Record>> {
    match input {
        Value::Object(mut map) if map.get("data").is_some_and(Value::is_array) => {
            let data = map.remove("data").unwrap_or_default();
            parse_records(data)
        }
        Value::Object(map) => Ok(vec![map]),
        Value::Array(items) if items.is_empty() => {
            Err(PipelineError::invalid("no records to score"))
        }
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                Value::Object(map) => Ok(map),
                other => Err(PipelineError::invalid(format!(
                    "record {idx} is not a JSON object: {other}"
                ))),
            })
            .collect(),
        other => Err(PipelineError::invalid(format!(
            "expected a JSON object or an array of objects, got {other}"
        ))),
    }
}

/// Parse raw JSON text into records.
pub fn parse_records_str(text: &str) -> PipelineResult<Vec<Record>> {
    let value: Value = serde_json::from_str(text)?;
    parse_records(value)
}
