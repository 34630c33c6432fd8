//! Fitted preprocessing state shared by training and prediction.
//!
//! Numeric columns are median-imputed then standardized with the training
//! mean and population standard deviation. Categorical columns are imputed
//! with their most frequent value, one-hot encoded over the categories seen
//! during fitting, and each indicator is divided by its training standard
//! deviation (no centering). Unseen categories encode to all zeros.

use std::collections::BTreeMap;
use std::path::PathBuf;

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::common::error::{PipelineError, PipelineResult};
use crate::data::domain::{is_missing, Record, Table};

/// Where the transformation stage finds its target and writes processed files.
#[derive(Clone, Debug)]
pub struct TransformationConfig {
    pub target_column: String,
    pub processed_dir: PathBuf,
}

impl TransformationConfig {
    pub fn train_path(&self) -> PathBuf {
        self.processed_dir.join("train_transformed.csv")
    }

    pub fn test_path(&self) -> PathBuf {
        self.processed_dir.join("test_transformed.csv")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnEncoder {
    Numeric {
        column: String,
        median: f64,
        mean: f64,
        std: f64,
    },
    Categorical {
        column: String,
        fill: String,
        categories: Vec<String>,
        /// Training standard deviation of each indicator column.
        scales: Vec<f64>,
    },
}

impl ColumnEncoder {
    pub fn column(&self) -> &str {
        match self {
            Self::Numeric { column, .. } | Self::Categorical { column, .. } => column,
        }
    }

    pub fn width(&self) -> usize {
        match self {
            Self::Numeric { .. } => 1,
            Self::Categorical { categories, .. } => categories.len(),
        }
    }

    fn feature_names(&self, out: &mut Vec<String>) {
        match self {
            Self::Numeric { column, .. } => out.push(column.clone()),
            Self::Categorical {
                column, categories, ..
            } => out.extend(categories.iter().map(|c| format!("{column}={c}"))),
        }
    }

    fn encode(&self, cell: Option<&str>, out: &mut Vec<f64>) -> PipelineResult<()> {
        let cell = cell.filter(|c| !is_missing(c));
        match self {
            Self::Numeric {
                column,
                median,
                mean,
                std,
            } => {
                let value = match cell {
                    None => *median,
                    Some(raw) => parse_number(raw).ok_or_else(|| {
                        PipelineError::invalid(format!(
                            "column `{column}` expects a number, got `{raw}`"
                        ))
                    })?,
                };
                out.push((value - mean) / std);
            }
            Self::Categorical {
                fill,
                categories,
                scales,
                ..
            } => {
                let value = cell.unwrap_or(fill.as_str());
                out.extend(
                    categories
                        .iter()
                        .zip(scales)
                        .map(|(c, scale)| if c == value { 1.0 / scale } else { 0.0 }),
                );
            }
        }
        Ok(())
    }

    fn fit(column: &str, values: &[&str]) -> Option<Self> {
        let present: Vec<&str> = values.iter().copied().filter(|v| !is_missing(v)).collect();
        if present.is_empty() {
            return None;
        }

        let numbers: Option<Vec<f64>> = present.iter().map(|v| parse_number(v)).collect();
        match numbers {
            Some(numbers) => {
                let median = median(numbers);
                let filled: Vec<f64> = values
                    .iter()
                    .map(|v| {
                        if is_missing(v) {
                            median
                        } else {
                            parse_number(v).unwrap_or(median)
                        }
                    })
                    .collect();
                let (mean, std) = mean_std(&filled);
                Some(Self::Numeric {
                    column: column.to_string(),
                    median,
                    mean,
                    std,
                })
            }
            None => {
                let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
                for v in &present {
                    *counts.entry(*v).or_default() += 1;
                }
                let mut fill = "";
                let mut best = 0;
                for (value, count) in &counts {
                    if *count > best {
                        best = *count;
                        fill = *value;
                    }
                }
                // Imputed cells count towards the fill category.
                let missing = values.len() - present.len();
                let n = values.len() as f64;
                let scales = counts
                    .iter()
                    .map(|(value, count)| {
                        let hits = if *value == fill { count + missing } else { *count };
                        let p = hits as f64 / n;
                        non_zero_std((p * (1.0 - p)).sqrt())
                    })
                    .collect();
                Some(Self::Categorical {
                    column: column.to_string(),
                    fill: fill.to_string(),
                    categories: counts.keys().map(|k| k.to_string()).collect(),
                    scales,
                })
            }
        }
    }
}

/// Dense numeric features with their regression targets, one row per sample.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureMatrix {
    pub feature_names: Vec<String>,
    pub rows: Array2<f64>,
    pub targets: Array1<f64>,
}

impl FeatureMatrix {
    /// Build from row-major values; every row must be as wide as `feature_names`.
    pub fn from_rows(
        feature_names: Vec<String>,
        rows: Vec<Vec<f64>>,
        targets: Vec<f64>,
    ) -> PipelineResult<Self> {
        let width = feature_names.len();
        if rows.len() != targets.len() {
            return Err(PipelineError::invalid(format!(
                "{} feature rows but {} targets",
                rows.len(),
                targets.len()
            )));
        }
        let n = rows.len();
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        let rows = Array2::from_shape_vec((n, width), flat).map_err(|e| {
            PipelineError::invalid(format!("feature rows do not match {width} columns: {e}"))
        })?;
        Ok(Self {
            feature_names,
            rows,
            targets: Array1::from(targets),
        })
    }

    pub fn len(&self) -> usize {
        self.rows.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn width(&self) -> usize {
        self.feature_names.len()
    }

    /// Rows at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            feature_names: self.feature_names.clone(),
            rows: self.rows.select(Axis(0), indices),
            targets: self.targets.select(Axis(0), indices),
        }
    }

    /// Table form with the target as the last column, for the processed files.
    pub fn to_table(&self, target_column: &str) -> Table {
        let mut headers = self.feature_names.clone();
        headers.push(target_column.to_string());
        let rows = self
            .rows
            .outer_iter()
            .zip(self.targets.iter())
            .map(|(row, target)| {
                row.iter()
                    .chain(std::iter::once(target))
                    .map(|v| v.to_string())
                    .collect()
            })
            .collect();
        Table::new(headers, rows)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    pub target_column: String,
    pub columns: Vec<ColumnEncoder>,
}

impl Preprocessor {
    /// Learn encoders from the training table. Every column but the target is a feature.
    pub fn fit(train: &Table, target_column: &str) -> PipelineResult<Self> {
        let target_idx = train.column_index(target_column).ok_or_else(|| {
            PipelineError::invalid(format!("target column `{target_column}` not found"))
        })?;

        let mut columns = Vec::new();
        for (idx, name) in train.headers.iter().enumerate() {
            if idx == target_idx {
                continue;
            }
            let values: Vec<&str> = train.column(idx).collect();
            match ColumnEncoder::fit(name, &values) {
                Some(encoder) => {
                    debug!(column = %name, encoder = ?encoder, "column encoder fitted");
                    columns.push(encoder);
                }
                None => warn!(column = %name, "column has no values and is ignored"),
            }
        }

        let preprocessor = Self {
            target_column: target_column.to_string(),
            columns,
        };
        if preprocessor.width() == 0 {
            return Err(PipelineError::invalid("no usable feature columns"));
        }
        Ok(preprocessor)
    }

    pub fn width(&self) -> usize {
        self.columns.iter().map(ColumnEncoder::width).sum()
    }

    pub fn feature_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.width());
        for column in &self.columns {
            column.feature_names(&mut names);
        }
        names
    }

    /// Encode a table that carries the target column. Rows with a missing target are dropped.
    pub fn transform_table(&self, table: &Table) -> PipelineResult<FeatureMatrix> {
        let target_idx = table.column_index(&self.target_column).ok_or_else(|| {
            PipelineError::invalid(format!("target column `{}` not found", self.target_column))
        })?;
        let positions = self
            .columns
            .iter()
            .map(|c| {
                table.column_index(c.column()).ok_or_else(|| {
                    PipelineError::invalid(format!("feature column `{}` not found", c.column()))
                })
            })
            .collect::<PipelineResult<Vec<usize>>>()?;

        let mut rows = Vec::with_capacity(table.len());
        let mut targets = Vec::with_capacity(table.len());
        let mut dropped = 0usize;
        for (line, row) in table.rows.iter().enumerate() {
            let raw_target = row[target_idx].as_str();
            if is_missing(raw_target) {
                dropped += 1;
                continue;
            }
            let target = parse_number(raw_target).ok_or_else(|| {
                PipelineError::invalid(format!(
                    "row {}: target `{}` is not numeric",
                    line + 1,
                    raw_target
                ))
            })?;

            let cells: Vec<Option<&str>> = positions.iter().map(|&i| Some(row[i].as_str())).collect();
            rows.push(self.encode_cells(&cells)?);
            targets.push(target);
        }
        if dropped > 0 {
            warn!(dropped, "rows without a target were dropped");
        }
        FeatureMatrix::from_rows(self.feature_names(), rows, targets)
    }

    /// Encode one prediction record.
    ///
    /// Every fitted feature column must be present; null or missing-marker
    /// values are imputed like in training.
    pub fn transform_record(&self, record: &Record) -> PipelineResult<Vec<f64>> {
        let absent: Vec<&str> = self
            .columns
            .iter()
            .map(ColumnEncoder::column)
            .filter(|name| !record.contains_key(*name))
            .collect();
        if !absent.is_empty() {
            return Err(PipelineError::invalid(format!(
                "record is missing feature column(s): {}",
                absent.join(", ")
            )));
        }

        let mut owned: Vec<Option<String>> = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let value = record.get(column.column()).unwrap_or(&Value::Null);
            owned.push(cell_text(column.column(), value)?);
        }
        let cells: Vec<Option<&str>> = owned.iter().map(|c| c.as_deref()).collect();
        self.encode_cells(&cells)
    }

    fn encode_cells(&self, cells: &[Option<&str>]) -> PipelineResult<Vec<f64>> {
        let mut out = Vec::with_capacity(self.width());
        for (encoder, cell) in self.columns.iter().zip(cells) {
            encoder.encode(*cell, &mut out)?;
        }
        Ok(out)
    }
}

fn cell_text(column: &str, value: &Value) -> PipelineResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        // 1.0 must match the category "1" read from CSV.
        Value::Number(n) if n.is_f64() => Ok(n.as_f64().map(|v| v.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Array(_) | Value::Object(_) => Err(PipelineError::invalid(format!(
            "column `{column}` must hold a scalar value"
        ))),
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, non_zero_std(var.sqrt()))
}

/// Constant columns keep their scale.
fn non_zero_std(std: f64) -> f64 {
    if std > 1e-12 {
        std
    } else {
        1.0
    }
}
