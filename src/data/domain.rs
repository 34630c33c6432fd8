//! Core dataset definitions and contracts.

use std::path::{Path, PathBuf};

use crate::common::error::PipelineResult;

/// Cells treated as missing values, compared case-insensitively.
const MISSING_MARKERS: [&str; 3] = ["na", "nan", "null"];

pub fn is_missing(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty() || MISSING_MARKERS.iter().any(|m| cell.eq_ignore_ascii_case(m))
}

/// One input observation keyed by column name, as received by prediction.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// In-memory CSV table: one header row, string cells.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |row| row[idx].as_str())
    }

    /// Rows as JSON records, header names as keys and cells as strings.
    pub fn to_records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| {
                self.headers
                    .iter()
                    .zip(row)
                    .map(|(h, cell)| (h.clone(), serde_json::Value::String(cell.clone())))
                    .collect()
            })
            .collect()
    }
}

/// Train/test partition of the raw table.
#[derive(Clone, Debug)]
pub struct Split {
    pub train: Table,
    pub test: Table,
}

/// Where ingestion reads from and writes to, and how it splits.
#[derive(Clone, Debug)]
pub struct IngestionConfig {
    /// A CSV file or a directory of CSV files.
    pub raw_path: PathBuf,
    pub processed_dir: PathBuf,
    pub test_size: f64,
    pub random_state: u64,
}

impl IngestionConfig {
    pub fn train_path(&self) -> PathBuf {
        self.processed_dir.join("train.csv")
    }

    pub fn test_path(&self) -> PathBuf {
        self.processed_dir.join("test.csv")
    }
}

/// Repository contract for tabular data on some storage.
pub trait DatasetRepo {
    fn read_raw(&self, path: &Path) -> PipelineResult<Table>;
    fn write_table(&self, path: &Path, table: &Table) -> PipelineResult<()>;
}
