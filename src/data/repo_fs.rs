//! Filesystem-backed CSV repository.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::common::error::{PipelineError, PipelineResult};

use super::domain::{DatasetRepo, Table};

#[derive(Clone, Copy, Debug, Default)]
pub struct FsDatasetRepo;

impl FsDatasetRepo {
    pub fn new() -> Self {
        Self
    }

    fn read_csv(path: &Path) -> PipelineResult<Table> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;
        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<Result<Vec<Vec<String>>, _>>()?;
        debug!(path = %path.display(), rows = rows.len(), "csv read");
        Ok(Table::new(headers, rows))
    }

    fn csv_files(dir: &Path) -> PipelineResult<Vec<PathBuf>> {
        let mut files = fs::read_dir(dir)
            .map_err(|e| PipelineError::io(dir, e))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()
            .map_err(|e| PipelineError::io(dir, e))?;
        files.retain(|p| {
            p.is_file()
                && p.extension()
                    .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"))
        });
        files.sort();
        Ok(files)
    }
}

impl DatasetRepo for FsDatasetRepo {
    /// Read one CSV file, or concatenate every `*.csv` in a directory by name order.
    fn read_raw(&self, path: &Path) -> PipelineResult<Table> {
        if !path.exists() {
            return Err(PipelineError::io(
                path,
                io::Error::new(io::ErrorKind::NotFound, "raw data not found"),
            ));
        }
        if path.is_file() {
            return Self::read_csv(path);
        }

        let files = Self::csv_files(path)?;
        if files.is_empty() {
            return Err(PipelineError::invalid(format!(
                "no csv files under {}",
                path.display()
            )));
        }

        let mut combined: Option<Table> = None;
        for file in &files {
            let table = Self::read_csv(file)?;
            if let Some(acc) = combined.as_mut() {
                if acc.headers != table.headers {
                    return Err(PipelineError::invalid(format!(
                        "{} has a different header than the first raw file",
                        file.display()
                    )));
                }
                acc.rows.extend(table.rows);
            } else {
                combined = Some(table);
            }
        }
        info!(files = files.len(), dir = %path.display(), "raw directory merged");
        Ok(combined.unwrap_or_default())
    }

    fn write_table(&self, path: &Path, table: &Table) -> PipelineResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&table.headers)?;
        for row in &table.rows {
            writer.write_record(row)?;
        }
        writer.flush().map_err(|e| PipelineError::io(path, e))?;
        debug!(path = %path.display(), rows = table.len(), "csv written");
        Ok(())
    }
}
