//! Conventional project directory layout.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::common::error::{PipelineError, PipelineResult};

pub const RAW_DATA_DIR: &str = "data/raw";
pub const PROCESSED_DATA_DIR: &str = "data/processed";
pub const MODELS_DIR: &str = "models";
pub const LOGS_DIR: &str = "logs";

/// Directories every project carries, relative to the project root.
pub const CONVENTIONAL_DIRS: [&str; 4] = [RAW_DATA_DIR, PROCESSED_DATA_DIR, MODELS_DIR, LOGS_DIR];

#[derive(Clone, Debug)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute paths are kept; relative ones are taken from the project root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join(RAW_DATA_DIR)
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.root.join(PROCESSED_DATA_DIR)
    }

    pub fn models_dir(&self) -> PathBuf {
        self.root.join(MODELS_DIR)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }

    /// Create all conventional directories. Existing ones are left alone.
    pub fn create(&self) -> PipelineResult<Vec<PathBuf>> {
        CONVENTIONAL_DIRS
            .iter()
            .map(|dir| {
                let path = self.root.join(dir);
                fs::create_dir_all(&path).map_err(|e| PipelineError::io(&path, e))?;
                debug!(path = %path.display(), "directory ready");
                Ok(path)
            })
            .collect()
    }
}
