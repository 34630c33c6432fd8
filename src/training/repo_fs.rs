//! Filesystem repository for model artifacts stored as pretty JSON.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::common::error::{PipelineError, PipelineResult};

use super::domain::{ModelArtifact, ModelRepo};

#[derive(Clone, Copy, Debug, Default)]
pub struct FsModelRepo;

impl FsModelRepo {
    pub fn new() -> Self {
        Self
    }
}

impl ModelRepo for FsModelRepo {
    fn save(&self, path: &Path, artifact: &ModelArtifact) -> PipelineResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
        let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, artifact)?;
        writer
            .write_all(b"\n")
            .and_then(|_| writer.flush())
            .map_err(|e| PipelineError::io(path, e))?;
        info!(
            path = %path.display(),
            kind = %artifact.metadata.model_kind,
            "model artifact saved"
        );
        Ok(())
    }

    fn load(&self, path: &Path) -> PipelineResult<ModelArtifact> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PipelineError::model_not_found(path))
            }
            Err(e) => return Err(PipelineError::io(path, e)),
        };
        let artifact: ModelArtifact = serde_json::from_reader(BufReader::new(file))?;
        info!(
            path = %path.display(),
            kind = %artifact.metadata.model_kind,
            trained_at = %artifact.metadata.trained_at,
            "model artifact loaded"
        );
        Ok(artifact)
    }
}
