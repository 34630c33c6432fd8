//! Error handling primitives shared across the pipelines.
//!
//! Every fallible operation returns [`PipelineResult`]. Stages attach their
//! name and call site through [`ResultExt::wrap_err`] before handing the
//! failure back to the caller; nothing here recovers or retries.

use std::io;
use std::panic::Location;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::common::config::ConfigError;

/// Stable codes used as process exit status by the binaries.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorCode {
    /// Success code used as a sentinel.
    Ok = 0,
    /// Catch-all for bugs and paths with no dedicated code.
    Internal = 1,
    /// Configuration file missing, malformed or incomplete.
    Config = 2,
    /// Requested model artifact was not available.
    ModelMissing = 3,
    /// Input data failed validation.
    InvalidInput = 4,
    /// Filesystem or (de)serialization failure.
    Io = 5,
    /// Trained model did not reach the configured minimum score.
    QualityGate = 6,
}

impl ErrorCode {
    pub fn exit_code(self) -> i32 {
        self as i32
    }
}

/// Canonical error type for the crate.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("model artifact not found at {}", path.display())]
    ModelNotFound { path: PathBuf },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("io failure on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{model} scored {score:.4}, below the required minimum {threshold:.4}")]
    QualityGate {
        model: String,
        score: f64,
        threshold: f64,
    },
    #[error("{context} (at {location})")]
    Wrapped {
        context: String,
        location: &'static Location<'static>,
        #[source]
        source: Box<PipelineError>,
    },
}

/// Result alias used throughout the crate.
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn model_not_found(path: impl AsRef<Path>) -> Self {
        Self::ModelNotFound {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Innermost error once all context layers are peeled off.
    pub fn root(&self) -> &PipelineError {
        match self {
            Self::Wrapped { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self.root() {
            Self::Config(_) => ErrorCode::Config,
            Self::ModelNotFound { .. } => ErrorCode::ModelMissing,
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::Io { .. } | Self::Csv(_) | Self::Json(_) => ErrorCode::Io,
            Self::QualityGate { .. } => ErrorCode::QualityGate,
            Self::Wrapped { .. } => ErrorCode::Internal,
        }
    }

    pub fn is_model_not_found(&self) -> bool {
        matches!(self.root(), Self::ModelNotFound { .. })
    }

    pub fn is_config(&self) -> bool {
        matches!(self.root(), Self::Config(_))
    }

    /// Full diagnostic line: every context layer followed by the root cause.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut cur: Option<&(dyn std::error::Error + 'static)> =
            std::error::Error::source(self);
        while let Some(err) = cur {
            out.push_str(": ");
            out.push_str(&err.to_string());
            cur = err.source();
        }
        out
    }
}

/// Enrich a failure with a context message and the caller's location.
pub trait ResultExt<T> {
    fn wrap_err(self, context: impl Into<String>) -> PipelineResult<T>;

    fn wrap_err_with<C, F>(self, f: F) -> PipelineResult<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<PipelineError>,
{
    #[track_caller]
    fn wrap_err(self, context: impl Into<String>) -> PipelineResult<T> {
        let location = Location::caller();
        match self {
            Ok(value) => Ok(value),
            Err(err) => Err(PipelineError::Wrapped {
                context: context.into(),
                location,
                source: Box::new(err.into()),
            }),
        }
    }

    #[track_caller]
    fn wrap_err_with<C, F>(self, f: F) -> PipelineResult<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        let location = Location::caller();
        match self {
            Ok(value) => Ok(value),
            Err(err) => Err(PipelineError::Wrapped {
                context: f().into(),
                location,
                source: Box::new(err.into()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ErrorCode::Ok as u8, 0);
        assert_eq!(ErrorCode::Internal as u8, 1);
        assert_eq!(ErrorCode::Config as u8, 2);
        assert_eq!(ErrorCode::ModelMissing as u8, 3);
        assert_eq!(ErrorCode::InvalidInput as u8, 4);
        assert_eq!(ErrorCode::Io as u8, 5);
        assert_eq!(ErrorCode::QualityGate as u8, 6);
    }

    #[test]
    fn wrapping_keeps_root_kind_and_records_call_site() {
        let failing: PipelineResult<()> = Err(PipelineError::model_not_found("models/model.json"));
        let err = failing
            .wrap_err("loading artifact")
            .wrap_err("prediction")
            .unwrap_err();

        assert!(err.is_model_not_found());
        assert_eq!(err.code(), ErrorCode::ModelMissing);
        match &err {
            PipelineError::Wrapped { location, context, .. } => {
                assert_eq!(context, "prediction");
                assert!(location.file().ends_with("error.rs"));
            }
            other => panic!("expected wrapped error, got {other:?}"),
        }
    }

    #[test]
    fn chain_lists_every_layer() {
        let failing: PipelineResult<()> = Err(PipelineError::invalid("no rows"));
        let err = failing.wrap_err("data ingestion").unwrap_err();
        let text = err.chain();
        assert!(text.starts_with("data ingestion (at "));
        assert!(text.ends_with("invalid input: no rows"));
    }

    #[test]
    fn io_errors_convert_through_wrapper() {
        let raw: Result<(), PipelineError> = Err(PipelineError::io(
            "data/raw",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        ));
        let err = raw.wrap_err_with(|| format!("reading {}", "data/raw")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Io);
        assert!(!err.is_config());
    }
}
