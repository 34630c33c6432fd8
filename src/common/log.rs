//! Process-wide logger and stage instrumentation.
//!
//! `init` installs a `tracing_subscriber::fmt` subscriber that writes every
//! event to stderr and to a timestamped file under the log directory.
//! Components only use the `tracing` macros.

use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use tracing::{debug, error, info, info_span, Level};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use crate::common::error::{PipelineError, PipelineResult};
use crate::common::time;

static LOG_FILE: OnceLock<PathBuf> = OnceLock::new();

#[derive(Clone, Debug)]
pub struct LogSettings {
    pub dir: PathBuf,
    pub level: Level,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            level: Level::INFO,
        }
    }
}

/// Install the global logger once. Later calls return the first log file.
pub fn init(settings: &LogSettings) -> PipelineResult<PathBuf> {
    if let Some(path) = LOG_FILE.get() {
        return Ok(path.clone());
    }

    fs::create_dir_all(&settings.dir).map_err(|e| PipelineError::io(&settings.dir, e))?;
    let path = settings.dir.join(time::log_file_name());
    let file = File::create(&path).map_err(|e| PipelineError::io(&path, e))?;

    let installed = tracing_subscriber::fmt()
        .with_max_level(settings.level)
        .with_ansi(false)
        .with_line_number(true)
        .with_writer(Mutex::new(file).and(std::io::stderr))
        .try_init();
    if installed.is_err() {
        debug!("global subscriber already installed, keeping it");
    }

    let path = LOG_FILE.get_or_init(|| path).clone();
    info!(log_file = %path.display(), "logging initialised");
    Ok(path)
}

/// Run one pipeline stage inside a `stage` span, logging its duration.
pub fn run_stage<T>(
    name: &'static str,
    stage: impl FnOnce() -> PipelineResult<T>,
) -> PipelineResult<T> {
    let span = info_span!("stage", stage = name);
    let _guard = span.enter();
    info!("stage started");

    let start = Instant::now();
    let outcome = stage();
    let dur_ms = time::elapsed_ms(start);
    match &outcome {
        Ok(_) => info!(dur_ms, "stage finished"),
        Err(err) => error!(
            dur_ms,
            code = err.code() as u8,
            error = %err.chain(),
            "stage failed"
        ),
    }
    outcome
}
