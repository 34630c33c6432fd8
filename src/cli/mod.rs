//! Command-line surface shared by the `train` and `predict` binaries.

use std::ffi::OsStr;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser};
use tracing::{error, Level};

use crate::common::config::DEFAULT_CONFIG_PATH;
use crate::common::error::{ErrorCode, PipelineError};
use crate::common::layout::ProjectLayout;
use crate::common::log::{self, LogSettings};
use crate::data::domain::{DatasetRepo, Record};
use crate::data::repo_fs::FsDatasetRepo;
use crate::inference::domain::parse_records_str;
use crate::pipeline::{predict_from_config, train_from_config};

#[derive(Args, Clone, Debug)]
pub struct CommonArgs {
    /// Pipeline configuration file, relative to the project root
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Project root; relative paths in the configuration are resolved against it
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, default_value = "info")]
    pub log_level: Level,
}

impl CommonArgs {
    fn layout(&self) -> ProjectLayout {
        ProjectLayout::new(&self.root)
    }

    fn config_path(&self) -> PathBuf {
        self.layout().resolve(&self.config)
    }

    fn init_logging(&self) -> Result<PathBuf> {
        let settings = LogSettings {
            dir: self.layout().logs_dir(),
            level: self.log_level,
        };
        log::init(&settings).context("initialising logging")
    }
}

#[derive(Parser, Clone, Debug)]
#[command(name = "train", about = "Run the training pipeline described by the configuration", version)]
pub struct TrainArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Parser, Clone, Debug)]
#[command(name = "predict", about = "Score JSON or CSV records with the trained model", version)]
pub struct PredictArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Records to score: a .json file (object, array or {"data": [...]}) or a .csv file.
    /// Reads JSON from stdin when omitted.
    #[arg(long)]
    pub input: Option<PathBuf>,
}

pub fn run_train(args: &TrainArgs) -> Result<()> {
    args.common.init_logging()?;
    let summary = train_from_config(&args.common.config_path(), &args.common.root)?;
    let json = serde_json::to_string_pretty(&summary).context("serialising training summary")?;
    println!("{json}");
    Ok(())
}

pub fn run_predict(args: &PredictArgs) -> Result<()> {
    args.common.init_logging()?;
    let records = match &args.input {
        Some(path) => read_input_file(path)?,
        None => read_stdin()?,
    };
    let batch = predict_from_config(&args.common.config_path(), &args.common.root, &records)?;
    let json = serde_json::to_string(&batch).context("serialising predictions")?;
    println!("{json}");
    Ok(())
}

fn read_input_file(path: &Path) -> Result<Vec<Record>> {
    let is_csv = path
        .extension()
        .and_then(OsStr::to_str)
        .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        let table = FsDatasetRepo::new()
            .read_raw(path)
            .with_context(|| format!("reading input records from {}", path.display()))?;
        return Ok(table.to_records());
    }
    let text = fs::read_to_string(path)
        .map_err(|e| PipelineError::io(path, e))
        .with_context(|| format!("reading input records from {}", path.display()))?;
    Ok(parse_records_str(&text)?)
}

fn read_stdin() -> Result<Vec<Record>> {
    let mut text = String::new();
    io::stdin()
        .read_to_string(&mut text)
        .map_err(|e| PipelineError::io("<stdin>", e))
        .context("reading input records from stdin")?;
    Ok(parse_records_str(&text)?)
}

/// Exit status for a failed run: the pipeline code when there is one, `Internal` otherwise.
pub fn error_code(err: &anyhow::Error) -> ErrorCode {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<PipelineError>())
        .map_or(ErrorCode::Internal, PipelineError::code)
}

/// Log and print the failure, then turn it into a process exit status.
pub fn exit_with(outcome: Result<()>) -> ExitCode {
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = error_code(&err);
            let message = format!("{err:#}");
            error!(code = code as u8, error = %message, "run failed");
            eprintln!("error: {message}");
            ExitCode::from(code as u8)
        }
    }
}
