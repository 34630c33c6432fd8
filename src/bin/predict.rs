use std::process::ExitCode;

use clap::Parser;
use dsflow::cli::{self, PredictArgs};

fn main() -> ExitCode {
    let args = PredictArgs::parse();
    cli::exit_with(cli::run_predict(&args))
}
