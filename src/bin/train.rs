use std::process::ExitCode;

use clap::Parser;
use dsflow::cli::{self, TrainArgs};

fn main() -> ExitCode {
    let args = TrainArgs::parse();
    cli::exit_with(cli::run_train(&args))
}
