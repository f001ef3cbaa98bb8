//! SherlockBench CLI entry point.

use clap::Parser;
use std::process::ExitCode;

use sherlockbench::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match sherlockbench::cli::commands::run::execute(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
