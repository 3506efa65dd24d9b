//! Entry point for tgi-launch.
use std::process::ExitCode;

use clap::Parser;
use tgi_launch::{
    cli::{self, CliArgs, CliExit},
    lib::telemetry,
};

#[tokio::main]
async fn main() -> ExitCode {
    match bootstrap().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(exit) => exit.report(),
    }
}

async fn bootstrap() -> Result<(), CliExit> {
    telemetry::init_tracing().map_err(CliExit::from_error)?;
    let args = CliArgs::parse();
    let command = args.into_command()?;
    cli::run(command).await
}
