//! `launch` command.
use serde::Serialize;
use tracing::info;

use crate::launch::{execute, CliRunner, LaunchReport};

use super::{
    format_invocation, load_config, resolve_profile, CliExit, ConfigLocation, LaunchArgs,
    RenderFormat,
};

#[derive(Serialize)]
struct LaunchOutput<'a> {
    profile: &'a str,
    #[serde(flatten)]
    report: &'a LaunchReport,
}

/// Resolve the profile, then validate, render and run it.
pub async fn run(location: &ConfigLocation, args: LaunchArgs) -> Result<(), CliExit> {
    let config = load_config(location)?;
    let resolved = resolve_profile(&config, args.profile)?;
    let runner = match args.runtime {
        Some(program) => CliRunner::new(program),
        None => config.runner.runner(),
    };

    if args.dry_run {
        resolved
            .spec
            .validate()
            .map_err(|err| CliExit::from_failure(err.into()))?;
        let format = if args.json {
            RenderFormat::Json
        } else {
            RenderFormat::Shell
        };
        let text =
            format_invocation(&resolved.spec, &runner, format).map_err(CliExit::from_error)?;
        println!("{text}");
        return Ok(());
    }

    info!(
        target: "tgi_launch::launch",
        profile = %resolved.name,
        runtime = %runner.program().display(),
        "Launching profile"
    );
    let report = execute(&resolved.spec, &runner)
        .await
        .map_err(CliExit::from_failure)?;

    if args.json {
        let output = LaunchOutput {
            profile: &resolved.name,
            report: &report,
        };
        let text = serde_json::to_string_pretty(&output).map_err(CliExit::from_error)?;
        println!("{text}");
    }
    Ok(())
}
