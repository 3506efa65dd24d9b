//! CLI entrypoint module structure.
use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::{
    config::{self, overrides, LaunchConfig, RawLaunchConfig, RawProfile, ResolvedProfile},
    launch::{parse_argv, render, CliRunner, ContainerInvocation, LaunchSpec},
    lib::shell,
};

pub mod args;
pub mod exit;
pub mod launch;
pub mod profile;

pub use args::{
    CliArgs, CliCommand, ImportArgs, LaunchArgs, ParsedCommand, ProfilesArgs, RenderArgs,
    RenderFormat, ValidateArgs,
};
pub use exit::{CliExit, SPAWN_FAILURE_EXIT_CODE, VALIDATION_EXIT_CODE};
pub use profile::{
    is_valid_profile_name, resolve_config_path, resolve_profile_name, ConfigLocation,
    ConfigPathSource, PROFILE_ENV_KEY,
};

/// Run one parsed command. Output goes to stdout, logs to stderr.
pub async fn run(parsed: ParsedCommand) -> Result<(), CliExit> {
    match parsed.command {
        CliCommand::Launch(args) => launch::run(&parsed.config, args).await,
        CliCommand::Render(args) => {
            println!("{}", render_profile(&parsed.config, args)?);
            Ok(())
        }
        CliCommand::Validate(args) => validate_profiles(&parsed.config, args),
        CliCommand::Profiles(args) => {
            println!("{}", list_profiles(&parsed.config, args)?);
            Ok(())
        }
        CliCommand::Import(args) => {
            print!("{}", import_profile(args)?);
            Ok(())
        }
        CliCommand::Schema => {
            println!("{}", config_schema().map_err(CliExit::from_error)?);
            Ok(())
        }
    }
}

pub(crate) fn load_config(location: &ConfigLocation) -> Result<LaunchConfig, CliExit> {
    config::telemetry::log_config_source(&location.path, location.source.as_str());
    LaunchConfig::load_from_path(location.path.clone()).map_err(CliExit::from_load)
}

/// Select the profile (CLI → env → file) and apply `TGI_LAUNCH_SET_*` overrides.
pub(crate) fn resolve_profile(
    config: &LaunchConfig,
    requested: Option<String>,
) -> Result<ResolvedProfile, CliExit> {
    let overrides = overrides::from_env().map_err(CliExit::from_load)?;
    config
        .resolve(resolve_profile_name(requested), &overrides)
        .map_err(CliExit::from_load)
}

/// Text for `render` and `launch --dry-run`.
pub fn format_invocation(
    spec: &LaunchSpec,
    runner: &CliRunner,
    format: RenderFormat,
) -> Result<String> {
    let invocation = ContainerInvocation::from_spec(spec);
    let command_line = runner.command_line(&invocation);
    let text = match format {
        RenderFormat::Shell => shell::join(&command_line),
        RenderFormat::Tokens => render(spec).join("\n"),
        RenderFormat::Json => serde_json::to_string_pretty(&json!({
            "program": runner.program().to_string_lossy(),
            "argv": &command_line[1..],
            "tokens": invocation.tokens(),
            "fingerprint": invocation.fingerprint(),
        }))?,
    };
    Ok(text)
}

fn render_profile(location: &ConfigLocation, args: RenderArgs) -> Result<String, CliExit> {
    let config = load_config(location)?;
    let resolved = resolve_profile(&config, args.profile)?;
    resolved
        .spec
        .validate()
        .map_err(|err| CliExit::from_failure(err.into()))?;
    format_invocation(&resolved.spec, &config.runner.runner(), args.format)
        .map_err(CliExit::from_error)
}

fn validate_profiles(location: &ConfigLocation, args: ValidateArgs) -> Result<(), CliExit> {
    let config = load_config(location)?;

    if !args.all {
        let resolved = resolve_profile(&config, args.profile)?;
        resolved
            .spec
            .validate()
            .map_err(|err| CliExit::from_failure(err.into()))?;
        println!("ok       {}", resolved.name);
        return Ok(());
    }

    let results = config.validate_all();
    let mut failed = 0usize;
    for (name, result) in &results {
        match result {
            Ok(()) => println!("ok       {name}"),
            Err(err) => {
                failed += 1;
                println!("invalid  {name}: {err}");
            }
        }
    }
    if failed > 0 {
        return Err(CliExit::new(
            format!(
                "error: {failed} of {} profiles failed validation",
                results.len()
            ),
            VALIDATION_EXIT_CODE,
        ));
    }
    Ok(())
}

#[derive(Serialize)]
struct ProfileSummary<'a> {
    name: &'a str,
    default: bool,
    image: &'a str,
    model_id: &'a str,
    valid: bool,
}

fn list_profiles(location: &ConfigLocation, args: ProfilesArgs) -> Result<String, CliExit> {
    let config = load_config(location)?;
    let summaries: Vec<ProfileSummary<'_>> = config
        .profiles
        .values()
        .map(|profile| ProfileSummary {
            name: &profile.name,
            default: config.default_profile.as_deref() == Some(profile.name.as_str()),
            image: &profile.spec.image,
            model_id: &profile.spec.model_id,
            valid: profile.spec.validate().is_ok(),
        })
        .collect();

    if args.json {
        return serde_json::to_string_pretty(&summaries).map_err(CliExit::from_error);
    }

    let width = summaries.iter().map(|s| s.name.len()).max().unwrap_or(0);
    let lines: Vec<String> = summaries
        .iter()
        .map(|s| {
            let marker = if s.default { '*' } else { ' ' };
            let invalid = if s.valid { "" } else { "  (invalid)" };
            format!(
                "{marker} {:<width$}  {}  {}{invalid}",
                s.name, s.model_id, s.image
            )
        })
        .collect();
    Ok(lines.join("\n"))
}

#[derive(Serialize)]
struct ImportedProfiles {
    profiles: BTreeMap<String, RawProfile>,
}

fn import_profile(args: ImportArgs) -> Result<String, CliExit> {
    let spec = parse_argv(&args.argv).map_err(CliExit::from_parse)?;
    if let Err(err) = spec.validate() {
        warn!(
            target: "tgi_launch::config",
            profile = %args.name,
            reason = %err,
            "Imported command does not pass validation; fix the profile before launching"
        );
    }

    let document = ImportedProfiles {
        profiles: BTreeMap::from([(args.name, RawProfile::from(&spec))]),
    };
    toml::to_string_pretty(&document).map_err(CliExit::from_error)
}

/// JSON Schema of the configuration file.
pub fn config_schema() -> Result<String> {
    Ok(serde_json::to_string_pretty(&schemars::schema_for!(
        RawLaunchConfig
    ))?)
}
