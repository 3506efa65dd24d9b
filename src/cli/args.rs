//! CLI argument definitions and `ParsedCommand` construction.
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use super::{is_valid_profile_name, resolve_config_path, CliExit, ConfigLocation};

/// Parsed command intent with the configuration location resolved.
#[derive(Debug, Clone)]
pub struct ParsedCommand {
    pub config: ConfigLocation,
    pub command: CliCommand,
}

/// Output format of `render`.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum RenderFormat {
    /// One copy-pasteable shell command line.
    Shell,
    /// Container and server flags, one per line.
    Tokens,
    /// Program, argument vector, tokens and fingerprint as JSON.
    Json,
}

/// Top-level commands.
#[derive(Debug, Clone, Subcommand)]
pub enum CliCommand {
    /// Validate a profile and run it through the container runtime.
    Launch(LaunchArgs),
    /// Print the composed command without running it.
    Render(RenderArgs),
    /// Validate one profile, or every profile with --all.
    Validate(ValidateArgs),
    /// List the profiles in the configuration file.
    Profiles(ProfilesArgs),
    /// Convert an existing `docker run` command line into a profile.
    #[command(
        after_help = "Example: tgi-launch import --name llama2-7b -- docker run --gpus all img:1.4 --model-id /models/llama2-7b"
    )]
    Import(ImportArgs),
    /// Print the JSON Schema of the configuration file.
    Schema,
}

/// Arguments for `launch`.
#[derive(Debug, Clone, Args)]
pub struct LaunchArgs {
    /// Profile name (overrides TGI_LAUNCH_PROFILE).
    #[arg(long)]
    pub profile: Option<String>,
    /// Print the command that would run and exit.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
    /// Container CLI to use instead of `[runner] program`.
    #[arg(long, value_name = "PROGRAM")]
    pub runtime: Option<PathBuf>,
    /// Print the launch report as JSON on success.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// Arguments for `render`.
#[derive(Debug, Clone, Args)]
pub struct RenderArgs {
    /// Profile name (overrides TGI_LAUNCH_PROFILE).
    #[arg(long)]
    pub profile: Option<String>,
    #[arg(long, value_enum, default_value_t = RenderFormat::Shell)]
    pub format: RenderFormat,
}

/// Arguments for `validate`.
#[derive(Debug, Clone, Args)]
pub struct ValidateArgs {
    /// Profile name (overrides TGI_LAUNCH_PROFILE).
    #[arg(long, conflicts_with = "all")]
    pub profile: Option<String>,
    /// Validate every profile in the file.
    #[arg(long, default_value_t = false)]
    pub all: bool,
}

/// Arguments for `profiles`.
#[derive(Debug, Clone, Args)]
pub struct ProfilesArgs {
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// Arguments for `import`.
#[derive(Debug, Clone, Args)]
pub struct ImportArgs {
    /// Name of the emitted profile.
    #[arg(long)]
    pub name: String,
    /// The `docker run ...` command line, after `--`.
    #[arg(last = true, required = true, value_name = "COMMAND")]
    pub argv: Vec<String>,
}

/// Command-line arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "tgi-launch",
    author,
    version,
    about = "Compose, validate and run text-generation-inference container launches",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the profile file (overrides TGI_LAUNCH_CONFIG).
    #[arg(long = "config", global = true)]
    pub config_override: Option<PathBuf>,
    #[command(subcommand)]
    pub command: CliCommand,
}

impl CliArgs {
    /// Resolve the configuration location and check command arguments.
    ///
    /// Failures exit with the validation code, like clap's own usage errors.
    pub fn into_command(self) -> Result<ParsedCommand, CliExit> {
        validate_command(&self.command).map_err(CliExit::from_usage)?;
        let config = resolve_config_path(self.config_override).map_err(CliExit::from_usage)?;
        Ok(ParsedCommand {
            config,
            command: self.command,
        })
    }
}

fn validate_command(command: &CliCommand) -> Result<()> {
    if let CliCommand::Import(args) = command {
        if !is_valid_profile_name(&args.name) {
            return Err(anyhow!(
                "invalid profile name `{}`: use lowercase letters, digits, `-` and `_`",
                args.name
            ));
        }
    }
    Ok(())
}
