//! Config path and profile name resolution.
use std::{env, path::PathBuf};

use anyhow::{Context, Result};

use crate::config::{ProfileSource, CONFIG_ENV_KEY, DEFAULT_CONFIG_PATH};

pub const PROFILE_ENV_KEY: &str = "TGI_LAUNCH_PROFILE";

/// Where the configuration path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigPathSource {
    Cli,
    Env,
    Default,
}

impl ConfigPathSource {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConfigPathSource::Cli => "cli",
            ConfigPathSource::Env => "env",
            ConfigPathSource::Default => "default",
        }
    }
}

/// Absolute configuration path plus its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocation {
    pub path: PathBuf,
    pub source: ConfigPathSource,
}

/// Resolve config path in the order: CLI override → env var → default.
pub fn resolve_config_path(override_path: Option<PathBuf>) -> Result<ConfigLocation> {
    let (path, source) = match override_path {
        Some(path) => (path, ConfigPathSource::Cli),
        None => match env::var_os(CONFIG_ENV_KEY).filter(|value| !value.is_empty()) {
            Some(value) => (PathBuf::from(value), ConfigPathSource::Env),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), ConfigPathSource::Default),
        },
    };

    if path.is_absolute() {
        return Ok(ConfigLocation { path, source });
    }

    let cwd = env::current_dir().context("failed to obtain current directory")?;
    Ok(ConfigLocation {
        path: cwd.join(path),
        source,
    })
}

/// Resolve the requested profile in the order: CLI argument → env var.
///
/// `None` leaves the choice to the configuration file.
pub fn resolve_profile_name(cli: Option<String>) -> Option<(String, ProfileSource)> {
    select_profile_name(cli, env::var(PROFILE_ENV_KEY).ok())
}

fn select_profile_name(
    cli: Option<String>,
    env_value: Option<String>,
) -> Option<(String, ProfileSource)> {
    if let Some(name) = cli.and_then(|v| normalize_name(&v)) {
        return Some((name, ProfileSource::Cli));
    }
    env_value
        .and_then(|v| normalize_name(&v))
        .map(|name| (name, ProfileSource::Env))
}

/// Profile names become TOML table keys that load case-folded; keep them to
/// `[a-z0-9_-]`.
pub fn is_valid_profile_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

fn normalize_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}
