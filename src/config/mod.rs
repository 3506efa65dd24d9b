//! Load launch profiles from a configuration file.
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{error, info};

use crate::{
    launch::{CliRunner, LaunchSpec, DEFAULT_RUNTIME},
    lib::errors::{ConfigError, LoadError},
};

pub mod overrides;
pub mod profile;
pub mod telemetry;

pub use profile::{RawGpus, RawProfile};

pub const CONFIG_ENV_KEY: &str = "TGI_LAUNCH_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "launch.toml";

/// Container CLI used to run launches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSection {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_RUNTIME),
            args: Vec::new(),
        }
    }
}

impl RunnerSection {
    pub fn runner(&self) -> CliRunner {
        CliRunner::new(self.program.clone()).with_prefix_args(self.args.clone())
    }
}

/// A named profile after `[defaults]` were merged in.
#[derive(Debug, Clone)]
pub struct Profile {
    pub name: String,
    pub raw: RawProfile,
    pub spec: LaunchSpec,
}

/// How the active profile was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSource {
    Cli,
    Env,
    DefaultProfile,
    OnlyProfile,
}

impl ProfileSource {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ProfileSource::Cli => "cli",
            ProfileSource::Env => "env",
            ProfileSource::DefaultProfile => "default_profile",
            ProfileSource::OnlyProfile => "only_profile",
        }
    }
}

/// Selected profile with environment overrides applied.
#[derive(Debug, Clone)]
pub struct ResolvedProfile {
    pub name: String,
    pub source: ProfileSource,
    pub spec: LaunchSpec,
    pub overrides: Vec<String>,
}

/// Top-level configuration container.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub default_profile: Option<String>,
    pub runner: RunnerSection,
    pub profiles: BTreeMap<String, Profile>,
    pub source_path: PathBuf,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RawRunnerSection {
    /// Container CLI, `docker` when unset.
    pub program: Option<String>,
    /// Arguments placed before `run`.
    pub args: Option<Vec<String>>,
}

/// Configuration file layout.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RawLaunchConfig {
    /// Profile used when none is requested.
    pub default_profile: Option<String>,
    pub runner: Option<RawRunnerSection>,
    /// Fields inherited by every profile.
    #[serde(default)]
    pub defaults: RawProfile,
    #[serde(default)]
    pub profiles: BTreeMap<String, RawProfile>,
}

impl LaunchConfig {
    /// Load configuration from a specific path.
    pub fn load_from_path(path: PathBuf) -> Result<Self, LoadError> {
        info!(
            target: "tgi_launch::config",
            path = %path.display(),
            "Starting configuration load"
        );

        let builder = config::Config::builder().add_source(config::File::from(path.clone()));
        let document = builder.build().map_err(|err| {
            let error = LoadError::from_read_error(path.clone(), err);
            error!(
                target: "tgi_launch::config",
                path = %path.display(),
                reason = %error,
                "Failed to read configuration file"
            );
            error
        })?;

        let raw: RawLaunchConfig = document.try_deserialize().map_err(|err| {
            let error = LoadError::from_parse_error(path.clone(), err);
            error!(
                target: "tgi_launch::config",
                path = %path.display(),
                reason = %error,
                "Failed to parse configuration file"
            );
            error
        })?;

        let config = Self::from_raw(raw, path.clone()).map_err(|err| {
            error!(
                target: "tgi_launch::config",
                path = %path.display(),
                reason = %err,
                "Failed to convert configuration profiles"
            );
            err
        })?;

        telemetry::log_loaded(&config);
        Ok(config)
    }

    fn from_raw(raw: RawLaunchConfig, path: PathBuf) -> Result<Self, LoadError> {
        let runner = parse_runner_section(raw.runner, &path)?;

        if raw.profiles.is_empty() {
            return Err(LoadError::EmptyProfiles { path });
        }

        let mut profiles = BTreeMap::new();
        for (name, profile) in raw.profiles {
            let name = profile_key(&name);
            let merged = raw.defaults.overlay(&profile);
            let spec = merged
                .to_spec()
                .map_err(|err| profile_error(&path, &name, err))?;
            profiles.insert(
                name.clone(),
                Profile {
                    name,
                    raw: merged,
                    spec,
                },
            );
        }

        let default_profile = raw.default_profile.as_deref().map(profile_key);
        if let (Some(requested), Some(default)) = (&raw.default_profile, &default_profile) {
            if !profiles.contains_key(default) {
                return Err(LoadError::ProfileNotFound {
                    path,
                    profile: requested.clone(),
                    available: profiles.keys().cloned().collect(),
                });
            }
        }

        Ok(Self {
            default_profile,
            runner,
            profiles,
            source_path: path,
        })
    }

    pub fn profile_names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    /// Pick a profile: the requested name, then `default_profile`, then the
    /// only profile when exactly one exists. Names match case-insensitively.
    pub fn select(
        &self,
        requested: Option<(String, ProfileSource)>,
    ) -> Result<(&Profile, ProfileSource), LoadError> {
        let (name, source) = match (requested, &self.default_profile) {
            (Some(requested), _) => requested,
            (None, Some(default)) => (default.clone(), ProfileSource::DefaultProfile),
            (None, None) if self.profiles.len() == 1 => match self.profiles.keys().next() {
                Some(only) => (only.clone(), ProfileSource::OnlyProfile),
                None => {
                    return Err(LoadError::EmptyProfiles {
                        path: self.source_path.clone(),
                    })
                }
            },
            (None, None) => {
                return Err(LoadError::NoProfileSelected {
                    path: self.source_path.clone(),
                })
            }
        };

        let profile = self
            .profiles
            .get(&profile_key(&name))
            .ok_or_else(|| LoadError::ProfileNotFound {
                path: self.source_path.clone(),
                profile: name.clone(),
                available: self.profile_names(),
            })?;
        Ok((profile, source))
    }

    /// Select a profile and apply environment overrides to it.
    pub fn resolve(
        &self,
        requested: Option<(String, ProfileSource)>,
        overrides: &RawProfile,
    ) -> Result<ResolvedProfile, LoadError> {
        let (profile, source) = self.select(requested)?;
        let override_fields = overrides::field_names(overrides);
        let spec = if overrides.is_empty() {
            profile.spec.clone()
        } else {
            profile
                .raw
                .overlay(overrides)
                .to_spec()
                .map_err(|err| profile_error(&self.source_path, &profile.name, err))?
        };

        telemetry::log_selected(&profile.name, source.as_str(), &override_fields);
        Ok(ResolvedProfile {
            name: profile.name.clone(),
            source,
            spec,
            overrides: override_fields,
        })
    }

    /// Validate every profile, in name order.
    pub fn validate_all(&self) -> Vec<(&str, Result<(), ConfigError>)> {
        self.profiles
            .values()
            .map(|profile| (profile.name.as_str(), profile.spec.validate()))
            .collect()
    }
}

fn parse_runner_section(
    raw: Option<RawRunnerSection>,
    path: &Path,
) -> Result<RunnerSection, LoadError> {
    let Some(raw) = raw else {
        return Ok(RunnerSection::default());
    };
    let program = raw.program.unwrap_or_else(|| DEFAULT_RUNTIME.to_string());
    if program.trim().is_empty() {
        return Err(LoadError::MissingField {
            path: path.to_path_buf(),
            field: "runner.program".into(),
        });
    }
    Ok(RunnerSection {
        program: PathBuf::from(program),
        args: raw.args.unwrap_or_default(),
    })
}

/// Profile table keys are case-folded by the `config` crate; names are
/// compared in the same folded form.
pub fn profile_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

fn profile_error(path: &Path, name: &str, err: ConfigError) -> LoadError {
    match err {
        ConfigError::MissingField { field } => LoadError::MissingField {
            path: path.to_path_buf(),
            field: format!("profiles.{name}.{field}"),
        },
        other => LoadError::InvalidProfile {
            path: path.to_path_buf(),
            profile: name.to_string(),
            source: other,
        },
    }
}
