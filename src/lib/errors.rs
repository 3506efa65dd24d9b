use std::{io, path::PathBuf};

use config::ConfigError as ConfigLoaderError;
use thiserror::Error;

/// A launch spec failed validation. Nothing has been started yet.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    /// A numeric field is out of range or breaks an ordering invariant.
    #[error("`{field}` is out of range: {message}")]
    InvalidRange {
        field: &'static str,
        message: String,
    },
    /// `field` must be set because `required_by` is set.
    #[error("`{field}` is required when `{required_by}` is set")]
    MissingDependentField {
        field: &'static str,
        required_by: &'static str,
    },
    /// Shard count is zero or exceeds the selected devices.
    #[error("invalid shard count {num_shard}: {message}")]
    InvalidShardCount { num_shard: u32, message: String },
    /// Required field is empty.
    #[error("`{field}` must not be empty")]
    MissingField { field: &'static str },
    /// Field value is malformed.
    #[error("`{field}` is invalid: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
    /// Two fields cannot be combined.
    #[error("`{field}` cannot be combined with `{conflicts_with}`")]
    Conflict {
        field: &'static str,
        conflicts_with: &'static str,
    },
}

/// Errors that can occur while loading a profile configuration file.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Failed to build (read) the configuration file.
    #[error("Failed to read configuration file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: ConfigLoaderError,
    },
    /// Failed to deserialize the document into profile sections.
    #[error("Failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ConfigLoaderError,
    },
    /// Failed to read `TGI_LAUNCH_SET_*` overrides.
    #[error("Failed to read environment overrides: {source}")]
    Environment {
        #[source]
        source: ConfigLoaderError,
    },
    /// Required field is missing after merging defaults.
    #[error("Configuration file {path} is missing `{field}`")]
    MissingField { path: PathBuf, field: String },
    /// Profile literal (mount, env, gpus, ports) is malformed.
    #[error("Configuration file {path} has an invalid profile `{profile}`: {source}")]
    InvalidProfile {
        path: PathBuf,
        profile: String,
        #[source]
        source: ConfigError,
    },
    /// No `[profiles.*]` section exists.
    #[error("Configuration file {path} defines no profiles")]
    EmptyProfiles { path: PathBuf },
    /// Selected profile name is unknown.
    #[error("Profile `{profile}` not found in {path} (available: {available})", available = .available.join(", "))]
    ProfileNotFound {
        path: PathBuf,
        profile: String,
        available: Vec<String>,
    },
    /// Several profiles exist and none was selected.
    #[error("Configuration file {path} has several profiles and no default; pass --profile or set TGI_LAUNCH_PROFILE")]
    NoProfileSelected { path: PathBuf },
}

impl LoadError {
    /// Helper to wrap `config::ConfigError` as a read failure.
    pub fn from_read_error(path: PathBuf, source: ConfigLoaderError) -> Self {
        Self::FileRead { path, source }
    }

    /// Helper to wrap `config::ConfigError` as a parse failure.
    pub fn from_parse_error(path: PathBuf, source: ConfigLoaderError) -> Self {
        Self::Parse { path, source }
    }
}

/// The container runner could not start or did not succeed.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Failed to start container runtime `{program}`: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Container runtime exited with status {code}")]
    NonZeroExit { code: i32 },
    #[error("Container runtime was terminated without an exit status")]
    Terminated,
}

/// Failure returned by `launch::execute`.
#[derive(Debug, Error)]
pub enum LaunchFailure {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

/// A `docker run` argument vector could not be mapped onto a launch spec.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected a `run` invocation")]
    MissingRunSubcommand,
    #[error("no image found in the invocation")]
    MissingImage,
    #[error("no `--model-id` found in the invocation")]
    MissingModelId,
    #[error("unsupported container flag `{flag}`")]
    UnsupportedFlag { flag: String },
    #[error("flag `{flag}` expects a value")]
    MissingValue { flag: String },
    #[error("flag `{flag}` has an invalid value `{value}`: {message}")]
    InvalidValue {
        flag: String,
        value: String,
        message: String,
    },
}
