use std::path::Path;

use tracing::{debug, info};

use super::{LaunchConfig, CONFIG_ENV_KEY, DEFAULT_CONFIG_PATH};

/// `source` is `cli`, `env` or `default`.
pub fn log_config_source(path: &Path, source: &'static str) {
    match source {
        "env" => info!(
            target: "tgi_launch::config",
            path = %path.display(),
            "Loading configuration using TGI_LAUNCH_CONFIG environment variable"
        ),
        "default" => debug!(
            target: "tgi_launch::config",
            path = %path.display(),
            env = CONFIG_ENV_KEY,
            default = DEFAULT_CONFIG_PATH,
            "TGI_LAUNCH_CONFIG not set; using default launch.toml"
        ),
        _ => debug!(
            target: "tgi_launch::config",
            path = %path.display(),
            source,
            "Loading configuration from command-line path"
        ),
    }
}

pub fn log_loaded(config: &LaunchConfig) {
    info!(
        target: "tgi_launch::config",
        path = %config.source_path.display(),
        profiles = config.profiles.len(),
        default_profile = config.default_profile.as_deref().unwrap_or("-"),
        runtime = %config.runner.program.display(),
        "Configuration file loaded successfully"
    );
}

pub fn log_selected(name: &str, source: &'static str, overrides: &[String]) {
    if overrides.is_empty() {
        info!(
            target: "tgi_launch::config",
            profile = name,
            source,
            "Selected launch profile"
        );
    } else {
        info!(
            target: "tgi_launch::config",
            profile = name,
            source,
            overrides = %overrides.join(","),
            "Selected launch profile with environment overrides"
        );
    }
}
