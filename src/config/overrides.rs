//! `TGI_LAUNCH_SET_*` environment overrides for the selected profile.
use std::collections::HashMap;

use config::{Config, Environment};

use crate::lib::errors::LoadError;

use super::RawProfile;

/// Prefix of override variables; `TGI_LAUNCH_SET_NUM_SHARD=4` sets `num_shard`.
pub const OVERRIDE_ENV_PREFIX: &str = "TGI_LAUNCH_SET";

/// Read overrides from the process environment.
pub fn from_env() -> Result<RawProfile, LoadError> {
    from_source(None)
}

/// Read overrides from `source` instead of the process environment when given.
///
/// Values stay strings until deserialization, so numeric and boolean fields
/// convert while `revision = "1.0"` is kept verbatim. Only scalar fields can
/// be overridden; list fields such as `mounts` are rejected.
pub fn from_source(source: Option<HashMap<String, String>>) -> Result<RawProfile, LoadError> {
    let environment = Environment::with_prefix(OVERRIDE_ENV_PREFIX)
        .try_parsing(false)
        .source(source);
    Config::builder()
        .add_source(environment)
        .build()
        .and_then(|document| document.try_deserialize::<RawProfile>())
        .map_err(|source| LoadError::Environment { source })
}

/// Names of the fields an override sets, for logging.
pub fn field_names(overrides: &RawProfile) -> Vec<String> {
    match serde_json::to_value(overrides) {
        Ok(serde_json::Value::Object(fields)) => fields.keys().cloned().collect(),
        _ => Vec::new(),
    }
}
