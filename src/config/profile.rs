use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    launch::{
        parse_env_pair, Dtype, GpuSelection, LaunchSpec, Mount, PortMapping, Quantize,
        RopeScaling, DEFAULT_CONTAINER_PORT,
    },
    lib::errors::ConfigError,
};

/// GPU selection as written in a profile: a list, one index, or an expression.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum RawGpus {
    Devices(Vec<u32>),
    Index(u32),
    /// `all`, `device=0,1` or `0,1`.
    Expr(String),
}

/// One profile (or the `[defaults]` table) before merging and conversion.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RawProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpus: Option<RawGpus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shm_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_port: Option<u16>,
    /// Defaults to 80 when `published_port` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_port: Option<u16>,
    /// `host:container` or `host:container:ro`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mounts: Option<Vec<String>>,
    /// `NAME=VALUE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_on_exit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detach: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_shard: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantize: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_remote_code: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rope_scaling: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rope_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_input_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_batch_prefill_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_batch_total_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_stop_sequences: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_args: Option<Vec<String>>,
}

macro_rules! overlay_fields {
    ($base:expr, $top:expr, $($field:ident),+ $(,)?) => {
        RawProfile {
            $($field: $top.$field.clone().or_else(|| $base.$field.clone()),)+
        }
    };
}

impl RawProfile {
    /// Fields set in `top` win; lists are replaced, never concatenated.
    pub fn overlay(&self, top: &RawProfile) -> RawProfile {
        overlay_fields!(
            self,
            top,
            image,
            gpus,
            shm_size,
            published_port,
            container_port,
            mounts,
            env,
            container_name,
            remove_on_exit,
            detach,
            entrypoint,
            model_id,
            revision,
            num_shard,
            quantize,
            dtype,
            trust_remote_code,
            rope_scaling,
            rope_factor,
            max_input_length,
            max_total_tokens,
            max_batch_prefill_tokens,
            max_batch_total_tokens,
            max_stop_sequences,
            extra_args,
        )
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self == &RawProfile::default()
    }

    /// Convert literals into a `LaunchSpec`. Cross-field invariants are left
    /// to `LaunchSpec::validate`.
    pub fn to_spec(&self) -> Result<LaunchSpec, ConfigError> {
        let image = self
            .image
            .clone()
            .ok_or(ConfigError::MissingField { field: "image" })?;
        let model_id = self
            .model_id
            .clone()
            .ok_or(ConfigError::MissingField { field: "model_id" })?;

        let gpus = self.gpus.as_ref().map(gpu_selection).transpose()?;
        let port = match (self.published_port, self.container_port) {
            (Some(published), container) => Some(PortMapping {
                published,
                container: container.unwrap_or(DEFAULT_CONTAINER_PORT),
            }),
            (None, Some(_)) => {
                return Err(ConfigError::MissingDependentField {
                    field: "published_port",
                    required_by: "container_port",
                })
            }
            (None, None) => None,
        };

        let mounts = self
            .mounts
            .iter()
            .flatten()
            .map(|literal| {
                literal
                    .parse::<Mount>()
                    .map_err(|message| ConfigError::InvalidValue {
                        field: "mounts",
                        message,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let env = self
            .env
            .iter()
            .flatten()
            .map(|literal| {
                parse_env_pair(literal).map_err(|message| ConfigError::InvalidValue {
                    field: "env",
                    message,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LaunchSpec {
            image,
            gpus,
            shm_size: self.shm_size.clone(),
            port,
            mounts,
            env,
            container_name: self.container_name.clone(),
            remove_on_exit: self.remove_on_exit.unwrap_or(false),
            detach: self.detach.unwrap_or(false),
            entrypoint: self.entrypoint.clone(),
            model_id,
            revision: self.revision.clone(),
            num_shard: self.num_shard,
            quantize: parse_choice::<Quantize>("quantize", self.quantize.as_deref())?,
            dtype: parse_choice::<Dtype>("dtype", self.dtype.as_deref())?,
            trust_remote_code: self.trust_remote_code.unwrap_or(false),
            rope_scaling: parse_choice::<RopeScaling>(
                "rope_scaling",
                self.rope_scaling.as_deref(),
            )?,
            rope_factor: self.rope_factor,
            max_input_length: self.max_input_length,
            max_total_tokens: self.max_total_tokens,
            max_batch_prefill_tokens: self.max_batch_prefill_tokens,
            max_batch_total_tokens: self.max_batch_total_tokens,
            max_stop_sequences: self.max_stop_sequences,
            extra_args: self.extra_args.clone().unwrap_or_default(),
        })
    }
}

/// Profile literal for an existing spec, as emitted by `import`.
impl From<&LaunchSpec> for RawProfile {
    fn from(spec: &LaunchSpec) -> Self {
        let non_empty = |items: Vec<String>| (!items.is_empty()).then_some(items);
        RawProfile {
            image: Some(spec.image.clone()),
            gpus: spec.gpus.as_ref().map(|gpus| match gpus {
                GpuSelection::All => RawGpus::Expr("all".into()),
                GpuSelection::Devices(devices) => RawGpus::Devices(devices.iter().copied().collect()),
            }),
            shm_size: spec.shm_size.clone(),
            published_port: spec.port.map(|port| port.published),
            container_port: spec
                .port
                .map(|port| port.container)
                .filter(|container| *container != DEFAULT_CONTAINER_PORT),
            mounts: non_empty(spec.mounts.iter().map(Mount::to_string).collect()),
            env: non_empty(
                spec.env
                    .iter()
                    .map(|(name, value)| format!("{name}={value}"))
                    .collect(),
            ),
            container_name: spec.container_name.clone(),
            remove_on_exit: spec.remove_on_exit.then_some(true),
            detach: spec.detach.then_some(true),
            entrypoint: spec.entrypoint.clone(),
            model_id: Some(spec.model_id.clone()),
            revision: spec.revision.clone(),
            num_shard: spec.num_shard,
            quantize: spec.quantize.map(|q| q.as_str().to_string()),
            dtype: spec.dtype.map(|d| d.as_str().to_string()),
            trust_remote_code: spec.trust_remote_code.then_some(true),
            rope_scaling: spec.rope_scaling.map(|r| r.as_str().to_string()),
            rope_factor: spec.rope_factor,
            max_input_length: spec.max_input_length,
            max_total_tokens: spec.max_total_tokens,
            max_batch_prefill_tokens: spec.max_batch_prefill_tokens,
            max_batch_total_tokens: spec.max_batch_total_tokens,
            max_stop_sequences: spec.max_stop_sequences,
            extra_args: non_empty(spec.extra_args.clone()),
        }
    }
}

fn gpu_selection(raw: &RawGpus) -> Result<GpuSelection, ConfigError> {
    match raw {
        RawGpus::Devices(devices) => Ok(GpuSelection::devices(devices.iter().copied())),
        RawGpus::Index(index) => Ok(GpuSelection::devices([*index])),
        RawGpus::Expr(expr) => expr
            .parse()
            .map_err(|message| ConfigError::InvalidValue {
                field: "gpus",
                message,
            }),
    }
}

fn parse_choice<T>(field: &'static str, value: Option<&str>) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr<Err = String>,
{
    value
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|message| ConfigError::InvalidValue { field, message })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::spec::tests::llama2_spec;

    fn minimal() -> RawProfile {
        RawProfile {
            image: Some("img:1.4".into()),
            model_id: Some("/models/llama2-7b".into()),
            ..RawProfile::default()
        }
    }

    #[test]
    fn overlay_prefers_top_and_replaces_lists() {
        let defaults = RawProfile {
            image: Some("img:1.4".into()),
            shm_size: Some("1g".into()),
            mounts: Some(vec!["/data:/data".into()]),
            ..RawProfile::default()
        };
        let profile = RawProfile {
            shm_size: Some("2g".into()),
            mounts: Some(vec!["/models:/models:ro".into()]),
            model_id: Some("/models/llama2-13b".into()),
            ..RawProfile::default()
        };
        let merged = defaults.overlay(&profile);
        assert_eq!(merged.image.as_deref(), Some("img:1.4"));
        assert_eq!(merged.shm_size.as_deref(), Some("2g"));
        assert_eq!(merged.mounts, Some(vec!["/models:/models:ro".to_string()]));
        assert_eq!(merged.model_id.as_deref(), Some("/models/llama2-13b"));
    }

    #[test]
    fn gpu_literals_convert_to_selection() {
        let cases = [
            (RawGpus::Devices(vec![1, 0]), GpuSelection::devices([0, 1])),
            (RawGpus::Index(3), GpuSelection::devices([3])),
            (RawGpus::Expr("all".into()), GpuSelection::All),
            (RawGpus::Expr("device=0,1".into()), GpuSelection::devices([0, 1])),
        ];
        for (raw, expected) in cases {
            let spec = RawProfile {
                gpus: Some(raw),
                ..minimal()
            }
            .to_spec()
            .expect("gpus should convert");
            assert_eq!(spec.gpus, Some(expected));
        }
    }

    #[test]
    fn container_port_defaults_to_server_port() {
        let spec = RawProfile {
            published_port: Some(9123),
            ..minimal()
        }
        .to_spec()
        .expect("port");
        assert_eq!(
            spec.port,
            Some(PortMapping {
                published: 9123,
                container: 80
            })
        );

        let err = RawProfile {
            container_port: Some(8080),
            ..minimal()
        }
        .to_spec()
        .expect_err("container port alone");
        assert_eq!(
            err,
            ConfigError::MissingDependentField {
                field: "published_port",
                required_by: "container_port",
            }
        );
    }

    #[test]
    fn malformed_literals_are_invalid_values() {
        let cases = [
            RawProfile {
                mounts: Some(vec!["/data".into()]),
                ..minimal()
            },
            RawProfile {
                env: Some(vec!["NO_VALUE".into()]),
                ..minimal()
            },
            RawProfile {
                quantize: Some("int3".into()),
                ..minimal()
            },
            RawProfile {
                gpus: Some(RawGpus::Expr("first".into())),
                ..minimal()
            },
        ];
        for raw in cases {
            assert!(
                matches!(raw.to_spec(), Err(ConfigError::InvalidValue { .. })),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn missing_required_fields_are_reported() {
        let no_model = RawProfile {
            model_id: None,
            ..minimal()
        };
        assert_eq!(
            no_model.to_spec(),
            Err(ConfigError::MissingField { field: "model_id" })
        );
        assert_eq!(
            RawProfile::default().to_spec(),
            Err(ConfigError::MissingField { field: "image" })
        );
    }

    #[test]
    fn profile_from_spec_converts_back_to_the_same_spec() {
        let spec = LaunchSpec {
            mounts: vec![Mount {
                readonly: true,
                ..Mount::new("/data/models", "/models")
            }],
            env: vec![("HF_HUB_OFFLINE".into(), "1".into())],
            remove_on_exit: true,
            quantize: Some(Quantize::Awq),
            port: Some(PortMapping {
                published: 8080,
                container: 8000,
            }),
            ..llama2_spec()
        };
        let raw = RawProfile::from(&spec);
        assert_eq!(raw.container_port, Some(8000));
        assert_eq!(raw.detach, None);
        assert_eq!(raw.to_spec(), Ok(spec));
    }
}
