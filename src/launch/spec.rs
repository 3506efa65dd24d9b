use std::{collections::BTreeSet, fmt, str::FromStr};

use crate::lib::{
    errors::ConfigError,
    paths::{is_mount_target, mount_key},
};

/// Port the inference server listens on inside the image.
pub const DEFAULT_CONTAINER_PORT: u16 = 80;

/// Rope scaling mode passed through to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RopeScaling {
    Linear,
    Dynamic,
}

impl RopeScaling {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RopeScaling::Linear => "linear",
            RopeScaling::Dynamic => "dynamic",
        }
    }
}

impl FromStr for RopeScaling {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "linear" => Ok(RopeScaling::Linear),
            "dynamic" => Ok(RopeScaling::Dynamic),
            other => Err(format!("expected `linear` or `dynamic`, got `{other}`")),
        }
    }
}

/// Weight quantization scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantize {
    Awq,
    Eetq,
    Gptq,
    Bitsandbytes,
    BitsandbytesNf4,
    BitsandbytesFp4,
}

impl Quantize {
    pub const ALL: [Quantize; 6] = [
        Quantize::Awq,
        Quantize::Eetq,
        Quantize::Gptq,
        Quantize::Bitsandbytes,
        Quantize::BitsandbytesNf4,
        Quantize::BitsandbytesFp4,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Quantize::Awq => "awq",
            Quantize::Eetq => "eetq",
            Quantize::Gptq => "gptq",
            Quantize::Bitsandbytes => "bitsandbytes",
            Quantize::BitsandbytesNf4 => "bitsandbytes-nf4",
            Quantize::BitsandbytesFp4 => "bitsandbytes-fp4",
        }
    }
}

impl FromStr for Quantize {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Quantize::ALL
            .into_iter()
            .find(|q| q.as_str() == value)
            .ok_or_else(|| format!("unknown quantization scheme `{value}`"))
    }
}

/// Weight dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    Float16,
    Bfloat16,
}

impl Dtype {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Dtype::Float16 => "float16",
            Dtype::Bfloat16 => "bfloat16",
        }
    }
}

impl FromStr for Dtype {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "float16" => Ok(Dtype::Float16),
            "bfloat16" => Ok(Dtype::Bfloat16),
            other => Err(format!("expected `float16` or `bfloat16`, got `{other}`")),
        }
    }
}

/// GPUs exposed to the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuSelection {
    All,
    Devices(BTreeSet<u32>),
}

impl GpuSelection {
    pub fn devices<I: IntoIterator<Item = u32>>(indices: I) -> Self {
        GpuSelection::Devices(indices.into_iter().collect())
    }

    /// Value of the `--gpus` flag. Device lists are wrapped in double quotes
    /// so the runtime does not split them on the comma.
    pub fn flag_value(&self) -> String {
        match self {
            GpuSelection::All => "all".to_string(),
            GpuSelection::Devices(devices) => format!("\"device={}\"", join_devices(devices)),
        }
    }
}

impl fmt::Display for GpuSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuSelection::All => f.write_str("all"),
            GpuSelection::Devices(devices) => f.write_str(&join_devices(devices)),
        }
    }
}

/// Accepts `all`, `device=0,1` and a bare `0,1` list, with or without
/// surrounding quotes.
impl FromStr for GpuSelection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim().trim_matches(|c: char| c == '"' || c == '\'');
        if trimmed == "all" {
            return Ok(GpuSelection::All);
        }
        let list = trimmed.strip_prefix("device=").unwrap_or(trimmed);
        let devices = list
            .split(',')
            .map(|index| {
                index
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| format!("`{index}` is not a device index"))
            })
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(GpuSelection::Devices(devices))
    }
}

fn join_devices(devices: &BTreeSet<u32>) -> String {
    devices
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Host to container port mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub published: u16,
    pub container: u16,
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.published, self.container)
    }
}

/// Bind mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub host: String,
    pub container: String,
    pub readonly: bool,
}

impl Mount {
    pub fn new(host: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            readonly: false,
        }
    }
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.container)?;
        if self.readonly {
            f.write_str(":ro")?;
        }
        Ok(())
    }
}

/// Accepts `host:container`, `host:container:ro` and `host:container:rw`.
impl FromStr for Mount {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = value.split(':').collect();
        let (host, container, readonly) = match parts.as_slice() {
            [host, container] => (*host, *container, false),
            [host, container, "ro"] => (*host, *container, true),
            [host, container, "rw"] => (*host, *container, false),
            _ => {
                return Err(format!(
                    "`{value}` is not `host:container` or `host:container:ro`"
                ))
            }
        };
        if host.is_empty() || container.is_empty() {
            return Err(format!("`{value}` has an empty path"));
        }
        Ok(Mount {
            host: host.to_string(),
            container: container.to_string(),
            readonly,
        })
    }
}

/// Parse a `NAME=VALUE` pair.
pub fn parse_env_pair(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((name, val)) if !name.is_empty() => Ok((name.to_string(), val.to_string())),
        _ => Err(format!("`{value}` is not `NAME=VALUE`")),
    }
}

/// Server flags rendered from typed fields; `extra_args` may not repeat them.
pub const MODELLED_SERVER_FLAGS: &[&str] = &[
    "--model-id",
    "--revision",
    "--num-shard",
    "--quantize",
    "--dtype",
    "--trust-remote-code",
    "--rope-scaling",
    "--rope-factor",
    "--max-input-length",
    "--max-total-tokens",
    "--max-batch-prefill-tokens",
    "--max-batch-total-tokens",
    "--max-stop-sequences",
];

/// One desired container invocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LaunchSpec {
    pub image: String,
    pub gpus: Option<GpuSelection>,
    pub shm_size: Option<String>,
    pub port: Option<PortMapping>,
    pub mounts: Vec<Mount>,
    pub env: Vec<(String, String)>,
    pub container_name: Option<String>,
    pub remove_on_exit: bool,
    pub detach: bool,
    pub entrypoint: Option<String>,
    pub model_id: String,
    pub revision: Option<String>,
    pub num_shard: Option<u32>,
    pub quantize: Option<Quantize>,
    pub dtype: Option<Dtype>,
    pub trust_remote_code: bool,
    pub rope_scaling: Option<RopeScaling>,
    pub rope_factor: Option<f64>,
    pub max_input_length: Option<u32>,
    pub max_total_tokens: Option<u32>,
    pub max_batch_prefill_tokens: Option<u32>,
    pub max_batch_total_tokens: Option<u32>,
    pub max_stop_sequences: Option<u32>,
    pub extra_args: Vec<String>,
}

impl LaunchSpec {
    /// Check every invariant; the first violation is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_container()?;
        self.validate_shards()?;
        self.validate_model()?;
        self.validate_rope()?;
        self.validate_token_limits()?;
        self.validate_extra_args()
    }

    fn validate_container(&self) -> Result<(), ConfigError> {
        if self.image.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "image" });
        }
        if self.image.starts_with('-') {
            return Err(ConfigError::InvalidValue {
                field: "image",
                message: format!("`{}` would be read as a flag", self.image),
            });
        }

        if let Some(GpuSelection::Devices(devices)) = &self.gpus {
            if devices.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "gpus",
                    message: "device list is empty".into(),
                });
            }
        }

        if let Some(size) = &self.shm_size {
            if !is_size_literal(size) {
                return Err(ConfigError::InvalidValue {
                    field: "shm_size",
                    message: format!("`{size}` is not a size such as `1g` or `512m`"),
                });
            }
        }

        if let Some(port) = &self.port {
            if port.published == 0 {
                return Err(ConfigError::InvalidRange {
                    field: "published_port",
                    message: "must be between 1 and 65535".into(),
                });
            }
            if port.container == 0 {
                return Err(ConfigError::InvalidRange {
                    field: "container_port",
                    message: "must be between 1 and 65535".into(),
                });
            }
        }

        let mut seen = BTreeSet::new();
        for mount in &self.mounts {
            if mount.host.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "mounts",
                    message: format!("`{mount}` has an empty host path"),
                });
            }
            if mount.host.contains(':') || mount.container.contains(':') {
                return Err(ConfigError::InvalidValue {
                    field: "mounts",
                    message: format!("`{mount}` has a `:` inside a path"),
                });
            }
            if !is_mount_target(&mount.container) {
                return Err(ConfigError::InvalidValue {
                    field: "mounts",
                    message: format!("container path `{}` must be absolute", mount.container),
                });
            }
            if !seen.insert(mount_key(&mount.container)) {
                return Err(ConfigError::InvalidValue {
                    field: "mounts",
                    message: format!("container path `{}` is mounted twice", mount.container),
                });
            }
        }

        for (name, _) in &self.env {
            if name.is_empty() || name.contains('=') || name.contains(char::is_whitespace) {
                return Err(ConfigError::InvalidValue {
                    field: "env",
                    message: format!("`{name}` is not a valid variable name"),
                });
            }
        }

        if let Some(entrypoint) = &self.entrypoint {
            if entrypoint.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "entrypoint",
                    message: "must not be blank when set".into(),
                });
            }
        }

        Ok(())
    }

    fn validate_shards(&self) -> Result<(), ConfigError> {
        let Some(num_shard) = self.num_shard else {
            return Ok(());
        };
        if num_shard < 1 {
            return Err(ConfigError::InvalidShardCount {
                num_shard,
                message: "at least one shard is required".into(),
            });
        }
        if let Some(GpuSelection::Devices(devices)) = &self.gpus {
            if devices.len() < num_shard as usize {
                return Err(ConfigError::InvalidShardCount {
                    num_shard,
                    message: format!(
                        "each shard needs its own GPU but only {} device(s) are selected",
                        devices.len()
                    ),
                });
            }
        }
        Ok(())
    }

    fn validate_model(&self) -> Result<(), ConfigError> {
        if self.model_id.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "model_id" });
        }
        if self.dtype.is_some() && self.quantize.is_some() {
            return Err(ConfigError::Conflict {
                field: "dtype",
                conflicts_with: "quantize",
            });
        }
        Ok(())
    }

    fn validate_rope(&self) -> Result<(), ConfigError> {
        match (self.rope_scaling, self.rope_factor) {
            (Some(_), None) => Err(ConfigError::MissingDependentField {
                field: "rope_factor",
                required_by: "rope_scaling",
            }),
            (None, Some(_)) => Err(ConfigError::MissingDependentField {
                field: "rope_scaling",
                required_by: "rope_factor",
            }),
            (Some(_), Some(factor)) if !(factor.is_finite() && factor > 0.0) => {
                Err(ConfigError::InvalidRange {
                    field: "rope_factor",
                    message: format!("{factor} is not a positive number"),
                })
            }
            _ => Ok(()),
        }
    }

    fn validate_token_limits(&self) -> Result<(), ConfigError> {
        let limits = [
            ("max_input_length", self.max_input_length),
            ("max_total_tokens", self.max_total_tokens),
            ("max_batch_prefill_tokens", self.max_batch_prefill_tokens),
            ("max_batch_total_tokens", self.max_batch_total_tokens),
            ("max_stop_sequences", self.max_stop_sequences),
        ];
        for (field, value) in limits {
            if value == Some(0) {
                return Err(ConfigError::InvalidRange {
                    field,
                    message: "must be a positive integer".into(),
                });
            }
        }

        if let (Some(input), Some(total)) = (self.max_input_length, self.max_total_tokens) {
            if input > total {
                return Err(ConfigError::InvalidRange {
                    field: "max_input_length",
                    message: format!("{input} exceeds max_total_tokens ({total})"),
                });
            }
        }
        if let (Some(prefill), Some(total)) =
            (self.max_batch_prefill_tokens, self.max_total_tokens)
        {
            if prefill > total {
                return Err(ConfigError::InvalidRange {
                    field: "max_batch_prefill_tokens",
                    message: format!("{prefill} exceeds max_total_tokens ({total})"),
                });
            }
        }
        if let (Some(prefill), Some(input)) =
            (self.max_batch_prefill_tokens, self.max_input_length)
        {
            if prefill < input {
                return Err(ConfigError::InvalidRange {
                    field: "max_batch_prefill_tokens",
                    message: format!("{prefill} is below max_input_length ({input})"),
                });
            }
        }
        if let (Some(batch_total), Some(total)) =
            (self.max_batch_total_tokens, self.max_total_tokens)
        {
            if batch_total < total {
                return Err(ConfigError::InvalidRange {
                    field: "max_batch_total_tokens",
                    message: format!("{batch_total} is below max_total_tokens ({total})"),
                });
            }
        }
        Ok(())
    }

    fn validate_extra_args(&self) -> Result<(), ConfigError> {
        for arg in &self.extra_args {
            let flag = arg.split_once('=').map_or(arg.as_str(), |(flag, _)| flag);
            if MODELLED_SERVER_FLAGS.contains(&flag) {
                return Err(ConfigError::InvalidValue {
                    field: "extra_args",
                    message: format!("`{flag}` has its own profile field"),
                });
            }
        }
        Ok(())
    }
}

/// `1g`, `512m`, `2048`: digits with an optional b/k/m/g unit.
fn is_size_literal(value: &str) -> bool {
    let digits = value
        .strip_suffix(|c: char| matches!(c.to_ascii_lowercase(), 'b' | 'k' | 'm' | 'g'))
        .unwrap_or(value);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}
