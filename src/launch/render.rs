//! Flag rendering for container and server arguments.

use sha2::{Digest, Sha256};

use super::LaunchSpec;

/// Subcommand passed to the container runtime.
pub const RUN_SUBCOMMAND: &str = "run";

/// Rendered arguments for one launch, split at the image boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInvocation {
    pub image: String,
    pub entrypoint: Option<String>,
    /// Runtime flags placed before the image.
    pub container_args: Vec<String>,
    /// Inference server flags placed after the image.
    pub server_args: Vec<String>,
}

impl ContainerInvocation {
    /// Render a spec. Does not validate; `execute` validates first.
    pub fn from_spec(spec: &LaunchSpec) -> Self {
        Self {
            image: spec.image.clone(),
            entrypoint: spec.entrypoint.clone(),
            container_args: container_args(spec),
            server_args: server_args(spec),
        }
    }

    /// Container flags followed by server flags.
    pub fn tokens(&self) -> Vec<String> {
        self.container_args
            .iter()
            .chain(self.server_args.iter())
            .cloned()
            .collect()
    }

    /// Full argument vector handed to the runtime program.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.container_args.len() + self.server_args.len() + 4);
        argv.push(RUN_SUBCOMMAND.to_string());
        argv.extend(self.container_args.iter().cloned());
        if let Some(entrypoint) = &self.entrypoint {
            argv.push("--entrypoint".to_string());
            argv.push(entrypoint.clone());
        }
        argv.push(self.image.clone());
        argv.extend(self.server_args.iter().cloned());
        argv
    }

    /// SHA-256 over the argument vector; equal launches share a fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for arg in self.argv() {
            hasher.update(arg.as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Render a spec into its ordered token sequence.
pub fn render(spec: &LaunchSpec) -> Vec<String> {
    ContainerInvocation::from_spec(spec).tokens()
}

#[derive(Default)]
struct Tokens(Vec<String>);

impl Tokens {
    fn flag(&mut self, flag: &str) {
        self.0.push(flag.to_string());
    }

    fn pair(&mut self, flag: &str, value: impl ToString) {
        self.0.push(flag.to_string());
        self.0.push(value.to_string());
    }

    fn opt<T: ToString>(&mut self, flag: &str, value: Option<T>) {
        if let Some(value) = value {
            self.pair(flag, value);
        }
    }

    fn switch(&mut self, flag: &str, enabled: bool) {
        if enabled {
            self.flag(flag);
        }
    }
}

fn container_args(spec: &LaunchSpec) -> Vec<String> {
    let mut out = Tokens::default();
    out.opt("--gpus", spec.gpus.as_ref().map(|gpus| gpus.flag_value()));
    out.opt("--shm-size", spec.shm_size.as_ref());
    out.opt("--publish", spec.port);
    for mount in &spec.mounts {
        out.pair("--volume", mount);
    }
    for (name, value) in &spec.env {
        out.pair("--env", format!("{name}={value}"));
    }
    out.opt("--name", spec.container_name.as_ref());
    out.switch("--rm", spec.remove_on_exit);
    out.switch("--detach", spec.detach);
    out.0
}

fn server_args(spec: &LaunchSpec) -> Vec<String> {
    let mut out = Tokens::default();
    out.pair("--model-id", &spec.model_id);
    out.opt("--revision", spec.revision.as_ref());
    out.opt("--num-shard", spec.num_shard);
    out.opt("--quantize", spec.quantize.map(|q| q.as_str()));
    out.opt("--dtype", spec.dtype.map(|d| d.as_str()));
    out.switch("--trust-remote-code", spec.trust_remote_code);
    out.opt("--rope-scaling", spec.rope_scaling.map(|r| r.as_str()));
    out.opt("--rope-factor", spec.rope_factor);
    out.opt("--max-input-length", spec.max_input_length);
    out.opt("--max-total-tokens", spec.max_total_tokens);
    out.opt("--max-batch-prefill-tokens", spec.max_batch_prefill_tokens);
    out.opt("--max-batch-total-tokens", spec.max_batch_total_tokens);
    out.opt("--max-stop-sequences", spec.max_stop_sequences);
    out.0.extend(spec.extra_args.iter().cloned());
    out.0
}
