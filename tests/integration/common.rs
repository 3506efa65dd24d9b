use std::{
    env,
    ffi::OsStr,
    fs,
    path::PathBuf,
    process::Output,
};

use anyhow::{Context, Result};
use tempfile::TempDir;
use tokio::process::Command;

pub const BINARY_PATH: &str = env!("CARGO_BIN_EXE_tgi-launch");

pub fn fixture(relative: &str) -> String {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    root.join(relative).display().to_string()
}

/// Command for the binary with any inherited `TGI_LAUNCH*` variables removed.
pub fn tgi_launch<I, S>(args: I) -> Command
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(BINARY_PATH);
    for (key, _) in env::vars_os() {
        if key.to_string_lossy().starts_with("TGI_LAUNCH") {
            command.env_remove(key);
        }
    }
    command.env("RUST_LOG", "warn").args(args);
    command
}

/// Scratch directory with a `launch.toml` whose runner is the fake runtime script.
pub struct Workspace {
    _dir: TempDir,
    pub config: PathBuf,
    pub record: PathBuf,
}

impl Workspace {
    pub fn with_profiles(profiles: &str) -> Result<Self> {
        let dir = tempfile::tempdir().context("failed to create workspace")?;
        let config = dir.path().join("launch.toml");
        let record = dir.path().join("runtime-args.txt");
        let script = fixture("tests/fixtures/fake-runtime.sh");
        let document = format!("{profiles}\n[runner]\nprogram = \"sh\"\nargs = [{script:?}]\n");
        fs::write(&config, document).context("failed to write launch.toml")?;
        Ok(Self {
            _dir: dir,
            config,
            record,
        })
    }

    /// `tgi-launch --config <workspace>/launch.toml <args...>` recording runtime arguments.
    pub fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = tgi_launch([OsStr::new("--config"), self.config.as_os_str()]);
        command.args(args).env("FAKE_RUNTIME_RECORD", &self.record);
        command
    }

    /// Arguments the fake runtime received, or `None` when it never ran.
    pub fn recorded_args(&self) -> Result<Option<Vec<String>>> {
        if !self.record.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.record).context("failed to read record")?;
        Ok(Some(content.lines().map(str::to_string).collect()))
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

pub const LLAMA2_PROFILES: &str = r#"default_profile = "llama2-7b"

[defaults]
image = "img:1.4"
shm_size = "1g"

[profiles.llama2-7b]
gpus = [0, 1]
published_port = 9123
model_id = "/models/llama2-7b"
num_shard = 2
rope_scaling = "dynamic"
rope_factor = 8
max_input_length = 31000
max_total_tokens = 32768
max_batch_prefill_tokens = 31000
max_stop_sequences = 12

[profiles.too-long]
gpus = [0, 1]
published_port = 9124
model_id = "/models/llama2-7b"
num_shard = 2
max_input_length = 40000
max_total_tokens = 32768
"#;
