//! Container runtime seam and the process-backed implementation.

use std::{
    future::Future,
    path::{Path, PathBuf},
};

use tokio::process::Command;

use crate::lib::errors::LaunchError;

use super::ContainerInvocation;

/// Program used when no runner is configured.
pub const DEFAULT_RUNTIME: &str = "docker";

/// Executes a rendered invocation and reports the runtime's exit code.
///
/// `Ok(None)` means the process ended without an exit code (killed by a signal).
pub trait ContainerRunner {
    fn run(
        &self,
        invocation: &ContainerInvocation,
    ) -> impl Future<Output = Result<Option<i32>, LaunchError>>;
}

/// Runs the invocation through a container CLI such as `docker` or `podman`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliRunner {
    program: PathBuf,
    prefix_args: Vec<String>,
}

impl Default for CliRunner {
    fn default() -> Self {
        Self::new(DEFAULT_RUNTIME)
    }
}

impl CliRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
        }
    }

    /// Arguments placed before `run`, e.g. `--context remote` or a wrapper script.
    pub fn with_prefix_args(mut self, prefix_args: Vec<String>) -> Self {
        self.prefix_args = prefix_args;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Complete command line, program first, for display and dry runs.
    pub fn command_line(&self, invocation: &ContainerInvocation) -> Vec<String> {
        let mut line = Vec::with_capacity(1 + self.prefix_args.len());
        line.push(self.program.to_string_lossy().into_owned());
        line.extend(self.prefix_args.iter().cloned());
        line.extend(invocation.argv());
        line
    }

    /// Build the process command. Stdio is inherited from the caller.
    pub fn command(&self, invocation: &ContainerInvocation) -> Command {
        let mut command = Command::new(&self.program);
        command.kill_on_drop(true);
        command.args(&self.prefix_args);
        command.args(invocation.argv());
        command
    }
}

impl ContainerRunner for CliRunner {
    async fn run(&self, invocation: &ContainerInvocation) -> Result<Option<i32>, LaunchError> {
        let status = self
            .command(invocation)
            .status()
            .await
            .map_err(|source| LaunchError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        Ok(status.code())
    }
}
