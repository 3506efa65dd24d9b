//! Process exit codes for CLI failures.
use std::process::ExitCode;

use anyhow::Error;

use crate::lib::errors::{LaunchError, LaunchFailure, LoadError, ParseError};

/// Configuration, profile or validation failure. Nothing was started.
pub const VALIDATION_EXIT_CODE: u8 = 2;
/// The container runtime program could not be started.
pub const SPAWN_FAILURE_EXIT_CODE: u8 = 127;

/// Bundles a user-facing message with the process exit code.
#[derive(Debug)]
pub struct CliExit {
    message: String,
    exit_code: u8,
}

impl CliExit {
    pub fn new(message: impl Into<String>, exit_code: u8) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    pub fn from_error(err: impl Into<Error>) -> Self {
        let err = err.into();
        Self::new(format!("{err:?}"), 1)
    }

    /// Argument problems found after clap parsing.
    pub fn from_usage(err: Error) -> Self {
        Self::new(format!("error: {err:#}"), VALIDATION_EXIT_CODE)
    }

    pub fn from_load(err: LoadError) -> Self {
        Self::new(format!("error: {err}"), VALIDATION_EXIT_CODE)
    }

    pub fn from_parse(err: ParseError) -> Self {
        Self::new(format!("error: {err}"), VALIDATION_EXIT_CODE)
    }

    /// Map a launch failure; a non-zero runtime status becomes our own exit code.
    pub fn from_failure(failure: LaunchFailure) -> Self {
        match failure {
            LaunchFailure::Config(err) => {
                Self::new(format!("error: invalid launch spec: {err}"), VALIDATION_EXIT_CODE)
            }
            LaunchFailure::Launch(err) => {
                let code = match &err {
                    LaunchError::Spawn { .. } => SPAWN_FAILURE_EXIT_CODE,
                    LaunchError::NonZeroExit { code } => {
                        u8::try_from(*code).ok().filter(|c| *c != 0).unwrap_or(1)
                    }
                    LaunchError::Terminated => 1,
                };
                Self::new(format!("error: {err}"), code)
            }
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn report(self) -> ExitCode {
        if !self.message.is_empty() {
            eprintln!("{}", self.message);
        }
        ExitCode::from(self.exit_code)
    }
}
