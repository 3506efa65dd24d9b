//! Launch configuration composer: validate a spec, render it, hand it to a runner.
pub mod parse;
pub mod render;
pub mod runner;
pub mod spec;

use chrono::Utc;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::lib::{
    errors::{LaunchError, LaunchFailure},
    telemetry::LaunchSpan,
};

pub use parse::parse_argv;
pub use render::{render, ContainerInvocation, RUN_SUBCOMMAND};
pub use runner::{CliRunner, ContainerRunner, DEFAULT_RUNTIME};
pub use spec::{
    parse_env_pair, Dtype, GpuSelection, LaunchSpec, Mount, PortMapping, Quantize, RopeScaling,
    DEFAULT_CONTAINER_PORT, MODELLED_SERVER_FLAGS,
};

/// Outcome of a launch whose runner exited with status 0.
#[derive(Debug, Clone, Serialize)]
pub struct LaunchReport {
    pub launch_id: String,
    pub image: String,
    pub fingerprint: String,
    pub started_at: String,
    pub exit_code: i32,
    pub detached: bool,
}

/// Validate, render and run `spec`.
///
/// The runner is never called when validation fails. A non-zero exit is
/// returned as `LaunchError::NonZeroExit` with the runner's code.
pub async fn execute<R: ContainerRunner>(
    spec: &LaunchSpec,
    runner: &R,
) -> Result<LaunchReport, LaunchFailure> {
    if let Err(err) = spec.validate() {
        warn!(
            target: "tgi_launch::launch",
            image = %spec.image,
            reason = %err,
            "Launch spec rejected before starting the runtime"
        );
        return Err(err.into());
    }

    let invocation = ContainerInvocation::from_spec(spec);
    let fingerprint = invocation.fingerprint();
    let started_at = Utc::now();
    let span = LaunchSpan::start(Uuid::new_v4(), &invocation.image, &fingerprint);
    let launch_id = span.launch_id();

    match runner.run(&invocation).await {
        Ok(Some(0)) => {
            span.finish("succeeded", Some(0));
            Ok(LaunchReport {
                launch_id: launch_id.to_string(),
                image: invocation.image,
                fingerprint,
                started_at: started_at.to_rfc3339(),
                exit_code: 0,
                detached: spec.detach,
            })
        }
        Ok(Some(code)) => {
            span.finish("failed", Some(code));
            Err(LaunchError::NonZeroExit { code }.into())
        }
        Ok(None) => {
            span.finish("terminated", None);
            Err(LaunchError::Terminated.into())
        }
        Err(err) => {
            span.finish("spawn_failed", None);
            Err(err.into())
        }
    }
}
