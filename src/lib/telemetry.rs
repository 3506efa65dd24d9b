//! Telemetry initialization and launch span helpers.

use std::time::Instant;

use anyhow::Result;
use tracing::{info, info_span, warn, Span};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

/// Initialize `tracing` and format developer logs on stderr.
pub fn init_tracing() -> Result<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to initialize tracing: {err}"))
}

/// Span helper to record start and finish of one container launch.
pub struct LaunchSpan {
    span: Span,
    started_at: Instant,
    launch_id: Uuid,
}

impl LaunchSpan {
    /// Start a launch span.
    pub fn start(launch_id: Uuid, image: &str, fingerprint: &str) -> Self {
        let span = info_span!(
            target: "tgi_launch::launch",
            "container_launch",
            %launch_id,
            image,
            fingerprint
        );
        {
            let _entered = span.enter();
            info!(target: "tgi_launch::launch", "Handing invocation to container runtime");
        }
        Self {
            span,
            started_at: Instant::now(),
            launch_id,
        }
    }

    pub fn launch_id(&self) -> Uuid {
        self.launch_id
    }

    /// Close the span while recording status and completion info.
    pub fn finish(self, status: &'static str, exit_code: Option<i32>) {
        let elapsed_ms = self.started_at.elapsed().as_millis();
        let _entered = self.span.enter();
        if status == "succeeded" {
            info!(
                target: "tgi_launch::launch",
                launch_id = %self.launch_id,
                status,
                exit_code,
                elapsed_ms,
                "Container runtime returned"
            );
        } else {
            warn!(
                target: "tgi_launch::launch",
                launch_id = %self.launch_id,
                status,
                exit_code,
                elapsed_ms,
                "Container runtime returned"
            );
        }
    }
}
