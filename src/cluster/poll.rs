//! Bounded wait for `kops validate cluster` to pass.

use super::ClusterSettings;
use crate::cli::OutputManager;
use crate::credentials::SessionEnv;
use crate::error::Result;
use crate::process::{CommandSpec, ProcessRunner};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How the readiness wait ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Validation passed
    Ready {
        /// Validation attempts made, including the passing one
        attempts: u32,
    },
    /// Timeout reached before validation passed
    TimedOut {
        /// Validation attempts made
        attempts: u32,
        /// Time spent waiting
        waited: Duration,
    },
    /// Cancellation token fired
    Cancelled {
        /// Validation attempts made
        attempts: u32,
    },
}

/// Validate `cluster_name` every `poll_interval` until it passes, the
/// `ready_timeout` elapses, or `cancel` fires.
///
/// The first check happens one interval after the call. Runner errors (tool
/// missing, spawn failure) end the wait as `Err`.
pub async fn wait_until_ready<R: ProcessRunner>(
    runner: &R,
    env: &SessionEnv,
    cluster_name: &str,
    settings: &ClusterSettings,
    cancel: &CancellationToken,
    output: &OutputManager,
) -> Result<PollOutcome> {
    let start = Instant::now();
    let deadline = start + settings.ready_timeout;
    let validate = env.apply(
        CommandSpec::new("kops")
            .args(["validate", "cluster", "--name", cluster_name])
            .silent(),
    );

    let mut attempts = 0;

    loop {
        let wait = settings
            .poll_interval
            .min(deadline.saturating_duration_since(Instant::now()));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::warn!("Readiness wait for {} cancelled after {} attempt(s)", cluster_name, attempts);
                return Ok(PollOutcome::Cancelled { attempts });
            }
            _ = tokio::time::sleep(wait) => {}
        }

        attempts += 1;
        let result = runner.run(&validate).await?;
        if result.success() {
            log::debug!("{} validated after {} attempt(s)", cluster_name, attempts);
            return Ok(PollOutcome::Ready { attempts });
        }

        if Instant::now() >= deadline {
            return Ok(PollOutcome::TimedOut {
                attempts,
                waited: start.elapsed(),
            });
        }

        let _ = output.progress(&format!(
            "Cluster not ready yet (check {attempts}), retrying in {}s",
            settings.poll_interval.as_secs()
        ));
    }
}
