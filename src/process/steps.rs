//! Ordered command sequences with a per-step failure policy.
//!
//! Nothing here rolls back. A step either stops the sequence when it fails or
//! lets the rest run, and the report records which steps failed.

use super::{CommandSpec, ProcessResult, ProcessRunner};
use crate::cli::OutputManager;
use crate::error::{CommandError, Result};

/// What to do with the rest of the sequence when a step fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Report the failure and skip the remaining steps
    Abort,
    /// Report the failure and run the next step anyway
    Continue,
}

/// One step in an ordered sequence
#[derive(Debug, Clone)]
pub struct Step {
    /// Short description shown to the user
    pub label: String,
    /// Command to run
    pub command: CommandSpec,
    /// Failure handling for this step
    pub policy: FailurePolicy,
    /// Section header printed before the step runs
    pub banner: Option<String>,
}

impl Step {
    /// Step that stops the sequence on failure
    pub fn abort_on_failure(label: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            label: label.into(),
            command,
            policy: FailurePolicy::Abort,
            banner: None,
        }
    }

    /// Step whose failure is reported but does not stop the sequence
    pub fn continue_on_failure(label: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            label: label.into(),
            command,
            policy: FailurePolicy::Continue,
            banner: None,
        }
    }

    /// Print `banner` as a section header before running
    pub fn with_banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = Some(banner.into());
        self
    }
}

/// A step that exited non-zero
#[derive(Debug, Clone)]
pub struct FailedStep {
    /// Step label
    pub label: String,
    /// Command that failed
    pub command: CommandSpec,
    /// Its result
    pub result: ProcessResult,
}

impl FailedStep {
    /// Convert into `CommandError::Failed`
    pub fn into_error(self) -> CommandError {
        self.result.into_error(&self.command)
    }
}

/// What happened to a step sequence
#[derive(Debug, Default)]
pub struct StepReport {
    /// Labels of steps that succeeded
    pub succeeded: Vec<String>,
    /// Steps that failed, in order
    pub failed: Vec<FailedStep>,
    /// Labels of steps never run because an earlier step aborted
    pub skipped: Vec<String>,
    /// An `Abort` step failed and ended the sequence
    pub aborted: bool,
}

impl StepReport {
    /// Every step ran and succeeded
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    /// Labels of the failed steps
    pub fn failed_labels(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.label.as_str()).collect()
    }
}

/// Run `steps` in order, honoring each step's failure policy
pub async fn run_steps<R: ProcessRunner>(
    runner: &R,
    steps: Vec<Step>,
    output: &OutputManager,
) -> Result<StepReport> {
    let mut report = StepReport::default();
    let mut steps = steps.into_iter();

    while let Some(step) = steps.next() {
        if let Some(banner) = &step.banner {
            let _ = output.section(banner);
        }

        let result = runner.run(&step.command).await?;

        if result.success() {
            log::debug!("Step '{}' succeeded", step.label);
            report.succeeded.push(step.label);
            continue;
        }

        let _ = output.warn(&format!(
            "{} failed (exit code {})",
            step.label, result.code
        ));
        let detail = result.output().trim();
        if !detail.is_empty() {
            let _ = output.indent(detail);
        }

        let policy = step.policy;
        report.failed.push(FailedStep {
            label: step.label,
            command: step.command,
            result,
        });

        if policy == FailurePolicy::Abort {
            report.aborted = true;
            report.skipped = steps.by_ref().map(|s| s.label).collect();
            break;
        }
    }

    Ok(report)
}
