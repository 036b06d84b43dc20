//! Error types for stagely operations.
//!
//! Workflows decide success or failure from each external command's exit code.
//! These types only carry a failure out to the CLI boundary, where it is printed
//! with recovery suggestions.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for stagely operations
pub type Result<T> = std::result::Result<T, StagelyError>;

/// Main error type for all stagely operations
#[derive(Error, Debug)]
pub enum StagelyError {
    /// Config file errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Credential resolution errors
    #[error("Credential error: {0}")]
    Credentials(#[from] CredentialError),

    /// External command errors
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// Interactive prompt failed (stdin closed, terminal gone)
    #[error("Prompt failed: {reason}")]
    Prompt {
        /// Reason for the error
        reason: String,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Config file errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No config file where one is required
    #[error("No configuration found at {path}. Run `stagely configure` first.")]
    Missing {
        /// Path where the config file was expected
        path: PathBuf,
    },

    /// Config file exists but a required key is absent
    #[error("Configuration has no '{key}' entry")]
    KeyMissing {
        /// Missing key
        key: String,
    },

    /// Config file is not a flat JSON object of strings
    #[error("Config file {path} is corrupted: {reason}")]
    Corrupted {
        /// Path to the config file
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// Failed to persist the config file
    #[error("Failed to save config file {path}: {reason}")]
    SaveFailed {
        /// Path to the config file
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },
}

/// Credential resolution errors
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Profile lookup kept failing until retries ran out
    #[error(
        "Unable to configure credentials for AWS cli. AWS cli profile '{profile}' does not exist."
    )]
    ResolutionFailed {
        /// Last profile that was tried
        profile: String,
    },
}

/// External command errors
#[derive(Error, Debug)]
pub enum CommandError {
    /// Collaborator CLI is not installed or not on PATH
    #[error("Required tool '{tool}' was not found on PATH")]
    ToolNotFound {
        /// Program name
        tool: String,
    },

    /// Collaborator CLI exited with a failure status
    #[error("`{command}` failed with exit code {code}{}", format_output(output))]
    Failed {
        /// Command line that failed
        command: String,
        /// Exit code (-1 when killed by a signal)
        code: i32,
        /// Captured output, used for the report
        output: String,
    },

    /// Readiness poll did not finish with a ready cluster
    #[error("Cluster '{cluster}' did not become ready: {reason}")]
    NotReady {
        /// Cluster name
        cluster: String,
        /// Timed out or cancelled
        reason: String,
    },
}

fn format_output(output: &str) -> String {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

impl StagelyError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            StagelyError::Config(ConfigError::Missing { .. }) => vec![
                "Run `stagely configure` to select an AWS cli profile".to_string(),
                "Run `stagely configure --cluster` to configure and create a cluster in one go"
                    .to_string(),
            ],
            StagelyError::Config(ConfigError::KeyMissing { .. }) => vec![
                "Create a cluster first: stagely create cluster".to_string(),
            ],
            StagelyError::Config(ConfigError::Corrupted { path, .. }) => vec![
                format!("Remove {} and run `stagely configure` again", path.display()),
            ],
            StagelyError::Credentials(CredentialError::ResolutionFailed { profile }) => vec![
                format!("Create the profile: aws configure --profile {profile}"),
                "List existing profiles: aws configure list-profiles".to_string(),
            ],
            StagelyError::Command(CommandError::ToolNotFound { tool }) => {
                let mut hints = vec![format!("Install '{tool}' and make sure it is on PATH")];
                match tool.as_str() {
                    "aws" => hints.push(
                        "See https://docs.aws.amazon.com/cli/latest/userguide/install-cliv2.html"
                            .to_string(),
                    ),
                    "kops" => hints.push(
                        "See https://kops.sigs.k8s.io/getting_started/install/".to_string(),
                    ),
                    "kubectl" => hints
                        .push("See https://kubernetes.io/docs/tasks/tools/".to_string()),
                    _ => {}
                }
                hints
            }
            StagelyError::Command(CommandError::NotReady { cluster, .. }) => vec![
                format!("Check the cluster state: kops validate cluster --name {cluster}"),
                "Raise STAGELY_READY_TIMEOUT_SECS if the cluster is just slow to start".to_string(),
            ],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }
}
