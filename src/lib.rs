//! # stagely
//!
//! Spin up a Kubernetes staging cluster on AWS and deploy to it.
//!
//! stagely drives the `aws`, `kops` and `kubectl` command line tools. It keeps
//! a small key/value config file (AWS profile, cluster name, state-store
//! bucket) between runs and passes credentials to each child process through
//! its environment only.
//!
//! ## Usage
//!
//! ```bash
//! stagely configure            # choose and verify an AWS cli profile
//! stagely create cluster       # create, validate and bootstrap a cluster
//! stagely deploy app.yaml      # kubectl apply into the cluster
//! stagely delete cluster       # tear everything down
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cli;
pub mod cluster;
pub mod config;
pub mod credentials;
pub mod error;
pub mod process;
pub mod prompt;

#[cfg(test)]
mod testing;

// Re-export main types for public API
pub use cli::Args;
pub use cluster::{ClusterController, ClusterDescriptor, ClusterSettings, PollOutcome};
pub use config::{ConfigRecord, ConfigStore};
pub use credentials::{AwsCredentials, CredentialManager, SessionEnv};
pub use error::{Result, StagelyError};
pub use process::{CommandSpec, ProcessResult, ProcessRunner, SystemRunner};
pub use prompt::{Prompter, TerminalPrompter};
