//! Command line argument parsing and routing.
//!
//! stagely takes its command as bare words (`create cluster`, `deploy app.yaml`)
//! rather than clap subcommands, so unknown input can fall through to the help
//! text instead of a parse error.

use crate::cluster::ClusterSettings;
use crate::config::DEFAULT_CONFIG_FILE;
use clap::Parser;
use std::path::PathBuf;

/// Spin up a Kubernetes staging cluster on AWS
#[derive(Parser, Debug)]
#[command(
    name = "stagely",
    about = "Spin up a Kubernetes staging cluster on AWS with kops",
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct Args {
    /// Print the version and exit
    #[arg(short = 'v', long = "version")]
    pub version: bool,

    /// Print usage and exit
    #[arg(long = "help")]
    pub help: bool,

    /// With `configure`, create the cluster right after the profile is saved
    #[arg(long = "cluster")]
    pub cluster: bool,

    /// Path of the configuration file
    #[arg(
        long = "config",
        env = "STAGELY_CONFIG",
        default_value = DEFAULT_CONFIG_FILE,
        value_name = "PATH"
    )]
    pub config: PathBuf,

    /// Command to run
    #[arg(value_name = "COMMAND")]
    pub command: Option<String>,

    /// Subcommands and parameters
    #[arg(value_name = "SUBCOMMAND")]
    pub subcommands: Vec<String>,
}

/// What the parsed command line asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Print name and version
    Version,
    /// Print usage
    Help,
    /// Configure the AWS profile, optionally creating the cluster afterwards
    Configure {
        /// `--cluster` was given
        create_cluster: bool,
    },
    /// `create cluster`
    CreateCluster,
    /// `delete cluster`
    DeleteCluster,
    /// `deploy <file>`
    Deploy {
        /// Manifest to apply
        file: String,
    },
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Decide which command runs. `--version` wins over everything, then
    /// `--help`; anything unrecognised prints usage.
    pub fn route(&self) -> Route {
        if self.version {
            return Route::Version;
        }
        if self.help {
            return Route::Help;
        }

        let first = self.subcommands.first().map(String::as_str);
        match (self.command.as_deref(), first) {
            (Some("configure"), _) => Route::Configure {
                create_cluster: self.cluster,
            },
            (Some("create"), Some("cluster")) => Route::CreateCluster,
            (Some("delete"), Some("cluster")) => Route::DeleteCluster,
            (Some("deploy"), Some(file)) => Route::Deploy {
                file: file.to_string(),
            },
            _ => Route::Help,
        }
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    output: super::OutputManager,
    config_path: PathBuf,
    settings: ClusterSettings,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(false),
            config_path: args.config.clone(),
            settings: ClusterSettings::from_env(),
        }
    }
}

impl RuntimeConfig {
    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Configuration file location
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Readiness polling settings
    pub fn settings(&self) -> &ClusterSettings {
        &self.settings
    }

    /// Print message
    pub fn println(&self, message: &str) {
        let _ = self.output.println(message);
    }

    /// Print error message (always shown)
    pub fn error_println(&self, message: &str) {
        self.output.error(message);
    }

    /// Print indented text
    pub fn indent(&self, message: &str) {
        let _ = self.output.indent(message);
    }
}
