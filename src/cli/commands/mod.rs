//! Command execution.
//!
//! Builds the real runner, prompter and config store, then hands off to the
//! cluster controller for the routed command.

mod configure;

use crate::cli::{Args, Route, RuntimeConfig};
use crate::cluster::ClusterController;
use crate::config::ConfigStore;
use crate::error::Result;
use crate::process::SystemRunner;
use crate::prompt::TerminalPrompter;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use configure::execute_configure;

/// Time allowed for a cancelled workflow to wind down before the process exits
const INTERRUPT_GRACE: Duration = Duration::from_secs(2);

/// Execute the command the arguments route to
pub async fn execute_command(args: Args) -> Result<i32> {
    let route = args.route();
    let config = RuntimeConfig::from(&args);

    match route {
        Route::Version => {
            config.println(&version_text());
            return Ok(0);
        }
        Route::Help => {
            config.println(&help_text());
            return Ok(0);
        }
        _ => {}
    }

    let runner = SystemRunner::new();
    let prompter = TerminalPrompter::new();
    let store = ConfigStore::new(config.config_path());
    let cancel = CancellationToken::new();
    let interrupt = spawn_interrupt_handler(cancel.clone());

    let controller = ClusterController::new(&runner, &prompter, &store, config.output())
        .with_settings(config.settings().clone())
        .with_cancellation(cancel);

    let result = match &route {
        Route::Configure { create_cluster } => execute_configure(&controller, *create_cluster).await,
        Route::CreateCluster => controller.create_cluster().await,
        Route::DeleteCluster => controller.delete_cluster().await,
        Route::Deploy { file } => controller.deploy(file).await,
        Route::Version | Route::Help => Ok(0),
    };

    interrupt.abort();

    match result {
        Ok(code) => Ok(code),
        Err(e) => {
            config.error_println(&format!("Command failed: {e}"));

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                config.println("\n💡 Recovery suggestions:");
                for suggestion in suggestions {
                    config.indent(&format!("• {suggestion}"));
                }
            }

            Ok(1)
        }
    }
}

/// Cancel `cancel` on Ctrl-C. Workflows outside the readiness wait do not
/// observe the token, so the process exits if it is still running after the
/// grace period.
fn spawn_interrupt_handler(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            log::warn!("Could not listen for Ctrl-C");
            return;
        }

        log::info!("Interrupt received, cancelling");
        cancel.cancel();
        tokio::time::sleep(INTERRUPT_GRACE).await;
        std::process::exit(130);
    })
}

/// `--version` output
pub fn version_text() -> String {
    format!(
        "\n{} {}\n\n{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_DESCRIPTION")
    )
}

/// `--help` output, also printed for unrecognised commands
pub fn help_text() -> String {
    "usage: stagely [options] <command> <subcommand> [<subcommand> ...] [parameters]

Available commands:
    configure              Save the AWS cli profile stagely uses. Run this first.
    configure --cluster    Save the profile, then create a cluster.
    create cluster         Create a staging cluster and install the dashboard and ingress controller.
    delete cluster         Delete the staging cluster and its state-store bucket.
    deploy <file>          Apply a Kubernetes manifest to the staging cluster.

Options:
    -v, --version          Print the version and exit.
    --help                 Print this message.
    --config <PATH>        Configuration file [env: STAGELY_CONFIG] [default: stagely.config]"
        .to_string()
}
