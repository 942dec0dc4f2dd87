mod provide;
mod providers;

use std::time::Duration;

use delroute_core::CancellationToken;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<(), CliError> {
    let cancel = cancellation(Duration::from_millis(cli.timeout_ms));

    let result = match &cli.command {
        Command::Providers(args) => providers::run(args, &cli.endpoint, cancel.clone()).await,
        Command::Provide(args) => provide::run(args, &cli.endpoint, cancel.clone()).await,
    };

    // Stops the watchdog task.
    cancel.cancel();
    result
}

/// Token cancelled on timeout or Ctrl-C, whichever comes first.
fn cancellation(timeout: Duration) -> CancellationToken {
    let cancel = CancellationToken::new();
    let watchdog = cancel.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = watchdog.cancelled() => return,
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "deadline reached, cancelling"
                );
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("interrupted, cancelling");
            }
        }
        watchdog.cancel();
    });

    cancel
}
