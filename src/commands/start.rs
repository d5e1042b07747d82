use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::StartArgs;
use crate::config::{Settings, TunnelOverrides};
use crate::tunnel::{TunnelCoordinator, TunnelError};
use crate::ui::summary::print_startup_summary;

pub async fn run(settings: &Settings, args: StartArgs) -> Result<()> {
    let config = settings.launch_config(&TunnelOverrides {
        directory: args.dir,
        port: args.port,
        identifier: args.identifier,
        timeout: args.timeout,
        args: args.args,
    })?;
    let mut coordinator = TunnelCoordinator::new(config)?;

    // One Ctrl+C handler for the whole run: it aborts a start in progress
    // and later ends a running session.
    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received Ctrl+C, shutting down");
                cancel.cancel();
            }
        })
    };

    let info = match coordinator.start(cancel.clone()).await {
        Ok(info) => info,
        Err(e) => {
            coordinator.stop().await;
            ctrl_c.abort();
            if matches!(e, TunnelError::Cancelled { .. }) {
                println!("Cancelled.");
                return Ok(());
            }
            return Err(e).context("Tunnel failed to start");
        }
    };

    print_startup_summary(&info);
    cancel.cancelled().await;

    coordinator.stop().await;
    println!("Tunnel stopped.");
    Ok(())
}
