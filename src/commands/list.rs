use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::tunnel::reconcile::fetch_all;
use crate::ui::summary::print_tunnel_list;

pub async fn run(settings: &Settings) -> Result<()> {
    let client = settings.client()?;
    let records = fetch_all(&client, &CancellationToken::new())
        .await
        .context("Failed to list tunnels")?;
    print_tunnel_list(&records);
    Ok(())
}
