use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::config::Settings;

pub async fn run(settings: &Settings, id: &str) -> Result<()> {
    let client = settings.client()?;
    let record = client
        .get_tunnel(id, &CancellationToken::new())
        .await
        .with_context(|| format!("Failed to fetch tunnel {id}"))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
