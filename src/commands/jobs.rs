use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::config::Settings;

pub async fn run(settings: &Settings, id: &str) -> Result<()> {
    let client = settings.client()?;
    let count = client
        .running_jobs(id, &CancellationToken::new())
        .await
        .with_context(|| format!("Failed to fetch job count for tunnel {id}"))?;
    println!("{id}: {} job(s) running", count.jobs_running());
    Ok(())
}
