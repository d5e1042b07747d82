use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::config::Settings;

pub async fn run(settings: &Settings, id: &str) -> Result<()> {
    let client = settings.client()?;
    match client.delete_tunnel(id, &CancellationToken::new()).await {
        Ok(deleted) => {
            match deleted.jobs_running {
                Some(jobs) if jobs > 0 => {
                    println!("Deleted tunnel {id} ({jobs} job(s) were still running).")
                }
                _ => println!("Deleted tunnel {id}."),
            }
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            println!("Tunnel {id} not found; nothing to delete.");
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to delete tunnel {id}")),
    }
}
