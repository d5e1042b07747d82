use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::platform;
use crate::tunnel::launch::{local_hostname, EXECUTABLE_NAME};

const CHECK_TIMEOUT: Duration = Duration::from_secs(15);

pub async fn run(settings: &Settings, dir: Option<&Path>) -> Result<()> {
    println!("tunnelrig doctor");
    println!("================");
    println!();

    let mut all_ok = true;

    match &settings.path {
        Some(path) => ok("config", &path.display().to_string()),
        None => ok("config", "none (using defaults)"),
    }
    ok("hostname", &local_hostname());

    match settings.credentials() {
        Ok(credentials) => {
            ok("credentials", &credentials.user);
            all_ok &= check_control_plane(settings).await;
        }
        Err(e) => {
            fail("credentials", &e.to_string());
            all_ok = false;
        }
    }

    let directory = settings.tunnel_directory(dir)?;
    let executable = directory.join(EXECUTABLE_NAME);
    if platform::is_executable(&executable) {
        let version = sc_version(&executable).await;
        ok(
            EXECUTABLE_NAME,
            &format!(
                "{} {}",
                executable.display(),
                version.as_deref().unwrap_or("(version unknown)")
            ),
        );
    } else {
        fail(
            EXECUTABLE_NAME,
            &format!("not found or not executable: {}", executable.display()),
        );
        all_ok = false;
    }

    println!();
    if all_ok {
        println!("Everything looks good.");
    } else {
        println!("Some checks failed. Fix them before running `tunnelrig start`.");
    }

    Ok(())
}

fn ok(name: &str, detail: &str) {
    println!("  [ok] {:<16} {}", name, detail);
}

fn fail(name: &str, detail: &str) {
    println!("  [!!] {:<16} {}", name, detail);
}

async fn check_control_plane(settings: &Settings) -> bool {
    let api_url = settings.api_url();
    let client = match settings.client() {
        Ok(client) => client,
        Err(e) => {
            fail("control plane", &format!("{e:#}"));
            return false;
        }
    };

    let cancel = CancellationToken::new();
    match tokio::time::timeout(CHECK_TIMEOUT, client.list_tunnel_ids(&cancel)).await {
        Ok(Ok(ids)) => {
            ok(
                "control plane",
                &format!("{api_url} ({} tunnel(s) on account)", ids.len()),
            );
            true
        }
        Ok(Err(e)) => {
            fail("control plane", &e.to_string());
            false
        }
        Err(_) => {
            fail("control plane", &format!("{api_url} did not answer within {CHECK_TIMEOUT:?}"));
            false
        }
    }
}

/// First line `sc --version` prints, if it answers in time.
async fn sc_version(executable: &Path) -> Option<String> {
    let output = tokio::time::timeout(
        CHECK_TIMEOUT,
        Command::new(executable)
            .arg("--version")
            .kill_on_drop(true)
            .output(),
    )
    .await
    .ok()?
    .ok()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    stdout
        .lines()
        .chain(stderr.lines())
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}
