use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;

/// Unused on Unix; group cleanup goes through killpg on the child PID.
pub struct ProcessGroupHandle;

pub fn configure_process_group(cmd: &mut Command) {
    cmd.process_group(0);
}

pub fn post_spawn_setup(_child_pid: Option<u32>) -> Option<ProcessGroupHandle> {
    // On Unix, process group is configured before spawn via process_group(0).
    None
}

pub async fn terminate_child(
    child: &mut tokio::process::Child,
    child_pid: Option<u32>,
    _group_handle: Option<&ProcessGroupHandle>,
    grace: Duration,
) {
    let Some(pid) = child_pid else {
        let _ = child.kill().await;
        return;
    };

    let pgid = Pid::from_raw(pid as i32);
    match killpg(pgid, Signal::SIGTERM) {
        Ok(()) => {
            debug!(pid, "sent SIGTERM to tunnel process group");
        }
        Err(nix::errno::Errno::ESRCH) => {
            debug!(pid, "tunnel process group already exited");
            let _ = child.wait().await;
            return;
        }
        Err(e) => {
            warn!(pid, error = %e, "killpg(SIGTERM) failed, falling back to kill");
            let _ = child.kill().await;
            return;
        }
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            debug!(pid, %status, "tunnel process exited after SIGTERM");
        }
        _ => {
            warn!(pid, ?grace, "tunnel process ignored SIGTERM, sending SIGKILL");
            let _ = killpg(pgid, Signal::SIGKILL);
            let _ = child.kill().await;
            let _ = child.wait().await;
        }
    }
}

pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
