use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
use unix as imp;
#[cfg(windows)]
use windows as imp;

pub use imp::ProcessGroupHandle;

/// How long a tunnel process gets to exit after the polite signal.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Configure the command to run in a new process group.
/// Unix: `process_group(0)`, Windows: `CREATE_NEW_PROCESS_GROUP`
pub fn configure_process_group(cmd: &mut Command) {
    imp::configure_process_group(cmd)
}

/// Perform any post-spawn setup (e.g., Job Object on Windows).
/// Returns a handle that must be kept alive for the process lifetime.
pub fn post_spawn_setup(child_pid: Option<u32>) -> Option<ProcessGroupHandle> {
    imp::post_spawn_setup(child_pid)
}

/// Terminate a child process and its descendants.
/// Signals the group first, then forcefully kills once `grace` runs out.
pub async fn terminate_child(
    child: &mut tokio::process::Child,
    child_pid: Option<u32>,
    group_handle: Option<&ProcessGroupHandle>,
    grace: Duration,
) {
    imp::terminate_child(child, child_pid, group_handle, grace).await
}

/// Whether `path` is a file this platform would let us execute.
pub fn is_executable(path: &Path) -> bool {
    imp::is_executable(path)
}
