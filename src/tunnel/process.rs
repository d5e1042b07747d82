use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::platform::{self, ProcessGroupHandle};

use super::command_line::{display_command, to_argv};
use super::deadline::Deadline;
use super::error::TunnelError;

const LINE_BUFFER: usize = 256;

/// Result of waiting for the next stdout line.
#[derive(Debug, PartialEq, Eq)]
pub enum LineRead {
    Line(String),
    /// stdout reached EOF; the process is gone or closed its output.
    Closed,
    Expired,
}

/// A spawned `sc` process we own.
///
/// Stdout is read by a background task and forwarded line by line until
/// [`TunnelProcess::release_output`] is called; after that the task keeps
/// draining the pipe into the debug log so the child never blocks on a full
/// pipe.
pub struct TunnelProcess {
    child: Child,
    pid: Option<u32>,
    group: Option<ProcessGroupHandle>,
    lines: Option<mpsc::Receiver<String>>,
}

impl TunnelProcess {
    pub fn spawn(
        executable: &Path,
        working_dir: &Path,
        arguments: &BTreeMap<String, String>,
    ) -> Result<Self, TunnelError> {
        info!(command = %display_command(executable, arguments), "launching tunnel process");

        let mut cmd = Command::new(executable);
        cmd.args(to_argv(arguments))
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        platform::configure_process_group(&mut cmd);

        let mut child = cmd.spawn().map_err(|source| TunnelError::ProcessStart {
            executable: executable.to_path_buf(),
            source,
        })?;

        let pid = child.id();
        let group = platform::post_spawn_setup(pid);
        debug!(pid = ?pid, "tunnel process spawned");

        let (tx, rx) = mpsc::channel(LINE_BUFFER);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, Some(tx), "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, None, "stderr"));
        }

        Ok(Self {
            child,
            pid,
            group,
            lines: Some(rx),
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Wait for the next stdout line, EOF, or the deadline.
    pub async fn read_line(&mut self, deadline: &Deadline) -> LineRead {
        let Some(lines) = self.lines.as_mut() else {
            return LineRead::Closed;
        };
        tokio::select! {
            biased;
            _ = deadline.expired() => LineRead::Expired,
            line = lines.recv() => match line {
                Some(line) => LineRead::Line(line),
                None => LineRead::Closed,
            },
        }
    }

    /// Stop forwarding stdout; later output only reaches the debug log.
    pub fn release_output(&mut self) {
        self.lines = None;
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Signal the process group and wait for it to go away. A process that
    /// already exited is just reaped.
    pub async fn terminate(&mut self) {
        if !self.is_running() {
            debug!(pid = ?self.pid, "tunnel process already exited");
            return;
        }
        info!(pid = ?self.pid, "stopping tunnel process");
        platform::terminate_child(
            &mut self.child,
            self.pid,
            self.group.as_ref(),
            platform::TERMINATE_GRACE,
        )
        .await;
    }
}

async fn forward_lines<R>(stream: R, mut tx: Option<mpsc::Sender<String>>, name: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let text = line.trim_end_matches(['\r', '\n']).to_string();
                debug!(stream = name, "sc: {text}");
                if let Some(sender) = &tx {
                    if sender.send(text).await.is_err() {
                        tx = None;
                    }
                }
            }
            Err(e) => {
                warn!(stream = name, error = %e, "tunnel process read error");
                break;
            }
        }
    }
}
