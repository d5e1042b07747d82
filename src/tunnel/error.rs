use std::path::PathBuf;
use std::time::Duration;

use crate::registry::RegistryError;

/// What the coordinator was waiting on when a deadline or cancellation fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discovery,
    ProcessOutput,
    RunningConfirmation,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Discovery => f.write_str("existing tunnel discovery"),
            Stage::ProcessOutput => f.write_str("tunnel process output"),
            Stage::RunningConfirmation => f.write_str("control plane to report the tunnel running"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    #[error("invalid tunnel configuration: {0}")]
    Configuration(String),

    #[error("failed to launch {}", .executable.display())]
    ProcessStart {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tunnel process said goodbye, or exited without ever saying it was
    /// ready. `output` is everything it printed.
    #[error("tunnel process did not come up:\n{output}")]
    ProxyStartup { output: String },

    #[error("could not parse launch command '{command}': {reason}")]
    MetadataParse { command: String, reason: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("cancelled while waiting for {stage}")]
    Cancelled { stage: Stage },

    #[error("timed out after {timeout:?} waiting for {stage}")]
    TimedOut { stage: Stage, timeout: Duration },

    #[error("tunnel was already started (phase: {phase})")]
    AlreadyStarted { phase: String },
}

impl TunnelError {
    /// True for both caller cancellation and an exhausted start timeout.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            TunnelError::Cancelled { .. } | TunnelError::TimedOut { .. }
        )
    }
}
