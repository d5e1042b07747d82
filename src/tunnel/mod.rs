pub mod command_line;
pub mod deadline;
pub mod error;
pub mod launch;
pub mod process;
pub mod reconcile;
pub mod scanner;

use std::future::Future;

use reqwest::Url;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::registry::model::TunnelRecord;
use crate::registry::{RegistryClient, RegistryError};

use command_line::port_from_command;
use deadline::Deadline;
use process::TunnelProcess;
use reconcile::{find_match, on_host, running_with_identifier, wait_for_match, MatchOutcome};
use scanner::ScanOutcome;

pub use error::{Stage, TunnelError};
pub use launch::LaunchConfig;

// ---------------------------------------------------------------------------
// TunnelPhase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelPhase {
    Idle,
    Discovering,
    Adopting,
    Launching,
    AwaitingRunning,
    Ready,
    Disposing,
    Terminated,
    Failed { reason: String },
    Cancelled,
}

impl std::fmt::Display for TunnelPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TunnelPhase::Idle => f.write_str("idle"),
            TunnelPhase::Discovering => f.write_str("discovering"),
            TunnelPhase::Adopting => f.write_str("adopting"),
            TunnelPhase::Launching => f.write_str("launching"),
            TunnelPhase::AwaitingRunning => f.write_str("awaiting running"),
            TunnelPhase::Ready => f.write_str("ready"),
            TunnelPhase::Disposing => f.write_str("disposing"),
            TunnelPhase::Terminated => f.write_str("terminated"),
            TunnelPhase::Failed { reason } => write!(f, "failed: {reason}"),
            TunnelPhase::Cancelled => f.write_str("cancelled"),
        }
    }
}

// ---------------------------------------------------------------------------
// TunnelInfo
// ---------------------------------------------------------------------------

/// Snapshot of a ready tunnel, handed out by `start` and `run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelInfo {
    pub proxy_address: Url,
    pub port: u16,
    /// The tunnel already existed and was adopted rather than launched.
    pub previously_running: bool,
    /// Everything `sc` printed up to its readiness line. `None` when adopted.
    pub output: Option<String>,
    pub tunnel_id: String,
    pub identifier: String,
    pub user: String,
}

/// Selenium endpoint served by a tunnel listening on `port`.
pub fn proxy_address(port: u16) -> Result<Url, TunnelError> {
    Url::parse(&format!("http://localhost:{port}/wd/hub"))
        .map_err(|e| TunnelError::Configuration(format!("invalid proxy address: {e}")))
}

// ---------------------------------------------------------------------------
// TunnelCoordinator
// ---------------------------------------------------------------------------

/// Brings one tunnel up (launching `sc` or adopting a tunnel already running
/// on this host) and tears down only what it launched.
pub struct TunnelCoordinator {
    config: LaunchConfig,
    client: RegistryClient,
    phase: TunnelPhase,
    output: Option<String>,
    previously_running: bool,
    port: Option<u16>,
    proxy_address: Option<Url>,
    process: Option<TunnelProcess>,
    record: Option<TunnelRecord>,
}

impl TunnelCoordinator {
    pub fn new(config: LaunchConfig) -> Result<Self, TunnelError> {
        let client = RegistryClient::new(config.user(), config.access_key(), config.api_url())?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: LaunchConfig, client: RegistryClient) -> Self {
        Self {
            config,
            client,
            phase: TunnelPhase::Idle,
            output: None,
            previously_running: false,
            port: None,
            proxy_address: None,
            process: None,
            record: None,
        }
    }

    /// Bring the tunnel up within the configured timeout.
    ///
    /// Only valid once: any call after the first returns
    /// [`TunnelError::AlreadyStarted`] without touching the control plane.
    pub async fn start(&mut self, cancel: CancellationToken) -> Result<TunnelInfo, TunnelError> {
        if self.phase != TunnelPhase::Idle {
            return Err(TunnelError::AlreadyStarted {
                phase: self.phase.to_string(),
            });
        }

        let deadline = Deadline::after(self.config.timeout(), cancel);
        match self.bring_up(&deadline).await {
            Ok(info) => Ok(info),
            Err(e) => {
                // Running out of time while waiting on the control plane is
                // treated like a cancellation; a silent process is a failure.
                self.phase = match e {
                    TunnelError::Cancelled { .. }
                    | TunnelError::TimedOut {
                        stage: Stage::Discovery | Stage::RunningConfirmation,
                        ..
                    } => TunnelPhase::Cancelled,
                    _ => TunnelPhase::Failed {
                        reason: e.to_string(),
                    },
                };
                warn!(error = %e, "tunnel did not start");
                Err(e)
            }
        }
    }

    async fn bring_up(&mut self, deadline: &Deadline) -> Result<TunnelInfo, TunnelError> {
        self.phase = TunnelPhase::Discovering;
        info!(
            hostname = %self.config.hostname(),
            identifier = %self.config.identifier(),
            "looking for a tunnel already running on this host"
        );

        let existing = tokio::select! {
            biased;
            _ = deadline.expired() => return Err(deadline.error(Stage::Discovery)),
            found = find_match(&self.client, deadline.token(), on_host(self.config.hostname())) => {
                found.map_err(|e| registry_failure(e, deadline, Stage::Discovery))?
            }
        };

        let (port, record) = match existing {
            Some(record) => {
                self.phase = TunnelPhase::Adopting;
                let port = adopted_port(&record)?;
                info!(tunnel = %record.id, port, "adopting existing tunnel");
                self.previously_running = true;
                self.phase = TunnelPhase::AwaitingRunning;
                (port, record)
            }
            None => {
                self.phase = TunnelPhase::Launching;
                self.launch(deadline).await?;

                self.phase = TunnelPhase::AwaitingRunning;
                info!(
                    identifier = %self.config.identifier(),
                    "waiting for the control plane to report the tunnel running"
                );
                let outcome = wait_for_match(
                    &self.client,
                    deadline,
                    running_with_identifier(self.config.identifier()),
                )
                .await
                .map_err(|e| registry_failure(e, deadline, Stage::RunningConfirmation))?;
                let record = match outcome {
                    MatchOutcome::Found(record) => record,
                    MatchOutcome::Exhausted => {
                        return Err(deadline.error(Stage::RunningConfirmation))
                    }
                };
                (self.config.port(), record)
            }
        };

        let address = proxy_address(port)?;
        info!(
            tunnel = %record.id,
            port,
            proxy = %address,
            adopted = self.previously_running,
            "tunnel ready"
        );

        let info = TunnelInfo {
            proxy_address: address.clone(),
            port,
            previously_running: self.previously_running,
            output: self.output.clone(),
            tunnel_id: record.id.clone(),
            identifier: self.config.identifier().to_string(),
            user: self.config.user().to_string(),
        };
        self.port = Some(port);
        self.proxy_address = Some(address);
        self.record = Some(record);
        self.phase = TunnelPhase::Ready;
        Ok(info)
    }

    /// Spawn `sc` and wait for it to say it is ready.
    async fn launch(&mut self, deadline: &Deadline) -> Result<(), TunnelError> {
        let process = self.process.insert(TunnelProcess::spawn(
            &self.config.executable(),
            self.config.directory(),
            self.config.arguments(),
        )?);

        let scan = scanner::scan(process, deadline).await;
        process.release_output();
        self.output = Some(scan.text.clone());

        match scan.outcome {
            ScanOutcome::Success => {
                debug!(pid = ?process.pid(), "tunnel process reported ready");
                Ok(())
            }
            ScanOutcome::Failure => Err(TunnelError::ProxyStartup { output: scan.text }),
            ScanOutcome::TimedOut => Err(deadline.error(Stage::ProcessOutput)),
        }
    }

    /// Tear down whatever this coordinator launched. Never fails; problems
    /// are logged. Calling it again is a no-op.
    pub async fn stop(&mut self) {
        match self.phase {
            TunnelPhase::Terminated => {
                debug!("tunnel already stopped");
                return;
            }
            TunnelPhase::Idle => {
                self.phase = TunnelPhase::Terminated;
                return;
            }
            _ => {}
        }

        self.phase = TunnelPhase::Disposing;
        match self.process.take() {
            Some(mut process) => {
                self.delete_owned_record().await;
                process.terminate().await;
            }
            None if self.previously_running => {
                debug!("leaving adopted tunnel running");
            }
            None => {}
        }
        self.phase = TunnelPhase::Terminated;
    }

    async fn delete_owned_record(&self) {
        let budget = self.config.dispose_timeout();
        let cancel = CancellationToken::new();
        let recorded_id = self.record.as_ref().map(|r| r.id.as_str());
        let identifier = self.config.identifier();
        let hostname = self.config.hostname();

        let is_ours = |record: &TunnelRecord| match recorded_id {
            Some(id) => record.id == id,
            None => {
                record.tunnel_identifier.as_deref() == Some(identifier)
                    && record.hostname() == Some(hostname)
            }
        };

        let disposal = async {
            let Some(record) = find_match(&self.client, &cancel, is_ours).await? else {
                return Ok(None);
            };
            let deleted = self.client.delete_tunnel(&record.id, &cancel).await?;
            Ok::<_, RegistryError>(Some((record.id, deleted)))
        };

        match tokio::time::timeout(budget, disposal).await {
            Ok(Ok(Some((id, deleted)))) => {
                info!(tunnel = %id, jobs_running = ?deleted.jobs_running, "tunnel deleted");
            }
            Ok(Ok(None)) => debug!("no tunnel record left to delete"),
            Ok(Err(e)) if e.is_not_found() => debug!(error = %e, "tunnel record already gone"),
            Ok(Err(e)) => warn!(error = %e, "could not delete tunnel record"),
            Err(_) => warn!(?budget, "gave up deleting tunnel record"),
        }
    }

    /// Start, hand the tunnel to `body`, then stop, whatever happened.
    pub async fn run<F, Fut, T>(mut self, cancel: CancellationToken, body: F) -> Result<T, TunnelError>
    where
        F: FnOnce(TunnelInfo) -> Fut,
        Fut: Future<Output = T>,
    {
        let result = match self.start(cancel).await {
            Ok(info) => Ok(body(info).await),
            Err(e) => Err(e),
        };
        self.stop().await;
        result
    }

    pub fn phase(&self) -> &TunnelPhase {
        &self.phase
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn proxy_address(&self) -> Option<&Url> {
        self.proxy_address.as_ref()
    }

    pub fn previously_running(&self) -> bool {
        self.previously_running
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn tunnel(&self) -> Option<&TunnelRecord> {
        self.record.as_ref()
    }

    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    pub fn client(&self) -> &RegistryClient {
        &self.client
    }
}

fn adopted_port(record: &TunnelRecord) -> Result<u16, TunnelError> {
    let command = record.command().ok_or_else(|| TunnelError::MetadataParse {
        command: String::new(),
        reason: format!("tunnel {} has no recorded launch command", record.id),
    })?;
    port_from_command(command)
}

/// A request aborted by the deadline's token is reported as the deadline firing.
fn registry_failure(e: RegistryError, deadline: &Deadline, stage: Stage) -> TunnelError {
    match e {
        RegistryError::Cancelled => deadline.error(stage),
        other => TunnelError::Registry(other),
    }
}
