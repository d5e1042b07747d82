use serde::{Deserialize, Serialize};

/// Lifecycle of a tunnel as reported by the control plane.
///
/// Variants are declared in lifecycle order, so `Ord` follows the order a
/// well-behaved tunnel moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelStatus {
    New,
    Booting,
    Deploying,
    Running,
    Halting,
    Terminated,
}

impl std::fmt::Display for TunnelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TunnelStatus::New => "new",
            TunnelStatus::Booting => "booting",
            TunnelStatus::Deploying => "deploying",
            TunnelStatus::Running => "running",
            TunnelStatus::Halting => "halting",
            TunnelStatus::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Host-side details the `sc` binary reports when it registers a tunnel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelMetadata {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub git_version: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    /// Full command line the tunnel process was launched with.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub build: Option<String>,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub nofile_limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelRecord {
    pub id: String,
    pub status: TunnelStatus,
    #[serde(default)]
    pub tunnel_identifier: Option<String>,
    #[serde(default)]
    pub user_shutdown: Option<bool>,
    #[serde(default)]
    pub metadata: Option<TunnelMetadata>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub creation_time: Option<i64>,
    #[serde(default)]
    pub shared_tunnel: Option<bool>,
}

impl TunnelRecord {
    pub fn hostname(&self) -> Option<&str> {
        self.metadata.as_ref()?.hostname.as_deref()
    }

    pub fn command(&self) -> Option<&str> {
        self.metadata.as_ref()?.command.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.status == TunnelStatus::Running
    }
}

/// Confirmation returned by `DELETE v1/{user}/tunnels/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelDeleted {
    #[serde(default)]
    pub result: bool,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub jobs_running: Option<u32>,
}

/// Response of `GET v1/{user}/tunnels/{id}/num_jobs`.
///
/// Older API revisions answer with a bare integer, newer ones with an object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum JobCount {
    Bare(u32),
    Detailed {
        #[serde(default)]
        id: Option<String>,
        jobs_running: u32,
    },
}

impl JobCount {
    pub fn jobs_running(&self) -> u32 {
        match self {
            JobCount::Bare(n) => *n,
            JobCount::Detailed { jobs_running, .. } => *jobs_running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_record() {
        let json = r#"{
            "id": "a1b2c3",
            "status": "running",
            "tunnel_identifier": "ci-build",
            "user_shutdown": null,
            "host": "maki1234.miso.saucelabs.com",
            "creation_time": 1700000000,
            "shared_tunnel": false,
            "ip_address": "10.0.0.1",
            "metadata": {
                "hostname": "build-agent-7",
                "git_version": "e9b5d4a",
                "platform": "Linux 6.1 x86_64",
                "command": "./sc --user alice --api-key xxxx --se-port 4445",
                "build": "5217",
                "release": "4.9.2",
                "nofile_limit": 1024
            }
        }"#;
        let record: TunnelRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "a1b2c3");
        assert_eq!(record.status, TunnelStatus::Running);
        assert_eq!(record.tunnel_identifier.as_deref(), Some("ci-build"));
        assert_eq!(record.user_shutdown, None);
        assert_eq!(record.hostname(), Some("build-agent-7"));
        assert_eq!(
            record.command(),
            Some("./sc --user alice --api-key xxxx --se-port 4445")
        );
        assert_eq!(record.metadata.unwrap().nofile_limit, Some(1024));
        assert!(record.shared_tunnel == Some(false));
    }

    #[test]
    fn parse_minimal_record() {
        let record: TunnelRecord =
            serde_json::from_str(r#"{"id": "t1", "status": "booting"}"#).unwrap();
        assert_eq!(record.status, TunnelStatus::Booting);
        assert!(record.metadata.is_none());
        assert!(record.hostname().is_none());
        assert!(!record.is_running());
    }

    #[test]
    fn user_shutdown_is_tri_state() {
        let t: TunnelRecord =
            serde_json::from_str(r#"{"id": "t", "status": "halting", "user_shutdown": true}"#)
                .unwrap();
        let f: TunnelRecord =
            serde_json::from_str(r#"{"id": "t", "status": "halting", "user_shutdown": false}"#)
                .unwrap();
        assert_eq!(t.user_shutdown, Some(true));
        assert_eq!(f.user_shutdown, Some(false));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let result = serde_json::from_str::<TunnelRecord>(r#"{"id": "t", "status": "exploded"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn status_follows_lifecycle_order() {
        assert!(TunnelStatus::New < TunnelStatus::Booting);
        assert!(TunnelStatus::Deploying < TunnelStatus::Running);
        assert!(TunnelStatus::Running < TunnelStatus::Halting);
        assert!(TunnelStatus::Halting < TunnelStatus::Terminated);
        assert_eq!(TunnelStatus::Running.to_string(), "running");
    }

    #[test]
    fn job_count_accepts_both_shapes() {
        let bare: JobCount = serde_json::from_str("3").unwrap();
        let detailed: JobCount =
            serde_json::from_str(r#"{"id": "t1", "jobs_running": 5}"#).unwrap();
        assert_eq!(bare.jobs_running(), 3);
        assert_eq!(detailed.jobs_running(), 5);
    }

    #[test]
    fn deletion_confirmation() {
        let deleted: TunnelDeleted =
            serde_json::from_str(r#"{"result": true, "id": "t1", "jobs_running": 0}"#).unwrap();
        assert!(deleted.result);
        assert_eq!(deleted.id.as_deref(), Some("t1"));
        assert_eq!(deleted.jobs_running, Some(0));
    }
}
