use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::registry::DEFAULT_API_URL;

use super::error::TunnelError;

/// Name of the Sauce Connect binary looked up in the launch directory.
#[cfg(windows)]
pub const EXECUTABLE_NAME: &str = "sc.exe";
#[cfg(not(windows))]
pub const EXECUTABLE_NAME: &str = "sc";

pub const USER_FLAG: &str = "--user";
pub const ACCESS_KEY_FLAG: &str = "--api-key";
pub const PORT_FLAG: &str = "--se-port";
pub const PORT_SHORT_FLAG: &str = "-P";
pub const TUNNEL_ID_FLAG: &str = "--tunnel-identifier";

pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_DISPOSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything needed to launch (or find) one tunnel.
///
/// Built once through [`LaunchConfig::new`], which validates the directory
/// and the required flags, and then handed to the coordinator by value.
#[derive(Clone)]
pub struct LaunchConfig {
    directory: PathBuf,
    arguments: BTreeMap<String, String>,
    port: u16,
    timeout: Duration,
    dispose_timeout: Duration,
    hostname: String,
    api_url: String,
}

impl LaunchConfig {
    /// Validate `directory` and `arguments`.
    ///
    /// `arguments` must carry `--user`, `--api-key` and `--se-port`.
    /// `--tunnel-identifier` falls back to the user when absent.
    pub fn new(
        directory: impl Into<PathBuf>,
        mut arguments: BTreeMap<String, String>,
    ) -> Result<Self, TunnelError> {
        let directory = validate_directory(&directory.into())?;

        for flag in [USER_FLAG, ACCESS_KEY_FLAG, PORT_FLAG] {
            match arguments.get(flag) {
                Some(value) if !value.trim().is_empty() => {}
                Some(_) => {
                    return Err(TunnelError::Configuration(format!(
                        "launch argument '{flag}' must not be empty"
                    )))
                }
                None => {
                    return Err(TunnelError::Configuration(format!(
                        "missing required launch argument '{flag}'"
                    )))
                }
            }
        }

        let port = arguments
            .get(PORT_FLAG)
            .map(|p| p.trim())
            .and_then(|p| p.parse::<u16>().ok())
            .filter(|p| *p != 0)
            .ok_or_else(|| {
                TunnelError::Configuration(format!(
                    "'{PORT_FLAG}' must be a port number between 1 and 65535"
                ))
            })?;

        if !arguments.contains_key(TUNNEL_ID_FLAG) {
            let user = arguments[USER_FLAG].clone();
            arguments.insert(TUNNEL_ID_FLAG.to_string(), user);
        }

        Ok(Self {
            directory,
            arguments,
            port,
            timeout: DEFAULT_START_TIMEOUT,
            dispose_timeout: DEFAULT_DISPOSE_TIMEOUT,
            hostname: local_hostname(),
            api_url: DEFAULT_API_URL.to_string(),
        })
    }

    /// The common case: `sc` in the current directory, account credentials
    /// and the local Selenium port.
    pub fn for_account(user: &str, access_key: &str, port: u16) -> Result<Self, TunnelError> {
        let cwd = std::env::current_dir().map_err(|e| {
            TunnelError::Configuration(format!("cannot determine current directory: {e}"))
        })?;
        Self::new(cwd, account_arguments(user, access_key, port))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_dispose_timeout(mut self, timeout: Duration) -> Self {
        self.dispose_timeout = timeout;
        self
    }

    /// Override the hostname used to recognise tunnels started on this machine.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn executable(&self) -> PathBuf {
        self.directory.join(EXECUTABLE_NAME)
    }

    pub fn arguments(&self) -> &BTreeMap<String, String> {
        &self.arguments
    }

    pub fn user(&self) -> &str {
        &self.arguments[USER_FLAG]
    }

    pub fn access_key(&self) -> &str {
        &self.arguments[ACCESS_KEY_FLAG]
    }

    pub fn identifier(&self) -> &str {
        &self.arguments[TUNNEL_ID_FLAG]
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn dispose_timeout(&self) -> Duration {
        self.dispose_timeout
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

impl std::fmt::Debug for LaunchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let arguments: BTreeMap<&str, &str> = self
            .arguments
            .iter()
            .map(|(k, v)| {
                if k == ACCESS_KEY_FLAG {
                    (k.as_str(), "<redacted>")
                } else {
                    (k.as_str(), v.as_str())
                }
            })
            .collect();
        f.debug_struct("LaunchConfig")
            .field("directory", &self.directory)
            .field("arguments", &arguments)
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .field("dispose_timeout", &self.dispose_timeout)
            .field("hostname", &self.hostname)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Argument map for the `user/key/port` case.
pub fn account_arguments(user: &str, access_key: &str, port: u16) -> BTreeMap<String, String> {
    BTreeMap::from([
        (USER_FLAG.to_string(), user.to_string()),
        (ACCESS_KEY_FLAG.to_string(), access_key.to_string()),
        (PORT_FLAG.to_string(), port.to_string()),
    ])
}

/// Hostname of this machine as the `sc` binary reports it in tunnel metadata.
pub fn local_hostname() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}

fn validate_directory(directory: &Path) -> Result<PathBuf, TunnelError> {
    if directory.as_os_str().is_empty() {
        return Err(TunnelError::Configuration(
            "launch directory must not be empty".to_string(),
        ));
    }
    let metadata = std::fs::metadata(directory).map_err(|_| {
        TunnelError::Configuration(format!(
            "the directory '{}' does not exist",
            directory.display()
        ))
    })?;
    if !metadata.is_dir() {
        return Err(TunnelError::Configuration(format!(
            "'{}' should be a directory, not a file",
            directory.display()
        )));
    }
    directory.canonicalize().map_err(|e| {
        TunnelError::Configuration(format!(
            "cannot resolve directory '{}': {e}",
            directory.display()
        ))
    })
}
