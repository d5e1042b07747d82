pub mod model;
pub mod resolve;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::registry::{RegistryClient, DEFAULT_API_URL};
use crate::tunnel::launch::{
    ACCESS_KEY_FLAG, PORT_FLAG, PORT_SHORT_FLAG, TUNNEL_ID_FLAG, USER_FLAG,
};
use crate::tunnel::LaunchConfig;

use model::TunnelrigConfig;

/// Port `sc` listens on when nothing else is configured.
pub const DEFAULT_PORT: u16 = 4445;

pub fn load_config(path: &Path) -> Result<TunnelrigConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: TunnelrigConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Account settings given on the command line or through the environment.
/// These win over the config file.
#[derive(Debug, Default, Clone)]
pub struct AccountOverrides {
    pub user: Option<String>,
    pub access_key: Option<String>,
    pub api_url: Option<String>,
}

/// `start` flags that override the `[tunnel]` section.
#[derive(Debug, Default, Clone)]
pub struct TunnelOverrides {
    pub directory: Option<PathBuf>,
    pub port: Option<u16>,
    pub identifier: Option<String>,
    pub timeout: Option<Duration>,
    pub args: Vec<(String, String)>,
}

#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub access_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("access_key", &"<redacted>")
            .finish()
    }
}

/// A config file (if one was found) merged with command-line overrides.
#[derive(Debug)]
pub struct Settings {
    pub file: TunnelrigConfig,
    pub path: Option<PathBuf>,
    pub account: AccountOverrides,
}

impl Settings {
    /// Find and load the config file, then layer `account` on top.
    pub fn load(cli_file: Option<&Path>, account: AccountOverrides) -> Result<Self> {
        let path = resolve::resolve_config(cli_file)?;
        let file = match &path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                load_config(path)?
            }
            None => TunnelrigConfig::default(),
        };
        Ok(Self {
            file,
            path,
            account,
        })
    }

    /// Directory relative config paths are resolved against.
    pub fn base_dir(&self) -> Result<PathBuf> {
        match self.path.as_ref().and_then(|p| p.parent()) {
            Some(dir) => Ok(dir.to_path_buf()),
            None => std::env::current_dir().context("Failed to determine current directory"),
        }
    }

    pub fn credentials(&self) -> Result<Credentials> {
        let user = first_non_empty(&self.account.user, &self.file.account.user).context(
            "No Sauce Labs user configured. Set SAUCE_USERNAME, pass --user, or set account.user in tunnelrig.toml",
        )?;
        let access_key = first_non_empty(&self.account.access_key, &self.file.account.access_key)
            .context(
                "No Sauce Labs access key configured. Set SAUCE_ACCESS_KEY, pass --access-key, or set account.access_key in tunnelrig.toml",
            )?;
        Ok(Credentials { user, access_key })
    }

    pub fn api_url(&self) -> String {
        first_non_empty(&self.account.api_url, &self.file.account.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    pub fn client(&self) -> Result<RegistryClient> {
        let credentials = self.credentials()?;
        RegistryClient::new(&credentials.user, &credentials.access_key, &self.api_url())
            .context("Failed to set up control plane client")
    }

    /// Where to look for `sc`: the override, then `tunnel.directory`, then
    /// the current directory.
    pub fn tunnel_directory(&self, cli_dir: Option<&Path>) -> Result<PathBuf> {
        match (cli_dir, &self.file.tunnel.directory) {
            (Some(dir), _) => Ok(dir.to_path_buf()),
            (None, Some(dir)) if dir.is_relative() => Ok(self.base_dir()?.join(dir)),
            (None, Some(dir)) => Ok(dir.clone()),
            (None, None) => {
                std::env::current_dir().context("Failed to determine current directory")
            }
        }
    }

    /// Merge file values, `overrides` and credentials into a validated
    /// [`LaunchConfig`].
    pub fn launch_config(&self, overrides: &TunnelOverrides) -> Result<LaunchConfig> {
        let credentials = self.credentials()?;
        let tunnel = &self.file.tunnel;

        let directory = self.tunnel_directory(overrides.directory.as_deref())?;

        let mut arguments: BTreeMap<String, String> = tunnel.args.clone();
        arguments.extend(overrides.args.iter().cloned());
        for flag in arguments.keys() {
            if !flag.starts_with('-') {
                bail!("Launch argument '{flag}' must be a flag starting with '-'");
            }
            if [USER_FLAG, ACCESS_KEY_FLAG, PORT_FLAG, PORT_SHORT_FLAG].contains(&flag.as_str()) {
                bail!("Launch argument '{flag}' is managed by tunnelrig; use the dedicated setting instead");
            }
        }

        let port = overrides.port.or(tunnel.port).unwrap_or(DEFAULT_PORT);
        arguments.insert(USER_FLAG.to_string(), credentials.user);
        arguments.insert(ACCESS_KEY_FLAG.to_string(), credentials.access_key);
        arguments.insert(PORT_FLAG.to_string(), port.to_string());
        if let Some(identifier) = overrides.identifier.as_ref().or(tunnel.identifier.as_ref()) {
            arguments.insert(TUNNEL_ID_FLAG.to_string(), identifier.clone());
        }

        let mut config = LaunchConfig::new(&directory, arguments)?.with_api_url(self.api_url());

        let timeout = match overrides.timeout {
            Some(timeout) => Some(timeout),
            None => parse_duration("tunnel.timeout", tunnel.timeout.as_deref())?,
        };
        if let Some(timeout) = timeout {
            config = config.with_timeout(timeout);
        }
        if let Some(timeout) = parse_duration("tunnel.dispose_timeout", tunnel.dispose_timeout.as_deref())? {
            config = config.with_dispose_timeout(timeout);
        }
        if let Some(hostname) = &tunnel.hostname {
            config = config.with_hostname(hostname.clone());
        }
        Ok(config)
    }
}

fn first_non_empty(primary: &Option<String>, fallback: &Option<String>) -> Option<String> {
    [primary, fallback]
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
        .cloned()
}

fn parse_duration(field: &str, value: Option<&str>) -> Result<Option<Duration>> {
    value
        .map(|raw| {
            humantime::parse_duration(raw)
                .with_context(|| format!("Invalid duration '{raw}' for {field}"))
        })
        .transpose()
}
