use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Contents of `tunnelrig.toml`. Every section is optional.
#[derive(Debug, Default, Deserialize)]
pub struct TunnelrigConfig {
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub tunnel: TunnelConfig,
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
pub struct AccountConfig {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
pub struct TunnelConfig {
    /// Directory holding the `sc` binary. Relative paths are resolved
    /// against the directory containing the config file.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub identifier: Option<String>,
    /// Humantime duration, e.g. `"5m"` or `"90s"`.
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub dispose_timeout: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    /// Extra `sc` flags and their values, e.g. `"--region" = "eu-central"`.
    #[serde(default)]
    pub args: BTreeMap<String, String>,
}
