use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "tunnelrig",
    version,
    about = "Bring up, share and tear down Sauce Connect tunnels"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Use a specific config file
    #[arg(short = 'f', long = "file", global = true)]
    pub config_file: Option<PathBuf>,

    /// Sauce Labs user name
    #[arg(long, env = "SAUCE_USERNAME", global = true)]
    pub user: Option<String>,

    /// Sauce Labs access key
    #[arg(long, env = "SAUCE_ACCESS_KEY", hide_env_values = true, global = true)]
    pub access_key: Option<String>,

    /// Control plane REST base URL
    #[arg(long, env = "TUNNELRIG_API_URL", global = true)]
    pub api_url: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start a tunnel (or reuse one already running on this host) and keep it up until Ctrl+C
    Start(StartArgs),
    /// List the account's tunnels
    #[command(alias = "ls")]
    List,
    /// Print a tunnel record as JSON
    Inspect {
        /// Tunnel id
        id: String,
    },
    /// Show how many jobs are running through a tunnel
    Jobs {
        /// Tunnel id
        id: String,
    },
    /// Shut a tunnel down through the control plane
    Delete {
        /// Tunnel id
        id: String,
    },
    /// Check credentials, control plane access and the sc binary
    Doctor {
        /// Directory containing the sc binary
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::aot::Shell,
    },
}

#[derive(Debug, Args)]
pub struct StartArgs {
    /// Directory containing the sc binary
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Local Selenium port for the tunnel
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// Tunnel identifier (defaults to the user name)
    #[arg(short = 'i', long)]
    pub identifier: Option<String>,

    /// How long to wait for the tunnel to come up, e.g. "5m"
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Extra sc flag, repeatable: --arg --region=eu-central
    #[arg(long = "arg", value_name = "FLAG=VALUE", value_parser = parse_flag_value, allow_hyphen_values = true)]
    pub args: Vec<(String, String)>,
}

fn parse_flag_value(raw: &str) -> Result<(String, String), String> {
    let (flag, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FLAG=VALUE, got '{raw}'"))?;
    let flag = flag.trim();
    if !flag.starts_with('-') {
        return Err(format!("'{flag}' is not a flag; it must start with '-'"));
    }
    Ok((flag.to_string(), value.to_string()))
}
