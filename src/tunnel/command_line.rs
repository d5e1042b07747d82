//! Converting between launch argument maps and `sc` command lines.
//!
//! The control plane records the command line a tunnel was started with in
//! its metadata. When adopting a tunnel we read the local port back out of
//! that string.

use std::collections::BTreeMap;
use std::path::Path;

use super::error::TunnelError;
use super::launch::{ACCESS_KEY_FLAG, PORT_FLAG, PORT_SHORT_FLAG};

/// Flatten an argument map into argv entries: `--flag value` pairs in map order.
pub fn to_argv(arguments: &BTreeMap<String, String>) -> Vec<String> {
    arguments
        .iter()
        .flat_map(|(flag, value)| [flag.clone(), value.clone()])
        .collect()
}

/// Human-readable command line with quoted values and the access key masked.
pub fn display_command(executable: &Path, arguments: &BTreeMap<String, String>) -> String {
    let mut line = executable.display().to_string();
    for (flag, value) in arguments {
        let value = if flag == ACCESS_KEY_FLAG {
            "****"
        } else {
            value.as_str()
        };
        line.push_str(&format!(" {flag} \"{value}\""));
    }
    line
}

/// Split a recorded launch command into its flag → value pairs.
///
/// The command is split on whitespace and everything before the first token
/// starting with `-` (the executable path) is skipped; the rest must
/// alternate flag, value.
pub fn parse_command(command: &str) -> Result<BTreeMap<String, String>, TunnelError> {
    let parse_error = |reason: String| TunnelError::MetadataParse {
        command: command.to_string(),
        reason,
    };

    let tokens: Vec<&str> = command
        .split_whitespace()
        .skip_while(|token| !token.starts_with('-'))
        .collect();
    if tokens.is_empty() {
        return Err(parse_error("no flags found".to_string()));
    }

    if tokens.len() % 2 != 0 {
        return Err(parse_error(format!(
            "expected flag/value pairs but found an odd number of arguments ({})",
            tokens.len()
        )));
    }

    let mut parameters = BTreeMap::new();
    for pair in tokens.chunks_exact(2) {
        let (flag, value) = (pair[0], pair[1]);
        if !flag.starts_with('-') {
            return Err(parse_error(format!("expected a flag but found '{flag}'")));
        }
        let value = value.trim_matches('"');
        if parameters
            .insert(flag.to_string(), value.to_string())
            .is_some()
        {
            return Err(parse_error(format!("flag '{flag}' appears more than once")));
        }
    }

    Ok(parameters)
}

/// Look a flag up under its long spelling, then its short one.
pub fn find_flag<'a>(
    parameters: &'a BTreeMap<String, String>,
    long: &str,
    short: &str,
) -> Option<&'a str> {
    parameters
        .get(long)
        .or_else(|| parameters.get(short))
        .map(String::as_str)
}

/// Local Selenium port an existing tunnel was launched with.
pub fn port_from_command(command: &str) -> Result<u16, TunnelError> {
    let parameters = parse_command(command)?;
    let value = find_flag(&parameters, PORT_FLAG, PORT_SHORT_FLAG).ok_or_else(|| {
        TunnelError::MetadataParse {
            command: command.to_string(),
            reason: format!("neither {PORT_FLAG} nor {PORT_SHORT_FLAG} is present"),
        }
    })?;
    value.parse::<u16>().map_err(|_| TunnelError::MetadataParse {
        command: command.to_string(),
        reason: format!("'{value}' is not a valid port"),
    })
}
