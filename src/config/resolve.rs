use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "tunnelrig.toml";

/// Walk up the directory tree from `start`, checking for `filename` at each level.
/// Returns the full path to the file if found, or None if the root is reached
/// without finding it.
pub fn find_config(start: &Path, filename: &str) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(filename);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// `~/.config/tunnelrig/tunnelrig.toml` (or the platform equivalent).
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tunnelrig").join(CONFIG_FILE_NAME))
}

/// Resolve the config file path, if there is one.
///
/// An explicit `cli_file` must exist. Otherwise the current directory and its
/// parents are searched for `tunnelrig.toml`, then the user config directory.
/// Running without any config file is fine.
pub fn resolve_config(cli_file: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = cli_file {
        if path.is_file() {
            return Ok(Some(path.canonicalize()?));
        }
        anyhow::bail!("Config file not found: {}", path.display());
    }

    let cwd = std::env::current_dir()?;
    Ok(find_config(&cwd, CONFIG_FILE_NAME)
        .or_else(|| user_config_path().filter(|path| path.is_file())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn config_in_current_dir_found() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "").unwrap();

        let result = find_config(tmp.path(), CONFIG_FILE_NAME);
        assert_eq!(result, Some(config_path));
    }

    #[test]
    fn config_in_grandparent_found() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "").unwrap();

        let grandchild = tmp.path().join("a").join("b");
        fs::create_dir_all(&grandchild).unwrap();

        let result = find_config(&grandchild, CONFIG_FILE_NAME);
        assert_eq!(result, Some(config_path));
    }

    #[test]
    fn no_config_inside_tree() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a").join("b").join("c");
        fs::create_dir_all(&nested).unwrap();

        // The walk continues above the temp dir; only check we did not
        // invent a match inside it.
        if let Some(found) = find_config(&nested, CONFIG_FILE_NAME) {
            assert!(!found.starts_with(tmp.path()));
        }
    }

    #[test]
    fn cli_file_valid_path() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("custom.toml");
        fs::write(&config_path, "").unwrap();

        let result = resolve_config(Some(&config_path)).unwrap();
        assert_eq!(result, Some(config_path.canonicalize().unwrap()));
    }

    #[test]
    fn cli_file_invalid_path_errors() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("missing.toml");
        let err = resolve_config(Some(&missing)).unwrap_err();
        assert!(
            err.to_string().contains("Config file not found"),
            "got: {err}"
        );
    }

    #[test]
    fn user_config_lives_under_tunnelrig_dir() {
        if let Some(path) = user_config_path() {
            assert!(path.ends_with("tunnelrig/tunnelrig.toml"));
        }
    }
}
