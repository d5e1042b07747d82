#![allow(dead_code)]
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const READY_SCRIPT: &str =
    "echo 'Starting Sauce Connect'\necho 'Sauce Connect is up, you may start your tests.'\nsleep 60";

pub struct TestProject {
    pub dir: TempDir,
    pub config_path: PathBuf,
}

impl TestProject {
    pub fn new(config_toml: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("tunnelrig.toml");
        std::fs::write(&config_path, config_toml).unwrap();
        Self { dir, config_path }
    }

    pub fn config_arg(&self) -> &str {
        self.config_path.to_str().unwrap()
    }
}

/// `tunnelrig` with credentials and config discovery isolated from the
/// developer's machine.
pub fn tunnelrig(home: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("tunnelrig").unwrap();
    cmd.current_dir(home)
        .env_remove("SAUCE_USERNAME")
        .env_remove("SAUCE_ACCESS_KEY")
        .env_remove("TUNNELRIG_API_URL")
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("RUST_LOG", "warn");
    cmd
}

/// Write an executable `sc` shell script into `dir`.
#[cfg(unix)]
pub fn fake_sc(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("sc");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
