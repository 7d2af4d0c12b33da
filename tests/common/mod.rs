//! Common test utilities for appdeploy integration tests

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// Relative paths used by every test workspace
pub const STAGING: &str = "staging";
pub const TARGET: &str = "runtime/etc/apps";
pub const BACKUPS: &str = "backups";
pub const LOGS: &str = "logs";

/// A scratch directory laid out like a small deployment host
#[allow(dead_code)]
pub struct TestWorkspace {
    /// Temporary directory
    #[allow(dead_code)]
    pub temp: TempDir,
    /// Path to workspace root
    pub path: PathBuf,
}

#[allow(dead_code)]
impl TestWorkspace {
    /// Create a workspace with empty staging and target directories
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let path = temp.path().to_path_buf();
        std::fs::create_dir_all(path.join(STAGING)).expect("Failed to create staging directory");
        std::fs::create_dir_all(path.join(TARGET)).expect("Failed to create target directory");
        Self { temp, path }
    }

    /// Write a file in workspace
    pub fn write_file(&self, path: &str, content: &str) {
        let file_path = self.path.join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&file_path, content).expect("Failed to write file");
    }

    /// Read a file from workspace
    pub fn read_file(&self, path: &str) -> String {
        let file_path = self.path.join(path);
        std::fs::read_to_string(&file_path).expect("Failed to read file")
    }

    /// Check if a file exists in workspace
    pub fn file_exists(&self, path: &str) -> bool {
        self.path.join(path).exists()
    }

    /// Remove a file from workspace
    pub fn remove_file(&self, path: &str) {
        std::fs::remove_file(self.path.join(path)).expect("Failed to remove file");
    }

    /// Write a valid bundle under `<root>/<name>`
    pub fn write_bundle_in(&self, root: &str, name: &str, version: &str) {
        self.write_file(&format!("{root}/{name}/default/app.conf"), &app_conf(version));
        self.write_file(
            &format!("{root}/{name}/metadata/default.meta"),
            "[]\naccess = read : [ * ]\n",
        );
        self.write_file(&format!("{root}/{name}/bin/setup.sh"), "#!/bin/sh\necho setup\n");
        self.write_file(&format!("{root}/{name}/static/readme.txt"), "static asset\n");
    }

    /// Write a valid bundle into the staging directory
    pub fn stage_bundle(&self, name: &str, version: &str) {
        self.write_bundle_in(STAGING, name, version);
    }

    /// Write a valid bundle straight into the target directory
    pub fn deployed_bundle(&self, name: &str, version: &str) {
        self.write_bundle_in(TARGET, name, version);
    }

    /// Backup archive names, sorted
    pub fn backup_names(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.path.join(BACKUPS))
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Command running the binary inside this workspace, isolated from the
    /// developer's environment and settings
    pub fn cmd(&self) -> Command {
        let mut cmd = appdeploy_cmd();
        cmd.current_dir(&self.path);
        cmd.env("XDG_CONFIG_HOME", self.path.join(".config"));
        cmd.env("HOME", &self.path);
        cmd
    }

    /// `deploy` pointed at this workspace, without prompts or restart
    pub fn deploy_cmd(&self) -> Command {
        let mut cmd = self.cmd();
        cmd.args([
            "deploy",
            "--staging",
            STAGING,
            "--target",
            TARGET,
            "--backup-dir",
            BACKUPS,
            "--log-dir",
            LOGS,
            "--yes",
            "--no-restart",
        ]);
        cmd
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Relative path and content of every entry under `root`, sorted
#[allow(dead_code)]
pub fn snapshot(root: &Path) -> Vec<(String, Option<Vec<u8>>)> {
    let mut entries: Vec<_> = walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|e| e.expect("Failed to walk tree"))
        .map(|e| {
            let rel = e
                .path()
                .strip_prefix(root)
                .expect("entry under root")
                .to_string_lossy()
                .replace('\\', "/");
            let content = e
                .file_type()
                .is_file()
                .then(|| std::fs::read(e.path()).expect("Failed to read file"));
            (rel, content)
        })
        .collect();
    entries.sort();
    entries
}

/// Bundle configuration with `version` in `[launcher]`
pub fn app_conf(version: &str) -> String {
    format!(
        "# release settings\n[install]\nis_configured = 0\n\n[launcher]\nauthor = Ops\nversion = {version}\ndescription = Test bundle\n\n[ui]\nis_visible = 1\n"
    )
}

/// The binary with every `APPDEPLOY_*` override removed
#[allow(deprecated)]
pub fn appdeploy_cmd() -> Command {
    let mut cmd = Command::cargo_bin("appdeploy").expect("binary should be built");
    for var in [
        "APPDEPLOY_CONFIG",
        "APPDEPLOY_STAGING_DIR",
        "APPDEPLOY_RUNTIME_HOME",
        "APPDEPLOY_TARGET_DIR",
        "APPDEPLOY_BACKUP_DIR",
        "APPDEPLOY_LOG_DIR",
        "APPDEPLOY_RESTART_TIMEOUT",
        "APPDEPLOY_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_layout() {
        let workspace = TestWorkspace::new();
        assert!(workspace.file_exists(STAGING));
        assert!(workspace.file_exists(TARGET));
        assert!(!workspace.file_exists(BACKUPS));
    }

    #[test]
    fn test_stage_bundle_writes_required_files() {
        let workspace = TestWorkspace::new();
        workspace.stage_bundle("appA", "1.0.0");
        assert!(workspace.file_exists("staging/appA/default/app.conf"));
        assert!(workspace.file_exists("staging/appA/metadata/default.meta"));
        assert!(workspace.read_file("staging/appA/default/app.conf").contains("version = 1.0.0"));
    }
}
