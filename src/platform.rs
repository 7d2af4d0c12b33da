//! Host platform capabilities
//!
//! Everything OS-specific the deployer needs is gathered in one [`Platform`]
//! value chosen once at startup: where the runtime is usually installed, the
//! name of its executable, how deployed files get their permission bits and
//! how the runtime is restarted.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OsKind {
    Linux,
    MacOs,
    Windows,
    Other,
}

impl OsKind {
    /// The OS this binary was built for
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            OsKind::Linux
        } else if cfg!(target_os = "macos") {
            OsKind::MacOs
        } else if cfg!(target_os = "windows") {
            OsKind::Windows
        } else {
            OsKind::Other
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OsKind::Linux => "Linux",
            OsKind::MacOs => "macOS",
            OsKind::Windows => "Windows",
            OsKind::Other => "Unknown",
        }
    }
}

/// How permission bits are applied to a freshly copied bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionPlan {
    /// Leave whatever the copy produced
    Skip,
    /// Explicit unix modes; files with an executable extension get `exec_mode`
    Unix {
        dir_mode: u32,
        file_mode: u32,
        exec_mode: u32,
        exec_extensions: &'static [&'static str],
    },
}

impl PermissionPlan {
    /// Mode for a file, or `None` when the plan leaves files alone
    pub fn file_mode_for(&self, path: &Path) -> Option<u32> {
        match self {
            PermissionPlan::Skip => None,
            PermissionPlan::Unix {
                file_mode,
                exec_mode,
                exec_extensions,
                ..
            } => {
                let is_exec = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|ext| exec_extensions.contains(&ext));
                Some(if is_exec { *exec_mode } else { *file_mode })
            }
        }
    }
}

const UNIX_PERMISSIONS: PermissionPlan = PermissionPlan::Unix {
    dir_mode: 0o755,
    file_mode: 0o644,
    exec_mode: 0o755,
    exec_extensions: &["py", "sh"],
};

/// Executable used to control the runtime
const RUNTIME_EXECUTABLE: &str = "splunk";

/// A program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl std::fmt::Display for RestartCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let program = self.program.display().to_string();
        if program.contains(' ') {
            write!(f, "\"{program}\"")?;
        } else {
            f.write_str(&program)?;
        }
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Capability record for the host OS
#[derive(Debug, Clone)]
pub struct Platform {
    pub os: OsKind,
    pub default_runtime_home: PathBuf,
    pub executable_name: &'static str,
    pub permission_plan: PermissionPlan,
}

impl Platform {
    /// Capabilities of the running host
    pub fn detect() -> Self {
        Self::for_os(OsKind::current())
    }

    pub fn for_os(os: OsKind) -> Self {
        match os {
            OsKind::MacOs => Self {
                os,
                default_runtime_home: PathBuf::from("/Applications/Splunk"),
                executable_name: RUNTIME_EXECUTABLE,
                permission_plan: UNIX_PERMISSIONS,
            },
            OsKind::Windows => Self {
                os,
                default_runtime_home: PathBuf::from("C:/Program Files/Splunk"),
                executable_name: "splunk.exe",
                permission_plan: PermissionPlan::Skip,
            },
            OsKind::Linux | OsKind::Other => Self {
                os,
                default_runtime_home: PathBuf::from("/opt/splunk"),
                executable_name: RUNTIME_EXECUTABLE,
                permission_plan: UNIX_PERMISSIONS,
            },
        }
    }

    /// Directory deployed bundles live in for a given runtime home
    pub fn default_target_root(&self, runtime_home: &Path) -> PathBuf {
        runtime_home.join("etc").join("apps")
    }

    /// Executables to try, in order, under `<runtime_home>/bin`
    pub fn executable_candidates(&self, runtime_home: &Path) -> Vec<PathBuf> {
        let bin = runtime_home.join("bin");
        let mut candidates = vec![bin.join(self.executable_name)];
        if self.os == OsKind::Windows {
            candidates.push(bin.join(RUNTIME_EXECUTABLE));
        }
        candidates
    }

    /// The restart command as it should be run, preferring an existing executable
    pub fn restart_command(&self, runtime_home: &Path) -> RestartCommand {
        let candidates = self.executable_candidates(runtime_home);
        let program = candidates
            .iter()
            .find(|p| p.exists())
            .unwrap_or(&candidates[0])
            .clone();
        RestartCommand {
            program,
            args: vec!["restart".to_string()],
        }
    }

    /// Service manager command an operator can use instead
    pub fn service_hint(&self) -> Option<&'static str> {
        match self.os {
            OsKind::Linux => Some("sudo systemctl restart splunk"),
            OsKind::MacOs => Some("sudo launchctl kickstart -k system/com.splunk.splunkd"),
            OsKind::Windows => Some("Restart the 'Splunkd' service from the Services panel"),
            OsKind::Other => None,
        }
    }
}
