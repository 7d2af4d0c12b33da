//! Runtime restart after a deployment
//!
//! The runtime only picks up new or changed bundles after a restart. Whether
//! one happens is decided by [`RestartPolicy`]; with `Ask` the operator is
//! prompted with a yes/no/info choice, parsed by [`resolve`].

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{self, DeployError, Result};
use crate::pipeline::RunReport;
use crate::platform::Platform;
use crate::ui::prompt::Prompter;

/// Default upper bound for a restart
pub const DEFAULT_RESTART_TIMEOUT: Duration = Duration::from_secs(300);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// When to restart the runtime after a deployment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartPolicy {
    #[default]
    Ask,
    Always,
    Never,
}

impl RestartPolicy {
    /// `Ask` cannot be honoured without a terminal
    pub fn effective(self, interactive: bool) -> Self {
        match self {
            RestartPolicy::Ask if !interactive => RestartPolicy::Never,
            other => other,
        }
    }
}

/// Operator's answer to the restart prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartAction {
    Restart,
    Skip,
    Info,
}

/// Parse a restart prompt answer
///
/// Accepts `y`/`yes`, `n`/`no` and `i`/`info`, ignoring case and surrounding
/// whitespace. Anything else is `None` and the prompt should be repeated.
pub fn resolve(input: &str) -> Option<RestartAction> {
    match input.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(RestartAction::Restart),
        "n" | "no" => Some(RestartAction::Skip),
        "i" | "info" => Some(RestartAction::Info),
        _ => None,
    }
}

/// Run `<runtime_home>/bin/<exe> restart`, killing it after `timeout`
///
/// A non-zero exit is an error carrying whatever the runtime wrote to stderr.
pub fn restart_runtime(platform: &Platform, runtime_home: &Path, timeout: Duration) -> Result<ExitStatus> {
    let candidates = platform.executable_candidates(runtime_home);
    let Some(program) = candidates.iter().find(|p| p.is_file()) else {
        return Err(DeployError::RuntimeExecutableNotFound {
            path: runtime_home.join("bin").display().to_string(),
        });
    };

    tracing::info!(program = %program.display(), "restarting runtime");

    let mut stderr_file = tempfile::tempfile()?;
    let mut child = Command::new(program)
        .arg("restart")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::from(stderr_file.try_clone()?))
        .spawn()
        .map_err(|e| error::restart::failed(format!("{}: {e}", program.display())))?;

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            tracing::error!(secs = timeout.as_secs(), "runtime restart timed out");
            return Err(error::restart::timed_out(timeout.as_secs()));
        }
        thread::sleep(POLL_INTERVAL);
    };

    if status.success() {
        tracing::info!("runtime restarted");
        return Ok(status);
    }

    let stderr = read_captured(&mut stderr_file);
    let reason = if stderr.is_empty() {
        format!("exited with {status}")
    } else {
        format!("exited with {status}: {stderr}")
    };
    tracing::error!(%reason, "runtime restart failed");
    Err(error::restart::failed(reason))
}

fn read_captured(file: &mut File) -> String {
    let mut captured = String::new();
    if file.seek(SeekFrom::Start(0)).is_ok() {
        let _ = file.read_to_string(&mut captured);
    }
    captured.trim().to_string()
}

/// Ways to restart the runtime by hand
pub fn manual_instructions(platform: &Platform, runtime_home: &Path) -> Vec<String> {
    let mut lines = vec![format!(
        "Command line: {}",
        platform.restart_command(runtime_home)
    )];
    if let Some(hint) = platform.service_hint() {
        lines.push(format!("Service manager: {hint}"));
    }
    lines
}

/// What the advisor ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartOutcome {
    /// Nothing was deployed
    NotNeeded,
    Restarted,
    Skipped,
    Failed(String),
}

/// Decides on and performs the post-deployment restart
#[derive(Debug, Clone)]
pub struct RestartAdvisor {
    platform: Platform,
    runtime_home: PathBuf,
    timeout: Duration,
    policy: RestartPolicy,
}

impl RestartAdvisor {
    pub fn new(platform: Platform, runtime_home: PathBuf, timeout: Duration, policy: RestartPolicy) -> Self {
        Self {
            platform,
            runtime_home,
            timeout,
            policy,
        }
    }

    pub fn manual_instructions(&self) -> Vec<String> {
        manual_instructions(&self.platform, &self.runtime_home)
    }

    /// Apply the restart policy to a finished run
    ///
    /// Restart failures are reported in the outcome and never turn into an error.
    pub fn advise(&self, report: &RunReport, prompter: &mut dyn Prompter, interactive: bool) -> RestartOutcome {
        let deployed: Vec<String> = report.succeeded().map(|r| r.bundle.clone()).collect();
        if deployed.is_empty() {
            return RestartOutcome::NotNeeded;
        }

        match self.policy.effective(interactive) {
            RestartPolicy::Always => self.restart(),
            RestartPolicy::Never => RestartOutcome::Skipped,
            RestartPolicy::Ask => loop {
                match prompter.restart_choice(&deployed) {
                    Ok(RestartAction::Restart) => break self.restart(),
                    Ok(RestartAction::Skip) => break RestartOutcome::Skipped,
                    Ok(RestartAction::Info) => prompter.show_restart_info(),
                    Err(e) => {
                        tracing::warn!(error = %e, "restart prompt failed, skipping restart");
                        break RestartOutcome::Skipped;
                    }
                }
            },
        }
    }

    fn restart(&self) -> RestartOutcome {
        match restart_runtime(&self.platform, &self.runtime_home, self.timeout) {
            Ok(_) => RestartOutcome::Restarted,
            Err(e) => RestartOutcome::Failed(e.to_string()),
        }
    }
}
