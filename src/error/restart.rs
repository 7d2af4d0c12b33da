//! Runtime restart errors

use super::DeployError;

/// Creates a restart failed error
pub fn failed(reason: impl Into<String>) -> DeployError {
    DeployError::RestartFailed {
        reason: reason.into(),
    }
}

/// Creates a restart timeout error
pub fn timed_out(secs: u64) -> DeployError {
    DeployError::RestartTimedOut { secs }
}
