//! Backup archive errors

use super::DeployError;

/// Creates a backup failed error
pub fn failed(path: impl Into<String>, reason: impl Into<String>) -> DeployError {
    DeployError::BackupFailed {
        path: path.into(),
        reason: reason.into(),
    }
}

/// Creates a restore failed error
pub fn restore_failed(archive: impl Into<String>, reason: impl Into<String>) -> DeployError {
    DeployError::RestoreFailed {
        archive: archive.into(),
        reason: reason.into(),
    }
}
