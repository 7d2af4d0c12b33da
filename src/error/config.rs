//! Configuration errors

use std::path::Path;

use super::DeployError;

/// Creates a config not found error
pub fn not_found(path: impl Into<String>) -> DeployError {
    DeployError::ConfigNotFound { path: path.into() }
}

/// Creates a config parse failed error
pub fn parse_failed(path: impl Into<String>, reason: impl Into<String>) -> DeployError {
    DeployError::ConfigParseFailed {
        path: path.into(),
        reason: reason.into(),
    }
}

/// Creates a missing version field error
pub fn version_missing(path: impl Into<String>) -> DeployError {
    DeployError::VersionFieldMissing { path: path.into() }
}

/// Creates a config write failed error
pub fn write_failed(path: impl Into<String>, reason: impl Into<String>) -> DeployError {
    DeployError::ConfigWriteFailed {
        path: path.into(),
        reason: reason.into(),
    }
}

/// Creates an overlapping staging/target roots error
pub fn overlapping_roots(staging: &Path, target: &Path) -> DeployError {
    DeployError::OverlappingRoots {
        staging: staging.display().to_string(),
        target: target.display().to_string(),
    }
}

/// Creates an invalid settings error
pub fn invalid_settings(message: impl Into<String>) -> DeployError {
    DeployError::SettingsInvalid {
        message: message.into(),
    }
}
