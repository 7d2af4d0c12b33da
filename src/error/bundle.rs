//! Bundle-related errors

use super::DeployError;

/// Creates an invalid bundle name error
pub fn invalid_name(name: impl Into<String>) -> DeployError {
    DeployError::InvalidBundleName { name: name.into() }
}

/// Creates a bundle not found error
pub fn not_found(name: impl Into<String>) -> DeployError {
    DeployError::BundleNotFound { name: name.into() }
}

/// Creates a bundle validation failed error from individual reasons
pub fn validation_failed(name: impl Into<String>, reasons: &[String]) -> DeployError {
    DeployError::BundleValidationFailed {
        name: name.into(),
        reasons: reasons.join("; "),
    }
}

/// Creates a staging directory not found error
pub fn staging_not_found(path: impl Into<String>) -> DeployError {
    DeployError::StagingNotFound { path: path.into() }
}
