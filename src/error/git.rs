//! Post-deployment commit errors

use super::DeployError;

/// Creates a git operation failed error
pub fn failed(operation: &str, err: &git2::Error) -> DeployError {
    DeployError::GitFailed {
        operation: operation.to_string(),
        reason: err.message().to_string(),
    }
}
