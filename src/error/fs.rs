//! File system errors

use std::path::Path;

use super::DeployError;

/// Creates a copy failed error
pub fn copy_failed(from: &Path, to: &Path, reason: impl Into<String>) -> DeployError {
    DeployError::CopyFailed {
        from: from.display().to_string(),
        to: to.display().to_string(),
        reason: reason.into(),
    }
}

/// Creates a runtime home not found error
pub fn runtime_home_not_found(path: &Path) -> DeployError {
    DeployError::RuntimeHomeNotFound {
        path: path.display().to_string(),
    }
}

/// Creates a directory creation failed error
pub fn create_dir_failed(path: &Path, err: &std::io::Error) -> DeployError {
    DeployError::CreateDirFailed {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

/// Creates a file read failed error
pub fn read_failed(path: &Path, err: &std::io::Error) -> DeployError {
    DeployError::FileReadFailed {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

/// Creates a file write failed error
pub fn write_failed(path: &Path, err: &std::io::Error) -> DeployError {
    DeployError::FileWriteFailed {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}
