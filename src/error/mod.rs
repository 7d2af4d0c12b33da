//! Error types and handling for appdeploy
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//!
//! This module is organized into sub-modules by error domain:
//! - [`bundle`]: Discovery, naming and structure validation errors
//! - [`config`]: Bundle configuration and settings errors
//! - [`backup`]: Backup archive errors
//! - [`fs`]: Copy and file system errors
//! - [`restart`]: Runtime restart and prompt errors
//! - [`git`]: Post-deployment commit errors
//!
//! Every error maps onto one [`FailureKind`], which is what a
//! deployment record reports when a bundle stops early.

pub mod backup;
pub mod bundle;
pub mod config;
pub mod fs;
pub mod git;
pub mod restart;


use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

/// Failure taxonomy used by deployment records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Bundle excluded or rejected by structure validation
    Validation,
    /// Version read/write failure
    Config,
    /// Backup could not be taken; overwrite did not happen
    Backup,
    /// Copy or other file system failure
    Io,
    /// Copy finished but the deployed tree did not verify
    Verification,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FailureKind::Validation => "validation",
            FailureKind::Config => "config",
            FailureKind::Backup => "backup",
            FailureKind::Io => "io",
            FailureKind::Verification => "verification",
        };
        f.write_str(label)
    }
}

/// Main error type for appdeploy operations
#[derive(Error, Diagnostic, Debug)]
pub enum DeployError {
    // Bundle errors
    #[error("Invalid bundle name: '{name}'")]
    #[diagnostic(
        code(appdeploy::bundle::invalid_name),
        help("Bundle names may only contain letters, digits, '_', '-' and '.', and must not start with '.'")
    )]
    InvalidBundleName { name: String },

    #[error("Bundle '{name}' not found in staging directory")]
    #[diagnostic(
        code(appdeploy::bundle::not_found),
        help("Run 'appdeploy list' to see the bundles available for deployment")
    )]
    BundleNotFound { name: String },

    #[error("Bundle '{name}' failed validation: {reasons}")]
    #[diagnostic(code(appdeploy::bundle::validation_failed))]
    BundleValidationFailed { name: String, reasons: String },

    #[error("No bundles selected for deployment")]
    #[diagnostic(
        code(appdeploy::bundle::none_selected),
        help("Pass --select NAME or --all, or run interactively")
    )]
    NoBundlesSelected,

    #[error("Staging directory not found: {path}")]
    #[diagnostic(
        code(appdeploy::bundle::staging_not_found),
        help("Pass --staging or set staging_dir in appdeploy.yaml")
    )]
    StagingNotFound { path: String },

    // Configuration errors
    #[error("Configuration file not found: {path}")]
    #[diagnostic(code(appdeploy::config::not_found))]
    ConfigNotFound { path: String },

    #[error("Failed to parse configuration file: {path}: {reason}")]
    #[diagnostic(code(appdeploy::config::parse_failed))]
    ConfigParseFailed { path: String, reason: String },

    #[error("No version field in [launcher] or [install] of {path}")]
    #[diagnostic(
        code(appdeploy::config::version_missing),
        help("Add 'version = X.Y.Z' to the [launcher] section")
    )]
    VersionFieldMissing { path: String },

    #[error("Invalid version: {reason}")]
    #[diagnostic(code(appdeploy::config::invalid_version))]
    InvalidVersion { reason: String },

    #[error("Failed to write configuration file: {path}: {reason}")]
    #[diagnostic(code(appdeploy::config::write_failed))]
    ConfigWriteFailed { path: String, reason: String },

    #[error("Staging directory {staging} and target directory {target} overlap")]
    #[diagnostic(
        code(appdeploy::config::overlapping_roots),
        help("Deploying would delete staged bundles; point --staging and --target at separate trees")
    )]
    OverlappingRoots { staging: String, target: String },

    #[error("Invalid settings: {message}")]
    #[diagnostic(code(appdeploy::config::invalid_settings))]
    SettingsInvalid { message: String },

    // Backup errors
    #[error("Cannot back up {path}: target does not exist")]
    #[diagnostic(code(appdeploy::backup::source_missing))]
    BackupSourceMissing { path: String },

    #[error("Cannot back up {path}: target is not a directory")]
    #[diagnostic(
        code(appdeploy::backup::not_a_directory),
        help("Move the file out of the way; it will not be overwritten without a backup")
    )]
    BackupSourceNotDirectory { path: String },

    #[error("Backup archive already exists: {path}")]
    #[diagnostic(
        code(appdeploy::backup::collision),
        help("Another backup of this bundle was taken in the same second; retry shortly")
    )]
    BackupCollision { path: String },

    #[error("Failed to create backup {path}: {reason}")]
    #[diagnostic(code(appdeploy::backup::failed))]
    BackupFailed { path: String, reason: String },

    #[error("Not a backup archive name: {name}")]
    #[diagnostic(
        code(appdeploy::backup::invalid_name),
        help("Backup archives are named <bundle>_<YYYYMMDD_HHMMSS>.zip")
    )]
    InvalidBackupName { name: String },

    #[error("Failed to restore {archive}: {reason}")]
    #[diagnostic(code(appdeploy::backup::restore_failed))]
    RestoreFailed { archive: String, reason: String },

    // File system errors
    #[error("Failed to copy {from} to {to}: {reason}")]
    #[diagnostic(code(appdeploy::fs::copy_failed))]
    CopyFailed {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Target directory not found: {path}")]
    #[diagnostic(
        code(appdeploy::fs::target_not_found),
        help("Pass --target or --runtime-home pointing at an existing installation")
    )]
    TargetRootNotFound { path: String },

    #[error("Runtime home not found: {path}")]
    #[diagnostic(
        code(appdeploy::fs::runtime_home_not_found),
        help("Pass --runtime-home pointing at an existing installation")
    )]
    RuntimeHomeNotFound { path: String },

    #[error("Failed to create directory: {path}: {reason}")]
    #[diagnostic(code(appdeploy::fs::create_dir_failed))]
    CreateDirFailed { path: String, reason: String },

    #[error("Failed to read file: {path}: {reason}")]
    #[diagnostic(code(appdeploy::fs::read_failed))]
    FileReadFailed { path: String, reason: String },

    #[error("Failed to write file: {path}: {reason}")]
    #[diagnostic(code(appdeploy::fs::write_failed))]
    FileWriteFailed { path: String, reason: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(appdeploy::fs::io_error))]
    IoError { message: String },

    // Verification errors
    #[error("Deployed bundle at {path} failed verification: {reasons}")]
    #[diagnostic(
        code(appdeploy::verify::failed),
        help("Restore the backup taken before this deployment")
    )]
    VerificationFailed { path: String, reasons: String },

    // Restart and prompt errors
    #[error("Runtime executable not found: {path}")]
    #[diagnostic(code(appdeploy::restart::executable_not_found))]
    RuntimeExecutableNotFound { path: String },

    #[error("Runtime restart failed: {reason}")]
    #[diagnostic(code(appdeploy::restart::failed))]
    RestartFailed { reason: String },

    #[error("Runtime restart timed out after {secs}s")]
    #[diagnostic(
        code(appdeploy::restart::timed_out),
        help("Check the runtime's own logs; the restart may still be in progress")
    )]
    RestartTimedOut { secs: u64 },

    // Version control errors
    #[error("Git {operation} failed: {reason}")]
    #[diagnostic(
        code(appdeploy::git::failed),
        help("The deployment itself completed; commit the staging changes by hand")
    )]
    GitFailed { operation: String, reason: String },

    #[error("Prompt failed: {message}")]
    #[diagnostic(code(appdeploy::prompt::failed))]
    PromptFailed { message: String },
}

impl DeployError {
    /// Classify this error for a deployment record
    pub fn kind(&self) -> FailureKind {
        match self {
            DeployError::InvalidBundleName { .. }
            | DeployError::BundleNotFound { .. }
            | DeployError::BundleValidationFailed { .. }
            | DeployError::NoBundlesSelected
            | DeployError::StagingNotFound { .. } => FailureKind::Validation,

            DeployError::ConfigNotFound { .. }
            | DeployError::ConfigParseFailed { .. }
            | DeployError::VersionFieldMissing { .. }
            | DeployError::InvalidVersion { .. }
            | DeployError::ConfigWriteFailed { .. }
            | DeployError::SettingsInvalid { .. }
            | DeployError::OverlappingRoots { .. }
            | DeployError::PromptFailed { .. } => FailureKind::Config,

            DeployError::BackupSourceMissing { .. }
            | DeployError::BackupSourceNotDirectory { .. }
            | DeployError::BackupCollision { .. }
            | DeployError::BackupFailed { .. }
            | DeployError::InvalidBackupName { .. }
            | DeployError::RestoreFailed { .. } => FailureKind::Backup,

            DeployError::VerificationFailed { .. } => FailureKind::Verification,

            DeployError::CopyFailed { .. }
            | DeployError::TargetRootNotFound { .. }
            | DeployError::RuntimeHomeNotFound { .. }
            | DeployError::CreateDirFailed { .. }
            | DeployError::GitFailed { .. }
            | DeployError::FileReadFailed { .. }
            | DeployError::FileWriteFailed { .. }
            | DeployError::IoError { .. }
            | DeployError::RuntimeExecutableNotFound { .. }
            | DeployError::RestartFailed { .. }
            | DeployError::RestartTimedOut { .. } => FailureKind::Io,
        }
    }
}

impl From<std::io::Error> for DeployError {
    fn from(err: std::io::Error) -> Self {
        DeployError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<walkdir::Error> for DeployError {
    fn from(err: walkdir::Error) -> Self {
        DeployError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for DeployError {
    fn from(err: serde_yaml::Error) -> Self {
        DeployError::ConfigParseFailed {
            path: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for DeployError {
    fn from(err: serde_json::Error) -> Self {
        DeployError::IoError {
            message: format!("JSON serialization failed: {err}"),
        }
    }
}

impl From<inquire::InquireError> for DeployError {
    fn from(err: inquire::InquireError) -> Self {
        DeployError::PromptFailed {
            message: err.to_string(),
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, DeployError>;
