//! Structure validation for candidate bundles
//!
//! Validation is read-only: it never writes, spawns processes or touches
//! anything outside the bundle directory. Every failed requirement produces
//! its own reason string.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::bundle::{self, contract};
use crate::conf::ConfDocument;
use crate::version;

/// Outcome of validating one bundle directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub ok: bool,
    pub version: Option<String>,
    pub reasons: Vec<String>,
}

impl ValidationResult {
    fn rejected(reason: String) -> Self {
        Self {
            ok: false,
            version: None,
            reasons: vec![reason],
        }
    }
}

/// Checks bundles against the required structure contract
#[derive(Debug, Default, Clone, Copy)]
pub struct BundleValidator;

impl BundleValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate the bundle at `path`
    pub fn validate(&self, path: &Path) -> ValidationResult {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if bundle::validate_name(&name).is_err() {
            return ValidationResult::rejected(format!("invalid bundle name '{name}'"));
        }

        if !path.is_dir() {
            return ValidationResult::rejected("bundle directory does not exist".to_string());
        }

        match fs::read_dir(path) {
            Ok(mut entries) => {
                if entries.next().is_none() {
                    return ValidationResult::rejected("bundle is empty".to_string());
                }
            }
            Err(e) => {
                return ValidationResult::rejected(format!("bundle cannot be read: {e}"));
            }
        }

        let mut reasons = self.check_required_paths(path);
        let mut declared = None;

        let conf_path = contract::config_path(path);
        if conf_path.is_file() {
            match Self::read_declared_version(&conf_path) {
                Ok(v) => declared = Some(v),
                Err(reason) => reasons.push(reason),
            }
        }

        tracing::debug!(
            bundle = %name,
            optional = ?contract::present_optional(path),
            missing = reasons.len(),
            "bundle validated"
        );

        ValidationResult {
            ok: reasons.is_empty(),
            version: declared,
            reasons,
        }
    }

    /// Reasons for every required path missing under `path`
    pub fn check_required_paths(&self, path: &Path) -> Vec<String> {
        contract::missing_required(path)
    }

    fn read_declared_version(conf_path: &Path) -> Result<String, String> {
        let text = fs::read_to_string(conf_path).map_err(|e| {
            format!(
                "configuration file {} could not be read: {e}",
                contract::CONFIG_FILE
            )
        })?;

        let doc = ConfDocument::parse(&text).map_err(|e| {
            format!(
                "configuration file {} could not be parsed: {e}",
                contract::CONFIG_FILE
            )
        })?;

        version::lookup_version(&doc).ok_or_else(|| {
            format!(
                "configuration file {} has no version in [launcher] or [install]",
                contract::CONFIG_FILE
            )
        })
    }
}
