//! Reading and rewriting the version field of a bundle configuration
//!
//! The version lives in `[launcher] version`, falling back to
//! `[install] version`. Rewriting replaces only the value bytes of that entry;
//! every other line, comment and section is written back untouched.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::bundle::contract::{VERSION_KEY, VERSION_SECTIONS};
use crate::conf::ConfDocument;
use crate::error::{self, DeployError, Result};

/// Version declared in a parsed configuration, with surrounding quotes removed
pub fn lookup_version(doc: &ConfDocument) -> Option<String> {
    VERSION_SECTIONS
        .iter()
        .filter_map(|section| doc.get(section, VERSION_KEY))
        .map(|raw| unquote(raw).trim().to_string())
        .find(|v| !v.is_empty())
}

/// `MAJOR.MINOR.PATCH` with every part numeric
pub fn is_semver_like(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

fn unquote(raw: &str) -> &str {
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw)
}

fn invalid_version(reason: &str) -> DeployError {
    DeployError::InvalidVersion {
        reason: reason.to_string(),
    }
}

/// Reject versions that `lookup_version` would not read back unchanged
fn check_writable(version: &str) -> Result<()> {
    if version.trim().is_empty() {
        return Err(invalid_version("version must not be empty"));
    }
    if version.trim() != version {
        return Err(invalid_version("version must not start or end with whitespace"));
    }
    if version.contains(['\n', '\r']) {
        return Err(invalid_version("version must be a single line"));
    }
    if version.contains('"') {
        return Err(invalid_version("version must not contain quotes"));
    }
    if version.ends_with('\\') {
        return Err(invalid_version("version must not end with a backslash"));
    }
    Ok(())
}

fn is_quoted(raw: &str) -> bool {
    raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"')
}

/// Reads and rewrites the version field of `default/app.conf`
#[derive(Debug, Default, Clone, Copy)]
pub struct VersionEditor;

impl VersionEditor {
    pub fn new() -> Self {
        Self
    }

    fn load(conf_path: &Path) -> Result<(String, ConfDocument)> {
        let text = fs::read_to_string(conf_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                error::config::not_found(conf_path.display().to_string())
            } else {
                DeployError::ConfigParseFailed {
                    path: conf_path.display().to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let doc = ConfDocument::parse(&text).map_err(|e| {
            error::config::parse_failed(conf_path.display().to_string(), e.to_string())
        })?;

        Ok((text, doc))
    }

    /// Read the declared version
    pub fn read_version(&self, conf_path: &Path) -> Result<String> {
        let (_, doc) = Self::load(conf_path)?;
        lookup_version(&doc)
            .ok_or_else(|| error::config::version_missing(conf_path.display().to_string()))
    }

    /// Replace the declared version with `new_version`
    ///
    /// The value is written verbatim, so reading it back yields exactly
    /// `new_version`. Values that would read back differently (surrounding
    /// whitespace, quotes, a trailing line continuation) are rejected.
    /// Versions that are not `MAJOR.MINOR.PATCH` only produce a warning.
    pub fn write_version(&self, conf_path: &Path, new_version: &str) -> Result<()> {
        check_writable(new_version)?;

        if !is_semver_like(new_version) {
            tracing::warn!(
                version = new_version,
                "version is not in MAJOR.MINOR.PATCH form"
            );
        }

        let (original, mut doc) = Self::load(conf_path)?;

        let section = VERSION_SECTIONS
            .iter()
            .find(|section| doc.get(section, VERSION_KEY).is_some())
            .ok_or_else(|| error::config::version_missing(conf_path.display().to_string()))?;

        let current_raw = doc.get(section, VERSION_KEY).unwrap_or_default();
        let value = if is_quoted(current_raw) {
            format!("\"{new_version}\"")
        } else {
            new_version.to_string()
        };

        doc.set(section, VERSION_KEY, &value);
        let rendered = doc.render();
        if rendered == original {
            tracing::debug!(path = %conf_path.display(), "version unchanged, nothing written");
            return Ok(());
        }

        Self::write_atomic(conf_path, rendered.as_bytes())?;
        tracing::info!(
            path = %conf_path.display(),
            section = *section,
            version = new_version,
            "version updated"
        );
        Ok(())
    }

    fn write_atomic(conf_path: &Path, content: &[u8]) -> Result<()> {
        let path_str = conf_path.display().to_string();
        let dir = conf_path
            .parent()
            .ok_or_else(|| error::config::write_failed(&path_str, "path has no parent directory"))?;

        let mut tmp = NamedTempFile::new_in(dir)
            .map_err(|e| error::config::write_failed(&path_str, e.to_string()))?;
        tmp.write_all(content)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| error::config::write_failed(&path_str, e.to_string()))?;

        if let Ok(meta) = fs::metadata(conf_path) {
            let _ = fs::set_permissions(tmp.path(), meta.permissions());
        }

        tmp.persist(conf_path)
            .map_err(|e| error::config::write_failed(&path_str, e.error.to_string()))?;
        Ok(())
    }
}
