//! Bundles and their discovery in a staging directory
//!
//! A bundle is an immediate subdirectory of the staging root. Its name is the
//! directory basename and doubles as the name of the deployed directory, so it
//! is checked before it is ever joined onto a path.

pub mod contract;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{self, Result};

/// A deployable unit found in the staging directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bundle {
    /// Directory basename, also the deployed directory name
    pub name: String,
    /// Absolute path inside the staging directory
    pub source_path: PathBuf,
    /// Version read from the bundle configuration, once validated
    pub declared_version: Option<String>,
}

impl Bundle {
    pub fn new(name: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source_path: source_path.into(),
            declared_version: None,
        }
    }

    /// Path of this bundle under a target root
    pub fn target_path(&self, target_root: &Path) -> PathBuf {
        target_root.join(&self.name)
    }
}

/// A staging entry that cannot be deployed, with every reason found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcludedBundle {
    pub name: String,
    pub path: PathBuf,
    pub reasons: Vec<String>,
}

/// Check a bundle name without touching the file system
///
/// Accepts ASCII letters, digits, `_`, `-` and `.`; rejects empty names,
/// names starting with `.` (which covers `.` and `..`), and anything
/// containing `..` or a path separator.
pub fn validate_name(name: &str) -> Result<()> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.');

    if name.is_empty()
        || name.starts_with('.')
        || name.contains("..")
        || !name.chars().all(allowed)
    {
        return Err(error::bundle::invalid_name(name));
    }
    Ok(())
}

/// Staging entries split into candidates and entries rejected before validation
#[derive(Debug, Default)]
pub struct StagingScan {
    pub candidates: Vec<Bundle>,
    pub rejected: Vec<ExcludedBundle>,
}

/// List the immediate subdirectories of `staging_root`, sorted by name
///
/// Hidden entries and plain files are skipped. Symlinked directories that
/// resolve outside the staging root are rejected.
pub fn scan_staging(staging_root: &Path) -> Result<StagingScan> {
    if !staging_root.is_dir() {
        return Err(error::bundle::staging_not_found(
            staging_root.display().to_string(),
        ));
    }

    let root = dunce::canonicalize(staging_root)
        .map_err(|e| error::fs::read_failed(staging_root, &e))?;

    let mut entries: Vec<_> = fs::read_dir(&root)
        .map_err(|e| error::fs::read_failed(&root, &e))?
        .filter_map(std::result::Result::ok)
        .collect();
    entries.sort_by_key(fs::DirEntry::file_name);

    let mut scan = StagingScan::default();
    for entry in entries {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        if name.starts_with('.') || !path.is_dir() {
            continue;
        }

        if validate_name(&name).is_err() {
            scan.rejected.push(ExcludedBundle {
                reasons: vec![format!("invalid bundle name '{name}'")],
                name,
                path,
            });
            continue;
        }

        let is_link = entry.file_type().map(|t| t.is_symlink()).unwrap_or(false);
        if is_link && !resolves_within(&path, &root) {
            scan.rejected.push(ExcludedBundle {
                name,
                reasons: vec!["resolves outside the staging directory".to_string()],
                path,
            });
            continue;
        }

        scan.candidates.push(Bundle::new(name, path));
    }

    Ok(scan)
}

fn resolves_within(path: &Path, root: &Path) -> bool {
    dunce::canonicalize(path).is_ok_and(|resolved| resolved.starts_with(root))
}
