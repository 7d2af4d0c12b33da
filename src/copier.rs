//! Replacing a deployed bundle with its staged copy
//!
//! The copier owns three steps of a deployment: the copy itself, applying the
//! platform permission plan, and verifying the result against the staged tree.

use std::fs;
use std::path::Path;

use serde::Serialize;
use walkdir::WalkDir;
use wax::{CandidatePath, Glob, Pattern};

use crate::error::{self, Result};
use crate::hash;
use crate::platform::PermissionPlan;
use crate::validator::BundleValidator;

/// Glob patterns for entries left out of copies and digests
///
/// Nothing is excluded by default. A pattern matches when it matches either
/// the path relative to the bundle root or the entry's file name, so `.git`
/// skips every `.git` directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyOptions {
    pub exclude: Vec<String>,
}

impl CopyOptions {
    pub fn new(exclude: Vec<String>) -> Self {
        Self { exclude }
    }

    /// Whether a path relative to the bundle root is excluded
    pub fn is_excluded(&self, relative: &str) -> bool {
        let relative = relative.replace('\\', "/");
        let file_name = relative.rsplit('/').next().unwrap_or(relative.as_str());

        self.exclude.iter().any(|pattern| {
            if let Ok(glob) = Glob::new(pattern) {
                glob.matched(&CandidatePath::from(relative.as_str())).is_some()
                    || glob.matched(&CandidatePath::from(file_name)).is_some()
            } else {
                pattern == &relative || pattern == file_name
            }
        })
    }

    /// Whether `path`, somewhere under `root`, is excluded
    ///
    /// The root itself is never excluded.
    pub fn is_excluded_under(&self, root: &Path, path: &Path) -> bool {
        match path.strip_prefix(root) {
            Ok(rel) if rel.as_os_str().is_empty() => false,
            Ok(rel) => self.is_excluded(&rel.to_string_lossy()),
            Err(_) => false,
        }
    }
}

/// Result of checking a deployed tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub ok: bool,
    pub reasons: Vec<String>,
}

/// Copies bundles into the target root and checks the result
#[derive(Debug, Clone, Default)]
pub struct BundleCopier {
    options: CopyOptions,
}

impl BundleCopier {
    pub fn new(options: CopyOptions) -> Self {
        Self { options }
    }

    /// Replace `target` with a copy of `source`
    ///
    /// Whatever sits at `target` is removed first, whether a directory or a
    /// stray file. Excluded entries are not copied.
    pub fn copy(&self, source: &Path, target: &Path) -> Result<()> {
        if !source.is_dir() {
            return Err(error::fs::copy_failed(
                source,
                target,
                "source is not a directory",
            ));
        }

        remove_existing(target)
            .map_err(|e| error::fs::copy_failed(source, target, format!("cannot clear target: {e}")))?;

        fs::create_dir_all(target)
            .map_err(|e| error::fs::copy_failed(source, target, e.to_string()))?;

        let walker = WalkDir::new(source)
            .min_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| !self.options.is_excluded_under(source, e.path()));

        for entry in walker {
            let entry = entry.map_err(|e| error::fs::copy_failed(source, target, e.to_string()))?;
            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|e| error::fs::copy_failed(source, target, e.to_string()))?;
            let dest = target.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest)
                    .map_err(|e| error::fs::copy_failed(entry.path(), &dest, e.to_string()))?;
            } else {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)
                        .map_err(|e| error::fs::copy_failed(entry.path(), &dest, e.to_string()))?;
                }
                fs::copy(entry.path(), &dest)
                    .map_err(|e| error::fs::copy_failed(entry.path(), &dest, e.to_string()))?;
            }
        }

        tracing::debug!(from = %source.display(), to = %target.display(), "bundle copied");
        Ok(())
    }

    /// Apply `plan` to every entry under `target`
    ///
    /// Failures do not abort the deployment; each one comes back as a warning.
    pub fn apply_permissions(&self, target: &Path, plan: &PermissionPlan) -> Vec<String> {
        match plan {
            PermissionPlan::Skip => Vec::new(),
            PermissionPlan::Unix { dir_mode, .. } => apply_unix_modes(target, *dir_mode, plan),
        }
    }

    /// Digest of a tree under this copier's exclusions
    pub fn digest(&self, root: &Path) -> Result<String> {
        hash::hash_tree(root, &self.options)
    }

    /// Check a deployed tree for required paths and, when given, the staged digest
    pub fn verify(&self, target: &Path, expected_digest: Option<&str>) -> Result<Verification> {
        if !target.is_dir() {
            return Ok(Verification {
                ok: false,
                reasons: vec!["deployed directory does not exist".to_string()],
            });
        }

        let mut reasons = BundleValidator::new().check_required_paths(target);

        if let Some(expected) = expected_digest {
            let actual = self.digest(target)?;
            if actual != expected {
                reasons.push(format!(
                    "content digest mismatch (expected {expected}, found {actual})"
                ));
            }
        }

        Ok(Verification {
            ok: reasons.is_empty(),
            reasons,
        })
    }
}

fn remove_existing(target: &Path) -> std::io::Result<()> {
    match fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(target),
        Ok(_) => fs::remove_file(target),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn apply_unix_modes(target: &Path, dir_mode: u32, plan: &PermissionPlan) -> Vec<String> {
    use std::os::unix::fs::PermissionsExt;

    let mut warnings = Vec::new();
    for entry in WalkDir::new(target) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warnings.push(format!("cannot read {}: {e}", target.display()));
                continue;
            }
        };

        let mode = if entry.file_type().is_dir() {
            Some(dir_mode)
        } else if entry.file_type().is_file() {
            plan.file_mode_for(entry.path())
        } else {
            None
        };

        if let Some(mode) = mode {
            if let Err(e) = fs::set_permissions(entry.path(), fs::Permissions::from_mode(mode)) {
                warnings.push(format!(
                    "cannot set mode {mode:o} on {}: {e}",
                    entry.path().display()
                ));
            }
        }
    }
    warnings
}

#[cfg(not(unix))]
fn apply_unix_modes(target: &Path, _dir_mode: u32, _plan: &PermissionPlan) -> Vec<String> {
    vec![format!(
        "unix permissions not supported here; left {} unchanged",
        target.display()
    )]
}
