//! Test fixtures for building staging and target trees.
//!
//! ```ignore
//! use crate::test_fixtures::{create_temp_dir, write_bundle};
//!
//! let staging = create_temp_dir();
//! let app = write_bundle(staging.path(), "appA", "1.0.0");
//! ```

#![allow(clippy::expect_used)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::bundle::contract::{CONFIG_FILE, METADATA_FILE};

/// Create a temp directory in the system temp location.
///
/// # Panics
///
/// Panics if the temp directory cannot be created.
#[must_use]
pub fn create_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Configuration text carrying `version` in `[launcher]`, plus unrelated settings.
#[must_use]
pub fn app_conf(version: &str) -> String {
    format!(
        "# managed by release tooling\n\
         [install]\n\
         is_configured = 0\n\
         build = 7\n\
         \n\
         [launcher]\n\
         author = Ops\n\
         version = {version}\n\
         description = Demo bundle\n\
         \n\
         [ui]\n\
         is_visible = 1\n\
         label = Demo\n"
    )
}

/// Write a complete, valid bundle under `root` and return its path.
///
/// # Panics
///
/// Panics if any file cannot be written.
pub fn write_bundle(root: &Path, name: &str, version: &str) -> PathBuf {
    write_bundle_with_conf(root, name, &app_conf(version))
}

/// Write a bundle with a custom configuration file.
///
/// # Panics
///
/// Panics if any file cannot be written.
pub fn write_bundle_with_conf(root: &Path, name: &str, conf: &str) -> PathBuf {
    let bundle = root.join(name);
    write_file(&bundle.join(CONFIG_FILE), conf);
    write_file(&bundle.join(METADATA_FILE), "[]\naccess = read : [ * ]\n");
    write_file(&bundle.join("bin/setup.sh"), "#!/bin/sh\necho setup\n");
    write_file(&bundle.join("static/readme.txt"), "static asset\n");
    fs::create_dir_all(bundle.join("lookups")).expect("Failed to create lookups dir");
    bundle
}

/// Write a file, creating parent directories.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    fs::write(path, content).expect("Failed to write file");
}

/// Snapshot of a tree: sorted relative paths with file contents (`None` for dirs).
///
/// # Panics
///
/// Panics if the tree cannot be read.
#[must_use]
pub fn snapshot_tree(root: &Path) -> Vec<(String, Option<Vec<u8>>)> {
    let mut entries: Vec<_> = walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|e| e.expect("Failed to walk tree"))
        .map(|e| {
            let rel = e
                .path()
                .strip_prefix(root)
                .expect("entry under root")
                .to_string_lossy()
                .replace('\\', "/");
            let content = if e.file_type().is_file() {
                Some(fs::read(e.path()).expect("Failed to read file"))
            } else {
                None
            };
            (rel, content)
        })
        .collect();
    entries.sort();
    entries
}
