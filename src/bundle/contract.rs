//! The fixed layout every deployable bundle must follow

use std::path::{Path, PathBuf};

/// Bundle configuration file carrying the version field
pub const CONFIG_FILE: &str = "default/app.conf";

/// Permissions/metadata file; existence-checked only
pub const METADATA_FILE: &str = "metadata/default.meta";

/// Directories a bundle may carry; their absence never fails validation
pub const OPTIONAL_DIRS: &[&str] = &["bin", "appserver", "static", "lookups", "local", "README"];

/// Sections searched for the version key, in priority order
pub const VERSION_SECTIONS: &[&str] = &["launcher", "install"];

/// Key holding the bundle version
pub const VERSION_KEY: &str = "version";

/// A path that must exist inside every bundle
#[derive(Debug, Clone, Copy)]
pub struct RequiredPath {
    pub relative: &'static str,
    pub label: &'static str,
}

/// Required paths, checked in this order
pub const REQUIRED_PATHS: &[RequiredPath] = &[
    RequiredPath {
        relative: CONFIG_FILE,
        label: "configuration file",
    },
    RequiredPath {
        relative: METADATA_FILE,
        label: "metadata file",
    },
];

/// Absolute path of the configuration file inside a bundle
pub fn config_path(bundle_root: &Path) -> PathBuf {
    bundle_root.join(CONFIG_FILE)
}

/// One reason per required path that is not a regular file under `bundle_root`
pub fn missing_required(bundle_root: &Path) -> Vec<String> {
    REQUIRED_PATHS
        .iter()
        .filter(|req| !bundle_root.join(req.relative).is_file())
        .map(|req| format!("missing {} {}", req.label, req.relative))
        .collect()
}

/// Optional directories present under `bundle_root`
pub fn present_optional(bundle_root: &Path) -> Vec<&'static str> {
    OPTIONAL_DIRS
        .iter()
        .copied()
        .filter(|dir| bundle_root.join(dir).exists())
        .collect()
}
