//! Layered settings
//!
//! Every setting is resolved from, lowest precedence first: built-in defaults
//! (partly platform dependent), a YAML settings file, `APPDEPLOY_*`
//! environment variables and command-line flags. The last two arrive together
//! as [`Overrides`] because clap reads both.
//!
//! The settings file is the first of:
//! 1. the path given with `--config`
//! 2. `./appdeploy.yaml`
//! 3. `<config dir>/appdeploy/config.yaml`
//!
//! Relative paths inside a settings file are relative to the file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use normpath::PathExt;
use serde::{Deserialize, Serialize};

use crate::copier::CopyOptions;
use crate::error::{self, Result};
use crate::platform::Platform;
use crate::restart::{DEFAULT_RESTART_TIMEOUT, RestartPolicy};

/// Settings file name looked up in the working directory
pub const LOCAL_SETTINGS_FILE: &str = "appdeploy.yaml";

const DEFAULT_STAGING_DIR: &str = "apps";
const DEFAULT_BACKUP_DIR: &str = "backups";
const DEFAULT_LOG_DIR: &str = "logs";

/// Contents of a settings file; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSettings {
    pub staging_dir: Option<PathBuf>,
    pub runtime_home: Option<PathBuf>,
    pub target_dir: Option<PathBuf>,
    pub backup_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub restart: Option<RestartPolicy>,
    pub restart_timeout_secs: Option<u64>,
    pub exclude: Option<Vec<String>>,
}

impl FileSettings {
    /// Parse a settings file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| error::fs::read_failed(path, &e))?;
        let mut settings: FileSettings = serde_yaml::from_str(&content).map_err(|e| {
            error::config::parse_failed(path.display().to_string(), e.to_string())
        })?;

        if let Some(base) = path.parent() {
            settings.rebase(base);
        }
        Ok(settings)
    }

    fn rebase(&mut self, base: &Path) {
        for field in [
            &mut self.staging_dir,
            &mut self.runtime_home,
            &mut self.target_dir,
            &mut self.backup_dir,
            &mut self.log_dir,
        ] {
            if let Some(path) = field.as_mut() {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
    }
}

/// Values from flags and environment variables
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub staging_dir: Option<PathBuf>,
    pub runtime_home: Option<PathBuf>,
    pub target_dir: Option<PathBuf>,
    pub backup_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub restart: Option<RestartPolicy>,
    pub restart_timeout_secs: Option<u64>,
    pub exclude: Option<Vec<String>>,
}

/// Fully resolved settings for one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub staging_dir: PathBuf,
    pub runtime_home: PathBuf,
    pub target_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub log_dir: PathBuf,
    pub restart: RestartPolicy,
    pub restart_timeout: Duration,
    pub exclude: Vec<String>,
    /// Settings file that contributed, if any
    pub source: Option<PathBuf>,
    /// Neither the runtime home nor the target came from a file, flag or variable
    #[serde(skip)]
    pub locations_defaulted: bool,
}

impl Settings {
    /// Find and read the settings file, then apply `overrides`
    pub fn load(explicit: Option<&Path>, overrides: &Overrides, platform: &Platform) -> Result<Self> {
        let source = locate_settings_file(explicit)?;
        let file = match &source {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading settings file");
                FileSettings::load(path)?
            }
            None => FileSettings::default(),
        };

        let mut settings = Self::resolve(file, overrides, platform)?;
        settings.source = source;
        Ok(settings)
    }

    /// Merge layers without touching the file system
    pub fn resolve(file: FileSettings, overrides: &Overrides, platform: &Platform) -> Result<Self> {
        let locations_defaulted = overrides.runtime_home.is_none()
            && overrides.target_dir.is_none()
            && file.runtime_home.is_none()
            && file.target_dir.is_none();

        let runtime_home = overrides
            .runtime_home
            .clone()
            .or(file.runtime_home)
            .unwrap_or_else(|| platform.default_runtime_home.clone());

        let target_dir = overrides
            .target_dir
            .clone()
            .or(file.target_dir)
            .unwrap_or_else(|| platform.default_target_root(&runtime_home));

        let restart_timeout_secs = overrides
            .restart_timeout_secs
            .or(file.restart_timeout_secs)
            .unwrap_or(DEFAULT_RESTART_TIMEOUT.as_secs());
        if restart_timeout_secs == 0 {
            return Err(error::config::invalid_settings(
                "restart_timeout_secs must be greater than zero",
            ));
        }

        Ok(Self {
            staging_dir: overrides
                .staging_dir
                .clone()
                .or(file.staging_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STAGING_DIR)),
            runtime_home,
            target_dir,
            backup_dir: overrides
                .backup_dir
                .clone()
                .or(file.backup_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_DIR)),
            log_dir: overrides
                .log_dir
                .clone()
                .or(file.log_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            restart: overrides.restart.or(file.restart).unwrap_or_default(),
            restart_timeout: Duration::from_secs(restart_timeout_secs),
            exclude: overrides
                .exclude
                .clone()
                .or(file.exclude)
                .unwrap_or_default(),
            source: None,
            locations_defaulted,
        })
    }

    /// Switch to another runtime home; a target derived from the old home follows it
    pub fn use_runtime_home(&mut self, runtime_home: PathBuf, platform: &Platform) {
        if self.target_dir == platform.default_target_root(&self.runtime_home) {
            self.target_dir = platform.default_target_root(&runtime_home);
        }
        self.runtime_home = runtime_home;
    }

    /// Create the target directory when it is the runtime home's own apps
    /// directory and only that directory is missing
    ///
    /// Returns whether a directory was created. An explicit target that does
    /// not exist is left alone for the target root check to report.
    pub fn ensure_target_root(&self, platform: &Platform) -> Result<bool> {
        if self.target_dir.is_dir() || self.target_dir != platform.default_target_root(&self.runtime_home) {
            return Ok(false);
        }
        if !self.runtime_home.is_dir() {
            return Err(error::fs::runtime_home_not_found(&self.runtime_home));
        }
        fs::create_dir_all(&self.target_dir)
            .map_err(|e| error::fs::create_dir_failed(&self.target_dir, &e))?;
        tracing::info!(path = %self.target_dir.display(), "created target directory");
        Ok(true)
    }

    pub fn copy_options(&self) -> CopyOptions {
        CopyOptions::new(self.exclude.clone())
    }
}

/// Settings file to use, if any
///
/// An explicit path must exist; the implicit locations are optional.
pub fn locate_settings_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(error::config::not_found(path.display().to_string()));
    }

    let local = PathBuf::from(LOCAL_SETTINGS_FILE);
    if local.is_file() {
        return Ok(Some(local));
    }

    Ok(dirs::config_dir()
        .map(|dir| dir.join("appdeploy").join("config.yaml"))
        .filter(|path| path.is_file()))
}

/// Absolute, normalized form of `path` for display and logging
pub fn display_path(path: &Path) -> PathBuf {
    match path.normalize() {
        Ok(normalized) => normalized.into_path_buf(),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::OsKind;
    use crate::test_fixtures::{create_temp_dir, write_file};

    fn linux() -> Platform {
        Platform::for_os(OsKind::Linux)
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(FileSettings::default(), &Overrides::default(), &linux()).unwrap();
        assert_eq!(settings.staging_dir, PathBuf::from("apps"));
        assert_eq!(settings.runtime_home, PathBuf::from("/opt/splunk"));
        assert_eq!(settings.target_dir, PathBuf::from("/opt/splunk/etc/apps"));
        assert_eq!(settings.backup_dir, PathBuf::from("backups"));
        assert_eq!(settings.log_dir, PathBuf::from("logs"));
        assert_eq!(settings.restart, RestartPolicy::Ask);
        assert_eq!(settings.restart_timeout, Duration::from_secs(300));
        assert!(settings.exclude.is_empty());
    }

    #[test]
    fn test_target_follows_runtime_home() {
        let file = FileSettings {
            runtime_home: Some(PathBuf::from("/srv/rt")),
            ..FileSettings::default()
        };
        let settings = Settings::resolve(file, &Overrides::default(), &linux()).unwrap();
        assert_eq!(settings.target_dir, PathBuf::from("/srv/rt/etc/apps"));
    }

    #[test]
    fn test_locations_defaulted_only_without_any_source() {
        let settings = Settings::resolve(FileSettings::default(), &Overrides::default(), &linux()).unwrap();
        assert!(settings.locations_defaulted);

        let file = FileSettings {
            target_dir: Some(PathBuf::from("/srv/apps")),
            ..FileSettings::default()
        };
        let settings = Settings::resolve(file, &Overrides::default(), &linux()).unwrap();
        assert!(!settings.locations_defaulted);

        let overrides = Overrides {
            runtime_home: Some(PathBuf::from("/srv/rt")),
            ..Overrides::default()
        };
        let settings = Settings::resolve(FileSettings::default(), &overrides, &linux()).unwrap();
        assert!(!settings.locations_defaulted);
    }

    #[test]
    fn test_use_runtime_home_moves_derived_target_only() {
        let platform = linux();
        let mut settings = Settings::resolve(FileSettings::default(), &Overrides::default(), &platform).unwrap();
        settings.use_runtime_home(PathBuf::from("/srv/rt"), &platform);
        assert_eq!(settings.runtime_home, PathBuf::from("/srv/rt"));
        assert_eq!(settings.target_dir, PathBuf::from("/srv/rt/etc/apps"));

        let overrides = Overrides {
            target_dir: Some(PathBuf::from("/custom/apps")),
            ..Overrides::default()
        };
        let mut settings = Settings::resolve(FileSettings::default(), &overrides, &platform).unwrap();
        settings.use_runtime_home(PathBuf::from("/srv/rt"), &platform);
        assert_eq!(settings.target_dir, PathBuf::from("/custom/apps"));
    }

    #[test]
    fn test_ensure_target_root_creates_missing_apps_dir() {
        let temp = create_temp_dir();
        let platform = linux();
        let overrides = Overrides {
            runtime_home: Some(temp.path().to_path_buf()),
            ..Overrides::default()
        };
        let settings = Settings::resolve(FileSettings::default(), &overrides, &platform).unwrap();

        assert!(settings.ensure_target_root(&platform).unwrap());
        assert!(temp.path().join("etc/apps").is_dir());
        assert!(!settings.ensure_target_root(&platform).unwrap());
    }

    #[test]
    fn test_ensure_target_root_requires_runtime_home() {
        let temp = create_temp_dir();
        let platform = linux();
        let home = temp.path().join("missing");
        let overrides = Overrides {
            runtime_home: Some(home.clone()),
            ..Overrides::default()
        };
        let settings = Settings::resolve(FileSettings::default(), &overrides, &platform).unwrap();

        let err = settings.ensure_target_root(&platform).unwrap_err();
        assert!(matches!(err, crate::error::DeployError::RuntimeHomeNotFound { .. }));
        assert!(!home.exists());
    }

    #[test]
    fn test_ensure_target_root_leaves_explicit_target_alone() {
        let temp = create_temp_dir();
        let platform = linux();
        let overrides = Overrides {
            runtime_home: Some(temp.path().to_path_buf()),
            target_dir: Some(temp.path().join("elsewhere")),
            ..Overrides::default()
        };
        let settings = Settings::resolve(FileSettings::default(), &overrides, &platform).unwrap();

        assert!(!settings.ensure_target_root(&platform).unwrap());
        assert!(!temp.path().join("elsewhere").exists());
    }

    #[test]
    fn test_overrides_beat_file() {
        let file = FileSettings {
            staging_dir: Some(PathBuf::from("/from/file")),
            backup_dir: Some(PathBuf::from("/file/backups")),
            restart: Some(RestartPolicy::Always),
            ..FileSettings::default()
        };
        let overrides = Overrides {
            staging_dir: Some(PathBuf::from("/from/flag")),
            restart: Some(RestartPolicy::Never),
            ..Overrides::default()
        };
        let settings = Settings::resolve(file, &overrides, &linux()).unwrap();
        assert_eq!(settings.staging_dir, PathBuf::from("/from/flag"));
        assert_eq!(settings.backup_dir, PathBuf::from("/file/backups"));
        assert_eq!(settings.restart, RestartPolicy::Never);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let overrides = Overrides {
            restart_timeout_secs: Some(0),
            ..Overrides::default()
        };
        assert!(Settings::resolve(FileSettings::default(), &overrides, &linux()).is_err());
    }

    #[test]
    fn test_file_load_rebases_relative_paths() {
        let temp = create_temp_dir();
        let path = temp.path().join("appdeploy.yaml");
        write_file(
            &path,
            "staging_dir: staged\nbackup_dir: /abs/backups\nrestart: never\nrestart_timeout_secs: 60\nexclude:\n  - '*.pyc'\n",
        );

        let file = FileSettings::load(&path).unwrap();
        assert_eq!(file.staging_dir, Some(temp.path().join("staged")));
        assert_eq!(file.backup_dir, Some(PathBuf::from("/abs/backups")));
        assert_eq!(file.restart, Some(RestartPolicy::Never));
        assert_eq!(file.restart_timeout_secs, Some(60));
        assert_eq!(file.exclude, Some(vec!["*.pyc".to_string()]));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let temp = create_temp_dir();
        let path = temp.path().join("appdeploy.yaml");
        write_file(&path, "staging: apps\n");
        let err = FileSettings::load(&path).unwrap_err();
        assert!(matches!(err, crate::error::DeployError::ConfigParseFailed { .. }));
    }

    #[test]
    fn test_explicit_settings_file_must_exist() {
        let temp = create_temp_dir();
        let missing = temp.path().join("nope.yaml");
        assert!(matches!(
            locate_settings_file(Some(&missing)),
            Err(crate::error::DeployError::ConfigNotFound { .. })
        ));

        let present = temp.path().join("custom.yaml");
        write_file(&present, "{}\n");
        assert_eq!(locate_settings_file(Some(&present)).unwrap(), Some(present));
    }
}
