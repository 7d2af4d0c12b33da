//! Zip snapshots of deployed bundles
//!
//! A backup is taken of the deployed tree immediately before it is replaced.
//! Archives are named `<bundle>_<YYYYMMDD_HHMMSS>.zip`, are never overwritten
//! and are never deleted by this tool.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::bundle;
use crate::error::{self, DeployError, Result};

/// Timestamp format embedded in archive names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const ARCHIVE_EXTENSION: &str = "zip";

/// A backup archive on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupArtifact {
    pub bundle_name: String,
    pub created_at: NaiveDateTime,
    pub archive_path: PathBuf,
}

/// Archive file name for a bundle at a point in time
pub fn archive_name(bundle_name: &str, at: NaiveDateTime) -> String {
    format!(
        "{bundle_name}_{}.{ARCHIVE_EXTENSION}",
        at.format(TIMESTAMP_FORMAT)
    )
}

/// Split an archive file name into bundle name and timestamp
pub fn parse_archive_name(file_name: &str) -> Result<(String, NaiveDateTime)> {
    let invalid = || DeployError::InvalidBackupName {
        name: file_name.to_string(),
    };

    let stem = file_name
        .strip_suffix(".zip")
        .ok_or_else(invalid)?;
    let mut parts = stem.rsplitn(3, '_');
    let time = parts.next().ok_or_else(invalid)?;
    let date = parts.next().ok_or_else(invalid)?;
    let name = parts.next().ok_or_else(invalid)?;

    if bundle::validate_name(name).is_err() {
        return Err(invalid());
    }
    let created_at = NaiveDateTime::parse_from_str(&format!("{date}_{time}"), TIMESTAMP_FORMAT)
        .map_err(|_| invalid())?;

    Ok((name.to_string(), created_at))
}

/// Creates, lists and restores bundle backups
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveBackup;

impl ArchiveBackup {
    pub fn new() -> Self {
        Self
    }

    /// Snapshot `existing_target` into `backup_dir`
    ///
    /// Fails if the target is missing or not a directory, if an archive with the
    /// same name already exists, or if anything cannot be written. A partially
    /// written archive is removed before the error is returned.
    pub fn create_backup(&self, existing_target: &Path, backup_dir: &Path) -> Result<BackupArtifact> {
        let started = Local::now().naive_local();
        let target_display = existing_target.display().to_string();

        let meta = fs::symlink_metadata(existing_target).map_err(|_| {
            DeployError::BackupSourceMissing {
                path: target_display.clone(),
            }
        })?;
        if !meta.is_dir() && !existing_target.is_dir() {
            return Err(DeployError::BackupSourceNotDirectory {
                path: target_display,
            });
        }

        let bundle_name = existing_target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| error::backup::failed(&target_display, "target has no name"))?;

        fs::create_dir_all(backup_dir).map_err(|e| {
            error::backup::failed(backup_dir.display().to_string(), e.to_string())
        })?;

        let archive_path = backup_dir.join(archive_name(&bundle_name, started));
        let archive_display = archive_path.display().to_string();

        let file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&archive_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(DeployError::BackupCollision {
                    path: archive_display,
                });
            }
            Err(e) => return Err(error::backup::failed(archive_display, e.to_string())),
        };

        if let Err(reason) = write_archive(file, existing_target) {
            let _ = fs::remove_file(&archive_path);
            return Err(error::backup::failed(archive_display, reason));
        }

        tracing::info!(
            bundle = %bundle_name,
            archive = %archive_path.display(),
            "backup created"
        );

        Ok(BackupArtifact {
            bundle_name,
            created_at: started,
            archive_path,
        })
    }

    /// Backups in `backup_dir`, newest first, optionally for one bundle
    ///
    /// Files that do not follow the archive naming scheme are ignored. A
    /// missing backup directory simply has no backups.
    pub fn list_backups(&self, backup_dir: &Path, bundle: Option<&str>) -> Result<Vec<BackupArtifact>> {
        if !backup_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut artifacts = Vec::new();
        for entry in fs::read_dir(backup_dir).map_err(|e| error::fs::read_failed(backup_dir, &e))? {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Ok((name, created_at)) = parse_archive_name(&file_name) else {
                continue;
            };
            if bundle.is_some_and(|b| b != name) {
                continue;
            }
            artifacts.push(BackupArtifact {
                bundle_name: name,
                created_at,
                archive_path: entry.path(),
            });
        }

        artifacts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.bundle_name.cmp(&b.bundle_name))
        });
        Ok(artifacts)
    }

    /// Replace `target` with the contents of `archive`
    ///
    /// The archive is extracted next to the target first and only swapped in
    /// once extraction succeeded, so a broken archive leaves the target alone.
    /// Entries that would land outside the target are rejected.
    pub fn restore_backup(&self, archive: &Path, target: &Path) -> Result<()> {
        let archive_display = archive.display().to_string();
        let fail = |reason: String| error::backup::restore_failed(archive_display.clone(), reason);

        let parent = target
            .parent()
            .ok_or_else(|| fail("target has no parent directory".to_string()))?;
        fs::create_dir_all(parent).map_err(|e| fail(e.to_string()))?;

        let scratch = tempfile::Builder::new()
            .prefix(".appdeploy-restore-")
            .tempdir_in(parent)
            .map_err(|e| fail(e.to_string()))?;
        let extracted = scratch.path().join("bundle");
        fs::create_dir(&extracted).map_err(|e| fail(e.to_string()))?;

        extract_archive(archive, &extracted).map_err(fail)?;

        match fs::symlink_metadata(target) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(target),
            Ok(_) => fs::remove_file(target),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
        .map_err(|e| fail(format!("cannot clear target: {e}")))?;

        fs::rename(&extracted, target).map_err(|e| fail(e.to_string()))?;

        tracing::info!(archive = %archive.display(), target = %target.display(), "backup restored");
        Ok(())
    }
}

fn write_archive(file: File, root: &Path) -> std::result::Result<(), String> {
    let mut zip = ZipWriter::new(file);
    let base = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries: Vec<_> = WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .into_iter()
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| e.to_string())?;
    entries.sort_by(|a, b| a.path().cmp(b.path()));

    for entry in entries {
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| e.to_string())?
            .to_string_lossy()
            .replace('\\', "/");
        let options = base.unix_permissions(entry_mode(&entry));

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{relative}/"), options)
                .map_err(|e| e.to_string())?;
        } else {
            zip.start_file(relative.as_str(), options)
                .map_err(|e| e.to_string())?;
            let mut source = File::open(entry.path())
                .map_err(|e| format!("{}: {e}", entry.path().display()))?;
            io::copy(&mut source, &mut zip).map_err(|e| e.to_string())?;
        }
    }

    let file = zip.finish().map_err(|e| e.to_string())?;
    file.sync_all().map_err(|e| e.to_string())
}

#[cfg(unix)]
fn entry_mode(entry: &walkdir::DirEntry) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    entry
        .metadata()
        .map(|m| m.permissions().mode() & 0o7777)
        .unwrap_or(if entry.file_type().is_dir() { 0o755 } else { 0o644 })
}

#[cfg(not(unix))]
fn entry_mode(entry: &walkdir::DirEntry) -> u32 {
    if entry.file_type().is_dir() { 0o755 } else { 0o644 }
}

fn extract_archive(archive: &Path, dest: &Path) -> std::result::Result<(), String> {
    let file = File::open(archive).map_err(|e| e.to_string())?;
    let mut zip = ZipArchive::new(file).map_err(|e| e.to_string())?;
    let mut dir_modes = Vec::new();

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| e.to_string())?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| format!("entry '{}' escapes the target directory", entry.name()))?;
        let out = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out).map_err(|e| e.to_string())?;
            dir_modes.push((out, entry.unix_mode()));
        } else {
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent).map_err(|e| e.to_string())?;
            }
            let mut writer = File::create(&out).map_err(|e| e.to_string())?;
            io::copy(&mut entry, &mut writer).map_err(|e| e.to_string())?;
            restore_mode(&out, entry.unix_mode())?;
        }
    }

    // Directories last and deepest first, so a read-only directory never
    // blocks writing its own children.
    dir_modes.sort_by_key(|(path, _)| std::cmp::Reverse(path.components().count()));
    for (path, mode) in dir_modes {
        restore_mode(&path, mode)?;
    }
    Ok(())
}

#[cfg(unix)]
fn restore_mode(path: &Path, mode: Option<u32>) -> std::result::Result<(), String> {
    use std::os::unix::fs::PermissionsExt;

    match mode {
        Some(mode) => fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
            .map_err(|e| e.to_string()),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn restore_mode(_path: &Path, _mode: Option<u32>) -> std::result::Result<(), String> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{create_temp_dir, snapshot_tree, write_bundle, write_file};

    #[test]
    fn test_archive_name_round_trip() {
        let at = NaiveDateTime::parse_from_str("20240131_235959", TIMESTAMP_FORMAT).unwrap();
        let name = archive_name("my_app-2", at);
        assert_eq!(name, "my_app-2_20240131_235959.zip");
        assert_eq!(parse_archive_name(&name).unwrap(), ("my_app-2".to_string(), at));
    }

    #[test]
    fn test_parse_rejects_foreign_names() {
        for bad in [
            "notes.txt",
            "app.zip",
            "app_2024_1200.zip",
            "_20240131_235959.zip",
            "app_20241340_000000.zip",
        ] {
            assert!(parse_archive_name(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_create_backup_missing_target() {
        let temp = create_temp_dir();
        let result = ArchiveBackup::new().create_backup(&temp.path().join("appA"), temp.path());
        assert!(matches!(result, Err(DeployError::BackupSourceMissing { .. })));
    }

    #[test]
    fn test_create_backup_target_is_file() {
        let temp = create_temp_dir();
        let target = temp.path().join("appA");
        write_file(&target, "stray");
        let result = ArchiveBackup::new().create_backup(&target, &temp.path().join("backups"));
        assert!(matches!(result, Err(DeployError::BackupSourceNotDirectory { .. })));
    }

    #[test]
    fn test_backup_then_restore_reproduces_tree() {
        let target_root = create_temp_dir();
        let backups = create_temp_dir();
        let target = write_bundle(target_root.path(), "appA", "1.0.0");
        let before = snapshot_tree(&target);

        let artifact = ArchiveBackup::new()
            .create_backup(&target, backups.path())
            .unwrap();
        assert_eq!(artifact.bundle_name, "appA");
        assert!(artifact.archive_path.is_file());

        fs::remove_dir_all(target.join("static")).unwrap();
        write_file(&target.join("new.txt"), "changed");

        ArchiveBackup::new()
            .restore_backup(&artifact.archive_path, &target)
            .unwrap();
        assert_eq!(snapshot_tree(&target), before);
        assert!(target.join("lookups").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_restore_keeps_unix_modes() {
        use std::os::unix::fs::PermissionsExt;

        let target_root = create_temp_dir();
        let backups = create_temp_dir();
        let target = write_bundle(target_root.path(), "appA", "1.0.0");
        fs::set_permissions(target.join("bin/setup.sh"), fs::Permissions::from_mode(0o750)).unwrap();

        let artifact = ArchiveBackup::new().create_backup(&target, backups.path()).unwrap();
        fs::remove_dir_all(&target).unwrap();
        ArchiveBackup::new().restore_backup(&artifact.archive_path, &target).unwrap();

        let mode = fs::metadata(target.join("bin/setup.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
    }

    #[cfg(unix)]
    #[test]
    fn test_restore_read_only_directory_with_children() {
        use std::os::unix::fs::PermissionsExt;

        let target_root = create_temp_dir();
        let backups = create_temp_dir();
        let target = write_bundle(target_root.path(), "appA", "1.0.0");
        write_file(&target.join("bin/nested/tool.sh"), "echo nested\n");
        fs::set_permissions(target.join("bin/nested"), fs::Permissions::from_mode(0o555)).unwrap();
        fs::set_permissions(target.join("bin"), fs::Permissions::from_mode(0o555)).unwrap();
        let before = snapshot_tree(&target);

        let artifact = ArchiveBackup::new().create_backup(&target, backups.path()).unwrap();
        for dir in ["bin", "bin/nested"] {
            fs::set_permissions(target.join(dir), fs::Permissions::from_mode(0o755)).unwrap();
        }
        fs::remove_dir_all(&target).unwrap();

        ArchiveBackup::new().restore_backup(&artifact.archive_path, &target).unwrap();

        assert_eq!(snapshot_tree(&target), before);
        for dir in ["bin", "bin/nested"] {
            let mode = fs::metadata(target.join(dir)).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o555, "{dir}");
        }

        for dir in ["bin", "bin/nested"] {
            fs::set_permissions(target.join(dir), fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    #[test]
    fn test_second_backup_never_overwrites() {
        let target_root = create_temp_dir();
        let backups = create_temp_dir();
        let target = write_bundle(target_root.path(), "appA", "1.0.0");
        let backup = ArchiveBackup::new();

        let first = backup.create_backup(&target, backups.path()).unwrap();
        let first_bytes = fs::read(&first.archive_path).unwrap();

        match backup.create_backup(&target, backups.path()) {
            Ok(second) => assert_ne!(first.archive_path, second.archive_path),
            Err(e) => assert!(matches!(e, DeployError::BackupCollision { .. })),
        }
        assert_eq!(fs::read(&first.archive_path).unwrap(), first_bytes);
    }

    #[test]
    fn test_collision_with_existing_archive() {
        let target_root = create_temp_dir();
        let backups = create_temp_dir();
        let target = write_bundle(target_root.path(), "appA", "1.0.0");

        let now = Local::now().naive_local();
        let later = now + chrono::Duration::seconds(1);
        for at in [now, later] {
            write_file(&backups.path().join(archive_name("appA", at)), "occupied");
        }

        let result = ArchiveBackup::new().create_backup(&target, backups.path());
        assert!(matches!(result, Err(DeployError::BackupCollision { .. })));
        assert_eq!(
            fs::read_to_string(backups.path().join(archive_name("appA", now))).unwrap(),
            "occupied"
        );
    }

    #[test]
    fn test_list_backups_newest_first_and_filtered() {
        let backups = create_temp_dir();
        for name in [
            "appA_20240101_090000.zip",
            "appA_20240301_090000.zip",
            "appB_20240201_090000.zip",
            "README.txt",
        ] {
            write_file(&backups.path().join(name), "");
        }

        let all = ArchiveBackup::new().list_backups(backups.path(), None).unwrap();
        let names: Vec<_> = all
            .iter()
            .map(|a| a.archive_path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            [
                "appA_20240301_090000.zip",
                "appB_20240201_090000.zip",
                "appA_20240101_090000.zip"
            ]
        );

        let only_a = ArchiveBackup::new()
            .list_backups(backups.path(), Some("appA"))
            .unwrap();
        assert_eq!(only_a.len(), 2);
        assert!(only_a.iter().all(|a| a.bundle_name == "appA"));
    }

    #[test]
    fn test_list_backups_missing_dir_is_empty() {
        let temp = create_temp_dir();
        assert!(ArchiveBackup::new()
            .list_backups(&temp.path().join("none"), None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_restore_rejects_escaping_entries() {
        let temp = create_temp_dir();
        let archive_path = temp.path().join("evil_20240101_000000.zip");
        {
            let mut zip = ZipWriter::new(File::create(&archive_path).unwrap());
            zip.start_file("../escaped.txt", SimpleFileOptions::default()).unwrap();
            io::Write::write_all(&mut zip, b"x").unwrap();
            zip.finish().unwrap();
        }
        let target = temp.path().join("targets/evil");
        write_file(&target.join("keep.txt"), "original");

        let result = ArchiveBackup::new().restore_backup(&archive_path, &target);
        assert!(matches!(result, Err(DeployError::RestoreFailed { .. })));
        assert!(!temp.path().join("targets/escaped.txt").exists());
        assert_eq!(fs::read_to_string(target.join("keep.txt")).unwrap(), "original");
    }
}
