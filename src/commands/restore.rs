//! Restore command
//!
//! Puts a backup archive back in place of the deployed bundle it was taken
//! from. Whatever is deployed at that moment is backed up first, so a restore
//! can itself be undone.

use console::Style;
use inquire::Confirm;

use crate::backup::{self, ArchiveBackup};
use crate::cli::RestoreArgs;
use crate::commands::{GlobalOptions, is_interactive};
use crate::error::{DeployError, Result};
use crate::logging;

/// Run restore command
pub fn run(global: &GlobalOptions, args: RestoreArgs) -> Result<()> {
    let (_, settings) = global.settings(&args.locations.overrides())?;
    logging::init(global.verbose, Some(&settings.log_dir))?;

    if !args.archive.is_file() {
        return Err(DeployError::RestoreFailed {
            archive: args.archive.display().to_string(),
            reason: "archive not found".to_string(),
        });
    }
    let file_name = args
        .archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (bundle_name, created_at) = backup::parse_archive_name(&file_name)?;

    if !settings.target_dir.is_dir() {
        return Err(DeployError::TargetRootNotFound {
            path: settings.target_dir.display().to_string(),
        });
    }
    let target = settings.target_dir.join(&bundle_name);

    println!(
        "Restoring {} from backup taken {} into {}",
        Style::new().bold().apply_to(&bundle_name),
        created_at.format("%Y-%m-%d %H:%M:%S"),
        target.display()
    );

    if !args.yes {
        if !is_interactive(false) {
            return Err(DeployError::PromptFailed {
                message: "confirmation required; pass --yes to restore without a terminal".to_string(),
            });
        }
        let proceed = Confirm::new("Replace the deployed bundle with this backup?")
            .with_default(false)
            .prompt()?;
        if !proceed {
            println!("Restore cancelled.");
            return Ok(());
        }
    }

    let archives = ArchiveBackup::new();
    if target.exists() {
        let safety = archives.create_backup(&target, &settings.backup_dir)?;
        println!(
            "Current deployment backed up to {}",
            safety.archive_path.display()
        );
    }

    archives.restore_backup(&args.archive, &target)?;
    tracing::info!(bundle = %bundle_name, archive = %args.archive.display(), "bundle restored");
    println!(
        "{}",
        Style::new()
            .green()
            .apply_to(format!("Restored {bundle_name}."))
    );
    println!("Restart the runtime to load the restored bundle.");
    Ok(())
}
