//! Backups command implementation

use crate::backup::ArchiveBackup;
use crate::bundle;
use crate::cli::BackupsArgs;
use crate::commands::GlobalOptions;
use crate::error::Result;
use crate::logging;
use crate::ui::display;

/// Run backups command
pub fn run(global: &GlobalOptions, args: BackupsArgs) -> Result<()> {
    logging::init(global.verbose, None)?;
    if let Some(name) = &args.name {
        bundle::validate_name(name)?;
    }
    let (_, settings) = global.settings(&args.locations.overrides())?;

    let backups = ArchiveBackup::new().list_backups(&settings.backup_dir, args.name.as_deref())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&backups)?);
    } else {
        display::print_backups(&backups);
    }
    Ok(())
}
