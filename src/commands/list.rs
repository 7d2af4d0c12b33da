//! List command implementation

use crate::cli::ListArgs;
use crate::commands::GlobalOptions;
use crate::error::Result;
use crate::logging;
use crate::pipeline::{DeploymentPipeline, PipelineConfig};
use crate::ui::display;

/// Run list command
pub fn run(global: &GlobalOptions, args: ListArgs) -> Result<()> {
    logging::init(global.verbose, None)?;
    let (platform, settings) = global.settings(&args.locations.overrides())?;

    let pipeline = DeploymentPipeline::new(PipelineConfig {
        staging_root: settings.staging_dir.clone(),
        target_root: settings.target_dir.clone(),
        backup_dir: settings.backup_dir.clone(),
        copy_options: settings.copy_options(),
        permission_plan: platform.permission_plan,
    });
    let discovery = pipeline.discover()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&discovery)?);
    } else {
        display::print_discovery(&discovery);
    }
    Ok(())
}
