//! Deploy command
//!
//! Resolves settings, discovers bundles, settles the selection (flags or
//! prompts), runs the pipeline and finally hands the report to the restart
//! advisor and the git committer. The exit status is non-zero when any
//! selected bundle did not complete.

use std::collections::HashMap;
use std::fs;

use console::Style;

use crate::cli::DeployArgs;
use crate::commands::{GlobalOptions, is_interactive};
use crate::config::{Settings, display_path};
use crate::error::{self, DeployError, Result};
use crate::git::DeploymentCommitter;
use crate::logging;
use crate::pipeline::{DeploymentPipeline, PipelineConfig};
use crate::platform::Platform;
use crate::restart::RestartAdvisor;
use crate::ui::display;
use crate::ui::progress::InteractiveProgressReporter;
use crate::ui::prompt::{InquirePrompter, Prompter, ScriptedPrompter};

/// Ask for the runtime home when nothing configured it, then make sure its
/// apps directory exists
fn settle_locations(
    settings: &mut Settings,
    platform: &Platform,
    prompter: &mut dyn Prompter,
    interactive: bool,
) -> Result<()> {
    if interactive && settings.locations_defaulted {
        let home = prompter.choose_runtime_home(platform.os, &settings.runtime_home)?;
        settings.use_runtime_home(home, platform);
    }
    if settings.ensure_target_root(platform)? {
        println!("Created {}", display_path(&settings.target_dir).display());
    }
    Ok(())
}

/// Run deploy command, returning the process exit status
pub fn run(global: &GlobalOptions, args: DeployArgs) -> Result<i32> {
    let (platform, mut settings) = global.settings(&args.overrides())?;
    let run_log = logging::init(global.verbose, Some(&settings.log_dir))?;

    let interactive = is_interactive(args.yes);
    let versions: HashMap<String, String> = args.set_version.iter().cloned().collect();
    let mut prompter: Box<dyn Prompter> = if interactive {
        Box::new(InquirePrompter::new(versions.clone()))
    } else {
        Box::new(
            versions
                .iter()
                .fold(ScriptedPrompter::new(), |p, (name, version)| {
                    p.with_version(name, version)
                }),
        )
    };

    settle_locations(&mut settings, &platform, prompter.as_mut(), interactive)?;
    tracing::info!(
        staging = %settings.staging_dir.display(),
        runtime_home = %settings.runtime_home.display(),
        target = %settings.target_dir.display(),
        backups = %settings.backup_dir.display(),
        settings_file = ?settings.source,
        "deployment started"
    );

    let pipeline = DeploymentPipeline::new(PipelineConfig {
        staging_root: settings.staging_dir.clone(),
        target_root: settings.target_dir.clone(),
        backup_dir: settings.backup_dir.clone(),
        copy_options: settings.copy_options(),
        permission_plan: platform.permission_plan.clone(),
    });
    pipeline.check_target_root()?;

    let discovery = pipeline.discover()?;
    display::print_excluded(&discovery.excluded);
    if discovery.eligible.is_empty() {
        println!("No deployable bundles in {}", display_path(&settings.staging_dir).display());
        return Err(DeployError::NoBundlesSelected);
    }

    let names = if !args.select.is_empty() {
        args.select.clone()
    } else if args.all {
        discovery.eligible.iter().map(|b| b.name.clone()).collect()
    } else if interactive {
        prompter.select_bundles(&discovery.eligible)?
    } else {
        return Err(DeployError::NoBundlesSelected);
    };

    let selected = pipeline.resolve_selection(&discovery, &names)?;
    for name in versions.keys() {
        if !selected.iter().any(|b| &b.name == name) {
            tracing::warn!("--set-version for '{name}' ignored: bundle not selected");
        }
    }

    if interactive && !prompter.confirm_deploy(&selected)? {
        println!("Deployment cancelled.");
        return Ok(0);
    }

    let mut progress = InteractiveProgressReporter::new(selected.len() as u64);
    let mut report = pipeline.run_with_progress(&selected, prompter.as_mut(), &mut progress);
    report.excluded = discovery.excluded;

    display::print_run_summary(&report);

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json).map_err(|e| error::fs::write_failed(path, &e))?;
        println!("Report written to {}", path.display());
    }

    let advisor = RestartAdvisor::new(
        platform,
        settings.runtime_home.clone(),
        settings.restart_timeout,
        settings.restart,
    );
    let outcome = advisor.advise(&report, prompter.as_mut(), interactive);
    display::print_restart_outcome(&outcome, &advisor.manual_instructions());

    let committer = DeploymentCommitter::new(settings.staging_dir.clone());
    let commit = committer.advise(&report, prompter.as_mut(), args.git_commit, interactive);
    display::print_commit_outcome(&commit);

    if let Some(path) = run_log {
        println!(
            "{} {}",
            Style::new().dim().apply_to("Log:"),
            path.display()
        );
    }

    tracing::info!(
        succeeded = report.succeeded().count(),
        total = report.records.len(),
        "deployment finished"
    );
    Ok(report.exit_code())
}
