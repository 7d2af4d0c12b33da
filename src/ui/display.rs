//! Colored output for deployments, listings and restart guidance

use console::Style;

use crate::backup::BackupArtifact;
use crate::bundle::ExcludedBundle;
use crate::git::CommitOutcome;
use crate::pipeline::{DeploymentRecord, Discovery, Outcome, RunReport};
use crate::restart::RestartOutcome;

fn bold(text: &str) -> console::StyledObject<&str> {
    Style::new().bold().apply_to(text)
}

/// Bundles in the staging directory, eligible first
pub fn print_discovery(discovery: &Discovery) {
    if discovery.eligible.is_empty() && discovery.excluded.is_empty() {
        println!("No bundles found in staging directory.");
        return;
    }

    if !discovery.eligible.is_empty() {
        println!("{}", bold("Deployable bundles:"));
        for bundle in &discovery.eligible {
            println!(
                "  {} {}",
                Style::new().bold().green().apply_to(&bundle.name),
                Style::new()
                    .dim()
                    .apply_to(bundle.declared_version.as_deref().unwrap_or("-"))
            );
        }
    }

    if !discovery.excluded.is_empty() {
        if !discovery.eligible.is_empty() {
            println!();
        }
        print_excluded(&discovery.excluded);
    }
}

/// Bundles that cannot be deployed, with every reason
pub fn print_excluded(excluded: &[ExcludedBundle]) {
    if excluded.is_empty() {
        return;
    }
    println!("{}", bold("Excluded bundles:"));
    for bundle in excluded {
        println!("  {}", Style::new().bold().yellow().apply_to(&bundle.name));
        for reason in &bundle.reasons {
            println!("    - {reason}");
        }
    }
}

/// Backup archives, newest first
pub fn print_backups(backups: &[BackupArtifact]) {
    if backups.is_empty() {
        println!("No backups found.");
        return;
    }
    println!("{}", bold("Backups:"));
    for backup in backups {
        println!(
            "  {} {} {}",
            Style::new().bold().yellow().apply_to(&backup.bundle_name),
            backup.created_at.format("%Y-%m-%d %H:%M:%S"),
            Style::new().dim().apply_to(backup.archive_path.display())
        );
    }
}

fn outcome_style(outcome: Outcome) -> Style {
    match outcome {
        Outcome::Succeeded => Style::new().green(),
        Outcome::Failed => Style::new().red(),
        Outcome::CopiedButInvalid => Style::new().yellow(),
        Outcome::Pending => Style::new().dim(),
    }
}

fn print_record(record: &DeploymentRecord) {
    let version = match (&record.previous_version, &record.version) {
        (Some(prev), Some(new)) if prev != new => format!("{prev} -> {new}"),
        (_, Some(new)) => new.clone(),
        (_, None) => "-".to_string(),
    };
    println!(
        "  {} {} [{}]",
        Style::new().bold().apply_to(&record.bundle),
        version,
        outcome_style(record.outcome).apply_to(record.outcome)
    );
    println!("    {} {}", bold("Target:"), record.target_path.display());
    if let Some(backup) = &record.backup {
        println!("    {} {}", bold("Backup:"), backup.archive_path.display());
    }
    if let Some(detail) = &record.error_detail {
        println!("    {} {}", Style::new().bold().red().apply_to("Error:"), detail);
    }
    for warning in &record.warnings {
        println!("    {} {}", Style::new().yellow().apply_to("Warning:"), warning);
    }
    if record.is_failure() {
        if let Some(hint) = record.rollback_hint() {
            println!("    {} {}", bold("Rollback:"), hint);
        }
    }
}

/// Per-bundle results followed by totals
pub fn print_run_summary(report: &RunReport) {
    println!();
    println!("{}", bold("Deployment summary:"));
    for record in &report.records {
        print_record(record);
    }

    let succeeded = report.succeeded().count();
    let failed = report.records.len() - succeeded;
    println!();
    if failed == 0 {
        println!(
            "{}",
            Style::new()
                .green()
                .apply_to(format!("Deployed {succeeded} bundle(s)."))
        );
    } else {
        println!(
            "{}",
            Style::new().red().apply_to(format!(
                "Deployed {succeeded} bundle(s), {failed} did not complete."
            ))
        );
    }
}

/// Header shown before the restart question
pub fn print_restart_required(deployed: &[String]) {
    println!();
    println!("{}", bold("Runtime restart required"));
    println!("New or changed bundles are only loaded when the runtime starts.");
    println!();
    println!("{}", Style::new().cyan().apply_to("Deployed in this session:"));
    for name in deployed {
        println!("  - {}", Style::new().green().apply_to(name));
    }
    println!();
    println!("{}", Style::new().cyan().apply_to("Restart impact:"));
    println!("  - brief service interruption, typically 30s to 2min");
    println!("  - running searches are interrupted and web users logged out");
    println!();
    println!("  y/yes  = restart now");
    println!("  n/no   = skip, restart manually later");
    println!("  i/info = more about the restart");
}

/// Longer explanation for the `info` answer
pub fn print_restart_details() {
    println!();
    println!("{}", bold("What happens during a restart:"));
    for step in [
        "the runtime stops gracefully",
        "configuration files are re-read",
        "bundles are discovered and loaded",
        "services become available again",
    ] {
        println!("  - {step}");
    }
    println!();
    println!("{}", bold("Typical duration:"));
    println!("  - small instance (1-5 bundles): 30-60 seconds");
    println!("  - large instance (100+ bundles): 2-5 minutes");
    println!();
    println!("{}", bold("Consider waiting when:"));
    println!("  - users are active or critical searches are running");
    println!("  - more bundles will be deployed shortly (restart once at the end)");
    println!();
}

/// Result of the restart step, with manual instructions when it did not happen
pub fn print_restart_outcome(outcome: &RestartOutcome, manual: &[String]) {
    match outcome {
        RestartOutcome::NotNeeded => {}
        RestartOutcome::Restarted => {
            println!("{}", Style::new().green().apply_to("Runtime restarted."));
        }
        RestartOutcome::Skipped | RestartOutcome::Failed(_) => {
            if let RestartOutcome::Failed(reason) = outcome {
                println!(
                    "{} {}",
                    Style::new().bold().red().apply_to("Restart failed:"),
                    reason
                );
            } else {
                println!("{}", Style::new().yellow().apply_to("Runtime restart skipped."));
            }
            println!("Restart the runtime to load the deployed bundles:");
            for line in manual {
                println!("  - {line}");
            }
        }
    }
}

/// Report what the post-deployment commit step did
pub fn print_commit_outcome(outcome: &CommitOutcome) {
    match outcome {
        CommitOutcome::NotNeeded | CommitOutcome::NotRequested | CommitOutcome::Declined => {}
        CommitOutcome::NotARepository => {
            println!(
                "{}",
                Style::new()
                    .dim()
                    .apply_to("Staging directory is not in a git repository; nothing committed.")
            );
        }
        CommitOutcome::NoChanges => println!("No changes to commit."),
        CommitOutcome::Committed { id, bundles } => {
            println!(
                "{} {} ({})",
                Style::new().green().apply_to("Committed"),
                id,
                bundles.join(", ")
            );
        }
        CommitOutcome::Failed(reason) => {
            println!(
                "{} {}",
                Style::new().bold().red().apply_to("Git commit failed:"),
                reason
            );
        }
    }
}
