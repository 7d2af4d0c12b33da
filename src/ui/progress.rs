//! Progress reporting while bundles are deployed
//!
//! All progress goes through [`ProgressReporter`] so the pipeline does not
//! care whether a spinner is drawn.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::pipeline::{Outcome, Stage};

/// Receives pipeline progress events
pub trait ProgressReporter {
    /// A bundle is about to be deployed
    fn start_bundle(&mut self, bundle_name: &str, current: usize, total: usize);

    /// The current bundle reached `stage`
    fn stage(&mut self, bundle_name: &str, stage: Stage);

    /// The current bundle is done
    fn finish_bundle(&mut self, bundle_name: &str, outcome: Outcome);

    /// All bundles are done
    fn finish(&mut self);
}

/// Spinner on stderr, hidden when stderr is not a terminal
pub struct InteractiveProgressReporter {
    bar: ProgressBar,
}

impl InteractiveProgressReporter {
    pub fn new(total_bundles: u64) -> Self {
        let bar = ProgressBar::new(total_bundles);
        if std::io::stderr().is_terminal() {
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} [{pos}/{len}] {msg}") {
                bar.set_style(style);
            }
            bar.enable_steady_tick(Duration::from_millis(100));
        } else {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        Self { bar }
    }
}

impl ProgressReporter for InteractiveProgressReporter {
    fn start_bundle(&mut self, bundle_name: &str, current: usize, total: usize) {
        self.bar
            .set_message(format!("({current}/{total}) {bundle_name}"));
    }

    fn stage(&mut self, bundle_name: &str, stage: Stage) {
        let label = match stage {
            Stage::Discovered => "queued",
            Stage::Validated => "validated",
            Stage::VersionResolved => "version set",
            Stage::BackedUp => "backed up",
            Stage::BackupSkipped => "no previous deployment",
            Stage::Copied => "copied",
            Stage::Verified => "verified",
            Stage::Completed => "done",
        };
        self.bar.set_message(format!("{bundle_name}: {label}"));
    }

    fn finish_bundle(&mut self, bundle_name: &str, outcome: Outcome) {
        self.bar.inc(1);
        self.bar.println(format!("{bundle_name}: {outcome}"));
    }

    fn finish(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// No-op reporter
#[derive(Debug, Default)]
pub struct SilentProgressReporter;

impl ProgressReporter for SilentProgressReporter {
    fn start_bundle(&mut self, _bundle_name: &str, _current: usize, _total: usize) {}

    fn stage(&mut self, _bundle_name: &str, _stage: Stage) {}

    fn finish_bundle(&mut self, _bundle_name: &str, _outcome: Outcome) {}

    fn finish(&mut self) {}
}
