//! The deployment pipeline
//!
//! Each selected bundle goes through the same stages, strictly in order:
//!
//! ```text
//! Discovered -> Validated -> VersionResolved -> BackedUp | BackupSkipped
//!            -> Copied -> Verified -> Completed
//! ```
//!
//! Any stage can end the bundle's deployment. Errors are caught at the
//! per-bundle boundary and recorded in its [`DeploymentRecord`]; they never
//! stop the remaining bundles. The one ordering that matters for safety is
//! that a pre-existing target is always backed up before it is removed, and a
//! failed backup means the target is left untouched.

mod record;


pub use record::{DeploymentRecord, Outcome, RunReport, Stage};

use std::fs;
use std::path::PathBuf;

use serde::Serialize;

use crate::backup::ArchiveBackup;
use crate::bundle::{self, Bundle, ExcludedBundle, contract};
use crate::copier::{BundleCopier, CopyOptions};
use crate::error::{self, DeployError, Result};
use crate::platform::PermissionPlan;
use crate::ui::progress::{ProgressReporter, SilentProgressReporter};
use crate::ui::prompt::Prompter;
use crate::validator::BundleValidator;
use crate::version::VersionEditor;

/// Locations and policies for one run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub staging_root: PathBuf,
    pub target_root: PathBuf,
    pub backup_dir: PathBuf,
    pub copy_options: CopyOptions,
    pub permission_plan: PermissionPlan,
}

/// Staging directory contents split by eligibility
#[derive(Debug, Clone, Default, Serialize)]
pub struct Discovery {
    pub eligible: Vec<Bundle>,
    pub excluded: Vec<ExcludedBundle>,
}

impl Discovery {
    pub fn find(&self, name: &str) -> Option<&Bundle> {
        self.eligible.iter().find(|b| b.name == name)
    }
}

/// Runs discovery, selection and per-bundle deployment
#[derive(Debug, Clone)]
pub struct DeploymentPipeline {
    config: PipelineConfig,
    validator: BundleValidator,
    editor: VersionEditor,
    backup: ArchiveBackup,
    copier: BundleCopier,
}

impl DeploymentPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let copier = BundleCopier::new(config.copy_options.clone());
        Self {
            config,
            validator: BundleValidator::new(),
            editor: VersionEditor::new(),
            backup: ArchiveBackup::new(),
            copier,
        }
    }

    /// Fail early when the target root is missing or overlaps the staging root
    ///
    /// Replacing a deployed bundle removes its directory first, so a target
    /// root that is, contains or sits inside the staging root would delete
    /// staged bundles.
    pub fn check_target_root(&self) -> Result<()> {
        let target = dunce::canonicalize(&self.config.target_root).map_err(|_| {
            DeployError::TargetRootNotFound {
                path: self.config.target_root.display().to_string(),
            }
        })?;
        if !target.is_dir() {
            return Err(DeployError::TargetRootNotFound {
                path: self.config.target_root.display().to_string(),
            });
        }

        // A missing staging root is reported by discovery.
        if let Ok(staging) = dunce::canonicalize(&self.config.staging_root) {
            if staging.starts_with(&target) || target.starts_with(&staging) {
                return Err(error::config::overlapping_roots(&staging, &target));
            }
        }
        Ok(())
    }

    /// Scan the staging directory and validate every candidate
    ///
    /// Invalid bundles are excluded with their reasons; only a missing staging
    /// directory is an error.
    pub fn discover(&self) -> Result<Discovery> {
        let scan = bundle::scan_staging(&self.config.staging_root)?;
        let mut discovery = Discovery {
            eligible: Vec::new(),
            excluded: scan.rejected,
        };

        for mut candidate in scan.candidates {
            let result = self.validator.validate(&candidate.source_path);
            if result.ok {
                candidate.declared_version = result.version;
                discovery.eligible.push(candidate);
            } else {
                tracing::info!(
                    bundle = %candidate.name,
                    reasons = ?result.reasons,
                    "bundle excluded"
                );
                discovery.excluded.push(ExcludedBundle {
                    name: candidate.name,
                    path: candidate.source_path,
                    reasons: result.reasons,
                });
            }
        }

        discovery
            .excluded
            .sort_by(|a, b| a.name.cmp(&b.name));
        Ok(discovery)
    }

    /// Turn operator-supplied names into bundles to deploy
    ///
    /// Names are checked before anything is looked up, so a name such as
    /// `../other` never reaches the file system. Unknown or excluded names are
    /// reported and skipped; duplicates are ignored.
    pub fn resolve_selection(&self, discovery: &Discovery, names: &[String]) -> Result<Vec<Bundle>> {
        let mut selected: Vec<Bundle> = Vec::new();

        for name in names {
            if bundle::validate_name(name).is_err() {
                tracing::warn!("skipping '{name}': invalid bundle name");
                continue;
            }
            if selected.iter().any(|b| &b.name == name) {
                continue;
            }
            if let Some(bundle) = discovery.find(name) {
                selected.push(bundle.clone());
            } else if let Some(excluded) = discovery.excluded.iter().find(|e| &e.name == name) {
                tracing::warn!("skipping '{name}': {}", excluded.reasons.join("; "));
            } else {
                tracing::warn!("skipping '{name}': {}", error::bundle::not_found(name));
            }
        }

        if selected.is_empty() {
            return Err(DeployError::NoBundlesSelected);
        }
        Ok(selected)
    }

    /// Deploy one bundle; never returns an error, the record carries it
    pub fn deploy(&self, bundle: &Bundle, prompter: &mut dyn Prompter) -> DeploymentRecord {
        self.deploy_with_progress(bundle, prompter, &mut SilentProgressReporter)
    }

    fn deploy_with_progress(
        &self,
        bundle: &Bundle,
        prompter: &mut dyn Prompter,
        progress: &mut dyn ProgressReporter,
    ) -> DeploymentRecord {
        let target = bundle.target_path(&self.config.target_root);
        let mut record = DeploymentRecord::new(&bundle.name, bundle.source_path.clone(), target.clone());
        let span = tracing::info_span!("deploy", bundle = %bundle.name);
        let _enter = span.enter();

        // Validated
        let validation = self.validator.validate(&bundle.source_path);
        if !validation.ok {
            let err = error::bundle::validation_failed(&bundle.name, &validation.reasons);
            tracing::error!("{err}");
            return record.fail(&err);
        }
        let Some(current) = validation.version else {
            return record.fail(&error::config::version_missing(
                contract::config_path(&bundle.source_path).display().to_string(),
            ));
        };
        record.previous_version = self.deployed_version(&target);
        record.advance(Stage::Validated);
        progress.stage(&bundle.name, Stage::Validated);

        // VersionResolved
        let chosen = match prompter.choose_version(bundle, &current) {
            Ok(v) => v.trim().to_string(),
            Err(e) => return record.fail(&e),
        };
        if chosen != current {
            let conf = contract::config_path(&bundle.source_path);
            if let Err(e) = self.editor.write_version(&conf, &chosen) {
                tracing::error!("{e}");
                return record.fail(&e);
            }
        }
        record.version = Some(chosen);
        record.advance(Stage::VersionResolved);
        progress.stage(&bundle.name, Stage::VersionResolved);

        let expected_digest = match self.copier.digest(&bundle.source_path) {
            Ok(d) => d,
            Err(e) => return record.fail(&e),
        };

        // BackedUp | BackupSkipped
        if fs::symlink_metadata(&target).is_ok() {
            match self.backup.create_backup(&target, &self.config.backup_dir) {
                Ok(artifact) => {
                    record.backup = Some(artifact);
                    record.advance(Stage::BackedUp);
                    progress.stage(&bundle.name, Stage::BackedUp);
                }
                Err(e) => {
                    tracing::error!("{e}; target left untouched");
                    return record.fail(&e);
                }
            }
        } else {
            tracing::info!("no previous deployment, backup skipped");
            record.advance(Stage::BackupSkipped);
            progress.stage(&bundle.name, Stage::BackupSkipped);
        }

        // Copied
        if let Err(e) = self.copier.copy(&bundle.source_path, &target) {
            tracing::error!("{e}");
            return record.fail(&e);
        }
        record.advance(Stage::Copied);
        progress.stage(&bundle.name, Stage::Copied);

        for warning in self
            .copier
            .apply_permissions(&target, &self.config.permission_plan)
        {
            tracing::warn!("{warning}");
            record.warnings.push(warning);
        }

        // Verified
        let verification = match self.copier.verify(&target, Some(&expected_digest)) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("verification could not run: {e}");
                return record.copied_but_invalid(&[e.to_string()]);
            }
        };
        if !verification.ok {
            tracing::error!(reasons = ?verification.reasons, "deployed bundle failed verification");
            return record.copied_but_invalid(&verification.reasons);
        }
        record.advance(Stage::Verified);
        progress.stage(&bundle.name, Stage::Verified);

        tracing::info!(version = ?record.version, "bundle deployed");
        record.succeed()
    }

    /// Version currently deployed at `target`, if it can be read
    fn deployed_version(&self, target: &std::path::Path) -> Option<String> {
        let conf = contract::config_path(target);
        if !conf.is_file() {
            return None;
        }
        self.editor.read_version(&conf).ok()
    }

    /// Deploy every selected bundle in order
    pub fn run(&self, selected: &[Bundle], prompter: &mut dyn Prompter) -> RunReport {
        self.run_with_progress(selected, prompter, &mut SilentProgressReporter)
    }

    pub fn run_with_progress(
        &self,
        selected: &[Bundle],
        prompter: &mut dyn Prompter,
        progress: &mut dyn ProgressReporter,
    ) -> RunReport {
        let total = selected.len();
        let mut report = RunReport::default();

        for (index, bundle) in selected.iter().enumerate() {
            progress.start_bundle(&bundle.name, index + 1, total);
            let record = self.deploy_with_progress(bundle, prompter, progress);
            tracing::debug!(
                bundle = %bundle.name,
                stage = ?record.stage(),
                outcome = %record.outcome,
                "bundle finished"
            );
            progress.finish_bundle(&bundle.name, record.outcome);
            report.records.push(record);
        }
        progress.finish();

        report
    }
}
