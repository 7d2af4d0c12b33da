//! Per-bundle deployment records and the run report

use std::path::PathBuf;

use serde::Serialize;

use crate::backup::BackupArtifact;
use crate::bundle::ExcludedBundle;
use crate::error::{DeployError, FailureKind};

/// Pipeline stages in the order a bundle passes through them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discovered,
    Validated,
    VersionResolved,
    BackedUp,
    BackupSkipped,
    Copied,
    Verified,
    Completed,
}

/// Final state of one bundle's deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pending,
    Succeeded,
    Failed,
    /// The copy happened but the deployed tree did not verify
    CopiedButInvalid,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Outcome::Pending => "pending",
            Outcome::Succeeded => "succeeded",
            Outcome::Failed => "failed",
            Outcome::CopiedButInvalid => "copied but invalid",
        };
        f.write_str(label)
    }
}

/// What happened to one selected bundle
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentRecord {
    pub bundle: String,
    pub source_path: PathBuf,
    pub target_path: PathBuf,
    /// Version deployed (or about to be)
    pub version: Option<String>,
    /// Version found at the target before this deployment
    pub previous_version: Option<String>,
    pub backup: Option<BackupArtifact>,
    pub outcome: Outcome,
    pub stages: Vec<Stage>,
    pub failure: Option<FailureKind>,
    pub error_detail: Option<String>,
    /// Non-fatal problems, such as permissions that could not be set
    pub warnings: Vec<String>,
}

impl DeploymentRecord {
    pub fn new(bundle: impl Into<String>, source_path: PathBuf, target_path: PathBuf) -> Self {
        Self {
            bundle: bundle.into(),
            source_path,
            target_path,
            version: None,
            previous_version: None,
            backup: None,
            outcome: Outcome::Pending,
            stages: vec![Stage::Discovered],
            failure: None,
            error_detail: None,
            warnings: Vec::new(),
        }
    }

    pub fn advance(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    /// Last stage reached
    pub fn stage(&self) -> Stage {
        self.stages.last().copied().unwrap_or(Stage::Discovered)
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Succeeded
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failed | Outcome::CopiedButInvalid)
    }

    /// Stop this deployment with `err`, mentioning the backup when one exists
    pub(crate) fn fail(mut self, err: &DeployError) -> Self {
        self.outcome = Outcome::Failed;
        self.failure = Some(err.kind());
        self.error_detail = Some(self.with_backup_note(err.to_string()));
        self
    }

    /// Mark the copy as done but unverified
    pub(crate) fn copied_but_invalid(mut self, reasons: &[String]) -> Self {
        self.outcome = Outcome::CopiedButInvalid;
        self.failure = Some(FailureKind::Verification);
        self.error_detail = Some(self.with_backup_note(reasons.join("; ")));
        self
    }

    pub(crate) fn succeed(mut self) -> Self {
        self.advance(Stage::Completed);
        self.outcome = Outcome::Succeeded;
        self
    }

    /// How to get back to the pre-deployment tree, when a backup was taken
    pub fn rollback_hint(&self) -> Option<String> {
        self.backup
            .as_ref()
            .map(|b| format!("appdeploy restore {}", b.archive_path.display()))
    }

    fn with_backup_note(&self, detail: String) -> String {
        match &self.backup {
            Some(backup) => format!(
                "{detail} (backup for manual restoration: {})",
                backup.archive_path.display()
            ),
            None => detail,
        }
    }
}

/// Everything a deploy run did
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub records: Vec<DeploymentRecord>,
    pub excluded: Vec<ExcludedBundle>,
}

impl RunReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &DeploymentRecord> {
        self.records.iter().filter(|r| r.is_success())
    }

    pub fn any_failed(&self) -> bool {
        self.records.iter().any(DeploymentRecord::is_failure)
    }

    /// Process exit status for this run
    pub fn exit_code(&self) -> i32 {
        i32::from(self.any_failed())
    }
}
