//! Committing deployed bundles back into the staging repository
//!
//! When the staging directory is a git working tree, the bundles that went
//! out (including any version edits made during the run) can be recorded in
//! one commit. The step is opt-in and never affects the run's exit status.

use std::path::{Path, PathBuf};

use chrono::Local;
use git2::{DiffStatsFormat, IndexAddOption, Oid, Repository, Signature};

use crate::error::{self, Result};
use crate::pipeline::RunReport;
use crate::ui::prompt::Prompter;

const FALLBACK_NAME: &str = "appdeploy";
const FALLBACK_EMAIL: &str = "appdeploy@localhost";
const STAT_WIDTH: usize = 80;

/// What the commit step ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Nothing was deployed
    NotNeeded,
    /// No `--git-commit` and nobody to ask
    NotRequested,
    NotARepository,
    Declined,
    /// The deployed bundles match what is already committed
    NoChanges,
    Committed { id: String, bundles: Vec<String> },
    Failed(String),
}

/// Offers and performs the post-deployment commit
#[derive(Debug, Clone)]
pub struct DeploymentCommitter {
    staging_root: PathBuf,
}

impl DeploymentCommitter {
    pub fn new(staging_root: PathBuf) -> Self {
        Self { staging_root }
    }

    /// Commit the bundles that succeeded in `report`
    ///
    /// `requested` commits without asking; otherwise an interactive run asks
    /// the prompter. Failures are reported in the outcome, never raised.
    pub fn advise(
        &self,
        report: &RunReport,
        prompter: &mut dyn Prompter,
        requested: bool,
        interactive: bool,
    ) -> CommitOutcome {
        let deployed: Vec<(String, PathBuf)> = report
            .succeeded()
            .map(|r| (r.bundle.clone(), r.source_path.clone()))
            .collect();
        if deployed.is_empty() {
            return CommitOutcome::NotNeeded;
        }
        if !requested && !interactive {
            return CommitOutcome::NotRequested;
        }

        let Some((repo, workdir)) = open_worktree(&self.staging_root) else {
            tracing::info!(staging = %self.staging_root.display(), "staging directory is not in a git repository");
            return CommitOutcome::NotARepository;
        };

        let names: Vec<String> = deployed.iter().map(|(name, _)| name.clone()).collect();
        if !requested {
            match prompter.confirm_git_commit(&names) {
                Ok(true) => {}
                Ok(false) => return CommitOutcome::Declined,
                Err(e) => {
                    tracing::warn!(error = %e, "commit prompt failed, skipping commit");
                    return CommitOutcome::Declined;
                }
            }
        }

        let pathspecs: Vec<String> = deployed
            .iter()
            .filter_map(|(name, source)| {
                let relative = pathspec_for(&workdir, source);
                if relative.is_none() {
                    tracing::warn!(bundle = %name, "bundle lies outside the repository, not committed");
                }
                relative
            })
            .collect();

        match commit_bundles(&repo, &pathspecs, &names) {
            Ok(Some(oid)) => {
                let id = oid.to_string();
                tracing::info!(commit = %id, bundles = ?names, "deployment committed");
                CommitOutcome::Committed {
                    id: id.chars().take(7).collect(),
                    bundles: names,
                }
            }
            Ok(None) => CommitOutcome::NoChanges,
            Err(e) => {
                tracing::error!(error = %e, "deployment commit failed");
                CommitOutcome::Failed(e.to_string())
            }
        }
    }
}

fn open_worktree(staging_root: &Path) -> Option<(Repository, PathBuf)> {
    let repo = Repository::discover(staging_root).ok()?;
    let workdir = dunce::canonicalize(repo.workdir()?).ok()?;
    Some((repo, workdir))
}

/// `source` relative to `workdir`, with forward slashes
fn pathspec_for(workdir: &Path, source: &Path) -> Option<String> {
    let source = dunce::canonicalize(source).ok()?;
    let relative = source.strip_prefix(workdir).ok()?;
    let spec = relative.to_string_lossy().replace('\\', "/");
    (!spec.is_empty()).then_some(spec)
}

/// Stage `pathspecs` and commit; `None` when nothing changed
fn commit_bundles(repo: &Repository, pathspecs: &[String], bundles: &[String]) -> Result<Option<Oid>> {
    // An empty pathspec list would stage the whole working tree.
    if pathspecs.is_empty() {
        return Ok(None);
    }
    let mut index = repo.index().map_err(|e| error::git::failed("index", &e))?;
    index
        .add_all(pathspecs.iter().map(String::as_str), IndexAddOption::DEFAULT, None)
        .map_err(|e| error::git::failed("add", &e))?;
    index
        .update_all(pathspecs.iter().map(String::as_str), None)
        .map_err(|e| error::git::failed("add", &e))?;
    index.write().map_err(|e| error::git::failed("add", &e))?;

    let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
    let parent_tree = match &parent {
        Some(commit) => Some(commit.tree().map_err(|e| error::git::failed("diff", &e))?),
        None => None,
    };

    let diff = repo
        .diff_tree_to_index(parent_tree.as_ref(), Some(&index), None)
        .map_err(|e| error::git::failed("diff", &e))?;
    let stats = diff.stats().map_err(|e| error::git::failed("diff", &e))?;
    if stats.files_changed() == 0 {
        return Ok(None);
    }
    let summary = stats
        .to_buf(DiffStatsFormat::FULL, STAT_WIDTH)
        .map_err(|e| error::git::failed("diff", &e))?;

    let tree_id = index.write_tree().map_err(|e| error::git::failed("write tree", &e))?;
    let tree = repo.find_tree(tree_id).map_err(|e| error::git::failed("write tree", &e))?;
    let signature = repo
        .signature()
        .or_else(|_| Signature::now(FALLBACK_NAME, FALLBACK_EMAIL))
        .map_err(|e| error::git::failed("signature", &e))?;

    let message = commit_message(bundles, summary.as_str().unwrap_or_default());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    let oid = repo
        .commit(Some("HEAD"), &signature, &signature, &message, &tree, &parents)
        .map_err(|e| error::git::failed("commit", &e))?;
    Ok(Some(oid))
}

fn commit_message(bundles: &[String], summary: &str) -> String {
    format!(
        "Deploy bundles: {}\n\nSummary of changes:\n{}\n\nDeployed at: {}",
        bundles.join(", "),
        summary.trim_end(),
        Local::now().format("%Y-%m-%d %H:%M:%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{DeploymentRecord, Outcome};
    use crate::test_fixtures::{create_temp_dir, write_bundle, write_file};
    use crate::ui::prompt::ScriptedPrompter;

    fn report_for(staging: &Path, bundles: &[(&str, Outcome)]) -> RunReport {
        let records = bundles
            .iter()
            .map(|(name, outcome)| {
                let mut record = DeploymentRecord::new(*name, staging.join(name), PathBuf::from("/t").join(name));
                record.outcome = *outcome;
                record
            })
            .collect();
        RunReport {
            records,
            excluded: Vec::new(),
        }
    }

    fn head_message(root: &Path) -> String {
        let repo = Repository::open(root).unwrap();
        let commit = repo.head().unwrap().peel_to_commit().unwrap();
        commit.message().unwrap().to_string()
    }

    #[test]
    fn test_commits_succeeded_bundles_only() {
        let temp = create_temp_dir();
        Repository::init(temp.path()).unwrap();
        let staging = temp.path().join("apps");
        write_bundle(&staging, "appA", "1.0.0");
        write_bundle(&staging, "appB", "1.0.0");
        let report = report_for(&staging, &[("appA", Outcome::Succeeded), ("appB", Outcome::Failed)]);

        let outcome = DeploymentCommitter::new(staging.clone()).advise(&report, &mut ScriptedPrompter::new(), true, false);

        assert!(matches!(&outcome, CommitOutcome::Committed { bundles, .. } if bundles == &["appA"]));
        let message = head_message(temp.path());
        assert!(message.starts_with("Deploy bundles: appA\n\nSummary of changes:\n"));
        assert!(message.contains("apps/appA/default/app.conf"));
        assert!(!message.contains("appB"));
        assert!(message.contains("Deployed at: "));

        let repo = Repository::open(temp.path()).unwrap();
        let statuses = repo.statuses(None).unwrap();
        let untracked: Vec<_> = statuses.iter().filter_map(|s| s.path().map(str::to_string)).collect();
        assert!(untracked.iter().all(|p| p.starts_with("apps/appB")), "{untracked:?}");
    }

    #[test]
    fn test_second_commit_without_edits_has_no_changes() {
        let temp = create_temp_dir();
        Repository::init(temp.path()).unwrap();
        let staging = temp.path().join("apps");
        write_bundle(&staging, "appA", "1.0.0");
        let report = report_for(&staging, &[("appA", Outcome::Succeeded)]);
        let committer = DeploymentCommitter::new(staging.clone());

        let first = committer.advise(&report, &mut ScriptedPrompter::new(), true, false);
        assert!(matches!(first, CommitOutcome::Committed { .. }));
        assert_eq!(
            committer.advise(&report, &mut ScriptedPrompter::new(), true, false),
            CommitOutcome::NoChanges
        );

        write_file(&staging.join("appA/default/app.conf"), "[launcher]\nversion = 1.0.1\n");
        let third = committer.advise(&report, &mut ScriptedPrompter::new(), true, false);
        assert!(matches!(third, CommitOutcome::Committed { .. }));
        let repo = Repository::open(temp.path()).unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.parent_count(), 1);
    }

    #[test]
    fn test_outside_repository_is_skipped() {
        let temp = create_temp_dir();
        let staging = temp.path().join("apps");
        write_bundle(&staging, "appA", "1.0.0");
        let report = report_for(&staging, &[("appA", Outcome::Succeeded)]);
        assert_eq!(
            DeploymentCommitter::new(staging).advise(&report, &mut ScriptedPrompter::new(), true, false),
            CommitOutcome::NotARepository
        );
    }

    #[test]
    fn test_nothing_deployed_or_requested() {
        let temp = create_temp_dir();
        Repository::init(temp.path()).unwrap();
        let staging = temp.path().join("apps");
        write_bundle(&staging, "appA", "1.0.0");
        let committer = DeploymentCommitter::new(staging.clone());

        let failed = report_for(&staging, &[("appA", Outcome::Failed)]);
        assert_eq!(
            committer.advise(&failed, &mut ScriptedPrompter::new(), true, true),
            CommitOutcome::NotNeeded
        );

        let succeeded = report_for(&staging, &[("appA", Outcome::Succeeded)]);
        assert_eq!(
            committer.advise(&succeeded, &mut ScriptedPrompter::new(), false, false),
            CommitOutcome::NotRequested
        );
        assert!(Repository::open(temp.path()).unwrap().head().is_err());
    }

    #[test]
    fn test_interactive_run_asks_first() {
        let temp = create_temp_dir();
        Repository::init(temp.path()).unwrap();
        let staging = temp.path().join("apps");
        write_bundle(&staging, "appA", "1.0.0");
        let report = report_for(&staging, &[("appA", Outcome::Succeeded)]);
        let committer = DeploymentCommitter::new(staging.clone());

        assert_eq!(
            committer.advise(&report, &mut ScriptedPrompter::new(), false, true),
            CommitOutcome::Declined
        );
        let outcome = committer.advise(&report, &mut ScriptedPrompter::new().approving_commit(), false, true);
        assert!(matches!(outcome, CommitOutcome::Committed { .. }));
    }
}
