//! Operator interaction
//!
//! The pipeline and the restart advisor never read input themselves. They ask
//! a [`Prompter`], which is either backed by a terminal ([`InquirePrompter`])
//! or answers from command-line flags ([`ScriptedPrompter`]).

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use console::Style;
use inquire::{Confirm, MultiSelect, Text};

use crate::bundle::Bundle;
use crate::error::Result;
use crate::platform::OsKind;
use crate::restart::{self, RestartAction};
use crate::ui::display;

/// Decisions the operator makes during a deployment
pub trait Prompter {
    /// Runtime installation to deploy into, offering the `detected` default
    fn choose_runtime_home(&mut self, os: OsKind, detected: &Path) -> Result<PathBuf>;

    /// Names of the bundles to deploy, chosen from `eligible`
    fn select_bundles(&mut self, eligible: &[Bundle]) -> Result<Vec<String>>;

    /// Final go/no-go for the selection
    fn confirm_deploy(&mut self, bundles: &[Bundle]) -> Result<bool>;

    /// Version to deploy `bundle` with; returning `current` leaves it unchanged
    fn choose_version(&mut self, bundle: &Bundle, current: &str) -> Result<String>;

    /// Answer to the restart question after `deployed` bundles went out
    fn restart_choice(&mut self, deployed: &[String]) -> Result<RestartAction>;

    /// Called when the operator asks for more detail before deciding
    fn show_restart_info(&mut self) {}

    /// Whether to commit the `deployed` bundles in the staging repository
    fn confirm_git_commit(&mut self, deployed: &[String]) -> Result<bool>;
}

/// Terminal prompts backed by `inquire`
///
/// Versions given up front are used without asking.
#[derive(Debug, Default)]
pub struct InquirePrompter {
    preset_versions: HashMap<String, String>,
}

impl InquirePrompter {
    pub fn new(preset_versions: HashMap<String, String>) -> Self {
        Self { preset_versions }
    }
}

impl Prompter for InquirePrompter {
    fn choose_runtime_home(&mut self, os: OsKind, detected: &Path) -> Result<PathBuf> {
        println!("\nDetected operating system: {}", os.label());
        let default = detected.display().to_string();
        let answer = Text::new("Runtime home")
            .with_default(&default)
            .with_help_message("Press Enter to use the default location")
            .prompt()?;
        let answer = answer.trim();
        Ok(if answer.is_empty() {
            detected.to_path_buf()
        } else {
            PathBuf::from(answer)
        })
    }

    fn select_bundles(&mut self, eligible: &[Bundle]) -> Result<Vec<String>> {
        let items: Vec<String> = eligible
            .iter()
            .map(|b| match &b.declared_version {
                Some(v) => format!("{} ({v})", b.name),
                None => b.name.clone(),
            })
            .collect();

        println!();
        let selection = match MultiSelect::new("Select bundles to deploy", items)
            .with_page_size(10)
            .with_help_message("  ↑↓ navigate  space select  enter confirm  type to filter  esc cancel")
            .prompt_skippable()?
        {
            Some(sel) => sel,
            None => return Ok(vec![]),
        };

        Ok(selection
            .iter()
            .map(|s| s.split(" (").next().unwrap_or(s).trim().to_string())
            .collect())
    }

    fn confirm_deploy(&mut self, bundles: &[Bundle]) -> Result<bool> {
        println!("\nThe following bundle(s) will be deployed:");
        for bundle in bundles {
            println!("  - {}", bundle.name);
        }
        println!();

        Ok(Confirm::new("Proceed with deployment?")
            .with_default(true)
            .with_help_message("Press Enter to confirm, or 'n' to cancel")
            .prompt()?)
    }

    fn choose_version(&mut self, bundle: &Bundle, current: &str) -> Result<String> {
        if let Some(version) = self.preset_versions.get(&bundle.name) {
            return Ok(version.clone());
        }
        let answer = Text::new(&format!("Version for {}", bundle.name))
            .with_default(current)
            .with_help_message("Press Enter to keep the current version")
            .prompt()?;
        let answer = answer.trim();
        Ok(if answer.is_empty() {
            current.to_string()
        } else {
            answer.to_string()
        })
    }

    fn restart_choice(&mut self, deployed: &[String]) -> Result<RestartAction> {
        display::print_restart_required(deployed);
        loop {
            let answer = Text::new("Restart the runtime now? [y/n/i]").prompt()?;
            if let Some(action) = restart::resolve(&answer) {
                return Ok(action);
            }
            println!(
                "{}",
                Style::new()
                    .yellow()
                    .apply_to("Please enter 'y' (yes), 'n' (no), or 'i' (info)")
            );
        }
    }

    fn show_restart_info(&mut self) {
        display::print_restart_details();
    }

    fn confirm_git_commit(&mut self, deployed: &[String]) -> Result<bool> {
        println!();
        Ok(Confirm::new(&format!(
            "Commit {} deployed bundle(s) to git?",
            deployed.len()
        ))
        .with_default(false)
        .with_help_message("Stages and commits the bundles in the staging repository")
        .prompt()?)
    }
}

/// Answers taken from flags, for non-interactive runs and tests
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    selection: Option<Vec<String>>,
    versions: HashMap<String, String>,
    restart_answers: VecDeque<RestartAction>,
    decline: bool,
    info_shown: usize,
    runtime_home: Option<PathBuf>,
    approve_commit: bool,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    /// Select exactly these names instead of every eligible bundle
    pub fn with_selection(mut self, names: Vec<String>) -> Self {
        self.selection = Some(names);
        self
    }

    /// Deploy `bundle` with `version`
    pub fn with_version(mut self, bundle: impl Into<String>, version: impl Into<String>) -> Self {
        self.versions.insert(bundle.into(), version.into());
        self
    }

    #[cfg(test)]
    /// Restart answers, consumed in order; `Skip` once exhausted
    pub fn with_restart_answers(mut self, answers: Vec<RestartAction>) -> Self {
        self.restart_answers = answers.into();
        self
    }

    #[cfg(test)]
    /// Refuse the deployment confirmation
    pub fn declining(mut self) -> Self {
        self.decline = true;
        self
    }

    #[cfg(test)]
    /// Answer the runtime home question with `home` instead of the default
    pub fn with_runtime_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.runtime_home = Some(home.into());
        self
    }

    #[cfg(test)]
    /// Accept the git commit question
    pub fn approving_commit(mut self) -> Self {
        self.approve_commit = true;
        self
    }

    #[cfg(test)]
    pub fn info_shown(&self) -> usize {
        self.info_shown
    }
}

impl Prompter for ScriptedPrompter {
    fn choose_runtime_home(&mut self, _os: OsKind, detected: &Path) -> Result<PathBuf> {
        Ok(self
            .runtime_home
            .clone()
            .unwrap_or_else(|| detected.to_path_buf()))
    }

    fn select_bundles(&mut self, eligible: &[Bundle]) -> Result<Vec<String>> {
        Ok(match &self.selection {
            Some(names) => names.clone(),
            None => eligible.iter().map(|b| b.name.clone()).collect(),
        })
    }

    fn confirm_deploy(&mut self, _bundles: &[Bundle]) -> Result<bool> {
        Ok(!self.decline)
    }

    fn choose_version(&mut self, bundle: &Bundle, current: &str) -> Result<String> {
        Ok(self
            .versions
            .get(&bundle.name)
            .cloned()
            .unwrap_or_else(|| current.to_string()))
    }

    fn restart_choice(&mut self, _deployed: &[String]) -> Result<RestartAction> {
        Ok(self.restart_answers.pop_front().unwrap_or(RestartAction::Skip))
    }

    fn show_restart_info(&mut self) {
        self.info_shown += 1;
    }

    fn confirm_git_commit(&mut self, _deployed: &[String]) -> Result<bool> {
        Ok(self.approve_commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundles() -> Vec<Bundle> {
        ["appA", "appB"]
            .iter()
            .map(|n| Bundle::new(*n, PathBuf::from("/staging").join(n)))
            .collect()
    }

    #[test]
    fn test_scripted_selects_everything_by_default() {
        let mut prompter = ScriptedPrompter::new();
        assert_eq!(prompter.select_bundles(&bundles()).unwrap(), ["appA", "appB"]);
        assert!(prompter.confirm_deploy(&bundles()).unwrap());
    }

    #[test]
    fn test_scripted_selection_and_versions() {
        let mut prompter = ScriptedPrompter::new()
            .with_selection(vec!["appB".to_string()])
            .with_version("appB", "2.0.0");
        let all = bundles();
        assert_eq!(prompter.select_bundles(&all).unwrap(), ["appB"]);
        assert_eq!(prompter.choose_version(&all[1], "1.0.0").unwrap(), "2.0.0");
        assert_eq!(prompter.choose_version(&all[0], "1.0.0").unwrap(), "1.0.0");
    }

    #[test]
    fn test_scripted_restart_answers_run_out_to_skip() {
        let mut prompter = ScriptedPrompter::new().with_restart_answers(vec![RestartAction::Restart]);
        assert_eq!(prompter.restart_choice(&[]).unwrap(), RestartAction::Restart);
        assert_eq!(prompter.restart_choice(&[]).unwrap(), RestartAction::Skip);
    }

    #[test]
    fn test_scripted_declining() {
        let mut prompter = ScriptedPrompter::new().declining();
        assert!(!prompter.confirm_deploy(&bundles()).unwrap());
    }

    #[test]
    fn test_scripted_runtime_home_defaults_to_detected() {
        let detected = Path::new("/opt/splunk");
        let mut prompter = ScriptedPrompter::new();
        assert_eq!(prompter.choose_runtime_home(OsKind::Linux, detected).unwrap(), detected);

        let mut prompter = ScriptedPrompter::new().with_runtime_home("/srv/runtime");
        assert_eq!(
            prompter.choose_runtime_home(OsKind::Linux, detected).unwrap(),
            PathBuf::from("/srv/runtime")
        );
    }

    #[test]
    fn test_scripted_git_commit_declined_unless_approved() {
        let deployed = ["appA".to_string()];
        assert!(!ScriptedPrompter::new().confirm_git_commit(&deployed).unwrap());
        assert!(ScriptedPrompter::new().approving_commit().confirm_git_commit(&deployed).unwrap());
    }
}
