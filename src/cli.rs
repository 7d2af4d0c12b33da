//! CLI definitions using clap derive API

use clap::builder::{Styles, styling::AnsiColor};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Overrides;
use crate::restart::RestartPolicy;

/// appdeploy - bundle deployment with backups and verification
#[derive(Parser, Debug)]
#[command(
    name = "appdeploy",
    author,
    version,
    color = clap::ColorChoice::Always,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Deploy application bundles from a staging directory into a runtime",
    long_about = "appdeploy validates application bundles in a staging directory, backs up \
                  any deployed copy, replaces it, and verifies the result. Every replaced \
                  bundle can be restored from its backup archive.",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n    \
                  appdeploy list\n    \
                  appdeploy deploy\n    \
                  appdeploy deploy --select my_app --yes --no-restart\n    \
                  appdeploy backups my_app\n    \
                  appdeploy restore backups/my_app_20240101_120000.zip"
)]
pub struct Cli {
    /// Settings file (defaults to ./appdeploy.yaml, then the user config directory)
    #[arg(long, short = 'c', global = true, env = "APPDEPLOY_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy bundles from the staging directory
    Deploy(DeployArgs),

    /// List bundles in the staging directory
    List(ListArgs),

    /// List backup archives
    Backups(BackupsArgs),

    /// Restore a bundle from a backup archive
    Restore(RestoreArgs),

    /// Show version information
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Directory locations shared by all commands
#[derive(Args, Debug, Default)]
pub struct LocationArgs {
    /// Staging directory holding one subdirectory per bundle
    #[arg(long, env = "APPDEPLOY_STAGING_DIR", value_name = "DIR")]
    pub staging: Option<PathBuf>,

    /// Runtime installation directory
    #[arg(long, env = "APPDEPLOY_RUNTIME_HOME", value_name = "DIR")]
    pub runtime_home: Option<PathBuf>,

    /// Directory bundles are deployed into (defaults to <runtime-home>/etc/apps)
    #[arg(long, env = "APPDEPLOY_TARGET_DIR", value_name = "DIR")]
    pub target: Option<PathBuf>,

    /// Directory for backup archives
    #[arg(long, env = "APPDEPLOY_BACKUP_DIR", value_name = "DIR")]
    pub backup_dir: Option<PathBuf>,

    /// Directory for run logs
    #[arg(long, env = "APPDEPLOY_LOG_DIR", value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

impl LocationArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            staging_dir: self.staging.clone(),
            runtime_home: self.runtime_home.clone(),
            target_dir: self.target.clone(),
            backup_dir: self.backup_dir.clone(),
            log_dir: self.log_dir.clone(),
            ..Overrides::default()
        }
    }
}

/// Arguments for the deploy command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Choose bundles and versions interactively:\n    appdeploy deploy\n\n\
                  Deploy one bundle without prompts:\n    appdeploy deploy --select my_app --yes\n\n\
                  Deploy everything with a new version for one bundle:\n    appdeploy deploy --all --set-version my_app=1.2.0 --yes\n\n\
                  Deploy and restart the runtime:\n    appdeploy deploy --select my_app --yes --restart\n\n\
                  Write a JSON report for CI:\n    appdeploy deploy --all --yes --no-restart --report report.json\n\n\
                  Deploy and record the bundles in git:\n    appdeploy deploy --all --yes --no-restart --git-commit")]
pub struct DeployArgs {
    #[command(flatten)]
    pub locations: LocationArgs,

    /// Bundles to deploy
    #[arg(long, value_name = "NAME", num_args = 1.., conflicts_with = "all")]
    pub select: Vec<String>,

    /// Deploy every eligible bundle
    #[arg(long)]
    pub all: bool,

    /// Deploy a bundle with a new version (repeatable)
    #[arg(long, value_name = "NAME=VERSION", value_parser = parse_version_assignment)]
    pub set_version: Vec<(String, String)>,

    /// Run without prompts
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Restart the runtime after deploying
    #[arg(long, conflicts_with = "no_restart")]
    pub restart: bool,

    /// Never restart the runtime
    #[arg(long)]
    pub no_restart: bool,

    /// Seconds to wait for the runtime restart
    #[arg(long, env = "APPDEPLOY_RESTART_TIMEOUT", value_name = "SECS")]
    pub restart_timeout: Option<u64>,

    /// Glob of entries to leave out of the copy (repeatable; nothing is excluded by default)
    #[arg(long, value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Write the run report as JSON
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Commit the deployed bundles in the staging git repository without asking
    #[arg(long)]
    pub git_commit: bool,
}

impl DeployArgs {
    pub fn overrides(&self) -> Overrides {
        let restart = if self.restart {
            Some(RestartPolicy::Always)
        } else if self.no_restart {
            Some(RestartPolicy::Never)
        } else {
            None
        };
        Overrides {
            restart,
            restart_timeout_secs: self.restart_timeout,
            exclude: (!self.exclude.is_empty()).then(|| self.exclude.clone()),
            ..self.locations.overrides()
        }
    }
}

fn parse_version_assignment(s: &str) -> Result<(String, String), String> {
    let (name, version) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VERSION, got '{s}'"))?;
    let (name, version) = (name.trim(), version.trim());
    if name.is_empty() || version.is_empty() {
        return Err(format!("expected NAME=VERSION, got '{s}'"));
    }
    Ok((name.to_string(), version.to_string()))
}

/// Arguments for the list command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  List staged bundles:\n    appdeploy list\n\n\
                  List bundles from another staging directory as JSON:\n    appdeploy list --staging ./release --json")]
pub struct ListArgs {
    #[command(flatten)]
    pub locations: LocationArgs,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the backups command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  List all backups:\n    appdeploy backups\n\n\
                  List backups of one bundle:\n    appdeploy backups my_app")]
pub struct BackupsArgs {
    /// Only show backups of this bundle
    pub name: Option<String>,

    #[command(flatten)]
    pub locations: LocationArgs,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the restore command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Restore a bundle:\n    appdeploy restore backups/my_app_20240101_120000.zip\n\n\
                  Restore without confirmation:\n    appdeploy restore backups/my_app_20240101_120000.zip -y")]
pub struct RestoreArgs {
    /// Backup archive to restore
    pub archive: PathBuf,

    #[command(flatten)]
    pub locations: LocationArgs,

    /// Skip confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

/// Arguments for completions command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Generate bash completions:\n    appdeploy completions --shell bash > ~/.bash_completion.d/appdeploy\n\n\
                  Generate zsh completions:\n    appdeploy completions --shell zsh > ~/.zfunc/_appdeploy\n\n\
                  Generate fish completions:\n    appdeploy completions --shell fish > ~/.config/fish/completions/appdeploy.fish")]
pub struct CompletionsArgs {
    /// Shell type (bash, elvish, fish, powershell, zsh)
    #[arg(long)]
    pub shell: String,
}
