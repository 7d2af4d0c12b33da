//! Command implementations for the appdeploy CLI

pub mod backups;
pub mod completions;
pub mod deploy;
pub mod list;
pub mod restore;
pub mod version;

use std::io::IsTerminal;
use std::path::PathBuf;

use crate::config::{Overrides, Settings};
use crate::error::Result;
use crate::platform::Platform;

/// Options that apply to every command
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub verbose: bool,
}

impl GlobalOptions {
    /// Resolve settings for this invocation on the running platform
    pub fn settings(&self, overrides: &Overrides) -> Result<(Platform, Settings)> {
        let platform = Platform::detect();
        let settings = Settings::load(self.config.as_deref(), overrides, &platform)?;
        tracing::debug!(?settings, os = platform.os.label(), "settings resolved");
        Ok((platform, settings))
    }
}

/// Whether prompts can be shown
pub fn is_interactive(yes: bool) -> bool {
    !yes && std::io::stdin().is_terminal()
}
