//! appdeploy - application bundle deployment
//!
//! Deploys self-contained bundles from a staging directory into a runtime's
//! bundle directory. Every replaced bundle is archived first, and every copy
//! is verified against the staged tree.

use clap::Parser;

mod backup;
mod bundle;
mod cli;
mod commands;
mod conf;
mod config;
mod copier;
mod error;
mod git;
mod hash;
mod logging;
mod pipeline;
mod platform;
mod restart;
mod ui;
mod validator;
mod version;

#[cfg(test)]
mod test_fixtures;

use cli::{Cli, Commands};
use commands::GlobalOptions;

fn main() {
    let cli = Cli::parse();
    let global = GlobalOptions {
        config: cli.config,
        verbose: cli.verbose,
    };

    let result = match cli.command {
        Commands::Deploy(args) => commands::deploy::run(&global, args),
        Commands::List(args) => commands::list::run(&global, args).map(|()| 0),
        Commands::Backups(args) => commands::backups::run(&global, args).map(|()| 0),
        Commands::Restore(args) => commands::restore::run(&global, args).map(|()| 0),
        Commands::Version => commands::version::run().map(|()| 0),
        Commands::Completions(args) => commands::completions::run(args).map(|()| 0),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
