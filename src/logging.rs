//! Tracing setup
//!
//! Diagnostics go to stderr, filtered by `APPDEPLOY_LOG` (default `warn`,
//! `debug` with `--verbose`). Commands that change the target also append an
//! `info`-level run log to `<log_dir>/deployment_<YYYYMMDD_HHMMSS>.log`.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{self, Result};

/// Environment variable holding the stderr filter directive
pub const LOG_ENV: &str = "APPDEPLOY_LOG";

/// Run log file name for a given start time
pub fn run_log_name(at: chrono::NaiveDateTime) -> String {
    format!("deployment_{}.log", at.format("%Y%m%d_%H%M%S"))
}

fn stderr_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }))
}

/// Install the global subscriber
///
/// With `run_log_dir`, the directory is created and the run log path returned.
pub fn init(verbose: bool, run_log_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let mut run_log = None;
    let file_layer = match run_log_dir {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|e| error::fs::write_failed(dir, &e))?;
            let path = dir.join(run_log_name(Local::now().naive_local()));
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| error::fs::write_failed(&path, &e))?;
            run_log = Some(path);
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(LevelFilter::INFO),
            )
        }
        None => None,
    };

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter(verbose));

    // A subscriber may already be installed when commands run inside tests.
    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    Ok(run_log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    #[test]
    fn test_run_log_name() {
        let at = NaiveDateTime::parse_from_str("20240315_081500", "%Y%m%d_%H%M%S").unwrap();
        assert_eq!(run_log_name(at), "deployment_20240315_081500.log");
    }

    #[test]
    fn test_init_creates_run_log() {
        let temp = crate::test_fixtures::create_temp_dir();
        let dir = temp.path().join("logs");
        let path = init(false, Some(&dir)).unwrap().unwrap();
        assert!(path.starts_with(&dir));
        assert!(path.is_file());
    }
}
