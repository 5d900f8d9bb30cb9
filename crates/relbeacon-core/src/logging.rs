//! Logging setup.
//!
//! `watch` runs for hours, so it logs to `~/.local/state/relbeacon/relbeacon.log`
//! and keeps stdout for release summaries. One-shot commands log to stderr.
//! `RELBEACON_LOG` takes an `EnvFilter` directive and overrides `-v`.

use anyhow::{anyhow, Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a filter directive, e.g. `relbeacon_core=trace`.
pub const LOG_ENV: &str = "RELBEACON_LOG";

pub const LOG_FILE_NAME: &str = "relbeacon.log";

const FALLBACK_FILTER: &str = "warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// Append to the log file in the state directory.
    File,
    Stderr,
}

/// Filter directive for `target` at `verbosity` (number of `-v` flags).
/// A non-blank `env` value wins outright.
pub fn filter_directive(target: LogTarget, verbosity: u8, env: Option<&str>) -> String {
    if let Some(env) = env.map(str::trim).filter(|e| !e.is_empty()) {
        return env.to_string();
    }
    // The log file starts two levels more verbose than the terminal.
    let level = match target {
        LogTarget::File => verbosity.saturating_add(2),
        LogTarget::Stderr => verbosity,
    };
    match level {
        0 => "warn",
        1 => "info",
        2 => "info,relbeacon_core=debug,relbeacon=debug",
        _ => "debug",
    }
    .to_string()
}

/// Opens `dir/relbeacon.log` for appending, creating `dir` if needed.
pub fn open_log_file_in(dir: &Path) -> Result<(PathBuf, File)> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening {}", path.display()))?;
    Ok((path, file))
}

/// Installs the global subscriber. Returns the target actually used: file
/// logging degrades to stderr when the state directory is unusable.
pub fn init(target: LogTarget, verbosity: u8) -> Result<LogTarget> {
    let env = std::env::var(LOG_ENV).ok();

    if target == LogTarget::File {
        let opened = crate::config::state_dir().and_then(|dir| open_log_file_in(&dir));
        match opened {
            Ok((path, file)) => {
                let directive = filter_directive(LogTarget::File, verbosity, env.as_deref());
                install(&directive, Mutex::new(file), false)?;
                tracing::info!(path = %path.display(), "relbeacon logging initialized");
                return Ok(LogTarget::File);
            }
            Err(err) => {
                let directive = filter_directive(LogTarget::Stderr, verbosity, env.as_deref());
                install(&directive, std::io::stderr, std::io::stderr().is_terminal())?;
                tracing::warn!("file logging unavailable, using stderr: {:#}", err);
                return Ok(LogTarget::Stderr);
            }
        }
    }

    let directive = filter_directive(LogTarget::Stderr, verbosity, env.as_deref());
    install(&directive, std::io::stderr, std::io::stderr().is_terminal())?;
    Ok(LogTarget::Stderr)
}

fn install<W>(directive: &str, writer: W, ansi: bool) -> Result<()>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let (filter, rejected) = match EnvFilter::try_new(directive) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new(FALLBACK_FILTER), Some(e)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .try_init()
        .map_err(|e| anyhow!("installing log subscriber: {e}"))?;
    if let Some(e) = rejected {
        tracing::warn!(directive, error = %e, "invalid {LOG_ENV} directive, using warn");
    }
    Ok(())
}
