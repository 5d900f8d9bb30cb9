//! CLI for relbeacon.

mod commands;
mod sinks;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use relbeacon_core::config;
use relbeacon_core::logging::LogTarget;
use std::path::PathBuf;

use commands::{run_config_path, run_download, run_resolve, run_validate, run_watch};

/// Top-level CLI for relbeacon.
#[derive(Debug, Parser)]
#[command(name = "relbeacon")]
#[command(
    about = "relbeacon: resolve, validate and publish the latest installable release",
    long_about = None
)]
pub struct Cli {
    /// Read configuration from this file instead of the XDG default.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// More log output (-v info, -vv debug). RELBEACON_LOG overrides this.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Check candidate download URLs and pick the best one.
    Validate {
        /// URLs to check, in priority order. Defaults to the configured fallback URLs.
        urls: Vec<String>,
        /// Print the full ranking as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Resolve the current release once through the source chain.
    Resolve {
        /// Print the release as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Download the release artifact, falling back to mirrors on failure.
    Download {
        /// Artifact URL. Defaults to the currently resolved release.
        url: Option<String>,
        /// Directory to save into (created if missing).
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
    },

    /// Keep the published code up to date until interrupted.
    Watch {
        /// Run a single refresh (with retries) and exit.
        #[arg(long)]
        once: bool,
        /// Write render requests here instead of the state directory.
        #[arg(long, value_name = "PATH")]
        surface: Option<PathBuf>,
    },

    /// Print the configuration file location.
    ConfigPath,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        if let CliCommand::ConfigPath = self.command {
            return run_config_path(self.config.as_deref());
        }

        let cfg = match self.config.as_deref() {
            Some(path) => config::load_from_path(path)?,
            None => config::load_or_init()?,
        };
        tracing::debug!("loaded config: {:?}", cfg);

        match self.command {
            CliCommand::Validate { urls, json } => run_validate(&cfg, urls, json).await?,
            CliCommand::Resolve { json } => run_resolve(&cfg, json).await?,
            CliCommand::Download { url, out } => run_download(&cfg, url, out).await?,
            CliCommand::Watch { once, surface } => run_watch(&cfg, once, surface).await?,
            CliCommand::ConfigPath => {}
        }

        Ok(())
    }
}

impl CliCommand {
    /// `watch` logs to the state directory; everything else to stderr.
    pub fn log_target(&self) -> LogTarget {
        match self {
            CliCommand::Watch { .. } => LogTarget::File,
            _ => LogTarget::Stderr,
        }
    }
}

#[cfg(test)]
mod tests;
