//! `relbeacon watch` – keep the published code fresh until Ctrl-C.
//!
//! Besides the periodic timer, one command per stdin line is accepted:
//! `refresh`, `hidden`, `visible`, `online`, `offline`, `status`.

use anyhow::{bail, Result};
use relbeacon_core::config::BeaconConfig;
use relbeacon_core::driver::{DriverConfig, DriverHandle, RefreshDriver, Trigger};
use relbeacon_core::net::CurlClient;
use relbeacon_core::resolver::{RefreshOutcome, ReleaseResolver};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::sinks::{default_surface, ConsoleView, PayloadRenderer};

/// A line typed on stdin while watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WatchCommand {
    Trigger(Trigger),
    Status,
}

pub(crate) fn parse_command(line: &str) -> Option<WatchCommand> {
    let cmd = match line.trim().to_ascii_lowercase().as_str() {
        "refresh" | "r" => WatchCommand::Trigger(Trigger::Force),
        "hidden" => WatchCommand::Trigger(Trigger::Hidden),
        "visible" => WatchCommand::Trigger(Trigger::Visible),
        "online" => WatchCommand::Trigger(Trigger::Online),
        "offline" => WatchCommand::Trigger(Trigger::Offline),
        "status" | "s" => WatchCommand::Status,
        _ => return None,
    };
    Some(cmd)
}

pub async fn run_watch(cfg: &BeaconConfig, once: bool, surface: Option<PathBuf>) -> Result<()> {
    let surface = match surface {
        Some(path) => path,
        None => default_surface()?,
    };
    let renderer = Arc::new(PayloadRenderer::new(surface));
    println!("Render surface: {}", renderer.surface().display());

    let client = Arc::new(CurlClient::new(cfg.request_timeout()));
    let resolver = Arc::new(ReleaseResolver::from_config(
        cfg,
        client,
        renderer,
        Arc::new(ConsoleView),
    ));

    if once {
        return refresh_until_settled(&resolver).await;
    }

    let handle = RefreshDriver::new(resolver.clone(), DriverConfig::from(cfg)).spawn();
    tracing::info!("watching for new releases");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(err) = res {
                    tracing::warn!("ctrl-c handler failed: {}", err);
                }
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => dispatch(&line, &handle, &resolver),
                Ok(None) => stdin_open = false,
                Err(err) => {
                    tracing::warn!("reading stdin: {}", err);
                    stdin_open = false;
                }
            },
        }
    }

    println!("Stopping...");
    handle.shutdown().await;
    Ok(())
}

fn dispatch(line: &str, handle: &DriverHandle, resolver: &ReleaseResolver) {
    match parse_command(line) {
        Some(WatchCommand::Trigger(trigger)) => {
            if !handle.trigger(trigger) {
                tracing::warn!(?trigger, "refresh driver is not running");
            }
        }
        Some(WatchCommand::Status) => {
            let s = resolver.status();
            let version = s
                .current_release
                .as_ref()
                .map(|r| r.version.as_str())
                .unwrap_or("-");
            let last = s
                .last_refresh_at
                .map(|t| humantime::format_rfc3339_seconds(t).to_string())
                .unwrap_or_else(|| "never".to_string());
            println!(
                "phase={:?} refreshing={} retries={} version={} last_refresh={}",
                s.phase, s.is_refreshing, s.retry_count, version, last
            );
        }
        None if line.trim().is_empty() => {}
        None => println!("unknown command: {}", line.trim()),
    }
}

/// Single refresh for `--once`, sleeping through scheduled retries.
async fn refresh_until_settled(resolver: &ReleaseResolver) -> Result<()> {
    let mut outcome = resolver.refresh().await;
    while let RefreshOutcome::RetryScheduled { attempt, delay } = outcome {
        println!("Retry {} in {}s", attempt, delay.as_secs_f32());
        tokio::time::sleep(delay).await;
        outcome = resolver.refresh().await;
    }
    tracing::debug!(?outcome, "single refresh finished");
    if outcome == RefreshOutcome::RenderFailed {
        bail!("release resolved but the code could not be rendered");
    }
    Ok(())
}
