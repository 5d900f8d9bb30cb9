//! Refresh scheduling: periodic ticks plus visibility, connectivity and
//! manual triggers, all funnelled into [`ReleaseResolver::refresh`].
//!
//! Each refresh runs on its own task so the resolver's re-entrancy guard
//! decides what overlaps; missed triggers are dropped, never queued. Retries
//! after a failed pass are slept here, not in the resolver, and ticks or
//! settled triggers that land while a retry is pending are dropped so they
//! do not use up the retry budget. Shutdown stops ticks and pending retries;
//! a refresh already in flight finishes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::BeaconConfig;
use crate::resolver::{RefreshOutcome, RefreshPhase, ReleaseResolver};

const MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(1);

/// External event that may cause a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Same as a timer tick.
    Tick,
    /// The display went into the background.
    Hidden,
    /// The display came back; refreshes if it was hidden long enough.
    Visible,
    /// Connectivity restored.
    Online,
    /// Connectivity lost. Logged only.
    Offline,
    /// Manual refresh; resets the retry counter first.
    Force,
}

#[derive(Debug, Clone, Copy)]
pub struct DriverConfig {
    pub update_interval: Duration,
    pub staleness_threshold: Duration,
    pub visibility_settle: Duration,
    pub online_settle: Duration,
}

impl From<&BeaconConfig> for DriverConfig {
    fn from(cfg: &BeaconConfig) -> Self {
        Self {
            update_interval: cfg.update_interval(),
            staleness_threshold: cfg.staleness_threshold(),
            visibility_settle: cfg.visibility_settle(),
            online_settle: cfg.online_settle(),
        }
    }
}

pub struct RefreshDriver {
    resolver: Arc<ReleaseResolver>,
    config: DriverConfig,
}

/// Control side of a running [`RefreshDriver`].
pub struct DriverHandle {
    triggers: mpsc::UnboundedSender<Trigger>,
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl DriverHandle {
    /// Returns false once the driver has stopped.
    pub fn trigger(&self, trigger: Trigger) -> bool {
        self.triggers.send(trigger).is_ok()
    }

    /// Cancels the timer and pending retries, then waits for the loop to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.join.await {
            tracing::warn!(error = %err, "refresh driver task ended abnormally");
        }
    }
}

impl RefreshDriver {
    pub fn new(resolver: Arc<ReleaseResolver>, config: DriverConfig) -> Self {
        Self { resolver, config }
    }

    /// Starts the loop on the current runtime. The first tick refreshes
    /// immediately.
    pub fn spawn(self) -> DriverHandle {
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(trigger_rx, shutdown_rx));
        DriverHandle {
            triggers: trigger_tx,
            shutdown: shutdown_tx,
            join,
        }
    }

    async fn run(
        self,
        mut triggers: mpsc::UnboundedReceiver<Trigger>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let period = if self.config.update_interval < MIN_UPDATE_INTERVAL {
            tracing::warn!(
                configured_ms = self.config.update_interval.as_millis() as u64,
                "update interval too short, using 1s"
            );
            MIN_UPDATE_INTERVAL
        } else {
            self.config.update_interval
        };
        tracing::info!(interval_ms = period.as_millis() as u64, "starting periodic updates");

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut hidden_since: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                Some(trigger) = triggers.recv() => {
                    self.handle(trigger, &mut hidden_since, &shutdown);
                }
                _ = ticker.tick() => {
                    tracing::debug!("periodic update check");
                    self.spawn_refresh(Duration::ZERO, false, &shutdown);
                }
            }
        }
        tracing::info!("periodic updates stopped");
    }

    fn handle(
        &self,
        trigger: Trigger,
        hidden_since: &mut Option<Instant>,
        shutdown: &watch::Receiver<bool>,
    ) {
        match trigger {
            Trigger::Tick => self.spawn_refresh(Duration::ZERO, false, shutdown),
            Trigger::Force => self.spawn_refresh(Duration::ZERO, true, shutdown),
            Trigger::Hidden => *hidden_since = Some(Instant::now()),
            Trigger::Visible => match hidden_since.take() {
                Some(since) if since.elapsed() > self.config.staleness_threshold => {
                    tracing::info!(
                        hidden_secs = since.elapsed().as_secs(),
                        "visible again after a long absence, checking for updates"
                    );
                    self.spawn_refresh(self.config.visibility_settle, false, shutdown);
                }
                Some(_) => tracing::debug!("visible again, state still fresh"),
                None => tracing::debug!("visible without a prior hidden event"),
            },
            Trigger::Online => {
                tracing::info!("connection restored, checking for updates");
                self.spawn_refresh(self.config.online_settle, false, shutdown);
            }
            Trigger::Offline => tracing::info!("connection lost, updates paused"),
        }
    }

    fn spawn_refresh(&self, settle: Duration, force: bool, shutdown: &watch::Receiver<bool>) {
        tokio::spawn(refresh_task(
            self.resolver.clone(),
            settle,
            force,
            shutdown.clone(),
        ));
    }
}

async fn refresh_task(
    resolver: Arc<ReleaseResolver>,
    settle: Duration,
    force: bool,
    mut shutdown: watch::Receiver<bool>,
) {
    if !settle.is_zero() && !sleep_unless_shutdown(settle, &mut shutdown).await {
        return;
    }
    if let (false, RefreshPhase::Backoff(attempt)) = (force, resolver.phase()) {
        tracing::debug!(attempt, "retry pending, skipping scheduled refresh");
        return;
    }
    let mut outcome = if force {
        resolver.force_refresh().await
    } else {
        resolver.refresh().await
    };
    while let RefreshOutcome::RetryScheduled { attempt, delay } = outcome {
        tracing::debug!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "waiting before retry"
        );
        if !sleep_unless_shutdown(delay, &mut shutdown).await {
            return;
        }
        outcome = resolver.refresh().await;
    }
}

/// False if shutdown was requested before `delay` elapsed.
async fn sleep_unless_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = shutdown.changed() => false,
    }
}
