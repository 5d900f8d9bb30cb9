//! Release resolution and the refresh state machine.
//!
//! [`ReleaseResolver::resolve`] walks the source chain in priority order and
//! falls back to the static source. [`ReleaseResolver::refresh`] wraps one
//! resolution in the re-entrancy guard, confirms the download URL with the
//! validator, diffs against the current release and pushes changes to the
//! renderer and view. A fully failed chain moves the machine into
//! `Backoff(n)`; the caller (see `driver`) owns the actual sleeping.

mod backoff;
mod guard;
mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use crate::config::{BeaconConfig, FallbackRelease};
use crate::error::{ResolveError, SourceError};
use crate::net::HttpClient;
use crate::release::{BuildVariant, ReleaseInfo, SourceKind, UNKNOWN_VERSION};
use crate::sink::{RenderOptions, Renderer, View, ViewStatus};
use crate::sources::{
    LocalManifestSource, ManifestLocation, ReleaseSource, RemoteApiSource, StaticFallbackSource,
};
use crate::validator::{ArtifactValidator, ValidateOptions};

pub use backoff::{BackoffPolicy, RetryDecision};
pub use state::{RefreshPhase, StatusSnapshot};

use guard::RefreshGuard;
use state::ResolverState;

/// What one call to [`ReleaseResolver::refresh`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Another refresh was in flight; nothing happened.
    Skipped,
    /// Same version and URL as before; renderer and view untouched.
    Unchanged,
    /// A new release was rendered and pushed to the view.
    Updated,
    /// A new release was resolved but the code could not be rendered. It is
    /// not committed, so the next refresh renders again.
    RenderFailed,
    /// The source chain failed; the caller should refresh again after `delay`.
    RetryScheduled { attempt: u32, delay: Duration },
    /// Retries exhausted; the built-in fallback release is on display.
    Failed,
}

pub struct ReleaseResolver {
    sources: Vec<Arc<dyn ReleaseSource>>,
    fallback: Arc<dyn ReleaseSource>,
    validator: Arc<ArtifactValidator>,
    renderer: Arc<dyn Renderer>,
    view: Arc<dyn View>,
    backoff: BackoffPolicy,
    render_options: RenderOptions,
    validate_options: ValidateOptions,
    refreshing: AtomicBool,
    state: Mutex<ResolverState>,
}

impl ReleaseResolver {
    /// `sources` are tried in order; `fallback` is consulted last.
    pub fn new(
        sources: Vec<Arc<dyn ReleaseSource>>,
        fallback: Arc<dyn ReleaseSource>,
        validator: Arc<ArtifactValidator>,
        renderer: Arc<dyn Renderer>,
        view: Arc<dyn View>,
    ) -> Self {
        Self {
            sources,
            fallback,
            validator,
            renderer,
            view,
            backoff: BackoffPolicy::default(),
            render_options: RenderOptions::default(),
            validate_options: ValidateOptions::default(),
            refreshing: AtomicBool::new(false),
            state: Mutex::new(ResolverState::default()),
        }
    }

    /// Standard chain: release API, then build manifest, then the configured
    /// static release.
    pub fn from_config(
        cfg: &BeaconConfig,
        client: Arc<dyn HttpClient>,
        renderer: Arc<dyn Renderer>,
        view: Arc<dyn View>,
    ) -> Self {
        let timeout = cfg.request_timeout();
        let sources: Vec<Arc<dyn ReleaseSource>> = vec![
            Arc::new(RemoteApiSource::new(
                client.clone(),
                &cfg.api_base,
                &cfg.github_repo,
                timeout,
            )),
            Arc::new(LocalManifestSource::new(
                client.clone(),
                ManifestLocation::parse(&cfg.manifest_location),
                &cfg.app_name,
                timeout,
            )),
        ];
        let fallback = Arc::new(StaticFallbackSource::new(cfg.fallback_release()));
        let validator = Arc::new(ArtifactValidator::new(client, timeout));

        Self::new(sources, fallback, validator, renderer, view)
            .with_backoff(BackoffPolicy::from(&cfg.retry_config()))
            .with_render_options(cfg.render_options())
            .with_validate_options(ValidateOptions {
                max_cache_age: cfg.validation_cache_max_age(),
            })
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = options;
        self
    }

    pub fn with_validate_options(mut self, options: ValidateOptions) -> Self {
        self.validate_options = options;
        self
    }

    fn state(&self) -> MutexGuard<'_, ResolverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> RefreshPhase {
        self.state().phase
    }

    pub fn validator(&self) -> &Arc<ArtifactValidator> {
        &self.validator
    }

    pub fn current_release(&self) -> Option<ReleaseInfo> {
        self.state().current_release.clone()
    }

    pub fn status(&self) -> StatusSnapshot {
        self.state()
            .snapshot(self.refreshing.load(Ordering::Acquire))
    }

    /// Tries each source in order, then the fallback source. Only fails if
    /// the fallback itself does.
    pub async fn resolve(&self) -> Result<ReleaseInfo, ResolveError> {
        for source in &self.sources {
            match source.fetch_release().await {
                Ok(info) if info.is_usable() => {
                    tracing::debug!(
                        source = ?source.kind(),
                        version = %info.version,
                        "release resolved"
                    );
                    return Ok(info);
                }
                Ok(_) => {
                    tracing::warn!(
                        source = ?source.kind(),
                        "release source returned no download url, trying next"
                    )
                }
                Err(err) => {
                    tracing::warn!(
                        source = ?source.kind(),
                        error = %err,
                        "release source failed, trying next"
                    )
                }
            }
        }

        let last = match self.fallback.fetch_release().await {
            Ok(info) if info.is_usable() => {
                tracing::info!(version = %info.version, "using static fallback release");
                return Ok(info);
            }
            Ok(_) => SourceError::Fallback("fallback release has no download url".to_string()),
            Err(err) => err,
        };
        tracing::error!(error = %last, "every release source failed");
        Err(ResolveError::SourceExhausted { last })
    }

    /// One pass of the state machine. Concurrent calls while a pass is in
    /// flight return [`RefreshOutcome::Skipped`] immediately.
    pub async fn refresh(&self) -> RefreshOutcome {
        let Some(_guard) = RefreshGuard::try_acquire(&self.refreshing) else {
            tracing::debug!("refresh already in progress, skipping");
            return RefreshOutcome::Skipped;
        };

        self.state().phase = RefreshPhase::Refreshing;
        self.view
            .show_status(ViewStatus::Loading, "Checking for the latest release...");

        match self.resolve().await {
            Ok(release) => self.apply(release).await,
            Err(err) => self.handle_exhausted(&err),
        }
    }

    /// Clears the retry counter, then refreshes.
    pub async fn force_refresh(&self) -> RefreshOutcome {
        tracing::info!("forced refresh requested");
        self.state().retry_count = 0;
        self.refresh().await
    }

    async fn apply(&self, release: ReleaseInfo) -> RefreshOutcome {
        // The resolved URL stays authoritative whatever validation says.
        let validation = self
            .validator
            .validate(&release.download_url, self.validate_options)
            .await;
        if !validation.is_reachable {
            tracing::warn!(
                url = %release.download_url,
                "resolved download url did not validate, keeping it"
            );
        }

        let unchanged = {
            let mut state = self.state();
            state.last_validation = Some(validation);
            state.last_refresh_at = Some(SystemTime::now());
            state.retry_count = 0;
            state.phase = RefreshPhase::Idle;
            state
                .current_release
                .as_ref()
                .is_some_and(|current| current.same_release(&release))
        };

        if unchanged {
            tracing::debug!(version = %release.version, "release unchanged");
            self.view
                .show_status(ViewStatus::Success, "No changes since the last check");
            return RefreshOutcome::Unchanged;
        }

        if let Err(err) = self
            .renderer
            .render(&release.download_url, &self.render_options)
        {
            tracing::warn!(url = %release.download_url, error = %err, "code rendering failed");
            self.view.show_release(&release);
            self.view.show_status(ViewStatus::Error, &err.to_string());
            return RefreshOutcome::RenderFailed;
        }

        tracing::info!(
            version = %release.version,
            url = %release.download_url,
            source = ?release.source_kind,
            "release updated"
        );
        self.view.show_release(&release);
        self.view.show_status(
            ViewStatus::Success,
            &format!("Release {} ready to download", release.version),
        );
        self.state().current_release = Some(release);
        RefreshOutcome::Updated
    }

    fn handle_exhausted(&self, err: &ResolveError) -> RefreshOutcome {
        let attempt = {
            let mut state = self.state();
            state.retry_count = state.retry_count.saturating_add(1);
            state.retry_count
        };

        match self.backoff.decide(attempt) {
            RetryDecision::RetryAfter(delay) => {
                tracing::warn!(
                    error = %err,
                    attempt,
                    max_retries = self.backoff.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "refresh failed, retry scheduled"
                );
                self.state().phase = RefreshPhase::Backoff(attempt);
                self.view.show_status(
                    ViewStatus::Error,
                    "Could not load release information. Retrying...",
                );
                RefreshOutcome::RetryScheduled { attempt, delay }
            }
            RetryDecision::GiveUp => {
                tracing::error!(
                    error = %err,
                    attempt,
                    "retries exhausted, showing built-in fallback"
                );
                let release = last_resort_release(SystemTime::now());
                let rendered = self
                    .renderer
                    .render(&release.download_url, &self.render_options);
                self.view.show_release(&release);
                self.view.show_status(
                    ViewStatus::Error,
                    "Could not load release information. Showing local fallback.",
                );
                if let Err(render_err) = rendered {
                    tracing::warn!(
                        error = %render_err,
                        "code rendering failed for fallback release"
                    );
                    self.view
                        .show_status(ViewStatus::Error, &render_err.to_string());
                }
                let mut state = self.state();
                state.phase = RefreshPhase::Failed;
                state.current_release = Some(release);
                RefreshOutcome::Failed
            }
        }
    }
}

/// Built from compiled-in defaults only, so it cannot fail.
fn last_resort_release(now: SystemTime) -> ReleaseInfo {
    let fallback = FallbackRelease::default();
    ReleaseInfo {
        version: fallback.version,
        download_url: fallback.download_url,
        published_at: now,
        size_bytes: 0,
        build_variant: BuildVariant::Fallback,
        source_kind: SourceKind::StaticFallback,
        asset_name: fallback.asset_name,
        commit: UNKNOWN_VERSION.to_string(),
        notes: String::new(),
    }
}

#[cfg(test)]
mod tests;
