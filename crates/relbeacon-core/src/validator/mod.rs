//! Artifact validation.
//!
//! Decides whether a candidate download URL is live and plausibly an
//! installable package, without downloading it: a HEAD request bounded by a
//! deadline, content-type and size heuristics, and a score for ranking several
//! candidates. Results (including failures) are cached per URL so a broken
//! mirror is not hammered within the cache window.

mod cache;
mod result;
mod score;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::net::{request_with_timeout, HttpClient, RequestOptions};

pub use cache::{CacheEntryStats, CacheStats, ValidationCache};
pub use result::{ValidationFailure, ValidationResult};
pub use score::{
    is_artifact_plausible, score, INSTALLABLE_CONTENT_TYPES, LARGE_ARTIFACT_BYTES, MAX_SCORE,
    MIN_ARTIFACT_BYTES,
};

/// Per-call validation options.
#[derive(Debug, Clone, Copy)]
pub struct ValidateOptions {
    /// Cached results older than this are ignored.
    pub max_cache_age: Duration,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            max_cache_age: Duration::from_secs(5 * 60),
        }
    }
}

/// One evaluated candidate.
#[derive(Debug, Clone, Serialize)]
pub struct RankedCandidate {
    pub url: String,
    pub result: ValidationResult,
    pub score: u32,
}

/// Outcome of [`ArtifactValidator::rank`].
#[derive(Debug, Clone, Serialize)]
pub struct RankOutcome {
    /// `None` only when no candidates were given.
    pub best: Option<RankedCandidate>,
    /// Every candidate evaluated, in input order. Shorter than the input
    /// when ranking stopped early.
    pub results: Vec<RankedCandidate>,
}

/// Best candidate plus the other reachable ones as ordered fallbacks.
#[derive(Debug, Clone, Serialize)]
pub struct RobustLink {
    pub primary: Option<String>,
    pub fallbacks: Vec<String>,
    pub validation: Option<ValidationResult>,
    pub results: Vec<RankedCandidate>,
}

pub struct ArtifactValidator {
    client: Arc<dyn HttpClient>,
    timeout: Duration,
    cache: Mutex<ValidationCache>,
}

impl ArtifactValidator {
    pub fn new(client: Arc<dyn HttpClient>, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            cache: Mutex::new(ValidationCache::new()),
        }
    }

    fn cache(&self) -> MutexGuard<'_, ValidationCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validates `url`, serving from cache when a young enough entry exists.
    /// Repeated calls within the window never reach the network.
    pub async fn validate(&self, url: &str, options: ValidateOptions) -> ValidationResult {
        if let Some(cached) = self
            .cache()
            .get(url, options.max_cache_age, Instant::now())
            .cloned()
        {
            tracing::debug!(url, "using cached validation result");
            return cached;
        }

        tracing::debug!(url, "validating download url");
        let result = match request_with_timeout(
            self.client.as_ref(),
            url,
            RequestOptions::head(),
            self.timeout,
        )
        .await
        {
            Ok(response) => ValidationResult::from_response(url, &response),
            Err(err) => {
                tracing::warn!(
                    url,
                    error = %err,
                    timeout = err.is_timeout(),
                    "url validation failed"
                );
                ValidationResult::from_error(url, &err)
            }
        };

        if result.is_inconclusive() {
            tracing::info!(
                url,
                content_type = %result.content_type,
                length = result.content_length_bytes,
                "reachable but does not look like an installable package"
            );
        }

        self.cache().insert(url, result.clone(), Instant::now());
        result
    }

    /// Validates candidates in order and returns the first one that is both
    /// reachable and plausible without touching the rest. Otherwise returns
    /// the highest score, first occurrence winning ties.
    pub async fn rank(&self, urls: &[String], options: ValidateOptions) -> RankOutcome {
        let mut results: Vec<RankedCandidate> = Vec::with_capacity(urls.len());

        for url in urls {
            let result = self.validate(url, options).await;
            let candidate = RankedCandidate {
                url: url.clone(),
                score: score(&result),
                result,
            };
            if candidate.result.is_reachable && candidate.result.artifact_plausible {
                tracing::info!(url = %candidate.url, "found plausible download url");
                results.push(candidate.clone());
                return RankOutcome {
                    best: Some(candidate),
                    results,
                };
            }
            results.push(candidate);
        }

        let mut best: Option<&RankedCandidate> = None;
        for candidate in &results {
            if best.is_none_or(|b| candidate.score > b.score) {
                best = Some(candidate);
            }
        }
        let best = best.cloned();
        tracing::debug!(
            best = ?best.as_ref().map(|b| &b.url),
            evaluated = results.len(),
            "ranked download urls"
        );
        RankOutcome { best, results }
    }

    /// Ranks `primary`, then `extra`, then `configured` fallbacks (blanks
    /// skipped) and splits the outcome into a primary link and the other
    /// reachable candidates.
    pub async fn robust_link(
        &self,
        primary: &str,
        extra: &[String],
        configured: &[String],
        options: ValidateOptions,
    ) -> RobustLink {
        let candidates: Vec<String> = std::iter::once(primary.to_string())
            .chain(extra.iter().cloned())
            .chain(configured.iter().cloned())
            .filter(|url| !url.trim().is_empty())
            .collect();

        let outcome = self.rank(&candidates, options).await;
        let primary = outcome.best.as_ref().map(|b| b.url.clone());
        let fallbacks = outcome
            .results
            .iter()
            .filter(|c| c.result.is_reachable && Some(&c.url) != primary.as_ref())
            .map(|c| c.url.clone())
            .collect();

        RobustLink {
            primary,
            fallbacks,
            validation: outcome.best.map(|b| b.result),
            results: outcome.results,
        }
    }

    pub fn clear_cache(&self) {
        self.cache().clear();
        tracing::debug!("validation cache cleared");
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache().stats(Instant::now())
    }
}
