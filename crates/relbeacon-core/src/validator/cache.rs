//! URL -> validation result cache with caller-supplied max-age.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use super::ValidationResult;

#[derive(Debug, Clone)]
struct CacheEntry {
    result: ValidationResult,
    fetched_at: Instant,
}

/// Unbounded in count; entries older than the lookup's max-age are invisible
/// but stay until [`ValidationCache::clear`].
#[derive(Debug, Default)]
pub struct ValidationCache {
    entries: HashMap<String, CacheEntry>,
}

/// Snapshot of one cache entry.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntryStats {
    pub url: String,
    pub age: Duration,
    pub is_reachable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub entries: Vec<CacheEntryStats>,
}

impl ValidationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `url` if it is younger than `max_age`.
    pub fn get(&self, url: &str, max_age: Duration, now: Instant) -> Option<&ValidationResult> {
        self.entries
            .get(url)
            .filter(|entry| now.saturating_duration_since(entry.fetched_at) < max_age)
            .map(|entry| &entry.result)
    }

    pub fn insert(&mut self, url: &str, result: ValidationResult, now: Instant) {
        self.entries.insert(
            url.to_string(),
            CacheEntry {
                result,
                fetched_at: now,
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self, now: Instant) -> CacheStats {
        let mut entries: Vec<CacheEntryStats> = self
            .entries
            .iter()
            .map(|(url, entry)| CacheEntryStats {
                url: url.clone(),
                age: now.saturating_duration_since(entry.fetched_at),
                is_reachable: entry.result.is_reachable,
            })
            .collect();
        entries.sort_by(|a, b| a.url.cmp(&b.url));
        CacheStats {
            size: entries.len(),
            entries,
        }
    }
}
