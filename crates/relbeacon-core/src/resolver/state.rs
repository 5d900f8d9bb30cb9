use std::time::SystemTime;

use serde::Serialize;

use crate::release::ReleaseInfo;
use crate::validator::ValidationResult;

/// Where the refresh state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RefreshPhase {
    #[default]
    Idle,
    Refreshing,
    /// Waiting to retry after the n-th consecutive failure.
    Backoff(u32),
    /// Retries exhausted; the built-in fallback is on display.
    Failed,
}

/// Mutable resolver state. Only the resolver's methods touch it.
#[derive(Debug, Default)]
pub(crate) struct ResolverState {
    pub(crate) current_release: Option<ReleaseInfo>,
    pub(crate) retry_count: u32,
    pub(crate) last_refresh_at: Option<SystemTime>,
    pub(crate) phase: RefreshPhase,
    pub(crate) last_validation: Option<ValidationResult>,
}

/// Point-in-time copy of the resolver state.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub is_refreshing: bool,
    pub last_refresh_at: Option<SystemTime>,
    pub retry_count: u32,
    pub phase: RefreshPhase,
    pub current_release: Option<ReleaseInfo>,
    /// Validation of the current download URL; diagnostic only.
    pub last_validation: Option<ValidationResult>,
}

impl ResolverState {
    pub(crate) fn snapshot(&self, is_refreshing: bool) -> StatusSnapshot {
        StatusSnapshot {
            is_refreshing,
            last_refresh_at: self.last_refresh_at,
            retry_count: self.retry_count,
            phase: self.phase,
            current_release: self.current_release.clone(),
            last_validation: self.last_validation.clone(),
        }
    }
}
