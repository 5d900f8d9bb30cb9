//! Per-URL validation outcome.

use serde::Serialize;

use crate::error::FetchError;
use crate::net::HttpResponse;

use super::score::is_artifact_plausible;

/// Why a URL could not be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFailure {
    pub message: String,
    /// Deadline exceeded, as opposed to any other transport failure.
    pub is_timeout: bool,
}

/// Outcome of validating one candidate URL. Never an error: every failure
/// mode is encoded here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub url: String,
    /// Transport succeeded and the status was 2xx.
    pub is_reachable: bool,
    pub http_status: Option<u16>,
    pub status_text: String,
    /// 0 when absent or unparseable.
    pub content_length_bytes: u64,
    pub content_type: String,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
    /// Only ever true when reachable.
    pub artifact_plausible: bool,
    pub error: Option<ValidationFailure>,
}

impl ValidationResult {
    pub(crate) fn from_response(url: &str, response: &HttpResponse) -> Self {
        let mut result = Self {
            url: url.to_string(),
            is_reachable: response.ok(),
            http_status: Some(response.status),
            status_text: response.status_text.clone(),
            content_length_bytes: response.headers.content_length().unwrap_or(0),
            content_type: response
                .headers
                .get("content-type")
                .unwrap_or_default()
                .to_string(),
            last_modified: response.headers.get("last-modified").map(str::to_string),
            etag: response
                .headers
                .get("etag")
                .map(|v| v.trim_matches('"').to_string()),
            artifact_plausible: false,
            error: None,
        };
        if result.is_reachable {
            result.artifact_plausible = is_artifact_plausible(&result);
        }
        result
    }

    pub(crate) fn from_error(url: &str, err: &FetchError) -> Self {
        Self {
            url: url.to_string(),
            is_reachable: false,
            http_status: None,
            status_text: String::new(),
            content_length_bytes: 0,
            content_type: String::new(),
            last_modified: None,
            etag: None,
            artifact_plausible: false,
            error: Some(ValidationFailure {
                message: err.to_string(),
                is_timeout: err.is_timeout(),
            }),
        }
    }

    /// Reachable but failing the plausibility heuristics. Diagnostic only.
    pub fn is_inconclusive(&self) -> bool {
        self.is_reachable && !self.artifact_plausible
    }
}
