//! Network capability.
//!
//! The rest of the crate only sees the [`HttpClient`] trait: HEAD for artifact
//! validation, GET for release metadata and manifests. [`CurlClient`] is the
//! production implementation; tests substitute in-memory fakes.

mod curl_client;
mod parse;
mod signal;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;

pub use curl_client::CurlClient;
pub(crate) use curl_client::map_curl_error;
pub use signal::AbortSignal;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("relbeacon/", env!("CARGO_PKG_VERSION"));

/// HTTP method subset the core needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Head,
    Get,
}

/// Per-request options.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    /// Extra request headers as `(name, value)` pairs.
    pub headers: Vec<(String, String)>,
    /// When tripped, the transfer stops and the call returns `FetchError::Aborted`.
    pub signal: Option<AbortSignal>,
}

impl RequestOptions {
    pub fn head() -> Self {
        Self {
            method: Method::Head,
            headers: Vec::new(),
            signal: None,
        }
    }

    pub fn get() -> Self {
        Self {
            method: Method::Get,
            headers: Vec::new(),
            signal: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Case-insensitive response header map. Later values replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpHeaders {
    entries: Vec<(String, String)>,
}

impl HttpHeaders {
    pub fn insert(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        self.entries.retain(|(n, _)| *n != name);
        self.entries.push((name, value.to_string()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_length(&self) -> Option<u64> {
        self.get("content-length").and_then(|v| v.parse().ok())
    }
}

/// Response metadata and, for GET, the body text.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: HttpHeaders,
    pub body: Option<String>,
}

impl HttpResponse {
    /// True for 2xx statuses.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The fetch-style capability: `request(url, options) -> response | failure`.
///
/// Non-success statuses are responses, not errors; only transport-level
/// failures (and aborts) come back as `Err`.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn request(&self, url: &str, options: RequestOptions)
        -> Result<HttpResponse, FetchError>;
}

/// Runs a request with a deadline. On expiry the abort signal is tripped so
/// the underlying transfer stops, and the call yields `FetchError::Timeout`.
pub async fn request_with_timeout(
    client: &dyn HttpClient,
    url: &str,
    mut options: RequestOptions,
    timeout: Duration,
) -> Result<HttpResponse, FetchError> {
    let signal = options.signal.clone().unwrap_or_default();
    options.signal = Some(signal.clone());

    match tokio::time::timeout(timeout, client.request(url, options)).await {
        Ok(result) => result,
        Err(_) => {
            signal.abort();
            tracing::debug!(
                url,
                timeout_ms = timeout.as_millis() as u64,
                "request deadline exceeded"
            );
            Err(FetchError::Timeout {
                url: url.to_string(),
                after: timeout,
            })
        }
    }
}

/// GET `url` and return the body; non-2xx statuses become `FetchError::Status`.
pub async fn get_text(
    client: &dyn HttpClient,
    url: &str,
    options: RequestOptions,
    timeout: Duration,
) -> Result<String, FetchError> {
    let response = request_with_timeout(client, url, options, timeout).await?;
    if !response.ok() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: response.status,
            status_text: response.status_text,
        });
    }
    Ok(response.body.unwrap_or_default())
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeClient, Reply};
    use super::*;

    #[test]
    fn headers_are_case_insensitive_and_last_wins() {
        let mut headers = HttpHeaders::default();
        headers.insert("Content-Length", "10");
        headers.insert("content-length", "20");
        assert_eq!(headers.get("CONTENT-LENGTH"), Some("20"));
        assert_eq!(headers.content_length(), Some(20));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_request_times_out() {
        let client = FakeClient::new();
        client.set("https://slow.example.com/a.apk", Reply::Hang);
        let err = request_with_timeout(
            &client,
            "https://slow.example.com/a.apk",
            RequestOptions::head(),
            Duration::from_millis(500),
        )
        .await
        .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn get_text_maps_non_success_status() {
        let client = FakeClient::new();
        client.body("https://example.com/latest-build.txt", 404, "");
        let err = get_text(
            &client,
            "https://example.com/latest-build.txt",
            RequestOptions::get(),
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn get_text_returns_body() {
        let client = FakeClient::new();
        client.body("https://example.com/m.txt", 200, "VERSION=1.0");
        let text = get_text(
            &client,
            "https://example.com/m.txt",
            RequestOptions::get(),
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert_eq!(text, "VERSION=1.0");
    }
}
