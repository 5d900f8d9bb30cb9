//! libcurl-backed [`HttpClient`].
//!
//! Transfers run on tokio's blocking pool. The abort signal is polled from
//! curl's progress callback, so a tripped deadline stops the transfer instead
//! of leaving a detached thread waiting on the socket.

use std::str;
use std::time::Duration;

use async_trait::async_trait;
use curl::easy::{Easy, List};

use super::parse::parse_head;
use super::{HttpClient, HttpResponse, Method, RequestOptions, USER_AGENT};
use crate::error::FetchError;

/// Production HTTP client. Cheap to copy; each request gets its own handle.
#[derive(Debug, Clone, Copy)]
pub struct CurlClient {
    pub connect_timeout: Duration,
    /// Hard ceiling enforced by curl itself, in addition to any caller deadline.
    pub transfer_timeout: Duration,
}

impl Default for CurlClient {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            transfer_timeout: Duration::from_secs(30),
        }
    }
}

impl CurlClient {
    pub fn new(transfer_timeout: Duration) -> Self {
        Self {
            connect_timeout: transfer_timeout.min(Duration::from_secs(15)),
            transfer_timeout,
        }
    }
}

#[async_trait]
impl HttpClient for CurlClient {
    async fn request(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse, FetchError> {
        let client = *self;
        let owned_url = url.to_string();
        tokio::task::spawn_blocking(move || perform(client, &owned_url, &options))
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                reason: format!("request task failed: {e}"),
            })?
    }
}

fn perform(
    client: CurlClient,
    url: &str,
    options: &RequestOptions,
) -> Result<HttpResponse, FetchError> {
    let fail = |e: curl::Error| map_curl_error(url, &e, client.transfer_timeout);
    let signal = options.signal.clone().unwrap_or_default();
    let mut header_lines: Vec<String> = Vec::new();
    let mut body: Vec<u8> = Vec::new();

    let mut easy = Easy::new();
    easy.url(url).map_err(fail)?;
    match options.method {
        Method::Head => easy.nobody(true).map_err(fail)?,
        Method::Get => easy.get(true).map_err(fail)?,
    }
    easy.follow_location(true).map_err(fail)?;
    easy.max_redirections(10).map_err(fail)?;
    easy.useragent(USER_AGENT).map_err(fail)?;
    easy.connect_timeout(client.connect_timeout).map_err(fail)?;
    easy.timeout(client.transfer_timeout).map_err(fail)?;
    easy.progress(true).map_err(fail)?;

    if !options.headers.is_empty() {
        let mut list = List::new();
        for (name, value) in &options.headers {
            list.append(&format!("{}: {}", name.trim(), value.trim()))
                .map_err(fail)?;
        }
        easy.http_headers(list).map_err(fail)?;
    }

    {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    header_lines.push(s.trim_end().to_string());
                }
                true
            })
            .map_err(fail)?;
        transfer
            .write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(fail)?;
        // Returning false aborts the transfer.
        transfer
            .progress_function(|_, _, _, _| !signal.is_aborted())
            .map_err(fail)?;
        transfer.perform().map_err(fail)?;
    }

    let code = easy.response_code().map_err(fail)?;
    let head = parse_head(&header_lines);
    let body = match options.method {
        Method::Head => None,
        Method::Get => Some(String::from_utf8_lossy(&body).into_owned()),
    };

    tracing::debug!(url, status = code, method = ?options.method, "request completed");

    Ok(HttpResponse {
        status: u16::try_from(code).unwrap_or(0),
        status_text: head.status_text,
        headers: head.headers,
        body,
    })
}

pub(crate) fn map_curl_error(
    url: &str,
    e: &curl::Error,
    transfer_timeout: Duration,
) -> FetchError {
    if e.is_operation_timedout() {
        return FetchError::Timeout {
            url: url.to_string(),
            after: transfer_timeout,
        };
    }
    if e.is_aborted_by_callback() {
        return FetchError::Aborted {
            url: url.to_string(),
        };
    }
    FetchError::Transport {
        url: url.to_string(),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_caps_connect_timeout() {
        let client = CurlClient::new(Duration::from_secs(60));
        assert_eq!(client.connect_timeout, Duration::from_secs(15));
        let short = CurlClient::new(Duration::from_secs(5));
        assert_eq!(short.connect_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn unsupported_scheme_is_transport_failure() {
        let client = CurlClient::new(Duration::from_secs(2));
        let err = client
            .request("nosuchscheme://example.invalid/a.apk", RequestOptions::head())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
    }
}
