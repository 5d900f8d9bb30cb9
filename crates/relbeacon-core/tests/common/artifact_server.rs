//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves a fixed route table. HEAD answers with the route's headers only
//! (`Content-Length` is the advertised artifact size, the body is never
//! sent); GET sends the route's body, optionally with a different status.
//! Unknown paths get 404.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Route {
    pub status: u16,
    pub content_type: String,
    /// Advertised length for HEAD; GET uses the body length.
    pub length: u64,
    pub body: String,
    pub etag: Option<String>,
    /// Wait this long before answering.
    pub delay: Option<Duration>,
    /// Status for GET when it differs from HEAD.
    pub get_status: Option<u16>,
}

impl Route {
    /// An artifact that is only ever checked with HEAD.
    pub fn artifact(length: u64, content_type: &str) -> Self {
        Self {
            status: 200,
            content_type: content_type.to_string(),
            length,
            body: String::new(),
            etag: Some("\"build-42\"".to_string()),
            delay: None,
            get_status: None,
        }
    }

    /// An artifact whose GET body really is `length` bytes.
    pub fn binary(length: u64, content_type: &str) -> Self {
        Self {
            status: 200,
            content_type: content_type.to_string(),
            length,
            body: "x".repeat(length as usize),
            etag: None,
            delay: None,
            get_status: None,
        }
    }

    pub fn text(content_type: &str, body: &str) -> Self {
        Self {
            status: 200,
            content_type: content_type.to_string(),
            length: body.len() as u64,
            body: body.to_string(),
            etag: None,
            delay: None,
            get_status: None,
        }
    }

    pub fn with_get_status(mut self, status: u16) -> Self {
        self.get_status = Some(status);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Starts a server in a background thread. Returns the base URL without a
/// trailing slash (e.g. "http://127.0.0.1:12345"). Runs until the process exits.
pub fn start(routes: HashMap<String, Route>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let routes = Arc::new(routes);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let routes = Arc::clone(&routes);
            thread::spawn(move || handle(stream, &routes));
        }
    });
    format!("http://127.0.0.1:{}", port)
}

/// A URL on a port nothing listens on.
pub fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/app.apk", port)
}

fn handle(mut stream: std::net::TcpStream, routes: &HashMap<String, Route>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let (method, path) = parse_request_line(request);

    let Some(route) = routes.get(path) else {
        let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
        return;
    };
    if let Some(delay) = route.delay {
        thread::sleep(delay);
    }

    let reason = |status: u16| match status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    };
    let etag = route
        .etag
        .as_deref()
        .map(|e| format!("ETag: {}\r\n", e))
        .unwrap_or_default();

    if method.eq_ignore_ascii_case("HEAD") {
        let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\
             Last-Modified: Sat, 01 Jun 2024 10:30:00 GMT\r\n{}\r\n",
            route.status,
            reason(route.status),
            route.content_type,
            route.length,
            etag
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }
    if method.eq_ignore_ascii_case("GET") {
        let status = route.get_status.unwrap_or(route.status);
        let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n{}\r\n",
            status,
            reason(status),
            route.content_type,
            route.body.len(),
            etag
        );
        let _ = stream.write_all(response.as_bytes());
        let _ = stream.write_all(route.body.as_bytes());
        return;
    }
    let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
}

/// Returns (method, path) from the request line.
fn parse_request_line(request: &str) -> (&str, &str) {
    let mut parts = request.lines().next().unwrap_or("").split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("/");
    (method, path)
}
