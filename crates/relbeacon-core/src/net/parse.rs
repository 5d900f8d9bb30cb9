//! Parse raw HTTP response header lines into status text and headers.

use super::HttpHeaders;

/// Status line and headers of the final response.
#[derive(Debug, Default)]
pub(crate) struct ParsedHead {
    pub status_text: String,
    pub headers: HttpHeaders,
}

/// Parse collected header lines. Redirects produce several header blocks;
/// each `HTTP/` status line starts a new block so only the last one survives.
pub(crate) fn parse_head(lines: &[String]) -> ParsedHead {
    let mut head = ParsedHead::default();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("HTTP/") {
            head = ParsedHead {
                status_text: status_text(line),
                headers: HttpHeaders::default(),
            };
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            head.headers.insert(name.trim(), value.trim());
        }
    }

    head
}

/// "HTTP/1.1 404 Not Found" -> "Not Found". HTTP/2 lines carry no reason phrase.
fn status_text(line: &str) -> String {
    let mut parts = line.splitn(3, ' ');
    let _version = parts.next();
    let _code = parts.next();
    parts.next().unwrap_or("").trim().to_string()
}
