//! Callback wire protocol
//!
//! The browser reports events as minimal HTTP requests against the loopback
//! listener:
//!
//! ```text
//! GET /<sequence>/<body> HTTP/1.1
//! Host: 127.0.0.1:<port>
//!
//! ```
//!
//! POST requests may carry further callback bodies, one per line, which are
//! dispatched under the same sequence number. In polling mode the browser
//! buffers `<sequence>/<body>` lines joined by `--` instead.

use regex::Regex;
use std::sync::OnceLock;

/// Response sent for every accepted request.
pub const OK_RESPONSE: &[u8] =
    b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\nConnection: close\r\n\r\nOK";

/// Response sent when the `Host` header does not name the listener.
pub const FORBIDDEN_RESPONSE: &[u8] =
    b"HTTP/1.1 403 Forbidden\r\nContent-Type: text/plain\r\nContent-Length: 9\r\nConnection: close\r\n\r\nForbidden";

/// Separator between buffered callbacks in polling mode.
pub const POLL_SEPARATOR: &str = "--";

fn request_line_regex() -> &'static Regex {
    static REQUEST_LINE: OnceLock<Regex> = OnceLock::new();
    REQUEST_LINE.get_or_init(|| {
        Regex::new(r"^(GET|POST) /(\d+)/(\S*) HTTP/\d\.\d$").expect("request line pattern is valid")
    })
}

/// HTTP method of a callback request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A parsed callback request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRequest {
    pub method: Method,
    pub sequence: u64,
    /// Callback body from the request path
    pub body: String,
    /// Value of the `Host` header, if sent
    pub host: Option<String>,
    /// Additional callback bodies from a POST payload
    pub extra_bodies: Vec<String>,
}

impl CallbackRequest {
    /// Parses a complete request. Returns `None` if the request line does
    /// not match the callback pattern.
    pub fn parse(request: &str) -> Option<Self> {
        let (head, payload) = match head_bounds(request.as_bytes()) {
            Some((head_len, payload_start)) => (&request[..head_len], &request[payload_start..]),
            None => (request, ""),
        };

        let mut lines = head.lines();
        let captures = request_line_regex().captures(lines.next()?.trim_end())?;
        let method = match &captures[1] {
            "POST" => Method::Post,
            _ => Method::Get,
        };
        let sequence = captures[2].parse().ok()?;
        let body = captures[3].to_string();

        let host = lines
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("host"))
            .map(|(_, value)| value.trim().to_string());

        let extra_bodies = match method {
            Method::Post => payload
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            Method::Get => Vec::new(),
        };

        Some(Self {
            method,
            sequence,
            body,
            host,
            extra_bodies,
        })
    }

    /// True if the request was addressed to `127.0.0.1:<port>`.
    pub fn is_addressed_to(&self, port: u16) -> bool {
        self.host.as_deref() == Some(format!("127.0.0.1:{}", port).as_str())
    }

    /// The path body followed by every POST body line.
    pub fn bodies(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.body.as_str()).chain(self.extra_bodies.iter().map(String::as_str))
    }
}

/// Splits a polled callback buffer into `(sequence, body)` pairs.
///
/// Entries without a leading sequence number are skipped.
pub fn parse_poll_buffer(buffer: &str) -> Vec<(u64, String)> {
    buffer
        .split(POLL_SEPARATOR)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let (sequence, body) = entry.trim_start_matches('/').split_once('/')?;
            Some((sequence.parse().ok()?, body.to_string()))
        })
        .collect()
}

/// Finds the blank line ending the request head, accepting CRLF and bare LF
/// line endings. Returns the head length and where the payload starts.
fn head_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let crlf = buffer
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|end| (end, end + 4));
    let lf = buffer
        .windows(2)
        .position(|window| window == b"\n\n")
        .map(|end| (end, end + 2));
    match (crlf, lf) {
        (Some(crlf), Some(lf)) => Some(if lf.0 < crlf.0 { lf } else { crlf }),
        (crlf, lf) => crlf.or(lf),
    }
}

/// Returns the length of the request head plus its declared body, once the
/// whole request has been buffered.
pub fn complete_request_length(buffer: &[u8]) -> Option<usize> {
    let (_, head_end) = head_bounds(buffer)?;
    let head = String::from_utf8_lossy(&buffer[..head_end]);
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let total = head_end + content_length;
    (buffer.len() >= total).then_some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_get_request() {
        let request = CallbackRequest::parse(
            "GET /12/zoom-changed/4 HTTP/1.1\r\nHost: 127.0.0.1:4711\r\nAccept: */*\r\n\r\n",
        )
        .unwrap();
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.sequence, 12);
        assert_eq!(request.body, "zoom-changed/4");
        assert!(request.is_addressed_to(4711));
        assert!(!request.is_addressed_to(4712));
        assert_eq!(request.bodies().collect::<Vec<_>>(), vec!["zoom-changed/4"]);
    }

    #[test]
    fn test_parse_post_request_with_extra_bodies() {
        let request = CallbackRequest::parse(
            "POST /3/directions-load/100/20 HTTP/1.1\r\nhost: 127.0.0.1:80\r\nContent-Length: 30\r\n\r\nover-query-limit\r\n\r\nzero-results\r\n",
        )
        .unwrap();
        assert_eq!(request.method, Method::Post);
        assert_eq!(
            request.bodies().collect::<Vec<_>>(),
            vec!["directions-load/100/20", "over-query-limit", "zero-results"]
        );
        assert!(request.is_addressed_to(80));
    }

    #[test]
    fn test_reject_foreign_requests() {
        assert!(CallbackRequest::parse("GET /favicon.ico HTTP/1.1\r\n\r\n").is_none());
        assert!(CallbackRequest::parse("PUT /1/zero-results HTTP/1.1\r\n\r\n").is_none());
        assert!(CallbackRequest::parse("").is_none());

        let request = CallbackRequest::parse("GET /1/zero-results HTTP/1.1\r\nHost: evil.example:80\r\n\r\n").unwrap();
        assert!(!request.is_addressed_to(80));
        let request = CallbackRequest::parse("GET /1/zero-results HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(request.host, None);
    }

    #[test]
    fn test_parse_poll_buffer() {
        let entries = parse_poll_buffer("4/zoom-changed/3--5/center-changed/1/2--garbage--");
        assert_eq!(
            entries,
            vec![
                (4, "zoom-changed/3".to_string()),
                (5, "center-changed/1/2".to_string())
            ]
        );
        assert!(parse_poll_buffer("").is_empty());
    }

    #[test]
    fn test_complete_request_length() {
        assert_eq!(complete_request_length(b"GET /1/x HTTP/1.1\r\n"), None);
        assert_eq!(complete_request_length(b"GET /1/x HTTP/1.1\r\n\r\n"), Some(21));
        let post = b"POST /1/x HTTP/1.1\r\nContent-Length: 4\r\n\r\nab";
        assert_eq!(complete_request_length(post), None);
        let post = b"POST /1/x HTTP/1.1\r\nContent-Length: 4\r\n\r\nabcd";
        assert_eq!(complete_request_length(post), Some(post.len()));
    }

    #[test]
    fn test_bare_lf_requests_complete() {
        let get = "GET /2/zero-results HTTP/1.1\nHost: 127.0.0.1:80\n\n";
        assert_eq!(complete_request_length(get.as_bytes()), Some(get.len()));
        let request = CallbackRequest::parse(get).unwrap();
        assert!(request.is_addressed_to(80));

        let post = "POST /3/zero-results HTTP/1.1\nContent-Length: 17\n\nover-query-limit\n";
        assert_eq!(complete_request_length(post.as_bytes()), Some(post.len()));
        let request = CallbackRequest::parse(post).unwrap();
        assert_eq!(request.extra_bodies, vec!["over-query-limit".to_string()]);
    }
}
