//! HTTP/1.x response parsing within a WARC `response` payload.

use std::collections::HashMap;

use bytes::Bytes;

/// A captured HTTP response: status, headers, and the body bytes.
///
/// Header names are lower-cased for lookup. The body is a zero-copy
/// slice of the parent WARC buffer; the bytes stay valid for as long as
/// the response is held, independent of the archive's caches.
#[derive(Debug, Clone)]
pub struct ArchivedResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl ArchivedResponse {
    /// Parse a `response`-record payload, which begins with an HTTP/1.x
    /// status line.
    ///
    /// A payload with no header/body separator, or with an unparseable
    /// status line, degrades to `status: 0` rather than failing; the
    /// record was framed already and its bytes are still useful.
    pub fn parse(payload: Bytes) -> Self {
        let Some(sep) = payload
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
        else {
            return ArchivedResponse {
                status: 0,
                headers: HashMap::new(),
                body: payload,
            };
        };

        let preamble = String::from_utf8_lossy(&payload[..sep]).into_owned();
        let mut lines = preamble.split("\r\n");

        let status = lines.next().map(parse_status_line).unwrap_or(0);

        let mut headers = HashMap::new();
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }

        ArchivedResponse {
            status,
            headers,
            body: payload.slice(sep + 4..),
        }
    }

    /// Header accessor; `name` is matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The body decoded as UTF-8, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// Extracts the status code from `HTTP/<digit>.<digit> <status> ...`.
/// Anything that does not match yields 0.
fn parse_status_line(line: &str) -> u16 {
    let Some(rest) = line.strip_prefix("HTTP/") else {
        return 0;
    };
    let b = rest.as_bytes();
    if b.len() < 4
        || !b[0].is_ascii_digit()
        || b[1] != b'.'
        || !b[2].is_ascii_digit()
        || !b[3].is_ascii_whitespace()
    {
        return 0;
    }
    let rest = rest[3..].trim_start();
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_headers_body() {
        let payload = Bytes::from_static(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nX-Thing: a\r\n\r\n<html>hi</html>",
        );
        let resp = ArchivedResponse::parse(payload);
        assert_eq!(resp.status, 200);
        assert_eq!(resp.header("content-type"), Some("text/html"));
        assert_eq!(&resp.body[..], b"<html>hi</html>");
        assert_eq!(resp.text(), Some("<html>hi</html>"));
    }

    #[test]
    fn header_names_are_lowercased() {
        let payload = Bytes::from_static(b"HTTP/1.1 301 Moved\r\nLocation: /new\r\n\r\n");
        let resp = ArchivedResponse::parse(payload);
        assert_eq!(resp.headers.get("location").map(String::as_str), Some("/new"));
        assert!(resp.headers.get("Location").is_none());
        assert_eq!(resp.header("LOCATION"), Some("/new"));
    }

    #[test]
    fn missing_separator_degrades_to_raw_body() {
        let payload = Bytes::from_static(b"not an http response at all");
        let resp = ArchivedResponse::parse(payload);
        assert_eq!(resp.status, 0);
        assert!(resp.headers.is_empty());
        assert_eq!(&resp.body[..], b"not an http response at all");
    }

    #[test]
    fn bad_status_line_yields_zero() {
        let payload = Bytes::from_static(b"ICY 200 OK\r\nA: b\r\n\r\nbody");
        let resp = ArchivedResponse::parse(payload);
        assert_eq!(resp.status, 0);
        assert_eq!(resp.header("a"), Some("b"));
        assert_eq!(&resp.body[..], b"body");
    }

    #[test]
    fn status_line_variants() {
        assert_eq!(parse_status_line("HTTP/1.1 404 Not Found"), 404);
        assert_eq!(parse_status_line("HTTP/1.0  500"), 500);
        assert_eq!(parse_status_line("HTTP/2.0 204"), 204);
        assert_eq!(parse_status_line("HTTP/1.1"), 0);
        assert_eq!(parse_status_line("HTTP/x.1 200"), 0);
        assert_eq!(parse_status_line("HTTP/1.1 abc"), 0);
    }

    #[test]
    fn body_is_untouched_bytes() {
        let mut raw = b"HTTP/1.1 200 OK\r\n\r\n".to_vec();
        raw.extend_from_slice(&[0x00, 0xFF, 0x10]);
        let resp = ArchivedResponse::parse(Bytes::from(raw));
        assert_eq!(&resp.body[..], &[0x00, 0xFF, 0x10]);
        assert!(resp.text().is_none());
    }
}
