//! WARC record framing over a materialized byte buffer.
//!
//! A WACZ payload entry (`archive/*.warc` or `*.warc.gz`) is drained into
//! memory once, then split into records here. Random access by
//! `(url, timestamp)` needs an index over the records anyway, and the
//! buffer is bounded by the ZIP entry size, so framing works on the whole
//! buffer rather than a true stream.

use std::collections::HashMap;

use bytes::Bytes;

use crate::cdx::normalize_timestamp;

/// One WARC record: its header map and the raw payload slice.
///
/// Header names keep their original case; `WARC-Target-URI`, `WARC-Date`
/// and `Content-Length` are looked up case-sensitively per the WARC
/// convention.
#[derive(Debug, Clone)]
pub struct WarcRecord {
    pub headers: HashMap<String, String>,
    pub payload: Bytes,
}

impl WarcRecord {
    /// Header accessor, case-sensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// All records of one WARC entry, with a `(url, timestamp)` lookup key.
#[derive(Debug, Default)]
pub struct ParsedWarc {
    records: Vec<WarcRecord>,
    by_key: HashMap<String, usize>,
}

/// Builds the lookup key shared by the index and the record map.
pub fn lookup_key(url: &str, ts: &str) -> String {
    format!("{}|{}", url, ts)
}

impl ParsedWarc {
    /// Frame a buffer into WARC records.
    ///
    /// Framing is tolerant, matching what real archives hold: bytes
    /// before the first `WARC/` marker are ignored, a record whose
    /// `Content-Length` runs past the buffer is clamped to the end, and
    /// a trailing fragment with no header/body separator ends framing
    /// silently.
    pub fn parse(buf: Bytes) -> Self {
        let mut records = Vec::new();
        let mut by_key = HashMap::new();
        let mut pos = 0usize;

        while let Some(start) = find(&buf, b"WARC/", pos) {
            let Some(sep) = find(&buf, b"\r\n\r\n", start) else {
                break;
            };

            let header_block = String::from_utf8_lossy(&buf[start..sep]);
            let mut headers = HashMap::new();
            // The first line is the WARC version line; it is not a header.
            for line in header_block.split("\r\n").skip(1) {
                if let Some((name, value)) = line.split_once(':') {
                    // Duplicate names are last-wins within one record.
                    headers.insert(name.trim().to_string(), value.trim().to_string());
                }
            }

            let content_length = headers
                .get("Content-Length")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(0);

            let body_start = sep + 4;
            let body_end = body_start.saturating_add(content_length).min(buf.len());
            let payload = buf.slice(body_start.min(buf.len())..body_end);

            let index = records.len();
            if let (Some(url), Some(date)) = (headers.get("WARC-Target-URI"), headers.get("WARC-Date"))
            {
                let key = lookup_key(url, &normalize_timestamp(date));
                // On key collision the earlier record wins.
                by_key.entry(key).or_insert(index);
            }

            records.push(WarcRecord { headers, payload });

            // Step past the payload, then past the inter-record CR/LF run.
            pos = body_end;
            while pos < buf.len() && (buf[pos] == b'\r' || buf[pos] == b'\n') {
                pos += 1;
            }
        }

        ParsedWarc { records, by_key }
    }

    pub fn records(&self) -> &[WarcRecord] {
        &self.records
    }

    /// Look up the record captured for `url` at the normalized timestamp.
    pub fn get(&self, url: &str, ts: &str) -> Option<&WarcRecord> {
        self.by_key
            .get(&lookup_key(url, ts))
            .map(|&i| &self.records[i])
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}
