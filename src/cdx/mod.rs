//! CDX/CDXJ index parsing.
//!
//! Each index line has the shape
//!
//! ```text
//! <searchable-key> SP <timestamp> SP <json-object>
//! ```
//!
//! Lines that do not fit (too few fields, unparseable JSON, no `url`)
//! are skipped silently; real-world indexes carry such lines and a
//! single bad row must not poison the whole archive.

use serde_json::Value;

/// One capture row parsed from the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDescriptor {
    /// The captured target URL, exact as indexed.
    pub url: String,
    /// Normalized timestamp; see [`normalize_timestamp`].
    pub ts: String,
    /// HTTP status from the index, if present.
    pub status: Option<u16>,
    /// Content type from the index.
    pub mime: Option<String>,
    /// Payload digest.
    pub digest: Option<String>,
    /// Path of the WARC entry inside the container.
    pub warc_path: Option<String>,
    /// Byte offset within the uncompressed WARC, informational.
    pub offset: Option<u64>,
    /// Byte length within the uncompressed WARC, informational.
    pub length: Option<u64>,
}

/// Ordered sequence of capture descriptors, preserving index file order.
#[derive(Debug, Default)]
pub struct CaptureIndex {
    captures: Vec<CaptureDescriptor>,
}

impl CaptureIndex {
    /// Parse the decoded text of an index file.
    pub fn parse(text: &str) -> Self {
        let mut captures = Vec::new();
        let mut skipped = 0usize;

        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            match parse_line(line) {
                Some(descriptor) => captures.push(descriptor),
                None => skipped += 1,
            }
        }

        tracing::debug!(rows = captures.len(), skipped, "parsed capture index");
        CaptureIndex { captures }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CaptureDescriptor> {
        self.captures.iter()
    }

    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }
}

fn parse_line(line: &str) -> Option<CaptureDescriptor> {
    let fields: Vec<&str> = line.split(' ').collect();
    if fields.len() < 3 {
        return None;
    }

    // The JSON object may itself contain spaces; everything from the
    // third field on belongs to it.
    let json_text = fields[2..].join(" ");
    let data: Value = serde_json::from_str(&json_text).ok()?;

    let url = data.get("url")?.as_str()?.to_string();
    if url.is_empty() {
        return None;
    }

    let warc_path = data
        .get("filename")
        .and_then(Value::as_str)
        .map(|filename| {
            // A bare filename refers to the container's archive/ area; a
            // filename that already carries a path is used as-is.
            if filename.contains('/') {
                filename.to_string()
            } else {
                format!("archive/{}", filename)
            }
        });

    Some(CaptureDescriptor {
        url,
        ts: normalize_timestamp(fields[1]),
        status: data
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok()),
        mime: data.get("mime").and_then(Value::as_str).map(String::from),
        digest: data.get("digest").and_then(Value::as_str).map(String::from),
        warc_path,
        offset: data.get("offset").and_then(Value::as_u64),
        length: data.get("length").and_then(Value::as_u64),
    })
}

/// Rewrites a 17-digit `YYYYMMDDhhmmssSSS` timestamp to the ISO form
/// `YYYY-MM-DDThh:mm:ss.SSSZ`; anything else passes through verbatim.
///
/// The normalized string doubles as the WARC lookup key component, so
/// `WARC-Date` values go through the same rewrite.
pub fn normalize_timestamp(ts: &str) -> String {
    let b = ts.as_bytes();
    if b.len() != 17 || !b.iter().all(u8::is_ascii_digit) {
        return ts.to_string();
    }
    format!(
        "{}-{}-{}T{}:{}:{}.{}Z",
        &ts[0..4],
        &ts[4..6],
        &ts[6..8],
        &ts[8..10],
        &ts[10..12],
        &ts[12..14],
        &ts[14..17]
    )
}
