//! Fixture WACZ containers for the integration tests.
//!
//! The crate only reads containers, so the tests carry a minimal ZIP
//! writer of their own: local file headers, a central directory, and an
//! EOCD record, with STORED and DEFLATE entries.

#![allow(dead_code)]

use std::io::Write;

use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::{Compression, Crc};
use tempfile::NamedTempFile;

/// Minimal ZIP writer for fixtures.
pub struct ZipBuilder {
    data: Vec<u8>,
    central: Vec<u8>,
    count: u16,
}

impl ZipBuilder {
    pub fn new() -> Self {
        ZipBuilder {
            data: Vec::new(),
            central: Vec::new(),
            count: 0,
        }
    }

    pub fn add_stored(mut self, name: &str, contents: &[u8]) -> Self {
        self.add_entry(name, 0, contents, contents.to_vec());
        self
    }

    pub fn add_deflated(mut self, name: &str, contents: &[u8]) -> Self {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(contents).unwrap();
        let compressed = encoder.finish().unwrap();
        self.add_entry(name, 8, contents, compressed);
        self
    }

    /// Directory rows carry no data and must be skipped by listings.
    pub fn add_directory(mut self, name: &str) -> Self {
        assert!(name.ends_with('/'));
        self.add_entry(name, 0, b"", Vec::new());
        self
    }

    fn add_entry(&mut self, name: &str, method: u16, contents: &[u8], compressed: Vec<u8>) {
        let mut crc = Crc::new();
        crc.update(contents);
        let crc = crc.sum();

        let lfh_offset = self.data.len() as u32;

        // Local file header
        self.data.extend_from_slice(b"PK\x03\x04");
        self.data.extend_from_slice(&20u16.to_le_bytes()); // version needed
        self.data.extend_from_slice(&0u16.to_le_bytes()); // flags
        self.data.extend_from_slice(&method.to_le_bytes());
        self.data.extend_from_slice(&0u16.to_le_bytes()); // mod time
        self.data.extend_from_slice(&0u16.to_le_bytes()); // mod date
        self.data.extend_from_slice(&crc.to_le_bytes());
        self.data
            .extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        self.data
            .extend_from_slice(&(contents.len() as u32).to_le_bytes());
        self.data
            .extend_from_slice(&(name.len() as u16).to_le_bytes());
        self.data.extend_from_slice(&0u16.to_le_bytes()); // extra len
        self.data.extend_from_slice(name.as_bytes());
        self.data.extend_from_slice(&compressed);

        // Central directory file header
        self.central.extend_from_slice(b"PK\x01\x02");
        self.central.extend_from_slice(&20u16.to_le_bytes()); // made by
        self.central.extend_from_slice(&20u16.to_le_bytes()); // needed
        self.central.extend_from_slice(&0u16.to_le_bytes()); // flags
        self.central.extend_from_slice(&method.to_le_bytes());
        self.central.extend_from_slice(&0u16.to_le_bytes()); // mod time
        self.central.extend_from_slice(&0u16.to_le_bytes()); // mod date
        self.central.extend_from_slice(&crc.to_le_bytes());
        self.central
            .extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        self.central
            .extend_from_slice(&(contents.len() as u32).to_le_bytes());
        self.central
            .extend_from_slice(&(name.len() as u16).to_le_bytes());
        self.central.extend_from_slice(&0u16.to_le_bytes()); // extra len
        self.central.extend_from_slice(&0u16.to_le_bytes()); // comment len
        self.central.extend_from_slice(&0u16.to_le_bytes()); // disk start
        self.central.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
        self.central.extend_from_slice(&0u32.to_le_bytes()); // external attrs
        self.central.extend_from_slice(&lfh_offset.to_le_bytes());
        self.central.extend_from_slice(name.as_bytes());

        self.count += 1;
    }

    pub fn finish(mut self) -> Vec<u8> {
        let cd_offset = self.data.len() as u32;
        let cd_size = self.central.len() as u32;
        self.data.extend_from_slice(&self.central);

        // End of central directory
        self.data.extend_from_slice(b"PK\x05\x06");
        self.data.extend_from_slice(&0u16.to_le_bytes()); // disk number
        self.data.extend_from_slice(&0u16.to_le_bytes()); // disk with cd
        self.data.extend_from_slice(&self.count.to_le_bytes());
        self.data.extend_from_slice(&self.count.to_le_bytes());
        self.data.extend_from_slice(&cd_size.to_le_bytes());
        self.data.extend_from_slice(&cd_offset.to_le_bytes());
        self.data.extend_from_slice(&0u16.to_le_bytes()); // comment len
        self.data
    }
}

/// An HTTP/1.1 response as captured on the wire.
pub fn http_response(status: u16, reason: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut out = format!("HTTP/1.1 {} {}\r\n", status, reason).into_bytes();
    for (name, value) in headers {
        out.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
    out
}

/// A WARC `response` record. `date` must already be in the normalized
/// ISO form so the record is findable under the index timestamp.
pub fn warc_response(url: &str, date: &str, payload: &[u8]) -> Vec<u8> {
    let mut out = format!(
        "WARC/1.1\r\nWARC-Type: response\r\nWARC-Target-URI: {}\r\nWARC-Date: {}\r\nContent-Type: application/http; msgtype=response\r\nContent-Length: {}\r\n\r\n",
        url,
        date,
        payload.len()
    )
    .into_bytes();
    out.extend_from_slice(payload);
    out.extend_from_slice(b"\r\n\r\n");
    out
}

pub fn warc_info() -> Vec<u8> {
    let body = b"software: fixture\r\nformat: WARC file version 1.1\r\n";
    let mut out = format!(
        "WARC/1.1\r\nWARC-Type: warcinfo\r\nWARC-Date: 2025-12-16T08:00:00.000Z\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    out.extend_from_slice(body);
    out.extend_from_slice(b"\r\n\r\n");
    out
}

/// Gzip one buffer as a single member.
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub const HOME: &str = "https://www.iana.org/";
pub const NUMBERS: &str = "https://www.iana.org/numbers";
pub const ABOUT: &str = "https://www.iana.org/about";

pub const HOME_TS_EARLY: &str = "2024-01-01T00:00:00.000Z";
pub const HOME_TS_MID: &str = "2025-12-16T08:54:25.000Z";
pub const HOME_TS_LATE: &str = "2025-12-16T10:54:25.000Z";

/// The WARC payload entry: gzip members, one per record.
pub fn fixture_warc_gz() -> Vec<u8> {
    let records: Vec<Vec<u8>> = vec![
        warc_info(),
        warc_response(
            HOME,
            HOME_TS_EARLY,
            &http_response(
                200,
                "OK",
                &[("Content-Type", "text/html")],
                b"<html><title>IANA (archived 2024)</title></html>",
            ),
        ),
        warc_response(
            HOME,
            HOME_TS_MID,
            &http_response(
                200,
                "OK",
                &[("Content-Type", "text/html"), ("Server", "Apache")],
                b"<html><title>Internet Assigned Numbers Authority - IANA</title></html>",
            ),
        ),
        warc_response(
            HOME,
            HOME_TS_LATE,
            &http_response(
                200,
                "OK",
                &[("Content-Type", "text/html")],
                b"<html><title>IANA (late capture)</title></html>",
            ),
        ),
        warc_response(
            NUMBERS,
            "2025-12-16T08:54:30.000Z",
            &http_response(
                302,
                "Found",
                &[("Location", "https://www.iana.org/numbers/")],
                b"",
            ),
        ),
        warc_response(
            ABOUT,
            "2025-12-16T08:54:35.000Z",
            &http_response(404, "Not Found", &[("Content-Type", "text/plain")], b"gone"),
        ),
    ];

    records.iter().flat_map(|r| gzip(r)).collect()
}

/// The CDXJ-grammar index, including rows that must be skipped.
pub fn fixture_index() -> String {
    [
        r#"org,iana)/ 20240101000000000 {"url": "https://www.iana.org/", "status": 200, "mime": "text/html", "digest": "sha256:aaa", "filename": "data.warc.gz", "offset": 0, "length": 500}"#,
        r#"org,iana)/ 20251216085425000 {"url": "https://www.iana.org/", "status": 200, "mime": "text/html", "digest": "sha256:bbb", "filename": "data.warc.gz"}"#,
        r#"org,iana)/ 20251216105425000 {"url": "https://www.iana.org/", "status": 200, "mime": "text/html", "filename": "data.warc.gz"}"#,
        r#"org,iana)/numbers 20251216085430000 {"url": "https://www.iana.org/numbers", "status": 302, "mime": "text/html", "filename": "data.warc.gz"}"#,
        r#"org,iana)/about 20251216085435000 {"url": "https://www.iana.org/about", "status": 404, "mime": "text/plain", "filename": "data.warc.gz"}"#,
        "malformed-row",
        r#"org,iana)/broken 20251216085440000 not-json-at-all"#,
        "",
    ]
    .join("\n")
}

pub fn fixture_datapackage() -> String {
    serde_json::json!({
        "profile": "data-package",
        "wacz_version": "1.1.1",
        "created": "2025-12-16T09:00:00Z",
        "software": "fixture-writer 1.0",
        "resources": [
            {"name": "data.warc.gz", "path": "archive/data.warc.gz"},
            {"name": "index.cdx", "path": "indexes/index.cdx"},
            {"name": "pages.jsonl", "path": "pages/pages.jsonl"},
        ],
    })
    .to_string()
}

/// The standard five-file fixture: manifest, index, WARC, page list,
/// digest. Directory rows are present but must not show up in listings.
pub fn build_wacz() -> Vec<u8> {
    let pages = concat!(
        r#"{"format": "json-pages-1.0"}"#,
        "\n",
        r#"{"url": "https://www.iana.org/", "title": "IANA"}"#,
        "\n",
    );
    ZipBuilder::new()
        .add_directory("archive/")
        .add_deflated("datapackage.json", fixture_datapackage().as_bytes())
        .add_stored("indexes/index.cdx", fixture_index().as_bytes())
        .add_stored("archive/data.warc.gz", &fixture_warc_gz())
        .add_deflated("pages/pages.jsonl", pages.as_bytes())
        .add_stored(
            "datapackage-digest.json",
            br#"{"path": "datapackage.json", "hash": "sha256:fixture"}"#,
        )
        .finish()
}

/// Same container, but with no index entry at all.
pub fn build_wacz_without_index() -> Vec<u8> {
    ZipBuilder::new()
        .add_deflated("datapackage.json", fixture_datapackage().as_bytes())
        .add_stored("archive/data.warc.gz", &fixture_warc_gz())
        .finish()
}

/// A container carrying both index flavors with different contents, to
/// observe which one a policy picks.
pub fn build_wacz_with_both_indexes() -> Vec<u8> {
    let cdxj = r#"com,example,cdxj)/ 20250101000000000 {"url": "https://cdxj.example/", "status": 200, "filename": "data.warc.gz"}"#;
    let cdx = r#"com,example,cdx)/ 20250101000000000 {"url": "https://cdx.example/", "status": 200, "filename": "data.warc.gz"}"#;
    ZipBuilder::new()
        .add_deflated("datapackage.json", fixture_datapackage().as_bytes())
        .add_stored("indexes/index.cdxj", cdxj.as_bytes())
        .add_stored("indexes/index.cdx", cdx.as_bytes())
        .add_stored("archive/data.warc.gz", &fixture_warc_gz())
        .finish()
}

/// Write a fixture container to a temp file and keep it alive.
pub fn write_fixture(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}
