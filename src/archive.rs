//! High-level WACZ archive access.
//!
//! [`WaczArchive`] owns the open container and orchestrates the lower
//! layers: the random-access ZIP parser, gzip decoding of WARC entries,
//! WARC framing, the capture index, and the query engine. One archive
//! handle is meant to serve one logical task at a time; the index and
//! parsed WARCs are cached write-once on first use.
//!
//! ## Example
//!
//! ```no_run
//! use waczio::{CaptureLookup, WaczArchive};
//!
//! # async fn example() -> waczio::Result<()> {
//! let archive = WaczArchive::open("collection.wacz").await?;
//!
//! let capture = archive
//!     .get_capture("https://www.iana.org/", &CaptureLookup::at("2025-12-16T08:54:25Z"))
//!     .await?
//!     .expect("no capture near that instant");
//!
//! let response = archive.open_capture(&capture).open_response().await?;
//! println!("{} ({} bytes)", response.status, response.body.len());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use tokio::sync::{Mutex, OnceCell};
use tokio_util::sync::CancellationToken;

use crate::cdx::{CaptureDescriptor, CaptureIndex};
use crate::error::{Error, Result};
use crate::io::{LocalFileReader, ReadAt};
use crate::query::{
    CaptureLookup, CaptureMatches, CaptureQuery, PathMatch, UrlMatch, select_nearest,
};
use crate::warc::{ArchivedResponse, ParsedWarc};
use crate::zip::{FileInfo, ZipEntry, ZipParser};

/// Preferred index entry, tried at `indexes/index.cdxj` then
/// `indexes/index.cdx`.
pub const CDXJ_INDEX_PATH: &str = "indexes/index.cdxj";
pub const CDX_INDEX_PATH: &str = "indexes/index.cdx";

const DATAPACKAGE_PATH: &str = "datapackage.json";

/// Compatibility fallback for descriptors that carry no WARC path of
/// their own (synthetic descriptors; index rows always name a file).
const FALLBACK_WARC_PATH: &str = "archive/data.warc.gz";

const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Which index file the archive should load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IndexPreference {
    /// Try `indexes/index.cdxj`, fall back to `indexes/index.cdx`.
    #[default]
    Cdxj,
    /// Only `indexes/index.cdx`.
    Cdx,
    /// No preference; treated like [`IndexPreference::Cdx`] for
    /// compatibility (an index is still required).
    None,
}

/// Options for opening an archive.
#[derive(Default)]
pub struct OpenOptions {
    prefer_index: IndexPreference,
    cancel: Option<CancellationToken>,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefer_index(mut self, preference: IndexPreference) -> Self {
        self.prefer_index = preference;
        self
    }

    /// Attach a cancellation token. Cancelling it makes in-flight and
    /// subsequent operations fail with [`Error::Cancelled`].
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// A read-only handle to one WACZ container.
///
/// Created by [`WaczArchive::open`]; destroyed by [`WaczArchive::close`]
/// or by dropping. Results of listing and capture queries are
/// deterministic: central-directory order for files, index-line order
/// for captures.
pub struct WaczArchive<R: ReadAt = LocalFileReader> {
    parser: ZipParser<R>,
    entries: Vec<ZipEntry>,
    entry_map: HashMap<String, usize>,
    files: Vec<FileInfo>,
    prefer_index: IndexPreference,
    cancel: CancellationToken,
    index: OnceCell<CaptureIndex>,
    datapackage: OnceCell<serde_json::Value>,
    warc_cache: Mutex<HashMap<String, Arc<ParsedWarc>>>,
}

impl<R: ReadAt> std::fmt::Debug for WaczArchive<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaczArchive")
            .field("entries", &self.entries.len())
            .field("files", &self.files.len())
            .finish_non_exhaustive()
    }
}

impl WaczArchive<LocalFileReader> {
    /// Open a WACZ container from a local path with default options.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, OpenOptions::default()).await
    }

    /// Open a WACZ container from a local path.
    pub async fn open_with_options(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let reader = Arc::new(LocalFileReader::new(path.as_ref())?);
        Self::from_reader(reader, options).await
    }
}

impl<R: ReadAt> WaczArchive<R> {
    /// Open a WACZ container from any random-access source.
    ///
    /// The central directory is read up front; entry data, the capture
    /// index, and WARC payloads are only touched on demand.
    pub async fn from_reader(reader: Arc<R>, options: OpenOptions) -> Result<Self> {
        let cancel = options.cancel.unwrap_or_default();
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let parser = ZipParser::new(reader);
        let entries = parser.entries().await?;

        let mut entry_map = HashMap::with_capacity(entries.len());
        let mut files = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            // Duplicate paths keep the first central-directory row.
            entry_map.entry(entry.name.clone()).or_insert(i);
            files.push(FileInfo::from(entry));
        }

        tracing::debug!(entries = entries.len(), "opened WACZ container");

        Ok(WaczArchive {
            parser,
            entries,
            entry_map,
            files,
            prefer_index: options.prefer_index,
            cancel,
            index: OnceCell::new(),
            datapackage: OnceCell::new(),
            warc_cache: Mutex::new(HashMap::new()),
        })
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    fn entry(&self, path: &str) -> Result<&ZipEntry> {
        self.entry_map
            .get(path)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| Error::not_found(path))
    }

    /// Snapshot of all files in the container, central-directory order.
    pub fn list_files(&self) -> Vec<FileInfo> {
        self.files.clone()
    }

    /// Files whose path matches. A plain string matches by substring.
    pub fn search_files(&self, matcher: impl Into<PathMatch>) -> Vec<FileInfo> {
        let matcher = matcher.into();
        self.files
            .iter()
            .filter(|f| matcher.matches(f))
            .cloned()
            .collect()
    }

    /// Whether any file matches.
    pub fn has_file(&self, matcher: impl Into<PathMatch>) -> bool {
        let matcher = matcher.into();
        self.files.iter().any(|f| matcher.matches(f))
    }

    /// Metadata for the entry at an exact path.
    pub fn get_file(&self, path: &str) -> Result<FileInfo> {
        self.entry(path).map(FileInfo::from)
    }

    /// The full uncompressed contents of the entry at an exact path.
    pub async fn read_file(&self, path: &str) -> Result<Bytes> {
        self.check_cancelled()?;
        let entry = self.entry(path)?;
        self.parser.read_entry(entry).await
    }

    /// The entry's uncompressed bytes as an ordered chunk stream.
    pub async fn stream_file(&self, path: &str) -> Result<EntryStream> {
        Ok(EntryStream {
            data: self.read_file(path).await?,
            pos: 0,
        })
    }

    /// The entry decoded as UTF-8 text.
    pub async fn get_text(&self, path: &str) -> Result<String> {
        let data = self.read_file(path).await?;
        String::from_utf8(data.to_vec())
            .map_err(|e| Error::Decode(format!("'{}' is not valid UTF-8: {}", path, e)))
    }

    /// The entry parsed as JSON.
    pub async fn get_json(&self, path: &str) -> Result<serde_json::Value> {
        let text = self.get_text(path).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// The container's `datapackage.json` metadata, parsed and memoized.
    pub async fn datapackage(&self) -> Result<&serde_json::Value> {
        self.datapackage
            .get_or_try_init(|| self.get_json(DATAPACKAGE_PATH))
            .await
    }

    /// The capture index, loaded and parsed on first use.
    async fn capture_index(&self) -> Result<&CaptureIndex> {
        self.index.get_or_try_init(|| self.load_index()).await
    }

    async fn load_index(&self) -> Result<CaptureIndex> {
        self.check_cancelled()?;

        let candidates: &[&str] = match self.prefer_index {
            IndexPreference::Cdxj => &[CDXJ_INDEX_PATH, CDX_INDEX_PATH],
            IndexPreference::Cdx | IndexPreference::None => &[CDX_INDEX_PATH],
        };

        for &path in candidates {
            if self.entry_map.contains_key(path) {
                let text = self.get_text(path).await?;
                tracing::debug!(path, "loading capture index");
                return Ok(CaptureIndex::parse(&text));
            }
        }

        Err(Error::container(format!(
            "no capture index found (looked for {})",
            candidates.join(", ")
        )))
    }

    /// Lazy sequence of captures matching `url` and `query`, in index
    /// order.
    pub async fn iterate_captures<'a>(
        &'a self,
        url: impl Into<UrlMatch>,
        query: &'a CaptureQuery,
    ) -> Result<CaptureMatches<'a>> {
        let compiled = query.compile()?;
        let index = self.capture_index().await?;
        Ok(CaptureMatches {
            inner: index.iter(),
            matcher: url.into(),
            query: compiled,
            yielded: 0,
        })
    }

    /// Captures matching `url` and `query`, collected in index order.
    pub async fn find_captures(
        &self,
        url: impl Into<UrlMatch>,
        query: &CaptureQuery,
    ) -> Result<Vec<CaptureDescriptor>> {
        Ok(self.iterate_captures(url, query).await?.cloned().collect())
    }

    /// The capture nearest the instant in `lookup.at` under the lookup
    /// strategy, or `None` when nothing qualifies.
    ///
    /// The candidate set ignores every other filter: nearest-time
    /// resolution works over all captures of the URL.
    pub async fn get_capture(
        &self,
        url: impl Into<UrlMatch>,
        lookup: &CaptureLookup,
    ) -> Result<Option<CaptureDescriptor>> {
        let at = lookup
            .at
            .as_ref()
            .ok_or_else(|| Error::usage("capture lookup requires 'at'"))?;
        let at_ms = at
            .epoch_millis()
            .ok_or_else(|| Error::usage(format!("unparseable 'at' instant: {:?}", at)))?;

        let unfiltered = CaptureQuery::new();
        let candidates = self.iterate_captures(url, &unfiltered).await?;
        Ok(select_nearest(candidates, at_ms, lookup.strategy).cloned())
    }

    /// A lightweight handle for reading one capture's stored response.
    pub fn open_capture(&self, descriptor: &CaptureDescriptor) -> Capture<'_, R> {
        Capture {
            archive: self,
            descriptor: descriptor.clone(),
        }
    }

    /// Load and frame a WARC entry, memoized per entry path.
    async fn parsed_warc(&self, path: &str) -> Result<Arc<ParsedWarc>> {
        // Held across the load: a given WARC is materialized at most
        // once, later callers reuse the cached parse.
        let mut cache = self.warc_cache.lock().await;
        if let Some(parsed) = cache.get(path) {
            tracing::debug!(path, "WARC cache hit");
            return Ok(Arc::clone(parsed));
        }

        self.check_cancelled()?;
        let raw = self.read_file(path).await?;
        let data = if path.ends_with(".gz") {
            gunzip(path, raw)?
        } else {
            raw
        };

        let parsed = Arc::new(ParsedWarc::parse(data));
        tracing::debug!(path, records = parsed.records().len(), "framed WARC entry");
        cache.insert(path.to_string(), Arc::clone(&parsed));
        Ok(parsed)
    }

    /// Release the handle.
    ///
    /// Consuming the archive ends its lifecycle: the file handle closes
    /// and the caches drop with it. Dropping the archive has the same
    /// effect; a closed archive cannot be used again.
    pub fn close(self) {
        tracing::debug!("closing WACZ container");
    }
}

/// One capture bound to its archive, ready to read the stored response.
pub struct Capture<'a, R: ReadAt> {
    archive: &'a WaczArchive<R>,
    descriptor: CaptureDescriptor,
}

impl<R: ReadAt> Capture<'_, R> {
    pub fn descriptor(&self) -> &CaptureDescriptor {
        &self.descriptor
    }

    /// Read the captured HTTP response for this capture.
    ///
    /// Resolves the WARC entry (the descriptor's path, or the
    /// compatibility fallback `archive/data.warc.gz`), frames it, and
    /// looks up the record keyed `url|ts`.
    pub async fn open_response(&self) -> Result<ArchivedResponse> {
        let warc_path = self
            .descriptor
            .warc_path
            .as_deref()
            .unwrap_or(FALLBACK_WARC_PATH);

        let parsed = self.archive.parsed_warc(warc_path).await?;
        let record = parsed
            .get(&self.descriptor.url, &self.descriptor.ts)
            .ok_or_else(|| {
                Error::not_found(format!(
                    "no record for {} at {} in '{}'",
                    self.descriptor.url, self.descriptor.ts, warc_path
                ))
            })?;

        Ok(ArchivedResponse::parse(record.payload.clone()))
    }
}

/// Ordered chunks of one entry's uncompressed bytes.
///
/// Chunks are zero-copy slices of the materialized entry.
pub struct EntryStream {
    data: Bytes,
    pos: usize,
}

impl EntryStream {
    /// The next chunk, or `None` once the entry is exhausted.
    pub fn next_chunk(&mut self) -> Option<Bytes> {
        if self.pos >= self.data.len() {
            return None;
        }
        let end = (self.pos + STREAM_CHUNK_SIZE).min(self.data.len());
        let chunk = self.data.slice(self.pos..end);
        self.pos = end;
        Some(chunk)
    }

    /// Bytes not yet yielded.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

fn gunzip(path: &str, data: Bytes) -> Result<Bytes> {
    // WARC gzip entries are typically one member per record, so the
    // multi-member decoder is required to read past the first record.
    let mut decoder = MultiGzDecoder::new(&data[..]);
    let mut out = Vec::with_capacity(data.len() * 4);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::container(format!("gunzip failed for '{}': {}", path, e)))?;
    Ok(Bytes::from(out))
}
