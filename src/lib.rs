//! # waczio
//!
//! A read-only access library for WACZ (Web Archive Collection Zipped)
//! containers.
//!
//! A WACZ is a ZIP file carrying WARC payload files, CDX/CDXJ index
//! files, and a `datapackage.json` manifest. This crate opens such a
//! container in place and resolves web captures without extracting
//! anything to disk: ZIP entries are read with random access, WARC
//! entries are gunzipped and framed on first touch, and the CDX index
//! keeps capture queries from scanning any WARC at all.
//!
//! ## Features
//!
//! - List and search files inside the container
//! - Find HTTP captures by URL (exact, regex, or predicate), time
//!   range, status, and MIME type
//! - Resolve a URL + timestamp to a specific captured response and read
//!   its status, headers, and body
//! - Supports STORED and DEFLATE entries, ZIP64 containers, and
//!   gzip-compressed WARCs
//!
//! ## Example
//!
//! ```no_run
//! use waczio::{CaptureLookup, CaptureQuery, WaczArchive};
//!
//! #[tokio::main]
//! async fn main() -> waczio::Result<()> {
//!     let archive = WaczArchive::open("collection.wacz").await?;
//!
//!     // Everything the container holds
//!     for file in archive.list_files() {
//!         println!("{} ({} bytes)", file.path, file.size);
//!     }
//!
//!     // All 200s for a page
//!     let captures = archive
//!         .find_captures(
//!             "https://www.iana.org/",
//!             &CaptureQuery::new().status(200u16),
//!         )
//!         .await?;
//!     println!("{} captures", captures.len());
//!
//!     // The capture nearest an instant, and its stored response
//!     if let Some(capture) = archive
//!         .get_capture("https://www.iana.org/", &CaptureLookup::at("2025-12-16T08:54:25Z"))
//!         .await?
//!     {
//!         let response = archive.open_capture(&capture).open_response().await?;
//!         println!("{} -> {}", capture.url, response.status);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod cdx;
pub mod error;
pub mod io;
pub mod query;
pub mod warc;
pub mod zip;

pub use archive::{Capture, EntryStream, IndexPreference, OpenOptions, WaczArchive};
pub use cdx::{CaptureDescriptor, CaptureIndex};
pub use error::{Error, Result};
pub use io::{LocalFileReader, ReadAt};
pub use query::{
    CaptureLookup, CaptureMatches, CaptureQuery, DateLike, MimeMatch, NearestStrategy, PathMatch,
    StatusFilter, UrlMatch,
};
pub use warc::{ArchivedResponse, ParsedWarc, WarcRecord};
pub use zip::FileInfo;

pub use tokio_util::sync::CancellationToken;
