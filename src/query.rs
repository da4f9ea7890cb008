//! Capture and file matching: polymorphic matchers, time/status/MIME
//! filters, and the nearest-time selection used by capture lookup.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::cdx::CaptureDescriptor;
use crate::error::{Error, Result};
use crate::zip::FileInfo;

/// Matcher over entry paths.
///
/// File paths are browsed, so a plain string matches by *substring*
/// containment. Captures use [`UrlMatch`], where a plain string is an
/// exact key; the asymmetry is intentional and callers rely on it.
pub enum PathMatch {
    Substring(String),
    Regex(Regex),
    Predicate(Box<dyn Fn(&FileInfo) -> bool + Send + Sync>),
}

impl PathMatch {
    /// Wrap an arbitrary predicate over the file listing.
    pub fn predicate(f: impl Fn(&FileInfo) -> bool + Send + Sync + 'static) -> Self {
        PathMatch::Predicate(Box::new(f))
    }

    pub fn matches(&self, info: &FileInfo) -> bool {
        match self {
            PathMatch::Substring(s) => info.path.contains(s.as_str()),
            PathMatch::Regex(re) => re.is_match(&info.path),
            PathMatch::Predicate(f) => f(info),
        }
    }
}

impl From<&str> for PathMatch {
    fn from(s: &str) -> Self {
        PathMatch::Substring(s.to_string())
    }
}

impl From<String> for PathMatch {
    fn from(s: String) -> Self {
        PathMatch::Substring(s)
    }
}

impl From<Regex> for PathMatch {
    fn from(re: Regex) -> Self {
        PathMatch::Regex(re)
    }
}

/// Matcher over capture URLs. A plain string matches by exact equality;
/// captures are keyed, not browsed.
pub enum UrlMatch {
    Exact(String),
    Regex(Regex),
    Predicate(Box<dyn Fn(&CaptureDescriptor) -> bool + Send + Sync>),
}

impl UrlMatch {
    /// Wrap an arbitrary predicate over capture descriptors.
    pub fn predicate(f: impl Fn(&CaptureDescriptor) -> bool + Send + Sync + 'static) -> Self {
        UrlMatch::Predicate(Box::new(f))
    }

    pub fn matches(&self, cap: &CaptureDescriptor) -> bool {
        match self {
            UrlMatch::Exact(s) => cap.url == *s,
            UrlMatch::Regex(re) => re.is_match(&cap.url),
            UrlMatch::Predicate(f) => f(cap),
        }
    }
}

impl From<&str> for UrlMatch {
    fn from(s: &str) -> Self {
        UrlMatch::Exact(s.to_string())
    }
}

impl From<String> for UrlMatch {
    fn from(s: String) -> Self {
        UrlMatch::Exact(s)
    }
}

impl From<Regex> for UrlMatch {
    fn from(re: Regex) -> Self {
        UrlMatch::Regex(re)
    }
}

/// A point in time given as epoch milliseconds, a `chrono` datetime, or
/// an ISO-parseable string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateLike {
    Millis(i64),
    Text(String),
}

impl DateLike {
    /// Resolve to milliseconds since the Unix epoch.
    pub fn epoch_millis(&self) -> Option<i64> {
        match self {
            DateLike::Millis(ms) => Some(*ms),
            DateLike::Text(s) => parse_date_millis(s),
        }
    }
}

impl From<i64> for DateLike {
    fn from(ms: i64) -> Self {
        DateLike::Millis(ms)
    }
}

impl From<&str> for DateLike {
    fn from(s: &str) -> Self {
        DateLike::Text(s.to_string())
    }
}

impl From<String> for DateLike {
    fn from(s: String) -> Self {
        DateLike::Text(s)
    }
}

impl<Tz: chrono::TimeZone> From<DateTime<Tz>> for DateLike {
    fn from(dt: DateTime<Tz>) -> Self {
        DateLike::Millis(dt.timestamp_millis())
    }
}

/// Parse a date-ish string to epoch milliseconds.
///
/// Accepted forms, in order: RFC 3339 (`2025-12-16T08:54:25.000Z`,
/// offsets allowed), a naive datetime with optional trailing `Z`, a bare
/// date with optional trailing `Z` (`1990-01-01Z`), and a 14-digit
/// `YYYYMMDDhhmmss` stamp. Everything else is unparseable.
pub(crate) fn parse_date_millis(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }

    let naive = s.strip_suffix('Z').unwrap_or(s);
    if let Ok(dt) = NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc().timestamp_millis());
    }
    if let Ok(d) = NaiveDate::parse_from_str(naive, "%Y-%m-%d") {
        return Some(d.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis());
    }
    if s.len() == 14 && s.bytes().all(|b| b.is_ascii_digit()) {
        // Expanded by hand; compact formats and flexible-width `%Y`
        // don't mix.
        let expanded = format!(
            "{}-{}-{}T{}:{}:{}",
            &s[0..4],
            &s[4..6],
            &s[6..8],
            &s[8..10],
            &s[10..12],
            &s[12..14]
        );
        if let Ok(dt) = NaiveDateTime::parse_from_str(&expanded, "%Y-%m-%dT%H:%M:%S") {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    None
}

/// Status filter: one exact code or set membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusFilter {
    One(u16),
    Any(Vec<u16>),
}

impl From<u16> for StatusFilter {
    fn from(code: u16) -> Self {
        StatusFilter::One(code)
    }
}

impl From<Vec<u16>> for StatusFilter {
    fn from(codes: Vec<u16>) -> Self {
        StatusFilter::Any(codes)
    }
}

/// MIME filter: exact string or regex.
pub enum MimeMatch {
    Exact(String),
    Regex(Regex),
}

impl From<&str> for MimeMatch {
    fn from(s: &str) -> Self {
        MimeMatch::Exact(s.to_string())
    }
}

impl From<String> for MimeMatch {
    fn from(s: String) -> Self {
        MimeMatch::Exact(s)
    }
}

impl From<Regex> for MimeMatch {
    fn from(re: Regex) -> Self {
        MimeMatch::Regex(re)
    }
}

/// Options for capture searches.
#[derive(Default)]
pub struct CaptureQuery {
    /// Lower time bound, inclusive.
    pub from: Option<DateLike>,
    /// Upper time bound, inclusive.
    pub to: Option<DateLike>,
    /// Stop after this many matches (deterministic prefix in index order).
    pub limit: Option<usize>,
    /// Keep only captures with this status / one of these statuses.
    pub status: Option<StatusFilter>,
    /// Keep only captures whose MIME matches.
    pub mime: Option<MimeMatch>,
}

impl CaptureQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(mut self, at: impl Into<DateLike>) -> Self {
        self.from = Some(at.into());
        self
    }

    pub fn to(mut self, at: impl Into<DateLike>) -> Self {
        self.to = Some(at.into());
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn status(mut self, filter: impl Into<StatusFilter>) -> Self {
        self.status = Some(filter.into());
        self
    }

    pub fn mime(mut self, filter: impl Into<MimeMatch>) -> Self {
        self.mime = Some(filter.into());
        self
    }

    /// Resolve the time bounds once, up front. Unparseable bounds are a
    /// caller mistake, not an index property.
    pub(crate) fn compile(&self) -> Result<CompiledQuery<'_>> {
        let from_ms = match &self.from {
            Some(d) => Some(d.epoch_millis().ok_or_else(|| {
                Error::usage(format!("unparseable 'from' bound: {:?}", d))
            })?),
            None => None,
        };
        let to_ms = match &self.to {
            Some(d) => Some(
                d.epoch_millis()
                    .ok_or_else(|| Error::usage(format!("unparseable 'to' bound: {:?}", d)))?,
            ),
            None => None,
        };
        Ok(CompiledQuery {
            from_ms,
            to_ms,
            limit: self.limit,
            status: self.status.as_ref(),
            mime: self.mime.as_ref(),
        })
    }
}

/// A query with its time bounds resolved to epoch milliseconds.
pub(crate) struct CompiledQuery<'q> {
    from_ms: Option<i64>,
    to_ms: Option<i64>,
    pub(crate) limit: Option<usize>,
    status: Option<&'q StatusFilter>,
    mime: Option<&'q MimeMatch>,
}

impl CompiledQuery<'_> {
    pub(crate) fn accepts(&self, cap: &CaptureDescriptor) -> bool {
        if self.from_ms.is_some() || self.to_ms.is_some() {
            // A capture whose timestamp cannot be placed on the timeline
            // cannot satisfy a time bound.
            let Some(ts) = parse_date_millis(&cap.ts) else {
                return false;
            };
            if self.from_ms.is_some_and(|from| ts < from) {
                return false;
            }
            if self.to_ms.is_some_and(|to| ts > to) {
                return false;
            }
        }

        match self.status {
            Some(StatusFilter::One(code)) if cap.status != Some(*code) => return false,
            Some(StatusFilter::Any(codes))
                if !cap.status.is_some_and(|s| codes.contains(&s)) =>
            {
                return false;
            }
            _ => {}
        }

        match self.mime {
            Some(MimeMatch::Exact(m)) if cap.mime.as_deref() != Some(m.as_str()) => return false,
            Some(MimeMatch::Regex(re)) if !re.is_match(cap.mime.as_deref().unwrap_or("")) => {
                return false;
            }
            _ => {}
        }

        true
    }
}

/// Lazy sequence of capture matches, in index order.
///
/// Stops as soon as `limit` matches have been yielded, making limited
/// queries a deterministic prefix rather than a sample.
pub struct CaptureMatches<'a> {
    pub(crate) inner: std::slice::Iter<'a, CaptureDescriptor>,
    pub(crate) matcher: UrlMatch,
    pub(crate) query: CompiledQuery<'a>,
    pub(crate) yielded: usize,
}

impl<'a> Iterator for CaptureMatches<'a> {
    type Item = &'a CaptureDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        if self.query.limit.is_some_and(|limit| self.yielded >= limit) {
            return None;
        }
        for cap in self.inner.by_ref() {
            if self.matcher.matches(cap) && self.query.accepts(cap) {
                self.yielded += 1;
                return Some(cap);
            }
        }
        None
    }
}

/// Strategy for resolving a capture near a requested instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NearestStrategy {
    /// Minimize `|ts - at|` over all candidates.
    #[default]
    Closest,
    /// Only captures at or before `at`.
    Before,
    /// Only captures at or after `at`.
    After,
}

/// Options for nearest-time capture lookup.
#[derive(Default)]
pub struct CaptureLookup {
    /// The requested instant; required.
    pub at: Option<DateLike>,
    pub strategy: NearestStrategy,
}

impl CaptureLookup {
    pub fn at(instant: impl Into<DateLike>) -> Self {
        CaptureLookup {
            at: Some(instant.into()),
            strategy: NearestStrategy::default(),
        }
    }

    pub fn strategy(mut self, strategy: NearestStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Pick the candidate minimizing `|ts - at|` under the strategy.
/// Ties go to the candidate encountered first, i.e. earliest in index
/// order. Candidates with unparseable timestamps are not placeable and
/// are ignored.
pub(crate) fn select_nearest<'a>(
    candidates: impl Iterator<Item = &'a CaptureDescriptor>,
    at_ms: i64,
    strategy: NearestStrategy,
) -> Option<&'a CaptureDescriptor> {
    let mut best: Option<(&'a CaptureDescriptor, i64)> = None;

    for cap in candidates {
        let Some(ts) = parse_date_millis(&cap.ts) else {
            continue;
        };
        let delta = ts - at_ms;
        match strategy {
            NearestStrategy::Before if delta > 0 => continue,
            NearestStrategy::After if delta < 0 => continue,
            _ => {}
        }
        let distance = delta.abs();
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((cap, distance));
        }
    }

    best.map(|(cap, _)| cap)
}
