//! HTTP byte ranges (RFC 9110 section 14).
//!
//! Only single ranges are modeled. A multi-range or malformed `Range` header
//! parses to `None`, which means "serve the whole document".

use std::fmt;

/// A single requested byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=start-end`, both inclusive
    Bounded { start: u64, end: u64 },
    /// `bytes=start-`
    From { start: u64 },
    /// `bytes=-len`: the last `len` bytes
    Suffix { len: u64 },
}

/// Requested range resolved against a known document length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start: u64,
    /// Inclusive
    pub end: u64,
}

impl ResolvedRange {
    pub fn len(&self) -> u64 {
        (self.end - self.start).saturating_add(1)
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// The range lies entirely outside the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unsatisfiable;

impl ByteRange {
    /// Parse a `Range` header value.
    pub fn parse(header: &str) -> Option<Self> {
        let set = header.trim().strip_prefix("bytes=")?.trim();
        if set.contains(',') {
            return None;
        }
        let (start, end) = set.split_once('-')?;
        let (start, end) = (start.trim(), end.trim());

        match (start.is_empty(), end.is_empty()) {
            (true, true) => None,
            (true, false) => {
                let len = end.parse().ok()?;
                (len > 0).then_some(Self::Suffix { len })
            }
            (false, true) => Some(Self::From {
                start: start.parse().ok()?,
            }),
            (false, false) => {
                let start = start.parse().ok()?;
                let end = end.parse().ok()?;
                (start <= end).then_some(Self::Bounded { start, end })
            }
        }
    }

    /// Resolve against a document of `total` bytes.
    pub fn resolve(&self, total: u64) -> Result<ResolvedRange, Unsatisfiable> {
        if total == 0 {
            return Err(Unsatisfiable);
        }
        let last = total - 1;
        match *self {
            Self::Bounded { start, end } if start <= last => Ok(ResolvedRange {
                start,
                end: end.min(last),
            }),
            Self::From { start } if start <= last => Ok(ResolvedRange { start, end: last }),
            Self::Suffix { len } => Ok(ResolvedRange {
                start: total.saturating_sub(len),
                end: last,
            }),
            _ => Err(Unsatisfiable),
        }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded { start, end } => write!(f, "bytes={start}-{end}"),
            Self::From { start } => write!(f, "bytes={start}-"),
            Self::Suffix { len } => write!(f, "bytes=-{len}"),
        }
    }
}

/// `Content-Range` of a partial response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    /// Inclusive
    pub end: u64,
    /// Complete length, when known
    pub total: Option<u64>,
}

impl ContentRange {
    pub fn new(range: ResolvedRange, total: u64) -> Self {
        Self {
            start: range.start,
            end: range.end,
            total: Some(total),
        }
    }

    /// Parse `bytes start-end/total` (total may be `*`).
    pub fn parse(header: &str) -> Option<Self> {
        let rest = header.trim().strip_prefix("bytes ")?;
        let (span, total) = rest.split_once('/')?;
        let (start, end) = span.split_once('-')?;
        let start: u64 = start.trim().parse().ok()?;
        let end: u64 = end.trim().parse().ok()?;
        // An inclusive end of u64::MAX has no representable length
        if start > end || end == u64::MAX {
            return None;
        }
        let total = match total.trim() {
            "*" => None,
            t => Some(t.parse().ok()?),
        };
        Some(Self { start, end, total })
    }

    pub fn len(&self) -> u64 {
        (self.end - self.start).saturating_add(1)
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Value for a `416` response: `bytes */total`.
    pub fn unsatisfied(total: u64) -> String {
        format!("bytes */{total}")
    }
}

impl fmt::Display for ContentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.total {
            Some(total) => write!(f, "bytes {}-{}/{}", self.start, self.end, total),
            None => write!(f, "bytes {}-{}/*", self.start, self.end),
        }
    }
}
