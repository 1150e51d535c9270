//! Range negotiation.
//!
//! # Responsibilities
//! - Parse the client's `Range` header (`bytes=<start>-<end>?`)
//! - Default to `bytes=0-` when the header is absent
//! - Clamp the window to the configured chunk ceiling
//!
//! # Design Decisions
//! - Pure function of its inputs; no I/O
//! - Only the first range of a multi-range header is honoured
//! - Suffix ranges (`bytes=-N`) need the resource length, which the proxy
//!   never has before fetching, so they are rejected

use thiserror::Error;

/// Inclusive byte window. `end == None` means "to the end of the resource".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    pub fn new(start: u64, end: Option<u64>) -> Self {
        Self { start, end }
    }

    /// Number of bytes covered, if the window is closed.
    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| end - self.start + 1)
    }

    /// Value for an outbound `Range` header.
    pub fn header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}-{}", self.start, end),
            None => write!(f, "{}-", self.start),
        }
    }
}

/// The `Range` header did not describe a usable byte window.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed Range header '{header}': {reason}")]
pub struct MalformedRange {
    pub header: String,
    pub reason: &'static str,
}

impl MalformedRange {
    fn new(header: &str, reason: &'static str) -> Self {
        Self {
            header: header.to_string(),
            reason,
        }
    }
}

/// Parse a `Range` header into an unclamped window.
pub fn parse_range(header: &str) -> Result<ByteRange, MalformedRange> {
    let spec = header
        .trim()
        .strip_prefix("bytes=")
        .ok_or_else(|| MalformedRange::new(header, "unit must be bytes"))?;

    // Multi-range requests are served as their first range.
    let first = spec.split(',').next().unwrap_or_default().trim();

    let (start, end) = first
        .split_once('-')
        .ok_or_else(|| MalformedRange::new(header, "missing '-'"))?;

    let start = start.trim();
    if start.is_empty() {
        return Err(MalformedRange::new(header, "suffix ranges are not supported"));
    }
    let start: u64 = start
        .parse()
        .map_err(|_| MalformedRange::new(header, "start is not a non-negative integer"))?;

    let end = match end.trim() {
        "" => None,
        end => {
            let end: u64 = end
                .parse()
                .map_err(|_| MalformedRange::new(header, "end is not a non-negative integer"))?;
            if end < start {
                return Err(MalformedRange::new(header, "end precedes start"));
            }
            Some(end)
        }
    };

    Ok(ByteRange { start, end })
}

/// Compute the window to request upstream.
///
/// An open end, or a span wider than `ceiling`, becomes `start + ceiling`,
/// so no upstream request covers more than `ceiling + 1` bytes.
pub fn negotiate(header: Option<&str>, ceiling: u64) -> Result<ByteRange, MalformedRange> {
    let requested = match header {
        Some(value) => parse_range(value)?,
        None => ByteRange::new(0, None),
    };

    let clamped_end = requested.start.saturating_add(ceiling);
    let end = match requested.end {
        Some(end) if end - requested.start <= ceiling => end,
        _ => clamped_end,
    };

    Ok(ByteRange::new(requested.start, Some(end)))
}
