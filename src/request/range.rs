//! Byte ranges as sent in the `Range` request header.

use std::fmt;

/// Inclusive byte range; an open end means "to the end of the resource".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    /// First byte offset.
    pub start: u64,
    /// Last byte offset, inclusive.
    pub end: Option<u64>,
}

impl ByteRange {
    /// Creates a range.
    #[must_use]
    pub fn new(start: u64, end: Option<u64>) -> Self {
        Self { start, end }
    }

    /// Returns the `Range` header value, e.g. `bytes=0-499`.
    #[must_use]
    pub fn header_value(&self) -> String {
        format!("bytes={self}")
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}-{end}", self.start),
            None => write!(f, "{}-", self.start),
        }
    }
}

impl std::str::FromStr for ByteRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches("bytes=");
        let Some((start, end)) = s.split_once('-') else {
            return Err(format!("invalid byte range: {s}"));
        };
        let start = start
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("invalid byte range start: {start}"))?;
        let end = match end.trim() {
            "" => None,
            value => Some(
                value
                    .parse::<u64>()
                    .map_err(|_| format!("invalid byte range end: {value}"))?,
            ),
        };
        if end.is_some_and(|end| end < start) {
            return Err(format!("byte range end before start: {s}"));
        }
        Ok(Self { start, end })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_range_header_value() {
        assert_eq!(ByteRange::new(0, Some(499)).header_value(), "bytes=0-499");
        assert_eq!(ByteRange::new(500, None).header_value(), "bytes=500-");
    }

    #[test]
    fn test_byte_range_parse() {
        assert_eq!("0-499".parse::<ByteRange>().unwrap(), ByteRange::new(0, Some(499)));
        assert_eq!("bytes=10-".parse::<ByteRange>().unwrap(), ByteRange::new(10, None));
        assert!("499-0".parse::<ByteRange>().is_err());
        assert!("abc".parse::<ByteRange>().is_err());
    }
}
