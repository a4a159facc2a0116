//! Error types for chunk reassembly.

use thiserror::Error;

/// Fatal framing errors found while walking the box stream.
///
/// Offsets are absolute positions in the request's body stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A box header names a type outside the accepted top-level set.
    #[error("`{box_type}` is not a legal top-level box type (at byte {offset})")]
    UnknownBox {
        /// The offending four-character code, lossily rendered.
        box_type: String,
        /// Stream offset of the box header.
        offset: u64,
    },

    /// A box declares a size smaller than its own header.
    #[error("box `{box_type}` declares invalid size {size} (at byte {offset})")]
    InvalidBoxSize {
        /// The box type code.
        box_type: String,
        /// The declared size.
        size: u32,
        /// Stream offset of the box header.
        offset: u64,
    },
}

impl ParseError {
    /// Returns the stream offset where framing broke.
    #[must_use]
    pub fn offset(&self) -> u64 {
        match self {
            Self::UnknownBox { offset, .. } | Self::InvalidBoxSize { offset, .. } => *offset,
        }
    }

    pub(super) fn shifted(self, by: u64) -> Self {
        match self {
            Self::UnknownBox { box_type, offset } => Self::UnknownBox {
                box_type,
                offset: offset + by,
            },
            Self::InvalidBoxSize {
                box_type,
                size,
                offset,
            } => Self::InvalidBoxSize {
                box_type,
                size,
                offset: offset + by,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_box_display() {
        let error = ParseError::UnknownBox {
            box_type: "abcd".to_string(),
            offset: 16,
        };
        let msg = error.to_string();
        assert!(msg.contains("abcd"), "Expected box type in: {msg}");
        assert!(msg.contains("16"), "Expected offset in: {msg}");
    }

    #[test]
    fn test_shifted_moves_offset() {
        let error = ParseError::InvalidBoxSize {
            box_type: "mdat".to_string(),
            size: 4,
            offset: 8,
        };
        assert_eq!(error.shifted(100).offset(), 108);
    }
}
