//! Box-aligned chunk reassembly for CMAF-style segment streams.
//!
//! The transport delivers an undifferentiated byte stream; the consumer needs
//! units it can hand to a decoder as they arrive. A chunk is a run of complete
//! top-level boxes ending with a `moov` (initialization) or `mdat` (media)
//! box.
//!
//! # Example
//!
//! ```
//! use segment_loader::chunk::ChunkReassembler;
//!
//! let mut mdat = 16u32.to_be_bytes().to_vec();
//! mdat.extend_from_slice(b"mdat");
//! mdat.extend_from_slice(&[0u8; 8]);
//!
//! let mut reassembler = ChunkReassembler::new();
//! assert_eq!(reassembler.push(&mdat[..10]).unwrap().count(), 0);
//! let chunks: Vec<_> = reassembler.push(&mdat[10..]).unwrap().collect();
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].len(), 16);
//! ```

mod box_type;
mod error;
mod reassembler;

use std::ops::Deref;

use bytes::Bytes;

pub use box_type::{BOX_HEADER_LEN, BoxHeader, BoxType};
pub use error::ParseError;
pub use reassembler::{ChunkReassembler, Chunks};

/// An immutable, complete unit of the container format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk(Bytes);

impl Chunk {
    pub(crate) fn new(bytes: Bytes) -> Self {
        Self(bytes)
    }

    /// Returns the underlying shared buffer.
    #[must_use]
    pub fn bytes(&self) -> &Bytes {
        &self.0
    }

    /// Consumes the chunk and returns its buffer.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl Deref for Chunk {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Chunk {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
