//! Streaming state machine that turns body blocks into box-aligned chunks.

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use super::box_type::{BOX_HEADER_LEN, BoxHeader};
use super::error::ParseError;
use super::Chunk;

/// Per-attempt reassembly state: the bytes not yet resolved into a chunk.
///
/// Feed every body block to [`push`](Self::push) in arrival order, then call
/// [`finish`](Self::finish) once the stream ends. The remainder never ends on
/// a chunk boundary; anything that did would already have been yielded.
#[derive(Debug, Default)]
pub struct ChunkReassembler {
    remainder: BytesMut,
    consumed: u64,
    emitted: u64,
    failure: Option<ParseError>,
}

impl ChunkReassembler {
    /// Creates an empty reassembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a block and returns the chunks it completes.
    ///
    /// The whole buffered run is validated before anything is yielded, so a
    /// framing error never follows chunks of the same block.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] on an unknown box type or an impossible box
    /// size. The reassembler stays failed: later calls return the same error
    /// and the unconsumed bytes remain in [`remainder`](Self::remainder).
    pub fn push(&mut self, block: &[u8]) -> Result<Chunks, ParseError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        self.remainder.extend_from_slice(block);
        self.consumed += block.len() as u64;

        let ready_len = match scan_ready_len(&self.remainder) {
            Ok(len) => len,
            Err(error) => {
                let error = error.shifted(self.emitted);
                debug!(error = %error, buffered = self.remainder.len(), "chunk framing failed");
                self.failure = Some(error.clone());
                return Err(error);
            }
        };

        let ready = self.remainder.split_to(ready_len).freeze();
        self.emitted += ready_len as u64;
        trace!(
            block = block.len(),
            ready = ready_len,
            remainder = self.remainder.len(),
            "block reassembled"
        );

        Ok(Chunks { ready })
    }

    /// Flushes whatever is left once the stream has ended.
    ///
    /// The flushed chunk may not end on a `moov`/`mdat` boundary.
    ///
    /// # Errors
    ///
    /// Returns the stored [`ParseError`] if an earlier push failed.
    pub fn finish(&mut self) -> Result<Option<Chunk>, ParseError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        if self.remainder.is_empty() {
            return Ok(None);
        }
        let rest = self.remainder.split().freeze();
        self.emitted += rest.len() as u64;
        debug!(bytes = rest.len(), "flushing trailing partial chunk");
        Ok(Some(Chunk::new(rest)))
    }

    /// Bytes buffered but not yet yielded.
    #[must_use]
    pub fn remainder(&self) -> &[u8] {
        &self.remainder
    }

    /// Total bytes pushed so far.
    #[must_use]
    pub fn bytes_consumed(&self) -> u64 {
        self.consumed
    }

    /// Total bytes handed out as chunks so far.
    #[must_use]
    pub fn bytes_emitted(&self) -> u64 {
        self.emitted
    }
}

/// Lazy iterator over the chunks completed by one block.
#[derive(Debug)]
pub struct Chunks {
    ready: Bytes,
}

impl Iterator for Chunks {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.ready.is_empty() {
            return None;
        }
        // `ready` was validated by `scan_ready_len` and ends on a boundary.
        let mut offset = 0;
        while let Some(header) = BoxHeader::read(&self.ready, offset) {
            offset += header.size as usize;
            if header.box_type.closes_chunk() {
                return Some(Chunk::new(self.ready.split_to(offset)));
            }
        }
        Some(Chunk::new(std::mem::take(&mut self.ready)))
    }
}

/// Walks complete boxes from the start of `buf` and returns the length of the
/// prefix that ends at the last `moov`/`mdat` boundary.
fn scan_ready_len(buf: &[u8]) -> Result<usize, ParseError> {
    let mut offset = 0usize;
    let mut ready = 0usize;

    while let Some(header) = BoxHeader::read(buf, offset) {
        if !header.box_type.is_known() {
            return Err(ParseError::UnknownBox {
                box_type: header.box_type.as_string(),
                offset: offset as u64,
            });
        }
        if (header.size as usize) < BOX_HEADER_LEN {
            return Err(ParseError::InvalidBoxSize {
                box_type: header.box_type.as_string(),
                size: header.size,
                offset: offset as u64,
            });
        }

        let box_end = offset as u64 + u64::from(header.size);
        if box_end > buf.len() as u64 {
            break;
        }
        offset += header.size as usize;
        if header.box_type.closes_chunk() {
            ready = offset;
        }
    }

    Ok(ready)
}
