//! Top-level ISO BMFF box types accepted in a segment byte stream.

use std::fmt;

/// Size of the compact box header: 32-bit size followed by a four-character type.
pub const BOX_HEADER_LEN: usize = 8;

/// Four-character box type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoxType(pub [u8; 4]);

impl BoxType {
    pub const FTYP: Self = Self(*b"ftyp");
    pub const STYP: Self = Self(*b"styp");
    pub const MOOV: Self = Self(*b"moov");
    pub const MOOF: Self = Self(*b"moof");
    pub const MDAT: Self = Self(*b"mdat");
    pub const SKIP: Self = Self(*b"skip");
    pub const FREE: Self = Self(*b"free");
    pub const SIDX: Self = Self(*b"sidx");
    pub const SSIX: Self = Self(*b"ssix");
    pub const EMSG: Self = Self(*b"emsg");
    pub const PRFT: Self = Self(*b"prft");
    pub const MFRA: Self = Self(*b"mfra");
    pub const META: Self = Self(*b"meta");

    /// Every type that may appear at the top level of a segment.
    pub const KNOWN: [Self; 13] = [
        Self::FTYP,
        Self::STYP,
        Self::MOOV,
        Self::MOOF,
        Self::MDAT,
        Self::SKIP,
        Self::FREE,
        Self::SIDX,
        Self::SSIX,
        Self::EMSG,
        Self::PRFT,
        Self::MFRA,
        Self::META,
    ];

    /// Reads the type code from bytes 4..8 of a box header.
    #[must_use]
    pub fn from_header(header: &[u8; BOX_HEADER_LEN]) -> Self {
        Self([header[4], header[5], header[6], header[7]])
    }

    /// Returns true if the type is in the accepted top-level set.
    #[must_use]
    pub fn is_known(&self) -> bool {
        Self::KNOWN.contains(self)
    }

    /// Returns true if a complete box of this type ends a chunk.
    ///
    /// `moov` closes the initialization chunk, `mdat` closes each media chunk.
    #[must_use]
    pub fn closes_chunk(&self) -> bool {
        *self == Self::MOOV || *self == Self::MDAT
    }

    /// Returns the code as text, replacing non-ASCII bytes.
    #[must_use]
    pub fn as_string(&self) -> String {
        self.0
            .iter()
            .map(|&b| if b.is_ascii_graphic() { char::from(b) } else { '?' })
            .collect()
    }
}

impl fmt::Display for BoxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

/// Parsed compact box header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxHeader {
    /// Declared box size including the header.
    pub size: u32,
    /// Box type code.
    pub box_type: BoxType,
}

impl BoxHeader {
    /// Reads a header at `offset`, or `None` if fewer than 8 bytes remain.
    #[must_use]
    pub fn read(buf: &[u8], offset: usize) -> Option<Self> {
        let end = offset.checked_add(BOX_HEADER_LEN)?;
        let header: &[u8; BOX_HEADER_LEN] = buf.get(offset..end)?.try_into().ok()?;
        Some(Self {
            size: u32::from_be_bytes([header[0], header[1], header[2], header[3]]),
            box_type: BoxType::from_header(header),
        })
    }
}
