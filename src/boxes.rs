use serde::{Serialize, Serializer};
use std::fmt;

/// Four-byte box type code. Not necessarily printable (`©nam`, numeric
/// metadata keys).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const UUID: FourCC = FourCC(*b"uuid");

    /// Build a code from 1-4 Latin-1 characters, right-padded with spaces.
    pub fn parse(s: &str) -> Option<Self> {
        let mut out = [b' '; 4];
        let mut n = 0;
        for c in s.chars() {
            if n == 4 {
                return None;
            }
            out[n] = u8::try_from(u32::from(c)).ok()?;
            n += 1;
        }
        if n == 0 { None } else { Some(FourCC(out)) }
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Interpret the code as a big-endian integer (new-style metadata keys).
    pub fn as_u32(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    pub fn as_str_lossy(&self) -> String {
        self.0
            .iter()
            .map(|&c| match c {
                32..=126 | 0xa0..=0xff => char::from(c),
                _ => '.',
            })
            .collect()
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str_lossy())
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}

impl From<&[u8; 4]> for FourCC {
    fn from(b: &[u8; 4]) -> Self {
        FourCC(*b)
    }
}

impl Serialize for FourCC {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.as_str_lossy())
    }
}

/// Parsed box header, with every offset absolute within the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoxHeader {
    pub typ: FourCC,
    /// File offset of the first header byte.
    pub start: u64,
    /// Total size including header.
    pub size: u64,
    /// 8, or 16 for a 64-bit extended size.
    pub header_size: u64,
}

impl BoxHeader {
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.size)
    }

    pub fn content_start(&self) -> u64 {
        self.start + self.header_size
    }

    pub fn content_len(&self) -> u64 {
        self.size - self.header_size
    }
}
