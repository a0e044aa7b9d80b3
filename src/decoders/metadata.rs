//! Item metadata: the `keys` table of a `meta` box and the typed `data`
//! boxes carried by `ilst` items.

use super::{Record, expect_version, read_full_header, violation};
use crate::boxes::{BoxHeader, FourCC};
use crate::error::Result;
use crate::registry::BoxDecoder;
use crate::util::escape_bytes;
use crate::window::ByteWindow;
use serde::{Serialize, Serializer};
use std::fmt;

// ---------- keys ----------

#[derive(Debug, Clone, Serialize)]
pub struct MetadataKey {
    pub namespace: FourCC,
    #[serde(serialize_with = "lossy_text")]
    pub name: Vec<u8>,
}

impl MetadataKey {
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetadataKeys {
    pub keys: Vec<MetadataKey>,
}

impl MetadataKeys {
    /// Look up an item index as used by `ilst` children. Indices are 1-based.
    pub fn get(&self, index: u32) -> Option<&MetadataKey> {
        index
            .checked_sub(1)
            .and_then(|i| self.keys.get(i as usize))
    }
}

impl fmt::Display for MetadataKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} keys", self.keys.len())?;
        for (i, k) in self.keys.iter().enumerate() {
            write!(f, "\n[{}] {} {}", i + 1, k.namespace, escape_bytes(&k.name))?;
        }
        Ok(())
    }
}

pub struct KeysDecoder;

impl BoxDecoder for KeysDecoder {
    fn decode(&self, hdr: &BoxHeader, content: &mut ByteWindow) -> Result<Record> {
        let (version, _flags) = read_full_header(content)?;
        expect_version(hdr, version, &[0])?;
        let count = content.read_u32()?;

        let mut keys = Vec::with_capacity(count.min(256) as usize);
        for i in 0..count {
            let (size, namespace) = content.read_structured::<(u32, FourCC)>()?;
            if size < 8 {
                return Err(violation(hdr, format!("key {} has size {size}", i + 1)));
            }
            let name = content.read_bytes(size as usize - 8)?;
            keys.push(MetadataKey { namespace, name });
        }

        if content.remaining() != 0 {
            return Err(violation(
                hdr,
                format!("{} bytes after {count} keys", content.remaining()),
            ));
        }
        Ok(Record::MetadataKeys(MetadataKeys { keys }))
    }
}

// ---------- data ----------

/// Well-known type indicators of a `data` box.
pub mod well_known {
    pub const UTF8: u32 = 1;
    pub const UTF16: u32 = 2;
    pub const JPEG: u32 = 13;
    pub const PNG: u32 = 14;
    pub const BE_SIGNED: u32 = 21;
    pub const BE_UNSIGNED: u32 = 22;
    pub const BE_FLOAT32: u32 = 23;
    pub const BE_FLOAT64: u32 = 24;
    pub const BMP: u32 = 27;
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MetadataPayload {
    Text(String),
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    Image {
        format: &'static str,
        len: u64,
    },
    #[serde(serialize_with = "hex_bytes")]
    Binary(Vec<u8>),
}

impl fmt::Display for MetadataPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataPayload::Text(s) => write!(f, "{s:?}"),
            MetadataPayload::Signed(v) => write!(f, "{v}"),
            MetadataPayload::Unsigned(v) => write!(f, "{v}"),
            MetadataPayload::Float(v) => write!(f, "{v}"),
            MetadataPayload::Image { format, len } => write!(f, "<{format} image, {len} bytes>"),
            MetadataPayload::Binary(b) => write!(f, "{}", escape_bytes(b)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetadataValue {
    pub type_indicator: u32,
    pub locale: u32,
    pub payload: MetadataPayload,
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type={} {}", self.type_indicator, self.payload)
    }
}

pub struct DataDecoder;

impl BoxDecoder for DataDecoder {
    fn decode(&self, hdr: &BoxHeader, content: &mut ByteWindow) -> Result<Record> {
        let (version, type_indicator) = read_full_header(content)?;
        expect_version(hdr, version, &[0])?;
        let locale = content.read_u32()?;
        let body = content.rest();
        content.skip(body.len())?;

        use well_known::*;
        let payload = match type_indicator {
            UTF8 => MetadataPayload::Text(String::from_utf8_lossy(&body.materialize()?).into_owned()),
            UTF16 => {
                let bytes = body.materialize()?;
                if bytes.len() % 2 != 0 {
                    return Err(violation(hdr, "odd length UTF-16 payload"));
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                MetadataPayload::Text(String::from_utf16_lossy(&units))
            }
            JPEG => image("jpeg", &body),
            PNG => image("png", &body),
            BMP => image("bmp", &body),
            BE_SIGNED => MetadataPayload::Signed(read_signed(hdr, &body.materialize()?)?),
            BE_UNSIGNED => MetadataPayload::Unsigned(read_unsigned(hdr, &body.materialize()?)?),
            BE_FLOAT32 => {
                let mut body = body;
                let v = f32::from_bits(body.read_u32()?);
                MetadataPayload::Float(v as f64)
            }
            BE_FLOAT64 => {
                let mut body = body;
                MetadataPayload::Float(f64::from_bits(body.read_u64()?))
            }
            _ => MetadataPayload::Binary(body.materialize()?),
        };

        Ok(Record::MetadataValue(MetadataValue {
            type_indicator,
            locale,
            payload,
        }))
    }
}

fn image(format: &'static str, body: &ByteWindow) -> MetadataPayload {
    MetadataPayload::Image {
        format,
        len: body.len(),
    }
}

fn read_unsigned(hdr: &BoxHeader, bytes: &[u8]) -> Result<u64> {
    match bytes.len() {
        1 | 2 | 3 | 4 | 8 => Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)),
        n => Err(violation(hdr, format!("{n}-byte integer"))),
    }
}

fn read_signed(hdr: &BoxHeader, bytes: &[u8]) -> Result<i64> {
    let raw = read_unsigned(hdr, bytes)?;
    let bits = bytes.len() as u32 * 8;
    // sign-extend from the payload width
    let shift = 64 - bits;
    Ok(((raw << shift) as i64) >> shift)
}

fn lossy_text<S: Serializer>(bytes: &[u8], s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&String::from_utf8_lossy(bytes))
}

fn hex_bytes<S: Serializer>(bytes: &[u8], s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hdr() -> BoxHeader {
        BoxHeader {
            typ: FourCC(*b"data"),
            start: 0,
            size: 8,
            header_size: 8,
        }
    }

    #[test]
    fn integers_sign_extend_by_width() {
        assert_eq!(read_signed(&hdr(), &[0xff]).unwrap(), -1);
        assert_eq!(read_signed(&hdr(), &[0x7f, 0xff]).unwrap(), 0x7fff);
        assert_eq!(read_signed(&hdr(), &[0xff, 0xff, 0xfe]).unwrap(), -2);
        assert_eq!(read_unsigned(&hdr(), &[0x01, 0x00]).unwrap(), 256);
        assert!(read_unsigned(&hdr(), &[0; 5]).is_err());
    }

    #[test]
    fn keys_are_one_based() {
        let keys = MetadataKeys {
            keys: vec![MetadataKey {
                namespace: FourCC(*b"mdta"),
                name: b"com.apple.quicktime.make".to_vec(),
            }],
        };
        assert!(keys.get(0).is_none());
        assert_eq!(keys.get(1).unwrap().name_lossy(), "com.apple.quicktime.make");
        assert!(keys.get(2).is_none());
    }
}
