//! Vendor extension boxes: a 16-byte identifier at content offset 0 followed
//! by an identifier-specific payload.
//!
//! The screen-recording telemetry family stores a little-endian record
//! stream: `u32` one, `u32` stride, then either fixed-stride records
//! (`stride > 0`) or records each prefixed by a `u32` length (`stride == 0`).

use super::{Record, violation};
use crate::boxes::BoxHeader;
use crate::error::Result;
use crate::registry::BoxDecoder;
use crate::window::ByteWindow;
use byteorder::{LittleEndian, ReadBytesExt};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::sync::OnceLock;

pub type VendorId = [u8; 16];

/// Decodes one record of a telemetry stream. Errors carry the reason only.
pub type ItemDecoder = fn(&[u8]) -> std::result::Result<VendorItem, String>;

const TELEMETRY_PREFIX: [u8; 3] = [0x2b, 0x7b, 0x6a];

const TELEMETRY_SUFFIX: [u8; 12] = [
    0x7a, 0x1f, 0x11, 0xe2, 0x83, 0xd0, 0x00, 0x17, 0xf2, 0x00, 0xbe, 0x7f,
];

pub const XMP_ID: VendorId = [
    0xbe, 0x7a, 0xcf, 0xcb, 0x97, 0xa9, 0x42, 0xe8, 0x9c, 0x71, 0x99, 0x94, 0x91, 0xe3, 0xaf, 0xac,
];

/// Identifier of telemetry stream `tag` (`0xef`, `0xf0`, ...).
pub fn telemetry_id(tag: u8) -> VendorId {
    let mut id = [0u8; 16];
    id[..3].copy_from_slice(&TELEMETRY_PREFIX);
    id[3] = tag;
    id[4..].copy_from_slice(&TELEMETRY_SUFFIX);
    id
}

/// Canonical 8-4-4-4-12 rendering of an identifier.
pub fn format_id(id: &VendorId) -> String {
    let h = hex::encode(id);
    format!(
        "{}-{}-{}-{}-{}",
        &h[0..8],
        &h[8..12],
        &h[12..16],
        &h[16..20],
        &h[20..32]
    )
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum VendorItem {
    TimeTable {
        time: f64,
        values: [i32; 4],
    },
    MouseEvent {
        time: f64,
        code: u32,
    },
    CursorImage {
        time: f64,
        cursor_index: u32,
        hotspot: Option<(u32, u32)>,
        image_len: usize,
    },
    CursorPosition {
        time: f64,
        x: u32,
        y: u32,
    },
    Marker {
        time: f64,
        value: f64,
    },
    KeyStroke {
        time: f64,
        key_code: u32,
        modifier: u8,
    },
    Dimensions {
        width: u32,
        height: u32,
        #[serde(serialize_with = "hex_bytes")]
        other: Vec<u8>,
    },
    FocusedWindow {
        time: f64,
        left: i32,
        top: i32,
        width: u32,
        height: u32,
    },
    SlideTitle {
        time: f64,
        text: String,
    },
    SlideText {
        time: f64,
        text: String,
    },
    Note {
        time: f64,
        text: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VendorPayload {
    Telemetry {
        description: &'static str,
        stride: u32,
        items: Vec<VendorItem>,
    },
    Xmp {
        len: u64,
        packet: String,
    },
    Unknown {
        payload_offset: u64,
        payload_len: u64,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Extension {
    #[serde(serialize_with = "uuid_string")]
    pub id: VendorId,
    pub payload: VendorPayload,
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", format_id(&self.id))?;
        match &self.payload {
            VendorPayload::Telemetry {
                description,
                stride,
                items,
            } => {
                write!(f, "{description}: {} records (stride {stride})", items.len())?;
                for item in items.iter().take(3) {
                    write!(f, "\n{item:?}")?;
                }
                if items.len() > 3 {
                    write!(f, "\n...")?;
                }
                Ok(())
            }
            VendorPayload::Xmp { len, .. } => write!(f, "XMP packet, {len} bytes"),
            VendorPayload::Unknown {
                payload_offset,
                payload_len,
            } => write!(f, "unknown payload @{payload_offset} + {payload_len}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum VendorHandler {
    Telemetry {
        description: &'static str,
        item: ItemDecoder,
    },
    Xmp,
}

/// Identifier-keyed handlers for vendor extension payloads.
#[derive(Debug, Clone, Default)]
pub struct VendorTable {
    handlers: HashMap<VendorId, VendorHandler>,
}

impl VendorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, id: VendorId, handler: VendorHandler) -> Self {
        self.handlers.insert(id, handler);
        self
    }

    fn with_telemetry(self, tag: u8, description: &'static str, item: ItemDecoder) -> Self {
        self.with_handler(telemetry_id(tag), VendorHandler::Telemetry { description, item })
    }

    /// Exact identifier first. Any other identifier starting with a
    /// telemetry family prefix (`2b7b6aXX`) resolves to that stream's handler.
    pub fn get(&self, id: &VendorId) -> Option<&VendorHandler> {
        self.handlers.get(id).or_else(|| {
            (id[..3] == TELEMETRY_PREFIX)
                .then(|| self.handlers.get(&telemetry_id(id[3])))
                .flatten()
        })
    }

    pub fn standard() -> &'static VendorTable {
        static TABLE: OnceLock<VendorTable> = OnceLock::new();
        TABLE.get_or_init(|| {
            VendorTable::new()
                .with_telemetry(0xef, "time table", time_table)
                .with_telemetry(0xf0, "mouse events", mouse_event)
                .with_telemetry(0xf1, "cursor images", cursor_image)
                .with_telemetry(0xf2, "cursor positions", cursor_position)
                .with_telemetry(0xf3, "markers", marker)
                .with_telemetry(0xf5, "key strokes", key_stroke)
                .with_telemetry(0xf6, "recording dimensions", dimensions)
                .with_telemetry(0xf7, "focused window", focused_window)
                .with_telemetry(0xf8, "slide titles", slide_title)
                .with_telemetry(0xf9, "slide text", slide_text)
                .with_telemetry(0xfa, "speaker notes", note)
                .with_handler(XMP_ID, VendorHandler::Xmp)
        })
    }

    pub fn decode(&self, hdr: &BoxHeader, content: &mut ByteWindow) -> Result<Extension> {
        let id = content.read_structured::<VendorId>()?;
        let payload = content.rest();
        content.skip(payload.len())?;

        let payload = match self.get(&id) {
            Some(VendorHandler::Telemetry { description, item }) => {
                let (stride, items) = decode_stream(hdr, &payload.materialize()?, *item)?;
                VendorPayload::Telemetry {
                    description: *description,
                    stride,
                    items,
                }
            }
            Some(VendorHandler::Xmp) => VendorPayload::Xmp {
                len: payload.len(),
                packet: String::from_utf8_lossy(&payload.materialize()?).into_owned(),
            },
            None => {
                tracing::debug!(id = %format_id(&id), start = hdr.start, "unknown vendor id");
                VendorPayload::Unknown {
                    payload_offset: payload.start(),
                    payload_len: payload.len(),
                }
            }
        };
        Ok(Extension { id, payload })
    }
}

/// Split a telemetry payload into records and decode each one.
fn decode_stream(
    hdr: &BoxHeader,
    data: &[u8],
    item: ItemDecoder,
) -> Result<(u32, Vec<VendorItem>)> {
    let mut rdr = Cursor::new(data);
    let one = rdr
        .read_u32::<LittleEndian>()
        .map_err(|_| violation(hdr, "record stream header missing"))?;
    let stride = rdr
        .read_u32::<LittleEndian>()
        .map_err(|_| violation(hdr, "record stream header missing"))?;
    if one != 1 {
        return Err(violation(hdr, format!("record stream starts with {one}, not 1")));
    }

    let body = &data[8..];
    let blocks: Vec<&[u8]> = if stride > 0 {
        if body.len() % stride as usize != 0 {
            return Err(violation(
                hdr,
                format!("{} bytes is not a multiple of stride {stride}", body.len()),
            ));
        }
        body.chunks_exact(stride as usize).collect()
    } else {
        let mut blocks = Vec::new();
        let mut p = 0usize;
        while p < body.len() {
            if body.len() - p < 4 {
                return Err(violation(hdr, format!("block length cut off at {p}")));
            }
            let n = u32::from_le_bytes([body[p], body[p + 1], body[p + 2], body[p + 3]]) as usize;
            p += 4;
            if n > body.len() - p {
                return Err(violation(
                    hdr,
                    format!("block at {p} declares {n} bytes, {} left", body.len() - p),
                ));
            }
            blocks.push(&body[p..p + n]);
            p += n;
        }
        blocks
    };

    let items = blocks
        .into_iter()
        .enumerate()
        .map(|(i, b)| item(b).map_err(|reason| violation(hdr, format!("record {i}: {reason}"))))
        .collect::<Result<Vec<_>>>()?;
    Ok((stride, items))
}

pub struct UuidDecoder;

impl BoxDecoder for UuidDecoder {
    fn decode(&self, hdr: &BoxHeader, content: &mut ByteWindow) -> Result<Record> {
        VendorTable::standard()
            .decode(hdr, content)
            .map(Record::Extension)
    }
}

// ---------- record decoders ----------

type ItemResult = std::result::Result<VendorItem, String>;

fn short(_: std::io::Error) -> String {
    "record too short".to_string()
}

fn time_table(b: &[u8]) -> ItemResult {
    let mut r = Cursor::new(b);
    let time = r.read_f64::<LittleEndian>().map_err(short)?;
    let mut values = [0i32; 4];
    for v in &mut values {
        *v = r.read_i32::<LittleEndian>().map_err(short)?;
    }
    Ok(VendorItem::TimeTable { time, values })
}

fn mouse_event(b: &[u8]) -> ItemResult {
    let mut r = Cursor::new(b);
    Ok(VendorItem::MouseEvent {
        time: r.read_f64::<LittleEndian>().map_err(short)?,
        code: r.read_u32::<LittleEndian>().map_err(short)?,
    })
}

fn cursor_image(b: &[u8]) -> ItemResult {
    let mut r = Cursor::new(b);
    let time = r.read_f64::<LittleEndian>().map_err(short)?;
    let cursor_index = r.read_u32::<LittleEndian>().map_err(short)?;
    let high = r.read_u32::<LittleEndian>().map_err(short)?;
    let remlen = r.read_u32::<LittleEndian>().map_err(short)? as usize;
    if high != 0 {
        return Err(format!("cursor index high word is {high}"));
    }
    if remlen == 0 {
        return Ok(VendorItem::CursorImage {
            time,
            cursor_index,
            hotspot: None,
            image_len: 0,
        });
    }
    // hotspot, image, then a zero u32, all within remlen bytes after the fixed part
    if remlen < 12 || b.len() < 20 + remlen {
        return Err(format!("cursor image length {remlen} does not fit"));
    }
    let hx = r.read_u32::<LittleEndian>().map_err(short)?;
    let hy = r.read_u32::<LittleEndian>().map_err(short)?;
    let trailer_at = 20 + remlen - 4;
    let trailer = u32::from_le_bytes([
        b[trailer_at],
        b[trailer_at + 1],
        b[trailer_at + 2],
        b[trailer_at + 3],
    ]);
    if trailer != 0 {
        return Err(format!("cursor image trailer is {trailer}"));
    }
    Ok(VendorItem::CursorImage {
        time,
        cursor_index,
        hotspot: Some((hx, hy)),
        image_len: trailer_at - 28,
    })
}

fn cursor_position(b: &[u8]) -> ItemResult {
    let mut r = Cursor::new(b);
    Ok(VendorItem::CursorPosition {
        time: r.read_f64::<LittleEndian>().map_err(short)?,
        x: r.read_u32::<LittleEndian>().map_err(short)?,
        y: r.read_u32::<LittleEndian>().map_err(short)?,
    })
}

fn marker(b: &[u8]) -> ItemResult {
    let mut r = Cursor::new(b);
    Ok(VendorItem::Marker {
        time: r.read_f64::<LittleEndian>().map_err(short)?,
        value: r.read_f64::<LittleEndian>().map_err(short)?,
    })
}

fn key_stroke(b: &[u8]) -> ItemResult {
    let mut r = Cursor::new(b);
    let time = r.read_f64::<LittleEndian>().map_err(short)?;
    let key_code = r.read_u32::<LittleEndian>().map_err(short)?;
    let pad = r.read_u16::<LittleEndian>().map_err(short)?;
    let modifier = r.read_u8().map_err(short)?;
    let constant = r.read_u8().map_err(short)?;
    if pad != 0 || constant != 64 {
        return Err(format!("key stroke constants {pad}/{constant}, expected 0/64"));
    }
    Ok(VendorItem::KeyStroke {
        time,
        key_code,
        modifier,
    })
}

fn dimensions(b: &[u8]) -> ItemResult {
    if b.len() != 24 {
        return Err(format!("dimensions record is {} bytes, expected 24", b.len()));
    }
    let mut r = Cursor::new(&b[16..]);
    Ok(VendorItem::Dimensions {
        width: r.read_u32::<LittleEndian>().map_err(short)?,
        height: r.read_u32::<LittleEndian>().map_err(short)?,
        other: b[..16].to_vec(),
    })
}

fn focused_window(b: &[u8]) -> ItemResult {
    let mut r = Cursor::new(b);
    Ok(VendorItem::FocusedWindow {
        time: r.read_f64::<LittleEndian>().map_err(short)?,
        left: r.read_i32::<LittleEndian>().map_err(short)?,
        top: r.read_i32::<LittleEndian>().map_err(short)?,
        width: r.read_u32::<LittleEndian>().map_err(short)?,
        height: r.read_u32::<LittleEndian>().map_err(short)?,
    })
}

fn timed_text(b: &[u8]) -> std::result::Result<(f64, String), String> {
    let time = Cursor::new(b).read_f64::<LittleEndian>().map_err(short)?;
    Ok((time, String::from_utf8_lossy(&b[8..]).into_owned()))
}

fn slide_title(b: &[u8]) -> ItemResult {
    let (time, text) = timed_text(b)?;
    Ok(VendorItem::SlideTitle { time, text })
}

fn slide_text(b: &[u8]) -> ItemResult {
    let (time, text) = timed_text(b)?;
    Ok(VendorItem::SlideText { time, text })
}

fn note(b: &[u8]) -> ItemResult {
    let (time, text) = timed_text(b)?;
    Ok(VendorItem::Note { time, text })
}

fn hex_bytes<S: Serializer>(bytes: &[u8], s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(bytes))
}

fn uuid_string<S: Serializer>(id: &VendorId, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&format_id(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_ids_render_canonically() {
        assert_eq!(
            format_id(&telemetry_id(0xf6)),
            "2b7b6af6-7a1f-11e2-83d0-0017f200be7f"
        );
        assert_eq!(format_id(&XMP_ID), "be7acfcb-97a9-42e8-9c71-999491e3afac");
    }

    #[test]
    fn key_stroke_checks_constants() {
        let mut rec = 1.5f64.to_le_bytes().to_vec();
        rec.extend_from_slice(&0x41u32.to_le_bytes());
        rec.extend_from_slice(&[0, 0, 2, 64]);
        match key_stroke(&rec).unwrap() {
            VendorItem::KeyStroke {
                time,
                key_code,
                modifier,
            } => assert_eq!((time, key_code, modifier), (1.5, 0x41, 2)),
            other => panic!("unexpected {other:?}"),
        }
        rec[15] = 63;
        assert!(key_stroke(&rec).is_err());
    }

    #[test]
    fn cursor_image_locates_trailer() {
        let mut rec = 0.0f64.to_le_bytes().to_vec();
        rec.extend_from_slice(&7u32.to_le_bytes());
        rec.extend_from_slice(&0u32.to_le_bytes());
        rec.extend_from_slice(&16u32.to_le_bytes()); // hotspot 8 + image 4 + trailer 4
        rec.extend_from_slice(&3u32.to_le_bytes());
        rec.extend_from_slice(&5u32.to_le_bytes());
        rec.extend_from_slice(b"IMG!");
        rec.extend_from_slice(&0u32.to_le_bytes());
        match cursor_image(&rec).unwrap() {
            VendorItem::CursorImage {
                hotspot, image_len, ..
            } => {
                assert_eq!(hotspot, Some((3, 5)));
                assert_eq!(image_len, 4);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
