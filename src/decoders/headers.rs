//! File type, movie/track/media header, handler and edit list decoders.

use super::{
    Record, expect_len, expect_version, expect_zero, fixed_8_8, fixed_16_16, mac_time,
    read_full_header, read_matrix, violation,
};
use crate::boxes::{BoxHeader, FourCC};
use crate::error::Result;
use crate::registry::BoxDecoder;
use crate::util::Abbrev;
use crate::window::ByteWindow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

// ---------- ftyp ----------

#[derive(Debug, Clone, Serialize)]
pub struct FileType {
    pub major_brand: FourCC,
    pub minor_version: u32,
    pub compatible_brands: Vec<FourCC>,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "major={} minor={} compatible={}",
            self.major_brand,
            self.minor_version,
            Abbrev(&self.compatible_brands)
        )
    }
}

pub struct FtypDecoder;

impl BoxDecoder for FtypDecoder {
    fn decode(&self, hdr: &BoxHeader, content: &mut ByteWindow) -> Result<Record> {
        let (major_brand, minor_version) = content.read_structured::<(FourCC, u32)>()?;
        if content.remaining() % 4 != 0 {
            return Err(violation(
                hdr,
                format!("{} trailing bytes after brand list", content.remaining() % 4),
            ));
        }
        let mut compatible_brands = Vec::new();
        while content.remaining() > 0 {
            compatible_brands.push(content.read_fourcc()?);
        }
        Ok(Record::FileType(FileType {
            major_brand,
            minor_version,
            compatible_brands,
        }))
    }
}

// ---------- mvhd ----------

#[derive(Debug, Clone, Serialize)]
pub struct MovieHeader {
    pub version: u8,
    pub flags: u32,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub timescale: u32,
    pub duration: u64,
    pub rate: f64,
    pub volume: f64,
    pub matrix: [f64; 9],
    pub preview_time: u32,
    pub preview_duration: u32,
    pub poster_time: u32,
    pub selection_time: u32,
    pub selection_duration: u32,
    pub current_time: u32,
    pub next_track_id: u32,
}

impl MovieHeader {
    pub fn duration_seconds(&self) -> Option<f64> {
        (self.timescale != 0).then(|| self.duration as f64 / self.timescale as f64)
    }
}

impl fmt::Display for MovieHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "version={} created={} modified={} timescale={} duration={} rate={} volume={} next_track_id={}",
            self.version,
            self.created.to_rfc3339(),
            self.modified.to_rfc3339(),
            self.timescale,
            self.duration,
            self.rate,
            self.volume,
            self.next_track_id
        )
    }
}

/// Read creation time, modification time, timescale and duration. Version 1
/// widens the times and the duration to 64 bits.
fn read_times(
    hdr: &BoxHeader,
    content: &mut ByteWindow,
    version: u8,
) -> Result<(DateTime<Utc>, DateTime<Utc>, u32, u64)> {
    let (created, modified, timescale, duration) = if version == 1 {
        content.read_structured::<(u64, u64, u32, u64)>()?
    } else {
        let (c, m, ts, d) = content.read_structured::<(u32, u32, u32, u32)>()?;
        (c as u64, m as u64, ts, d as u64)
    };
    Ok((
        mac_time(hdr, created)?,
        mac_time(hdr, modified)?,
        timescale,
        duration,
    ))
}

pub struct MvhdDecoder;

impl BoxDecoder for MvhdDecoder {
    fn decode(&self, hdr: &BoxHeader, content: &mut ByteWindow) -> Result<Record> {
        let (version, flags) = read_full_header(content)?;
        expect_version(hdr, version, &[0, 1])?;
        expect_len(hdr, content, if version == 1 { 112 } else { 100 })?;

        let (created, modified, timescale, duration) = read_times(hdr, content, version)?;
        let (rate, volume) = content.read_structured::<(u32, u16)>()?;
        expect_zero(hdr, "mvhd.reserved", &content.read_bytes(10)?)?;
        let matrix = read_matrix(content)?;
        let (preview_time, preview_duration, poster_time) =
            content.read_structured::<(u32, u32, u32)>()?;
        let (selection_time, selection_duration, current_time, next_track_id) =
            content.read_structured::<(u32, u32, u32, u32)>()?;

        Ok(Record::MovieHeader(MovieHeader {
            version,
            flags,
            created,
            modified,
            timescale,
            duration,
            rate: fixed_16_16(rate),
            volume: fixed_8_8(volume),
            matrix,
            preview_time,
            preview_duration,
            poster_time,
            selection_time,
            selection_duration,
            current_time,
            next_track_id,
        }))
    }
}

// ---------- tkhd ----------

#[derive(Debug, Clone, Serialize)]
pub struct TrackHeader {
    pub version: u8,
    pub flags: u32,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub track_id: u32,
    pub duration: u64,
    pub layer: i16,
    pub alternate_group: i16,
    pub volume: f64,
    pub matrix: [f64; 9],
    pub width: f64,
    pub height: f64,
}

impl TrackHeader {
    pub fn enabled(&self) -> bool {
        self.flags & 0x1 != 0
    }
}

impl fmt::Display for TrackHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "version={} flags=0x{:06x} track_id={} duration={} volume={} width={} height={}",
            self.version,
            self.flags,
            self.track_id,
            self.duration,
            self.volume,
            self.width,
            self.height
        )
    }
}

pub struct TkhdDecoder;

impl BoxDecoder for TkhdDecoder {
    fn decode(&self, hdr: &BoxHeader, content: &mut ByteWindow) -> Result<Record> {
        let (version, flags) = read_full_header(content)?;
        expect_version(hdr, version, &[0, 1])?;
        expect_len(hdr, content, if version == 1 { 96 } else { 84 })?;

        // track_id sits between modification time and a reserved word, then
        // the duration follows.
        let (created, modified) = if version == 1 {
            let (c, m) = content.read_structured::<(u64, u64)>()?;
            (c, m)
        } else {
            let (c, m) = content.read_structured::<(u32, u32)>()?;
            (c as u64, m as u64)
        };
        let (track_id, reserved) = content.read_structured::<(u32, [u8; 4])>()?;
        expect_zero(hdr, "tkhd.reserved1", &reserved)?;
        let duration = if version == 1 {
            content.read_u64()?
        } else {
            content.read_u32()? as u64
        };
        expect_zero(hdr, "tkhd.reserved2", &content.read_bytes(8)?)?;
        let (layer, alternate_group, volume, reserved) =
            content.read_structured::<(i16, i16, u16, [u8; 2])>()?;
        expect_zero(hdr, "tkhd.reserved3", &reserved)?;
        let matrix = read_matrix(content)?;
        let (width, height) = content.read_structured::<(u32, u32)>()?;

        Ok(Record::TrackHeader(TrackHeader {
            version,
            flags,
            created: mac_time(hdr, created)?,
            modified: mac_time(hdr, modified)?,
            track_id,
            duration,
            layer,
            alternate_group,
            volume: fixed_8_8(volume),
            matrix,
            width: fixed_16_16(width),
            height: fixed_16_16(height),
        }))
    }
}

// ---------- mdhd ----------

#[derive(Debug, Clone, Serialize)]
pub struct MediaHeader {
    pub version: u8,
    pub flags: u32,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub timescale: u32,
    pub duration: u64,
    pub language: String,
    pub quality: u16,
}

impl fmt::Display for MediaHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "version={} created={} timescale={} duration={} language={}",
            self.version,
            self.created.to_rfc3339(),
            self.timescale,
            self.duration,
            self.language
        )
    }
}

/// Packed ISO-639-2/T code, or a Macintosh language code below 0x400.
pub fn language_from_u16(code: u16) -> String {
    if code == 0 || code == 0x7fff {
        return "und".to_string();
    }
    if code < 0x400 {
        return format!("mac:{code}");
    }
    let c1 = ((code >> 10) & 0x1F) as u8 + 0x60;
    let c2 = ((code >> 5) & 0x1F) as u8 + 0x60;
    let c3 = (code & 0x1F) as u8 + 0x60;
    format!("{}{}{}", c1 as char, c2 as char, c3 as char)
}

pub struct MdhdDecoder;

impl BoxDecoder for MdhdDecoder {
    fn decode(&self, hdr: &BoxHeader, content: &mut ByteWindow) -> Result<Record> {
        let (version, flags) = read_full_header(content)?;
        expect_version(hdr, version, &[0, 1])?;
        expect_len(hdr, content, if version == 1 { 36 } else { 24 })?;

        let (created, modified, timescale, duration) = read_times(hdr, content, version)?;
        let (language, quality) = content.read_structured::<(u16, u16)>()?;

        Ok(Record::MediaHeader(MediaHeader {
            version,
            flags,
            created,
            modified,
            timescale,
            duration,
            language: language_from_u16(language),
            quality,
        }))
    }
}

// ---------- hdlr ----------

#[derive(Debug, Clone, Serialize)]
pub struct HandlerReference {
    pub version: u8,
    pub flags: u32,
    /// QuickTime component type (`mhlr`, `dhlr`); all zero in ISO files.
    pub component_type: FourCC,
    pub handler_type: FourCC,
    pub name: String,
}

impl fmt::Display for HandlerReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler={} name={:?}", self.handler_type, self.name)
    }
}

pub struct HdlrDecoder;

impl BoxDecoder for HdlrDecoder {
    fn decode(&self, hdr: &BoxHeader, content: &mut ByteWindow) -> Result<Record> {
        let (version, flags) = read_full_header(content)?;
        expect_version(hdr, version, &[0])?;
        let (component_type, handler_type) = content.read_structured::<(FourCC, FourCC)>()?;
        // manufacturer, component flags, flags mask
        content.skip(12)?;

        let name = if component_type.0 == [0; 4] {
            content.read_cstring()?
        } else {
            // QuickTime names are Pascal strings.
            if content.remaining() == 0 {
                Vec::new()
            } else {
                let n = content.read_u8()? as u64;
                if n > content.remaining() {
                    return Err(violation(
                        hdr,
                        format!(
                            "name length {n} exceeds {} remaining bytes",
                            content.remaining()
                        ),
                    ));
                }
                content.read_bytes(n as usize)?
            }
        };

        Ok(Record::HandlerReference(HandlerReference {
            version,
            flags,
            component_type,
            handler_type,
            name: String::from_utf8_lossy(&name).into_owned(),
        }))
    }
}

// ---------- elst ----------

#[derive(Debug, Clone, Serialize)]
pub struct EditEntry {
    pub segment_duration: u64,
    /// -1 marks an empty edit.
    pub media_time: i64,
    pub media_rate: f64,
}

impl fmt::Display for EditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.segment_duration, self.media_time, self.media_rate
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EditList {
    pub version: u8,
    pub flags: u32,
    pub entries: Vec<EditEntry>,
}

impl fmt::Display for EditList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "version={} entries={}", self.version, Abbrev(&self.entries))
    }
}

pub struct ElstDecoder;

impl BoxDecoder for ElstDecoder {
    fn decode(&self, hdr: &BoxHeader, content: &mut ByteWindow) -> Result<Record> {
        let (version, flags) = read_full_header(content)?;
        expect_version(hdr, version, &[0, 1])?;
        let count = content.read_u32()? as u64;
        let stride = if version == 1 { 20 } else { 12 };
        expect_len(hdr, content, 8 + count * stride)?;

        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (segment_duration, media_time) = if version == 1 {
                content.read_structured::<(u64, i64)>()?
            } else {
                let (d, t) = content.read_structured::<(u32, i32)>()?;
                (d as u64, t as i64)
            };
            let rate = content.read_u32()?;
            entries.push(EditEntry {
                segment_duration,
                media_time,
                media_rate: fixed_16_16(rate),
            });
        }

        Ok(Record::EditList(EditList {
            version,
            flags,
            entries,
        }))
    }
}
