//! Sample description box: a counted list of self-sized sample entries whose
//! layout depends on the entry's format code and, for sound, its version.

use super::{Record, expect_version, expect_zero, fixed_16_16, read_full_header, violation};
use crate::boxes::{BoxHeader, FourCC};
use crate::error::Result;
use crate::registry::BoxDecoder;
use crate::walker::BoxWalker;
use crate::window::ByteWindow;
use serde::Serialize;
use std::fmt;

const VIDEO_FORMATS: &[&[u8; 4]] = &[
    b"avc1", b"avc3", b"hvc1", b"hev1", b"av01", b"vp08", b"vp09", b"mp4v", b"s263", b"h263",
    b"jpeg", b"mjpa", b"mjpb", b"png ", b"rle ", b"raw ", b"rpza", b"cvid", b"SVQ1", b"SVQ3",
    b"apcn", b"apch", b"apcs", b"apco", b"ap4h", b"ap4x", b"2vuy", b"yuv2", b"v210", b"dvc ",
    b"dvcp", b"dvpp", b"dv5n", b"dv5p", b"xd5c", b"encv",
];

const AUDIO_FORMATS: &[&[u8; 4]] = &[
    b"mp4a", b"sowt", b"twos", b"lpcm", b"in24", b"in32", b"fl32", b"fl64", b"ulaw", b"alaw",
    b"ima4", b"ac-3", b"ec-3", b".mp3", b"alac", b"Opus", b"fLaC", b"samr", b"enca", b"NONE",
];

/// Fields shared by every video sample entry.
#[derive(Debug, Clone, Serialize)]
pub struct VideoFields {
    pub version: u16,
    pub revision: u16,
    pub vendor: FourCC,
    pub temporal_quality: u32,
    pub spatial_quality: u32,
    pub width: u16,
    pub height: u16,
    pub horizontal_resolution: f64,
    pub vertical_resolution: f64,
    pub frame_count: u16,
    pub compressor_name: String,
    pub depth: u16,
    pub color_table_id: i16,
}

/// Sound sample entry. Version 0 carries the basic fields, version 1 adds the
/// packet description, and version 2 replaces the basic fields with a wider
/// layout.
#[derive(Debug, Clone, Serialize)]
pub struct AudioFields {
    pub version: u16,
    pub revision: u16,
    pub vendor: FourCC,
    pub channels: u32,
    pub sample_size: u32,
    pub compression_id: i16,
    pub packet_size: u16,
    pub sample_rate: f64,
    pub samples_per_packet: Option<u32>,
    pub bytes_per_packet: Option<u32>,
    pub bytes_per_frame: Option<u32>,
    pub bytes_per_sample: Option<u32>,
    pub format_flags: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SampleEntryKind {
    Video(VideoFields),
    Audio(AudioFields),
    Other,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleEntry {
    pub size: u32,
    pub format: FourCC,
    pub data_reference_index: u16,
    pub kind: SampleEntryKind,
    /// Type and size of each box trailing the fixed fields (`avcC`, `esds`, ...).
    pub extensions: Vec<(FourCC, u64)>,
}

impl fmt::Display for SampleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} dref={}", self.format, self.data_reference_index)?;
        match &self.kind {
            SampleEntryKind::Video(v) => write!(
                f,
                " video {}x{} depth={} compressor={:?}",
                v.width, v.height, v.depth, v.compressor_name
            )?,
            SampleEntryKind::Audio(a) => write!(
                f,
                " audio v{} channels={} bits={} rate={}",
                a.version, a.channels, a.sample_size, a.sample_rate
            )?,
            SampleEntryKind::Other => write!(f, " ({} bytes)", self.size)?,
        }
        if !self.extensions.is_empty() {
            let ext: Vec<String> = self.extensions.iter().map(|(t, _)| t.to_string()).collect();
            write!(f, " ext=[{}]", ext.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleDescriptions {
    pub version: u8,
    pub flags: u32,
    pub entries: Vec<SampleEntry>,
}

impl fmt::Display for SampleDescriptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} entries", self.entries.len())?;
        for (i, e) in self.entries.iter().enumerate() {
            write!(f, "\n[{}] {}", i + 1, e)?;
        }
        Ok(())
    }
}

pub struct StsdDecoder;

impl BoxDecoder for StsdDecoder {
    fn decode(&self, hdr: &BoxHeader, content: &mut ByteWindow) -> Result<Record> {
        let (version, flags) = read_full_header(content)?;
        expect_version(hdr, version, &[0])?;
        let count = content.read_u32()?;

        let mut entries = Vec::with_capacity(count.min(64) as usize);
        for i in 0..count {
            let size = content.read_u32()?;
            if size < 16 {
                return Err(violation(hdr, format!("entry {i} has size {size}")));
            }
            if size as u64 - 4 > content.remaining() {
                return Err(violation(
                    hdr,
                    format!(
                        "entry {i} declares {size} bytes, {} left",
                        content.remaining() + 4
                    ),
                ));
            }
            let mut entry = content.rest().slice(..size as u64 - 4)?;
            content.skip(size as u64 - 4)?;
            entries.push(decode_entry(hdr, size, &mut entry)?);
        }

        if content.remaining() != 0 {
            return Err(violation(
                hdr,
                format!("{} bytes after {count} entries", content.remaining()),
            ));
        }

        Ok(Record::SampleDescriptions(SampleDescriptions {
            version,
            flags,
            entries,
        }))
    }
}

fn decode_entry(hdr: &BoxHeader, size: u32, entry: &mut ByteWindow) -> Result<SampleEntry> {
    let (format, reserved, data_reference_index) =
        entry.read_structured::<(FourCC, [u8; 6], u16)>()?;
    expect_zero(hdr, "sample entry reserved", &reserved)?;

    let kind = if VIDEO_FORMATS.contains(&&format.0) {
        SampleEntryKind::Video(read_video(entry)?)
    } else if AUDIO_FORMATS.contains(&&format.0) {
        SampleEntryKind::Audio(read_audio(hdr, entry)?)
    } else {
        entry.skip(entry.remaining())?;
        SampleEntryKind::Other
    };

    Ok(SampleEntry {
        size,
        format,
        data_reference_index,
        kind,
        extensions: read_extensions(entry)?,
    })
}

fn read_video(entry: &mut ByteWindow) -> Result<VideoFields> {
    let (version, revision, vendor) = entry.read_structured::<(u16, u16, FourCC)>()?;
    let (temporal_quality, spatial_quality, width, height) =
        entry.read_structured::<(u32, u32, u16, u16)>()?;
    let (hres, vres, _data_size, frame_count) =
        entry.read_structured::<(u32, u32, u32, u16)>()?;
    let name = entry.read_structured::<[u8; 32]>()?;
    let (depth, color_table_id) = entry.read_structured::<(u16, i16)>()?;

    let name_len = (name[0] as usize).min(31);
    Ok(VideoFields {
        version,
        revision,
        vendor,
        temporal_quality,
        spatial_quality,
        width,
        height,
        horizontal_resolution: fixed_16_16(hres),
        vertical_resolution: fixed_16_16(vres),
        frame_count,
        compressor_name: String::from_utf8_lossy(&name[1..1 + name_len]).into_owned(),
        depth,
        color_table_id,
    })
}

fn read_audio(hdr: &BoxHeader, entry: &mut ByteWindow) -> Result<AudioFields> {
    let (version, revision, vendor) = entry.read_structured::<(u16, u16, FourCC)>()?;
    match version {
        0 | 1 => {
            let (channels, sample_size, compression_id, packet_size) =
                entry.read_structured::<(u16, u16, i16, u16)>()?;
            let rate = entry.read_u32()?;
            let mut fields = AudioFields {
                version,
                revision,
                vendor,
                channels: channels as u32,
                sample_size: sample_size as u32,
                compression_id,
                packet_size,
                // unsigned 16.16
                sample_rate: rate as f64 / 65536.0,
                samples_per_packet: None,
                bytes_per_packet: None,
                bytes_per_frame: None,
                bytes_per_sample: None,
                format_flags: None,
            };
            if version == 1 {
                let (spp, bpp, bpf, bps) = entry.read_structured::<(u32, u32, u32, u32)>()?;
                fields.samples_per_packet = Some(spp);
                fields.bytes_per_packet = Some(bpp);
                fields.bytes_per_frame = Some(bpf);
                fields.bytes_per_sample = Some(bps);
            }
            Ok(fields)
        }
        2 => {
            let (always3, always16, always_minus2, always0) =
                entry.read_structured::<(u16, u16, i16, u16)>()?;
            let (always65536, _struct_size, rate_bits) =
                entry.read_structured::<(u32, u32, u64)>()?;
            let (channels, always7f, bits_per_channel) =
                entry.read_structured::<(u32, u32, u32)>()?;
            let (format_flags, bytes_per_packet, frames_per_packet) =
                entry.read_structured::<(u32, u32, u32)>()?;

            if (always3, always16, always_minus2, always0, always65536, always7f)
                != (3, 16, -2, 0, 65536, 0x7F00_0000)
            {
                return Err(violation(hdr, "version 2 sound entry constants mismatch"));
            }

            Ok(AudioFields {
                version,
                revision,
                vendor,
                channels,
                sample_size: bits_per_channel,
                compression_id: always_minus2,
                packet_size: 0,
                sample_rate: f64::from_bits(rate_bits),
                samples_per_packet: Some(frames_per_packet),
                bytes_per_packet: Some(bytes_per_packet),
                bytes_per_frame: None,
                bytes_per_sample: None,
                format_flags: Some(format_flags),
            })
        }
        v => Err(violation(hdr, format!("unsupported sound entry version {v}"))),
    }
}

/// List the boxes after the fixed fields. A lone 32-bit zero terminator is
/// accepted.
fn read_extensions(entry: &ByteWindow) -> Result<Vec<(FourCC, u64)>> {
    let rest = entry.rest();
    if rest.len() == 4 && rest.materialize()? == [0, 0, 0, 0] {
        return Ok(Vec::new());
    }
    BoxWalker::new(rest)
        .map(|b| b.map(|b| (b.header.typ, b.header.size)))
        .collect()
}
