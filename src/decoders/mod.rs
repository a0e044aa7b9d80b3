//! Structured records produced by leaf-box decoders.

pub mod headers;
pub mod metadata;
pub mod sample_entry;
pub mod tables;
pub mod vendor;

use crate::boxes::BoxHeader;
use crate::error::{Error, Result};
use crate::window::ByteWindow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

pub use headers::{EditEntry, EditList, FileType, HandlerReference, MediaHeader, MovieHeader, TrackHeader};
pub use metadata::{MetadataKey, MetadataKeys, MetadataPayload, MetadataValue};
pub use sample_entry::{AudioFields, SampleDescriptions, SampleEntry, SampleEntryKind, VideoFields};
pub use tables::{
    ChunkOffsets, CompositionOffsetEntry, CompositionOffsets, SampleSizes, SampleToChunk,
    SampleToChunkEntry, SyncSamples, TimeToSample, TimeToSampleEntry,
};
pub use vendor::{Extension, VendorItem, VendorPayload, VendorTable};

/// Decoded content of a recognized leaf box.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    FileType(FileType),
    MovieHeader(MovieHeader),
    TrackHeader(TrackHeader),
    MediaHeader(MediaHeader),
    HandlerReference(HandlerReference),
    EditList(EditList),
    ChunkOffsets(ChunkOffsets),
    SyncSamples(SyncSamples),
    SampleSizes(SampleSizes),
    TimeToSample(TimeToSample),
    CompositionOffsets(CompositionOffsets),
    SampleToChunk(SampleToChunk),
    SampleDescriptions(SampleDescriptions),
    MetadataKeys(MetadataKeys),
    MetadataValue(MetadataValue),
    Extension(Extension),
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::FileType(r) => fmt::Display::fmt(r, f),
            Record::MovieHeader(r) => fmt::Display::fmt(r, f),
            Record::TrackHeader(r) => fmt::Display::fmt(r, f),
            Record::MediaHeader(r) => fmt::Display::fmt(r, f),
            Record::HandlerReference(r) => fmt::Display::fmt(r, f),
            Record::EditList(r) => fmt::Display::fmt(r, f),
            Record::ChunkOffsets(r) => fmt::Display::fmt(r, f),
            Record::SyncSamples(r) => fmt::Display::fmt(r, f),
            Record::SampleSizes(r) => fmt::Display::fmt(r, f),
            Record::TimeToSample(r) => fmt::Display::fmt(r, f),
            Record::CompositionOffsets(r) => fmt::Display::fmt(r, f),
            Record::SampleToChunk(r) => fmt::Display::fmt(r, f),
            Record::SampleDescriptions(r) => fmt::Display::fmt(r, f),
            Record::MetadataKeys(r) => fmt::Display::fmt(r, f),
            Record::MetadataValue(r) => fmt::Display::fmt(r, f),
            Record::Extension(r) => fmt::Display::fmt(r, f),
        }
    }
}

/// Seconds between 1904-01-01 and 1970-01-01.
pub const MAC_EPOCH_OFFSET: i64 = 2_082_844_800;

pub(crate) fn violation(hdr: &BoxHeader, reason: impl Into<String>) -> Error {
    Error::DecodeAssumption {
        typ: hdr.typ,
        start: hdr.start,
        reason: reason.into(),
    }
}

/// Read the version byte and 24-bit flags of a full box.
pub(crate) fn read_full_header(content: &mut ByteWindow) -> Result<(u8, u32)> {
    let (version, f) = content.read_structured::<(u8, [u8; 3])>()?;
    let flags = ((f[0] as u32) << 16) | ((f[1] as u32) << 8) | (f[2] as u32);
    Ok((version, flags))
}

pub(crate) fn expect_version(hdr: &BoxHeader, version: u8, allowed: &[u8]) -> Result<()> {
    if allowed.contains(&version) {
        Ok(())
    } else {
        Err(violation(hdr, format!("unsupported version {version}")))
    }
}

pub(crate) fn expect_flags(hdr: &BoxHeader, flags: u32, expected: u32) -> Result<()> {
    if flags == expected {
        Ok(())
    } else {
        Err(violation(
            hdr,
            format!("unexpected flags 0x{flags:06x}, expected 0x{expected:06x}"),
        ))
    }
}

pub(crate) fn expect_len(hdr: &BoxHeader, content: &ByteWindow, expected: u64) -> Result<()> {
    if content.len() == expected {
        Ok(())
    } else {
        Err(violation(
            hdr,
            format!(
                "content is {} bytes, layout needs {expected}",
                content.len()
            ),
        ))
    }
}

pub(crate) fn expect_zero(hdr: &BoxHeader, field: &str, bytes: &[u8]) -> Result<()> {
    if bytes.iter().all(|&b| b == 0) {
        Ok(())
    } else {
        Err(violation(hdr, format!("reserved field {field} is not zero")))
    }
}

/// Convert 1904-based seconds to a UTC timestamp.
pub(crate) fn mac_time(hdr: &BoxHeader, secs: u64) -> Result<DateTime<Utc>> {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s - MAC_EPOCH_OFFSET, 0))
        .ok_or_else(|| violation(hdr, format!("timestamp {secs} out of range")))
}

pub(crate) fn fixed_16_16(v: u32) -> f64 {
    v as i32 as f64 / 65536.0
}

pub(crate) fn fixed_8_8(v: u16) -> f64 {
    v as i16 as f64 / 256.0
}

pub(crate) fn fixed_2_30(v: u32) -> f64 {
    v as i32 as f64 / (1u64 << 30) as f64
}

/// Read a 3x3 transformation matrix: a b u / c d v / x y w, where u, v and w
/// are 2.30 fixed-point and the rest 16.16.
pub(crate) fn read_matrix(content: &mut ByteWindow) -> Result<[f64; 9]> {
    let mut m = [0f64; 9];
    for (i, slot) in m.iter_mut().enumerate() {
        let raw = content.read_u32()?;
        *slot = if i % 3 == 2 {
            fixed_2_30(raw)
        } else {
            fixed_16_16(raw)
        };
    }
    Ok(m)
}
