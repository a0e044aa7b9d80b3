//! Sample table decoders: flat big-endian arrays behind a version, flags and
//! count header. The declared count must account for the whole payload.

use super::{Record, expect_flags, expect_len, expect_version, read_full_header};
use crate::boxes::BoxHeader;
use crate::error::Result;
use crate::registry::BoxDecoder;
use crate::util::Abbrev;
use crate::window::{ByteWindow, Layout};
use serde::Serialize;
use std::fmt;

/// Read `count` entries of `T` filling the rest of `content`, which must hold
/// exactly `header_len` bytes before them.
fn read_table<T: Layout>(
    hdr: &BoxHeader,
    content: &mut ByteWindow,
    header_len: u64,
    count: u64,
) -> Result<Vec<T>> {
    expect_len(hdr, content, header_len + count * T::SIZE as u64)?;
    let bytes = content.rest().materialize()?;
    content.skip(bytes.len() as u64)?;
    Ok(bytes.chunks_exact(T::SIZE).map(T::from_be).collect())
}

/// Version 0, no flags.
fn read_table_header(hdr: &BoxHeader, content: &mut ByteWindow) -> Result<()> {
    let (version, flags) = read_full_header(content)?;
    expect_version(hdr, version, &[0])?;
    expect_flags(hdr, flags, 0)
}

// ---------- stco / co64 ----------

#[derive(Debug, Clone, Serialize)]
pub struct ChunkOffsets {
    /// `true` for `co64`.
    pub wide: bool,
    pub offsets: Vec<u64>,
}

impl fmt::Display for ChunkOffsets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunks={}", Abbrev(&self.offsets))
    }
}

pub struct ChunkOffsetDecoder {
    pub wide: bool,
}

impl BoxDecoder for ChunkOffsetDecoder {
    fn decode(&self, hdr: &BoxHeader, content: &mut ByteWindow) -> Result<Record> {
        read_table_header(hdr, content)?;
        let count = content.read_u32()? as u64;
        let offsets = if self.wide {
            read_table::<u64>(hdr, content, 8, count)?
        } else {
            read_table::<u32>(hdr, content, 8, count)?
                .into_iter()
                .map(u64::from)
                .collect()
        };
        Ok(Record::ChunkOffsets(ChunkOffsets {
            wide: self.wide,
            offsets,
        }))
    }
}

// ---------- stss ----------

#[derive(Debug, Clone, Serialize)]
pub struct SyncSamples {
    pub samples: Vec<u32>,
}

impl fmt::Display for SyncSamples {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sync={}", Abbrev(&self.samples))
    }
}

pub struct StssDecoder;

impl BoxDecoder for StssDecoder {
    fn decode(&self, hdr: &BoxHeader, content: &mut ByteWindow) -> Result<Record> {
        read_table_header(hdr, content)?;
        let count = content.read_u32()? as u64;
        let samples = read_table::<u32>(hdr, content, 8, count)?;
        Ok(Record::SyncSamples(SyncSamples { samples }))
    }
}

// ---------- stsz ----------

#[derive(Debug, Clone, Serialize)]
pub struct SampleSizes {
    /// Nonzero when every sample has this size and `sizes` is empty.
    pub sample_size: u32,
    pub sample_count: u32,
    pub sizes: Vec<u32>,
}

impl SampleSizes {
    pub fn size_of(&self, index: usize) -> Option<u32> {
        if self.sample_size != 0 {
            (index < self.sample_count as usize).then_some(self.sample_size)
        } else {
            self.sizes.get(index).copied()
        }
    }
}

impl fmt::Display for SampleSizes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "samplesize={} count={} sizes={}",
            self.sample_size,
            self.sample_count,
            Abbrev(&self.sizes)
        )
    }
}

pub struct StszDecoder;

impl BoxDecoder for StszDecoder {
    fn decode(&self, hdr: &BoxHeader, content: &mut ByteWindow) -> Result<Record> {
        read_table_header(hdr, content)?;
        let (sample_size, sample_count) = content.read_structured::<(u32, u32)>()?;
        let listed = if sample_size == 0 { sample_count as u64 } else { 0 };
        let sizes = read_table::<u32>(hdr, content, 12, listed)?;
        Ok(Record::SampleSizes(SampleSizes {
            sample_size,
            sample_count,
            sizes,
        }))
    }
}

// ---------- stts ----------

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TimeToSampleEntry {
    pub sample_count: u32,
    pub sample_delta: u32,
}

impl fmt::Display for TimeToSampleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.sample_count, self.sample_delta)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeToSample {
    pub entries: Vec<TimeToSampleEntry>,
}

impl TimeToSample {
    pub fn sample_count(&self) -> u64 {
        self.entries.iter().map(|e| e.sample_count as u64).sum()
    }

    pub fn duration(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| e.sample_count as u64 * e.sample_delta as u64)
            .sum()
    }
}

impl fmt::Display for TimeToSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entries={}", Abbrev(&self.entries))
    }
}

pub struct SttsDecoder;

impl BoxDecoder for SttsDecoder {
    fn decode(&self, hdr: &BoxHeader, content: &mut ByteWindow) -> Result<Record> {
        read_table_header(hdr, content)?;
        let count = content.read_u32()? as u64;
        let entries = read_table::<(u32, u32)>(hdr, content, 8, count)?
            .into_iter()
            .map(|(sample_count, sample_delta)| TimeToSampleEntry {
                sample_count,
                sample_delta,
            })
            .collect();
        Ok(Record::TimeToSample(TimeToSample { entries }))
    }
}

// ---------- ctts ----------

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CompositionOffsetEntry {
    pub sample_count: u32,
    pub sample_offset: i64,
}

impl fmt::Display for CompositionOffsetEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.sample_count, self.sample_offset)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompositionOffsets {
    pub version: u8,
    pub entries: Vec<CompositionOffsetEntry>,
}

impl fmt::Display for CompositionOffsets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "version={} entries={}", self.version, Abbrev(&self.entries))
    }
}

pub struct CttsDecoder;

impl BoxDecoder for CttsDecoder {
    fn decode(&self, hdr: &BoxHeader, content: &mut ByteWindow) -> Result<Record> {
        let (version, flags) = read_full_header(content)?;
        expect_version(hdr, version, &[0, 1])?;
        expect_flags(hdr, flags, 0)?;
        let count = content.read_u32()? as u64;
        let entries = read_table::<(u32, u32)>(hdr, content, 8, count)?
            .into_iter()
            .map(|(sample_count, raw)| CompositionOffsetEntry {
                sample_count,
                // version 0 offsets are unsigned, version 1 signed
                sample_offset: if version == 1 {
                    raw as i32 as i64
                } else {
                    raw as i64
                },
            })
            .collect();
        Ok(Record::CompositionOffsets(CompositionOffsets {
            version,
            entries,
        }))
    }
}

// ---------- stsc ----------

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SampleToChunkEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

impl fmt::Display for SampleToChunkEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.first_chunk, self.samples_per_chunk, self.sample_description_index
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleToChunk {
    pub entries: Vec<SampleToChunkEntry>,
}

impl fmt::Display for SampleToChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entries={}", Abbrev(&self.entries))
    }
}

pub struct StscDecoder;

impl BoxDecoder for StscDecoder {
    fn decode(&self, hdr: &BoxHeader, content: &mut ByteWindow) -> Result<Record> {
        read_table_header(hdr, content)?;
        let count = content.read_u32()? as u64;
        let entries = read_table::<(u32, u32, u32)>(hdr, content, 8, count)?
            .into_iter()
            .map(
                |(first_chunk, samples_per_chunk, sample_description_index)| SampleToChunkEntry {
                    first_chunk,
                    samples_per_chunk,
                    sample_description_index,
                },
            )
            .collect();
        Ok(Record::SampleToChunk(SampleToChunk { entries }))
    }
}
