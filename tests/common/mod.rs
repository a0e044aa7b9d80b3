#![allow(dead_code)]

use mp4probe::ByteWindow;
use std::io::{self, Read, Seek, SeekFrom};

/// A box with a 32-bit size.
pub fn boxed(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = Vec::with_capacity(8 + payload.len());
    v.extend_from_slice(&(8 + payload.len() as u32).to_be_bytes());
    v.extend_from_slice(typ);
    v.extend_from_slice(payload);
    v
}

/// A box using the 64-bit extended size.
pub fn boxed64(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = Vec::with_capacity(16 + payload.len());
    v.extend_from_slice(&1u32.to_be_bytes());
    v.extend_from_slice(typ);
    v.extend_from_slice(&(16 + payload.len() as u64).to_be_bytes());
    v.extend_from_slice(payload);
    v
}

/// A box whose size field is 0, extending to the end of its parent.
pub fn open_ended(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = vec![0, 0, 0, 0];
    v.extend_from_slice(typ);
    v.extend_from_slice(payload);
    v
}

pub fn full_box(typ: &[u8; 4], version: u8, flags: u32, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![version];
    body.extend_from_slice(&flags.to_be_bytes()[1..]);
    body.extend_from_slice(payload);
    boxed(typ, &body)
}

pub fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}

pub fn ftyp() -> Vec<u8> {
    let mut p = b"isom".to_vec();
    p.extend_from_slice(&512u32.to_be_bytes());
    p.extend_from_slice(b"isommp41");
    boxed(b"ftyp", &p)
}

/// Version 0 `mvhd` with a 1000 timescale and the given duration.
pub fn mvhd(duration: u32) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&0u32.to_be_bytes()); // created
    p.extend_from_slice(&0u32.to_be_bytes()); // modified
    p.extend_from_slice(&1000u32.to_be_bytes());
    p.extend_from_slice(&duration.to_be_bytes());
    p.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // rate 1.0
    p.extend_from_slice(&0x0100u16.to_be_bytes()); // volume 1.0
    p.extend_from_slice(&[0; 10]);
    p.extend_from_slice(&identity_matrix());
    p.extend_from_slice(&[0; 24]);
    p.extend_from_slice(&2u32.to_be_bytes()); // next track id
    full_box(b"mvhd", 0, 0, &p)
}

pub fn identity_matrix() -> Vec<u8> {
    let m: [u32; 9] = [0x10000, 0, 0, 0, 0x10000, 0, 0, 0, 0x4000_0000];
    m.iter().flat_map(|v| v.to_be_bytes()).collect()
}

/// `stco` with the given offsets.
pub fn stco(offsets: &[u32]) -> Vec<u8> {
    let mut p = (offsets.len() as u32).to_be_bytes().to_vec();
    for o in offsets {
        p.extend_from_slice(&o.to_be_bytes());
    }
    full_box(b"stco", 0, 0, &p)
}

pub fn window(bytes: Vec<u8>) -> ByteWindow {
    ByteWindow::from_bytes(bytes)
}

/// A seekable source of `len` bytes that are zero except for a few
/// regions. Lets tests describe multi-gigabyte files without allocating them.
pub struct SparseSource {
    len: u64,
    pos: u64,
    regions: Vec<(u64, Vec<u8>)>,
}

impl SparseSource {
    pub fn new(len: u64) -> Self {
        Self {
            len,
            pos: 0,
            regions: Vec::new(),
        }
    }

    pub fn with_bytes(mut self, offset: u64, bytes: Vec<u8>) -> Self {
        self.regions.push((offset, bytes));
        self
    }
}

impl Read for SparseSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.len {
            return Ok(0);
        }
        let n = (buf.len() as u64).min(self.len - self.pos) as usize;
        buf[..n].fill(0);
        for (off, bytes) in &self.regions {
            let end = off + bytes.len() as u64;
            let lo = self.pos.max(*off);
            let hi = (self.pos + n as u64).min(end);
            if lo < hi {
                let dst = (lo - self.pos) as usize..(hi - self.pos) as usize;
                let src = (lo - off) as usize..(hi - off) as usize;
                buf[dst].copy_from_slice(&bytes[src]);
            }
        }
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for SparseSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let next = match pos {
            SeekFrom::Start(p) => p as i128,
            SeekFrom::End(d) => self.len as i128 + d as i128,
            SeekFrom::Current(d) => self.pos as i128 + d as i128,
        };
        if next < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek before start"));
        }
        self.pos = next as u64;
        Ok(self.pos)
    }
}
