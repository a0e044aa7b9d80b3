//! Lazy, bounds-checked views over a shared file.
//!
//! Many windows may alias one underlying source. Each physical read seeks
//! first, so windows can be consulted in any order.

use crate::boxes::FourCC;
use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder};
use std::cell::RefCell;
use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::ops::{Bound, RangeBounds};
use std::path::Path;
use std::rc::Rc;

const COPY_CHUNK: u64 = 64 * 1024;

/// Anything a window can read from.
pub trait Source: Read + Seek {}
impl<T: Read + Seek> Source for T {}

pub type SharedSource = Rc<RefCell<dyn Source>>;

/// A big-endian binary layout that can be decoded from a fixed number of bytes.
pub trait Layout: Sized {
    const SIZE: usize;
    fn from_be(bytes: &[u8]) -> Self;
}

macro_rules! int_layout {
    ($($t:ty => $read:expr),* $(,)?) => {
        $(impl Layout for $t {
            const SIZE: usize = std::mem::size_of::<$t>();
            fn from_be(bytes: &[u8]) -> Self {
                $read(bytes)
            }
        })*
    };
}

int_layout! {
    u8 => |b: &[u8]| b[0],
    i8 => |b: &[u8]| b[0] as i8,
    u16 => BigEndian::read_u16,
    i16 => BigEndian::read_i16,
    u32 => BigEndian::read_u32,
    i32 => BigEndian::read_i32,
    u64 => BigEndian::read_u64,
    i64 => BigEndian::read_i64,
}

impl<const N: usize> Layout for [u8; N] {
    const SIZE: usize = N;
    fn from_be(bytes: &[u8]) -> Self {
        let mut out = [0u8; N];
        out.copy_from_slice(&bytes[..N]);
        out
    }
}

impl Layout for FourCC {
    const SIZE: usize = 4;
    fn from_be(bytes: &[u8]) -> Self {
        FourCC(<[u8; 4]>::from_be(bytes))
    }
}

impl<A: Layout, B: Layout> Layout for (A, B) {
    const SIZE: usize = A::SIZE + B::SIZE;
    fn from_be(bytes: &[u8]) -> Self {
        (A::from_be(bytes), B::from_be(&bytes[A::SIZE..]))
    }
}

impl<A: Layout, B: Layout, C: Layout> Layout for (A, B, C) {
    const SIZE: usize = A::SIZE + B::SIZE + C::SIZE;
    fn from_be(bytes: &[u8]) -> Self {
        let (a, b) = <(A, B)>::from_be(bytes);
        (a, b, C::from_be(&bytes[A::SIZE + B::SIZE..]))
    }
}

impl<A: Layout, B: Layout, C: Layout, D: Layout> Layout for (A, B, C, D) {
    const SIZE: usize = A::SIZE + B::SIZE + C::SIZE + D::SIZE;
    fn from_be(bytes: &[u8]) -> Self {
        let (a, b, c) = <(A, B, C)>::from_be(bytes);
        (a, b, c, D::from_be(&bytes[A::SIZE + B::SIZE + C::SIZE..]))
    }
}

/// A `[start, stop)` view into a shared source, with a cursor for
/// sequential reads.
#[derive(Clone)]
pub struct ByteWindow {
    source: SharedSource,
    start: u64,
    stop: u64,
    pos: u64,
}

impl ByteWindow {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_source(File::open(path)?)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let len = bytes.len() as u64;
        Self {
            source: Rc::new(RefCell::new(Cursor::new(bytes))),
            start: 0,
            stop: len,
            pos: 0,
        }
    }

    /// Wrap a source, spanning it from offset 0 to its current end.
    pub fn from_source<S: Source + 'static>(mut src: S) -> Result<Self> {
        let len = src.seek(SeekFrom::End(0))?;
        Ok(Self {
            source: Rc::new(RefCell::new(src)),
            start: 0,
            stop: len,
            pos: 0,
        })
    }

    /// Absolute offset of the first byte.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Absolute offset one past the last byte.
    pub fn stop(&self) -> u64 {
        self.stop
    }

    pub fn len(&self) -> u64 {
        self.stop - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.stop
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn remaining(&self) -> u64 {
        self.len() - self.pos
    }

    pub fn reset(&mut self) {
        self.pos = 0;
    }

    /// Sub-window relative to this window's start. The range must lie inside
    /// the window.
    pub fn slice(&self, range: impl RangeBounds<u64>) -> Result<ByteWindow> {
        let len = self.len();
        let lo = match range.start_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let hi = match range.end_bound() {
            Bound::Included(&n) => n.saturating_add(1),
            Bound::Excluded(&n) => n,
            Bound::Unbounded => len,
        };
        if lo > hi || hi > len {
            return Err(Error::OutOfRange {
                start: lo,
                stop: hi,
                len,
            });
        }
        Ok(ByteWindow {
            source: Rc::clone(&self.source),
            start: self.start + lo,
            stop: self.start + hi,
            pos: 0,
        })
    }

    /// Everything from `offset` to the end of the window.
    pub fn tail(&self, offset: u64) -> Result<ByteWindow> {
        self.slice(offset..)
    }

    /// The unread part of the window, from the cursor on.
    pub fn rest(&self) -> ByteWindow {
        ByteWindow {
            source: Rc::clone(&self.source),
            start: self.start + self.pos,
            stop: self.stop,
            pos: 0,
        }
    }

    /// Read the whole window into memory. Does not move the cursor.
    pub fn materialize(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.len() as usize];
        self.read_at(0, &mut buf)?;
        Ok(buf)
    }

    /// Copy the whole window to `out` in bounded chunks. Does not move the
    /// cursor. Returns the number of bytes written.
    pub fn copy_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<u64> {
        let len = self.len();
        let mut buf = vec![0u8; COPY_CHUNK.min(len) as usize];
        let mut offset = 0;
        while offset < len {
            let n = COPY_CHUNK.min(len - offset) as usize;
            self.read_at(offset, &mut buf[..n])?;
            out.write_all(&buf[..n])?;
            offset += n as u64;
        }
        Ok(offset)
    }

    /// Whether the window's content begins with `prefix`.
    pub fn starts_with(&self, prefix: &[u8]) -> Result<bool> {
        if prefix.len() as u64 > self.len() {
            return Ok(false);
        }
        let mut buf = vec![0u8; prefix.len()];
        self.read_at(0, &mut buf)?;
        Ok(buf == prefix)
    }

    /// Decode `T` at the cursor and advance past it.
    pub fn read_structured<T: Layout>(&mut self) -> Result<T> {
        let mut buf = [0u8; 64];
        if T::SIZE > buf.len() {
            let bytes = self.read_bytes(T::SIZE)?;
            return Ok(T::from_be(&bytes));
        }
        let buf = &mut buf[..T::SIZE];
        self.read_at(self.pos, buf)?;
        self.pos += T::SIZE as u64;
        Ok(T::from_be(buf))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_structured()
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_structured()
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_structured()
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_structured()
    }

    pub fn read_fourcc(&mut self) -> Result<FourCC> {
        self.read_structured()
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.read_at(self.pos, &mut buf)?;
        self.pos += n as u64;
        Ok(buf)
    }

    pub fn skip(&mut self, n: u64) -> Result<()> {
        if n > self.remaining() {
            return Err(Error::IncompleteData {
                offset: self.start + self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        self.pos += n;
        Ok(())
    }

    /// Read a NUL-terminated string, bounded by the window. The terminator is
    /// consumed but not returned. A missing terminator yields the rest of the
    /// window.
    pub fn read_cstring(&mut self) -> Result<Vec<u8>> {
        let rest = self.rest().materialize()?;
        match rest.iter().position(|&b| b == 0) {
            Some(n) => {
                self.pos += n as u64 + 1;
                Ok(rest[..n].to_vec())
            }
            None => {
                self.pos = self.len();
                Ok(rest)
            }
        }
    }

    /// Fill `buf` from window-relative `offset`, re-seeking the shared source.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let needed = buf.len() as u64;
        let available = self.len().saturating_sub(offset);
        if needed > available {
            return Err(Error::IncompleteData {
                offset: self.start + offset,
                needed,
                available,
            });
        }
        if buf.is_empty() {
            return Ok(());
        }

        let mut src = self.source.borrow_mut();
        src.seek(SeekFrom::Start(self.start + offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            match src.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(Error::IncompleteData {
                        offset: self.start + offset,
                        needed,
                        available: filled as u64,
                    });
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ByteWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteWindow[{}:{}]", self.start, self.stop)
    }
}
