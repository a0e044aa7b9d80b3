use crate::boxes::{BoxHeader, FourCC};
use crate::error::{Error, Result};
use crate::window::ByteWindow;

/// One sibling box as found by the walker: its header and a window over its
/// content.
#[derive(Debug, Clone)]
pub struct RawBox {
    pub header: BoxHeader,
    pub content: ByteWindow,
}

/// Read the box header at window-relative `offset`.
///
/// Handles the 32-bit size, the 64-bit extended size (`size == 1`), and the
/// extends-to-end form (`size == 0`). Fails with `StructuralTruncation` when
/// the window cannot hold the whole box, and with `InvalidSize` when the box
/// would end past the largest representable offset.
pub fn read_box_header(window: &ByteWindow, offset: u64) -> Result<BoxHeader> {
    let start = window.start() + offset;
    let available = window.len() - offset;

    if available < 8 {
        return Err(Error::StructuralTruncation {
            typ: None,
            start,
            expected_end: start + 8,
            actual_end: window.stop(),
        });
    }

    let mut hdr = window.slice(offset..offset + 8)?;
    let (size32, typ) = hdr.read_structured::<(u32, FourCC)>()?;

    let (size, header_size) = match size32 {
        1 => {
            if available < 16 {
                return Err(Error::StructuralTruncation {
                    typ: Some(typ),
                    start,
                    expected_end: start + 16,
                    actual_end: window.stop(),
                });
            }
            let size = window.slice(offset + 8..offset + 16)?.read_u64()?;
            if size < 16 {
                return Err(Error::InvalidSize { typ, start, size });
            }
            (size, 16)
        }
        0 => (available, 8),
        2..=7 => {
            return Err(Error::InvalidSize {
                typ,
                start,
                size: size32 as u64,
            });
        }
        n => (n as u64, 8),
    };

    let Some(expected_end) = start.checked_add(size) else {
        return Err(Error::InvalidSize { typ, start, size });
    };
    if size > available {
        return Err(Error::StructuralTruncation {
            typ: Some(typ),
            start,
            expected_end,
            actual_end: window.stop(),
        });
    }

    Ok(BoxHeader {
        typ,
        start,
        size,
        header_size,
    })
}

/// Iterates the sibling boxes that exactly fill a window.
///
/// No padding between boxes. After the first error the walker is exhausted.
pub struct BoxWalker {
    window: ByteWindow,
    offset: u64,
    done: bool,
}

impl BoxWalker {
    pub fn new(window: ByteWindow) -> Self {
        Self {
            window,
            offset: 0,
            done: false,
        }
    }

    /// Window-relative offset of the next box.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn step(&mut self) -> Result<RawBox> {
        let header = read_box_header(&self.window, self.offset)?;
        let content = self
            .window
            .slice(self.offset + header.header_size..self.offset + header.size)?;
        tracing::trace!(typ = %header.typ, start = header.start, size = header.size, "box");
        self.offset += header.size;
        Ok(RawBox { header, content })
    }
}

impl Iterator for BoxWalker {
    type Item = Result<RawBox>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset == self.window.len() {
            return None;
        }
        let item = self.step();
        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }
}

/// Walk every sibling box in `window`, failing on the first structural error.
pub fn parse_children(window: &ByteWindow) -> Result<Vec<RawBox>> {
    BoxWalker::new(window.clone()).collect()
}
