use std::fmt;

pub fn hex_dump(bytes: &[u8], start_offset: u64) -> String {
    let mut out = String::new();
    for (i, chunk) in bytes.chunks(16).enumerate() {
        let offs = start_offset + (i as u64) * 16;
        let hexs: String = chunk.iter().map(|b| format!("{:02x} ", b)).collect();
        let ascii: String = chunk
            .iter()
            .map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect();
        out.push_str(&format!("{:08x}  {:<48}  |{}|\n", offs, hexs, ascii));
    }
    out
}

/// Formats a list, eliding the middle of long ones:
/// `[1, 2, 3, ... (100 total) ..., 98, 99, 100]`.
pub struct Abbrev<'a, T>(pub &'a [T]);

impl<T: fmt::Display> fmt::Display for Abbrev<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items = self.0;
        let join = |f: &mut fmt::Formatter<'_>, part: &[T]| -> fmt::Result {
            for (i, item) in part.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{item}")?;
            }
            Ok(())
        };

        f.write_str("[")?;
        if items.len() <= 7 {
            join(f, items)?;
        } else {
            join(f, &items[..3])?;
            write!(f, ", ... ({} total) ..., ", items.len())?;
            join(f, &items[items.len() - 3..])?;
        }
        f.write_str("]")
    }
}

/// Printable rendering of raw bytes, quoted, with non-printables escaped.
pub fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::from("\"");
    for &b in bytes {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            32..=126 => out.push(b as char),
            _ => out.push_str(&format!("\\x{b:02x}")),
        }
    }
    out.push('"');
    out
}
