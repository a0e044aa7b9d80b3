//! Path expressions evaluated directly against raw boxes.
//!
//! A path is a list of steps separated by `/` or `.`:
//!
//! - `+N` moves the current window N bytes forward, e.g. past a 16-byte
//!   identifier before walking the boxes that follow it;
//! - `code[idx]:literal` or `code[idx]$hex` keeps the children of type
//!   `code` whose content starts with the given bytes. Both the index and the
//!   qualifier are optional.
//!
//! An indexed step follows exactly one match and fails when there are too
//! few. An unindexed step follows every match. Evaluation is depth-first and
//! stops walking as soon as the caller has what it needs, so boxes after the
//! last one needed are never read.

use crate::boxes::FourCC;
use crate::error::{Error, Result};
use crate::walker::BoxWalker;
use crate::window::ByteWindow;
use std::fmt;
use std::io::Write;
use std::ops::ControlFlow;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Skip(u64),
    Filter {
        typ: FourCC,
        index: Option<usize>,
        prefix: Option<Vec<u8>>,
    },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Skip(n) => write!(f, "+{n}"),
            Step::Filter { typ, index, prefix } => {
                write!(f, "{}", typ.as_str_lossy().trim_end())?;
                if let Some(i) = index {
                    write!(f, "[{i}]")?;
                }
                if let Some(p) = prefix {
                    write!(f, "${}", hex::encode(p))?;
                }
                Ok(())
            }
        }
    }
}

/// Outcome of a query that expects a single match.
#[derive(Debug)]
pub enum Selection {
    Found(ByteWindow),
    NotFound,
    Ambiguous(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    steps: Vec<Step>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self> {
        let steps = input
            .split(['/', '.'])
            .filter(|s| !s.is_empty())
            .map(|s| parse_step(input, s))
            .collect::<Result<Vec<_>>>()?;
        Ok(Selector { steps })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Call `f` with every matching window in encounter order until it
    /// breaks.
    pub fn for_each(
        &self,
        window: &ByteWindow,
        mut f: impl FnMut(ByteWindow) -> ControlFlow<()>,
    ) -> Result<()> {
        let mut hits = 0;
        visit(window.clone(), &self.steps, &mut hits, &mut f)?;
        Ok(())
    }

    pub fn select(&self, window: &ByteWindow) -> Result<Vec<ByteWindow>> {
        let mut out = Vec::new();
        self.for_each(window, |w| {
            out.push(w);
            ControlFlow::Continue(())
        })?;
        Ok(out)
    }

    /// Whether anything matches. A missing indexed occurrence counts as no
    /// match; malformed boxes are still errors.
    pub fn exists(&self, window: &ByteWindow) -> Result<bool> {
        let mut found = false;
        let res = self.for_each(window, |_| {
            found = true;
            ControlFlow::Break(())
        });
        match res {
            Ok(()) => Ok(found),
            Err(Error::SelectorNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn select_one(&self, window: &ByteWindow) -> Result<Selection> {
        let mut matches = match self.select(window) {
            Ok(m) => m,
            Err(Error::SelectorNotFound { .. }) => return Ok(Selection::NotFound),
            Err(e) => return Err(e),
        };
        Ok(match matches.len() {
            0 => Selection::NotFound,
            1 => Selection::Found(matches.remove(0)),
            n => Selection::Ambiguous(n),
        })
    }

    /// Bytes of every match, concatenated in encounter order.
    pub fn dump(&self, window: &ByteWindow) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(window, &mut out)?;
        Ok(out)
    }

    /// Stream every match to `out` in encounter order without holding a
    /// whole match in memory. Returns the number of bytes written.
    pub fn write_to(&self, window: &ByteWindow, out: &mut dyn Write) -> Result<u64> {
        let mut total = 0;
        let mut failed = None;
        self.for_each(window, |w| match w.copy_to(out) {
            Ok(n) => {
                total += n;
                ControlFlow::Continue(())
            }
            Err(e) => {
                failed = Some(e);
                ControlFlow::Break(())
            }
        })?;
        match failed {
            Some(e) => Err(e),
            None => Ok(total),
        }
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Selector::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

/// Parse and evaluate in one go.
pub fn select(expr: &str, window: &ByteWindow) -> Result<Vec<ByteWindow>> {
    Selector::parse(expr)?.select(window)
}

fn visit(
    window: ByteWindow,
    steps: &[Step],
    hits: &mut usize,
    f: &mut dyn FnMut(ByteWindow) -> ControlFlow<()>,
) -> Result<ControlFlow<()>> {
    let Some((step, rest)) = steps.split_first() else {
        *hits += 1;
        return Ok(f(window));
    };

    let (typ, index, prefix) = match step {
        Step::Skip(n) => return visit(window.tail(*n)?, rest, hits, f),
        Step::Filter { typ, index, prefix } => (*typ, *index, prefix.as_deref()),
    };

    let hits_before = *hits;
    let mut missed = None;
    let mut seen = 0;
    for raw in BoxWalker::new(window) {
        let raw = raw?;
        if raw.header.typ != typ {
            continue;
        }
        if let Some(p) = prefix {
            if !raw.content.starts_with(p)? {
                continue;
            }
        }
        match index {
            Some(i) if seen < i => seen += 1,
            Some(_) => return visit(raw.content, rest, hits, f),
            // each continuation is independent: a missing occurrence below
            // one match does not end the others
            None => match visit(raw.content, rest, hits, f) {
                Ok(ControlFlow::Break(())) => return Ok(ControlFlow::Break(())),
                Ok(ControlFlow::Continue(())) => {}
                Err(e @ Error::SelectorNotFound { .. }) => {
                    missed.get_or_insert(e);
                }
                Err(e) => return Err(e),
            },
        }
    }

    match (index, missed) {
        (Some(index), _) => Err(Error::SelectorNotFound {
            step: step.to_string(),
            index,
            found: seen,
        }),
        // surfaces only when no continuation matched anything
        (None, Some(e)) if *hits == hits_before => Err(e),
        (None, _) => Ok(ControlFlow::Continue(())),
    }
}

fn parse_step(input: &str, step: &str) -> Result<Step> {
    let invalid = |reason: String| Error::InvalidSelector {
        input: input.to_string(),
        reason,
    };

    if let Some(n) = step.strip_prefix('+') {
        return n
            .parse()
            .map(Step::Skip)
            .map_err(|_| invalid(format!("bad offset {step:?}")));
    }

    let code_end = step.find(['[', ':', '$']).unwrap_or(step.len());
    let (code, mut rest) = step.split_at(code_end);
    let typ = FourCC::parse(code)
        .ok_or_else(|| invalid(format!("{code:?} is not a 1-4 character type code")))?;

    let mut index = None;
    if let Some(r) = rest.strip_prefix('[') {
        let close = r
            .find(']')
            .ok_or_else(|| invalid(format!("unclosed index in {step:?}")))?;
        index = Some(
            r[..close]
                .parse()
                .map_err(|_| invalid(format!("bad index in {step:?}")))?,
        );
        rest = &r[close + 1..];
    }

    let prefix = if let Some(lit) = rest.strip_prefix(':') {
        Some(lit.as_bytes().to_vec())
    } else if let Some(h) = rest.strip_prefix('$') {
        Some(hex::decode(h).map_err(|e| invalid(format!("bad hex in {step:?}: {e}")))?)
    } else if rest.is_empty() {
        None
    } else {
        return Err(invalid(format!("trailing {rest:?} in {step:?}")));
    };

    Ok(Step::Filter { typ, index, prefix })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(code: &[u8; 4], index: Option<usize>, prefix: Option<&[u8]>) -> Step {
        Step::Filter {
            typ: FourCC(*code),
            index,
            prefix: prefix.map(|p| p.to_vec()),
        }
    }

    #[test]
    fn parses_steps_and_separators() {
        let sel = Selector::parse("moov/trak[1].mdia").unwrap();
        assert_eq!(
            sel.steps(),
            &[
                filter(b"moov", None, None),
                filter(b"trak", Some(1), None),
                filter(b"mdia", None, None),
            ]
        );
    }

    #[test]
    fn parses_skip_and_qualifiers() {
        let sel = Selector::parse("/TSCM/DATA$2b7b6af6/+16").unwrap();
        assert_eq!(
            sel.steps(),
            &[
                filter(b"TSCM", None, None),
                filter(b"DATA", None, Some(&[0x2b, 0x7b, 0x6a, 0xf6])),
                Step::Skip(16),
            ]
        );
        let sel = Selector::parse("udta[0]:abc").unwrap();
        assert_eq!(sel.steps(), &[filter(b"udta", Some(0), Some(b"abc"))]);
    }

    #[test]
    fn short_and_latin1_codes() {
        let sel = Selector::parse("url/\u{a9}nam").unwrap();
        assert_eq!(
            sel.steps(),
            &[filter(b"url ", None, None), filter(b"\xa9nam", None, None)]
        );
    }

    #[test]
    fn rejects_malformed_steps() {
        for bad in ["toolong", "trak[", "trak[x]", "trak$zz", "+x", "trak]"] {
            let err = Selector::parse(bad).unwrap_err();
            assert!(
                matches!(err, Error::InvalidSelector { .. }),
                "{bad}: {err}"
            );
        }
    }

    #[test]
    fn displays_normalized_form() {
        let sel = Selector::parse("moov.trak[2]/+8").unwrap();
        assert_eq!(sel.to_string(), "moov/trak[2]/+8");
    }
}
