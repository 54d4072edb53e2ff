//! Top-level scan of a format string into text, field and script blocks.
//!
//! `{...}` is a replacement field, `[...]` a script segment.  Doubling an
//! opener or closer (`{{`, `}}`, `[[`, `]]`) produces the literal character.

use std::borrow::Cow;

use crate::error::{ErrorCode, FormatError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Text,
    Field,
    Script,
}

/// One chunk of a format string.
///
/// For text blocks `text` is the literal output with escapes already
/// collapsed; it borrows the source unless an escape forced a copy.  For
/// field and script blocks it is the raw content between the delimiters and
/// `offset` points just past the opener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<'s> {
    pub kind: BlockKind,
    pub text: Cow<'s, str>,
    pub offset: usize,
}

// ── Text accumulation ─────────────────────────────────────────────────────────

struct TextRun {
    offset: usize,
    /// Start of the not-yet-copied tail of the run.
    tail: usize,
    owned: Option<String>,
}

impl TextRun {
    fn new(offset: usize) -> Self {
        TextRun {
            offset,
            tail: offset,
            owned: None,
        }
    }

    /// Record a doubled delimiter at `pos`: keep one copy, drop the other.
    fn escape(&mut self, src: &str, pos: usize) {
        let buf = self.owned.get_or_insert_with(String::new);
        buf.push_str(&src[self.tail..=pos]);
        self.tail = pos + 2;
    }

    fn finish<'s>(self, src: &'s str, end: usize, blocks: &mut Vec<Block<'s>>) {
        let text = match self.owned {
            None if self.tail < end => Cow::Borrowed(&src[self.tail..end]),
            None => return,
            Some(mut buf) => {
                buf.push_str(&src[self.tail..end]);
                Cow::Owned(buf)
            }
        };
        blocks.push(Block {
            kind: BlockKind::Text,
            text,
            offset: self.offset,
        });
    }
}

// ── Splitter ──────────────────────────────────────────────────────────────────

/// Split `src` into blocks, left to right, in one pass.
pub fn split(src: &str) -> Result<Vec<Block<'_>>> {
    let bytes = src.as_bytes();
    let mut blocks = Vec::new();
    let mut run = TextRun::new(0);
    let mut pos = 0;

    while pos < bytes.len() {
        let ch = bytes[pos];
        match ch {
            b'{' | b'[' | b'}' | b']' if bytes.get(pos + 1) == Some(&ch) => {
                run.escape(src, pos);
                pos += 2;
            }
            b'{' | b'[' => {
                let kind = if ch == b'{' {
                    BlockKind::Field
                } else {
                    BlockKind::Script
                };
                let end = find_closing(src, pos + 1, ch).ok_or_else(|| {
                    FormatError::new(
                        ErrorCode::UnclosedBrace,
                        format!("'{}' is never closed", ch as char),
                    )
                    .at(pos)
                })?;
                run.finish(src, pos, &mut blocks);
                blocks.push(Block {
                    kind,
                    text: Cow::Borrowed(&src[pos + 1..end]),
                    offset: pos + 1,
                });
                pos = end + 1;
                run = TextRun::new(pos);
            }
            b'}' | b']' => {
                return Err(FormatError::new(
                    ErrorCode::InvalidOperator,
                    format!("unmatched '{}'", ch as char),
                )
                .at(pos));
            }
            _ => pos += 1,
        }
    }

    run.finish(src, bytes.len(), &mut blocks);
    Ok(blocks)
}

/// What the scanner in [`find_closing`] is currently inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    /// Script text closed by `close`: `[...]`, `{$...}` or an index step.
    /// Quoted strings are skipped.
    Script { close: u8 },
    /// Plain replacement field.  After the top-level `:` the rest is format
    /// spec text, where quotes are ordinary characters.
    Field { spec: bool },
}

impl Frame {
    /// Frame for a block opened by `open` whose content starts at `from`.
    fn opened(bytes: &[u8], open: u8, from: usize) -> Self {
        match open {
            b'{' if bytes.get(from) == Some(&b'$') => Frame::Script { close: b'}' },
            b'{' => Frame::Field { spec: false },
            _ => Frame::Script { close: b']' },
        }
    }
}

/// Byte position of the delimiter closing a block opened by `open` (`{` or
/// `[`) whose content starts at `from`.
///
/// Nested fields and brackets are tracked on an explicit stack.  Quoted
/// strings (with backslash escapes) are skipped in script text and index
/// steps, so `{0['}']}` closes at the last brace, but not in a format spec,
/// so `{0:'<3}` closes at its own brace.  A quote that is never closed
/// counts as an ordinary character.
pub(crate) fn find_closing(src: &str, from: usize, open: u8) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut stack = vec![Frame::opened(bytes, open, from)];
    let mut pos = from;

    while pos < bytes.len() {
        let ch = bytes[pos];
        let Some(top) = stack.last_mut() else {
            return None;
        };
        match (*top, ch) {
            (Frame::Script { .. }, b'\'' | b'"') => {
                if let Some(end) = skip_quoted(bytes, pos) {
                    pos = end + 1;
                    continue;
                }
            }
            (Frame::Field { spec: false }, b':') => *top = Frame::Field { spec: true },
            (Frame::Script { .. } | Frame::Field { spec: false }, b'[') => {
                stack.push(Frame::Script { close: b']' });
            }
            (_, b'{') => stack.push(Frame::opened(bytes, b'{', pos + 1)),
            (Frame::Script { close }, c) if c == close => {
                stack.pop();
            }
            (Frame::Field { .. }, b'}') => {
                stack.pop();
            }
            _ => {}
        }
        if stack.is_empty() {
            return Some(pos);
        }
        pos += 1;
    }
    None
}

/// Position of the quote matching the one at `start`.
fn skip_quoted(bytes: &[u8], start: usize) -> Option<usize> {
    let quote = bytes[start];
    let mut pos = start + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            c if c == quote => return Some(pos),
            _ => pos += 1,
        }
    }
    None
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<(BlockKind, String)> {
        split(src)
            .unwrap()
            .into_iter()
            .map(|b| (b.kind, b.text.into_owned()))
            .collect()
    }

    #[test]
    fn escaped_braces_collapse() {
        assert_eq!(kinds("{{a}}"), vec![(BlockKind::Text, "{a}".into())]);
        assert_eq!(kinds("[[x]]"), vec![(BlockKind::Text, "[x]".into())]);
    }

    #[test]
    fn mixed_blocks() {
        let blocks = split("a{0}b[${0}]c").unwrap();
        let got: Vec<_> = blocks
            .iter()
            .map(|b| (b.kind, b.text.as_ref(), b.offset))
            .collect();
        assert_eq!(
            got,
            vec![
                (BlockKind::Text, "a", 0),
                (BlockKind::Field, "0", 2),
                (BlockKind::Text, "b", 4),
                (BlockKind::Script, "${0}", 6),
                (BlockKind::Text, "c", 11),
            ]
        );
    }

    #[test]
    fn plain_text_is_borrowed() {
        let blocks = split("hello").unwrap();
        assert!(matches!(blocks[0].text, Cow::Borrowed("hello")));
    }

    #[test]
    fn no_empty_text_blocks() {
        assert!(split("").unwrap().is_empty());
        assert_eq!(
            kinds("{0}{1}"),
            vec![(BlockKind::Field, "0".into()), (BlockKind::Field, "1".into())]
        );
    }

    #[test]
    fn empty_field() {
        let blocks = split("{}").unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::Field);
        assert_eq!(blocks[0].text, "");
        assert_eq!(blocks[0].offset, 1);
    }

    #[test]
    fn nested_fields_stay_in_one_block() {
        assert_eq!(
            kinds("{${0}!=1?'s'}!"),
            vec![
                (BlockKind::Field, "${0}!=1?'s'".into()),
                (BlockKind::Text, "!".into()),
            ]
        );
        assert_eq!(
            kinds("[$0[1] == 2]"),
            vec![(BlockKind::Script, "$0[1] == 2".into())]
        );
    }

    #[test]
    fn quoted_closers_are_skipped() {
        assert_eq!(
            kinds("{0['}']}"),
            vec![(BlockKind::Field, "0['}']".into())]
        );
        assert_eq!(
            kinds("[\"a]\\\"]\"]"),
            vec![(BlockKind::Script, "\"a]\\\"]\"".into())]
        );
    }

    #[test]
    fn quotes_in_format_spec_are_literal() {
        assert_eq!(
            kinds("{0:'<3}{1:\">3}"),
            vec![
                (BlockKind::Field, "0:'<3".into()),
                (BlockKind::Field, "1:\">3".into()),
            ]
        );
        assert_eq!(
            kinds("[$0 ? {0:'^5} : 'x']!"),
            vec![
                (BlockKind::Script, "$0 ? {0:'^5} : 'x'".into()),
                (BlockKind::Text, "!".into()),
            ]
        );
    }

    #[test]
    fn deep_nesting_does_not_recurse() {
        let src = "{$ ".repeat(50_000) + &"}".repeat(50_000);
        let blocks = split(&src).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::Field);
    }

    #[test]
    fn unclosed_block() {
        let err = split("ab{0").unwrap_err();
        assert_eq!(err.code, ErrorCode::UnclosedBrace);
        assert_eq!(err.offset, Some(2));
        let err = split("[$0 == 1").unwrap_err();
        assert_eq!(err.code, ErrorCode::UnclosedBrace);
        assert_eq!(err.offset, Some(0));
    }

    #[test]
    fn stray_closer() {
        let err = split("a}b").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidOperator);
        assert_eq!(err.offset, Some(1));
    }

    #[test]
    fn multibyte_text() {
        assert_eq!(
            kinds("é{0}ü{{"),
            vec![
                (BlockKind::Text, "é".into()),
                (BlockKind::Field, "0".into()),
                (BlockKind::Text, "ü{".into()),
            ]
        );
    }
}
