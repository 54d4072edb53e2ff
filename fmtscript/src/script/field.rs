//! Argument references and the plain replacement-field parser.
//!
//! A plain field is `arg? step* (':' spec)?`: a decimal index, a name or
//! nothing (automatic numbering), then any number of `.attr` / `[index]`
//! steps, then the format spec handed to the renderer.

use smallvec::SmallVec;

use super::split::find_closing;
use crate::error::{ErrorCode, FormatError, Result};
use crate::render::FormatSpec;
use crate::value::access::{is_ident_continue, is_ident_start};
use crate::value::{Access, AttributeName, IndexingValue};

/// Top-level lookup key into the argument store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgKey {
    Index(usize),
    Named(String),
}

/// One `.attr` or `[index]` step, with the offset of its `.` or `[`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessStep {
    pub access: Access,
    pub offset: usize,
}

/// Steps applied left to right at evaluation time.  Most references carry
/// zero or one step.
pub type AccessChain = SmallVec<[AccessStep; 2]>;

/// A compiled reference to an argument; never resolved before evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgRef {
    pub key: ArgKey,
    pub steps: AccessChain,
    pub offset: usize,
}

// ── Automatic numbering ───────────────────────────────────────────────────────

/// Assigns positions to `{}` fields in textual order.
#[derive(Debug, Default)]
pub(crate) struct AutoIndex {
    next: usize,
    explicit: bool,
    strict: bool,
}

impl AutoIndex {
    pub(crate) fn new(strict: bool) -> Self {
        AutoIndex {
            strict,
            ..Self::default()
        }
    }

    pub(crate) fn next(&mut self, offset: usize) -> Result<usize> {
        if self.strict && self.explicit {
            return Err(mixed_numbering(offset));
        }
        let index = self.next;
        self.next += 1;
        Ok(index)
    }

    pub(crate) fn explicit(&mut self, offset: usize) -> Result<()> {
        if self.strict && self.next > 0 {
            return Err(mixed_numbering(offset));
        }
        self.explicit = true;
        Ok(())
    }
}

fn mixed_numbering(offset: usize) -> FormatError {
    FormatError::new(
        ErrorCode::InvalidFieldName,
        "cannot mix automatic and explicit field numbering",
    )
    .at(offset)
}

// ── Field parser ──────────────────────────────────────────────────────────────

struct FieldParser<'a> {
    src: &'a str,
    pos: usize,
    base: usize,
}

impl<'a> FieldParser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn offset(&self) -> usize {
        self.base + self.pos
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.src[start..self.pos]
    }

    fn parse_key(&mut self, auto: &mut AutoIndex) -> Result<ArgKey> {
        let offset = self.offset();
        match self.peek() {
            Some(c) if c.is_ascii_digit() => {
                let digits = self.take_while(|c| c.is_ascii_digit());
                let index = digits.parse::<usize>().map_err(|_| {
                    FormatError::new(ErrorCode::InvalidIndex, format!("index {digits} is too large"))
                        .at(offset)
                })?;
                auto.explicit(offset)?;
                Ok(ArgKey::Index(index))
            }
            Some(c) if is_ident_start(c) => {
                let name = self.take_while(is_ident_continue);
                Ok(ArgKey::Named(name.to_owned()))
            }
            _ => Ok(ArgKey::Index(auto.next(offset)?)),
        }
    }

    fn parse_steps(&mut self) -> Result<AccessChain> {
        let mut steps = AccessChain::new();
        loop {
            let offset = self.offset();
            match self.peek() {
                Some('.') => {
                    self.pos += 1;
                    let name = self.take_while(is_ident_continue);
                    let attr = AttributeName::new(name).map_err(|e| e.at(offset + 1))?;
                    steps.push(AccessStep {
                        access: Access::Attribute(attr),
                        offset,
                    });
                }
                Some('[') => {
                    let close = find_closing(self.src, self.pos + 1, b'[')
                        .ok_or_else(|| {
                            FormatError::new(ErrorCode::UnclosedBrace, "'[' is never closed").at(offset)
                        })?;
                    let inner = &self.src[self.pos + 1..close];
                    let index = parse_index(inner, offset + 1)?;
                    self.pos = close + 1;
                    steps.push(AccessStep {
                        access: Access::Index(index),
                        offset,
                    });
                }
                _ => return Ok(steps),
            }
        }
    }
}

/// Parse the content of a plain replacement field.
pub(crate) fn parse_field(
    src: &str,
    base: usize,
    auto: &mut AutoIndex,
) -> Result<(ArgRef, Option<FormatSpec>)> {
    let mut p = FieldParser { src, pos: 0, base };
    let key = p.parse_key(auto)?;
    let steps = p.parse_steps()?;
    let arg = ArgRef {
        key,
        steps,
        offset: base,
    };

    match p.peek() {
        None => Ok((arg, None)),
        Some(':') => {
            let spec = FormatSpec::new(&src[p.pos + 1..], base + p.pos + 1);
            Ok((arg, Some(spec)))
        }
        Some(c) => Err(FormatError::new(
            ErrorCode::InvalidFieldName,
            format!("unexpected '{c}' in field"),
        )
        .at(p.offset())),
    }
}

/// Parse the text between `[` and `]` in a plain field.
///
/// Accepts `n`, `-n`, `b:e` with either side optional, a quoted key, or a
/// bare word, which is taken as a key.
fn parse_index(text: &str, base: usize) -> Result<IndexingValue> {
    let trimmed = text.trim();
    let lead = text.len() - text.trim_start().len();
    let invalid = || {
        FormatError::new(ErrorCode::InvalidIndex, format!("invalid index '{trimmed}'")).at(base + lead)
    };

    if let Some(quote @ ('\'' | '"')) = trimmed.chars().next() {
        return unquote(trimmed, quote).map(IndexingValue::Key).ok_or_else(invalid);
    }

    if let Some((begin, end)) = trimmed.split_once(':') {
        let begin = match begin.trim() {
            "" => 0,
            b => b.parse::<i64>().map_err(|_| invalid())?,
        };
        let end = match end.trim() {
            "" => None,
            e => Some(e.parse::<i64>().map_err(|_| invalid())?),
        };
        return Ok(IndexingValue::Slice { begin, end });
    }

    if let Ok(n) = trimmed.parse::<i64>() {
        return Ok(IndexingValue::Index(n));
    }
    if !trimmed.is_empty() && !trimmed.starts_with(|c: char| c == '-' || c.is_ascii_digit()) {
        return Ok(IndexingValue::Key(trimmed.to_owned()));
    }
    Err(invalid())
}

/// Strip matching quotes and resolve backslash escapes.
fn unquote(s: &str, quote: char) -> Option<String> {
    let body = s.strip_prefix(quote)?.strip_suffix(quote)?;
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push(chars.next()?),
            c if c == quote => return None,
            c => out.push(c),
        }
    }
    Some(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn field(src: &str) -> (ArgRef, Option<FormatSpec>) {
        parse_field(src, 1, &mut AutoIndex::new(true)).unwrap()
    }

    fn field_err(src: &str) -> FormatError {
        parse_field(src, 1, &mut AutoIndex::new(true)).unwrap_err()
    }

    fn accesses(arg: &ArgRef) -> Vec<Access> {
        arg.steps.iter().map(|s| s.access.clone()).collect()
    }

    #[test]
    fn index_and_name() {
        let (arg, spec) = field("3");
        assert_eq!(arg.key, ArgKey::Index(3));
        assert!(arg.steps.is_empty());
        assert!(spec.is_none());
        let (arg, _) = field("user_name");
        assert_eq!(arg.key, ArgKey::Named("user_name".into()));
    }

    #[test]
    fn steps_in_order() {
        let (arg, _) = field("0.items[-1][1:3]['k'][key]");
        assert_eq!(
            accesses(&arg),
            vec![
                Access::Attribute(AttributeName::new("items").unwrap()),
                Access::Index(IndexingValue::Index(-1)),
                Access::Index(IndexingValue::Slice { begin: 1, end: Some(3) }),
                Access::Index(IndexingValue::Key("k".into())),
                Access::Index(IndexingValue::Key("key".into())),
            ]
        );
        assert_eq!(arg.steps[0].offset, 2);
    }

    #[test]
    fn open_slices() {
        let (arg, _) = field("0[:2][1:][:]");
        assert_eq!(
            accesses(&arg),
            vec![
                Access::Index(IndexingValue::Slice { begin: 0, end: Some(2) }),
                Access::Index(IndexingValue::Slice { begin: 1, end: None }),
                Access::Index(IndexingValue::Slice { begin: 0, end: None }),
            ]
        );
    }

    #[test]
    fn format_spec_split() {
        let (arg, spec) = field("name:>8");
        assert_eq!(arg.key, ArgKey::Named("name".into()));
        let spec = spec.unwrap();
        assert_eq!(spec.text, ">8");
        assert_eq!(spec.offset, 6);
    }

    #[test]
    fn bad_attribute() {
        let err = field_err("0.2x");
        assert_eq!(err.code, ErrorCode::InvalidAttribute);
        assert_eq!(err.offset, Some(3));
        assert_eq!(field_err("0.").code, ErrorCode::InvalidAttribute);
    }

    #[test]
    fn bad_index() {
        let err = field_err("0[1x]");
        assert_eq!(err.code, ErrorCode::InvalidIndex);
        assert_eq!(err.offset, Some(3));
        assert_eq!(field_err("0[]").code, ErrorCode::InvalidIndex);
        assert_eq!(field_err("0['open]").code, ErrorCode::InvalidIndex);
        assert_eq!(field_err("0[1").code, ErrorCode::UnclosedBrace);
    }

    #[test]
    fn junk_after_reference() {
        let err = field_err("0 x");
        assert_eq!(err.code, ErrorCode::InvalidFieldName);
        assert_eq!(err.offset, Some(2));
    }

    #[test]
    fn automatic_numbering() {
        let mut auto = AutoIndex::new(true);
        let (a, _) = parse_field("", 1, &mut auto).unwrap();
        let (b, _) = parse_field(":>3", 5, &mut auto).unwrap();
        assert_eq!(a.key, ArgKey::Index(0));
        assert_eq!(b.key, ArgKey::Index(1));
        let err = parse_field("0", 9, &mut auto).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFieldName);
        assert_eq!(err.offset, Some(9));
    }

    #[test]
    fn lenient_numbering() {
        let mut auto = AutoIndex::new(false);
        parse_field("1", 1, &mut auto).unwrap();
        let (a, _) = parse_field("", 4, &mut auto).unwrap();
        assert_eq!(a.key, ArgKey::Index(0));
    }

    #[test]
    fn quoted_key_escapes() {
        let (arg, _) = field(r#"0["a\"b"]"#);
        assert_eq!(
            accesses(&arg),
            vec![Access::Index(IndexingValue::Key("a\"b".into()))]
        );
    }
}
