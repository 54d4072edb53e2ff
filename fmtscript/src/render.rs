//! Turning a resolved argument into text.
//!
//! The engine only decides *which* value a field produces; [`Render`] decides
//! how it looks.  [`PlainRenderer`] covers `[[fill]align][width][.precision]`.

use std::fmt::Write as _;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::error::{ErrorCode, FormatError, Result};
use crate::value::Argument;

/// The text after `:` in a replacement field, unparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSpec {
    pub text: String,
    /// Byte offset of `text` in the format string.
    pub offset: usize,
}

impl FormatSpec {
    pub fn new(text: impl Into<String>, offset: usize) -> Self {
        FormatSpec {
            text: text.into(),
            offset,
        }
    }

    fn invalid(&self, why: &str) -> FormatError {
        FormatError::new(
            ErrorCode::InvalidOperator,
            format!("invalid format spec '{}': {why}", self.text),
        )
        .at(self.offset)
    }
}

/// Per-type rendering collaborator.
pub trait Render {
    /// Append `value`, formatted according to `spec`, to `out`.
    fn render(&self, value: &Argument<'_>, spec: Option<&FormatSpec>, out: &mut String)
        -> Result<()>;
}

// ── Plain renderer ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
}

impl Align {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '<' => Some(Align::Left),
            '>' => Some(Align::Right),
            '^' => Some(Align::Center),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    fill: char,
    align: Option<Align>,
    width: usize,
    precision: Option<usize>,
}

impl Layout {
    fn parse(spec: &FormatSpec) -> Result<Self> {
        let chars: Vec<char> = spec.text.chars().collect();
        let mut layout = Layout {
            fill: ' ',
            align: None,
            width: 0,
            precision: None,
        };
        let mut i = 0;

        if let Some(align) = chars.get(1).copied().and_then(Align::from_char) {
            layout.fill = chars[0];
            layout.align = Some(align);
            i = 2;
        } else if let Some(align) = chars.first().copied().and_then(Align::from_char) {
            layout.align = Some(align);
            i = 1;
        }

        let (width, next) = read_count(&chars, i);
        if let Some(w) = width {
            layout.width = w.ok_or_else(|| spec.invalid("width too large"))?;
        }
        i = next;

        if chars.get(i) == Some(&'.') {
            let (precision, next) = read_count(&chars, i + 1);
            let precision = precision.ok_or_else(|| spec.invalid("missing precision"))?;
            layout.precision = Some(precision.ok_or_else(|| spec.invalid("precision too large"))?);
            i = next;
        }

        if i != chars.len() {
            return Err(spec.invalid(&format!("unexpected '{}'", chars[i])));
        }
        Ok(layout)
    }
}

/// Largest accepted width or precision.
const MAX_COUNT: usize = u16::MAX as usize;

/// Digits starting at `i`: `None` when there are none, `Some(None)` when
/// the count exceeds [`MAX_COUNT`].
fn read_count(chars: &[char], i: usize) -> (Option<Option<usize>>, usize) {
    let end = chars[i.min(chars.len())..]
        .iter()
        .position(|c| !c.is_ascii_digit())
        .map_or(chars.len(), |n| i + n);
    if end == i {
        return (None, i);
    }
    let digits: String = chars[i..end].iter().collect();
    let count = digits.parse::<usize>().ok().filter(|n| *n <= MAX_COUNT);
    (Some(count), end)
}

/// Renders values with their natural text.
///
/// Numbers align right by default, everything else left.  Width counts
/// display columns.  Precision is the number of decimals for floats and the
/// maximum number of characters for text; it is rejected for integers and
/// booleans.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainRenderer;

impl Render for PlainRenderer {
    fn render(
        &self,
        value: &Argument<'_>,
        spec: Option<&FormatSpec>,
        out: &mut String,
    ) -> Result<()> {
        let Some(spec) = spec.filter(|s| !s.text.is_empty()) else {
            // Writing into a String cannot fail.
            let _ = write!(out, "{value}");
            return Ok(());
        };
        let layout = Layout::parse(spec)?;

        let numeric = matches!(
            value,
            Argument::Int(_) | Argument::Uint(_) | Argument::Float(_)
        );
        let text = match (value, layout.precision) {
            (Argument::Float(x), Some(p)) => format!("{x:.p$}"),
            (Argument::Int(_) | Argument::Uint(_) | Argument::Bool(_), Some(_)) => {
                return Err(spec.invalid(&format!("precision not allowed for {}", value.type_name())));
            }
            (_, Some(p)) => value.to_string().chars().take(p).collect(),
            (_, None) => value.to_string(),
        };

        let align = layout
            .align
            .unwrap_or(if numeric { Align::Right } else { Align::Left });
        pad(out, &text, layout.width, align, layout.fill);
        Ok(())
    }
}

/// Append `text` to `out`, filled to `width` display columns.
///
/// Widths are measured with `unicode-width`, so East Asian wide characters
/// count as two columns.  A wide fill character never overshoots: columns
/// it cannot fill exactly are left empty.
fn pad(out: &mut String, text: &str, width: usize, align: Align, fill: char) {
    let used = text.width();
    if used >= width {
        out.push_str(text);
        return;
    }
    let columns = width - used;
    let (before, after) = match align {
        Align::Left => (0, columns),
        Align::Right => (columns, 0),
        Align::Center => (columns / 2, columns - columns / 2),
    };
    let step = fill.width().unwrap_or(1).max(1);
    let fills = |cols: usize| std::iter::repeat(fill).take(cols / step);
    out.extend(fills(before));
    out.push_str(text);
    out.extend(fills(after));
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn render(value: Argument<'_>, spec: &str) -> Result<String> {
        let mut out = String::new();
        let spec = FormatSpec::new(spec, 0);
        PlainRenderer.render(&value, Some(&spec), &mut out)?;
        Ok(out)
    }

    #[test]
    fn natural_text() {
        let mut out = String::new();
        PlainRenderer.render(&Argument::from(2.0), None, &mut out).unwrap();
        PlainRenderer.render(&Argument::None, None, &mut out).unwrap();
        PlainRenderer.render(&Argument::from('x'), None, &mut out).unwrap();
        assert_eq!(out, "2.0x");
    }

    #[test]
    fn width_and_default_alignment() {
        assert_eq!(render(Argument::from(42), "5").unwrap(), "   42");
        assert_eq!(render(Argument::from("ab"), "5").unwrap(), "ab   ");
        assert_eq!(render(Argument::from("abcdef"), "3").unwrap(), "abcdef");
    }

    #[test]
    fn explicit_alignment_and_fill() {
        assert_eq!(render(Argument::from("ab"), ">4").unwrap(), "  ab");
        assert_eq!(render(Argument::from("ab"), "*^6").unwrap(), "**ab**");
        assert_eq!(render(Argument::from("ab"), "-^5").unwrap(), "-ab--");
        assert_eq!(render(Argument::from(7), "0<3").unwrap(), "700");
        assert_eq!(render(Argument::from("é"), "é>3").unwrap(), "ééé");
    }

    #[test]
    fn width_counts_display_columns() {
        assert_eq!(render(Argument::from("日本"), ">4").unwrap(), "日本");
        assert_eq!(render(Argument::from("日本"), ">6").unwrap(), "  日本");
        assert_eq!(render(Argument::from("日"), "*^5").unwrap(), "*日**");
        assert_eq!(render(Argument::from("ab"), "日<6").unwrap(), "ab日日");
        assert_eq!(render(Argument::from("ab"), "日<5").unwrap(), "ab日");
    }

    #[test]
    fn precision() {
        assert_eq!(render(Argument::from(1.23456), ".2").unwrap(), "1.23");
        assert_eq!(render(Argument::from(2.5), "8.3").unwrap(), "   2.500");
        assert_eq!(render(Argument::from("héllo"), ".2").unwrap(), "hé");
        let err = render(Argument::from(3), ".2").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidOperator);
    }

    #[test]
    fn empty_spec_is_plain() {
        assert_eq!(render(Argument::from(true), "").unwrap(), "true");
    }

    #[test]
    fn invalid_specs() {
        for bad in ["x", "5d", ".", "<<<", "1.2.3", "99999999", ".70000"] {
            let err = render(Argument::from(1.0), bad).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidOperator, "{bad}");
            assert_eq!(err.offset, Some(0));
        }
    }
}
