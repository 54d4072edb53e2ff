//! Error codes and the error type shared by every stage of the pipeline.
//!
//! Every error aborts the whole format call.  The [`ErrorCode`] set is small
//! and stable; its discriminants are what foreign callers see.

use std::fmt;

use thiserror::Error;

/// Stable error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCode {
    NoError = 0,
    EndOfString,
    InvalidFieldName,
    InvalidCondition,
    InvalidIndex,
    InvalidAttribute,
    InvalidOperator,
    InvalidString,
    UnclosedBrace,
    InvalidConversion,
    RecursionLimit,
    UnknownError,
}

impl ErrorCode {
    /// Human-readable name, used as the prefix of error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NoError => "no error",
            ErrorCode::EndOfString => "end of string",
            ErrorCode::InvalidFieldName => "invalid field name",
            ErrorCode::InvalidCondition => "invalid condition",
            ErrorCode::InvalidIndex => "invalid index",
            ErrorCode::InvalidAttribute => "invalid attribute",
            ErrorCode::InvalidOperator => "invalid operator",
            ErrorCode::InvalidString => "invalid string",
            ErrorCode::UnclosedBrace => "unclosed brace",
            ErrorCode::InvalidConversion => "invalid conversion",
            ErrorCode::RecursionLimit => "recursion limit exceeded",
            ErrorCode::UnknownError => "unknown error",
        }
    }

    /// Inverse of `code as u8`.
    pub fn from_u8(raw: u8) -> Option<Self> {
        const ALL: [ErrorCode; 12] = [
            ErrorCode::NoError,
            ErrorCode::EndOfString,
            ErrorCode::InvalidFieldName,
            ErrorCode::InvalidCondition,
            ErrorCode::InvalidIndex,
            ErrorCode::InvalidAttribute,
            ErrorCode::InvalidOperator,
            ErrorCode::InvalidString,
            ErrorCode::UnclosedBrace,
            ErrorCode::InvalidConversion,
            ErrorCode::RecursionLimit,
            ErrorCode::UnknownError,
        ];
        ALL.get(raw as usize).copied()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error raised while splitting, lexing, compiling or evaluating.
///
/// `offset` is a 0-based byte offset into the top-level format string, when
/// the failing construct has a source position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}{}", offset_suffix(.offset))]
pub struct FormatError {
    pub code: ErrorCode,
    pub offset: Option<usize>,
    pub message: String,
}

fn offset_suffix(offset: &Option<usize>) -> String {
    match offset {
        Some(n) => format!(" at offset {n}"),
        None => String::new(),
    }
}

impl FormatError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        FormatError {
            code,
            offset: None,
            message: message.into(),
        }
    }

    /// Attach a source offset, replacing any existing one.
    pub fn at(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Attach a source offset only if none has been recorded yet.
    ///
    /// Accessors have no idea where in the format string they were reached
    /// from; the caller fills the position in on the way out.
    pub fn or_at(mut self, offset: usize) -> Self {
        self.offset.get_or_insert(offset);
        self
    }
}

/// Result type for formatting operations.
pub type Result<T> = std::result::Result<T, FormatError>;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_offset() {
        let e = FormatError::new(ErrorCode::InvalidCondition, "expected '?'").at(8);
        assert_eq!(e.to_string(), "invalid condition: expected '?' at offset 8");
    }

    #[test]
    fn display_without_offset() {
        let e = FormatError::new(ErrorCode::InvalidAttribute, "no attribute 'bogus'");
        assert_eq!(e.to_string(), "invalid attribute: no attribute 'bogus'");
    }

    #[test]
    fn or_at_keeps_first_offset() {
        let e = FormatError::new(ErrorCode::InvalidIndex, "x").at(3).or_at(10);
        assert_eq!(e.offset, Some(3));
        let e = FormatError::new(ErrorCode::InvalidIndex, "x").or_at(10);
        assert_eq!(e.offset, Some(10));
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(ErrorCode::NoError as u8, 0);
        assert_eq!(ErrorCode::EndOfString as u8, 1);
        assert_eq!(ErrorCode::UnclosedBrace as u8, 8);
        assert_eq!(ErrorCode::UnknownError as u8, 11);
        for raw in 0..=11u8 {
            assert_eq!(ErrorCode::from_u8(raw).map(|c| c as u8), Some(raw));
        }
        assert_eq!(ErrorCode::from_u8(12), None);
    }
}
