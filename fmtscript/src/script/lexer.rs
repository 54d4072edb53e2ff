//! Script lexer: one script segment's source text to a lexeme stream.
//!
//! Single left-to-right pass over decoded characters.  Every lexeme carries
//! its absolute byte offset in the top-level format string.
//!
//! | Input                          | Lexeme                       |
//! |--------------------------------|------------------------------|
//! | `$0`, `@0`, `$name`, `@name`   | argument reference           |
//! | `if elif else end and or`      | keyword                      |
//! | `true`, `false`, numbers, `'…'` `"…"` | literal               |
//! | word right after `.`           | identifier (attribute name)  |
//! | `{…}`                          | nested field, raw text       |
//! | `$` alone                      | shorthand marker             |

use std::fmt;

use tracing::trace;

use super::field::ArgKey;
use super::split::find_closing;
use crate::error::{ErrorCode, FormatError, Result};
use crate::value::access::{is_ident_continue, is_ident_start};
use crate::value::Variable;

// ── Lexemes ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    If,
    Elif,
    Else,
    End,
    And,
    Or,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Self> {
        Some(match word {
            "if" => Keyword::If,
            "elif" => Keyword::Elif,
            "else" => Keyword::Else,
            "end" => Keyword::End,
            "and" => Keyword::And,
            "or" => Keyword::Or,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::If => "if",
            Keyword::Elif => "elif",
            Keyword::Else => "else",
            Keyword::End => "end",
            Keyword::And => "and",
            Keyword::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Not,
    Question,
    Colon,
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
}

/// Longest match first.
const OPERATORS: &[(&str, Operator)] = &[
    ("==", Operator::Eq),
    ("!=", Operator::Ne),
    ("<=", Operator::Le),
    (">=", Operator::Ge),
    ("&&", Operator::AndAnd),
    ("||", Operator::OrOr),
    ("<", Operator::Lt),
    (">", Operator::Gt),
    ("!", Operator::Not),
    ("?", Operator::Question),
    (":", Operator::Colon),
    (".", Operator::Dot),
    (",", Operator::Comma),
    ("(", Operator::LParen),
    (")", Operator::RParen),
    ("[", Operator::LBracket),
    ("]", Operator::RBracket),
];

impl Operator {
    pub fn as_str(self) -> &'static str {
        OPERATORS
            .iter()
            .find(|(_, op)| *op == self)
            .map_or("?", |(text, _)| *text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LexemeKind {
    Keyword(Keyword),
    Operator(Operator),
    Argument(ArgKey),
    /// Attribute name following a `.`.
    Identifier(String),
    Literal(Variable),
    /// Raw text between `{` and `}`; the lexeme offset is that of the `{`.
    Field(String),
    /// A `$` not starting an argument reference.
    Dollar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub kind: LexemeKind,
    pub offset: usize,
}

impl fmt::Display for LexemeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexemeKind::Keyword(k) => write!(f, "'{}'", k.as_str()),
            LexemeKind::Operator(op) => write!(f, "'{}'", op.as_str()),
            LexemeKind::Argument(ArgKey::Index(i)) => write!(f, "'${i}'"),
            LexemeKind::Argument(ArgKey::Named(n)) => write!(f, "'${n}'"),
            LexemeKind::Identifier(name) => write!(f, "'{name}'"),
            LexemeKind::Literal(Variable::Str(s)) => write!(f, "string {s:?}"),
            LexemeKind::Literal(v) => write!(f, "'{v}'"),
            LexemeKind::Field(text) => write!(f, "field '{{{text}}}'"),
            LexemeKind::Dollar => f.write_str("'$'"),
        }
    }
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    base: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str, base: usize) -> Self {
        Lexer { src, pos: 0, base }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek2(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if pred(c)) {
            self.advance();
        }
        &self.src[start..self.pos]
    }

    fn skip_ws(&mut self) {
        self.take_while(char::is_whitespace);
    }

    fn error(&self, code: ErrorCode, at: usize, message: impl Into<String>) -> FormatError {
        FormatError::new(code, message).at(self.base + at)
    }

    fn read_argument(&mut self, start: usize, sigil: char) -> Result<LexemeKind> {
        match self.peek() {
            Some(c) if c.is_ascii_digit() => {
                let digits = self.take_while(|c| c.is_ascii_digit());
                let index = digits.parse::<usize>().map_err(|_| {
                    self.error(ErrorCode::InvalidIndex, start, format!("index {digits} is too large"))
                })?;
                Ok(LexemeKind::Argument(ArgKey::Index(index)))
            }
            Some(c) if is_ident_start(c) => {
                let name = self.take_while(is_ident_continue);
                Ok(LexemeKind::Argument(ArgKey::Named(name.to_owned())))
            }
            _ if sigil == '$' => Ok(LexemeKind::Dollar),
            _ => Err(self.error(
                ErrorCode::InvalidFieldName,
                start,
                "'@' must be followed by an argument index or name",
            )),
        }
    }

    fn read_word(&mut self, start: usize, after_dot: bool) -> Result<LexemeKind> {
        let word = self.take_while(|c| c.is_alphanumeric() || c == '_');
        if after_dot {
            return Ok(LexemeKind::Identifier(word.to_owned()));
        }
        if let Some(k) = Keyword::from_word(word) {
            return Ok(LexemeKind::Keyword(k));
        }
        match word {
            "true" => Ok(LexemeKind::Literal(Variable::Bool(true))),
            "false" => Ok(LexemeKind::Literal(Variable::Bool(false))),
            _ => Err(self.error(
                ErrorCode::InvalidFieldName,
                start,
                format!("unknown word '{word}'; arguments are written $name"),
            )),
        }
    }

    fn read_number(&mut self, start: usize) -> Result<LexemeKind> {
        let negative = self.peek() == Some('-');
        if negative {
            self.advance();
        }
        let body = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        let invalid = || {
            let text = &self.src[start..self.pos];
            self.error(ErrorCode::InvalidString, start, format!("malformed number '{text}'"))
        };

        let radix = match body.get(..2) {
            Some("0x" | "0X") => Some(16),
            Some("0o" | "0O") => Some(8),
            Some("0b" | "0B") => Some(2),
            _ => None,
        };
        let value = if let Some(radix) = radix {
            let magnitude = i64::from_str_radix(&body[2..], radix).map_err(|_| invalid())?;
            Variable::Int(if negative { -magnitude } else { magnitude })
        } else {
            match body.matches('.').count() {
                0 => {
                    let n = body.parse::<i64>().map_err(|_| invalid())?;
                    Variable::Int(if negative { -n } else { n })
                }
                1 => {
                    let x = body.parse::<f64>().map_err(|_| invalid())?;
                    Variable::Float(if negative { -x } else { x })
                }
                _ => return Err(invalid()),
            }
        };
        Ok(LexemeKind::Literal(value))
    }

    fn read_string(&mut self, start: usize, quote: char) -> Result<LexemeKind> {
        let mut s = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(self.error(ErrorCode::InvalidString, start, "unterminated string"));
                }
                Some('\\') => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some('0') => s.push('\0'),
                    Some(c) => s.push(c),
                    None => {
                        return Err(self.error(ErrorCode::InvalidString, start, "unterminated string"));
                    }
                },
                Some(c) if c == quote => return Ok(LexemeKind::Literal(Variable::from(s))),
                Some(c) => s.push(c),
            }
        }
    }

    fn read_field(&mut self, start: usize) -> Result<LexemeKind> {
        let end = find_closing(self.src, start + 1, b'{')
            .ok_or_else(|| self.error(ErrorCode::UnclosedBrace, start, "'{' is never closed"))?;
        let text = self.src[start + 1..end].to_owned();
        self.pos = end + 1;
        Ok(LexemeKind::Field(text))
    }

    fn read_operator(&mut self, start: usize) -> Result<LexemeKind> {
        let rest = self.rest();
        match OPERATORS.iter().find(|(text, _)| rest.starts_with(text)) {
            Some((text, op)) => {
                self.pos += text.len();
                Ok(LexemeKind::Operator(*op))
            }
            None => {
                let sym: String = rest
                    .chars()
                    .take_while(|c| !c.is_alphanumeric() && !c.is_whitespace())
                    .take(2)
                    .collect();
                Err(self.error(ErrorCode::InvalidOperator, start, format!("unknown operator '{sym}'")))
            }
        }
    }

    fn next_lexeme(&mut self, after_dot: bool) -> Result<Option<Lexeme>> {
        self.skip_ws();
        let start = self.pos;
        let Some(ch) = self.peek() else {
            return Ok(None);
        };

        let kind = match ch {
            '$' | '@' => {
                self.advance();
                self.read_argument(start, ch)?
            }
            '\'' | '"' => {
                self.advance();
                self.read_string(start, ch)?
            }
            '{' => self.read_field(start)?,
            c if c.is_ascii_digit() => self.read_number(start)?,
            '-' if matches!(self.peek2(), Some(c) if c.is_ascii_digit() || c == '.') => {
                self.read_number(start)?
            }
            '.' if !after_dot && matches!(self.peek2(), Some(c) if c.is_ascii_digit()) => {
                self.read_number(start)?
            }
            c if c.is_alphabetic() || c == '_' => self.read_word(start, after_dot)?,
            _ => self.read_operator(start)?,
        };

        Ok(Some(Lexeme {
            kind,
            offset: self.base + start,
        }))
    }
}

/// Tokenize `src`, whose first byte sits at `base` in the format string.
pub fn tokenize(src: &str, base: usize) -> Result<Vec<Lexeme>> {
    let mut lexer = Lexer::new(src, base);
    let mut lexemes: Vec<Lexeme> = Vec::new();
    loop {
        let after_dot = matches!(
            lexemes.last(),
            Some(Lexeme { kind: LexemeKind::Operator(Operator::Dot), .. })
        );
        match lexer.next_lexeme(after_dot)? {
            Some(lexeme) => lexemes.push(lexeme),
            None => break,
        }
    }
    trace!(offset = base, count = lexemes.len(), "tokenized script");
    Ok(lexemes)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
