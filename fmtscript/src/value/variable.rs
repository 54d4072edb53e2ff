//! Runtime value type of the script engine.
//!
//! A [`Variable`] is exactly one of four kinds.  Opaque argument kinds never
//! reach this type; they are rejected when an argument is projected.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::error::{ErrorCode, FormatError, Result};

/// A script runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Variable {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Shared, immutable string; cloning never copies the text.
    Str(Arc<str>),
}

impl Default for Variable {
    fn default() -> Self {
        Variable::Str(Arc::from(""))
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Bool(b) => write!(f, "{b}"),
            Variable::Int(n) => write!(f, "{n}"),
            Variable::Float(x) => write_float(f, *x),
            Variable::Str(s) => f.write_str(s),
        }
    }
}

/// Floats print without trailing zeros, but keep one decimal when integral
/// so they stay distinguishable from integers.
pub(crate) fn write_float(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 {
        write!(f, "{x:.1}")
    } else {
        write!(f, "{x}")
    }
}

impl Variable {
    /// Truthiness: booleans as-is, numbers non-zero, strings non-empty.
    pub fn truthy(&self) -> bool {
        match self {
            Variable::Bool(b) => *b,
            Variable::Int(n) => *n != 0,
            Variable::Float(x) => *x != 0.0,
            Variable::Str(s) => !s.is_empty(),
        }
    }

    /// Name of the kind, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Variable::Bool(_) => "bool",
            Variable::Int(_) => "integer",
            Variable::Float(_) => "float",
            Variable::Str(_) => "string",
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Variable::Str(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variable::Str(s) => Some(s),
            _ => None,
        }
    }

    fn to_f64(&self) -> f64 {
        match self {
            Variable::Bool(b) => f64::from(u8::from(*b)),
            Variable::Int(n) => *n as f64,
            Variable::Float(x) => *x,
            Variable::Str(_) => f64::NAN,
        }
    }

    /// Order two values.
    ///
    /// Numbers (booleans count as 0/1) compare after promotion to a common
    /// representation; strings compare lexicographically.  Mixing a number
    /// with a string is an error, never a coercion.  `Ok(None)` means the
    /// values are unordered (NaN).
    pub fn compare(&self, rhs: &Variable) -> Result<Option<Ordering>> {
        match (self, rhs) {
            (Variable::Str(a), Variable::Str(b)) => Ok(Some(a.cmp(b))),
            (Variable::Str(_), _) | (_, Variable::Str(_)) => Err(FormatError::new(
                ErrorCode::InvalidOperator,
                format!(
                    "cannot compare {} with {}",
                    self.type_name(),
                    rhs.type_name()
                ),
            )),
            (Variable::Int(a), Variable::Int(b)) => Ok(Some(a.cmp(b))),
            (Variable::Bool(a), Variable::Bool(b)) => Ok(Some(a.cmp(b))),
            (Variable::Int(a), Variable::Float(b)) => Ok(cmp_int_float(*a, *b)),
            (Variable::Float(a), Variable::Int(b)) => Ok(cmp_int_float(*b, *a).map(Ordering::reverse)),
            _ => Ok(self.to_f64().partial_cmp(&rhs.to_f64())),
        }
    }
}

/// Exact ordering of an integer against a float, without rounding the
/// integer to the nearest representable double.
fn cmp_int_float(i: i64, x: f64) -> Option<Ordering> {
    // 2^63; every i64 is below it and at or above its negation.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if x.is_nan() {
        return None;
    }
    if x >= LIMIT {
        return Some(Ordering::Less);
    }
    if x < -LIMIT {
        return Some(Ordering::Greater);
    }
    let whole = x.trunc();
    let ord = i.cmp(&(whole as i64)).then_with(|| {
        let frac = x - whole;
        if frac > 0.0 {
            Ordering::Less
        } else if frac < 0.0 {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    });
    Some(ord)
}

impl From<bool> for Variable {
    fn from(b: bool) -> Self {
        Variable::Bool(b)
    }
}

impl From<i64> for Variable {
    fn from(n: i64) -> Self {
        Variable::Int(n)
    }
}

impl From<f64> for Variable {
    fn from(x: f64) -> Self {
        Variable::Float(x)
    }
}

impl From<String> for Variable {
    fn from(s: String) -> Self {
        Variable::Str(Arc::from(s))
    }
}

impl From<&str> for Variable {
    fn from(s: &str) -> Self {
        Variable::Str(Arc::from(s))
    }
}

impl From<char> for Variable {
    fn from(c: char) -> Self {
        let mut buf = [0u8; 4];
        Variable::Str(Arc::from(&*c.encode_utf8(&mut buf)))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
