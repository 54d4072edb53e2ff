//! Type-erased runtime arguments and the per-call argument store.
//!
//! An [`Argument`] either borrows caller memory for the duration of one
//! format call (the default) or owns an independent copy, see
//! [`Argument::into_owned`].  The borrow checker enforces the difference.

use std::borrow::{Borrow, Cow};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use super::access::{
    resolve_position, resolve_range, unknown_attribute, unsupported_index, Access, Accessor,
    AttributeName, IndexingValue,
};
use super::variable::{write_float, Variable};
use crate::error::{ErrorCode, FormatError, Result};

// ── Argument ──────────────────────────────────────────────────────────────────

/// One runtime value handed to a format call.
#[derive(Debug, Clone)]
pub enum Argument<'a> {
    /// Absent value; also what out-of-range indexing yields.
    None,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Char(char),
    Str(Cow<'a, str>),
    /// Anything else, reached through the [`Accessor`] protocol.
    Handle(Handle<'a>),
}

/// An opaque value bound to its accessor vtable.
#[derive(Clone)]
pub enum Handle<'a> {
    Borrowed(&'a dyn Accessor),
    Shared(Arc<dyn Accessor + 'a>),
}

impl<'a> Handle<'a> {
    pub fn accessor(&self) -> &(dyn Accessor + 'a) {
        match self {
            Handle::Borrowed(a) => *a,
            Handle::Shared(a) => a.as_ref(),
        }
    }
}

impl fmt::Debug for Handle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.accessor(), f)
    }
}

impl<'a> Argument<'a> {
    /// Borrow any supported value.
    pub fn from_ref<T: AsArgument + ?Sized>(value: &'a T) -> Self {
        value.as_argument()
    }

    /// Borrow a value that only implements [`Accessor`].
    pub fn handle(value: &'a dyn Accessor) -> Self {
        Argument::Handle(Handle::Borrowed(value))
    }

    /// Take ownership of an accessor value.
    pub fn shared(value: impl Accessor + 'a) -> Self {
        Argument::Handle(Handle::Shared(Arc::new(value)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Argument::None => "none",
            Argument::Bool(_) => "bool",
            Argument::Int(_) | Argument::Uint(_) => "integer",
            Argument::Float(_) => "float",
            Argument::Char(_) => "char",
            Argument::Str(_) => "string",
            Argument::Handle(h) => h.accessor().type_name(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Argument::None)
    }

    /// `false` while the argument still points into caller memory.
    pub fn is_owned(&self) -> bool {
        !matches!(
            self,
            Argument::Str(Cow::Borrowed(_)) | Argument::Handle(Handle::Borrowed(_))
        )
    }

    /// `self[index]`.
    ///
    /// Strings index by codepoint.  Out-of-range positions yield
    /// [`Argument::None`] and slices clamp; neither is an error.
    pub fn index(&self, index: &IndexingValue) -> Result<Argument<'_>> {
        match self {
            Argument::None => Ok(Argument::None),
            Argument::Str(s) => index_str(&**s, index),
            Argument::Handle(h) => h.accessor().get_by_index(index),
            other => Err(unsupported_index(other.type_name(), index)),
        }
    }

    /// `self.attr`.  Unknown names are always an error.
    pub fn attribute(&self, attr: &AttributeName) -> Result<Argument<'_>> {
        match self {
            Argument::Str(s) => str_attribute(&**s, attr),
            Argument::Handle(h) => h.accessor().get_by_attribute(attr),
            other => Err(unknown_attribute(attr, other.type_name())),
        }
    }

    pub fn access(&self, access: &Access) -> Result<Argument<'_>> {
        match access {
            Access::Index(index) => self.index(index),
            Access::Attribute(attr) => self.attribute(attr),
        }
    }

    /// Project into script space.
    ///
    /// `None` projects to the empty string, so a lenient index miss stays
    /// usable in conditions.  Opaque values need an explicit projection.
    pub fn as_variable(&self) -> Result<Variable> {
        Ok(match self {
            Argument::None => Variable::default(),
            Argument::Bool(b) => Variable::Bool(*b),
            Argument::Int(n) => Variable::Int(*n),
            Argument::Uint(n) => match i64::try_from(*n) {
                Ok(n) => Variable::Int(n),
                Err(_) => Variable::Float(*n as f64),
            },
            Argument::Float(x) => Variable::Float(*x),
            Argument::Char(c) => Variable::from(*c),
            Argument::Str(s) => Variable::from(&**s),
            Argument::Handle(h) => {
                let accessor = h.accessor();
                accessor.to_variable().ok_or_else(|| {
                    FormatError::new(
                        ErrorCode::InvalidConversion,
                        format!("{} cannot be used as a script value", accessor.type_name()),
                    )
                })?
            }
        })
    }

    /// Materialise an independent copy that may outlive the caller's values.
    pub fn into_owned(self) -> Result<Argument<'static>> {
        Ok(match self {
            Argument::None => Argument::None,
            Argument::Bool(b) => Argument::Bool(b),
            Argument::Int(n) => Argument::Int(n),
            Argument::Uint(n) => Argument::Uint(n),
            Argument::Float(x) => Argument::Float(x),
            Argument::Char(c) => Argument::Char(c),
            Argument::Str(s) => Argument::Str(Cow::Owned(s.into_owned())),
            Argument::Handle(h) => Argument::Handle(Handle::Shared(h.accessor().to_shared()?)),
        })
    }

    /// A borrowed view of this argument; never allocates.
    pub fn reborrow(&self) -> Argument<'_> {
        match self {
            Argument::None => Argument::None,
            Argument::Bool(b) => Argument::Bool(*b),
            Argument::Int(n) => Argument::Int(*n),
            Argument::Uint(n) => Argument::Uint(*n),
            Argument::Float(x) => Argument::Float(*x),
            Argument::Char(c) => Argument::Char(*c),
            Argument::Str(s) => Argument::Str(Cow::Borrowed(&**s)),
            Argument::Handle(h) => Argument::Handle(Handle::Borrowed(h.accessor())),
        }
    }
}

impl fmt::Display for Argument<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::None => Ok(()),
            Argument::Bool(b) => write!(f, "{b}"),
            Argument::Int(n) => write!(f, "{n}"),
            Argument::Uint(n) => write!(f, "{n}"),
            Argument::Float(x) => write_float(f, *x),
            Argument::Char(c) => write!(f, "{c}"),
            Argument::Str(s) => f.write_str(s),
            Argument::Handle(h) => h.accessor().display(f),
        }
    }
}

// ── Strings ───────────────────────────────────────────────────────────────────

fn char_count(s: &str) -> usize {
    s.chars().count()
}

fn byte_offset(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map_or(s.len(), |(b, _)| b)
}

fn index_str<'s>(s: &'s str, index: &IndexingValue) -> Result<Argument<'s>> {
    match index {
        IndexingValue::Index(i) => Ok(resolve_position(*i, char_count(s))
            .and_then(|pos| s.chars().nth(pos))
            .map_or(Argument::None, Argument::Char)),
        IndexingValue::Slice { begin, end } => {
            let range = resolve_range(*begin, *end, char_count(s));
            let start = byte_offset(s, range.start);
            let stop = byte_offset(s, range.end);
            Ok(Argument::Str(Cow::Borrowed(&s[start..stop])))
        }
        IndexingValue::Key(_) => Err(unsupported_index("string", index)),
    }
}

fn str_attribute<'s>(s: &'s str, attr: &AttributeName) -> Result<Argument<'s>> {
    match attr.as_str() {
        "size" | "length" => Ok(Argument::Uint(char_count(s) as u64)),
        "bytes" => Ok(Argument::Uint(s.len() as u64)),
        "upper" => Ok(Argument::Str(Cow::Owned(s.to_uppercase()))),
        "lower" => Ok(Argument::Str(Cow::Owned(s.to_lowercase()))),
        _ => Err(unknown_attribute(attr, "string")),
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

/// Types that can be viewed as an [`Argument`] without copying.
pub trait AsArgument {
    fn as_argument(&self) -> Argument<'_>;
}

macro_rules! scalar_argument {
    ($variant:ident as $repr:ty: $($t:ty),+) => {
        $(
            impl AsArgument for $t {
                fn as_argument(&self) -> Argument<'_> {
                    Argument::$variant(*self as $repr)
                }
            }

            impl From<$t> for Argument<'_> {
                fn from(v: $t) -> Self {
                    Argument::$variant(v as $repr)
                }
            }
        )+
    };
}

scalar_argument!(Int as i64: i8, i16, i32, i64, isize);
scalar_argument!(Uint as u64: u8, u16, u32, u64, usize);
scalar_argument!(Float as f64: f32, f64);

impl AsArgument for bool {
    fn as_argument(&self) -> Argument<'_> {
        Argument::Bool(*self)
    }
}

impl From<bool> for Argument<'_> {
    fn from(b: bool) -> Self {
        Argument::Bool(b)
    }
}

impl AsArgument for char {
    fn as_argument(&self) -> Argument<'_> {
        Argument::Char(*self)
    }
}

impl From<char> for Argument<'_> {
    fn from(c: char) -> Self {
        Argument::Char(c)
    }
}

impl AsArgument for str {
    fn as_argument(&self) -> Argument<'_> {
        Argument::Str(Cow::Borrowed(self))
    }
}

impl AsArgument for String {
    fn as_argument(&self) -> Argument<'_> {
        Argument::Str(Cow::Borrowed(self.as_str()))
    }
}

impl AsArgument for Cow<'_, str> {
    fn as_argument(&self) -> Argument<'_> {
        Argument::Str(Cow::Borrowed(&**self))
    }
}

impl<'a> From<&'a str> for Argument<'a> {
    fn from(s: &'a str) -> Self {
        Argument::Str(Cow::Borrowed(s))
    }
}

impl From<String> for Argument<'_> {
    fn from(s: String) -> Self {
        Argument::Str(Cow::Owned(s))
    }
}

impl<'a> From<Cow<'a, str>> for Argument<'a> {
    fn from(s: Cow<'a, str>) -> Self {
        Argument::Str(s)
    }
}

impl<T: AsArgument + ?Sized> AsArgument for &T {
    fn as_argument(&self) -> Argument<'_> {
        (**self).as_argument()
    }
}

impl<T: AsArgument> AsArgument for Option<T> {
    fn as_argument(&self) -> Argument<'_> {
        self.as_ref().map_or(Argument::None, AsArgument::as_argument)
    }
}

impl AsArgument for Argument<'_> {
    fn as_argument(&self) -> Argument<'_> {
        self.reborrow()
    }
}

impl<T> AsArgument for Vec<T>
where
    T: AsArgument + fmt::Debug + Send + Sync,
{
    fn as_argument(&self) -> Argument<'_> {
        Argument::Handle(Handle::Borrowed(self))
    }
}

impl<T, const N: usize> AsArgument for [T; N]
where
    T: AsArgument + fmt::Debug + Send + Sync,
{
    fn as_argument(&self) -> Argument<'_> {
        Argument::Handle(Handle::Borrowed(self))
    }
}

impl<K, V, S> AsArgument for HashMap<K, V, S>
where
    K: Borrow<str> + Eq + Hash + fmt::Debug + Send + Sync,
    V: AsArgument + fmt::Debug + Send + Sync,
    S: BuildHasher + Send + Sync,
{
    fn as_argument(&self) -> Argument<'_> {
        Argument::Handle(Handle::Borrowed(self))
    }
}

impl<K, V> AsArgument for BTreeMap<K, V>
where
    K: Borrow<str> + Ord + fmt::Debug + Send + Sync,
    V: AsArgument + fmt::Debug + Send + Sync,
{
    fn as_argument(&self) -> Argument<'_> {
        Argument::Handle(Handle::Borrowed(self))
    }
}

// ── Argument store ────────────────────────────────────────────────────────────

/// Positional and named arguments of one format call.
#[derive(Debug, Clone, Default)]
pub struct ArgStore<'a> {
    positional: Vec<Argument<'a>>,
    named: Vec<(Cow<'a, str>, Argument<'a>)>,
}

impl<'a> ArgStore<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a borrowed positional argument.
    pub fn arg<T: AsArgument + ?Sized>(mut self, value: &'a T) -> Self {
        self.positional.push(value.as_argument());
        self
    }

    /// Add a borrowed named argument.
    pub fn named_arg<T: AsArgument + ?Sized>(
        mut self,
        name: impl Into<Cow<'a, str>>,
        value: &'a T,
    ) -> Self {
        self.insert(name, value.as_argument());
        self
    }

    pub fn push(&mut self, value: impl Into<Argument<'a>>) {
        self.positional.push(value.into());
    }

    /// Set a named argument, replacing any previous value under that name.
    pub fn insert(&mut self, name: impl Into<Cow<'a, str>>, value: impl Into<Argument<'a>>) {
        let name = name.into();
        let value = value.into();
        match self.named.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.named.push((name, value)),
        }
    }

    pub fn get(&self, index: usize) -> Option<&Argument<'a>> {
        self.positional.get(index)
    }

    pub fn get_named(&self, name: &str) -> Option<&Argument<'a>> {
        self.named
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, v)| v)
    }

    /// Number of positional arguments.
    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    pub fn named_len(&self) -> usize {
        self.named.len()
    }

    /// Copy every argument so the store no longer borrows caller memory.
    pub fn into_owned(self) -> Result<ArgStore<'static>> {
        let positional = self
            .positional
            .into_iter()
            .map(Argument::into_owned)
            .collect::<Result<Vec<_>>>()?;
        let named = self
            .named
            .into_iter()
            .map(|(n, v)| Ok((Cow::Owned(n.into_owned()), v.into_owned()?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(ArgStore { positional, named })
    }
}

impl<'a> FromIterator<Argument<'a>> for ArgStore<'a> {
    fn from_iter<I: IntoIterator<Item = Argument<'a>>>(iter: I) -> Self {
        ArgStore {
            positional: iter.into_iter().collect(),
            named: Vec::new(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
