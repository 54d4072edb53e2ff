//! Accessor protocol: indexed and attribute access on arbitrary argument types.
//!
//! A type becomes reachable from `{0[1]}`, `{0.size}` or `$0['key']` by
//! implementing [`Accessor`].  Both capabilities are optional; the default
//! methods reject the access form.  The trait object is bound once, when the
//! [`Argument`] is built, so every later access is a plain virtual call.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::ops::Range;
use std::sync::Arc;

use super::argument::{Argument, AsArgument, Handle};
use super::variable::Variable;
use crate::error::{ErrorCode, FormatError, Result};

// ── Keys ──────────────────────────────────────────────────────────────────────

/// Key of a `[...]` access.
///
/// Negative positions count from the end, as in `[-1]` or `[-3:-1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexingValue {
    Index(i64),
    /// `[begin:end]`; a missing end means "to the end".
    Slice { begin: i64, end: Option<i64> },
    Key(String),
}

impl IndexingValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            IndexingValue::Index(_) => "integer index",
            IndexingValue::Slice { .. } => "slice",
            IndexingValue::Key(_) => "string key",
        }
    }
}

impl fmt::Display for IndexingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexingValue::Index(i) => write!(f, "[{i}]"),
            IndexingValue::Slice { begin, end: Some(end) } => write!(f, "[{begin}:{end}]"),
            IndexingValue::Slice { begin, end: None } => write!(f, "[{begin}:]"),
            IndexingValue::Key(k) => write!(f, "['{k}']"),
        }
    }
}

/// Name of a `.name` access.
///
/// Only ASCII letters, digits and `_` are accepted, and the first character
/// may not be a digit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeName(String);

impl AttributeName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if is_identifier(&name) {
            Ok(AttributeName(name))
        } else {
            Err(FormatError::new(
                ErrorCode::InvalidAttribute,
                format!("'{name}' is not a valid attribute name"),
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttributeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub(crate) fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub(crate) fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if is_ident_start(c)) && chars.all(is_ident_continue)
}

/// One step of an access chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Index(IndexingValue),
    Attribute(AttributeName),
}

// ── Position arithmetic ───────────────────────────────────────────────────────

/// Map a possibly negative position onto `0..len`; `None` when out of range.
pub fn resolve_position(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let pos = if index < 0 { len + index } else { index };
    (0..len).contains(&pos).then_some(pos as usize)
}

/// Map `[begin:end]` onto `0..len`, clamping instead of failing.
pub fn resolve_range(begin: i64, end: Option<i64>, len: usize) -> Range<usize> {
    let clamp = |x: i64| -> usize {
        if x < 0 {
            (len as i64 + x).max(0) as usize
        } else {
            (x as usize).min(len)
        }
    };
    let start = clamp(begin);
    let stop = end.map_or(len, clamp);
    start..stop.max(start)
}

// ── Protocol ──────────────────────────────────────────────────────────────────

/// Capability interface for argument types the engine has no static
/// knowledge of.
///
/// Index-style misses (position out of range, absent map key) should return
/// [`Argument::None`]; an unknown attribute name must be an error.
///
/// ```
/// use fmtscript::{Accessor, Argument, AttributeName, ArgStore, ErrorCode, FormatError, format};
///
/// #[derive(Debug)]
/// struct Person { name: String, age: u32 }
///
/// impl Accessor for Person {
///     fn type_name(&self) -> &'static str { "person" }
///
///     fn get_by_attribute(&self, attr: &AttributeName) -> fmtscript::Result<Argument<'_>> {
///         match attr.as_str() {
///             "name" => Ok(Argument::from(self.name.as_str())),
///             "age" => Ok(Argument::from(self.age)),
///             _ => Err(FormatError::new(ErrorCode::InvalidAttribute, attr.as_str())),
///         }
///     }
/// }
///
/// let ann = Person { name: "Ann".into(), age: 31 };
/// let mut args = ArgStore::new();
/// args.push(Argument::handle(&ann));
/// assert_eq!(format("{0.name} is {0.age}", &args).unwrap(), "Ann is 31");
/// ```
pub trait Accessor: fmt::Debug + Send + Sync {
    /// Name used in error messages.
    fn type_name(&self) -> &'static str {
        "value"
    }

    /// `value[index]`.
    fn get_by_index(&self, index: &IndexingValue) -> Result<Argument<'_>> {
        Err(unsupported_index(self.type_name(), index))
    }

    /// `value.attr`.
    fn get_by_attribute(&self, attr: &AttributeName) -> Result<Argument<'_>> {
        Err(unknown_attribute(attr, self.type_name()))
    }

    /// Projection into script space, if the type has a natural one.
    fn to_variable(&self) -> Option<Variable> {
        None
    }

    /// Independent copy for [`Argument::into_owned`].
    fn to_shared(&self) -> Result<Arc<dyn Accessor>> {
        Err(FormatError::new(
            ErrorCode::InvalidConversion,
            format!("{} cannot be copied into an owned argument", self.type_name()),
        ))
    }

    /// Text used when the value is rendered without a custom renderer.
    fn display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub(crate) fn unsupported_index(type_name: &str, index: &IndexingValue) -> FormatError {
    FormatError::new(
        ErrorCode::InvalidIndex,
        format!("{type_name} cannot be indexed by {}", index.kind_name()),
    )
}

pub(crate) fn unknown_attribute(attr: &AttributeName, type_name: &str) -> FormatError {
    FormatError::new(
        ErrorCode::InvalidAttribute,
        format!("{type_name} has no attribute '{attr}'"),
    )
}

// ── Sequences ─────────────────────────────────────────────────────────────────

fn index_sequence<'s, T: AsArgument>(
    items: &'s [T],
    index: &IndexingValue,
) -> Result<Argument<'s>> {
    match index {
        IndexingValue::Index(i) => Ok(resolve_position(*i, items.len())
            .map_or(Argument::None, |pos| items[pos].as_argument())),
        IndexingValue::Slice { begin, end } => {
            let range = resolve_range(*begin, *end, items.len());
            let picked: Vec<Argument<'s>> =
                items[range].iter().map(AsArgument::as_argument).collect();
            Ok(Argument::shared(picked))
        }
        IndexingValue::Key(_) => Err(unsupported_index("sequence", index)),
    }
}

fn length_attribute<'s>(len: usize, attr: &AttributeName, type_name: &str) -> Result<Argument<'s>> {
    match attr.as_str() {
        "size" | "length" => Ok(Argument::Uint(len as u64)),
        _ => Err(unknown_attribute(attr, type_name)),
    }
}

fn snapshot_sequence<T: AsArgument>(items: &[T]) -> Result<Arc<dyn Accessor>> {
    let owned = items
        .iter()
        .map(|item| item.as_argument().into_owned())
        .collect::<Result<Vec<Argument<'static>>>>()?;
    Ok(Arc::new(owned))
}

fn write_items<'s>(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    close: &str,
    items: impl Iterator<Item = Argument<'s>>,
) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(close)
}

impl<T> Accessor for Vec<T>
where
    T: AsArgument + fmt::Debug + Send + Sync,
{
    fn type_name(&self) -> &'static str {
        "sequence"
    }

    fn get_by_index(&self, index: &IndexingValue) -> Result<Argument<'_>> {
        index_sequence(self, index)
    }

    fn get_by_attribute(&self, attr: &AttributeName) -> Result<Argument<'_>> {
        length_attribute(self.len(), attr, "sequence")
    }

    fn to_shared(&self) -> Result<Arc<dyn Accessor>> {
        snapshot_sequence(self)
    }

    fn display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_items(f, "[", "]", self.iter().map(AsArgument::as_argument))
    }
}

impl<T, const N: usize> Accessor for [T; N]
where
    T: AsArgument + fmt::Debug + Send + Sync,
{
    fn type_name(&self) -> &'static str {
        "sequence"
    }

    fn get_by_index(&self, index: &IndexingValue) -> Result<Argument<'_>> {
        index_sequence(self, index)
    }

    fn get_by_attribute(&self, attr: &AttributeName) -> Result<Argument<'_>> {
        length_attribute(N, attr, "sequence")
    }

    fn to_shared(&self) -> Result<Arc<dyn Accessor>> {
        snapshot_sequence(self)
    }

    fn display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_items(f, "[", "]", self.iter().map(AsArgument::as_argument))
    }
}

// ── Maps ──────────────────────────────────────────────────────────────────────

fn write_entries<'s>(
    f: &mut fmt::Formatter<'_>,
    mut entries: Vec<(&'s str, Argument<'s>)>,
) -> fmt::Result {
    entries.sort_by(|a, b| a.0.cmp(b.0));
    f.write_str("{")?;
    for (i, (key, value)) in entries.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{key}: {value}")?;
    }
    f.write_str("}")
}

fn snapshot_entries<'s, V: AsArgument + 's>(
    entries: impl Iterator<Item = (&'s str, &'s V)>,
) -> Result<Arc<dyn Accessor>> {
    let mut owned = BTreeMap::new();
    for (key, value) in entries {
        owned.insert(key.to_owned(), value.as_argument().into_owned()?);
    }
    Ok(Arc::new(owned))
}

impl<K, V, S> Accessor for HashMap<K, V, S>
where
    K: Borrow<str> + Eq + Hash + fmt::Debug + Send + Sync,
    V: AsArgument + fmt::Debug + Send + Sync,
    S: BuildHasher + Send + Sync,
{
    fn type_name(&self) -> &'static str {
        "map"
    }

    fn get_by_index(&self, index: &IndexingValue) -> Result<Argument<'_>> {
        match index {
            IndexingValue::Key(key) => Ok(self
                .get(key.as_str())
                .map_or(Argument::None, AsArgument::as_argument)),
            _ => Err(unsupported_index("map", index)),
        }
    }

    fn get_by_attribute(&self, attr: &AttributeName) -> Result<Argument<'_>> {
        length_attribute(self.len(), attr, "map")
    }

    fn to_shared(&self) -> Result<Arc<dyn Accessor>> {
        snapshot_entries(self.iter().map(|(k, v)| (Borrow::<str>::borrow(k), v)))
    }

    fn display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_entries(f, self.iter().map(|(k, v)| (Borrow::<str>::borrow(k), v.as_argument())).collect())
    }
}

impl<K, V> Accessor for BTreeMap<K, V>
where
    K: Borrow<str> + Ord + fmt::Debug + Send + Sync,
    V: AsArgument + fmt::Debug + Send + Sync,
{
    fn type_name(&self) -> &'static str {
        "map"
    }

    fn get_by_index(&self, index: &IndexingValue) -> Result<Argument<'_>> {
        match index {
            IndexingValue::Key(key) => Ok(self
                .get(key.as_str())
                .map_or(Argument::None, AsArgument::as_argument)),
            _ => Err(unsupported_index("map", index)),
        }
    }

    fn get_by_attribute(&self, attr: &AttributeName) -> Result<Argument<'_>> {
        length_attribute(self.len(), attr, "map")
    }

    fn to_shared(&self) -> Result<Arc<dyn Accessor>> {
        snapshot_entries(self.iter().map(|(k, v)| (Borrow::<str>::borrow(k), v)))
    }

    fn display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_entries(f, self.iter().map(|(k, v)| (Borrow::<str>::borrow(k), v.as_argument())).collect())
    }
}

// ── Tuples ────────────────────────────────────────────────────────────────────

macro_rules! tuple_accessor {
    ($len:literal; $($idx:tt $name:ident $attr:literal),+) => {
        impl<$($name),+> Accessor for ($($name,)+)
        where
            $($name: AsArgument + fmt::Debug + Send + Sync,)+
        {
            fn type_name(&self) -> &'static str {
                "tuple"
            }

            fn get_by_index(&self, index: &IndexingValue) -> Result<Argument<'_>> {
                match index {
                    IndexingValue::Index(i) => Ok(match resolve_position(*i, $len) {
                        $(Some($idx) => self.$idx.as_argument(),)+
                        _ => Argument::None,
                    }),
                    _ => Err(unsupported_index("tuple", index)),
                }
            }

            fn get_by_attribute(&self, attr: &AttributeName) -> Result<Argument<'_>> {
                match attr.as_str() {
                    $($attr => Ok(self.$idx.as_argument()),)+
                    _ => length_attribute($len, attr, "tuple"),
                }
            }

            fn to_shared(&self) -> Result<Arc<dyn Accessor>> {
                Ok(Arc::new(($(self.$idx.as_argument().into_owned()?,)+)))
            }

            fn display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let items = [$(self.$idx.as_argument()),+];
                write_items(f, "(", ")", items.into_iter())
            }
        }

        impl<$($name),+> AsArgument for ($($name,)+)
        where
            $($name: AsArgument + fmt::Debug + Send + Sync,)+
        {
            fn as_argument(&self) -> Argument<'_> {
                Argument::Handle(Handle::Borrowed(self))
            }
        }
    };
}

tuple_accessor!(2; 0 A "first", 1 B "second");
tuple_accessor!(3; 0 A "first", 1 B "second", 2 C "third");

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(name: &str) -> AttributeName {
        AttributeName::new(name).unwrap()
    }

    #[test]
    fn attribute_name_validation() {
        assert!(AttributeName::new("size").is_ok());
        assert!(AttributeName::new("_private2").is_ok());
        assert_eq!(
            AttributeName::new("2nd").unwrap_err().code,
            ErrorCode::InvalidAttribute
        );
        assert!(AttributeName::new("").is_err());
        assert!(AttributeName::new("a-b").is_err());
    }

    #[test]
    fn positions() {
        assert_eq!(resolve_position(0, 3), Some(0));
        assert_eq!(resolve_position(-1, 3), Some(2));
        assert_eq!(resolve_position(3, 3), None);
        assert_eq!(resolve_position(-4, 3), None);
        assert_eq!(resolve_position(0, 0), None);
    }

    #[test]
    fn ranges_clamp() {
        assert_eq!(resolve_range(1, Some(3), 5), 1..3);
        assert_eq!(resolve_range(-2, None, 5), 3..5);
        assert_eq!(resolve_range(2, Some(100), 5), 2..5);
        assert_eq!(resolve_range(-100, Some(2), 5), 0..2);
        assert_eq!(resolve_range(4, Some(1), 5), 4..4);
    }

    #[test]
    fn vec_index_and_slice() {
        let v = vec![10, 20, 30, 40];
        let last = v.get_by_index(&IndexingValue::Index(-1)).unwrap();
        assert_eq!(last.as_variable().unwrap(), Variable::Int(40));
        assert!(v.get_by_index(&IndexingValue::Index(9)).unwrap().is_none());

        let mid = v
            .get_by_index(&IndexingValue::Slice { begin: 1, end: Some(3) })
            .unwrap();
        assert_eq!(mid.to_string(), "[20, 30]");
    }

    #[test]
    fn vec_rejects_key() {
        let v = vec![1];
        let err = v
            .get_by_index(&IndexingValue::Key("a".into()))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidIndex);
    }

    #[test]
    fn vec_size_attribute() {
        let v = vec!["a", "b"];
        let size = v.get_by_attribute(&attr("size")).unwrap();
        assert_eq!(size.as_variable().unwrap(), Variable::Int(2));
        let err = v.get_by_attribute(&attr("bogus")).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidAttribute);
    }

    #[test]
    fn map_lookup() {
        let mut m = HashMap::new();
        m.insert("apple".to_string(), 3);
        let hit = m.get_by_index(&IndexingValue::Key("apple".into())).unwrap();
        assert_eq!(hit.as_variable().unwrap(), Variable::Int(3));
        let miss = m.get_by_index(&IndexingValue::Key("pear".into())).unwrap();
        assert!(miss.is_none());
        let err = m.get_by_index(&IndexingValue::Index(0)).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidIndex);
    }

    #[test]
    fn map_display_is_sorted() {
        let mut m = HashMap::new();
        m.insert("b", 2);
        m.insert("a", 1);
        assert_eq!(Argument::from_ref(&m).to_string(), "{a: 1, b: 2}");
    }

    #[test]
    fn tuple_access() {
        let t = ("x", 5);
        assert_eq!(t.get_by_attribute(&attr("first")).unwrap().to_string(), "x");
        assert_eq!(t.get_by_index(&IndexingValue::Index(-1)).unwrap().to_string(), "5");
        assert_eq!(t.get_by_attribute(&attr("size")).unwrap().to_string(), "2");
        assert!(t.get_by_attribute(&attr("third")).is_err());
        assert_eq!(Argument::from_ref(&t).to_string(), "(x, 5)");
    }

    #[test]
    fn snapshots_are_independent() {
        let owned = {
            let words = vec![String::from("one"), String::from("two")];
            Argument::from_ref(&words).into_owned().unwrap()
        };
        assert!(owned.is_owned());
        assert_eq!(owned.to_string(), "[one, two]");
    }
}
