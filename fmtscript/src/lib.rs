//! Format strings with an embedded scripting language.
//!
//! Replacement fields look like Python's (`{0}`, `{name.attr[1]:>8}`), and
//! any part of a format string can branch on the arguments it is given:
//!
//! ```
//! use fmtscript::{format, ArgStore};
//!
//! for (n, want) in [(1, "There is 1 apple"), (3, "There are 3 apples")] {
//!     let args = ArgStore::new().arg(&n);
//!     let text = format("There {${0}!=1?'are':'is'} {0} apple{${0}!=1?'s'}", &args).unwrap();
//!     assert_eq!(text, want);
//! }
//! ```
//!
//! `[...]` holds a script segment: `if`/`elif`/`else`/`end` chains,
//! comparisons, `and`/`or`/`!`, literals and `$0`/`$name` argument
//! references with `.attr` and `[index]` steps.  `{$ cond ? a : b}` is the
//! shorthand inside a field.  Compile once with [`Format::compile`] to
//! reuse a format string across calls.

pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod render;
pub mod script;
pub mod value;

pub use config::{Config, ConfigError};
pub use error::{ErrorCode, FormatError, Result};
pub use format::{format, format_with, Format};
pub use render::{FormatSpec, PlainRenderer, Render};
pub use value::{
    Access, Accessor, ArgStore, Argument, AsArgument, AttributeName, Handle, IndexingValue,
    Variable,
};
