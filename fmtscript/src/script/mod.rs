//! The embedded scripting language.
//!
//! A format string is split into blocks ([`split`]), script text is
//! tokenized ([`lexer`]) and compiled into an owned tree ([`compile`]), and
//! the tree is evaluated against each call's arguments ([`interp`]).
//!
//! # Quick start
//!
//! ```rust
//! use fmtscript::{format, ArgStore};
//!
//! let n = 2;
//! let args = ArgStore::new().arg(&n);
//! let text = format("{0} item[if $0 != 1: 's' end]", &args).unwrap();
//! assert_eq!(text, "2 items");
//! ```

pub mod compile;
pub mod field;
pub mod interp;
pub mod lexer;
pub mod split;

// Re-exports for convenience.
pub use compile::{CompareOp, Compiler, Field, Node};
pub use field::{ArgKey, ArgRef};
pub use interp::ExecContext;
pub use split::{split, Block, BlockKind};
