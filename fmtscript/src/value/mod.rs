//! Argument value model: type-erased arguments, the accessor protocol, and
//! the four-kind script [`Variable`].

pub mod access;
pub mod argument;
pub mod variable;

pub use access::{Access, Accessor, AttributeName, IndexingValue};
pub use argument::{ArgStore, Argument, AsArgument, Handle};
pub use variable::Variable;
