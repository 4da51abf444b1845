//! Value and Store primitives shared by every other XMD crate.
//!
//! `xmd-core` has no knowledge of directive syntax, security policy, or
//! I/O — it is the dynamically-typed value model (§3/§4.1) that the
//! lexer, parser, evaluator, and runtime layers are all built on top of.

mod error;
mod store;
mod value;

pub use error::ValueError;
pub use store::{Snapshot, Store};
pub use value::{ObjectData, Value};
