//! Lexer, parser, AST, tree-walking evaluator, dispatcher, and template
//! substitutor for the native XMD directive language (§4.2, §4.3, §4.5,
//! §4.6).
//!
//! `xmd-runtime` builds the legacy (`<!-- xmd:… -->`) surface, security
//! layer, codecs, and command runner on top of this crate; `xmd-cli`
//! wires everything together behind the `process`/`process_directive`
//! entry points.

pub mod ast;
pub mod dispatcher;
pub mod error;
pub mod evaluator;
pub mod host;
pub mod lexer;
pub mod parser;
pub mod template;

pub use dispatcher::{classify, Surface};
pub use error::{EvalError, ParseError};
pub use evaluator::Evaluator;
pub use host::{Host, NullHost};
pub use parser::{parse, parse_mixed, Parser};
