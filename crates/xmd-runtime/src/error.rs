//! Error taxonomy for the runtime crate (§7, with the ambient amendment
//! that every crate's errors are `thiserror`-derived).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("security refusal running '{command}': {reason:?}")]
    CommandRefused {
        command: String,
        reason: crate::security::CommandValidation,
    },

    #[error("command '{command}' timed out after {limit_ms}ms")]
    CommandTimeout { command: String, limit_ms: u64 },

    #[error("I/O error on '{path}': {source}")]
    Io { path: String, source: String },

    #[error("path '{path}' rejected by security policy: {reason:?}")]
    PathRejected {
        path: String,
        reason: crate::security::PathValidation,
    },

    #[error("malformed JSON at byte {offset}: {message}")]
    JsonParse { message: String, offset: usize },

    #[error("malformed YAML at line {line}: {message}")]
    YamlParse { message: String, line: usize },

    #[error("malformed legacy directive '{directive}': {message}")]
    LegacyDirective { directive: String, message: String },

    #[error(transparent)]
    Parse(#[from] xmd_engine::ParseError),

    #[error(transparent)]
    Eval(#[from] xmd_engine::EvalError),

    #[error("configuration error: {0}")]
    Config(String),
}
