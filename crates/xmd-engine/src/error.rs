//! Error taxonomy for the lexer/parser/evaluator (§7: ParseError, EvalError).

use thiserror::Error;

use crate::ast::SourceLocation;

/// Lexer/parser failures, including unbalanced directives (§7).
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{location}: {message}")]
pub struct ParseError {
    pub message: String,
    pub location: SourceLocation,
}

impl ParseError {
    pub fn new(message: impl Into<String>, location: SourceLocation) -> Self {
        ParseError {
            message: message.into(),
            location,
        }
    }
}

/// Evaluator failures: type coercion impossible in a strict context,
/// while-cap exceeded, import target unreadable (§7).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("{location}: {message}")]
    TypeError {
        message: String,
        location: SourceLocation,
    },

    #[error("{location}: while loop exceeded {limit} iterations")]
    WhileCapExceeded {
        limit: usize,
        location: SourceLocation,
    },

    #[error("{location}: range {start}..{end} exceeds the {limit}-item cap")]
    RangeTooLarge {
        start: i64,
        end: i64,
        limit: usize,
        location: SourceLocation,
    },

    #[error("{location}: cannot import '{path}': {reason}")]
    ImportUnreadable {
        path: String,
        reason: String,
        location: SourceLocation,
    },

    #[error("{location}: unknown function '{name}'")]
    UnknownFunction {
        name: String,
        location: SourceLocation,
    },

    #[error("{location}: {message}")]
    Security {
        message: String,
        location: SourceLocation,
    },

    #[error("deadline exceeded during evaluation")]
    DeadlineExceeded,
}

impl EvalError {
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            EvalError::TypeError { location, .. }
            | EvalError::WhileCapExceeded { location, .. }
            | EvalError::RangeTooLarge { location, .. }
            | EvalError::ImportUnreadable { location, .. }
            | EvalError::UnknownFunction { location, .. }
            | EvalError::Security { location, .. } => Some(location),
            EvalError::DeadlineExceeded => None,
        }
    }
}
