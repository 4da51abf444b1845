//! Security validation and sanitization layer (§4.8).

mod audit;
mod sanitizer;
mod validator;

pub use audit::{AuditEntry, AuditEventType, AuditSink, FileAuditSink};
pub use sanitizer::{sanitize_command_output, sanitize_html, sanitize_output};
pub use validator::{validate_command, validate_input, validate_path, CommandValidation, InputValidation, PathValidation};
