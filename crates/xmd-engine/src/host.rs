//! The evaluator's one extension point (§4.3's `cmd`, `import`,
//! `json.*`/`yaml.*` function calls).
//!
//! `xmd-engine` has no business knowing how commands are sandboxed, how
//! paths are validated, or how JSON/YAML are encoded — those belong to
//! `xmd-runtime` (§4.7, §4.9). Rather than depend on that crate (which
//! itself needs the parser to re-evaluate legacy multi-line directives,
//! which would make the two crates depend on each other), the evaluator
//! takes a `&dyn Host` and calls back into it. This mirrors the
//! teacher's `CompilerConfig`/`ExternalBuiltin` extension points
//! (`compiler/src/config.rs`): the interpreter core stays agnostic of a
//! capability it merely dispatches to.

use xmd_core::Value;

use crate::error::EvalError;

pub trait Host {
    /// Run `cmd` under whatever security policy the host enforces and
    /// return its captured stdout (§4.9's Command Runner contract,
    /// already validated and sanitized by the implementation).
    fn run_command(&self, cmd: &str) -> Result<String, EvalError>;

    /// Read `path`, process it as XMD content against `store`, and
    /// return the rendered text (§4.3's `import`).
    fn import(&self, path: &str, store: &mut xmd_core::Store) -> Result<String, EvalError>;

    fn json_stringify(&self, value: &Value) -> String;
    fn json_parse(&self, text: &str) -> Result<Value, EvalError>;
    fn yaml_stringify(&self, value: &Value) -> String;
    fn yaml_parse(&self, text: &str) -> Result<Value, EvalError>;
}

/// A host that refuses every capability-requiring call. Useful for
/// testing pure expression/control-flow evaluation without wiring up
/// `xmd-runtime`.
pub struct NullHost;

impl Host for NullHost {
    fn run_command(&self, _cmd: &str) -> Result<String, EvalError> {
        Err(EvalError::Security {
            message: "no command runner configured".to_string(),
            location: crate::ast::SourceLocation::default(),
        })
    }

    fn import(&self, path: &str, _store: &mut xmd_core::Store) -> Result<String, EvalError> {
        Err(EvalError::ImportUnreadable {
            path: path.to_string(),
            reason: "no import host configured".to_string(),
            location: crate::ast::SourceLocation::default(),
        })
    }

    fn json_stringify(&self, _value: &Value) -> String {
        String::new()
    }

    fn json_parse(&self, _text: &str) -> Result<Value, EvalError> {
        Err(EvalError::TypeError {
            message: "no JSON codec configured".to_string(),
            location: crate::ast::SourceLocation::default(),
        })
    }

    fn yaml_stringify(&self, _value: &Value) -> String {
        String::new()
    }

    fn yaml_parse(&self, _text: &str) -> Result<Value, EvalError> {
        Err(EvalError::TypeError {
            message: "no YAML codec configured".to_string(),
            location: crate::ast::SourceLocation::default(),
        })
    }
}
