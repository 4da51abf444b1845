//! The concrete [`Host`] implementation wiring xmd-engine's evaluator to
//! the command runner, security layer, codecs, and legacy processor.
//!
//! Shaped after `compiler/src/config.rs`'s `CompilerConfig`: a small
//! struct bundling the capabilities an inner crate calls back into,
//! constructed once by the caller and borrowed for the duration of a
//! run.

use std::path::{Path, PathBuf};

use xmd_core::{Store, Value};
use xmd_engine::ast::SourceLocation;
use xmd_engine::{EvalError, Host};

use crate::codecs::{json, yaml};
use crate::command::CommandRunner;
use crate::config::Config;
use crate::security::{sanitize_command_output, validate_path, AuditEventType, AuditSink, PathValidation};

/// Binds a [`CommandRunner`] and an [`AuditSink`] to a base directory
/// that `import` paths are validated against, and dispatches `import` by
/// re-entering [`crate::process`] (legacy-or-native, per
/// [`xmd_engine::classify`]) on the imported file's contents.
pub struct RuntimeHost<'a> {
    runner: &'a dyn CommandRunner,
    audit: &'a dyn AuditSink,
    config: &'a Config,
    import_base: PathBuf,
}

impl<'a> RuntimeHost<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        audit: &'a dyn AuditSink,
        config: &'a Config,
        import_base: impl Into<PathBuf>,
    ) -> Self {
        RuntimeHost {
            runner,
            audit,
            config,
            import_base: import_base.into(),
        }
    }
}

impl<'a> Host for RuntimeHost<'a> {
    fn run_command(&self, cmd: &str) -> Result<String, EvalError> {
        let output = self.runner.run(cmd).map_err(|e| EvalError::Security {
            message: e.to_string(),
            location: SourceLocation::default(),
        })?;

        if output.exit_code != Some(0) {
            let combined = if output.stderr.is_empty() {
                output.stdout.clone()
            } else {
                format!("{}{}", output.stdout, output.stderr)
            };
            return Ok(sanitize_command_output(&combined));
        }
        Ok(sanitize_command_output(&output.stdout))
    }

    fn import(&self, path: &str, store: &mut Store) -> Result<String, EvalError> {
        let base = self.import_base.to_string_lossy().into_owned();
        let resolved = if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.import_base.join(path)
        };
        let resolved_str = resolved.to_string_lossy().into_owned();

        let validation = validate_path(&resolved_str, &base);
        let _ = self.audit.append(AuditEventType::FileAccess, path, "host:import", &format!("{:?}", validation));

        if validation != PathValidation::Ok {
            return Err(EvalError::Security {
                message: format!("import of '{}' refused: {:?}", path, validation),
                location: SourceLocation::default(),
            });
        }

        let contents = std::fs::read_to_string(&resolved).map_err(|e| EvalError::ImportUnreadable {
            path: path.to_string(),
            reason: e.to_string(),
            location: SourceLocation::default(),
        })?;

        crate::process(&contents, store, self, self.config).map_err(|e| EvalError::ImportUnreadable {
            path: path.to_string(),
            reason: e.to_string(),
            location: SourceLocation::default(),
        })
    }

    fn json_stringify(&self, value: &Value) -> String {
        json::stringify(value)
    }

    fn json_parse(&self, text: &str) -> Result<Value, EvalError> {
        json::parse(text).map_err(|e| EvalError::TypeError {
            message: e.to_string(),
            location: SourceLocation::default(),
        })
    }

    fn yaml_stringify(&self, value: &Value) -> String {
        yaml::stringify(value)
    }

    fn yaml_parse(&self, text: &str) -> Result<Value, EvalError> {
        yaml::parse(text).map_err(|e| EvalError::TypeError {
            message: e.to_string(),
            location: SourceLocation::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;
    use crate::error::RuntimeError;
    use crate::security::FileAuditSink;
    use std::sync::Mutex;

    struct StubRunner(Mutex<Option<String>>);

    impl CommandRunner for StubRunner {
        fn run(&self, cmd: &str) -> Result<CommandOutput, RuntimeError> {
            *self.0.lock().unwrap() = Some(cmd.to_string());
            Ok(CommandOutput {
                exit_code: Some(0),
                stdout: "stub output".to_string(),
                stderr: String::new(),
                truncated: false,
            })
        }
    }

    #[test]
    fn run_command_delegates_to_the_configured_runner() {
        let runner = StubRunner(Mutex::new(None));
        let audit = FileAuditSink::in_memory();
        let config = Config::default();
        let host = RuntimeHost::new(&runner, &audit, &config, "/tmp");
        let out = host.run_command("echo hi").unwrap();
        assert_eq!(out, "stub output");
        assert_eq!(runner.0.lock().unwrap().as_deref(), Some("echo hi"));
    }

    #[test]
    fn import_rejects_paths_outside_base() {
        let runner = StubRunner(Mutex::new(None));
        let audit = FileAuditSink::in_memory();
        let config = Config::default();
        let host = RuntimeHost::new(&runner, &audit, &config, "/srv/docs");
        let mut store = Store::new();
        let err = host.import("../../etc/passwd", &mut store).unwrap_err();
        assert!(matches!(err, EvalError::Security { .. }));
    }

    #[test]
    fn json_round_trips_through_the_host() {
        let runner = StubRunner(Mutex::new(None));
        let audit = FileAuditSink::in_memory();
        let config = Config::default();
        let host = RuntimeHost::new(&runner, &audit, &config, "/tmp");
        let value = Value::object(vec![("a".to_string(), Value::Number(1.0))]);
        let text = host.json_stringify(&value);
        let parsed = host.json_parse(&text).unwrap();
        assert_eq!(parsed, value);
    }
}
