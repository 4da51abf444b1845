//! Security layer, data codecs, legacy directive processor, command
//! runner, and run configuration for XMD (§4.4, §4.7, §4.8, §4.9, §6).
//!
//! This crate hosts the `process`/`process_directive` entry points:
//! `xmd_engine` classifies an input as native or legacy/plain (§4.5), and
//! this crate routes it to the matching processor, both sharing the same
//! [`xmd_core::Store`] and the same [`RuntimeHost`] for `cmd`/`import`/
//! codec calls.

pub mod codecs;
pub mod command;
pub mod config;
pub mod error;
pub mod host;
pub mod legacy;
pub mod security;

pub use config::Config;
pub use error::RuntimeError;
pub use host::RuntimeHost;

use tracing::{debug, warn};

use xmd_core::Store;
use xmd_engine::host::Host;
use xmd_engine::{classify, Evaluator, Surface};

/// Process `source` against `store`, dispatching through the native
/// parser/evaluator or the legacy comment-directive processor depending
/// on [`xmd_engine::classify`] (§4.5).
pub fn process(source: &str, store: &mut Store, host: &dyn Host, config: &Config) -> Result<String, RuntimeError> {
    let surface = classify(source);
    debug!(bytes = source.len(), ?surface, "processing input");
    let result = match surface {
        Surface::Native => {
            let program = xmd_engine::parse_mixed(source)?;
            let taken = std::mem::replace(store, Store::new());
            let mut evaluator = Evaluator::new(taken, host).with_while_cap(config.max_while_iterations);
            if let Some(ms) = config.eval_deadline_ms {
                evaluator = evaluator.with_deadline(std::time::Duration::from_millis(ms));
            }
            evaluator.run(&program)?;
            let output = evaluator.output.clone();
            *store = evaluator.store;
            Ok(output)
        }
        Surface::LegacyOrPlain => legacy::process(source, store, host),
    };
    if let Err(e) = &result {
        warn!(error = %e, "processing failed");
    }
    result
}

/// Process a single directive body (without surrounding `<!-- xmd: -->`
/// delimiters or host markdown) against `store` — the entry point §6
/// documents for evaluating one directive in isolation (e.g. from a
/// REPL or a single-shot CLI invocation of `process_directive`).
pub fn process_directive(
    directive: &str,
    store: &mut Store,
    host: &dyn Host,
    config: &Config,
) -> Result<String, RuntimeError> {
    process(directive, store, host, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::SystemCommandRunner;
    use crate::security::FileAuditSink;
    use std::time::Duration;
    use xmd_core::Value;

    #[test]
    fn native_surface_runs_through_the_evaluator() {
        let audit = FileAuditSink::in_memory();
        let runner = SystemCommandRunner::new(Duration::from_secs(1), 4096, &audit, "test");
        let config = Config::default();
        let host = RuntimeHost::new(&runner, &audit, &config, ".");
        let mut store = Store::new();
        let out = process("set x = 1 + 2\nprint(x)", &mut store, &host, &config).unwrap();
        assert_eq!(out.trim(), "3");
    }

    #[test]
    fn legacy_surface_runs_through_the_legacy_processor() {
        let audit = FileAuditSink::in_memory();
        let runner = SystemCommandRunner::new(Duration::from_secs(1), 4096, &audit, "test");
        let config = Config::default();
        let host = RuntimeHost::new(&runner, &audit, &config, ".");
        let mut store = Store::new();
        let out = process(
            r#"<!-- xmd:set name = "world" -->hi <!-- xmd:print(name) -->"#,
            &mut store,
            &host,
            &config,
        )
        .unwrap();
        assert_eq!(out, "hi world");
    }

    #[test]
    fn plain_text_with_no_directives_passes_through() {
        let audit = FileAuditSink::in_memory();
        let runner = SystemCommandRunner::new(Duration::from_secs(1), 4096, &audit, "test");
        let config = Config::default();
        let host = RuntimeHost::new(&runner, &audit, &config, ".");
        let mut store = Store::new();
        let out = process("just plain markdown\n", &mut store, &host, &config).unwrap();
        assert_eq!(out, "just plain markdown\n");
    }

    #[test]
    fn process_directive_evaluates_a_single_expression() {
        let audit = FileAuditSink::in_memory();
        let runner = SystemCommandRunner::new(Duration::from_secs(1), 4096, &audit, "test");
        let config = Config::default();
        let host = RuntimeHost::new(&runner, &audit, &config, ".");
        let mut store = Store::new();
        store.set("count", Value::Number(41.0));
        let out = process_directive("print(count + 1)", &mut store, &host, &config).unwrap();
        assert_eq!(out.trim(), "42");
    }

    #[test]
    fn eval_deadline_from_config_unwinds_a_long_running_native_document() {
        let audit = FileAuditSink::in_memory();
        let runner = SystemCommandRunner::new(Duration::from_secs(1), 4096, &audit, "test");
        let mut config = Config::default();
        config.eval_deadline_ms = Some(1);
        config.max_while_iterations = 10_000_000;
        let host = RuntimeHost::new(&runner, &audit, &config, ".");
        let mut store = Store::new();
        let err = process(
            "set i = 0\nwhile i < 10000000\n  set i = i + 1\nend",
            &mut store,
            &host,
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, RuntimeError::Eval(xmd_engine::EvalError::DeadlineExceeded)));
    }

    #[test]
    fn destructive_exec_is_refused_inline_and_audited_once() {
        // S4: the command is never invoked, a security-refusal marker
        // appears in the output, and exactly one audit record is
        // produced with result "Destructive".
        let audit = FileAuditSink::in_memory();
        let runner = SystemCommandRunner::new(Duration::from_secs(1), 4096, &audit, "test");
        let config = Config::default();
        let host = RuntimeHost::new(&runner, &audit, &config, ".");
        let mut store = Store::new();
        let out = process("<!-- xmd:exec rm -rf / -->", &mut store, &host, &config).unwrap();
        assert!(out.contains("[Error:"));
        let entries = audit.entries_between(0, u64::MAX);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].result, "Destructive");
    }
}
