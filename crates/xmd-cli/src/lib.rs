//! CLI argument parsing and the `run` entry point wired to
//! `xmd_runtime::process` (§6). Kept separate from `main.rs` so
//! integration tests can exercise `run` without a subprocess, matching
//! the teacher's `seqc`/`compiler` split between `lib.rs` and
//! `main.rs`.

use std::path::PathBuf;

use clap::Parser;

use xmd_core::{Store, Value};
use xmd_engine::EvalError;
use xmd_runtime::{Config, RuntimeError, RuntimeHost};

#[derive(Parser, Debug)]
#[command(name = "xmd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Render a Markdown/text file through the XMD directive evaluator", long_about = None)]
pub struct Cli {
    /// Input file to process
    pub input: PathBuf,

    /// Write rendered output here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Bind a store variable before processing, as `KEY=VALUE`
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// Path to an `xmd.toml` run configuration (defaults to `./xmd.toml` if present)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Exit codes (§6): 0 success, 1 parse error, 2 evaluation error, 3
/// security refusal, 4 I/O error.
pub fn exit_code_for(error: &RuntimeError) -> i32 {
    match error {
        RuntimeError::Parse(_) => 1,
        RuntimeError::LegacyDirective { .. } => 1,
        // A security refusal surfaced through the evaluator (e.g. an
        // `import` path rejected by the path-traversal check) is a
        // refusal, not an evaluation failure, so it takes the same exit
        // code as a directly-refused command.
        RuntimeError::Eval(EvalError::Security { .. }) => 3,
        RuntimeError::Eval(_) | RuntimeError::JsonParse { .. } | RuntimeError::YamlParse { .. } => 2,
        RuntimeError::CommandRefused { .. } | RuntimeError::PathRejected { .. } => 3,
        RuntimeError::CommandTimeout { .. } | RuntimeError::Io { .. } | RuntimeError::Config(_) => 4,
    }
}

/// Parse a single `--var KEY=VALUE` pair into a store binding. Values
/// are parsed the same way the legacy `set` directive parses its
/// right-hand side (§4.4): quoted string, number, bool, null, or a bare
/// string.
fn parse_var(pair: &str) -> Result<(String, Value), String> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| format!("--var expects KEY=VALUE, got '{}'", pair))?;
    Ok((key.to_string(), literal_value(value)))
}

fn literal_value(text: &str) -> Value {
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        return Value::String(text[1..text.len() - 1].to_string());
    }
    match text {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    if let Ok(n) = text.parse::<f64>() {
        return Value::Number(n);
    }
    Value::String(text.to_string())
}

/// Run the CLI's core logic: read the input, build a `Store` seeded by
/// `--var`, process it, and write the result. Returns the process exit
/// code, printing any error to stderr along the way.
pub fn run(cli: &Cli) -> i32 {
    let input_text = match std::fs::read_to_string(&cli.input) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(path = %cli.input.display(), error = %e, "failed to read input");
            eprintln!("Error reading {}: {}", cli.input.display(), e);
            return 4;
        }
    };

    let config_path = cli
        .config
        .clone()
        .or_else(|| Some(PathBuf::from("xmd.toml")).filter(|p| p.exists()));
    let config = match Config::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return exit_code_for(&e);
        }
    };

    let mut store = Store::new();
    for pair in &cli.vars {
        match parse_var(pair) {
            Ok((key, value)) => store.set(key, value),
            Err(message) => {
                eprintln!("Error: {}", message);
                return 1;
            }
        }
    }

    let import_base = cli
        .input
        .parent()
        .map(|p| if p.as_os_str().is_empty() { PathBuf::from(".") } else { p.to_path_buf() })
        .unwrap_or_else(|| PathBuf::from("."));

    let audit = xmd_runtime::security::FileAuditSink::new(config.audit_log_path.as_ref());
    let runner = xmd_runtime::command::SystemCommandRunner::new(
        std::time::Duration::from_millis(config.command_timeout_ms),
        config.command_output_limit_bytes,
        &audit,
        "cli",
    )
    .with_safe_mode(config.safe_mode);
    let host = RuntimeHost::new(&runner, &audit, &config, import_base);

    let rendered = match xmd_runtime::process(&input_text, &mut store, &host, &config) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "processing failed");
            eprintln!("Error: {}", e);
            return exit_code_for(&e);
        }
    };

    match &cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, &rendered) {
                eprintln!("Error writing {}: {}", path.display(), e);
                return 4;
            }
        }
        None => print!("{}", rendered),
    }

    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_and_bare_vars() {
        let (k, v) = parse_var(r#"name="Ada""#).unwrap();
        assert_eq!(k, "name");
        assert_eq!(v, Value::String("Ada".to_string()));

        let (k, v) = parse_var("count=3").unwrap();
        assert_eq!(k, "count");
        assert_eq!(v, Value::Number(3.0));
    }

    #[test]
    fn rejects_var_without_equals() {
        assert!(parse_var("justaname").is_err());
    }

    #[test]
    fn run_renders_file_to_stdout_and_returns_zero() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.md");
        std::fs::write(&input, "<!-- xmd:set name=\"World\" -->Hello {{name}}!").unwrap();
        let cli = Cli {
            input,
            output: None,
            vars: Vec::new(),
            config: None,
        };
        assert_eq!(run(&cli), 0);
    }

    #[test]
    fn run_reports_io_error_for_missing_input() {
        let cli = Cli {
            input: PathBuf::from("/nonexistent/path/doc.md"),
            output: None,
            vars: Vec::new(),
            config: None,
        };
        assert_eq!(run(&cli), 4);
    }

    #[test]
    fn run_writes_rendered_output_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.md");
        let output = dir.path().join("out.md");
        std::fs::write(&input, "plain text, no directives").unwrap();
        let cli = Cli {
            input,
            output: Some(output.clone()),
            vars: Vec::new(),
            config: None,
        };
        assert_eq!(run(&cli), 0);
        assert_eq!(std::fs::read_to_string(output).unwrap(), "plain text, no directives");
    }

    #[test]
    fn run_reports_security_refusal_as_exit_code_three_for_traversing_import() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("docs");
        std::fs::create_dir(&sub).unwrap();
        let input = sub.join("doc.md");
        std::fs::write(&input, "import(\"../../etc/passwd\")").unwrap();
        let cli = Cli {
            input,
            output: None,
            vars: Vec::new(),
            config: None,
        };
        assert_eq!(run(&cli), 3);
    }

    #[test]
    fn run_seeds_the_store_from_var_flags() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.md");
        let output = dir.path().join("out.md");
        std::fs::write(&input, "print(greeting)").unwrap();
        let cli = Cli {
            input,
            output: Some(output.clone()),
            vars: vec!["greeting=\"hi\"".to_string()],
            config: None,
        };
        assert_eq!(run(&cli), 0);
        assert_eq!(std::fs::read_to_string(output).unwrap().trim(), "hi");
    }
}
