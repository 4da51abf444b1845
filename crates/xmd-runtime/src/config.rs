//! Run configuration (§6): an optional `xmd.toml`, overridden by the
//! `XMD_*` environment variables, overridden by nothing — env wins.
//!
//! Uses the workspace's existing `toml` dependency (already used
//! elsewhere for `seq.toml`-style run configuration).

use std::path::Path;

use serde::Deserialize;

use crate::error::RuntimeError;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct FileConfig {
    safe_mode: Option<bool>,
    max_while_iterations: Option<usize>,
    audit_log_path: Option<String>,
    command_timeout_ms: Option<u64>,
    command_output_limit_bytes: Option<usize>,
    eval_deadline_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// `XMD_SAFE_MODE`: toggles default-deny on unknown commands.
    pub safe_mode: bool,
    /// `XMD_MAX_WHILE`: while-loop iteration cap.
    pub max_while_iterations: usize,
    /// `XMD_AUDIT_LOG`: path to the audit log file, if any.
    pub audit_log_path: Option<String>,
    pub command_timeout_ms: u64,
    pub command_output_limit_bytes: usize,
    /// Per-document evaluation deadline (§5). `None` means unbounded —
    /// there is no spec-mandated default, unlike the while-cap.
    pub eval_deadline_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            safe_mode: true,
            max_while_iterations: 1000,
            audit_log_path: None,
            command_timeout_ms: 2000,
            command_output_limit_bytes: 1024 * 1024,
            eval_deadline_ms: None,
        }
    }
}

impl Config {
    /// Load from `xmd.toml` at `path` (if it exists), then apply `XMD_*`
    /// environment variable overrides, then built-in defaults for
    /// anything still unset. Precedence: env > file > defaults.
    pub fn load(path: Option<&Path>) -> Result<Config, RuntimeError> {
        let mut config = Config::default();

        if let Some(path) = path {
            if path.exists() {
                let text = std::fs::read_to_string(path).map_err(|e| RuntimeError::Io {
                    path: path.display().to_string(),
                    source: e.to_string(),
                })?;
                let file_config: FileConfig = toml::from_str(&text)
                    .map_err(|e| RuntimeError::Config(format!("{}: {}", path.display(), e)))?;
                config.apply_file(file_config);
            }
        }

        config.apply_env();
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(v) = file.safe_mode {
            self.safe_mode = v;
        }
        if let Some(v) = file.max_while_iterations {
            self.max_while_iterations = v;
        }
        if let Some(v) = file.audit_log_path {
            self.audit_log_path = Some(v);
        }
        if let Some(v) = file.command_timeout_ms {
            self.command_timeout_ms = v;
        }
        if let Some(v) = file.command_output_limit_bytes {
            self.command_output_limit_bytes = v;
        }
        if let Some(v) = file.eval_deadline_ms {
            self.eval_deadline_ms = Some(v);
        }
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("XMD_SAFE_MODE") {
            self.safe_mode = v.trim() != "0";
        }
        if let Ok(v) = std::env::var("XMD_MAX_WHILE") {
            if let Ok(n) = v.parse() {
                self.max_while_iterations = n;
            }
        }
        if let Ok(v) = std::env::var("XMD_AUDIT_LOG") {
            self.audit_log_path = Some(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert!(config.safe_mode);
        assert_eq!(config.max_while_iterations, 1000);
        assert_eq!(config.command_timeout_ms, 2000);
        assert_eq!(config.command_output_limit_bytes, 1024 * 1024);
    }

    #[test]
    fn file_values_are_overridden_by_env() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("xmd.toml");
        std::fs::write(&config_path, "max_while_iterations = 50\nsafe_mode = false\n").unwrap();

        std::env::set_var("XMD_MAX_WHILE", "7");
        let config = Config::load(Some(&config_path)).unwrap();
        std::env::remove_var("XMD_MAX_WHILE");

        assert_eq!(config.max_while_iterations, 7);
        assert!(!config.safe_mode);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/xmd.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn eval_deadline_ms_defaults_to_unbounded_and_is_settable_from_file() {
        assert_eq!(Config::default().eval_deadline_ms, None);

        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("xmd.toml");
        std::fs::write(&config_path, "eval_deadline_ms = 250\n").unwrap();
        let config = Config::load(Some(&config_path)).unwrap();
        assert_eq!(config.eval_deadline_ms, Some(250));
    }
}
