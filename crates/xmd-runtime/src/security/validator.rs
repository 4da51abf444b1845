//! Input / command / path validators (§4.8).
//!
//! The enumerated blacklists are pinned from the original implementation's
//! `security_validate_input.c` / `security_validate_command.c`
//! (`examples/original_source/src/security/validator/`); see SPEC_FULL.md
//! §4.8 for the closed list this module carries.

use std::path::{Component, Path, PathBuf};

/// Result of [`validate_input`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputValidation {
    Ok,
    InvalidInput,
    InjectionDetected,
    ResourceLimit,
}

/// Result of [`validate_command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandValidation {
    Ok,
    Destructive,
    Privilege,
    Network,
    Injection,
    PermissionDenied,
}

/// Result of [`validate_path`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathValidation {
    Ok,
    Traversal,
    InvalidInput,
}

const SQL_PATTERNS: &[&str] = &[
    "'; drop",
    "'; delete",
    "'; insert",
    "'; update",
    "' or '1'='1",
    "' or 1=1",
    "' union ",
    "--",
    "/*",
    "*/",
    "xp_",
    "sp_",
];

const XSS_PATTERNS: &[&str] = &[
    "<script",
    "</script>",
    "<iframe",
    "<object",
    "<embed",
    "javascript:",
    "vbscript:",
    "onload=",
    "onerror=",
    "onclick=",
    "onmouseover=",
];

/// Checked case-sensitively (the reference checks these against the raw,
/// not lower-cased, input).
const SHELL_PATTERNS: &[&str] = &[
    "$(rm",
    "${IFS}",
    "`rm",
    "rm -rf",
    "wget ",
    "curl ",
    "/etc/passwd",
    "/etc/shadow",
    "chmod ",
    "chown ",
];

/// `validate_input(s, max_len)` (§4.8).
pub fn validate_input(input: &str, max_len: usize) -> InputValidation {
    if input.len() > max_len {
        return InputValidation::ResourceLimit;
    }

    let bytes = input.as_bytes();
    if bytes.iter().enumerate().any(|(i, &b)| b == 0 && i + 1 < bytes.len()) {
        return InputValidation::InjectionDetected;
    }

    let lower = input.to_lowercase();
    if SQL_PATTERNS.iter().any(|p| lower.contains(p)) {
        return InputValidation::InjectionDetected;
    }
    if XSS_PATTERNS.iter().any(|p| lower.contains(p)) {
        return InputValidation::InjectionDetected;
    }
    if SHELL_PATTERNS.iter().any(|p| input.contains(p)) {
        return InputValidation::InjectionDetected;
    }

    InputValidation::Ok
}

const INJECTION_TOKENS: &[&str] = &["; ", "&&", "||", " | ", "`", "$("];
const DESTRUCTIVE: &[&str] = &["rm -rf", "dd if=", "mkfs", "fdisk"];
const PRIVILEGE: &[&str] = &[
    "sudo",
    "su ",
    "chmod 777",
    "chown",
    "passwd",
    "/etc/passwd",
    "/etc/shadow",
];
const NETWORK_FIRST_TOKEN: &[&str] = &[
    "wget", "curl", "nc", "netcat", "telnet", "ssh", "scp", "rsync", "mount", "umount",
];
const SAFE_FIRST_TOKEN: &[&str] = &[
    "echo", "date", "ls", "pwd", "whoami", "id", "uptime", "uname", "hostname", "ps", "df",
    "free", "head", "tail", "grep", "wc", "sort", "uniq", "cut", "awk", "sed",
];

/// `validate_command(cmd, safe_mode)` (§4.8, §6). Checked in the priority
/// order the spec lists: injection, then destructive, then privilege,
/// then network, then the safe whitelist. `safe_mode` gates what happens
/// to a command that falls through every tier: with `XMD_SAFE_MODE=1`
/// (the default) that's `PermissionDenied`; with it off, an otherwise
/// unmatched command is permitted instead, per §6's "toggles
/// default-deny on unknown commands".
pub fn validate_command(cmd: &str, safe_mode: bool) -> CommandValidation {
    if cmd.trim().is_empty() {
        return CommandValidation::PermissionDenied;
    }

    if INJECTION_TOKENS.iter().any(|t| cmd.contains(t))
        || cmd.contains("> /")
        || cmd.contains(">> /")
    {
        return CommandValidation::Injection;
    }

    let lower = cmd.to_lowercase();
    if DESTRUCTIVE.iter().any(|p| lower.contains(p)) {
        return CommandValidation::Destructive;
    }
    if PRIVILEGE.iter().any(|p| lower.contains(p)) {
        return CommandValidation::Privilege;
    }

    let first_token = cmd.split_whitespace().next().unwrap_or("");
    if NETWORK_FIRST_TOKEN.contains(&first_token) {
        return CommandValidation::Network;
    }
    if SAFE_FIRST_TOKEN.contains(&first_token) {
        return CommandValidation::Ok;
    }

    if safe_mode {
        CommandValidation::PermissionDenied
    } else {
        CommandValidation::Ok
    }
}

const TRAVERSAL_PATTERNS: &[&str] = &[
    "../", "..\\", "/..", "\\..", "%2e%2e", "%2E%2E", "%2e%2e%2f", "%2E%2E%2F",
];

/// `validate_path(path, allowed_base)` (§4.8). Canonicalization is
/// attempted via the filesystem (mirroring the reference's `realpath`
/// call); for paths that don't yet exist, a lexical normalization is used
/// instead, matching the reference's fallback.
pub fn validate_path(path: &str, allowed_base: &str) -> PathValidation {
    if path.is_empty() || allowed_base.is_empty() {
        return PathValidation::InvalidInput;
    }

    if path == ".." || TRAVERSAL_PATTERNS.iter().any(|p| path.contains(p)) {
        return PathValidation::Traversal;
    }
    if path.as_bytes().iter().enumerate().any(|(i, &b)| b == 0 && i + 1 < path.len()) {
        return PathValidation::Traversal;
    }

    let normalized_path = normalize(Path::new(path));
    let normalized_base = normalize(Path::new(allowed_base));

    if is_within_base(&normalized_path, &normalized_base) {
        PathValidation::Ok
    } else {
        PathValidation::Traversal
    }
}

/// Canonicalize via the filesystem when possible, else fall back to a
/// lexical resolution of `.`/`..` components (mirrors the reference's
/// `realpath`-or-manual-normalize fallback).
fn normalize(path: &Path) -> PathBuf {
    if let Ok(canon) = std::fs::canonicalize(path) {
        return canon;
    }
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn is_within_base(path: &Path, base: &Path) -> bool {
    path.starts_with(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_input_flags_sql_case_insensitively() {
        assert_eq!(
            validate_input("x'; DROP TABLE users", 1000),
            InputValidation::InjectionDetected
        );
    }

    #[test]
    fn validate_input_flags_xss() {
        assert_eq!(
            validate_input("<script>alert(1)</script>", 1000),
            InputValidation::InjectionDetected
        );
    }

    #[test]
    fn validate_input_enforces_max_length() {
        assert_eq!(validate_input("abcdef", 3), InputValidation::ResourceLimit);
    }

    #[test]
    fn validate_input_accepts_plain_text() {
        assert_eq!(validate_input("hello world", 1000), InputValidation::Ok);
    }

    #[test]
    fn validate_command_rejects_injection_first() {
        // S4-adjacent: a chained command is Injection even though "rm -rf"
        // also appears, because injection is checked first.
        assert_eq!(validate_command("ls; rm -rf /", true), CommandValidation::Injection);
    }

    #[test]
    fn validate_command_flags_destructive() {
        // S4: exec rm -rf /
        assert_eq!(validate_command("rm -rf /", true), CommandValidation::Destructive);
    }

    #[test]
    fn validate_command_flags_privilege() {
        assert_eq!(validate_command("sudo ls", true), CommandValidation::Privilege);
    }

    #[test]
    fn validate_command_flags_network() {
        assert_eq!(validate_command("curl http://example.com", true), CommandValidation::Network);
    }

    #[test]
    fn validate_command_allows_whitelisted() {
        assert_eq!(validate_command("echo hello", true), CommandValidation::Ok);
    }

    #[test]
    fn validate_command_default_denies_unknown() {
        assert_eq!(validate_command("vim file.txt", true), CommandValidation::PermissionDenied);
    }

    #[test]
    fn validate_command_with_safe_mode_off_permits_unknown() {
        // §6: XMD_SAFE_MODE=0 toggles off default-deny on unrecognized
        // commands; the injection/destructive/privilege/network tiers
        // still apply unchanged.
        assert_eq!(validate_command("vim file.txt", false), CommandValidation::Ok);
        assert_eq!(validate_command("rm -rf /", false), CommandValidation::Destructive);
    }

    #[test]
    fn validate_path_rejects_dotdot() {
        assert_eq!(validate_path("../../etc/passwd", "/srv/docs"), PathValidation::Traversal);
    }

    #[test]
    fn validate_path_rejects_encoded_traversal() {
        assert_eq!(validate_path("%2e%2e/etc/passwd", "/srv/docs"), PathValidation::Traversal);
    }

    #[test]
    fn validate_path_accepts_path_within_base() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.md");
        std::fs::write(&file, "hello").unwrap();
        assert_eq!(
            validate_path(file.to_str().unwrap(), dir.path().to_str().unwrap()),
            PathValidation::Ok
        );
    }
}
