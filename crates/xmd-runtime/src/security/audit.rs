//! Append-only audit sink (§4.8, §6's newline-delimited log format).
//!
//! Grounded in `examples/original_source/include/security.h`'s
//! `security_audit_entry`/`audit_event_type`, and the distilled spec's
//! `audit(event_type, message, source_site, result)` call shape. The
//! original's `security_audit_get_entries` (dropped by the distillation,
//! restored per SPEC_FULL.md §4.8) is `AuditSink::entries_between`.

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::RuntimeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEventType {
    InputValidation,
    CommandExecution,
    FileAccess,
    NetworkAccess,
    PrivilegeEscalation,
}

impl AuditEventType {
    fn as_str(self) -> &'static str {
        match self {
            AuditEventType::InputValidation => "input_validation",
            AuditEventType::CommandExecution => "command_execution",
            AuditEventType::FileAccess => "file_access",
            AuditEventType::NetworkAccess => "network_access",
            AuditEventType::PrivilegeEscalation => "privilege_escalation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub event_type: AuditEventType,
    pub message: String,
    pub source_site: String,
    pub result: String,
    pub timestamp_ms: u64,
}

/// An append-only sink for security-relevant events. The evaluator calls
/// `append` at every validator invocation and at every command execution
/// (§4.8); its append must be atomic with respect to concurrent
/// evaluations (§5), hence the internal `Mutex`.
pub trait AuditSink: Send + Sync {
    fn append(
        &self,
        event_type: AuditEventType,
        message: &str,
        source_site: &str,
        result: &str,
    ) -> Result<(), RuntimeError>;

    /// Recent entries in `[start_ms, end_ms]`, from the sink's in-memory
    /// ring buffer — independent of whatever on-disk file backs it.
    fn entries_between(&self, start_ms: u64, end_ms: u64) -> Vec<AuditEntry>;
}

const RING_BUFFER_CAPACITY: usize = 4096;

/// An in-memory ring buffer, optionally mirrored to a newline-delimited
/// log file at `timestamp|event|result|message|file|line|function` (§6).
/// `source_file`/`line`/`function` are folded into `source_site` here,
/// since Rust call sites don't carry the reference's manual `__FILE__`/
/// `__LINE__`/`__func__` triad — `source_site` is expected to already be
/// "file:line:function"-shaped when the caller has that context.
pub struct FileAuditSink {
    ring: Mutex<VecDeque<AuditEntry>>,
    file_path: Option<PathBuf>,
}

impl FileAuditSink {
    pub fn new(file_path: Option<impl AsRef<Path>>) -> Self {
        FileAuditSink {
            ring: Mutex::new(VecDeque::with_capacity(RING_BUFFER_CAPACITY)),
            file_path: file_path.map(|p| p.as_ref().to_path_buf()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(None::<PathBuf>)
    }
}

impl AuditSink for FileAuditSink {
    fn append(
        &self,
        event_type: AuditEventType,
        message: &str,
        source_site: &str,
        result: &str,
    ) -> Result<(), RuntimeError> {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let entry = AuditEntry {
            event_type,
            message: message.to_string(),
            source_site: source_site.to_string(),
            result: result.to_string(),
            timestamp_ms,
        };

        {
            let mut ring = self.ring.lock().expect("audit ring buffer mutex poisoned");
            if ring.len() == RING_BUFFER_CAPACITY {
                ring.pop_front();
            }
            ring.push_back(entry.clone());
        }

        if let Some(path) = &self.file_path {
            let line = format!(
                "{}|{}|{}|{}|{}\n",
                entry.timestamp_ms,
                entry.event_type.as_str(),
                entry.result,
                entry.message.replace('|', "\\|").replace('\n', "\\n"),
                entry.source_site.replace('|', "\\|"),
            );
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| RuntimeError::Io {
                    path: path.display().to_string(),
                    source: e.to_string(),
                })?;
            file.write_all(line.as_bytes()).map_err(|e| RuntimeError::Io {
                path: path.display().to_string(),
                source: e.to_string(),
            })?;
        }

        Ok(())
    }

    fn entries_between(&self, start_ms: u64, end_ms: u64) -> Vec<AuditEntry> {
        let ring = self.ring.lock().expect("audit ring buffer mutex poisoned");
        ring.iter()
            .filter(|e| e.timestamp_ms >= start_ms && e.timestamp_ms <= end_ms)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_sink_records_and_retrieves_entries() {
        let sink = FileAuditSink::in_memory();
        sink.append(AuditEventType::CommandExecution, "ran ls", "legacy:exec", "Ok")
            .unwrap();
        let entries = sink.entries_between(0, u64::MAX);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "ran ls");
    }

    #[test]
    fn ring_buffer_evicts_oldest_beyond_capacity() {
        let sink = FileAuditSink::in_memory();
        for i in 0..(RING_BUFFER_CAPACITY + 10) {
            sink.append(
                AuditEventType::InputValidation,
                &format!("entry {}", i),
                "test",
                "Ok",
            )
            .unwrap();
        }
        let entries = sink.entries_between(0, u64::MAX);
        assert_eq!(entries.len(), RING_BUFFER_CAPACITY);
        assert_eq!(entries[0].message, "entry 10");
    }

    #[test]
    fn file_backed_sink_appends_newline_delimited_records() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("audit.log");
        let sink = FileAuditSink::new(Some(&log_path));
        sink.append(AuditEventType::CommandExecution, "rm -rf /", "legacy:exec", "Destructive")
            .unwrap();
        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(contents.contains("command_execution"));
        assert!(contents.contains("Destructive"));
        assert!(contents.contains("rm -rf /"));
    }
}
