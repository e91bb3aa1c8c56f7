//! C1 — Audit Log: append-only JSONL record of every tool invocation,
//! decision, and state transition. Rotated daily.
//!
//! Audit failures must never block a running tool: an unwritable path is
//! logged as a warning and the record is dropped, mirroring the teacher's
//! best-effort memory append (`csa-memory::store::MemoryStore::append`).

use cerebric_core::audit::AuditRecord;
use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AuditLog {
    dir: PathBuf,
}

impl AuditLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for_today(&self) -> PathBuf {
        let date = Utc::now().format("%Y-%m-%d");
        self.dir.join(format!("audit-{date}.jsonl"))
    }

    /// Append one record. Never fails loudly: errors are logged and the
    /// record is dropped, so a broken audit path can't halt a job.
    pub fn write(&self, mut record: AuditRecord) {
        if record.tool.is_empty() {
            tracing::warn!("dropping audit record with empty tool name");
            return;
        }
        record.ts = Utc::now();

        if let Err(error) = self.try_write(&record) {
            tracing::warn!(%error, tool = %record.tool, "failed to write audit record, dropping");
        }
    }

    fn try_write(&self, record: &AuditRecord) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for_today();
        let mut file = OpenOptions::new().append(true).create(true).open(&path)?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")?;
        file.flush()?;
        Ok(())
    }

    /// Read all records from a specific day's log file (for CLI inspection
    /// and tests). Corrupt lines are skipped, never fatal.
    pub fn read_day(&self, date: &str) -> Vec<AuditRecord> {
        let path = self.dir.join(format!("audit-{date}.jsonl"));
        read_jsonl(&path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn read_jsonl(path: &Path) -> Vec<AuditRecord> {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<AuditRecord>(line) {
            Ok(record) => Some(record),
            Err(error) => {
                tracing::warn!(%error, "skipping corrupt audit line");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_read_day() {
        let dir = tempdir().unwrap();
        let log = AuditLog::new(dir.path());
        log.write(AuditRecord::new("scheduler", "apply", true).with_summary("ok"));
        log.write(AuditRecord::new("policy", "apply", false).with_summary("denied"));

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let records = log.read_day(&today);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tool, "scheduler");
        assert_eq!(records[1].tool, "policy");
    }

    #[test]
    fn test_unwritable_dir_does_not_panic() {
        // Use a path under a file (not a directory) so create_dir_all fails.
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let log = AuditLog::new(blocker.join("audit"));
        // Should log a warning and return, not panic.
        log.write(AuditRecord::new("scheduler", "apply", true));
    }

    #[test]
    fn test_read_missing_day_returns_empty() {
        let dir = tempdir().unwrap();
        let log = AuditLog::new(dir.path());
        assert!(log.read_day("1999-01-01").is_empty());
    }

    #[test]
    fn test_corrupt_line_is_skipped() {
        let dir = tempdir().unwrap();
        let log = AuditLog::new(dir.path());
        log.write(AuditRecord::new("scheduler", "apply", true));

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let path = dir.path().join(format!("audit-{today}.jsonl"));
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "not json").unwrap();
        log.write(AuditRecord::new("policy", "apply", true));

        let records = log.read_day(&today);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_empty_tool_name_dropped() {
        let dir = tempdir().unwrap();
        let log = AuditLog::new(dir.path());
        log.write(AuditRecord::new("", "apply", true));
        let today = Utc::now().format("%Y-%m-%d").to_string();
        assert!(log.read_day(&today).is_empty());
    }
}
