//! (e) Safe-mode lifecycle: a process-wide flag backed by an on-disk marker
//! file, so state survives a process restart.

use cerebric_audit::AuditLog;
use cerebric_core::audit::AuditRecord;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

pub struct SafeMode {
    marker_path: PathBuf,
    active: AtomicBool,
}

impl SafeMode {
    pub fn new(marker_path: impl Into<PathBuf>) -> Self {
        let marker_path = marker_path.into();
        let active = marker_path.exists();
        Self {
            marker_path,
            active: AtomicBool::new(active),
        }
    }

    /// True if either the in-memory flag or the on-disk marker is present;
    /// checking the marker lets a freshly-started process recover state
    /// from a prior run that entered safe-mode.
    pub fn is_safe_mode_active(&self) -> bool {
        self.active.load(Ordering::SeqCst) || self.marker_path.exists()
    }

    pub fn enter_safe_mode(&self, reason: &str, audit: &AuditLog) {
        self.active.store(true, Ordering::SeqCst);
        if let Some(parent) = self.marker_path.parent() {
            if let Err(error) = std::fs::create_dir_all(parent) {
                tracing::warn!(%error, "failed to create safe-mode marker directory");
            }
        }
        if let Err(error) = std::fs::write(&self.marker_path, reason) {
            tracing::warn!(%error, "failed to write safe-mode marker file");
        }
        tracing::error!(reason, "entering safe-mode");
        audit.write(
            AuditRecord::new("guardrails", "safe_mode_enter", true)
                .with_summary(reason)
                .with_field("reason", reason),
        );
    }

    pub fn exit_safe_mode(&self, user: &str, audit: &AuditLog) {
        self.active.store(false, Ordering::SeqCst);
        if self.marker_path.exists() {
            if let Err(error) = std::fs::remove_file(&self.marker_path) {
                tracing::warn!(%error, "failed to remove safe-mode marker file");
            }
        }
        tracing::info!(user, "exiting safe-mode");
        audit.write(
            AuditRecord::new("guardrails", "safe_mode_exit", true)
                .with_summary(format!("exited by {user}"))
                .with_field("decided_by", user),
        );
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_enter_sets_flag_and_marker() {
        let dir = tempdir().unwrap();
        let audit = AuditLog::new(dir.path().join("audit"));
        let safe_mode = SafeMode::new(dir.path().join("safe_mode_active.flag"));
        assert!(!safe_mode.is_safe_mode_active());
        safe_mode.enter_safe_mode("repeated failures", &audit);
        assert!(safe_mode.is_safe_mode_active());
        assert!(safe_mode.marker_path().exists());
    }

    #[test]
    fn test_exit_clears_flag_and_marker() {
        let dir = tempdir().unwrap();
        let audit = AuditLog::new(dir.path().join("audit"));
        let safe_mode = SafeMode::new(dir.path().join("safe_mode_active.flag"));
        safe_mode.enter_safe_mode("anomaly", &audit);
        safe_mode.exit_safe_mode("operator", &audit);
        assert!(!safe_mode.is_safe_mode_active());
        assert!(!safe_mode.marker_path().exists());
    }

    #[test]
    fn test_survives_restart_via_marker_file() {
        let dir = tempdir().unwrap();
        let audit = AuditLog::new(dir.path().join("audit"));
        let marker = dir.path().join("safe_mode_active.flag");
        let first = SafeMode::new(&marker);
        first.enter_safe_mode("anomaly", &audit);

        // Simulate a fresh process by constructing a brand new instance
        // pointed at the same marker path, with no shared memory.
        let second = SafeMode::new(&marker);
        assert!(second.is_safe_mode_active());
    }
}
