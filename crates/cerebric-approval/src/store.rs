//! Atomic on-disk persistence for approval requests and decisions.
//!
//! Request files live at `<data-dir>/approval/requests/<id>.json` and are
//! replaced atomically (write to a sibling temp file, then rename) so a
//! reader never observes a half-written file. Decision history lives at
//! `<data-dir>/approval/history/<id>_<decided_at>.json`, one file per
//! decision — resubmitting the same decision is a no-op (law L2).

use anyhow::{Context, Result};
use cerebric_core::types::{ApprovalDecision, ApprovalRequest};
use std::fs;
use std::path::{Path, PathBuf};

pub struct ApprovalStore {
    requests_dir: PathBuf,
    history_dir: PathBuf,
}

impl ApprovalStore {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Result<Self> {
        let storage_dir = storage_dir.into();
        let requests_dir = storage_dir.join("requests");
        let history_dir = storage_dir.join("history");
        fs::create_dir_all(&requests_dir)
            .with_context(|| format!("creating {}", requests_dir.display()))?;
        fs::create_dir_all(&history_dir)
            .with_context(|| format!("creating {}", history_dir.display()))?;
        Ok(Self {
            requests_dir,
            history_dir,
        })
    }

    fn request_path(&self, id: &str) -> PathBuf {
        self.requests_dir.join(format!("{id}.json"))
    }

    fn history_path(&self, decision: &ApprovalDecision) -> PathBuf {
        let stamp = decision.decided_at.format("%Y%m%dT%H%M%S%.6f");
        self.history_dir
            .join(format!("{}_{}.json", decision.request_id, stamp))
    }

    /// Replaces the current request record, atomically.
    pub fn save_request(&self, request: &ApprovalRequest) -> Result<()> {
        atomic_write_json(&self.request_path(&request.id), request)
    }

    pub fn load_request(&self, id: &str) -> Result<ApprovalRequest> {
        let path = self.request_path(id);
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    /// Appends one decision to history. Returns `true` if a new file was
    /// written, `false` if this exact decision (same request id + decided_at)
    /// was already recorded.
    pub fn save_decision(&self, decision: &ApprovalDecision) -> Result<bool> {
        let path = self.history_path(decision);
        if path.exists() {
            return Ok(false);
        }
        atomic_write_json(&path, decision)?;
        Ok(true)
    }

    pub fn list_pending(&self) -> Result<Vec<ApprovalRequest>> {
        let mut pending = Vec::new();
        for entry in fs::read_dir(&self.requests_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(contents) = fs::read_to_string(&path) else {
                continue;
            };
            match serde_json::from_str::<ApprovalRequest>(&contents) {
                Ok(request) => pending.push(request),
                Err(error) => {
                    tracing::warn!(%error, path = %path.display(), "quarantining corrupt approval request file");
                }
            }
        }
        Ok(pending)
    }
}

fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json).with_context(|| format!("writing {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cerebric_core::types::{ApprovalStatus, RiskLevel};
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn sample_request(id: &str) -> ApprovalRequest {
        ApprovalRequest {
            id: id.to_string(),
            task: "fan_throttle".to_string(),
            action: "raise fan speed".to_string(),
            confidence: 0.9,
            risk_level: RiskLevel::Medium,
            system_state: BTreeMap::new(),
            affected_resources: Vec::new(),
            simulation_result: None,
            requested_at: Utc::now(),
            expires_at: None,
            status: ApprovalStatus::Pending,
            decided_at: None,
            decided_by: None,
            reason: None,
        }
    }

    #[test]
    fn test_save_and_load_request_round_trips() {
        let dir = tempdir().unwrap();
        let store = ApprovalStore::new(dir.path()).unwrap();
        let request = sample_request("req-1");
        store.save_request(&request).unwrap();
        let loaded = store.load_request("req-1").unwrap();
        assert_eq!(loaded, request);
    }

    #[test]
    fn test_save_decision_idempotent() {
        let dir = tempdir().unwrap();
        let store = ApprovalStore::new(dir.path()).unwrap();
        let decision = ApprovalDecision {
            request_id: "req-1".to_string(),
            approved: true,
            reason: None,
            decided_by: "user".to_string(),
            decided_at: Utc::now(),
        };
        assert!(store.save_decision(&decision).unwrap());
        assert!(!store.save_decision(&decision).unwrap());
    }

    #[test]
    fn test_list_pending_skips_corrupt_files() {
        let dir = tempdir().unwrap();
        let store = ApprovalStore::new(dir.path()).unwrap();
        store.save_request(&sample_request("req-1")).unwrap();
        fs::write(dir.path().join("requests/req-2.json"), "not json").unwrap();

        let pending = store.list_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "req-1");
    }
}
