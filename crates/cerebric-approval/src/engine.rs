//! Approval Protocol: request/decision persistence plus the three consult
//! modes (`cli`, `dashboard`, `auto`).

use crate::store::ApprovalStore;
use cerebric_audit::AuditLog;
use cerebric_core::audit::AuditRecord;
use cerebric_core::error::CoreError;
use cerebric_core::types::{ApprovalDecision, ApprovalRequest, ApprovalStatus};
use chrono::Utc;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalMode {
    Cli,
    /// Dashboard HTTP surface is out of scope for the core; this mode is a
    /// documented permanent auto-rejection until a dashboard adapter exists.
    Dashboard,
    /// Auto-approves every request. For testing only.
    Auto,
}

pub struct ApprovalEngine {
    store: ApprovalStore,
    audit: AuditLog,
    mode: ApprovalMode,
}

impl ApprovalEngine {
    pub fn new(storage_dir: impl Into<PathBuf>, audit: AuditLog, mode: ApprovalMode) -> anyhow::Result<Self> {
        Ok(Self {
            store: ApprovalStore::new(storage_dir)?,
            audit,
            mode,
        })
    }

    /// Submits `request` and blocks (synchronously) until a decision is
    /// reached, timed out, or expired. `expires_at` on the request, if set
    /// and already in the past, produces an immediate synthetic rejection.
    pub fn request_approval(&self, mut request: ApprovalRequest) -> Result<ApprovalDecision, CoreError> {
        if let Some(expires_at) = request.expires_at {
            if expires_at <= Utc::now() {
                let decision = ApprovalDecision {
                    request_id: request.id.clone(),
                    approved: false,
                    reason: Some("request already expired".to_string()),
                    decided_by: "system".to_string(),
                    decided_at: Utc::now(),
                };
                request.status = ApprovalStatus::Expired;
                self.persist(&request, &decision);
                return Err(CoreError::ApprovalExpired(request.id));
            }
        }

        self.store
            .save_request(&request)
            .map_err(|e| CoreError::PolicyDenied(format!("failed to persist approval request: {e}")))?;

        let decision = match self.mode {
            ApprovalMode::Cli => self.prompt_cli(&request),
            ApprovalMode::Dashboard => self.reject_dashboard_not_implemented(&request),
            ApprovalMode::Auto => self.auto_approve(&request),
        };

        request.status = if decision.approved {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Rejected
        };
        request.decided_at = Some(decision.decided_at);
        request.decided_by = Some(decision.decided_by.clone());
        request.reason = decision.reason.clone();

        self.persist(&request, &decision);

        if decision.approved {
            Ok(decision)
        } else {
            Err(CoreError::ApprovalRejected(
                decision.reason.clone().unwrap_or_else(|| "no reason given".to_string()),
            ))
        }
    }

    fn persist(&self, request: &ApprovalRequest, decision: &ApprovalDecision) {
        if let Err(error) = self.store.save_request(request) {
            tracing::warn!(%error, request_id = %request.id, "failed to persist approval request");
        }
        match self.store.save_decision(decision) {
            Ok(true) => {}
            Ok(false) => tracing::debug!(request_id = %decision.request_id, "decision already recorded, skipping"),
            Err(error) => tracing::warn!(%error, request_id = %decision.request_id, "failed to persist approval decision"),
        }
        self.audit.write(
            AuditRecord::new("approval", "apply", decision.approved)
                .with_request_id(request.id.clone())
                .with_summary(format!("{:?}", request.status))
                .with_field("decided_by", decision.decided_by.clone()),
        );
    }

    fn auto_approve(&self, request: &ApprovalRequest) -> ApprovalDecision {
        tracing::warn!(request_id = %request.id, "auto-approval mode — testing only");
        ApprovalDecision {
            request_id: request.id.clone(),
            approved: true,
            reason: Some("auto-approved (testing mode)".to_string()),
            decided_by: "auto".to_string(),
            decided_at: Utc::now(),
        }
    }

    fn reject_dashboard_not_implemented(&self, request: &ApprovalRequest) -> ApprovalDecision {
        tracing::warn!(request_id = %request.id, "dashboard approval not implemented, auto-rejecting");
        ApprovalDecision {
            request_id: request.id.clone(),
            approved: false,
            reason: Some("Dashboard approval not implemented yet".to_string()),
            decided_by: "system".to_string(),
            decided_at: Utc::now(),
        }
    }

    fn prompt_cli(&self, request: &ApprovalRequest) -> ApprovalDecision {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        print_request_summary(request, &mut stdout);

        loop {
            let _ = write!(stdout, "Approve this action? [y/N/details]: ");
            let _ = stdout.flush();

            let mut line = String::new();
            if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
                return ApprovalDecision {
                    request_id: request.id.clone(),
                    approved: false,
                    reason: Some("no input available (EOF)".to_string()),
                    decided_by: "cli".to_string(),
                    decided_at: Utc::now(),
                };
            }

            match line.trim().to_lowercase().as_str() {
                "y" | "yes" => {
                    return ApprovalDecision {
                        request_id: request.id.clone(),
                        approved: true,
                        reason: None,
                        decided_by: "cli".to_string(),
                        decided_at: Utc::now(),
                    };
                }
                "details" => {
                    if let Ok(json) = serde_json::to_string_pretty(request) {
                        let _ = writeln!(stdout, "\nFull Request Details:\n{json}\n");
                    }
                    continue;
                }
                _ => {
                    return ApprovalDecision {
                        request_id: request.id.clone(),
                        approved: false,
                        reason: Some("rejected by user".to_string()),
                        decided_by: "cli".to_string(),
                        decided_at: Utc::now(),
                    };
                }
            }
        }
    }
}

fn print_request_summary(request: &ApprovalRequest, out: &mut impl Write) {
    let _ = writeln!(out, "\n{}", "=".repeat(70));
    let _ = writeln!(out, "APPROVAL REQUIRED");
    let _ = writeln!(out, "{}", "=".repeat(70));
    let _ = writeln!(out, "Task: {}", request.task);
    let _ = writeln!(out, "Action: {}", request.action);
    let _ = writeln!(out, "Confidence: {:.2}", request.confidence);
    let _ = writeln!(out, "Risk Level: {:?}", request.risk_level);
    if !request.affected_resources.is_empty() {
        let _ = writeln!(out, "Affected Resources:");
        for resource in &request.affected_resources {
            let _ = writeln!(out, "  - {resource}");
        }
    }
    let _ = writeln!(out, "{}", "=".repeat(70));
}

#[cfg(test)]
mod tests {
    use super::*;
    use cerebric_core::types::RiskLevel;
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
    fn test_auto_mode_always_approves() {
        let dir = tempdir().unwrap();
        let audit = AuditLog::new(dir.path().join("audit"));
        let engine = ApprovalEngine::new(dir.path().join("approval"), audit, ApprovalMode::Auto).unwrap();
        let decision = engine.request_approval(sample_request("req-1")).unwrap();
        assert!(decision.approved);
    }

    #[test]
    fn test_dashboard_mode_always_rejects() {
        let dir = tempdir().unwrap();
        let audit = AuditLog::new(dir.path().join("audit"));
        let engine =
            ApprovalEngine::new(dir.path().join("approval"), audit, ApprovalMode::Dashboard).unwrap();
        let err = engine.request_approval(sample_request("req-1")).unwrap_err();
        assert!(matches!(err, CoreError::ApprovalRejected(_)));
    }

    #[test]
    fn test_expired_request_rejected_without_prompting() {
        let dir = tempdir().unwrap();
        let audit = AuditLog::new(dir.path().join("audit"));
        let engine = ApprovalEngine::new(dir.path().join("approval"), audit, ApprovalMode::Auto).unwrap();
        let mut request = sample_request("req-1");
        request.expires_at = Some(Utc::now() - chrono::Duration::seconds(10));
        let err = engine.request_approval(request).unwrap_err();
        assert!(matches!(err, CoreError::ApprovalExpired(_)));
    }

    #[test]
    fn test_decision_persisted_to_history() {
        let dir = tempdir().unwrap();
        let audit = AuditLog::new(dir.path().join("audit"));
        let storage = dir.path().join("approval");
        let engine = ApprovalEngine::new(storage.clone(), audit, ApprovalMode::Auto).unwrap();
        engine.request_approval(sample_request("req-1")).unwrap();
        let history_entries: Vec<_> = std::fs::read_dir(storage.join("history")).unwrap().collect();
        assert_eq!(history_entries.len(), 1);
    }
}
