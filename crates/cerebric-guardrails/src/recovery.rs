//! (f) Recovery executor: runs configured recovery actions, in order, on a
//! critical anomaly.

use crate::safe_mode::SafeMode;
use cerebric_audit::AuditLog;
use cerebric_core::audit::AuditRecord;
use cerebric_core::types::AnomalyEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    AlertUser,
    RollbackLastAction,
    PauseAutonomy,
}

/// Outcome of one recovery action.
#[derive(Debug, Clone)]
pub struct RecoveryOutcome {
    pub action: RecoveryAction,
    pub success: bool,
    pub message: String,
}

/// The last applied action's rollback strategy, consulted by
/// `RollbackLastAction`. The Decision Loop is the only producer of this;
/// guardrails treats it as an opaque string to audit.
pub trait LastActionRollback {
    fn rollback_strategy(&self) -> Option<String>;
}

pub struct RecoveryExecutor<'a> {
    pub actions: Vec<RecoveryAction>,
    audit: &'a AuditLog,
    safe_mode: &'a SafeMode,
}

impl<'a> RecoveryExecutor<'a> {
    pub fn new(actions: Vec<RecoveryAction>, audit: &'a AuditLog, safe_mode: &'a SafeMode) -> Self {
        Self {
            actions,
            audit,
            safe_mode,
        }
    }

    /// Runs every configured action in order against the triggering anomaly,
    /// recording each outcome with success/failure, message, and details.
    pub fn run(
        &self,
        event: &AnomalyEvent,
        last_action: Option<&dyn LastActionRollback>,
    ) -> Vec<RecoveryOutcome> {
        self.actions
            .iter()
            .map(|action| self.execute_one(*action, event, last_action))
            .collect()
    }

    fn execute_one(
        &self,
        action: RecoveryAction,
        event: &AnomalyEvent,
        last_action: Option<&dyn LastActionRollback>,
    ) -> RecoveryOutcome {
        let outcome = match action {
            RecoveryAction::AlertUser => {
                tracing::error!(?event, "ALERT: critical anomaly requires operator attention");
                RecoveryOutcome {
                    action,
                    success: true,
                    message: format!("alerted: {}", event.description),
                }
            }
            RecoveryAction::RollbackLastAction => match last_action.and_then(|a| a.rollback_strategy()) {
                Some(strategy) => RecoveryOutcome {
                    action,
                    success: true,
                    message: format!("rollback strategy consulted: {strategy}"),
                },
                None => RecoveryOutcome {
                    action,
                    success: false,
                    message: "no last action rollback strategy available".to_string(),
                },
            },
            RecoveryAction::PauseAutonomy => {
                self.safe_mode
                    .enter_safe_mode(&format!("recovery: {}", event.description), self.audit);
                RecoveryOutcome {
                    action,
                    success: true,
                    message: "autonomy paused (safe-mode entered)".to_string(),
                }
            }
        };

        self.audit.write(
            AuditRecord::new("guardrails", "recovery_action", outcome.success)
                .with_summary(outcome.message.clone())
                .with_field("action", format!("{:?}", outcome.action))
                .with_field("anomaly_kind", format!("{:?}", event.kind)),
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cerebric_core::types::{AnomalyKind, Severity};
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn sample_event() -> AnomalyEvent {
        AnomalyEvent {
            kind: AnomalyKind::RepeatedFailures,
            severity: Severity::Critical,
            description: "3 consecutive failures".to_string(),
            metrics: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    struct FixedRollback(Option<String>);
    impl LastActionRollback for FixedRollback {
        fn rollback_strategy(&self) -> Option<String> {
            self.0.clone()
        }
    }

    #[test]
    fn test_pause_autonomy_enters_safe_mode() {
        let dir = tempdir().unwrap();
        let audit = AuditLog::new(dir.path().join("audit"));
        let safe_mode = SafeMode::new(dir.path().join("safe_mode_active.flag"));
        let executor = RecoveryExecutor::new(vec![RecoveryAction::PauseAutonomy], &audit, &safe_mode);

        let outcomes = executor.run(&sample_event(), None);
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].success);
        assert!(safe_mode.is_safe_mode_active());
    }

    #[test]
    fn test_rollback_fails_without_last_action() {
        let dir = tempdir().unwrap();
        let audit = AuditLog::new(dir.path().join("audit"));
        let safe_mode = SafeMode::new(dir.path().join("safe_mode_active.flag"));
        let executor =
            RecoveryExecutor::new(vec![RecoveryAction::RollbackLastAction], &audit, &safe_mode);

        let outcomes = executor.run(&sample_event(), None);
        assert!(!outcomes[0].success);
    }

    #[test]
    fn test_rollback_succeeds_with_last_action() {
        let dir = tempdir().unwrap();
        let audit = AuditLog::new(dir.path().join("audit"));
        let safe_mode = SafeMode::new(dir.path().join("safe_mode_active.flag"));
        let executor =
            RecoveryExecutor::new(vec![RecoveryAction::RollbackLastAction], &audit, &safe_mode);
        let last_action = FixedRollback(Some("restore from backup".to_string()));

        let outcomes = executor.run(&sample_event(), Some(&last_action));
        assert!(outcomes[0].success);
        assert!(outcomes[0].message.contains("restore from backup"));
    }

    #[test]
    fn test_actions_run_in_configured_order() {
        let dir = tempdir().unwrap();
        let audit = AuditLog::new(dir.path().join("audit"));
        let safe_mode = SafeMode::new(dir.path().join("safe_mode_active.flag"));
        let executor = RecoveryExecutor::new(
            vec![RecoveryAction::AlertUser, RecoveryAction::PauseAutonomy],
            &audit,
            &safe_mode,
        );
        let outcomes = executor.run(&sample_event(), None);
        assert_eq!(outcomes[0].action, RecoveryAction::AlertUser);
        assert_eq!(outcomes[1].action, RecoveryAction::PauseAutonomy);
    }
}
