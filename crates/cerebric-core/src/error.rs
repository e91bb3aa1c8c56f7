//! Shared error taxonomy.
//!
//! `GuardrailViolation` / `PolicyDenied` / `ApprovalRejected` / `BudgetExceeded`
//! are modeled as data, not exceptions: callers match on [`GuardOutcome`]
//! rather than unwind through them. `AnomalyDetected` remains the one
//! out-of-band signal (see [`CoreError::AnomalyDetected`]) because it needs
//! to interrupt a chain of otherwise-successful outcome recordings.

use crate::types::AnomalyEvent;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("confidence {confidence:.2} below minimum approval threshold {min_approval:.2}")]
    GuardrailViolation { confidence: f64, min_approval: f64 },

    #[error("budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("policy denied: {0}")]
    PolicyDenied(String),

    #[error("approval rejected: {0}")]
    ApprovalRejected(String),

    #[error("approval expired for request {0}")]
    ApprovalExpired(String),

    #[error("operation timed out after {0}s")]
    Timeout(u64),

    #[error("job {0} not found")]
    JobNotFound(String),

    #[error("attempted transition on terminal job {job_id}: {from:?} -> {to:?}")]
    TerminalJobTransition {
        job_id: String,
        from: String,
        to: String,
    },

    #[error("anomaly detected: {0:?}")]
    AnomalyDetected(AnomalyEvent),

    #[error("protected memory partition cannot be purged: {0}")]
    ProtectedPartition(String),

    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),
}

/// Result of running an action through the guardrail/policy pipeline.
///
/// Re-architected from exception-based control flow (see REDESIGN FLAGS in
/// the specification) into a tagged sum the caller matches on explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardOutcome<T> {
    Ok(T),
    Denied(CoreError),
    Anomaly(AnomalyEvent),
}

impl<T> GuardOutcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, GuardOutcome::Ok(_))
    }

    pub fn into_result(self) -> Result<T, CoreError> {
        match self {
            GuardOutcome::Ok(v) => Ok(v),
            GuardOutcome::Denied(e) => Err(e),
            GuardOutcome::Anomaly(event) => Err(CoreError::AnomalyDetected(event)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnomalyKind, Severity};
    use chrono::Utc;

    #[test]
    fn test_display_guardrail_violation() {
        let err = CoreError::GuardrailViolation {
            confidence: 0.3,
            min_approval: 0.5,
        };
        assert_eq!(
            err.to_string(),
            "confidence 0.30 below minimum approval threshold 0.50"
        );
    }

    #[test]
    fn test_display_terminal_job_transition() {
        let err = CoreError::TerminalJobTransition {
            job_id: "job-1".into(),
            from: "completed".into(),
            to: "running".into(),
        };
        assert!(err.to_string().contains("job-1"));
    }

    #[test]
    fn test_guard_outcome_into_result_ok() {
        let outcome: GuardOutcome<u32> = GuardOutcome::Ok(42);
        assert_eq!(outcome.into_result().unwrap(), 42);
    }

    #[test]
    fn test_guard_outcome_into_result_denied() {
        let outcome: GuardOutcome<u32> =
            GuardOutcome::Denied(CoreError::PolicyDenied("no".into()));
        assert!(outcome.into_result().is_err());
    }

    #[test]
    fn test_guard_outcome_into_result_anomaly() {
        let event = AnomalyEvent {
            kind: AnomalyKind::RepeatedFailures,
            severity: Severity::Critical,
            description: "3 consecutive failures".into(),
            metrics: Default::default(),
            timestamp: Utc::now(),
        };
        let outcome: GuardOutcome<u32> = GuardOutcome::Anomaly(event);
        match outcome.into_result() {
            Err(CoreError::AnomalyDetected(_)) => {}
            other => panic!("expected AnomalyDetected, got {other:?}"),
        }
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CoreError>();
    }
}
