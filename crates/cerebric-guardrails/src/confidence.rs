//! (a) Confidence gating.

use cerebric_core::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceOutcome {
    AllowAuto,
    RequireApproval,
}

#[derive(Debug, Clone, Copy)]
pub struct ConfidenceThresholds {
    pub min_auto_execute: f64,
    pub min_approval_execute: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            min_auto_execute: 0.80,
            min_approval_execute: 0.50,
        }
    }
}

/// P2: c >= min_auto => AllowAuto; min_approval <= c < min_auto =>
/// RequireApproval; c < min_approval => GuardrailViolation.
pub fn check_confidence(
    thresholds: &ConfidenceThresholds,
    confidence: f64,
    task: &str,
) -> Result<ConfidenceOutcome, CoreError> {
    if confidence >= thresholds.min_auto_execute {
        tracing::info!(confidence, task, "confidence check passed (auto-execute)");
        Ok(ConfidenceOutcome::AllowAuto)
    } else if confidence >= thresholds.min_approval_execute {
        tracing::warn!(confidence, task, "confidence check requires approval");
        Ok(ConfidenceOutcome::RequireApproval)
    } else {
        tracing::error!(confidence, task, "confidence check failed, below threshold");
        Err(CoreError::GuardrailViolation {
            confidence,
            min_approval: thresholds.min_approval_execute,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_auto_inclusive_at_threshold() {
        let thresholds = ConfidenceThresholds {
            min_auto_execute: 0.80,
            min_approval_execute: 0.50,
        };
        assert_eq!(
            check_confidence(&thresholds, 0.80, "t").unwrap(),
            ConfidenceOutcome::AllowAuto
        );
    }

    #[test]
    fn test_require_approval_in_middle_band() {
        let thresholds = ConfidenceThresholds::default();
        assert_eq!(
            check_confidence(&thresholds, 0.60, "t").unwrap(),
            ConfidenceOutcome::RequireApproval
        );
    }

    #[test]
    fn test_require_approval_inclusive_at_min_approval() {
        let thresholds = ConfidenceThresholds::default();
        assert_eq!(
            check_confidence(&thresholds, 0.50, "t").unwrap(),
            ConfidenceOutcome::RequireApproval
        );
    }

    #[test]
    fn test_violation_below_min_approval() {
        let thresholds = ConfidenceThresholds::default();
        let err = check_confidence(&thresholds, 0.30, "t").unwrap_err();
        assert!(matches!(err, CoreError::GuardrailViolation { .. }));
    }
}
