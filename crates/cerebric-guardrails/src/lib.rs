//! C4 — Guardrail Engine: confidence gating, budget tracking, anomaly
//! detection, and safe-mode lifecycle, coordinated through one façade.

pub mod anomaly;
pub mod budget;
pub mod confidence;
pub mod recovery;
pub mod safe_mode;

pub use anomaly::{AnomalyDetector, AnomalyThresholds};
pub use budget::{BudgetTracker, check_budgets};
pub use confidence::{ConfidenceOutcome, ConfidenceThresholds, check_confidence};
pub use recovery::{RecoveryAction, RecoveryExecutor, RecoveryOutcome};
pub use safe_mode::SafeMode;

use cerebric_audit::AuditLog;
use cerebric_core::types::ResourceBudgets;
use std::path::PathBuf;
use std::sync::Arc;

/// Single façade combining all four guardrail sub-capabilities, mirroring
/// how the original `GuardrailEnforcer` bundles confidence/budget/safe-mode
/// checks behind one object.
pub struct GuardrailEngine {
    pub confidence: ConfidenceThresholds,
    pub budgets: ResourceBudgets,
    pub anomaly: AnomalyDetector,
    pub safe_mode: SafeMode,
    pub audit: Arc<AuditLog>,
}

impl GuardrailEngine {
    pub fn new(
        confidence: ConfidenceThresholds,
        budgets: ResourceBudgets,
        anomaly_thresholds: AnomalyThresholds,
        data_dir: impl Into<PathBuf>,
        audit: Arc<AuditLog>,
    ) -> Self {
        let data_dir = data_dir.into();
        Self {
            confidence,
            budgets,
            anomaly: AnomalyDetector::new(anomaly_thresholds),
            safe_mode: SafeMode::new(data_dir.join("safe_mode_active.flag")),
            audit,
        }
    }
}
