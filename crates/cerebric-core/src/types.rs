//! Shared data model for the autonomous execution core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A trigger specification for a scheduled [`Job`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// Five/six-field cron expression, interpreted in UTC.
    Cron(String),
    /// Absolute UTC instant; fires once.
    At(DateTime<Utc>),
}

/// Lifecycle state of a [`Job`]. Once a job reaches one of the terminal
/// states (`Completed`, `Failed`, `Cancelled`), no further transition is
/// permitted (invariant P1, "monotone terminality").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Skipped,
    Rejected,
}

impl JobState {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Cancelled)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
            JobState::Skipped => "skipped",
            JobState::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

/// An addressable unit of work owned exclusively by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub task: String,
    pub trigger: Trigger,
    /// 1 = highest priority, 10 = lowest.
    pub priority: u8,
    pub inputs: BTreeMap<String, serde_json::Value>,
    pub state: JobState,
    pub max_retries: u32,
    pub timeout_seconds: u64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub last_error: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Job {
    pub fn new(id: impl Into<String>, task: impl Into<String>, trigger: Trigger) -> Self {
        Self {
            id: id.into(),
            task: task.into(),
            trigger,
            priority: 5,
            inputs: BTreeMap::new(),
            state: JobState::Pending,
            max_retries: 3,
            timeout_seconds: 300,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            retry_count: 0,
            last_error: None,
            description: None,
        }
    }

    /// Attempt a state transition, enforcing monotone terminality (P1) and
    /// the `started_at`-iff-ever-`running` invariant.
    pub fn transition(&mut self, to: JobState) -> Result<(), crate::error::CoreError> {
        if self.state.is_terminal() {
            return Err(crate::error::CoreError::TerminalJobTransition {
                job_id: self.id.clone(),
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        if to == JobState::Running && self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        if to.is_terminal() || to == JobState::Rejected || to == JobState::Skipped {
            if to.is_terminal() {
                self.completed_at = Some(Utc::now());
            }
        }
        self.state = to;
        Ok(())
    }
}

/// Risk classification attached to a [`Decision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Structured output of an LLM consultation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub step: u32,
    pub action: String,
    pub confidence: f64,
    pub reasoning: String,
    pub requires_approval: bool,
    pub approval_reason: Option<String>,
    pub risk_level: RiskLevel,
}

impl Decision {
    /// A conservative fallback used when the model's response cannot be
    /// parsed into a well-formed `Decision`.
    pub fn conservative_fallback(step: u32, reasoning: impl Into<String>) -> Self {
        Self {
            step,
            action: "skip".to_string(),
            confidence: 0.0,
            reasoning: reasoning.into(),
            requires_approval: true,
            approval_reason: Some("decision parse failure".to_string()),
            risk_level: RiskLevel::High,
        }
    }

    /// Applies the risk/confidence invariants from the specification:
    /// `risk = high` or confidence below the low threshold forces approval.
    pub fn apply_forced_approval(&mut self, min_approval_execute: f64) {
        if self.risk_level == RiskLevel::High || self.confidence < min_approval_execute {
            self.requires_approval = true;
        }
    }
}

/// A single change a [`SimulationResult`] predicts would occur.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimulatedChange {
    FileCreate {
        path: String,
        preview: String,
    },
    FileModify {
        path: String,
        unified_diff: String,
    },
    Command {
        command: String,
        preview_output: Option<String>,
        danger_warnings: Vec<String>,
    },
    ServiceRestart {
        service: String,
        steps: Vec<String>,
        estimated_seconds: u64,
    },
    HardwareControl {
        device_path: String,
        current_value: String,
        target_value: String,
    },
    PackageUpdate {
        package_count: u32,
        reboot_advised: bool,
    },
}

/// Pure, side-effect-free description of what an action would do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub changes: Vec<SimulatedChange>,
    pub affected_resources: Vec<String>,
    pub warnings: Vec<String>,
    pub commands: Vec<String>,
    pub estimated_duration_seconds: u64,
    pub reversible: bool,
    pub rollback_strategy: String,
}

/// Status of an [`ApprovalRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

/// A persisted request for user judgement on a side-effecting action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,
    pub task: String,
    pub action: String,
    pub confidence: f64,
    pub risk_level: RiskLevel,
    pub system_state: BTreeMap<String, serde_json::Value>,
    pub affected_resources: Vec<String>,
    pub simulation_result: Option<SimulationResult>,
    pub requested_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: ApprovalStatus,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
    pub reason: Option<String>,
}

/// A user (or automated) decision on an [`ApprovalRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub request_id: String,
    pub approved: bool,
    pub reason: Option<String>,
    pub decided_by: String,
    pub decided_at: DateTime<Utc>,
}

/// Declarative policy conditions attached to a single tool entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours_allow: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths_allow: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths_deny: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub names_allow: Option<Vec<String>>,
}

/// Policy entry for a single tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolPolicy {
    #[serde(default)]
    pub allow: Option<bool>,
    #[serde(default)]
    pub simulation_required: bool,
    #[serde(default)]
    pub rollback_required: bool,
    #[serde(default)]
    pub approvals: Vec<String>,
    #[serde(default)]
    pub conditions: PolicyConditions,
}

/// Top-level declarative policy document (loaded from YAML, see
/// `cerebric-config`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default = "default_allow_true")]
    pub default_allow: bool,
    #[serde(default)]
    pub tools: BTreeMap<String, ToolPolicy>,
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self {
            default_allow: true,
            tools: BTreeMap::new(),
        }
    }
}

fn default_allow_true() -> bool {
    true
}

/// Resource caps enforced by the guardrail engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceBudgets {
    pub cpu_percent_max: f64,
    pub memory_mb_max: u64,
    pub duration_minutes_max: u64,
    pub frequency_per_hour_max: u32,
}

impl Default for ResourceBudgets {
    fn default() -> Self {
        Self {
            cpu_percent_max: 50.0,
            memory_mb_max: 2048,
            duration_minutes_max: 30,
            frequency_per_hour_max: 10,
        }
    }
}

/// A single resource-usage sample taken during job execution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f64,
    pub memory_mb: u64,
    pub elapsed_seconds: u64,
    pub within_budgets: bool,
}

/// Anomaly classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    CpuSpike,
    MemoryLeak,
    RepeatedFailures,
    ErrorRateExceeded,
}

/// Anomaly severity, ordered `Info < Warning < Error < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

/// A detected anomaly condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub description: String,
    pub metrics: BTreeMap<String, f64>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_transition_sets_started_at_once() {
        let mut job = Job::new("j1", "health_check", Trigger::Cron("*/1 * * * *".into()));
        assert!(job.started_at.is_none());
        job.transition(JobState::Running).unwrap();
        let first = job.started_at;
        assert!(first.is_some());
    }

    #[test]
    fn test_job_transition_terminal_rejects_further_moves() {
        let mut job = Job::new("j1", "noop", Trigger::At(Utc::now()));
        job.transition(JobState::Running).unwrap();
        job.transition(JobState::Completed).unwrap();
        assert!(job.state.is_terminal());
        let err = job.transition(JobState::Pending).unwrap_err();
        assert!(matches!(err, crate::error::CoreError::TerminalJobTransition { .. }));
    }

    #[test]
    fn test_decision_forced_approval_on_high_risk() {
        let mut d = Decision {
            step: 1,
            action: "write /etc/x".into(),
            confidence: 0.95,
            reasoning: "ok".into(),
            requires_approval: false,
            approval_reason: None,
            risk_level: RiskLevel::High,
        };
        d.apply_forced_approval(0.5);
        assert!(d.requires_approval);
    }

    #[test]
    fn test_decision_forced_approval_on_low_confidence() {
        let mut d = Decision {
            step: 1,
            action: "noop".into(),
            confidence: 0.4,
            reasoning: "ok".into(),
            requires_approval: false,
            approval_reason: None,
            risk_level: RiskLevel::Low,
        };
        d.apply_forced_approval(0.5);
        assert!(d.requires_approval);
    }

    #[test]
    fn test_policy_document_default_allow_true() {
        let yaml = "tools: {}\n";
        let doc: PolicyDocument = serde_yaml_like_defaults();
        let _ = yaml;
        assert!(doc.default_allow);
    }

    fn serde_yaml_like_defaults() -> PolicyDocument {
        PolicyDocument::default()
    }

    #[test]
    fn test_job_round_trip_json() {
        let job = Job::new("j1", "noop", Trigger::Cron("0 * * * *".into()));
        let json = serde_json::to_string(&job).unwrap();
        let back: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(job, back);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Error);
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }
}
