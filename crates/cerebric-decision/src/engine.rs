//! C8 — Decision Loop: orchestrates Retriever → ModelProvider → Guardrails
//! → Policy → Approval → Execute → Memory/Audit for each job firing.
//! Implements [`cerebric_scheduler::JobExecutor`] as the seam the Scheduler
//! dispatches through.

use crate::model_provider::{GenerateOptions, ModelProvider};
use crate::state::StateGatherer;
use crate::tool::{Tool, ToolRequest};
use async_trait::async_trait;
use cerebric_approval::{simulate, ApprovalEngine};
use cerebric_audit::AuditLog;
use cerebric_core::audit::AuditRecord;
use cerebric_core::error::CoreError;
use cerebric_core::types::{
    ApprovalRequest, ApprovalStatus, Decision, Job, JobState, PolicyDocument, ResourceBudgets,
};
use cerebric_guardrails::{check_budgets, check_confidence, AnomalyDetector, BudgetTracker, ConfidenceOutcome, ConfidenceThresholds, SafeMode};
use cerebric_memory::{MemoryStore, Partition, Retriever};
use cerebric_policy::{decide, PolicyContext};
use cerebric_retry::{retry, RetryPolicy};
use cerebric_scheduler::{store::JobStore, JobExecutor};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;

/// Builds the [`PolicyContext`] for a job firing; a seam because
/// current-user/current-host/current-time policy inputs are environmental.
pub trait PolicyContextProvider: Send + Sync {
    fn build(&self, job: &Job) -> PolicyContext;
}

pub struct DefaultPolicyContextProvider;

impl PolicyContextProvider for DefaultPolicyContextProvider {
    fn build(&self, job: &Job) -> PolicyContext {
        use chrono::Timelike;
        let now = chrono::Local::now();
        PolicyContext {
            current_user: std::env::var("USER").unwrap_or_else(|_| "unknown".to_string()),
            current_host: gethostname(),
            current_minute_of_day: now.hour() * 60 + now.minute(),
            path: job.inputs.get("path").and_then(|v| v.as_str()).map(|s| s.to_string()),
            name: job.inputs.get("name").and_then(|v| v.as_str()).map(|s| s.to_string()),
        }
    }
}

fn gethostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

pub struct DecisionLoop {
    pub memory: Arc<MemoryStore>,
    pub retriever: Arc<dyn Retriever>,
    pub model: Arc<dyn ModelProvider>,
    pub model_id: String,
    pub confidence: ConfidenceThresholds,
    pub budgets: ResourceBudgets,
    pub anomaly: Mutex<AnomalyDetector>,
    pub safe_mode: Arc<SafeMode>,
    pub policy: PolicyDocument,
    pub policy_context: Arc<dyn PolicyContextProvider>,
    pub approval: Arc<ApprovalEngine>,
    pub approval_timeout: Duration,
    pub audit: Arc<AuditLog>,
    pub tools: BTreeMap<String, Arc<dyn Tool>>,
    pub state_gatherer: Arc<dyn StateGatherer>,
    pub retry_policy: RetryPolicy,
    pub job_store: JobStore,
}

impl DecisionLoop {
    /// Marks `job` terminal with `state`, persists, audits, and records the
    /// outcome to the runtime memory partition. Used for every early-exit
    /// path (safe-mode skip, guardrail/policy denial, approval rejection).
    fn finish_early(
        &self,
        mut job: Job,
        state: JobState,
        audit_event: &str,
        reason: &str,
    ) -> Result<(), CoreError> {
        let _ = job.transition(state);
        job.last_error = Some(reason.to_string());
        let _ = self.job_store.save(&job);
        self.audit.write(
            AuditRecord::new("decision_loop", audit_event, state != JobState::Failed)
                .with_request_id(job.id.clone())
                .with_summary(reason.to_string()),
        );
        let _ = self.memory.append(
            &Partition::Runtime,
            "outcomes",
            serde_json::json!({
                "job_id": job.id,
                "task": job.task,
                "success": false,
                "state": state.to_string(),
                "reason": reason,
            }),
        );
        Ok(())
    }

    /// Parses the first `{...}` JSON object out of a model response,
    /// falling back to a conservative Decision on any parse failure (step 5).
    fn parse_decision(step: u32, text: &str) -> Decision {
        let Some(start) = text.find('{') else {
            return Decision::conservative_fallback(step, "no JSON object in model response");
        };
        let mut depth = 0i32;
        let mut end = None;
        for (idx, ch) in text[start..].char_indices() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(start + idx + 1);
                        break;
                    }
                }
                _ => {}
            }
        }
        let Some(end) = end else {
            return Decision::conservative_fallback(step, "unbalanced JSON object in model response");
        };
        match serde_json::from_str::<Decision>(&text[start..end]) {
            Ok(decision) => decision,
            Err(error) => Decision::conservative_fallback(step, format!("decision parse failure: {error}")),
        }
    }

    async fn execute_inner(&self, mut job: Job) -> Result<(), CoreError> {
        // Step 1: safe-mode pre-flight. The Scheduler already checks this
        // before dispatching, but the loop re-checks independently so it
        // remains correct if ever driven outside the scheduler.
        if self.safe_mode.is_safe_mode_active() {
            return self.finish_early(job, JobState::Skipped, "skipped_safe_mode", "safe-mode active");
        }

        // Step 2: gather current state.
        let current_state = self.state_gatherer.gather(&job);

        // Step 3: retrieve relevant memories.
        let query = job.description.clone().unwrap_or_else(|| job.task.clone());
        let retrieved = self.retriever.retrieve(&query, 3).unwrap_or_default();

        // Step 4: compose prompt.
        let prompt = compose_prompt(&job, &current_state, &retrieved);

        // Step 5: consult the model, parse Decision with conservative fallback.
        let response = self
            .model
            .generate(&prompt, &self.model_id, 512, 0.3, &GenerateOptions::default())
            .await;
        let mut decision = match response {
            Ok(response) => Self::parse_decision(1, &response.text),
            Err(error) => Decision::conservative_fallback(1, format!("model generation failed: {error}")),
        };

        // Step 6: guardrail pipeline. The estimated-resources map comes from
        // the job's inputs when the task supplies one; conservative defaults
        // (no measurable cpu/memory footprint) apply otherwise.
        let estimated_cpu_percent = job
            .inputs
            .get("estimated_cpu_percent")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        let estimated_memory_mb = job
            .inputs
            .get("estimated_memory_mb")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let estimated_minutes = job.timeout_seconds / 60;
        if let Err(error) = check_budgets(&self.budgets, estimated_cpu_percent, estimated_memory_mb, estimated_minutes.max(1), 0) {
            return self.finish_early(job, JobState::Rejected, "guardrail_denied", &error.to_string());
        }
        match check_confidence(&self.confidence, decision.confidence, &job.task) {
            Ok(ConfidenceOutcome::RequireApproval) => {
                decision.requires_approval = true;
                decision.approval_reason = Some("confidence below auto-execute threshold".to_string());
            }
            Ok(ConfidenceOutcome::AllowAuto) => {}
            Err(error) => {
                self.tally_failure(&job.id);
                return self.finish_early(job, JobState::Rejected, "guardrail_denied", &error.to_string());
            }
        }
        decision.apply_forced_approval(self.confidence.min_approval_execute);

        // Step 7: policy check.
        let mut context = self.policy_context.build(&job);
        context.name = Some(job.task.clone());
        let policy_decision = decide(&self.policy, &job.task, true, &context);
        if !policy_decision.allow {
            self.tally_failure(&job.id);
            return self.finish_early(job, JobState::Rejected, "policy_denied", &policy_decision.reason);
        }

        // Step 8: approval. A non-empty `approvals_needed` list on the
        // policy entry also forces an approval request, independent of the
        // Decision's own `requires_approval`.
        if !policy_decision.approvals_needed.is_empty() {
            decision.requires_approval = true;
        }
        if decision.requires_approval {
            let simulation_result = if policy_decision.simulation_required {
                job.inputs
                    .get("command")
                    .and_then(|v| v.as_str())
                    .map(|command| simulate(&cerebric_approval::ActionRequest::Command { command, dry_run_flag: None }))
            } else {
                None
            };

            let request = ApprovalRequest {
                id: job.id.clone(),
                task: job.task.clone(),
                action: decision.action.clone(),
                confidence: decision.confidence,
                risk_level: decision.risk_level,
                system_state: current_state.clone(),
                affected_resources: simulation_result
                    .as_ref()
                    .map(|s| s.affected_resources.clone())
                    .unwrap_or_default(),
                simulation_result,
                requested_at: Utc::now(),
                expires_at: Some(Utc::now() + chrono::Duration::from_std(self.approval_timeout).unwrap_or_default()),
                status: ApprovalStatus::Pending,
                decided_at: None,
                decided_by: None,
                reason: None,
            };

            match self.approval.request_approval(request) {
                Ok(_approved) => {}
                Err(error) => {
                    self.tally_failure(&job.id);
                    return self.finish_early(job, JobState::Rejected, "approval_rejected", &error.to_string());
                }
            }
        }

        // Step 9: execute under retry, budget tracking, and overall timeout.
        let _ = job.transition(JobState::Running);
        let _ = self.job_store.save(&job);

        let Some(tool) = self.tools.get(&job.task).cloned() else {
            self.tally_failure(&job.id);
            return self.finish_early(job, JobState::Failed, "job_outcome", &format!("no tool registered for task {}", job.task));
        };

        let mut tracker = BudgetTracker::start(self.budgets);
        let job_id = job.id.clone();
        let inputs = job.inputs.clone();
        let run = async {
            retry(
                &self.retry_policy,
                |error: &String| !error.contains("PERMANENT"),
                |_attempt: u32, _error: &String, _delay: Duration| {},
                || {
                    let tool = tool.clone();
                    let job_id = job_id.clone();
                    let inputs = inputs.clone();
                    async move {
                        let request = ToolRequest {
                            tool: tool.name().to_string(),
                            version: None,
                            dry_run: false,
                            confirm: true,
                            request_id: job_id,
                            inputs,
                        };
                        let response = tool.execute(request).await;
                        if response.ok {
                            Ok(response)
                        } else {
                            Err(response.error.unwrap_or_else(|| "tool execution failed".to_string()))
                        }
                    }
                },
            )
            .await
        };

        let outcome = timeout(Duration::from_secs(job.timeout_seconds.max(1)), run).await;
        let (snapshot, budget_ok) = tracker.check();

        match outcome {
            Ok(Ok(_response)) if budget_ok.is_ok() => {
                // Step 10: success.
                let _ = job.transition(JobState::Completed);
                let _ = self.job_store.save(&job);
                self.audit.write(
                    AuditRecord::new("decision_loop", "apply", true)
                        .with_request_id(job.id.clone())
                        .with_summary("job completed"),
                );
                let _ = self.memory.append(
                    &Partition::Runtime,
                    "outcomes",
                    serde_json::json!({
                        "job_id": job.id,
                        "task": job.task,
                        "success": true,
                        "elapsed_seconds": snapshot.elapsed_seconds,
                    }),
                );
                if let Err(CoreError::AnomalyDetected(event)) =
                    self.anomaly.lock().unwrap().record_job_outcome(true, &job.id)
                {
                    self.enter_safe_mode_and_recover(&event.description);
                }
                Ok(())
            }
            Ok(Ok(_response)) => {
                // Budget exhaustion during execution: permanent failure.
                let reason = budget_ok.unwrap_err().to_string();
                self.finish_with_failure(job, &reason);
                Err(CoreError::BudgetExceeded(reason))
            }
            Ok(Err(error)) => {
                // Step 11: exhausted retries.
                self.finish_with_failure(job, &error);
                Err(CoreError::Timeout(0))
            }
            Err(_elapsed) => {
                let reason = format!("job exceeded {}s timeout", job.timeout_seconds);
                self.finish_with_failure(job, &reason);
                Err(CoreError::Timeout(job.timeout_seconds))
            }
        }
    }

    fn finish_with_failure(&self, mut job: Job, reason: &str) {
        job.last_error = Some(reason.to_string());
        let _ = job.transition(JobState::Failed);
        let _ = self.job_store.save(&job);
        self.audit.write(
            AuditRecord::new("decision_loop", "apply", false)
                .with_request_id(job.id.clone())
                .with_summary(reason.to_string()),
        );
        let _ = self.memory.append(
            &Partition::Runtime,
            "outcomes",
            serde_json::json!({
                "job_id": job.id,
                "task": job.task,
                "success": false,
                "reason": reason,
            }),
        );
        self.tally_failure(&job.id);
    }

    fn tally_failure(&self, job_id: &str) {
        if let Err(CoreError::AnomalyDetected(event)) =
            self.anomaly.lock().unwrap().record_job_outcome(false, job_id)
        {
            self.enter_safe_mode_and_recover(&event.description);
        }
    }

    fn enter_safe_mode_and_recover(&self, reason: &str) {
        self.safe_mode.enter_safe_mode(reason, &self.audit);
        self.audit.write(
            AuditRecord::new("decision_loop", "anomaly_critical", false)
                .with_summary(format!("safe-mode entered: {reason}")),
        );
    }
}

#[async_trait]
impl JobExecutor for DecisionLoop {
    async fn execute(&self, job: Job) -> Result<(), CoreError> {
        self.execute_inner(job).await
    }
}

fn compose_prompt(
    job: &Job,
    current_state: &BTreeMap<String, serde_json::Value>,
    retrieved: &[cerebric_memory::RetrievedItem],
) -> String {
    let state_json = serde_json::to_string(current_state).unwrap_or_default();
    let memories: Vec<&str> = retrieved.iter().map(|item| item.text.as_str()).collect();
    format!(
        "You are the autonomous maintenance agent for task \"{task}\".\n\
         Current state: {state_json}\n\
         Relevant memories: {memories:?}\n\
         Respond with a single JSON object matching this schema and nothing else:\n\
         {{\"step\": <int>, \"action\": <string>, \"confidence\": <0.0-1.0>, \"reasoning\": <string>, \
         \"requires_approval\": <bool>, \"approval_reason\": <string or null>, \"risk_level\": \"low\"|\"medium\"|\"high\"}}",
        task = job.task,
    )
}
