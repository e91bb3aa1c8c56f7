//! Step 2 of the Decision Loop: gathering a task-defined "current state"
//! snapshot. The shape is task-specific (health-check samples CPU/memory;
//! log-cleanup sums directory sizes) so this is a pluggable seam rather
//! than a fixed struct.

use cerebric_core::types::Job;
use std::collections::BTreeMap;
use sysinfo::System;

pub trait StateGatherer: Send + Sync {
    fn gather(&self, job: &Job) -> BTreeMap<String, serde_json::Value>;
}

/// Default gatherer: samples host-wide CPU/memory, the kind of state a
/// health-check task would want. Task-specific gatherers (e.g. summing log
/// directory sizes) are expected to be supplied by the caller per profile.
pub struct SystemStateGatherer;

impl StateGatherer for SystemStateGatherer {
    fn gather(&self, job: &Job) -> BTreeMap<String, serde_json::Value> {
        let mut system = System::new_all();
        system.refresh_all();

        let cpu_percent = system.global_cpu_info().cpu_usage() as f64;
        let memory_used_mb = system.used_memory() / 1024 / 1024;
        let memory_total_mb = system.total_memory() / 1024 / 1024;

        let mut state = BTreeMap::new();
        state.insert("task".to_string(), serde_json::json!(job.task));
        state.insert("cpu_percent".to_string(), serde_json::json!(cpu_percent));
        state.insert("memory_used_mb".to_string(), serde_json::json!(memory_used_mb));
        state.insert("memory_total_mb".to_string(), serde_json::json!(memory_total_mb));
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cerebric_core::types::Trigger;
    use chrono::Utc;

    #[test]
    fn test_system_state_gatherer_reports_task_name() {
        let job = Job::new("j1", "health_check", Trigger::At(Utc::now()));
        let gatherer = SystemStateGatherer;
        let state = gatherer.gather(&job);
        assert_eq!(state.get("task").unwrap(), "health_check");
        assert!(state.contains_key("cpu_percent"));
    }
}
