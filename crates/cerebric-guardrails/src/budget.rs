//! (b)/(c) Resource budget enforcement: a static pre-flight check against
//! declared caps, and a runtime sampler (`BudgetTracker`) that polls actual
//! usage while a job executes.

use cerebric_core::error::CoreError;
use cerebric_core::types::{BudgetSnapshot, ResourceBudgets};
use chrono::Utc;
use std::time::Instant;
use sysinfo::{Pid, System};

/// Static check: does the declared job spec fit within the configured caps?
/// Unlike [`BudgetTracker`], this takes no measurements — it validates an
/// estimated-resources map (cpu/memory/duration/frequency) against the
/// configured caps before the job ever starts. Callers that lack an
/// estimate for a given dimension should pass a conservative default (e.g.
/// `0.0`/`0`) rather than omit the check.
pub fn check_budgets(
    budgets: &ResourceBudgets,
    estimated_cpu_percent: f64,
    estimated_memory_mb: u64,
    requested_duration_minutes: u64,
    recent_invocations_this_hour: u32,
) -> Result<(), CoreError> {
    let mut violations = Vec::new();
    if estimated_cpu_percent > budgets.cpu_percent_max {
        violations.push(format!(
            "estimated cpu {estimated_cpu_percent:.1}% exceeds cap {:.1}%",
            budgets.cpu_percent_max
        ));
    }
    if estimated_memory_mb > budgets.memory_mb_max {
        violations.push(format!(
            "estimated memory {estimated_memory_mb}MB exceeds cap {}MB",
            budgets.memory_mb_max
        ));
    }
    if requested_duration_minutes > budgets.duration_minutes_max {
        violations.push(format!(
            "requested duration {requested_duration_minutes}m exceeds cap {}m",
            budgets.duration_minutes_max
        ));
    }
    if recent_invocations_this_hour >= budgets.frequency_per_hour_max {
        violations.push(format!(
            "frequency {recent_invocations_this_hour}/hr reached cap {}/hr",
            budgets.frequency_per_hour_max
        ));
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(CoreError::BudgetExceeded(violations.join("; ")))
    }
}

/// Samples CPU and memory usage of the current process while a job runs,
/// enforcing `cpu_percent_max` / `memory_mb_max` / `duration_minutes_max`.
pub struct BudgetTracker {
    sys: System,
    pid: Pid,
    budgets: ResourceBudgets,
    started: Instant,
}

impl BudgetTracker {
    pub fn start(budgets: ResourceBudgets) -> Self {
        let pid = Pid::from_u32(std::process::id());
        let mut sys = System::new();
        sys.refresh_process(pid);
        Self {
            sys,
            pid,
            budgets,
            started: Instant::now(),
        }
    }

    /// Takes one sample and checks it against the caps. Returns a snapshot
    /// either way so the caller can log/audit the reading.
    pub fn check(&mut self) -> (BudgetSnapshot, Result<(), CoreError>) {
        self.sys.refresh_process(self.pid);
        let elapsed_seconds = self.started.elapsed().as_secs();
        let (cpu_percent, memory_mb) = match self.sys.process(self.pid) {
            Some(process) => (process.cpu_usage() as f64, process.memory() / 1024 / 1024),
            None => (0.0, 0),
        };

        let mut violations = Vec::new();
        if cpu_percent > self.budgets.cpu_percent_max {
            violations.push(format!(
                "cpu {cpu_percent:.1}% exceeds cap {:.1}%",
                self.budgets.cpu_percent_max
            ));
        }
        if memory_mb > self.budgets.memory_mb_max {
            violations.push(format!(
                "memory {memory_mb}MB exceeds cap {}MB",
                self.budgets.memory_mb_max
            ));
        }
        let elapsed_minutes = elapsed_seconds / 60;
        if elapsed_minutes > self.budgets.duration_minutes_max {
            violations.push(format!(
                "duration {elapsed_minutes}m exceeds cap {}m",
                self.budgets.duration_minutes_max
            ));
        }

        let within_budgets = violations.is_empty();
        let snapshot = BudgetSnapshot {
            timestamp: Utc::now(),
            cpu_percent,
            memory_mb,
            elapsed_seconds,
            within_budgets,
        };
        let result = if within_budgets {
            Ok(())
        } else {
            Err(CoreError::BudgetExceeded(violations.join("; ")))
        };
        (snapshot, result)
    }
}
