//! (d) Anomaly detection: rolling counters over consecutive failures, a
//! sliding-window error rate, and CPU/memory spikes.

use cerebric_core::error::CoreError;
use cerebric_core::types::{AnomalyEvent, AnomalyKind, Severity};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, Copy)]
pub struct AnomalyThresholds {
    pub repeated_failures: u32,
    pub error_rate_threshold: f64,
    pub cpu_spike_threshold: f64,
    pub memory_leak_mb: u64,
    /// Sliding window used for the error-rate and memory-growth rules.
    pub window: ChronoDuration,
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            repeated_failures: 3,
            error_rate_threshold: 0.5,
            cpu_spike_threshold: 90.0,
            memory_leak_mb: 512,
            window: ChronoDuration::hours(1),
        }
    }
}

struct Outcome {
    ts: DateTime<Utc>,
    success: bool,
}

struct MemorySample {
    ts: DateTime<Utc>,
    memory_mb: u64,
}

/// Tracks outcome history and metric samples, evaluating the four rules from
/// the guardrail specification on every observation.
pub struct AnomalyDetector {
    thresholds: AnomalyThresholds,
    consecutive_global_failures: u32,
    outcomes: VecDeque<Outcome>,
    memory_samples: VecDeque<MemorySample>,
}

impl AnomalyDetector {
    pub fn new(thresholds: AnomalyThresholds) -> Self {
        Self {
            thresholds,
            consecutive_global_failures: 0,
            outcomes: VecDeque::new(),
            memory_samples: VecDeque::new(),
        }
    }

    fn prune_window(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.thresholds.window;
        while matches!(self.outcomes.front(), Some(o) if o.ts < cutoff) {
            self.outcomes.pop_front();
        }
        while matches!(self.memory_samples.front(), Some(s) if s.ts < cutoff) {
            self.memory_samples.pop_front();
        }
    }

    /// Records a job outcome. P7: after `repeated_failures` consecutive
    /// `false` outcomes with no intervening success, this call raises
    /// [`CoreError::AnomalyDetected`].
    pub fn record_job_outcome(
        &mut self,
        success: bool,
        _job_id: &str,
    ) -> Result<(), CoreError> {
        let now = Utc::now();
        self.prune_window(now);
        self.outcomes.push_back(Outcome { ts: now, success });

        if success {
            self.consecutive_global_failures = 0;
        } else {
            self.consecutive_global_failures += 1;
        }

        if self.consecutive_global_failures >= self.thresholds.repeated_failures {
            return self.raise(
                AnomalyKind::RepeatedFailures,
                Severity::Critical,
                format!(
                    "{} consecutive job failures",
                    self.consecutive_global_failures
                ),
                BTreeMap::from([(
                    "consecutive_failures".to_string(),
                    self.consecutive_global_failures as f64,
                )]),
            );
        }

        let error_rate = self.current_error_rate();
        if error_rate >= self.thresholds.error_rate_threshold {
            return self.raise(
                AnomalyKind::ErrorRateExceeded,
                Severity::Error,
                format!("error rate {error_rate:.2} over window"),
                BTreeMap::from([("error_rate".to_string(), error_rate)]),
            );
        }

        Ok(())
    }

    fn current_error_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let failures = self.outcomes.iter().filter(|o| !o.success).count();
        failures as f64 / self.outcomes.len() as f64
    }

    /// Feeds a raw CPU sample (percent). Raises `cpu_spike` at `warning`
    /// severity when it reaches the configured threshold.
    pub fn record_cpu_sample(&mut self, cpu_percent: f64) -> Result<(), CoreError> {
        if cpu_percent >= self.thresholds.cpu_spike_threshold {
            return self.raise(
                AnomalyKind::CpuSpike,
                Severity::Warning,
                format!("cpu sample {cpu_percent:.1}% reached spike threshold"),
                BTreeMap::from([("cpu_percent".to_string(), cpu_percent)]),
            );
        }
        Ok(())
    }

    /// Feeds a raw memory sample (MB). Raises `memory_leak` at `warning`
    /// severity when growth across the window reaches the configured cap.
    pub fn record_memory_sample(&mut self, memory_mb: u64) -> Result<(), CoreError> {
        let now = Utc::now();
        self.prune_window(now);
        self.memory_samples.push_back(MemorySample { ts: now, memory_mb });

        let growth = match self.memory_samples.front() {
            Some(first) => memory_mb.saturating_sub(first.memory_mb),
            None => 0,
        };
        if growth >= self.thresholds.memory_leak_mb {
            return self.raise(
                AnomalyKind::MemoryLeak,
                Severity::Warning,
                format!("memory grew {growth}MB over window"),
                BTreeMap::from([("growth_mb".to_string(), growth as f64)]),
            );
        }
        Ok(())
    }

    fn raise(
        &self,
        kind: AnomalyKind,
        severity: Severity,
        description: String,
        metrics: BTreeMap<String, f64>,
    ) -> Result<(), CoreError> {
        let event = AnomalyEvent {
            kind,
            severity,
            description,
            metrics,
            timestamp: Utc::now(),
        };
        tracing::error!(?event, "anomaly detected");
        Err(CoreError::AnomalyDetected(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_failures_raises_on_nth_call() {
        let mut detector = AnomalyDetector::new(AnomalyThresholds {
            repeated_failures: 3,
            ..AnomalyThresholds::default()
        });
        assert!(detector.record_job_outcome(false, "j1").is_ok());
        assert!(detector.record_job_outcome(false, "j1").is_ok());
        let err = detector.record_job_outcome(false, "j1").unwrap_err();
        match err {
            CoreError::AnomalyDetected(event) => {
                assert_eq!(event.kind, AnomalyKind::RepeatedFailures);
                assert_eq!(event.severity, Severity::Critical);
            }
            other => panic!("expected AnomalyDetected, got {other:?}"),
        }
    }

    #[test]
    fn test_success_resets_consecutive_counter() {
        let mut detector = AnomalyDetector::new(AnomalyThresholds {
            repeated_failures: 2,
            error_rate_threshold: 1.1, // disable error-rate rule for this test
            ..AnomalyThresholds::default()
        });
        assert!(detector.record_job_outcome(false, "j1").is_ok());
        assert!(detector.record_job_outcome(true, "j1").is_ok());
        assert!(detector.record_job_outcome(false, "j1").is_ok());
    }

    #[test]
    fn test_cpu_spike_raises_warning() {
        let mut detector = AnomalyDetector::new(AnomalyThresholds::default());
        let err = detector.record_cpu_sample(95.0).unwrap_err();
        match err {
            CoreError::AnomalyDetected(event) => {
                assert_eq!(event.kind, AnomalyKind::CpuSpike);
                assert_eq!(event.severity, Severity::Warning);
            }
            other => panic!("expected AnomalyDetected, got {other:?}"),
        }
    }

    #[test]
    fn test_cpu_below_threshold_is_ok() {
        let mut detector = AnomalyDetector::new(AnomalyThresholds::default());
        assert!(detector.record_cpu_sample(10.0).is_ok());
    }

    #[test]
    fn test_memory_leak_raises_on_growth() {
        let mut detector = AnomalyDetector::new(AnomalyThresholds {
            memory_leak_mb: 100,
            ..AnomalyThresholds::default()
        });
        assert!(detector.record_memory_sample(200).is_ok());
        let err = detector.record_memory_sample(310).unwrap_err();
        match err {
            CoreError::AnomalyDetected(event) => assert_eq!(event.kind, AnomalyKind::MemoryLeak),
            other => panic!("expected AnomalyDetected, got {other:?}"),
        }
    }

    #[test]
    fn test_error_rate_rule_triggers_before_repeated_failures() {
        let mut detector = AnomalyDetector::new(AnomalyThresholds {
            repeated_failures: 100,
            error_rate_threshold: 0.5,
            ..AnomalyThresholds::default()
        });
        assert!(detector.record_job_outcome(true, "j1").is_ok());
        let err = detector.record_job_outcome(false, "j1").unwrap_err();
        match err {
            CoreError::AnomalyDetected(event) => {
                assert_eq!(event.kind, AnomalyKind::ErrorRateExceeded)
            }
            other => panic!("expected AnomalyDetected, got {other:?}"),
        }
    }
}
