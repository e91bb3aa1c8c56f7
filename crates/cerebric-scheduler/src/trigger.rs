//! Resolves a [`Trigger`] to its next UTC fire time.

use cerebric_core::types::Trigger;
use chrono::{DateTime, Utc};
use croner::Cron;

#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("invalid cron expression '{0}': {1}")]
    InvalidCron(String, String),
}

/// Computes the next fire time. For `Cron`, this is the next occurrence
/// strictly after `after`. For a one-shot `At` trigger, `after` does not
/// apply: the instant itself is always returned, whether it lies in the
/// future or has already passed. A one-shot only fires once because the
/// scheduler only considers jobs still in `JobState::Pending` due
/// (`due_job_ids`) — once it fires the job leaves `Pending`, not because
/// this function stops reporting the instant. A pending one-shot whose
/// instant is already behind `after` (e.g. scheduled for "now" or for a
/// moment slightly before its own `created_at`) must still be reported due,
/// not dropped.
pub fn next_fire_after(trigger: &Trigger, after: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, TriggerError> {
    match trigger {
        Trigger::Cron(expr) => {
            let cron = Cron::new(expr)
                .parse()
                .map_err(|e| TriggerError::InvalidCron(expr.clone(), e.to_string()))?;
            let next = cron
                .find_next_occurrence(&after, false)
                .map_err(|e| TriggerError::InvalidCron(expr.clone(), e.to_string()))?;
            Ok(Some(next))
        }
        Trigger::At(instant) => Ok(Some(*instant)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_at_trigger_fires_once_in_future() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let instant = Utc.with_ymd_and_hms(2026, 1, 1, 1, 0, 0).unwrap();
        let trigger = Trigger::At(instant);
        assert_eq!(next_fire_after(&trigger, now).unwrap(), Some(instant));
    }

    #[test]
    fn test_at_trigger_still_due_once_past_reference() {
        // A one-shot whose instant is behind `after` (e.g. the job's own
        // `created_at`, used as the initial reference) must still report
        // due — exhaustion is the scheduler's job, via job state, not this
        // function's.
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 2, 0, 0).unwrap();
        let instant = Utc.with_ymd_and_hms(2026, 1, 1, 1, 0, 0).unwrap();
        let trigger = Trigger::At(instant);
        assert_eq!(next_fire_after(&trigger, after).unwrap(), Some(instant));
    }

    #[test]
    fn test_cron_trigger_computes_next_occurrence() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let trigger = Trigger::Cron("0 * * * *".to_string());
        let next = next_fire_after(&trigger, now).unwrap().unwrap();
        assert_eq!(next.format("%M").to_string(), "00");
        assert!(next > now);
    }

    #[test]
    fn test_invalid_cron_expression_errors() {
        let trigger = Trigger::Cron("not a cron".to_string());
        assert!(next_fire_after(&trigger, Utc::now()).is_err());
    }
}
