use crate::cli::{ApprovalCommands, AutonomyCommands, MemoryCommands, PolicyCommands, SchedulerCommands};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use cerebric_approval::ApprovalStore;
use cerebric_audit::AuditLog;
use cerebric_core::error::CoreError;
use cerebric_core::types::{Job, JobState, Trigger};
use cerebric_guardrails::SafeMode;
use cerebric_memory::{MemoryStore, Partition};
use cerebric_scheduler::{JobExecutor, Scheduler};
use chrono::{DateTime, Timelike, Utc};
use std::sync::Arc;

/// A job's underlying task is never invoked from the CLI — commands only
/// add/list/cancel/inspect job records, they never run the worker loop.
struct UnusedExecutor;

#[async_trait]
impl JobExecutor for UnusedExecutor {
    async fn execute(&self, _job: Job) -> Result<(), CoreError> {
        unreachable!("the CLI never dispatches jobs, it only manages their records")
    }
}

fn parse_partition(raw: &str) -> Result<Partition> {
    match raw {
        "core" => Ok(Partition::Core),
        "runtime" => Ok(Partition::Runtime),
        "shared" => Ok(Partition::Shared),
        other => match other.strip_prefix("profile:") {
            Some(name) if !name.is_empty() => Ok(Partition::Profile(name.to_string())),
            _ => bail!("unrecognized partition '{other}' (expected core, runtime, shared, or profile:<name>)"),
        },
    }
}

fn parse_job_state(raw: &str) -> Result<JobState> {
    Ok(match raw {
        "pending" => JobState::Pending,
        "running" => JobState::Running,
        "completed" => JobState::Completed,
        "failed" => JobState::Failed,
        "cancelled" => JobState::Cancelled,
        "skipped" => JobState::Skipped,
        "rejected" => JobState::Rejected,
        other => bail!("unrecognized job state '{other}'"),
    })
}

pub async fn scheduler(cmd: SchedulerCommands, data_dir: &std::path::Path, audit: Arc<AuditLog>) -> Result<()> {
    let scheduler = Scheduler::new(data_dir.join("scheduler"), audit, Arc::new(UnusedExecutor), 1)?;
    match cmd {
        SchedulerCommands::AddCron {
            id,
            task,
            cron_expr,
            max_retries,
            timeout_seconds,
            description,
        } => {
            let mut job = Job::new(id.as_str(), task.as_str(), Trigger::Cron(cron_expr));
            job.max_retries = max_retries;
            job.timeout_seconds = timeout_seconds;
            job.description = description;
            scheduler.add_job(job).await?;
            println!("scheduled cron job '{id}'");
        }
        SchedulerCommands::AddOnce {
            id,
            task,
            at,
            max_retries,
            timeout_seconds,
        } => {
            let at: DateTime<Utc> = DateTime::parse_from_rfc3339(&at)
                .with_context(|| format!("parsing '{at}' as RFC3339"))?
                .with_timezone(&Utc);
            let mut job = Job::new(id.as_str(), task.as_str(), Trigger::At(at));
            job.max_retries = max_retries;
            job.timeout_seconds = timeout_seconds;
            scheduler.add_job(job).await?;
            println!("scheduled one-shot job '{id}' at {at}");
        }
        SchedulerCommands::List { state } => {
            let state = state.as_deref().map(parse_job_state).transpose()?;
            for job in scheduler.list_jobs(state).await {
                println!("{:<16} {:<10} priority={} task={}", job.id, job.state, job.priority, job.task);
            }
        }
        SchedulerCommands::Cancel { id } => {
            if scheduler.cancel_job(&id).await {
                println!("cancelled '{id}'");
            } else {
                bail!("job '{id}' not found or already terminal");
            }
        }
        SchedulerCommands::Status => {
            let status = scheduler.status().await;
            println!(
                "pending={} running={} completed={} failed={} cancelled={} skipped={} rejected={} safe_mode_active={}",
                status.pending,
                status.running,
                status.completed,
                status.failed,
                status.cancelled,
                status.skipped,
                status.rejected,
                status.safe_mode_active,
            );
        }
    }
    Ok(())
}

pub fn approval(cmd: ApprovalCommands, data_dir: &std::path::Path) -> Result<()> {
    let store = ApprovalStore::new(data_dir.join("approval"))?;
    match cmd {
        ApprovalCommands::ListPending => {
            for request in store.list_pending()? {
                println!("{:<16} action={} risk={:?} confidence={:.2}", request.id, request.action, request.risk_level, request.confidence);
            }
        }
        ApprovalCommands::Show { id } => {
            let request = store.load_request(&id)?;
            println!("{}", serde_json::to_string_pretty(&request)?);
        }
    }
    Ok(())
}

pub fn autonomy(cmd: AutonomyCommands, data_dir: &std::path::Path, audit: &AuditLog) -> Result<()> {
    let safe_mode = SafeMode::new(data_dir.join("safe_mode_active.flag"));
    match cmd {
        AutonomyCommands::Status => {
            println!("safe_mode_active={}", safe_mode.is_safe_mode_active());
        }
        AutonomyCommands::Enter { reason } => {
            safe_mode.enter_safe_mode(&reason, audit);
            println!("safe-mode entered: {reason}");
        }
        AutonomyCommands::Exit { user } => {
            safe_mode.exit_safe_mode(&user, audit);
            println!("safe-mode exited by {user}");
        }
    }
    Ok(())
}

pub fn policy(cmd: PolicyCommands, config_dir: &std::path::Path) -> Result<()> {
    let policy_path = config_dir.join("policy.yaml");
    let document = cerebric_config::load_policy(&policy_path)?;
    match cmd {
        PolicyCommands::Show => {
            println!("{}", serde_yaml::to_string(&document)?);
        }
        PolicyCommands::Check { tool, apply, path, name } => {
            let now = chrono::Local::now();
            let context = cerebric_policy::PolicyContext {
                current_user: std::env::var("USER").unwrap_or_else(|_| "unknown".to_string()),
                current_host: std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string()),
                current_minute_of_day: now.hour() * 60 + now.minute(),
                path,
                name,
            };
            let decision = cerebric_policy::decide(&document, &tool, apply, &context);
            println!(
                "allow={} reason=\"{}\" simulation_required={} rollback_required={} approvals_needed={:?}",
                decision.allow, decision.reason, decision.simulation_required, decision.rollback_required, decision.approvals_needed,
            );
        }
    }
    Ok(())
}

pub fn memory(cmd: MemoryCommands, data_dir: &std::path::Path) -> Result<()> {
    let store = MemoryStore::new(data_dir.join("memory"));
    match cmd {
        MemoryCommands::List { partition, name } => {
            let partition = parse_partition(&partition)?;
            for entry in store.list_entries(&partition, &name, None)? {
                println!("{entry}");
            }
        }
        MemoryCommands::Purge { partition, name } => {
            let partition = parse_partition(&partition)?;
            store.purge(&partition, &name)?;
            println!("purged {partition}/{name}");
        }
        MemoryCommands::Export { partition, name } => {
            let partition = parse_partition(&partition)?;
            print!("{}", store.export(&partition, &name)?);
        }
    }
    Ok(())
}
