//! Runtime configuration: TOML document controlling guardrail thresholds,
//! scheduler concurrency, and approval behaviour. Loaded from
//! `<config-dir>/cerebric.toml`; every section has defaults so a missing
//! file (or a partially-specified one) still produces a usable config.

use anyhow::{Context, Result};
use cerebric_core::types::ResourceBudgets;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub confidence: ConfidenceConfig,
    #[serde(default)]
    pub budgets: ResourceBudgets,
    #[serde(default)]
    pub anomalies: AnomalyConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub approval: ApprovalConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            confidence: ConfidenceConfig::default(),
            budgets: ResourceBudgets::default(),
            anomalies: AnomalyConfig::default(),
            scheduler: SchedulerConfig::default(),
            approval: ApprovalConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceConfig {
    #[serde(default = "default_min_auto")]
    pub min_auto_execute: f64,
    #[serde(default = "default_min_approval")]
    pub min_approval_execute: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            min_auto_execute: default_min_auto(),
            min_approval_execute: default_min_approval(),
        }
    }
}

fn default_min_auto() -> f64 {
    0.80
}

fn default_min_approval() -> f64 {
    0.50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    #[serde(default = "default_repeated_failures")]
    pub repeated_failures: u32,
    #[serde(default = "default_error_rate_threshold")]
    pub error_rate_threshold: f64,
    #[serde(default = "default_cpu_spike_threshold")]
    pub cpu_spike_threshold: f64,
    #[serde(default = "default_memory_leak_mb")]
    pub memory_leak_mb: u64,
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            repeated_failures: default_repeated_failures(),
            error_rate_threshold: default_error_rate_threshold(),
            cpu_spike_threshold: default_cpu_spike_threshold(),
            memory_leak_mb: default_memory_leak_mb(),
            window_minutes: default_window_minutes(),
        }
    }
}

fn default_repeated_failures() -> u32 {
    3
}
fn default_error_rate_threshold() -> f64 {
    0.5
}
fn default_cpu_spike_threshold() -> f64 {
    90.0
}
fn default_memory_leak_mb() -> u64 {
    512
}
fn default_window_minutes() -> i64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: default_worker_pool_size(),
            poll_interval_seconds: default_poll_interval_seconds(),
        }
    }
}

fn default_worker_pool_size() -> usize {
    5
}
fn default_poll_interval_seconds() -> u64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    #[serde(default = "default_approval_mode")]
    pub mode: String,
    #[serde(default = "default_approval_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            mode: default_approval_mode(),
            timeout_seconds: default_approval_timeout_seconds(),
        }
    }
}

fn default_approval_mode() -> String {
    "cli".to_string()
}
fn default_approval_timeout_seconds() -> u64 {
    300
}

impl RuntimeConfig {
    /// Loads from `path`; returns the all-defaults config if the file does
    /// not exist (a fresh install has no config yet).
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no runtime config found, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }
}
