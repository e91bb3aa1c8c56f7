use clap::{Parser, Subcommand};

/// Build version string combining Cargo.toml version and git describe.
fn build_version() -> &'static str {
    static VERSION: std::sync::OnceLock<String> = std::sync::OnceLock::new();
    VERSION.get_or_init(|| {
        let cargo_ver = env!("CARGO_PKG_VERSION");
        let git_desc = env!("CEREBRIC_GIT_DESCRIBE");
        if git_desc.is_empty() {
            cargo_ver.to_string()
        } else {
            format!("{cargo_ver} ({git_desc})")
        }
    })
}

#[derive(Parser)]
#[command(name = "cerebric", version = build_version())]
#[command(about = "Local-first autonomous agent supervisor")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage scheduled jobs
    Scheduler {
        #[command(subcommand)]
        cmd: SchedulerCommands,
    },
    /// Inspect pending and decided approval requests
    Approval {
        #[command(subcommand)]
        cmd: ApprovalCommands,
    },
    /// Safe-mode lifecycle (the "autonomy" surface)
    Autonomy {
        #[command(subcommand)]
        cmd: AutonomyCommands,
    },
    /// Evaluate or inspect the policy document
    Policy {
        #[command(subcommand)]
        cmd: PolicyCommands,
    },
    /// Inspect and manage the memory store
    Memory {
        #[command(subcommand)]
        cmd: MemoryCommands,
    },
}

#[derive(Subcommand)]
pub enum SchedulerCommands {
    /// Register a cron-triggered job
    AddCron {
        id: String,
        task: String,
        /// Five/six-field cron expression, UTC
        cron_expr: String,
        #[arg(long, default_value_t = 3)]
        max_retries: u32,
        #[arg(long, default_value_t = 60)]
        timeout_seconds: u64,
        #[arg(long)]
        description: Option<String>,
    },
    /// Register a one-shot job firing at an absolute UTC instant (RFC3339)
    AddOnce {
        id: String,
        task: String,
        at: String,
        #[arg(long, default_value_t = 3)]
        max_retries: u32,
        #[arg(long, default_value_t = 60)]
        timeout_seconds: u64,
    },
    /// List jobs, optionally filtered by state
    List {
        #[arg(long)]
        state: Option<String>,
    },
    /// Cancel a pending or running job (does not interrupt an in-flight run)
    Cancel { id: String },
    /// Show aggregate counts by state plus safe-mode status
    Status,
}

#[derive(Subcommand)]
pub enum ApprovalCommands {
    /// List requests still awaiting a decision
    ListPending,
    /// Show a single request by id
    Show { id: String },
}

#[derive(Subcommand)]
pub enum AutonomyCommands {
    /// Report whether safe-mode is currently active
    Status,
    /// Force safe-mode on, e.g. during an incident
    Enter { reason: String },
    /// Clear safe-mode; subsequent job firings resume normal dispatch
    Exit {
        /// Operator identity recorded in the audit trail
        #[arg(long, default_value = "cli-operator")]
        user: String,
    },
}

#[derive(Subcommand)]
pub enum PolicyCommands {
    /// Print the loaded policy document
    Show,
    /// Evaluate a tool invocation against the policy document
    Check {
        tool: String,
        #[arg(long)]
        apply: bool,
        #[arg(long)]
        path: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum MemoryCommands {
    /// List entries in a partition/name pair
    List {
        /// core | runtime | shared | profile:<name>
        partition: String,
        name: String,
    },
    /// Purge a partition/name pair (refused on protected partitions)
    Purge { partition: String, name: String },
    /// Export a partition/name pair as newline-delimited JSON
    Export { partition: String, name: String },
}
