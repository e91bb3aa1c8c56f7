use anyhow::Result;
use clap::Parser;
use std::sync::Arc;

mod cli;
mod commands;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();

    let config_dir = cerebric_config::config_dir();
    let data_dir = cerebric_config::data_dir();
    let audit = Arc::new(cerebric_audit::AuditLog::new(data_dir.join("audit")));

    let result = match cli.command {
        Commands::Scheduler { cmd } => commands::scheduler(cmd, &data_dir, audit).await,
        Commands::Approval { cmd } => commands::approval(cmd, &data_dir),
        Commands::Autonomy { cmd } => commands::autonomy(cmd, &data_dir, &audit),
        Commands::Policy { cmd } => commands::policy(cmd, &config_dir),
        Commands::Memory { cmd } => commands::memory(cmd, &data_dir),
    };

    if let Err(error) = &result {
        eprintln!("error: {error:#}");
    }
    result
}
