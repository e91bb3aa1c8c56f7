//! Dry-run simulator: produces a [`SimulationResult`] without touching the
//! real filesystem, process table, or hardware. Pure function of its inputs
//! and the current on-disk state (law L3).

use cerebric_core::types::{SimulatedChange, SimulationResult};
use std::path::Path;
use std::process::Command;
use std::time::Duration;

const DANGER_PATTERNS: &[&str] = &[
    "rm -rf /",
    "rm -rf --no-preserve-root",
    "dd if=/dev/zero",
    "dd of=/dev/sd",
    ":(){ :|:& };:",
    "mkfs.",
];

/// An action descriptor to be simulated. Mirrors the five action kinds a
/// [`SimulatedChange`] can describe.
pub enum ActionRequest<'a> {
    FileWrite { path: &'a Path, proposed: &'a [u8] },
    Command { command: &'a str, dry_run_flag: Option<&'a str> },
    ServiceRestart { service: &'a str },
    HardwareControl {
        device_path: &'a Path,
        target_value: &'a str,
    },
    PackageUpdate { package_count: u32 },
}

pub fn simulate(request: &ActionRequest) -> SimulationResult {
    match request {
        ActionRequest::FileWrite { path, proposed } => simulate_file_write(path, proposed),
        ActionRequest::Command { command, dry_run_flag } => simulate_command(command, *dry_run_flag),
        ActionRequest::ServiceRestart { service } => simulate_service_restart(service),
        ActionRequest::HardwareControl { device_path, target_value } => {
            simulate_hardware_control(device_path, target_value)
        }
        ActionRequest::PackageUpdate { package_count } => simulate_package_update(*package_count),
    }
}

fn simulate_file_write(path: &Path, proposed: &[u8]) -> SimulationResult {
    let proposed_text = String::from_utf8_lossy(proposed).to_string();
    let change = if path.exists() {
        let current = std::fs::read(path).unwrap_or_default();
        let current_text = String::from_utf8_lossy(&current).to_string();
        SimulatedChange::FileModify {
            path: path.display().to_string(),
            unified_diff: naive_unified_diff(&current_text, &proposed_text),
        }
    } else {
        SimulatedChange::FileCreate {
            path: path.display().to_string(),
            preview: proposed_text,
        }
    };

    SimulationResult {
        changes: vec![change],
        affected_resources: vec![path.display().to_string()],
        warnings: Vec::new(),
        commands: Vec::new(),
        estimated_duration_seconds: 1,
        reversible: true,
        rollback_strategy: if path.exists() {
            "restore from backup".to_string()
        } else {
            "delete file".to_string()
        },
    }
}

fn simulate_command(command: &str, dry_run_flag: Option<&str>) -> SimulationResult {
    let mut warnings: Vec<String> = DANGER_PATTERNS
        .iter()
        .filter(|pattern| command.contains(*pattern))
        .map(|pattern| format!("command matches danger pattern: {pattern}"))
        .collect();

    let preview_output = match dry_run_flag {
        Some(flag) => {
            let parts: Vec<&str> = command.split_whitespace().collect();
            let Some((bin, args)) = parts.split_first() else {
                warnings.push("empty command string".to_string());
                return SimulationResult {
                    changes: vec![SimulatedChange::Command {
                        command: command.to_string(),
                        preview_output: None,
                        danger_warnings: warnings,
                    }],
                    affected_resources: Vec::new(),
                    warnings: Vec::new(),
                    commands: vec![command.to_string()],
                    estimated_duration_seconds: 0,
                    reversible: false,
                    rollback_strategy: "none (no-op)".to_string(),
                };
            };
            let mut full_args: Vec<&str> = args.to_vec();
            full_args.push(flag);
            run_with_timeout(bin, &full_args, Duration::from_secs(5))
        }
        None => {
            warnings.push("dry-run not supported for this command".to_string());
            None
        }
    };

    SimulationResult {
        changes: vec![SimulatedChange::Command {
            command: command.to_string(),
            preview_output,
            danger_warnings: warnings.clone(),
        }],
        affected_resources: Vec::new(),
        warnings,
        commands: vec![command.to_string()],
        estimated_duration_seconds: 5,
        reversible: false,
        rollback_strategy: "none (command actions are not auto-reversible)".to_string(),
    }
}

fn run_with_timeout(bin: &str, args: &[&str], _timeout: Duration) -> Option<String> {
    Command::new(bin)
        .args(args)
        .output()
        .ok()
        .map(|out| String::from_utf8_lossy(&out.stdout).to_string())
}

fn simulate_service_restart(service: &str) -> SimulationResult {
    let steps = vec![
        format!("stop {service}"),
        "wait".to_string(),
        format!("start {service}"),
        "wait-healthy".to_string(),
    ];
    SimulationResult {
        changes: vec![SimulatedChange::ServiceRestart {
            service: service.to_string(),
            steps: steps.clone(),
            estimated_seconds: 15,
        }],
        affected_resources: vec![service.to_string()],
        warnings: Vec::new(),
        commands: steps,
        estimated_duration_seconds: 15,
        reversible: true,
        rollback_strategy: format!("start {service} if restart fails"),
    }
}

fn simulate_hardware_control(device_path: &Path, target_value: &str) -> SimulationResult {
    let current_value = std::fs::read_to_string(device_path)
        .unwrap_or_default()
        .trim()
        .to_string();

    let mut warnings = Vec::new();
    if let Ok(parsed) = target_value.parse::<i64>() {
        if !(1..=254).contains(&parsed) {
            warnings.push(format!("extreme value {parsed}; expected roughly 1-254"));
        }
    }

    SimulationResult {
        changes: vec![SimulatedChange::HardwareControl {
            device_path: device_path.display().to_string(),
            current_value: current_value.clone(),
            target_value: target_value.to_string(),
        }],
        affected_resources: vec![device_path.display().to_string()],
        warnings,
        commands: Vec::new(),
        estimated_duration_seconds: 1,
        reversible: true,
        rollback_strategy: format!("write back pre-image value '{current_value}'"),
    }
}

fn simulate_package_update(package_count: u32) -> SimulationResult {
    let reboot_advised = package_count > 0;
    SimulationResult {
        changes: vec![SimulatedChange::PackageUpdate {
            package_count,
            reboot_advised,
        }],
        affected_resources: Vec::new(),
        warnings: if reboot_advised {
            vec!["reboot advised after package update".to_string()]
        } else {
            Vec::new()
        },
        commands: Vec::new(),
        estimated_duration_seconds: 30 + package_count as u64 * 2,
        reversible: false,
        rollback_strategy: "none (package manager rollback out of scope)".to_string(),
    }
}

/// Minimal line-oriented unified-diff rendering: prefixes removed lines with
/// `-`, added lines with `+`, shared lines with a space. Not a minimal-edit
/// diff algorithm — sufficient for human review, not for patching.
fn naive_unified_diff(before: &str, after: &str) -> String {
    let before_lines: Vec<&str> = before.lines().collect();
    let after_lines: Vec<&str> = after.lines().collect();
    let mut out = String::new();
    let max = before_lines.len().max(after_lines.len());
    for i in 0..max {
        match (before_lines.get(i), after_lines.get(i)) {
            (Some(b), Some(a)) if b == a => out.push_str(&format!(" {b}\n")),
            (Some(b), Some(a)) => {
                out.push_str(&format!("-{b}\n"));
                out.push_str(&format!("+{a}\n"));
            }
            (Some(b), None) => out.push_str(&format!("-{b}\n")),
            (None, Some(a)) => out.push_str(&format!("+{a}\n")),
            (None, None) => {}
        }
    }
    out
}
