//! C5 — Policy Engine: declarative allow/deny evaluation of tool
//! invocations against a [`PolicyDocument`].

use cerebric_core::types::{PolicyConditions, PolicyDocument, ToolPolicy};
use glob::Pattern;

/// Inputs the policy's conditions are evaluated against. Fields absent from
/// `path`/`name` make the corresponding condition inapplicable rather than
/// a denial (per the specification's edge-case rule).
#[derive(Debug, Clone, Default)]
pub struct PolicyContext {
    pub current_user: String,
    pub current_host: String,
    /// Local time-of-day, minutes since midnight (0..1440).
    pub current_minute_of_day: u32,
    pub path: Option<String>,
    pub name: Option<String>,
}

/// Outcome of [`decide`].
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDecision {
    pub allow: bool,
    pub reason: String,
    pub simulation_required: bool,
    pub rollback_required: bool,
    pub approvals_needed: Vec<String>,
}

impl PolicyDecision {
    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            reason: reason.into(),
            simulation_required: false,
            rollback_required: false,
            approvals_needed: Vec::new(),
        }
    }

    fn allow(tool: &ToolPolicy, reason: impl Into<String>) -> Self {
        Self {
            allow: true,
            reason: reason.into(),
            simulation_required: tool.simulation_required,
            rollback_required: tool.rollback_required,
            approvals_needed: tool.approvals.clone(),
        }
    }
}

/// Evaluates `tool_name` against `policy` for the given context.
/// First rule to deny wins; otherwise allow. Read-only invocations
/// (`is_apply = false`) always bypass policy.
pub fn decide(
    policy: &PolicyDocument,
    tool_name: &str,
    is_apply: bool,
    context: &PolicyContext,
) -> PolicyDecision {
    if !is_apply {
        return PolicyDecision {
            allow: true,
            reason: "read-only invocation bypasses policy".to_string(),
            simulation_required: false,
            rollback_required: false,
            approvals_needed: Vec::new(),
        };
    }

    let default_tool = ToolPolicy::default();
    let tool = policy.tools.get(tool_name).unwrap_or(&default_tool);
    let allowed = tool.allow.unwrap_or(policy.default_allow);
    if !allowed {
        return PolicyDecision::deny(format!("tool '{tool_name}' is not allowed by policy"));
    }

    if let Some(reason) = evaluate_conditions(&tool.conditions, context) {
        return PolicyDecision::deny(reason);
    }

    PolicyDecision::allow(tool, format!("tool '{tool_name}' allowed by policy"))
}

/// Evaluates condition types in order, first failure wins. Returns `None`
/// when every applicable condition passes.
fn evaluate_conditions(conditions: &PolicyConditions, context: &PolicyContext) -> Option<String> {
    if let Some(users) = &conditions.users {
        if !users.iter().any(|u| u == &context.current_user) {
            return Some(format!("user '{}' not in allowed list", context.current_user));
        }
    }

    if let Some(hosts) = &conditions.hosts {
        let matches = hosts.iter().any(|pattern| glob_matches(pattern, &context.current_host));
        if !matches {
            return Some(format!("host '{}' matches no allowed glob", context.current_host));
        }
    }

    if let Some(ranges) = &conditions.hours_allow {
        let matches = ranges
            .iter()
            .any(|range| hour_range_contains(range, context.current_minute_of_day));
        if !matches {
            return Some("current time outside allowed hours".to_string());
        }
    }

    if let Some(path) = &context.path {
        if let Some(allow) = &conditions.paths_allow {
            if !allow.iter().any(|pattern| glob_matches(pattern, path)) {
                return Some(format!("path '{path}' matches no allowed glob"));
            }
        }
        if let Some(deny) = &conditions.paths_deny {
            if deny.iter().any(|pattern| glob_matches(pattern, path)) {
                return Some(format!("path '{path}' matches a deny glob"));
            }
        }
    }

    if let Some(name) = &context.name {
        if let Some(names) = &conditions.names_allow {
            if !names.iter().any(|n| n == name) {
                return Some(format!("name '{name}' not in allowed list"));
            }
        }
    }

    None
}

fn glob_matches(pattern: &str, value: &str) -> bool {
    match Pattern::new(pattern) {
        Ok(p) => p.matches(value),
        Err(error) => {
            tracing::warn!(%error, pattern, "invalid glob pattern, treating as non-match");
            false
        }
    }
}

/// Parses an "HH:MM-HH:MM" range and checks whether `minute_of_day` falls
/// within it, wrapping past midnight when start > end.
fn hour_range_contains(range: &str, minute_of_day: u32) -> bool {
    let Some((start, end)) = range.split_once('-') else {
        tracing::warn!(range, "malformed hours_allow range, ignoring");
        return false;
    };
    let (Some(start_min), Some(end_min)) = (parse_hhmm(start), parse_hhmm(end)) else {
        tracing::warn!(range, "malformed hours_allow range, ignoring");
        return false;
    };

    if start_min <= end_min {
        minute_of_day >= start_min && minute_of_day <= end_min
    } else {
        minute_of_day >= start_min || minute_of_day <= end_min
    }
}

fn parse_hhmm(s: &str) -> Option<u32> {
    let (h, m) = s.trim().split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}
