//! Loads the declarative Policy Document (§6: YAML, top-level
//! `default_allow` + `tools`) from disk.

use anyhow::{Context, Result};
use cerebric_core::types::PolicyDocument;
use std::path::Path;

/// Loads a policy document; a missing file yields the all-defaults policy
/// (`default_allow = true`, no per-tool entries) rather than an error, so a
/// fresh install runs permissively until the operator writes one.
pub fn load_policy(path: &Path) -> Result<PolicyDocument> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no policy file found, using default-allow policy");
        return Ok(PolicyDocument::default());
    }
    let contents = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&contents).with_context(|| format!("parsing policy document {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_policy_defaults_to_allow() {
        let dir = tempdir().unwrap();
        let policy = load_policy(&dir.path().join("policy.yaml")).unwrap();
        assert!(policy.default_allow);
        assert!(policy.tools.is_empty());
    }

    #[test]
    fn test_parses_tool_conditions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("policy.yaml");
        std::fs::write(
            &path,
            r#"
default_allow: true
tools:
  write_config:
    allow: true
    simulation_required: true
    rollback_required: true
    conditions:
      paths_allow:
        - "/etc/cerebric/*"
"#,
        )
        .unwrap();
        let policy = load_policy(&path).unwrap();
        let tool = policy.tools.get("write_config").unwrap();
        assert_eq!(tool.allow, Some(true));
        assert!(tool.simulation_required);
        assert_eq!(tool.conditions.paths_allow.as_ref().unwrap()[0], "/etc/cerebric/*");
    }

    #[test]
    fn test_invalid_yaml_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("policy.yaml");
        std::fs::write(&path, "default_allow: [not a bool").unwrap();
        assert!(load_policy(&path).is_err());
    }
}
