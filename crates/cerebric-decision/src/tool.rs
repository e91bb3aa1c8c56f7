//! External `Tool` interface (§6), invoked by the Decision Loop at step 9.

use async_trait::async_trait;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct ToolRequest {
    pub tool: String,
    pub version: Option<String>,
    pub dry_run: bool,
    pub confirm: bool,
    pub request_id: String,
    pub inputs: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct ToolResponse {
    pub request_id: String,
    pub ok: bool,
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
    pub outputs: BTreeMap<String, serde_json::Value>,
}

/// One invocable unit of work. Side-effecting tools (`side_effects() ==
/// true`) MUST gate their apply path on `confirm && !dry_run` — the Decision
/// Loop relies on this to make dry-run calls (simulation, budget pre-checks)
/// safe to issue without a prior approval.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn side_effects(&self) -> bool;
    async fn execute(&self, request: ToolRequest) -> ToolResponse;
}
