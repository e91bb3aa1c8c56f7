//! Shared audit record shape. The append-only writer lives in `cerebric-audit`;
//! this module only defines the wire format so every crate can construct
//! records without depending on the writer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One line of the append-only audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub tool: String,
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
    pub ts: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(tool: impl Into<String>, mode: impl Into<String>, ok: bool) -> Self {
        Self {
            tool: tool.into(),
            mode: mode.into(),
            request_id: None,
            ok,
            summary: None,
            fields: BTreeMap::new(),
            ts: Utc::now(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(key.into(), v);
        }
        self
    }
}
