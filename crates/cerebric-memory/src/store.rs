//! C2 — Memory Store: append-only JSONL per-partition memory.

use crate::partition::Partition;
use anyhow::{Context, Result};
use cerebric_core::error::CoreError;
use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub struct MemoryStore {
    base_dir: PathBuf,
}

impl MemoryStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn file_path(&self, partition: &Partition, name: &str) -> PathBuf {
        self.base_dir.join(partition.dir_name()).join(format!("{name}.jsonl"))
    }

    /// Appends one JSON object. Stamps a `ts` field onto the object if one
    /// is not already present, so every record carries a mandatory
    /// ISO-8601 timestamp.
    pub fn append(&self, partition: &Partition, name: &str, mut entry: serde_json::Value) -> Result<()> {
        if let serde_json::Value::Object(map) = &mut entry {
            map.entry("ts").or_insert_with(|| serde_json::Value::String(Utc::now().to_rfc3339()));
        }
        let path = self.file_path(partition, name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        writeln!(file, "{}", serde_json::to_string(&entry)?)?;
        file.flush()?;
        Ok(())
    }

    /// Lists all entries in a partition file, optionally filtered by a
    /// minimum `ts`. An empty or missing partition file returns an empty
    /// list, never an error.
    pub fn list_entries(
        &self,
        partition: &Partition,
        name: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<serde_json::Value>> {
        let path = self.file_path(partition, name);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&path)?;
        let mut entries = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<serde_json::Value>(line) {
                Ok(value) => {
                    if let Some(since) = since {
                        let ts = value.get("ts").and_then(|v| v.as_str()).and_then(|s| {
                            DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
                        });
                        if ts.is_some_and(|ts| ts < since) {
                            continue;
                        }
                    }
                    entries.push(value);
                }
                Err(error) => {
                    tracing::warn!(%error, path = %path.display(), line_number = idx + 1, "skipping corrupt memory line");
                }
            }
        }
        Ok(entries)
    }

    /// Deletes a partition's entries for `name`. Refuses on protected
    /// partitions (`core`, the default administrative profile).
    pub fn purge(&self, partition: &Partition, name: &str) -> Result<(), CoreError> {
        if partition.is_protected() {
            return Err(CoreError::ProtectedPartition(partition.to_string()));
        }
        let path = self.file_path(partition, name);
        if path.exists() {
            let _ = fs::remove_file(&path);
        }
        Ok(())
    }

    /// Exports a partition file verbatim, for backup/inspection.
    pub fn export(&self, partition: &Partition, name: &str) -> Result<String> {
        let path = self.file_path(partition, name);
        if !path.exists() {
            return Ok(String::new());
        }
        Ok(fs::read_to_string(&path)?)
    }

    /// Rewrites all entries atomically, used by consolidation/GC passes.
    pub fn rewrite_all(&self, partition: &Partition, name: &str, entries: &[serde_json::Value]) -> Result<()> {
        let path = self.file_path(partition, name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("jsonl.tmp");
        let mut writer = BufWriter::new(fs::File::create(&tmp_path)?);
        for entry in entries {
            writeln!(writer, "{}", serde_json::to_string(entry)?)?;
        }
        writer.flush()?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_append_then_list() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new(dir.path());
        store.append(&Partition::Runtime, "outcomes", json!({"job_id": "j1"})).unwrap();
        let entries = store.list_entries(&Partition::Runtime, "outcomes", None).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].get("ts").is_some());
    }

    #[test]
    fn test_append_preserves_explicit_ts() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new(dir.path());
        store
            .append(&Partition::Runtime, "outcomes", json!({"ts": "2020-01-01T00:00:00Z"}))
            .unwrap();
        let entries = store.list_entries(&Partition::Runtime, "outcomes", None).unwrap();
        assert_eq!(entries[0]["ts"], "2020-01-01T00:00:00Z");
    }

    #[test]
    fn test_empty_partition_returns_empty_list_not_error() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new(dir.path());
        let entries = store.list_entries(&Partition::Shared, "profile", None).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_purge_protected_core_partition_fails() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new(dir.path());
        store.append(&Partition::Core, "facts", json!({"k": "v"})).unwrap();
        let err = store.purge(&Partition::Core, "facts").unwrap_err();
        assert!(matches!(err, CoreError::ProtectedPartition(_)));
    }

    #[test]
    fn test_purge_runtime_partition_succeeds() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new(dir.path());
        store.append(&Partition::Runtime, "outcomes", json!({"k": "v"})).unwrap();
        store.purge(&Partition::Runtime, "outcomes").unwrap();
        let entries = store.list_entries(&Partition::Runtime, "outcomes", None).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_corrupt_line_is_skipped() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new(dir.path());
        store.append(&Partition::Runtime, "outcomes", json!({"k": 1})).unwrap();
        let path = dir.path().join("runtime/outcomes.jsonl");
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "not json").unwrap();
        store.append(&Partition::Runtime, "outcomes", json!({"k": 2})).unwrap();

        let entries = store.list_entries(&Partition::Runtime, "outcomes", None).unwrap();
        assert_eq!(entries.len(), 2);
    }
}
