//! Append-only cost accounting log.
//!
//! One line-delimited JSON record per completed chain. Aborted chains never
//! log, so the file reflects only requests that produced output.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::StageCall;
use crate::error::{GhostwriterError, Result};

/// One completed chain, as persisted to the cost log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostLogRecord {
    pub timestamp: DateTime<Utc>,
    pub conversation_id: Option<String>,
    pub total_cost_usd: f64,
    pub total_latency_s: f64,
    pub calls: BTreeMap<String, StageCall>,
}

/// Serialized appender for the cost log file.
pub struct CostLogWriter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CostLogWriter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, creating the parent directory and file on demand.
    /// The full line is written and flushed under the lock; partial records
    /// are never emitted.
    pub fn append(&self, record: &CostLogRecord) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(record)?;

        let _guard = self
            .lock
            .lock()
            .map_err(|e| GhostwriterError::Storage(e.to_string()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_record() -> CostLogRecord {
        let mut calls = BTreeMap::new();
        calls.insert(
            "analyzer".to_string(),
            StageCall {
                model: "llama-3.1-8b".to_string(),
                input_tokens: 500,
                output_tokens: 200,
                cost_usd: 0.000041,
                latency_s: 0.2,
            },
        );
        CostLogRecord {
            timestamp: Utc::now(),
            conversation_id: None,
            total_cost_usd: 0.000041,
            total_latency_s: 0.25,
            calls,
        }
    }

    #[test]
    fn test_append_creates_parent_and_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("logs").join("costs.jsonl");
        let writer = CostLogWriter::new(&path);

        writer.append(&sample_record()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn test_record_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("costs.jsonl");
        let writer = CostLogWriter::new(&path);

        writer.append(&sample_record()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let parsed: CostLogRecord = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(parsed.conversation_id, None);
        assert_eq!(parsed.calls["analyzer"].model, "llama-3.1-8b");
        assert!((parsed.total_cost_usd - 0.000041).abs() < 1e-12);
    }

    #[test]
    fn test_missing_conversation_id_serializes_as_null() {
        let json = serde_json::to_value(sample_record()).unwrap();
        assert!(json["conversation_id"].is_null());
    }

    #[test]
    fn test_appends_accumulate() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("costs.jsonl");
        let writer = CostLogWriter::new(&path);

        writer.append(&sample_record()).unwrap();
        writer.append(&sample_record()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
