//! Execution history: one record per loop run or single-shot call.

use crate::types::FunctionCall;
use crate::utils::timestamp;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Answer,
    LowConfidenceAnswer,
    MaxTurnsExceeded,
    Failed,
    Cancelled,
    /// Single-shot call that produced and executed a function call.
    FunctionCalled,
    /// Single-shot call whose response held no function call.
    NoCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub query: String,
    pub final_answer_or_error: String,
    pub outcome: OutcomeKind,
    pub turns_taken: usize,
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

impl ExecutionRecord {
    pub fn new(
        query: impl Into<String>,
        final_answer_or_error: impl Into<String>,
        outcome: OutcomeKind,
        turns_taken: usize,
    ) -> Self {
        Self {
            query: query.into(),
            final_answer_or_error: final_answer_or_error.into(),
            outcome,
            turns_taken,
            timestamp: timestamp(),
            function_call: None,
        }
    }

    pub fn with_function_call(mut self, call: FunctionCall) -> Self {
        self.function_call = Some(call);
        self
    }
}

/// Append-only list of execution records.
///
/// File appends made through [`ExecutionHistory::append_persisted`] are serialized, so
/// concurrent runs never drop each other's records.
#[derive(Debug, Default)]
pub struct ExecutionHistory {
    records: Mutex<Vec<ExecutionRecord>>,
    file_lock: tokio::sync::Mutex<()>,
}

impl ExecutionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: ExecutionRecord) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
    }

    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Record in memory and append to the JSON file at `path`.
    ///
    /// The in-memory record is kept even when the file write fails.
    pub async fn append_persisted(
        &self,
        path: impl AsRef<Path>,
        record: ExecutionRecord,
    ) -> Result<()> {
        let written = {
            let _guard = self.file_lock.lock().await;
            Self::append_to_file(path, &record).await
        };
        self.append(record);
        written
    }

    /// Write all records as a JSON array.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.records())?;
        let _guard = self.file_lock.lock().await;
        write_replacing(path.as_ref(), text).await
    }

    /// Replace the in-memory records with the ones stored at `path`.
    pub async fn load(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = tokio::fs::read_to_string(path).await?;
        let loaded: Vec<ExecutionRecord> = serde_json::from_str(&text)?;
        *self.records.lock().unwrap_or_else(|e| e.into_inner()) = loaded;
        Ok(())
    }

    /// Append one record to the JSON array stored at `path`, creating the file if needed.
    ///
    /// This is a read-modify-write of the whole file; callers sharing a path must
    /// serialize calls (see [`ExecutionHistory::append_persisted`]).
    pub async fn append_to_file(path: impl AsRef<Path>, record: &ExecutionRecord) -> Result<()> {
        let path = path.as_ref();
        let mut records: Vec<ExecutionRecord> = match tokio::fs::read_to_string(path).await {
            Ok(text) if !text.trim().is_empty() => serde_json::from_str(&text)?,
            Ok(_) => Vec::new(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        records.push(record.clone());
        write_replacing(path, serde_json::to_string_pretty(&records)?).await?;
        debug!(path = %path.display(), records = records.len(), "appended execution record");
        Ok(())
    }
}

/// Write `text` to a sibling temp file and rename it over `path`, so readers never see a
/// partially written file.
async fn write_replacing(path: &Path, text: String) -> Result<()> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("history.json");
    let tmp = path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()));
    tokio::fs::write(&tmp, text).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serialization_shape() {
        let record = ExecutionRecord::new("q", "a", OutcomeKind::LowConfidenceAnswer, 2);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["outcome"], "low_confidence_answer");
        assert_eq!(value["turns_taken"], 2);
        assert!(value.get("function_call").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_persisted_appends_keep_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let history = std::sync::Arc::new(ExecutionHistory::new());

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let history = std::sync::Arc::clone(&history);
                let path = path.clone();
                tokio::spawn(async move {
                    let record = ExecutionRecord::new(format!("q{}", i), "a", OutcomeKind::Answer, 1);
                    history.append_persisted(&path, record).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let reloaded = ExecutionHistory::new();
        reloaded.load(&path).await.unwrap();
        assert_eq!(reloaded.len(), 32);
        assert_eq!(history.len(), 32);
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_append_and_clear() {
        let history = ExecutionHistory::new();
        history.append(ExecutionRecord::new("q", "a", OutcomeKind::Answer, 1));
        assert_eq!(history.len(), 1);
        history.clear();
        assert!(history.is_empty());
    }
}
