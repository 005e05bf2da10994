//! Terminal message a worker reports for its task.
//!
//! This is the wire contract between the coordinator and an isolated worker
//! (thread or child process). The process worker prints it as one JSON line
//! on stdout.

use serde::{Deserialize, Serialize};

/// One variant as reported by a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantOutput {
    pub resolution: u32,
    pub path: String,
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WorkerMessage {
    #[serde(rename_all = "camelCase")]
    Completed {
        task_id: String,
        variants: Vec<VariantOutput>,
        processing_time_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    Failed {
        task_id: String,
        error: String,
        processing_time_ms: u64,
    },
}

impl WorkerMessage {
    pub fn failure(task_id: &str, error: impl Into<String>, processing_time_ms: u64) -> Self {
        WorkerMessage::Failed {
            task_id: task_id.to_string(),
            error: error.into(),
            processing_time_ms,
        }
    }

    pub fn task_id(&self) -> &str {
        match self {
            WorkerMessage::Completed { task_id, .. } | WorkerMessage::Failed { task_id, .. } => {
                task_id
            }
        }
    }

    pub fn processing_time_ms(&self) -> u64 {
        match self {
            WorkerMessage::Completed {
                processing_time_ms, ..
            }
            | WorkerMessage::Failed {
                processing_time_ms, ..
            } => *processing_time_ms,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, WorkerMessage::Completed { .. })
    }

    /// Serializes to a single line of JSON (no trailing newline).
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Finds the last line of `output` that parses as a message.
    ///
    /// Workers may log to stdout before reporting, so earlier lines are
    /// skipped rather than treated as malformed.
    pub fn from_output(output: &str) -> Option<Self> {
        output
            .lines()
            .rev()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .find_map(|line| serde_json::from_str(line).ok())
    }
}
