//! Broadcast of terminal task transitions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::task::TaskStatus;

/// Emitted once per task, after its terminal transition is persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskEvent {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TaskEvent {
    pub fn completed(task_id: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            status: TaskStatus::Completed,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(task_id: &str, error: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            status: TaskStatus::Failed,
            error: Some(error.to_string()),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct TaskEventBroadcaster {
    sender: Arc<broadcast::Sender<TaskEvent>>,
}

impl TaskEventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: TaskEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.sender.subscribe()
    }
}

impl Default for TaskEventBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}
