use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Display;

use super::job::JobRecord;

/// Opaque identifier of a task tracked by the worker
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wraps a worker-issued id, rejecting blank ones
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which worker queue a task lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Recommendation,
    Embedding,
}

impl TaskKind {
    /// Path of the status endpoint for a task of this kind
    pub fn status_path(&self, task_id: &TaskId) -> String {
        match self {
            TaskKind::Recommendation => format!("/recommendations/{}", task_id),
            TaskKind::Embedding => format!("/precompute-embedding/{}", task_id),
        }
    }
}

impl Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Recommendation => write!(f, "recommendation"),
            TaskKind::Embedding => write!(f, "embedding"),
        }
    }
}

/// Task state as reported on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Completed,
    Error,
}

/// Raw body of a status response
#[derive(Debug, Clone, Deserialize)]
pub struct TaskStatusResponse {
    pub status: TaskState,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Status of a task after one poll
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    Pending,
    /// Terminal; `data` is whatever payload the worker attached
    Completed { data: Option<Value> },
    /// Terminal; the worker gave up on the task
    Failed { message: String },
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }
}

impl From<TaskStatusResponse> for TaskStatus {
    fn from(response: TaskStatusResponse) -> Self {
        match response.status {
            TaskState::Pending => TaskStatus::Pending,
            TaskState::Completed => TaskStatus::Completed {
                data: response.data.filter(|d| !d.is_null()),
            },
            TaskState::Error => TaskStatus::Failed {
                message: response
                    .message
                    .unwrap_or_else(|| "task reported an error".to_string()),
            },
        }
    }
}

/// Raw body of a submit response
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SubmitResponse {
    Jobs(Vec<Value>),
    Task {
        task_id: String,
        #[serde(default)]
        message: Option<String>,
    },
}

/// What the worker did with a submission
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Results were already available
    Immediate(Vec<JobRecord>),
    /// Computation was queued under a task id
    Queued {
        task_id: TaskId,
        message: Option<String>,
    },
}

/// Submit request body
#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest<'a> {
    pub email: &'a str,
}
