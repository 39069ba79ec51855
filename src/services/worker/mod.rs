/// Remote worker abstraction
///
/// Every network call the recommendation flow makes goes through this trait,
/// so the submitter and poller can run against the HTTP worker or a mock.
use crate::{
    error::AppResult,
    models::{SubmitOutcome, TaskId, TaskKind, TaskStatus},
};

pub mod http;

pub use http::HttpWorker;

/// Trait for recommendation workers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecommendationWorker: Send + Sync {
    /// Ask the worker to compute recommendations for a user
    ///
    /// Fails with `SubmissionFailed` on transport errors, non-success
    /// statuses and bodies that are neither a job list nor a task id.
    async fn submit_recommendations(&self, email: &str) -> AppResult<SubmitOutcome>;

    /// Read the current status of a task once
    ///
    /// Fails with `PollingTransportError` when the status cannot be read.
    async fn task_status(&self, kind: TaskKind, task_id: &TaskId) -> AppResult<TaskStatus>;

    /// Worker name for logging and debugging
    fn name(&self) -> &'static str;
}
