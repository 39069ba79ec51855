use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{AppError, AppResult},
    models::{parse_jobs, JobRecord, TaskId, TaskKind, TaskStatus},
    services::worker::RecommendationWorker,
};

/// How often and how long to poll a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Fixed delay between two requests; there is no backoff
    pub interval: Duration,
    /// Upper bound on requests issued for one task
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 30,
        }
    }
}

/// Polls task status until the worker reports a terminal state
///
/// Requests are strictly sequential: the next one is only sent after the
/// previous answer arrived and the interval elapsed.
#[derive(Clone)]
pub struct Poller {
    worker: Arc<dyn RecommendationWorker>,
    policy: PollPolicy,
}

impl Poller {
    pub fn new(worker: Arc<dyn RecommendationWorker>, policy: PollPolicy) -> Self {
        Self { worker, policy }
    }

    /// Polls until `completed`, `error`, cancellation or the attempt bound
    ///
    /// `on_attempt` is called with the 1-based attempt number right before each
    /// request. Returns the completed task's payload, if it had one.
    pub async fn poll<F>(
        &self,
        kind: TaskKind,
        task_id: &TaskId,
        cancel: &CancellationToken,
        mut on_attempt: F,
    ) -> AppResult<Option<Value>>
    where
        F: FnMut(u32) + Send,
    {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                tracing::info!(kind = %kind, task_id = %task_id, attempt, "Polling cancelled");
                return Err(AppError::Cancelled);
            }

            on_attempt(attempt);

            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(kind = %kind, task_id = %task_id, attempt, "Polling cancelled mid-request");
                    return Err(AppError::Cancelled);
                }
                status = self.worker.task_status(kind, task_id) => status,
            };

            match status {
                Ok(TaskStatus::Pending) => {
                    tracing::debug!(kind = %kind, task_id = %task_id, attempt, "Task still pending");
                }
                Ok(TaskStatus::Completed { data }) => {
                    tracing::info!(kind = %kind, task_id = %task_id, attempt, "Task completed");
                    return Ok(data);
                }
                Ok(TaskStatus::Failed { message }) => {
                    tracing::warn!(kind = %kind, task_id = %task_id, attempt, message = %message, "Task failed on worker");
                    return Err(AppError::RemoteTaskError(message));
                }
                Err(e) => {
                    tracing::error!(kind = %kind, task_id = %task_id, attempt, error = %e, "Status request failed");
                    return Err(e);
                }
            }

            if attempt < max_attempts {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::info!(kind = %kind, task_id = %task_id, attempt, "Polling cancelled while waiting");
                        return Err(AppError::Cancelled);
                    }
                    _ = tokio::time::sleep(self.policy.interval) => {}
                }
            }
        }

        tracing::warn!(kind = %kind, task_id = %task_id, attempts = max_attempts, "Task polling timed out");
        Err(AppError::PollingTimeout {
            attempts: max_attempts,
        })
    }

    /// Polls a recommendation task and validates its payload as job records
    pub async fn poll_recommendations<F>(
        &self,
        task_id: &TaskId,
        cancel: &CancellationToken,
        on_attempt: F,
    ) -> AppResult<Option<Vec<JobRecord>>>
    where
        F: FnMut(u32) + Send,
    {
        let data = self
            .poll(TaskKind::Recommendation, task_id, cancel, on_attempt)
            .await?;

        match data {
            None => Ok(None),
            Some(Value::Array(values)) => parse_jobs(values)
                .map(Some)
                .map_err(AppError::PollingTransportError),
            Some(other) => Err(AppError::PollingTransportError(format!(
                "expected a list of jobs in completed task, got {}",
                other
            ))),
        }
    }
}

/// Runs a request unless `cancel` fires first
///
/// Dropping the request future aborts it, so a stalled connection does not
/// outlive the cancellation.
pub async fn until_cancelled<T, F>(cancel: &CancellationToken, request: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AppError::Cancelled),
        result = request => result,
    }
}
