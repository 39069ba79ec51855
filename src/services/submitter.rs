use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{CurrentUser, JobRecord, SubmitOutcome},
    services::worker::RecommendationWorker,
    store::{StoreKey, TaskStore},
};

/// Starts recommendation computations on the worker
#[derive(Clone)]
pub struct Submitter {
    worker: Arc<dyn RecommendationWorker>,
    store: Arc<dyn TaskStore>,
}

impl Submitter {
    pub fn new(worker: Arc<dyn RecommendationWorker>, store: Arc<dyn TaskStore>) -> Self {
        Self { worker, store }
    }

    /// Submits a computation for the user
    ///
    /// A queued task id is persisted under the user's session so a later run
    /// resumes polling it. A failed write is logged and does not fail the
    /// submission.
    pub async fn submit(&self, user: &CurrentUser) -> AppResult<SubmitOutcome> {
        let email = checked_email(user)?;
        let outcome = self.worker.submit_recommendations(email).await?;

        if let SubmitOutcome::Queued { task_id, message } = &outcome {
            tracing::info!(
                task_id = %task_id,
                message = message.as_deref().unwrap_or(""),
                worker = self.worker.name(),
                "Recommendation task started"
            );

            let key = StoreKey::RecommendationTask(user.session_key());
            if let Err(e) = self.store.save(&key, task_id).await {
                tracing::warn!(
                    error = %e,
                    store = self.store.name(),
                    "Failed to persist task id; a restart will submit again"
                );
            }
        }

        Ok(outcome)
    }

    /// Fetches results the worker reports as already computed
    ///
    /// Used after a task completes without attaching its data. The worker is
    /// expected to answer with the list directly; a new task id means it did not.
    pub async fn fetch_completed(&self, user: &CurrentUser) -> AppResult<Vec<JobRecord>> {
        let email = checked_email(user)?;
        match self.worker.submit_recommendations(email).await? {
            SubmitOutcome::Immediate(jobs) => Ok(jobs),
            SubmitOutcome::Queued { task_id, .. } => Err(AppError::RemoteTaskError(format!(
                "task completed without results and the worker queued {} instead",
                task_id
            ))),
        }
    }
}

fn checked_email(user: &CurrentUser) -> AppResult<&str> {
    let email = user.email.trim();
    if email.is_empty() {
        return Err(AppError::InvalidInput(
            "user email cannot be empty".to_string(),
        ));
    }
    Ok(email)
}
