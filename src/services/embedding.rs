use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    error::{AppError, AppResult},
    models::{CurrentUser, SubmitOutcome, TaskId, TaskKind},
    services::{
        poller::{until_cancelled, PollPolicy, Poller},
        submitter::Submitter,
        worker::RecommendationWorker,
    },
    store::{ResultCache, StoreKey, TaskStore},
};

/// Waits for a resume's embeddings, then starts the recommendation task
///
/// The recommendation task is only submitted once the embedding task has
/// completed.
pub struct EmbeddingChain {
    user: CurrentUser,
    submitter: Submitter,
    poller: Poller,
    store: Arc<dyn TaskStore>,
    cache: ResultCache,
}

impl EmbeddingChain {
    pub fn new(
        user: CurrentUser,
        worker: Arc<dyn RecommendationWorker>,
        store: Arc<dyn TaskStore>,
        cache: ResultCache,
        policy: PollPolicy,
    ) -> Self {
        Self {
            user,
            submitter: Submitter::new(worker.clone(), store.clone()),
            poller: Poller::new(worker, policy),
            store,
            cache,
        }
    }

    fn task_key(&self) -> StoreKey {
        StoreKey::EmbeddingTask(self.user.session_key())
    }

    /// Embedding task left over from an interrupted run, if any
    pub async fn pending(&self) -> AppResult<Option<TaskId>> {
        self.store.load(&self.task_key()).await
    }

    /// Polls the embedding task and starts recommendations once it completes
    ///
    /// The recommendation task id is persisted by the submitter, so the next
    /// recommendation flow resumes it. Results returned immediately go
    /// straight into the session cache.
    pub async fn run<F>(
        &self,
        embedding_task: &TaskId,
        cancel: &CancellationToken,
        on_attempt: F,
    ) -> AppResult<SubmitOutcome>
    where
        F: FnMut(u32) + Send,
    {
        let key = self.task_key();
        if let Err(e) = self.store.save(&key, embedding_task).await {
            tracing::warn!(error = %e, store = self.store.name(), "Failed to persist embedding task id");
        }

        let polled = self
            .poller
            .poll(TaskKind::Embedding, embedding_task, cancel, on_attempt)
            .await;

        match polled {
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) => {
                self.forget_task(&key).await;
                return Err(e);
            }
            Ok(_) => self.forget_task(&key).await,
        }

        tracing::info!(task_id = %embedding_task, "Embeddings ready, starting recommendation task");

        let outcome = until_cancelled(cancel, self.submitter.submit(&self.user)).await?;
        if let SubmitOutcome::Immediate(jobs) = &outcome {
            self.cache.set(jobs.clone()).await;
        }
        Ok(outcome)
    }

    async fn forget_task(&self, key: &StoreKey) {
        if let Err(e) = self.store.clear(key).await {
            tracing::warn!(error = %e, key = %key, store = self.store.name(), "Failed to clear embedding task id");
        }
    }
}
