use std::fmt::Display;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{AppError, AppResult},
    models::{CurrentUser, JobRecord, SubmitOutcome, TaskId},
    services::{
        poller::{until_cancelled, PollPolicy, Poller},
        submitter::Submitter,
        worker::RecommendationWorker,
    },
    store::{ResultCache, StoreKey, TaskStore},
};

/// Where a recommendation fetch currently stands
///
/// `Idle → Submitting → Polling → {Completed, Failed, TimedOut}`. A cache hit
/// goes straight from `Idle` to `Completed`; a persisted task id skips
/// `Submitting`.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowState {
    Idle,
    Submitting,
    Polling { task_id: TaskId, attempt: u32 },
    Completed { jobs: usize },
    Failed { message: String },
    TimedOut { attempts: u32 },
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FlowState::Completed { .. } | FlowState::Failed { .. } | FlowState::TimedOut { .. }
        )
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, FlowState::Submitting | FlowState::Polling { .. })
    }
}

impl Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowState::Idle => write!(f, "idle"),
            FlowState::Submitting => write!(f, "submitting"),
            FlowState::Polling { task_id, attempt } => {
                write!(f, "polling task {} (attempt {})", task_id, attempt)
            }
            FlowState::Completed { jobs } => write!(f, "completed with {} jobs", jobs),
            FlowState::Failed { message } => write!(f, "failed: {}", message),
            FlowState::TimedOut { attempts } => write!(f, "timed out after {} attempts", attempts),
        }
    }
}

/// Fetches recommendations for one user, publishing every state change
///
/// Observers subscribe to a watch channel; they always see the latest state
/// and transitions arrive in order. Cancellation publishes nothing.
pub struct RecommendationFlow {
    user: CurrentUser,
    submitter: Submitter,
    poller: Poller,
    store: Arc<dyn TaskStore>,
    cache: ResultCache,
    state_tx: watch::Sender<FlowState>,
}

impl RecommendationFlow {
    pub fn new(
        user: CurrentUser,
        worker: Arc<dyn RecommendationWorker>,
        store: Arc<dyn TaskStore>,
        cache: ResultCache,
        policy: PollPolicy,
    ) -> Self {
        let (state_tx, _) = watch::channel(FlowState::Idle);
        Self {
            user,
            submitter: Submitter::new(worker.clone(), store.clone()),
            poller: Poller::new(worker, policy),
            store,
            cache,
            state_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<FlowState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> FlowState {
        self.state_tx.borrow().clone()
    }

    fn publish(&self, state: FlowState) {
        tracing::debug!(state = %state, "Recommendation flow state changed");
        self.state_tx.send_replace(state);
    }

    fn task_key(&self) -> StoreKey {
        StoreKey::RecommendationTask(self.user.session_key())
    }

    /// Runs the flow to a terminal state
    ///
    /// Takes `&mut self` so one flow never has two fetches in flight.
    pub async fn run(&mut self, cancel: &CancellationToken) -> AppResult<Vec<JobRecord>> {
        if let Some(jobs) = self.cache.get().await {
            tracing::info!(jobs = jobs.len(), "Serving recommendations from cache");
            self.publish(FlowState::Completed { jobs: jobs.len() });
            return Ok(jobs);
        }

        let result = self.fetch(cancel).await;

        match &result {
            Ok(jobs) => {
                tracing::info!(jobs = jobs.len(), "Recommendations ready");
                self.publish(FlowState::Completed { jobs: jobs.len() });
            }
            Err(AppError::Cancelled) => {
                tracing::info!("Recommendation flow cancelled");
            }
            Err(AppError::PollingTimeout { attempts }) => {
                self.publish(FlowState::TimedOut {
                    attempts: *attempts,
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "Recommendation flow failed");
                self.publish(FlowState::Failed {
                    message: e.to_string(),
                });
            }
        }

        result
    }

    async fn fetch(&self, cancel: &CancellationToken) -> AppResult<Vec<JobRecord>> {
        let key = self.task_key();

        let resumed = match self.store.load(&key).await {
            Ok(task_id) => task_id,
            Err(e) => {
                tracing::warn!(error = %e, store = self.store.name(), "Failed to read persisted task id; submitting a new task");
                None
            }
        };

        let task_id = match resumed {
            Some(task_id) => {
                tracing::info!(task_id = %task_id, "Resuming persisted recommendation task");
                task_id
            }
            None => {
                if cancel.is_cancelled() {
                    return Err(AppError::Cancelled);
                }
                self.publish(FlowState::Submitting);

                match until_cancelled(cancel, self.submitter.submit(&self.user)).await? {
                    SubmitOutcome::Immediate(jobs) => {
                        self.cache.set(jobs.clone()).await;
                        return Ok(jobs);
                    }
                    SubmitOutcome::Queued { task_id, .. } => task_id,
                }
            }
        };

        let polled = self
            .poller
            .poll_recommendations(&task_id, cancel, |attempt| {
                self.publish(FlowState::Polling {
                    task_id: task_id.clone(),
                    attempt,
                })
            })
            .await;

        let jobs = match polled {
            // the id stays persisted so the next run picks the task up again
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) => {
                self.forget_task(&key).await;
                return Err(e);
            }
            Ok(data) => {
                self.forget_task(&key).await;
                match data {
                    Some(jobs) => jobs,
                    None => {
                        tracing::info!(task_id = %task_id, "Task completed without data, fetching results directly");
                        until_cancelled(cancel, self.submitter.fetch_completed(&self.user)).await?
                    }
                }
            }
        };

        self.cache.set(jobs.clone()).await;
        Ok(jobs)
    }

    async fn forget_task(&self, key: &StoreKey) {
        if let Err(e) = self.store.clear(key).await {
            tracing::warn!(error = %e, key = %key, store = self.store.name(), "Failed to clear persisted task id");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;
    use crate::services::worker::MockRecommendationWorker;
    use crate::store::MemoryTaskStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn ada() -> CurrentUser {
        CurrentUser {
            email: "ada@example.com".to_string(),
            name: Some("Ada".to_string()),
        }
    }

    fn task(id: &str) -> TaskId {
        TaskId::new(id).unwrap()
    }

    fn key() -> StoreKey {
        StoreKey::RecommendationTask("ada@example.com".to_string())
    }

    fn engineer() -> Vec<JobRecord> {
        vec![JobRecord::from_value(json!({"title": "Engineer"})).unwrap()]
    }

    fn flow(
        worker: MockRecommendationWorker,
        store: Arc<MemoryTaskStore>,
        cache: ResultCache,
    ) -> RecommendationFlow {
        RecommendationFlow::new(ada(), Arc::new(worker), store, cache, PollPolicy::default())
    }

    /// Collects every state the flow publishes, in order
    fn record_states(flow: &RecommendationFlow) -> tokio::task::JoinHandle<Vec<FlowState>> {
        let mut rx = flow.subscribe();
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().clone();
                let done = state.is_terminal();
                seen.push(state);
                if done {
                    break;
                }
            }
            seen
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_task_polled_to_completion() {
        let mut worker = MockRecommendationWorker::new();
        worker
            .expect_submit_recommendations()
            .times(1)
            .returning(|_| {
                Ok(SubmitOutcome::Queued {
                    task_id: TaskId::new("abc123").unwrap(),
                    message: None,
                })
            });
        worker.expect_name().return_const("mock");

        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        worker
            .expect_task_status()
            .withf(|_, task_id| task_id.as_str() == "abc123")
            .times(3)
            .returning(move |_, _| {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Ok(TaskStatus::Pending)
                } else {
                    Ok(TaskStatus::Completed {
                        data: Some(json!([{"title": "Engineer"}])),
                    })
                }
            });

        let store = Arc::new(MemoryTaskStore::new());
        let cache = ResultCache::new();
        let mut flow = flow(worker, store.clone(), cache.clone());

        let jobs = flow.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(jobs, engineer());
        assert_eq!(flow.state(), FlowState::Completed { jobs: 1 });
        assert!(!flow.state().is_loading());
        assert_eq!(cache.get().await, Some(engineer()));
        assert_eq!(store.load(&key()).await.unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_states_published_in_order() {
        let mut worker = MockRecommendationWorker::new();
        worker.expect_submit_recommendations().returning(|_| {
            Ok(SubmitOutcome::Queued {
                task_id: TaskId::new("abc123").unwrap(),
                message: None,
            })
        });
        worker.expect_name().return_const("mock");

        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        worker.expect_task_status().returning(move |_, _| {
            if counter.fetch_add(1, Ordering::SeqCst) < 1 {
                Ok(TaskStatus::Pending)
            } else {
                Ok(TaskStatus::Completed {
                    data: Some(json!([{"title": "Engineer"}])),
                })
            }
        });

        let mut flow = flow(worker, Arc::new(MemoryTaskStore::new()), ResultCache::new());
        let recorder = record_states(&flow);

        flow.run(&CancellationToken::new()).await.unwrap();
        let seen = recorder.await.unwrap();

        // a watch receiver only sees the latest value at each wake-up, so
        // intermediate states may be skipped but never reordered
        let polling_at = seen
            .iter()
            .position(|s| matches!(s, FlowState::Polling { task_id, .. } if task_id.as_str() == "abc123"))
            .expect("polling state observed");
        let completed_at = seen
            .iter()
            .position(|s| *s == FlowState::Completed { jobs: 1 })
            .expect("completed state observed");
        assert!(polling_at < completed_at);
        assert_eq!(completed_at, seen.len() - 1);

        let attempts: Vec<u32> = seen
            .iter()
            .filter_map(|s| match s {
                FlowState::Polling { attempt, .. } => Some(*attempt),
                _ => None,
            })
            .collect();
        assert!(attempts.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_immediate_result_skips_poller() {
        let mut worker = MockRecommendationWorker::new();
        worker
            .expect_submit_recommendations()
            .times(1)
            .returning(|_| Ok(SubmitOutcome::Immediate(engineer())));
        worker.expect_task_status().never();

        let store = Arc::new(MemoryTaskStore::new());
        let cache = ResultCache::new();
        let mut flow = flow(worker, store.clone(), cache.clone());

        let jobs = flow.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(jobs, engineer());
        assert_eq!(cache.get().await, Some(engineer()));
        assert_eq!(store.load(&key()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cached_value_served_without_network() {
        let mut worker = MockRecommendationWorker::new();
        worker.expect_submit_recommendations().never();
        worker.expect_task_status().never();

        let cache = ResultCache::new();
        cache.set(engineer()).await;
        let mut flow = flow(worker, Arc::new(MemoryTaskStore::new()), cache);

        let jobs = flow.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(jobs, engineer());
        assert_eq!(flow.state(), FlowState::Completed { jobs: 1 });
    }

    #[tokio::test]
    async fn test_second_run_hits_cache() {
        let mut worker = MockRecommendationWorker::new();
        worker
            .expect_submit_recommendations()
            .times(1)
            .returning(|_| Ok(SubmitOutcome::Immediate(engineer())));

        let mut flow = flow(worker, Arc::new(MemoryTaskStore::new()), ResultCache::new());
        let cancel = CancellationToken::new();

        let first = flow.run(&cancel).await.unwrap();
        let second = flow.run(&cancel).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_submit_failure_leaves_cache_empty() {
        let mut worker = MockRecommendationWorker::new();
        worker.expect_submit_recommendations().returning(|_| {
            Err(AppError::SubmissionFailed(
                "worker returned status 500 Internal Server Error: ".to_string(),
            ))
        });
        worker.expect_task_status().never();

        let cache = ResultCache::new();
        let mut flow = flow(worker, Arc::new(MemoryTaskStore::new()), cache.clone());

        let err = flow.run(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AppError::SubmissionFailed(_)));
        assert!(matches!(flow.state(), FlowState::Failed { ref message } if message.contains("500")));
        assert_eq!(cache.get().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_ends_in_timed_out_state() {
        let mut worker = MockRecommendationWorker::new();
        worker.expect_submit_recommendations().returning(|_| {
            Ok(SubmitOutcome::Queued {
                task_id: TaskId::new("slow").unwrap(),
                message: None,
            })
        });
        worker.expect_name().return_const("mock");
        worker
            .expect_task_status()
            .times(30)
            .returning(|_, _| Ok(TaskStatus::Pending));

        let store = Arc::new(MemoryTaskStore::new());
        let mut flow = flow(worker, store.clone(), ResultCache::new());

        let started = tokio::time::Instant::now();
        let err = flow.run(&CancellationToken::new()).await.unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(flow.state(), FlowState::TimedOut { attempts: 30 });
        assert!(started.elapsed() >= Duration::from_secs(29));
        assert_eq!(store.load(&key()).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_error_clears_task() {
        let mut worker = MockRecommendationWorker::new();
        worker.expect_task_status().times(1).returning(|_, _| {
            Ok(TaskStatus::Failed {
                message: "embedding missing".to_string(),
            })
        });
        worker.expect_submit_recommendations().never();

        let store = Arc::new(MemoryTaskStore::new());
        store.save(&key(), &task("abc123")).await.unwrap();
        let mut flow = flow(worker, store.clone(), ResultCache::new());

        let err = flow.run(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AppError::RemoteTaskError(_)));
        assert_eq!(
            flow.state(),
            FlowState::Failed {
                message: "Task failed on the worker: embedding missing".to_string()
            }
        );
        assert_eq!(store.load(&key()).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persisted_task_resumed_without_submit() {
        let mut worker = MockRecommendationWorker::new();
        worker.expect_submit_recommendations().never();
        worker
            .expect_task_status()
            .withf(|_, task_id| task_id.as_str() == "resume-me")
            .times(1)
            .returning(|_, _| {
                Ok(TaskStatus::Completed {
                    data: Some(json!([{"title": "Engineer"}])),
                })
            });

        let store = Arc::new(MemoryTaskStore::new());
        store.save(&key(), &task("resume-me")).await.unwrap();
        let mut flow = flow(worker, store.clone(), ResultCache::new());

        let jobs = flow.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(jobs, engineer());
        assert_eq!(store.load(&key()).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_without_data_falls_back_to_direct_fetch() {
        let mut worker = MockRecommendationWorker::new();
        worker
            .expect_task_status()
            .times(1)
            .returning(|_, _| Ok(TaskStatus::Completed { data: None }));
        worker
            .expect_submit_recommendations()
            .times(1)
            .returning(|_| Ok(SubmitOutcome::Immediate(engineer())));

        let store = Arc::new(MemoryTaskStore::new());
        store.save(&key(), &task("abc123")).await.unwrap();
        let cache = ResultCache::new();
        let mut flow = flow(worker, store.clone(), cache.clone());

        let jobs = flow.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(jobs, engineer());
        assert_eq!(cache.get().await, Some(engineer()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_keeps_task_and_state() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let mut worker = MockRecommendationWorker::new();
        worker.expect_submit_recommendations().never();
        worker.expect_task_status().times(1).returning(move |_, _| {
            trigger.cancel();
            Ok(TaskStatus::Pending)
        });

        let store = Arc::new(MemoryTaskStore::new());
        store.save(&key(), &task("abc123")).await.unwrap();
        let cache = ResultCache::new();
        let mut flow = flow(worker, store.clone(), cache.clone());

        let err = flow.run(&cancel).await.unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
        assert_eq!(
            flow.state(),
            FlowState::Polling {
                task_id: task("abc123"),
                attempt: 1
            }
        );
        assert_eq!(store.load(&key()).await.unwrap(), Some(task("abc123")));
        assert_eq!(cache.get().await, None);
    }

    #[tokio::test]
    async fn test_cancelled_before_submit_sends_nothing() {
        let mut worker = MockRecommendationWorker::new();
        worker.expect_submit_recommendations().never();

        let mut flow = flow(worker, Arc::new(MemoryTaskStore::new()), ResultCache::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = flow.run(&cancel).await.unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
        assert_eq!(flow.state(), FlowState::Idle);
    }

    /// Worker whose submit request never answers
    struct StalledWorker;

    #[async_trait::async_trait]
    impl RecommendationWorker for StalledWorker {
        async fn submit_recommendations(&self, _email: &str) -> AppResult<SubmitOutcome> {
            std::future::pending().await
        }

        async fn task_status(
            &self,
            _kind: crate::models::TaskKind,
            _task_id: &TaskId,
        ) -> AppResult<TaskStatus> {
            std::future::pending().await
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_submit_in_flight() {
        let store = Arc::new(MemoryTaskStore::new());
        let cache = ResultCache::new();
        let mut flow = RecommendationFlow::new(
            ada(),
            Arc::new(StalledWorker),
            store.clone(),
            cache.clone(),
            PollPolicy::default(),
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let err = flow.run(&cancel).await.unwrap_err();

        assert!(matches!(err, AppError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(6));
        assert_eq!(flow.state(), FlowState::Submitting);
        assert_eq!(store.load(&key()).await.unwrap(), None);
        assert!(!cache.is_populated().await);
    }
}
