use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::CurrentUser,
    services::{
        embedding::EmbeddingChain, flow::RecommendationFlow, poller::PollPolicy,
        worker::RecommendationWorker,
    },
    store::{credentials::CredentialStore, ResultCache, TaskStore},
};

/// Everything scoped to one logged-in user
///
/// Owns the result cache, so flows created from the same session share it
/// and a new session starts empty.
pub struct Session {
    user: CurrentUser,
    worker: Arc<dyn RecommendationWorker>,
    store: Arc<dyn TaskStore>,
    cache: ResultCache,
    policy: PollPolicy,
}

impl Session {
    pub fn new(
        user: CurrentUser,
        worker: Arc<dyn RecommendationWorker>,
        store: Arc<dyn TaskStore>,
        policy: PollPolicy,
    ) -> Self {
        Self {
            user,
            worker,
            store,
            cache: ResultCache::new(),
            policy,
        }
    }

    /// Opens a session for whoever the stored credential belongs to
    pub async fn from_credentials(
        credentials: &CredentialStore,
        worker: Arc<dyn RecommendationWorker>,
        store: Arc<dyn TaskStore>,
        policy: PollPolicy,
    ) -> AppResult<Self> {
        let user = credentials
            .current_user()
            .await?
            .ok_or(AppError::Unauthenticated)?;
        tracing::info!(email = %user.email, "Session opened");
        Ok(Self::new(user, worker, store, policy))
    }

    pub fn user(&self) -> &CurrentUser {
        &self.user
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn recommendation_flow(&self) -> RecommendationFlow {
        RecommendationFlow::new(
            self.user.clone(),
            self.worker.clone(),
            self.store.clone(),
            self.cache.clone(),
            self.policy,
        )
    }

    pub fn embedding_chain(&self) -> EmbeddingChain {
        EmbeddingChain::new(
            self.user.clone(),
            self.worker.clone(),
            self.store.clone(),
            self.cache.clone(),
            self.policy,
        )
    }
}
