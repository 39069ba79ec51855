/// HTTP worker client
///
/// API Flow:
/// 1. Submit: POST /recommendations `{email}` → job list, or `{task_id, message}`
/// 2. Status: GET /recommendations/{task_id} → `{status, data?, message?}`
/// 3. Embedding status: GET /precompute-embedding/{task_id}, same body
use reqwest::Client as HttpClient;

use crate::{
    error::{AppError, AppResult},
    models::{
        parse_jobs, SubmitOutcome, SubmitRequest, SubmitResponse, TaskId, TaskKind, TaskStatus,
        TaskStatusResponse,
    },
    services::worker::RecommendationWorker,
};

#[derive(Clone)]
pub struct HttpWorker {
    http_client: HttpClient,
    worker_url: String,
}

impl HttpWorker {
    pub fn new(worker_url: impl Into<String>) -> Self {
        Self::with_client(HttpClient::new(), worker_url)
    }

    pub fn with_client(http_client: HttpClient, worker_url: impl Into<String>) -> Self {
        let worker_url = worker_url.into().trim_end_matches('/').to_string();
        Self {
            http_client,
            worker_url,
        }
    }

    pub fn worker_url(&self) -> &str {
        &self.worker_url
    }
}

#[async_trait::async_trait]
impl RecommendationWorker for HttpWorker {
    async fn submit_recommendations(&self, email: &str) -> AppResult<SubmitOutcome> {
        let url = format!("{}/recommendations", self.worker_url);

        let response = self
            .http_client
            .post(&url)
            .json(&SubmitRequest { email })
            .send()
            .await
            .map_err(|e| AppError::SubmissionFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::SubmissionFailed(format!(
                "worker returned status {}: {}",
                status, body
            )));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| AppError::SubmissionFailed(e.to_string()))?;
        tracing::debug!(response = %response_text, "Raw submit response");

        let parsed: SubmitResponse = serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(error = %e, response = %response_text, "Failed to deserialize submit response");
            AppError::SubmissionFailed(format!("unexpected submit response: {}", e))
        })?;

        match parsed {
            SubmitResponse::Jobs(values) => {
                let jobs = parse_jobs(values).map_err(AppError::SubmissionFailed)?;
                tracing::info!(jobs = jobs.len(), worker = "http", "Recommendations returned immediately");
                Ok(SubmitOutcome::Immediate(jobs))
            }
            SubmitResponse::Task { task_id, message } => {
                let task_id = TaskId::new(task_id).ok_or_else(|| {
                    AppError::SubmissionFailed("worker returned an empty task id".to_string())
                })?;
                tracing::info!(task_id = %task_id, worker = "http", "Recommendation task queued");
                Ok(SubmitOutcome::Queued { task_id, message })
            }
        }
    }

    async fn task_status(&self, kind: TaskKind, task_id: &TaskId) -> AppResult<TaskStatus> {
        let url = format!("{}{}", self.worker_url, kind.status_path(task_id));

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::PollingTransportError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::PollingTransportError(format!(
                "worker returned status {}: {}",
                status, body
            )));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| AppError::PollingTransportError(e.to_string()))?;
        tracing::debug!(kind = %kind, task_id = %task_id, response = %response_text, "Raw status response");

        let parsed: TaskStatusResponse = serde_json::from_str(&response_text).map_err(|e| {
            AppError::PollingTransportError(format!("unexpected status response: {}", e))
        })?;

        Ok(TaskStatus::from(parsed))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
