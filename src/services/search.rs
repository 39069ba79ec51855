/// Preference-based job search on the JobGenie API
///
/// POST /api/v1/search `{jobTitle[], jobType[], experienceLevel[]}` → job list
use reqwest::Client as HttpClient;
use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::models::{parse_jobs, JobRecord};

/// What the user is looking for; empty lists leave a criterion open
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPreferences {
    pub job_title: Vec<String>,
    pub job_type: Vec<String>,
    pub experience_level: Vec<String>,
}

impl JobPreferences {
    pub fn is_empty(&self) -> bool {
        self.job_title.is_empty() && self.job_type.is_empty() && self.experience_level.is_empty()
    }
}

#[derive(Clone)]
pub struct SearchClient {
    http_client: HttpClient,
    api_url: String,
}

impl SearchClient {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Jobs matching the given preferences, in the order the API ranked them
    pub async fn search(&self, preferences: &JobPreferences) -> AppResult<Vec<JobRecord>> {
        if preferences.is_empty() {
            return Err(AppError::InvalidInput(
                "pick at least one job title, job type or experience level".to_string(),
            ));
        }

        let url = format!("{}/api/v1/search", self.api_url);
        let response = self
            .http_client
            .post(&url)
            .json(preferences)
            .send()
            .await
            .map_err(|e| AppError::ExternalApi(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Job search returned status {}: {}",
                status, body
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| AppError::ExternalApi(e.to_string()))?;
        tracing::debug!(response = %text, "Raw search response");

        let values: Vec<Value> = serde_json::from_str(&text)
            .map_err(|e| AppError::ExternalApi(format!("Failed to parse search results: {}", e)))?;
        let jobs = parse_jobs(values).map_err(AppError::ExternalApi)?;

        tracing::info!(jobs = jobs.len(), "Job search finished");
        Ok(jobs)
    }
}
