use reqwest::Client as HttpClient;

use crate::error::{AppError, AppResult};
use crate::models::ListedJob;

/// Client for the public job list
#[derive(Clone)]
pub struct ListingsClient {
    http_client: HttpClient,
    backend_url: String,
}

impl ListingsClient {
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            backend_url: backend_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetches every listed job
    pub async fn fetch_jobs(&self) -> AppResult<Vec<ListedJob>> {
        let url = format!("{}/jobs", self.backend_url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::ExternalApi(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Job listings returned status {}: {}",
                status, body
            )));
        }

        let jobs: Vec<ListedJob> = response
            .json()
            .await
            .map_err(|e| AppError::ExternalApi(format!("Failed to parse job listings: {}", e)))?;

        tracing::info!(jobs = jobs.len(), "Job listings fetched");
        Ok(jobs)
    }
}

/// Case-insensitive match on title, company or source; a blank query keeps everything
pub fn filter_jobs<'a>(jobs: &'a [ListedJob], query: &str) -> Vec<&'a ListedJob> {
    if query.trim().is_empty() {
        return jobs.iter().collect();
    }
    let query = query.to_lowercase();

    jobs.iter()
        .filter(|job| {
            job.title.to_lowercase().contains(&query)
                || job
                    .company
                    .as_deref()
                    .is_some_and(|company| company.to_lowercase().contains(&query))
                || job.source.to_lowercase().contains(&query)
        })
        .collect()
}
