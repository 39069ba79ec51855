use std::path::Path;

use reqwest::multipart::{Form, Part};
use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::models::{CurrentUser, TaskId};

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    task_id: Option<String>,
}

/// Uploads resumes for analysis
#[derive(Clone)]
pub struct ResumeUploader {
    http_client: HttpClient,
    api_url: String,
}

impl ResumeUploader {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Sends the file as `file` with the owner's email as `user_email`
    ///
    /// Returns the embedding task the API queued for it, when it reports one.
    pub async fn upload(&self, user: &CurrentUser, path: &Path) -> AppResult<Option<TaskId>> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "resume".to_string());

        let size = bytes.len();
        let form = Form::new()
            .part(
                "file",
                Part::bytes(bytes)
                    .file_name(file_name.clone())
                    .mime_str(mime_for(path))
                    .map_err(|e| AppError::InvalidInput(e.to_string()))?,
            )
            .text("user_email", user.email.clone());

        let url = format!("{}/api/v1/resume/upload", self.api_url);
        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::ExternalApi(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Resume upload returned status {}: {}",
                status, body
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| AppError::ExternalApi(e.to_string()))?;
        tracing::info!(file = %file_name, bytes = size, "Resume uploaded");

        // the API may acknowledge an upload without queuing a task
        let task_id = serde_json::from_str::<UploadResponse>(&text)
            .ok()
            .and_then(|r| r.task_id)
            .and_then(TaskId::new);
        Ok(task_id)
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        _ => "application/octet-stream",
    }
}
