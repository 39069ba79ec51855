/// Account endpoints of the JobGenie API
///
/// 1. Login: POST /api/v1/login `{email, password}` → `{access_token}`
/// 2. Signup: POST /signup `{name, email, password}` → `{access_token}`
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SignupRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct AccountClient {
    http_client: HttpClient,
    api_url: String,
}

impl AccountClient {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Exchanges credentials for an access token
    pub async fn login(&self, email: &str, password: &str) -> AppResult<String> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::InvalidInput(
                "email and password are required".to_string(),
            ));
        }

        let url = format!("{}/api/v1/login", self.api_url);
        let token = self
            .request_token(&url, &LoginRequest { email, password }, "Login failed")
            .await?;
        tracing::info!(email = %email, "Logged in");
        Ok(token)
    }

    /// Creates an account and returns its first access token
    pub async fn signup(&self, name: &str, email: &str, password: &str) -> AppResult<String> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::InvalidInput(
                "email and password are required".to_string(),
            ));
        }

        let url = format!("{}/signup", self.api_url);
        let body = SignupRequest {
            name,
            email,
            password,
        };
        let token = self.request_token(&url, &body, "Signup failed").await?;
        tracing::info!(email = %email, "Account created");
        Ok(token)
    }

    async fn request_token<B: Serialize + Sync>(
        &self,
        url: &str,
        body: &B,
        fallback: &str,
    ) -> AppResult<String> {
        let response = self
            .http_client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Auth(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::Auth(e.to_string()))?;

        if !status.is_success() {
            return Err(AppError::Auth(error_message(&text).unwrap_or_else(|| {
                format!("{} (status {})", fallback, status)
            })));
        }

        let parsed: TokenResponse = serde_json::from_str(&text)
            .map_err(|e| AppError::Auth(format!("unexpected token response: {}", e)))?;
        Ok(parsed.access_token)
    }
}

/// Pulls a human-readable message out of an error body
fn error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed.message.or_else(|| match parsed.detail? {
        serde_json::Value::String(detail) => Some(detail),
        other => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_message() {
        assert_eq!(
            error_message(r#"{"message": "Invalid credentials", "detail": "x"}"#),
            Some("Invalid credentials".to_string())
        );
    }

    #[test]
    fn test_error_message_from_detail() {
        assert_eq!(
            error_message(r#"{"detail": "Email already registered"}"#),
            Some("Email already registered".to_string())
        );
    }

    #[test]
    fn test_error_message_absent() {
        assert_eq!(error_message("Internal Server Error"), None);
        assert_eq!(error_message("{}"), None);
    }

    #[tokio::test]
    async fn test_blank_credentials_rejected_locally() {
        let client = AccountClient::new("http://127.0.0.1:9");
        let err = client.login(" ", "secret").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
