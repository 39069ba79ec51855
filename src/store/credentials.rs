use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::AppResult;
use crate::models::CurrentUser;

/// File holding the access token issued at login
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn token(&self) -> AppResult<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(token) if token.trim().is_empty() => Ok(None),
            Ok(token) => Ok(Some(token.trim().to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn set_token(&self, token: &str) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, token.trim()).await?;
        tracing::debug!(path = %self.path.display(), "Access token stored");
        Ok(())
    }

    pub async fn remove_token(&self) -> AppResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// The user the stored token was issued for
    ///
    /// `None` when there is no token or it cannot be decoded.
    pub async fn current_user(&self) -> AppResult<Option<CurrentUser>> {
        let user = self
            .token()
            .await?
            .and_then(|token| CurrentUser::from_token(&token));
        Ok(user)
    }
}
