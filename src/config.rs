use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::services::poller::PollPolicy;

/// Prefix shared by every environment variable the client reads
pub const ENV_PREFIX: &str = "JOBGENIE_";

/// Client configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Worker base URL serving recommendation and embedding tasks
    #[serde(default = "default_worker_url")]
    pub worker_url: String,

    /// API base URL for login, signup and resume upload
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Backend base URL serving the public job list
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Delay between two status requests for the same task
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Status requests issued before giving up on a task
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Directory holding the stored credential and persisted task ids
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Redis connection URL; task ids are kept in Redis instead of the state directory when set
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Shared demo account used by `login --demo`
    #[serde(default)]
    pub demo_email: Option<String>,

    #[serde(default)]
    pub demo_password: Option<String>,
}

fn default_worker_url() -> String {
    "http://localhost:8001".to_string()
}

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    30
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".jobgenie")
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_iter(std::env::vars())
    }

    /// Load configuration from an explicit set of variables
    pub fn from_iter<I>(vars: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::prefixed(ENV_PREFIX)
            .from_iter::<_, Config>(vars)
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

        if config.max_attempts == 0 {
            anyhow::bail!("Failed to load config: max_attempts must be at least 1");
        }

        Ok(config)
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.max_attempts,
        }
    }

    /// Demo account credentials, when both are configured and non-blank
    pub fn demo_credentials(&self) -> Option<(&str, &str)> {
        let email = self.demo_email.as_deref().filter(|e| !e.trim().is_empty())?;
        let password = self.demo_password.as_deref().filter(|p| !p.is_empty())?;
        Some((email, password))
    }

    pub fn token_path(&self) -> PathBuf {
        self.state_dir.join("token")
    }

    pub fn task_store_path(&self) -> PathBuf {
        self.state_dir.join("tasks.json")
    }
}
