use redis::AsyncCommands;
use redis::Client;

use crate::error::AppResult;
use crate::models::TaskId;

use super::task_store::{StoreKey, TaskStore};

/// Abandoned task ids expire after a day
const TASK_ID_TTL: u64 = 86_400;

/// Creates a Redis client for task id persistence
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Task store shared between machines through Redis
#[derive(Clone)]
pub struct RedisTaskStore {
    redis_client: Client,
    ttl: u64,
}

impl RedisTaskStore {
    pub fn new(redis_client: Client) -> Self {
        Self {
            redis_client,
            ttl: TASK_ID_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = ttl;
        self
    }
}

#[async_trait::async_trait]
impl TaskStore for RedisTaskStore {
    async fn load(&self, key: &StoreKey) -> AppResult<Option<TaskId>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let stored: Option<String> = conn.get(format!("{}", key)).await?;
        Ok(stored.and_then(TaskId::new))
    }

    async fn save(&self, key: &StoreKey, task_id: &TaskId) -> AppResult<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: () = conn
            .set_ex(format!("{}", key), task_id.as_str(), self.ttl)
            .await?;
        tracing::debug!(key = %key, task_id = %task_id, ttl = self.ttl, "Task id persisted to Redis");
        Ok(())
    }

    async fn clear(&self, key: &StoreKey) -> AppResult<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: () = conn.del(format!("{}", key)).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

// These need a live server at REDIS_URL: cargo test -- --ignored
#[cfg(test)]
mod tests {
    use super::*;

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(create_redis_client("not a url").is_err());
    }

    #[tokio::test]
    #[ignore = "requires a running Redis at REDIS_URL"]
    async fn test_missing_key_loads_none() {
        let store = RedisTaskStore::new(create_redis_client(&redis_url()).unwrap());
        let key = StoreKey::RecommendationTask("nonexistent_session_12345".to_string());
        assert_eq!(store.load(&key).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis at REDIS_URL"]
    async fn test_save_load_clear() {
        let store = RedisTaskStore::new(create_redis_client(&redis_url()).unwrap()).with_ttl(60);
        let key = StoreKey::RecommendationTask("redis_roundtrip@example.com".to_string());
        let task_id = TaskId::new("abc123").unwrap();

        store.save(&key, &task_id).await.unwrap();
        assert_eq!(store.load(&key).await.unwrap(), Some(task_id));

        store.clear(&key).await.unwrap();
        assert_eq!(store.load(&key).await.unwrap(), None);
    }
}
