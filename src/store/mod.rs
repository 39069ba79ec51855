pub mod credentials;
pub mod redis;
pub mod result_cache;
pub mod task_store;

use std::sync::Arc;

pub use credentials::CredentialStore;
pub use self::redis::{create_redis_client, RedisTaskStore};
pub use result_cache::ResultCache;
pub use task_store::{FileTaskStore, MemoryTaskStore, StoreKey, TaskStore};

use crate::config::Config;

/// Picks the task store the configuration asks for
///
/// Redis when a URL is configured, otherwise a file in the state directory.
pub fn create_task_store(config: &Config) -> anyhow::Result<Arc<dyn TaskStore>> {
    match &config.redis_url {
        Some(url) => {
            let client = create_redis_client(url)?;
            tracing::info!("Persisting task ids in Redis");
            Ok(Arc::new(RedisTaskStore::new(client)))
        }
        None => {
            let path = config.task_store_path();
            tracing::info!(path = %path.display(), "Persisting task ids on disk");
            Ok(Arc::new(FileTaskStore::new(path)))
        }
    }
}
