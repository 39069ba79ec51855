use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::error::{AppError, AppResult};
use crate::models::TaskId;

/// Key of a persisted task id, scoped to a session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreKey {
    RecommendationTask(String),
    EmbeddingTask(String),
}

impl Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKey::RecommendationTask(session) => {
                write!(f, "recommendation_task_id:{}", session.to_lowercase())
            }
            StoreKey::EmbeddingTask(session) => {
                write!(f, "embedding_task_id:{}", session.to_lowercase())
            }
        }
    }
}

/// Durable home for the id of an outstanding task
///
/// A saved id lets a later run resume polling instead of submitting again.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TaskStore: Send + Sync {
    async fn load(&self, key: &StoreKey) -> AppResult<Option<TaskId>>;

    async fn save(&self, key: &StoreKey, task_id: &TaskId) -> AppResult<()>;

    /// Removes the entry; clearing a missing key is not an error
    async fn clear(&self, key: &StoreKey) -> AppResult<()>;

    /// Store name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Process-local store, lost on exit
#[derive(Default)]
pub struct MemoryTaskStore {
    entries: Mutex<HashMap<String, TaskId>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TaskStore for MemoryTaskStore {
    async fn load(&self, key: &StoreKey) -> AppResult<Option<TaskId>> {
        Ok(self.entries.lock().await.get(&key.to_string()).cloned())
    }

    async fn save(&self, key: &StoreKey, task_id: &TaskId) -> AppResult<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), task_id.clone());
        Ok(())
    }

    async fn clear(&self, key: &StoreKey) -> AppResult<()> {
        self.entries.lock().await.remove(&key.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Store backed by a JSON object file, surviving restarts
pub struct FileTaskStore {
    path: PathBuf,
    // serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileTaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> AppResult<BTreeMap<String, TaskId>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                AppError::Storage(format!(
                    "Corrupt task store {}: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_entries(&self, entries: &BTreeMap<String, TaskId>) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl TaskStore for FileTaskStore {
    async fn load(&self, key: &StoreKey) -> AppResult<Option<TaskId>> {
        let _guard = self.lock.lock().await;
        let entries = self.read_entries().await?;
        // hand-edited files can hold blank ids
        Ok(entries
            .get(&key.to_string())
            .and_then(|task_id| TaskId::new(task_id.as_str())))
    }

    async fn save(&self, key: &StoreKey, task_id: &TaskId) -> AppResult<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;
        entries.insert(key.to_string(), task_id.clone());
        self.write_entries(&entries).await?;

        tracing::debug!(key = %key, task_id = %task_id, path = %self.path.display(), "Task id persisted");
        Ok(())
    }

    async fn clear(&self, key: &StoreKey) -> AppResult<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;
        if entries.remove(&key.to_string()).is_some() {
            self.write_entries(&entries).await?;
            tracing::debug!(key = %key, "Persisted task id cleared");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
