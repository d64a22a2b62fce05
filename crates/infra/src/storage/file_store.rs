//! JSON file token store
//!
//! Keeps the four token keys as one JSON object on disk. Every write
//! rewrites the whole object through a temporary file in the same directory
//! followed by a rename, so a crash never leaves a half-written file and
//! `set_many` lands atomically.

use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use thermowatch_common::auth::{StorageKey, StoreError, TokenStore};
use tokio::sync::Mutex;
use tokio::task;
use tracing::debug;

type TokenMap = BTreeMap<String, String>;

/// [`TokenStore`] persisted to a JSON file
///
/// The internal mutex serializes read-modify-write cycles from this process.
/// File I/O runs on the blocking pool. The temporary file is created with
/// owner-only permissions on Unix and keeps them after the rename.
#[derive(Debug)]
pub struct FileTokenStore {
    path: Arc<PathBuf>,
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: Arc::new(path.into()), lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T, StoreError> + Send + 'static,
    {
        let path = Arc::clone(&self.path);
        task::spawn_blocking(move || op(path.as_path()))
            .await
            .map_err(|e| StoreError::Backend(format!("spawn_blocking failed: {e}")))?
    }

    async fn update<F>(&self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut TokenMap) + Send + 'static,
    {
        self.blocking(move |path| {
            let mut map = read_map(path)?;
            let before = map.clone();
            apply(&mut map);
            if map == before {
                return Ok(());
            }
            write_map(path, &map)
        })
        .await
    }
}

fn read_map(path: &Path) -> Result<TokenMap, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(contents) if contents.trim().is_empty() => Ok(TokenMap::new()),
        Ok(contents) => Ok(serde_json::from_str(&contents)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(TokenMap::new()),
        Err(e) => Err(e.into()),
    }
}

fn write_map(path: &Path, map: &TokenMap) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    serde_json::to_writer_pretty(tmp.as_file_mut(), map)?;
    tmp.as_file_mut().flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::from(e.error))?;

    debug!(path = %path.display(), keys = map.len(), "Token file written");
    Ok(())
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self, key: StorageKey) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut map = self.blocking(read_map).await?;
        Ok(map.remove(key.as_str()))
    }

    async fn set(&self, key: StorageKey, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let value = value.to_string();
        self.update(move |map| {
            map.insert(key.as_str().to_string(), value);
        })
        .await
    }

    async fn set_many(&self, entries: &[(StorageKey, String)]) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let entries = entries.to_vec();
        self.update(move |map| {
            for (key, value) in entries {
                map.insert(key.as_str().to_string(), value);
            }
        })
        .await
    }

    async fn remove(&self, key: StorageKey) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.update(move |map| {
            map.remove(key.as_str());
        })
        .await
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(self.path.as_path()).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Token file removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
