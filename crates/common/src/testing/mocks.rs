//! Test doubles for the auth core seams
//!
//! - [`ScriptedLauncher`]: deterministic stand-in for the browser surface
//! - [`FailingTokenStore`]: in-memory store with injectable failures

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::auth::{
    AuthError, BrowserSession, InteractiveAuthLauncher, MemoryTokenStore, RedirectSink,
    StorageKey, StoreError, TokenStore,
};

/// What the scripted surface does once opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchScript {
    /// Navigate through each URL in order (non-matching ones are ignored
    /// by the listener, like intermediate login pages)
    Navigate(Vec<String>),
    /// User closes the surface immediately
    Close,
    /// Stay open; the test drives the attempt through [`ScriptedLauncher::sink`]
    Hold,
    /// Surface cannot be shown
    Fail(String),
}

/// Scripted interactive launcher
///
/// Records every authorization URL it is asked to open and how many
/// sessions were closed.
#[derive(Debug)]
pub struct ScriptedLauncher {
    script: Mutex<LaunchScript>,
    opened: Mutex<Vec<String>>,
    sink: Mutex<Option<RedirectSink>>,
    closed: Arc<AtomicUsize>,
}

impl ScriptedLauncher {
    #[must_use]
    pub fn new(script: LaunchScript) -> Self {
        Self {
            script: Mutex::new(script),
            opened: Mutex::new(Vec::new()),
            sink: Mutex::new(None),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Launcher that immediately lands on `url`
    #[must_use]
    pub fn redirect_to(url: impl Into<String>) -> Self {
        Self::new(LaunchScript::Navigate(vec![url.into()]))
    }

    pub fn set_script(&self, script: LaunchScript) {
        *self.script.lock() = script;
    }

    /// Authorization URLs opened so far
    #[must_use]
    pub fn opened_urls(&self) -> Vec<String> {
        self.opened.lock().clone()
    }

    #[must_use]
    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Sink of the most recent attempt
    #[must_use]
    pub fn sink(&self) -> Option<RedirectSink> {
        self.sink.lock().clone()
    }
}

#[async_trait]
impl InteractiveAuthLauncher for ScriptedLauncher {
    async fn open(
        &self,
        auth_url: &str,
        _redirect_uri: &str,
        sink: RedirectSink,
    ) -> Result<Box<dyn BrowserSession>, AuthError> {
        let script = self.script.lock().clone();
        if let LaunchScript::Fail(reason) = &script {
            return Err(AuthError::BrowserLaunch(reason.clone()));
        }

        self.opened.lock().push(auth_url.to_string());
        *self.sink.lock() = Some(sink.clone());

        match script {
            LaunchScript::Navigate(urls) => {
                for url in urls {
                    sink.deliver(&url);
                }
            }
            LaunchScript::Close => {
                sink.cancel();
            }
            LaunchScript::Hold | LaunchScript::Fail(_) => {}
        }

        Ok(Box::new(ScriptedSession { closed: Arc::clone(&self.closed) }))
    }
}

struct ScriptedSession {
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Memory store with injectable failures
#[derive(Debug, Default)]
pub struct FailingTokenStore {
    inner: MemoryTokenStore,
    failing_writes: Mutex<HashSet<StorageKey>>,
    fail_reads: Mutex<bool>,
}

impl FailingTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write of `key` fail with a backend error
    pub fn fail_writes_to(&self, key: StorageKey) {
        self.failing_writes.lock().insert(key);
    }

    pub fn fail_reads(&self, fail: bool) {
        *self.fail_reads.lock() = fail;
    }

    /// Underlying store, bypassing injected failures
    #[must_use]
    pub fn inner(&self) -> &MemoryTokenStore {
        &self.inner
    }

    fn check_write(&self, key: StorageKey) -> Result<(), StoreError> {
        if self.failing_writes.lock().contains(&key) {
            return Err(StoreError::Backend(format!("injected write failure for {key}")));
        }
        Ok(())
    }
}

#[async_trait]
impl TokenStore for FailingTokenStore {
    async fn get(&self, key: StorageKey) -> Result<Option<String>, StoreError> {
        if *self.fail_reads.lock() {
            return Err(StoreError::Backend(format!("injected read failure for {key}")));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: StorageKey, value: &str) -> Result<(), StoreError> {
        self.check_write(key)?;
        self.inner.set(key, value).await
    }

    async fn set_many(&self, entries: &[(StorageKey, String)]) -> Result<(), StoreError> {
        for (key, _) in entries {
            self.check_write(*key)?;
        }
        self.inner.set_many(entries).await
    }

    async fn remove(&self, key: StorageKey) -> Result<(), StoreError> {
        self.inner.remove(key).await
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        self.inner.clear_all().await
    }
}
