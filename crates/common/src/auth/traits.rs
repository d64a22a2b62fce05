//! Seams between the auth core and the platform
//!
//! These traits enable dependency injection and testing by abstracting the
//! interactive browser surface and wall-clock time.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use super::error::AuthError;
use super::redirect::RedirectSink;

/// Platform capability to show the authorization page
///
/// One implementation per runtime target (loopback server + system browser,
/// paste-back prompt, embedded web view, ...). The launcher forwards every
/// URL the surface navigates to into `sink.deliver`, and calls
/// `sink.cancel` when the user closes the surface.
#[async_trait]
pub trait InteractiveAuthLauncher: Send + Sync {
    /// Open the surface at `auth_url`
    ///
    /// # Errors
    /// Returns [`AuthError::BrowserLaunch`] if the surface cannot be shown.
    async fn open(
        &self,
        auth_url: &str,
        redirect_uri: &str,
        sink: RedirectSink,
    ) -> Result<Box<dyn BrowserSession>, AuthError>;
}

#[async_trait]
impl<T: InteractiveAuthLauncher + ?Sized> InteractiveAuthLauncher for Arc<T> {
    async fn open(
        &self,
        auth_url: &str,
        redirect_uri: &str,
        sink: RedirectSink,
    ) -> Result<Box<dyn BrowserSession>, AuthError> {
        (**self).open(auth_url, redirect_uri, sink).await
    }
}

/// An open authorization surface
#[async_trait]
pub trait BrowserSession: Send {
    /// Force-close the surface and release its resources
    async fn close(&mut self);
}

/// Wall-clock source for token expiry
pub trait Clock: Send + Sync {
    fn system_time(&self) -> SystemTime;

    /// Milliseconds since the UNIX epoch
    fn millis_since_epoch(&self) -> u64 {
        self.system_time()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default()
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn system_time(&self) -> SystemTime {
        (**self).system_time()
    }
}

/// Real system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}
