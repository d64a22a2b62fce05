//! Paste-back redirect capture for custom URI schemes
//!
//! A terminal cannot intercept `thermowatch://oauth2?code=...`, so the user
//! copies the final URL from the browser's address bar (or the "can't open
//! this link" page) and pastes it here.

use std::sync::Arc;

use async_trait::async_trait;
use thermowatch_common::auth::{AuthError, BrowserSession, InteractiveAuthLauncher, RedirectSink};
use thermowatch_infra::auth::BrowserOpener;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// [`InteractiveAuthLauncher`] that reads the redirect URL from a line
/// reader (stdin in the binary)
///
/// An empty line or end of input counts as closing the surface.
pub struct PasteRedirectLauncher<R> {
    input: Arc<Mutex<R>>,
    opener: BrowserOpener,
}

impl PasteRedirectLauncher<BufReader<Stdin>> {
    /// Read from stdin and open the system browser
    pub fn stdin() -> Self {
        Self::new(
            BufReader::new(tokio::io::stdin()),
            Arc::new(|url: &str| open::that_detached(url)),
        )
    }
}

impl<R> PasteRedirectLauncher<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(input: R, opener: BrowserOpener) -> Self {
        Self { input: Arc::new(Mutex::new(input)), opener }
    }
}

#[async_trait]
impl<R> InteractiveAuthLauncher for PasteRedirectLauncher<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn open(
        &self,
        auth_url: &str,
        redirect_uri: &str,
        sink: RedirectSink,
    ) -> Result<Box<dyn BrowserSession>, AuthError> {
        // The URL is printed either way, so a missing browser is not fatal
        if let Err(err) = (self.opener)(auth_url) {
            warn!(error = %err, "Could not open the system browser");
        }
        eprintln!("Open this URL to sign in:\n\n  {auth_url}\n");
        eprintln!("After approving, paste the URL starting with {redirect_uri} below");
        eprintln!("(empty line cancels):");

        let input = Arc::clone(&self.input);
        let handle = tokio::spawn(read_redirect(input, sink));
        Ok(Box::new(PasteSession { handle: Some(handle) }))
    }
}

async fn read_redirect<R>(input: Arc<Mutex<R>>, sink: RedirectSink)
where
    R: AsyncBufRead + Unpin + Send,
{
    let mut input = input.lock().await;
    let mut line = String::new();

    loop {
        line.clear();
        let read = match input.read_line(&mut line).await {
            Ok(read) => read,
            Err(err) => {
                warn!(error = %err, "Failed to read pasted redirect URL");
                0
            }
        };

        let pasted = line.trim();
        if read == 0 || pasted.is_empty() {
            debug!("No redirect URL pasted; cancelling");
            sink.cancel();
            return;
        }

        if sink.deliver(pasted) {
            return;
        }
        if !sink.is_active() {
            return;
        }
        eprintln!("That URL does not start with {}; try again:", sink.redirect_uri());
    }
}

struct PasteSession {
    handle: Option<JoinHandle<()>>,
}

#[async_trait]
impl BrowserSession for PasteSession {
    async fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for PasteSession {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use thermowatch_common::auth::{RedirectListener, RedirectOutcome};
    use thermowatch_domain::constants::NATIVE_REDIRECT_URI as REDIRECT_URI;

    use super::*;

    fn launcher(input: &'static str) -> PasteRedirectLauncher<BufReader<Cursor<&'static [u8]>>> {
        PasteRedirectLauncher::new(
            BufReader::new(Cursor::new(input.as_bytes())),
            Arc::new(|_: &str| Ok(())),
        )
    }

    async fn outcome_for(input: &'static str) -> RedirectOutcome {
        let listener = RedirectListener::new();
        let pending = listener.register(REDIRECT_URI, Duration::from_secs(5));
        let mut session = launcher(input)
            .open("https://auth.example", REDIRECT_URI, pending.sink())
            .await
            .unwrap();
        let outcome = pending.outcome().await;
        session.close().await;
        outcome
    }

    /// Validates non-matching lines are skipped until the redirect URL
    /// arrives.
    #[tokio::test]
    async fn pasted_redirect_delivers_code() {
        let outcome =
            outcome_for("https://iam.viessmann.com/login\nthermowatch://oauth2?code=xyz\n").await;
        assert_eq!(outcome, RedirectOutcome::CodeReceived("xyz".into()));
    }

    #[tokio::test]
    async fn empty_line_cancels() {
        assert_eq!(outcome_for("\n").await, RedirectOutcome::Cancelled);
    }

    #[tokio::test]
    async fn end_of_input_cancels() {
        assert_eq!(outcome_for("").await, RedirectOutcome::Cancelled);
    }

    #[tokio::test]
    async fn pasted_error_redirect_is_missing_code() {
        let outcome = outcome_for("thermowatch://oauth2?error=access_denied\n").await;
        assert_eq!(outcome, RedirectOutcome::MissingCode {
            error: Some("access_denied".into()),
            error_description: None,
        });
    }

    /// Validates a browser that fails to open does not abort the attempt.
    #[tokio::test]
    async fn opener_failure_is_not_fatal() {
        let listener = RedirectListener::new();
        let pending = listener.register(REDIRECT_URI, Duration::from_secs(5));
        let launcher = PasteRedirectLauncher::new(
            BufReader::new(Cursor::new("thermowatch://oauth2?code=ok\n".as_bytes())),
            Arc::new(|_: &str| Err(std::io::Error::other("no browser"))),
        );

        let result = launcher.open("https://auth.example", REDIRECT_URI, pending.sink()).await;
        assert!(result.is_ok());
        assert_eq!(pending.outcome().await, RedirectOutcome::CodeReceived("ok".into()));
    }
}
