//! Redirect listener
//!
//! Bridges the asynchronous "the authorization server redirected back"
//! event into a one-shot future awaited by the orchestrator.
//!
//! ```text
//!   idle ──register──► awaiting_redirect ──┬─► code_received
//!                                          ├─► cancelled   (surface closed,
//!                                          │                superseded)
//!                                          ├─► timed_out   (deadline)
//!                                          └─► missing_code (redirect
//!                                                            without code)
//! ```
//!
//! The listener holds at most one registration. Platform adapters never see
//! the listener itself; they get a [`RedirectSink`] bound to one attempt, so
//! a late delivery to a superseded attempt is silently ignored.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

/// Terminal state of one redirect wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    /// Redirect carried an authorization code
    CodeReceived(String),
    /// Surface was closed, or a newer attempt replaced this one
    Cancelled,
    /// Deadline elapsed without a matching redirect
    TimedOut,
    /// Redirect matched but carried no code (typically an OAuth error)
    MissingCode { error: Option<String>, error_description: Option<String> },
}

struct Registration {
    attempt: u64,
    sender: oneshot::Sender<RedirectOutcome>,
}

#[derive(Default)]
struct ListenerState {
    next_attempt: u64,
    slot: Option<Registration>,
}

impl ListenerState {
    /// Take the registration if it still belongs to `attempt`
    fn take_if(&mut self, attempt: u64) -> Option<Registration> {
        if self.slot.as_ref().is_some_and(|slot| slot.attempt == attempt) {
            self.slot.take()
        } else {
            None
        }
    }
}

/// Single-slot redirect listener owned by the auth orchestrator
#[derive(Clone, Default)]
pub struct RedirectListener {
    state: Arc<Mutex<ListenerState>>,
}

impl RedirectListener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start waiting for a redirect to `redirect_uri`
    ///
    /// Any residual registration is removed first; its waiter resolves as
    /// [`RedirectOutcome::Cancelled`]. The deadline is fixed now.
    pub fn register(&self, redirect_uri: impl Into<String>, timeout: Duration) -> PendingRedirect {
        let redirect_uri = redirect_uri.into();
        let (sender, receiver) = oneshot::channel();

        let (attempt, superseded) = {
            let mut state = self.state.lock();
            state.next_attempt += 1;
            let attempt = state.next_attempt;
            let superseded = state.slot.replace(Registration { attempt, sender });
            (attempt, superseded)
        };

        if let Some(old) = superseded {
            warn!(attempt = old.attempt, "Replacing stale redirect registration");
            let _ = old.sender.send(RedirectOutcome::Cancelled);
        }
        debug!(attempt, redirect_uri = %redirect_uri, "Redirect listener registered");

        PendingRedirect {
            attempt,
            redirect_uri,
            timeout,
            deadline: Instant::now() + timeout,
            receiver,
            state: Arc::clone(&self.state),
        }
    }

    /// Drop the current registration, if any
    ///
    /// The waiter (if still alive) resolves as cancelled.
    pub fn unregister(&self) {
        let removed = self.state.lock().slot.take();
        if let Some(registration) = removed {
            debug!(attempt = registration.attempt, "Redirect listener unregistered");
        }
    }

    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.state.lock().slot.is_some()
    }
}

/// Pending wait for one attempt's redirect
pub struct PendingRedirect {
    attempt: u64,
    redirect_uri: String,
    timeout: Duration,
    deadline: Instant,
    receiver: oneshot::Receiver<RedirectOutcome>,
    state: Arc<Mutex<ListenerState>>,
}

impl PendingRedirect {
    /// Handle for platform adapters to feed captured URLs into this attempt
    #[must_use]
    pub fn sink(&self) -> RedirectSink {
        RedirectSink {
            attempt: self.attempt,
            redirect_uri: self.redirect_uri.clone(),
            state: Arc::clone(&self.state),
        }
    }

    /// Configured wait ceiling
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve exactly once
    ///
    /// On deadline the registration is torn down before returning.
    pub async fn outcome(self) -> RedirectOutcome {
        let Self { attempt, deadline, receiver, state, .. } = self;

        match tokio::time::timeout_at(deadline, receiver).await {
            Ok(Ok(outcome)) => outcome,
            // Sender dropped: unregistered from outside
            Ok(Err(_)) => RedirectOutcome::Cancelled,
            Err(_) => {
                state.lock().take_if(attempt);
                warn!(attempt, "Redirect wait timed out");
                RedirectOutcome::TimedOut
            }
        }
    }
}

/// Cloneable handle bound to a single registration
#[derive(Clone)]
pub struct RedirectSink {
    attempt: u64,
    redirect_uri: String,
    state: Arc<Mutex<ListenerState>>,
}

impl RedirectSink {
    /// Redirect URI this attempt waits for
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Feed a URL observed by the platform surface
    ///
    /// Returns `true` when the URL matched the registered redirect URI and
    /// settled the attempt. Non-matching URLs and deliveries after the
    /// attempt settled (or was superseded) return `false`.
    pub fn deliver(&self, url: &str) -> bool {
        let Some(outcome) = parse_redirect(url, &self.redirect_uri) else {
            debug!(attempt = self.attempt, "Ignoring navigation that does not match redirect URI");
            return false;
        };
        self.settle(outcome)
    }

    /// Report that the user closed the surface
    pub fn cancel(&self) -> bool {
        self.settle(RedirectOutcome::Cancelled)
    }

    /// Whether this attempt is still waiting
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.lock().slot.as_ref().is_some_and(|slot| slot.attempt == self.attempt)
    }

    fn settle(&self, outcome: RedirectOutcome) -> bool {
        // Unregister before resolving so a second delivery finds an empty slot
        let Some(registration) = self.state.lock().take_if(self.attempt) else {
            debug!(attempt = self.attempt, "Redirect attempt already settled");
            return false;
        };
        debug!(attempt = self.attempt, outcome = outcome_name(&outcome), "Redirect settled");
        let _ = registration.sender.send(outcome);
        true
    }
}

impl fmt::Debug for RedirectSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedirectSink")
            .field("attempt", &self.attempt)
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

fn outcome_name(outcome: &RedirectOutcome) -> &'static str {
    match outcome {
        RedirectOutcome::CodeReceived(_) => "code_received",
        RedirectOutcome::Cancelled => "cancelled",
        RedirectOutcome::TimedOut => "timed_out",
        RedirectOutcome::MissingCode { .. } => "missing_code",
    }
}

/// Interpret `url` as a redirect to `redirect_uri`
///
/// Returns `None` when the URL is not a redirect to the registered URI
/// (scheme, host, port and path must match). Otherwise returns either the
/// authorization code or [`RedirectOutcome::MissingCode`] with the server's
/// `error`/`error_description` parameters.
#[must_use]
pub fn parse_redirect(url: &str, redirect_uri: &str) -> Option<RedirectOutcome> {
    match (Url::parse(url), Url::parse(redirect_uri)) {
        (Ok(candidate), Ok(expected)) => {
            if !same_endpoint(&candidate, &expected) {
                return None;
            }
            Some(outcome_from_query(&candidate))
        }
        _ => parse_redirect_fallback(url, redirect_uri),
    }
}

fn same_endpoint(candidate: &Url, expected: &Url) -> bool {
    candidate.scheme() == expected.scheme()
        && candidate.host_str() == expected.host_str()
        && candidate.port_or_known_default() == expected.port_or_known_default()
        && candidate.path().trim_end_matches('/') == expected.path().trim_end_matches('/')
}

fn outcome_from_query(url: &Url) -> RedirectOutcome {
    let mut code = None;
    let mut error = None;
    let mut error_description = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" if code.is_none() => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => error_description = Some(value.into_owned()),
            _ => {}
        }
    }

    match code.filter(|c| !c.is_empty()) {
        Some(code) => RedirectOutcome::CodeReceived(code),
        None => RedirectOutcome::MissingCode { error, error_description },
    }
}

/// String-level matching for URLs the structured parser rejects
fn parse_redirect_fallback(url: &str, redirect_uri: &str) -> Option<RedirectOutcome> {
    let prefix = redirect_uri.trim_end_matches('/');
    let rest = url.strip_prefix(prefix)?;
    if !(rest.is_empty() || rest.starts_with(['?', '/', '#'])) {
        return None;
    }

    let query = url
        .split_once('?')
        .map_or("", |(_, tail)| tail.split('#').next().unwrap_or_default());
    let decode =
        |raw: &str| urlencoding::decode(raw).map_or_else(|_| raw.to_string(), |v| v.into_owned());

    let mut code = None;
    let mut error = None;
    let mut error_description = None;
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "code" if code.is_none() && !value.is_empty() => code = Some(decode(value)),
            "error" => error = Some(decode(value)),
            "error_description" => error_description = Some(decode(value)),
            _ => {}
        }
    }

    Some(match code {
        Some(code) => RedirectOutcome::CodeReceived(code),
        None => RedirectOutcome::MissingCode { error, error_description },
    })
}
