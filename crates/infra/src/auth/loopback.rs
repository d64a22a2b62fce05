//! Loopback redirect capture
//!
//! Serves the registered `http://localhost:<port>/<path>` redirect URI from
//! a short-lived axum server and opens the authorization page in the system
//! browser. Every request the browser makes to the server is handed to the
//! attempt's [`RedirectSink`]; the first one on the redirect path settles it.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::Html;
use axum::Router;
use thermowatch_common::auth::{
    parse_redirect, AuthError, BrowserSession, InteractiveAuthLauncher, RedirectOutcome,
    RedirectSink,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization Complete</title></head>
<body><h1>Authorization Successful</h1><p>You can close this window and return to Thermowatch.</p></body>
</html>"#;

const FAILURE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization Failed</title></head>
<body><h1>Authorization Failed</h1><p>The authorization server did not return a code. Please try again.</p></body>
</html>"#;

const STALE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>No Login In Progress</title></head>
<body><h1>No Login In Progress</h1><p>This sign-in link has already been used or has expired.</p></body>
</html>"#;

/// Opens a URL in the user's browser
pub type BrowserOpener = Arc<dyn Fn(&str) -> std::io::Result<()> + Send + Sync>;

/// [`InteractiveAuthLauncher`] for loopback redirect URIs
///
/// Each `open` binds the port named by the redirect URI, so the URI
/// registered with the authorization server must use a fixed port.
#[derive(Clone)]
pub struct LoopbackBrowserLauncher {
    opener: BrowserOpener,
}

impl LoopbackBrowserLauncher {
    /// Launcher that opens the system browser
    #[must_use]
    pub fn new() -> Self {
        Self::with_opener(Arc::new(|url: &str| open::that_detached(url)))
    }

    /// Launcher with a custom way to show the authorization page
    #[must_use]
    pub fn with_opener(opener: BrowserOpener) -> Self {
        Self { opener }
    }
}

impl Default for LoopbackBrowserLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LoopbackBrowserLauncher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackBrowserLauncher").finish_non_exhaustive()
    }
}

/// Whether `redirect_uri` can be served by [`LoopbackBrowserLauncher`]
#[must_use]
pub fn is_loopback_redirect(redirect_uri: &str) -> bool {
    loopback_endpoint(redirect_uri).is_ok()
}

#[async_trait]
impl InteractiveAuthLauncher for LoopbackBrowserLauncher {
    async fn open(
        &self,
        auth_url: &str,
        redirect_uri: &str,
        sink: RedirectSink,
    ) -> Result<Box<dyn BrowserSession>, AuthError> {
        let endpoint = loopback_endpoint(redirect_uri)?;

        let listener = TcpListener::bind(endpoint.bind_addr).await.map_err(|err| {
            AuthError::BrowserLaunch(format!(
                "failed to bind loopback server on {}: {err}",
                endpoint.bind_addr
            ))
        })?;

        let server =
            CallbackServer::start(listener, CallbackState { sink, origin: endpoint.origin });
        info!(addr = %endpoint.bind_addr, "Loopback redirect server listening");

        if let Err(err) = (self.opener)(auth_url) {
            server.shutdown().await;
            return Err(AuthError::BrowserLaunch(format!("failed to open system browser: {err}")));
        }

        Ok(Box::new(server))
    }
}

struct LoopbackEndpoint {
    bind_addr: SocketAddr,
    /// `scheme://host:port` as written in the redirect URI
    origin: String,
}

fn loopback_endpoint(redirect_uri: &str) -> Result<LoopbackEndpoint, AuthError> {
    let url = Url::parse(redirect_uri)
        .map_err(|err| AuthError::Config(format!("invalid redirect URI {redirect_uri}: {err}")))?;

    if url.scheme() != "http" {
        return Err(AuthError::Config(format!(
            "loopback redirect URI must use http, got {}",
            url.scheme()
        )));
    }

    let host = url.host_str().unwrap_or_default();
    let ip = match host {
        "localhost" | "127.0.0.1" => IpAddr::V4(Ipv4Addr::LOCALHOST),
        "[::1]" => IpAddr::V6(Ipv6Addr::LOCALHOST),
        other => {
            return Err(AuthError::Config(format!(
                "redirect URI host {other} is not a loopback address"
            )))
        }
    };
    let port = url.port_or_known_default().unwrap_or(80);

    Ok(LoopbackEndpoint {
        bind_addr: SocketAddr::new(ip, port),
        origin: format!("{}://{host}:{port}", url.scheme()),
    })
}

#[derive(Clone)]
struct CallbackState {
    sink: RedirectSink,
    origin: String,
}

/// Running loopback server; closing it stops accepting connections
struct CallbackServer {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CallbackServer {
    fn start(listener: TcpListener, state: CallbackState) -> Self {
        let app = Router::new().fallback(handle_redirect).with_state(state);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!("Loopback redirect server error: {}", err);
            }
        });

        Self { shutdown_tx: Some(shutdown_tx), handle: Some(handle) }
    }

    async fn shutdown(mut self) {
        self.stop().await;
    }

    async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut handle) = self.handle.take() {
            // An idle keep-alive connection can hold graceful shutdown open
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
                warn!("Loopback redirect server did not stop in time, aborting");
                handle.abort();
            }
        }
        debug!("Loopback redirect server stopped");
    }
}

#[async_trait]
impl BrowserSession for CallbackServer {
    async fn close(&mut self) {
        self.stop().await;
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                handle.abort();
            }
        }
    }
}

async fn handle_redirect(
    State(state): State<CallbackState>,
    uri: Uri,
) -> (StatusCode, Html<&'static str>) {
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
    let full_url = format!("{}{path_and_query}", state.origin);

    // Classify first so the page reflects what the server sent
    let page = match parse_redirect(&full_url, state.sink.redirect_uri()) {
        None => return (StatusCode::NOT_FOUND, Html("Not Found")),
        Some(RedirectOutcome::CodeReceived(_)) => SUCCESS_PAGE,
        Some(_) => FAILURE_PAGE,
    };

    if state.sink.deliver(&full_url) {
        (StatusCode::OK, Html(page))
    } else {
        (StatusCode::GONE, Html(STALE_PAGE))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use reqwest::Client;
    use thermowatch_common::auth::RedirectListener;

    use super::*;

    fn free_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    fn recording_launcher() -> (LoopbackBrowserLauncher, Arc<Mutex<Vec<String>>>) {
        let opened = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&opened);
        let launcher = LoopbackBrowserLauncher::with_opener(Arc::new(move |url: &str| {
            record.lock().unwrap().push(url.to_string());
            Ok(())
        }));
        (launcher, opened)
    }

    fn http() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    /// Validates the full loopback round trip.
    ///
    /// # Test Steps
    /// 1. Register a redirect wait and open the launcher on a free port
    /// 2. Hit a non-matching path (ignored, 404)
    /// 3. Hit the redirect path with `code=abc123`
    ///
    /// Assertions:
    /// - The authorization URL was handed to the opener
    /// - The success page is served
    /// - The attempt settles with the code
    #[tokio::test]
    async fn delivers_code_from_browser_request() {
        let port = free_port();
        let redirect_uri = format!("http://localhost:{port}/callback");
        let listener = RedirectListener::new();
        let pending = listener.register(redirect_uri.clone(), Duration::from_secs(30));
        let (launcher, opened) = recording_launcher();

        let mut session = launcher
            .open("https://auth.example/authorize?x=1", &redirect_uri, pending.sink())
            .await
            .unwrap();
        assert_eq!(opened.lock().unwrap().as_slice(), ["https://auth.example/authorize?x=1"]);

        let favicon =
            http().get(format!("http://127.0.0.1:{port}/favicon.ico")).send().await.unwrap();
        assert_eq!(favicon.status(), StatusCode::NOT_FOUND);

        let response = http()
            .get(format!("http://127.0.0.1:{port}/callback?code=abc123&state=ignored"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.text().await.unwrap().contains("Authorization Successful"));

        assert_eq!(pending.outcome().await, RedirectOutcome::CodeReceived("abc123".into()));
        session.close().await;
    }

    /// Validates an error redirect settles the attempt with the server's
    /// error and serves the failure page.
    #[tokio::test]
    async fn error_redirect_serves_failure_page() {
        let port = free_port();
        let redirect_uri = format!("http://localhost:{port}");
        let listener = RedirectListener::new();
        let pending = listener.register(redirect_uri.clone(), Duration::from_secs(30));
        let (launcher, _) = recording_launcher();

        let mut session =
            launcher.open("https://auth.example", &redirect_uri, pending.sink()).await.unwrap();

        let response = http()
            .get(format!("http://127.0.0.1:{port}/?error=access_denied"))
            .send()
            .await
            .unwrap();
        assert!(response.text().await.unwrap().contains("Authorization Failed"));

        assert_eq!(pending.outcome().await, RedirectOutcome::MissingCode {
            error: Some("access_denied".into()),
            error_description: None,
        });
        session.close().await;
    }

    /// Validates a second hit after the attempt settled gets the stale page.
    #[tokio::test]
    async fn second_delivery_is_stale() {
        let port = free_port();
        let redirect_uri = format!("http://localhost:{port}/cb");
        let listener = RedirectListener::new();
        let pending = listener.register(redirect_uri.clone(), Duration::from_secs(30));
        let (launcher, _) = recording_launcher();
        let mut session =
            launcher.open("https://auth.example", &redirect_uri, pending.sink()).await.unwrap();

        let url = format!("http://127.0.0.1:{port}/cb?code=first");
        assert_eq!(http().get(&url).send().await.unwrap().status(), StatusCode::OK);
        assert_eq!(http().get(&url).send().await.unwrap().status(), StatusCode::GONE);

        assert_eq!(pending.outcome().await, RedirectOutcome::CodeReceived("first".into()));
        session.close().await;
    }

    /// Validates closing the session releases the port.
    #[tokio::test]
    async fn close_releases_port() {
        let port = free_port();
        let redirect_uri = format!("http://localhost:{port}");
        let listener = RedirectListener::new();
        let pending = listener.register(redirect_uri.clone(), Duration::from_secs(30));
        let (launcher, _) = recording_launcher();

        let mut session =
            launcher.open("https://auth.example", &redirect_uri, pending.sink()).await.unwrap();
        session.close().await;

        assert!(TcpListener::bind(("127.0.0.1", port)).await.is_ok());
    }

    /// Validates an opener failure maps to `BrowserLaunch` and the server is
    /// torn down.
    #[tokio::test]
    async fn opener_failure_is_browser_launch_error() {
        let port = free_port();
        let redirect_uri = format!("http://localhost:{port}");
        let listener = RedirectListener::new();
        let pending = listener.register(redirect_uri.clone(), Duration::from_secs(30));
        let launcher = LoopbackBrowserLauncher::with_opener(Arc::new(|_: &str| {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no browser"))
        }));

        let result = launcher.open("https://auth.example", &redirect_uri, pending.sink()).await;
        assert!(matches!(
            result,
            Err(AuthError::BrowserLaunch(ref msg)) if msg.contains("no browser")
        ));
        assert!(TcpListener::bind(("127.0.0.1", port)).await.is_ok());
    }

    /// Validates a port already in use surfaces as `BrowserLaunch`.
    #[tokio::test]
    async fn busy_port_is_browser_launch_error() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = occupied.local_addr().unwrap().port();
        let redirect_uri = format!("http://localhost:{port}");
        let listener = RedirectListener::new();
        let pending = listener.register(redirect_uri.clone(), Duration::from_secs(30));
        let (launcher, opened) = recording_launcher();

        let result = launcher.open("https://auth.example", &redirect_uri, pending.sink()).await;
        assert!(matches!(result, Err(AuthError::BrowserLaunch(_))));
        assert!(opened.lock().unwrap().is_empty(), "browser must not open without a server");
    }

    #[test]
    fn loopback_detection() {
        assert!(is_loopback_redirect("http://localhost:8081"));
        assert!(is_loopback_redirect("http://127.0.0.1:8081/callback"));
        assert!(is_loopback_redirect("http://[::1]:8081/"));
        assert!(!is_loopback_redirect("thermowatch://oauth2"));
        assert!(!is_loopback_redirect("https://localhost:8081"));
        assert!(!is_loopback_redirect("http://example.com:8081"));
    }
}
