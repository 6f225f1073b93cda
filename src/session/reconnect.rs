//! Automatic reconnection after an unexpected connection loss.
//!
//! The supervisor reacts to the socket's unexpected-close notification:
//! it raises a banner, retries the connect at a fixed delay until one
//! succeeds, then reauthenticates exactly once with the stored
//! credentials. Explicit logout never reaches this path; the socket only
//! reports closes the caller did not ask for.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::session::requests;
use crate::session::storage::CredentialStore;
use crate::state::{reconciler, StateStore};
use crate::transport::ChatSocket;

// ============================================================================
// Constants
// ============================================================================

/// Delay between connect attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Banner shown while reconnection is in progress.
pub const CONNECTION_LOST_BANNER: &str = "Connection lost. Reconnecting…";

// ============================================================================
// Types
// ============================================================================

/// Callback fired at a reconnection cycle boundary: once when the cycle
/// starts (banner up) and once when reauthentication settles.
pub type CycleHandler = Box<dyn Fn() + Send + Sync>;

/// Reconnection parameters.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Server URL to reconnect to.
    pub url: String,
    /// Delay between connect attempts.
    pub retry_delay: Duration,
    /// Banner text shown while reconnecting.
    pub banner_text: String,
}

impl ReconnectConfig {
    /// Creates a config with the default delay and banner.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            retry_delay: RECONNECT_DELAY,
            banner_text: CONNECTION_LOST_BANNER.to_string(),
        }
    }
}

/// Reconnection cycle state behind one lock so the single-flight check and
/// the banner always agree.
#[derive(Default)]
struct Progress {
    reconnecting: bool,
    banner: Option<String>,
}

// ============================================================================
// ReconnectSupervisor
// ============================================================================

/// Drives the connection-loss recovery cycle.
///
/// States: idle → reconnecting (banner up, fixed-delay connect retries) →
/// back to idle once a connect succeeds and reauthentication settles,
/// successfully or not. [`ReconnectSupervisor::connection_lost`] while a
/// cycle is already running is a no-op.
pub struct ReconnectSupervisor {
    socket: ChatSocket,
    credentials: Arc<dyn CredentialStore>,
    store: Arc<StateStore>,
    config: ReconnectConfig,
    progress: Mutex<Progress>,
    on_cycle_start: Mutex<Option<CycleHandler>>,
    on_reauth_success: Mutex<Option<CycleHandler>>,
    on_reauth_failure: Mutex<Option<CycleHandler>>,
}

impl ReconnectSupervisor {
    /// Creates an idle supervisor.
    #[must_use]
    pub fn new(
        socket: ChatSocket,
        credentials: Arc<dyn CredentialStore>,
        store: Arc<StateStore>,
        config: ReconnectConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            socket,
            credentials,
            store,
            config,
            progress: Mutex::new(Progress::default()),
            on_cycle_start: Mutex::new(None),
            on_reauth_success: Mutex::new(None),
            on_reauth_failure: Mutex::new(None),
        })
    }

    /// Returns the banner text while a cycle is running.
    #[must_use]
    pub fn banner(&self) -> Option<String> {
        self.progress.lock().banner.clone()
    }

    /// Returns `true` while a reconnection cycle is running.
    #[must_use]
    pub fn is_reconnecting(&self) -> bool {
        self.progress.lock().reconnecting
    }

    /// Sets the callback fired when a cycle starts, with the banner
    /// already up. This is how the view learns it must draw the banner.
    pub fn on_cycle_start(&self, handler: CycleHandler) {
        *self.on_cycle_start.lock() = Some(handler);
    }

    /// Sets the callback fired after a successful reauthentication.
    pub fn on_reauth_success(&self, handler: CycleHandler) {
        *self.on_reauth_success.lock() = Some(handler);
    }

    /// Sets the callback fired after a failed reauthentication.
    pub fn on_reauth_failure(&self, handler: CycleHandler) {
        *self.on_reauth_failure.lock() = Some(handler);
    }

    /// Starts a reconnection cycle.
    ///
    /// Single-flight: a no-op when a cycle is already running. Must be
    /// called from within a tokio runtime; the socket's close notification
    /// always is.
    pub fn connection_lost(self: &Arc<Self>) {
        {
            let mut progress = self.progress.lock();
            if progress.reconnecting {
                debug!("Reconnection already in progress");
                return;
            }
            progress.reconnecting = true;
            progress.banner = Some(self.config.banner_text.clone());
        }

        info!(url = %self.config.url, "Connection lost, reconnecting");

        // The view must draw the banner now, not when reauth settles.
        {
            let guard = self.on_cycle_start.lock();
            if let Some(handler) = guard.as_ref() {
                handler();
            }
        }

        let supervisor = Arc::clone(self);
        tokio::spawn(supervisor.run());
    }

    /// Retries the connect at a fixed delay, then reauthenticates once.
    async fn run(self: Arc<Self>) {
        loop {
            match self.socket.connect(&self.config.url).await {
                Ok(()) => break,
                Err(e) => {
                    debug!(error = %e, "Reconnect attempt failed");
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        }

        self.reauthenticate().await;
    }

    /// Reauthenticates with the stored credentials and settles the cycle.
    ///
    /// Missing credentials or a rejected login count as failure: stored
    /// credentials and session state are cleared and the failure callback
    /// fires. Either way the cycle returns to idle and the banner drops.
    async fn reauthenticate(&self) {
        let outcome = match self.credentials.credentials() {
            Some(creds) => requests::login(&self.socket, &creds.login, &creds.password).await,
            None => {
                warn!("No stored credentials for reauthentication");
                Err(crate::Error::LoginRejected)
            }
        };

        {
            let mut progress = self.progress.lock();
            progress.reconnecting = false;
            progress.banner = None;
        }

        match outcome {
            Ok(()) => {
                if let Some(creds) = self.credentials.credentials() {
                    self.store
                        .update(|snapshot| reconciler::apply_login_success(snapshot, &creds.login));
                }
                info!("Reauthenticated after reconnect");

                let guard = self.on_reauth_success.lock();
                if let Some(handler) = guard.as_ref() {
                    handler();
                }
            }
            Err(e) => {
                warn!(error = %e, "Reauthentication failed");
                self.credentials.clear();
                self.store.update(reconciler::clear_session);

                let guard = self.on_reauth_failure.lock();
                if let Some(handler) = guard.as_ref() {
                    handler();
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures_util::{SinkExt, StreamExt};
    use serde_json::{json, Value};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::WebSocketStream;

    use crate::session::storage::MemoryCredentialStore;

    async fn accept_ws(listener: &TcpListener) -> WebSocketStream<TcpStream> {
        let (stream, _) = listener.accept().await.expect("accept");
        tokio_tungstenite::accept_async(stream).await.expect("ws upgrade")
    }

    /// Reads frames until a USER_LOGIN request arrives and acknowledges it.
    async fn ack_login(ws: &mut WebSocketStream<TcpStream>, accept: bool) -> usize {
        let mut login_requests = 0;
        loop {
            let frame = ws.next().await.expect("frame").expect("ok frame");
            let Message::Text(text) = frame else { continue };
            let incoming: Value = serde_json::from_str(text.as_str()).expect("json");
            if incoming["type"] != "USER_LOGIN" {
                continue;
            }

            login_requests += 1;
            let reply = if accept {
                json!({
                    "id": incoming["id"],
                    "type": "USER_LOGIN",
                    "payload": { "user": { "login": incoming["payload"]["user"]["login"], "isLogined": true } }
                })
            } else {
                json!({
                    "id": incoming["id"],
                    "type": "ERROR",
                    "payload": { "error": "incorrect password" }
                })
            };
            ws.send(Message::Text(reply.to_string().into()))
                .await
                .expect("send reply");
            return login_requests;
        }
    }

    fn supervisor_fixture(
        url: &str,
        retry_delay: Duration,
    ) -> (Arc<ReconnectSupervisor>, Arc<MemoryCredentialStore>, Arc<StateStore>, ChatSocket) {
        let socket = ChatSocket::new();
        let credentials = Arc::new(MemoryCredentialStore::new());
        let store = Arc::new(StateStore::new());
        let config = ReconnectConfig {
            url: url.to_string(),
            retry_delay,
            banner_text: CONNECTION_LOST_BANNER.to_string(),
        };
        let supervisor = ReconnectSupervisor::new(
            socket.clone(),
            Arc::clone(&credentials) as Arc<dyn CredentialStore>,
            Arc::clone(&store),
            config,
        );
        (supervisor, credentials, store, socket)
    }

    #[tokio::test]
    async fn test_retries_until_server_returns_then_reauths_once() {
        // Reserve a port, then leave it unbound so the first attempts fail.
        let reserved = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = reserved.local_addr().expect("addr").port();
        drop(reserved);
        let url = format!("ws://127.0.0.1:{port}");

        let (supervisor, credentials, store, socket) =
            supervisor_fixture(&url, Duration::from_millis(30));
        credentials.store("alice", "s3cret");

        let success_count = Arc::new(AtomicUsize::new(0));
        let success_ref = Arc::clone(&success_count);
        supervisor.on_reauth_success(Box::new(move || {
            success_ref.fetch_add(1, Ordering::SeqCst);
        }));

        // The cycle-start signal must fire with the banner already up.
        let start_count = Arc::new(AtomicUsize::new(0));
        let start_ref = Arc::clone(&start_count);
        let supervisor_ref = Arc::clone(&supervisor);
        supervisor.on_cycle_start(Box::new(move || {
            assert!(supervisor_ref.banner().is_some());
            start_ref.fetch_add(1, Ordering::SeqCst);
        }));

        supervisor.connection_lost();
        // Re-entrant loss report must not start a second cycle.
        supervisor.connection_lost();
        assert_eq!(supervisor.banner().as_deref(), Some(CONNECTION_LOST_BANNER));
        assert_eq!(start_count.load(Ordering::SeqCst), 1);

        // Let a few attempts fail before the server comes back.
        tokio::time::sleep(Duration::from_millis(80)).await;
        let listener = TcpListener::bind(("127.0.0.1", port)).await.expect("rebind");

        let mut ws = accept_ws(&listener).await;
        let logins = ack_login(&mut ws, true).await;
        assert_eq!(logins, 1);

        // No second connection, no second login.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(success_count.load(Ordering::SeqCst), 1);
        assert!(!supervisor.is_reconnecting());
        assert!(supervisor.banner().is_none());
        assert_eq!(store.snapshot().auth.user.as_deref(), Some("alice"));

        socket.close();
    }

    #[tokio::test]
    async fn test_reauth_failure_clears_credentials_and_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let url = format!("ws://127.0.0.1:{port}");

        let (supervisor, credentials, store, socket) =
            supervisor_fixture(&url, Duration::from_millis(30));
        credentials.store("alice", "stale");
        store.update(|snapshot| reconciler::apply_login_success(snapshot, "alice"));

        let failure_count = Arc::new(AtomicUsize::new(0));
        let failure_ref = Arc::clone(&failure_count);
        supervisor.on_reauth_failure(Box::new(move || {
            failure_ref.fetch_add(1, Ordering::SeqCst);
        }));

        supervisor.connection_lost();

        let mut ws = accept_ws(&listener).await;
        ack_login(&mut ws, false).await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(failure_count.load(Ordering::SeqCst), 1);
        assert!(credentials.credentials().is_none());
        assert!(store.snapshot().auth.user.is_none());
        assert!(supervisor.banner().is_none());

        socket.close();
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_without_login_attempt() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let url = format!("ws://127.0.0.1:{port}");

        let (supervisor, _credentials, _store, socket) =
            supervisor_fixture(&url, Duration::from_millis(30));

        let failure_count = Arc::new(AtomicUsize::new(0));
        let failure_ref = Arc::clone(&failure_count);
        supervisor.on_reauth_failure(Box::new(move || {
            failure_ref.fetch_add(1, Ordering::SeqCst);
        }));

        supervisor.connection_lost();

        // Server accepts but should never see a login frame.
        let mut ws = accept_ws(&listener).await;
        let server = tokio::spawn(async move {
            let mut frames = 0;
            while let Ok(Some(Ok(frame))) = tokio::time::timeout(
                Duration::from_millis(150),
                ws.next(),
            )
            .await
            {
                if matches!(frame, Message::Text(_)) {
                    frames += 1;
                }
            }
            frames
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(failure_count.load(Ordering::SeqCst), 1);
        assert!(!supervisor.is_reconnecting());

        let frames = server.await.expect("server task");
        assert_eq!(frames, 0);

        socket.close();
    }
}
