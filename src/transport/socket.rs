//! WebSocket connection and event loop.
//!
//! [`ChatSocket`] owns the connection lifecycle (connect/send/close), raw
//! frame encode/decode, and the routing split between correlated responses
//! and identifier-less pushes.
//!
//! # Event Loop
//!
//! `connect` spawns a tokio task that handles:
//!
//! - Incoming frames from the server (responses, pushes)
//! - Outgoing frames queued by `send`/`request`
//! - Request/response correlation by id
//! - Push handler callbacks and unexpected-close notification
//!
//! Unlike a one-shot connection, the same socket can be reopened after the
//! connection drops; the reconnection supervisor relies on this. Each
//! event loop carries a generation counter so a stale loop winding down
//! cannot clobber the state of its replacement.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::Envelope;
use crate::transport::correlation::CorrelationTable;

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for a correlated request.
///
/// The protocol has no response deadline of its own; without a local
/// timeout an unanswered request would pend forever.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Types
// ============================================================================

/// Callback invoked for every identifier-less envelope.
pub type PushHandler = Box<dyn Fn(Envelope) + Send + Sync>;

/// Callback invoked when the connection closes without the caller having
/// asked for it.
pub type CloseHandler = Box<dyn Fn() + Send + Sync>;

/// Frames queued for the event loop to write.
enum OutgoingFrame {
    /// A serialized envelope.
    Text(String),
    /// Close the connection gracefully.
    Shutdown,
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// Shared state
// ============================================================================

struct Shared {
    /// Pending requests awaiting responses.
    correlation: CorrelationTable,
    /// Handler for identifier-less envelopes.
    push_handler: Mutex<Option<PushHandler>>,
    /// Handler for unexpected closes.
    close_handler: Mutex<Option<CloseHandler>>,
    /// Sender half of the current event loop's outgoing queue.
    outgoing: Mutex<Option<mpsc::UnboundedSender<OutgoingFrame>>>,
    /// Serializes handshakes; at most one connect attempt is in flight.
    connect_lock: AsyncMutex<()>,
    /// Whether a connection is currently open.
    connected: AtomicBool,
    /// Whether the caller initiated the current/last close.
    explicit_close: AtomicBool,
    /// Event loop generation, bumped on every successful connect.
    generation: AtomicU64,
}

impl Shared {
    /// Marks a loop as finished; only the current generation may mutate
    /// connection state.
    fn finish_loop(&self, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }

        self.connected.store(false, Ordering::SeqCst);
        *self.outgoing.lock() = None;
        self.correlation.fail_all_with(|| Error::ConnectionClosed);

        if !self.explicit_close.load(Ordering::SeqCst) {
            let guard = self.close_handler.lock();
            if let Some(handler) = guard.as_ref() {
                handler();
            }
        }

        debug!(generation, "Event loop terminated");
    }
}

// ============================================================================
// ChatSocket
// ============================================================================

/// WebSocket connection to the fun-chat server.
///
/// Handles request/response correlation and push routing. Cloning is
/// cheap; clones share the same connection.
///
/// # Thread Safety
///
/// `ChatSocket` is `Send + Sync` and can be shared across tasks. All
/// operations are non-blocking apart from `connect` and `request`.
#[derive(Clone)]
pub struct ChatSocket {
    shared: Arc<Shared>,
}

impl Default for ChatSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSocket {
    /// Creates a disconnected socket.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                correlation: CorrelationTable::new(),
                push_handler: Mutex::new(None),
                close_handler: Mutex::new(None),
                outgoing: Mutex::new(None),
                connect_lock: AsyncMutex::new(()),
                connected: AtomicBool::new(false),
                explicit_close: AtomicBool::new(false),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Opens a connection to the given WebSocket URL.
    ///
    /// A no-op when already open. Resolves once the handshake completes and
    /// the event loop is running. Concurrent calls are serialized: only one
    /// handshake runs at a time, and the losers observe the winner's
    /// connection as already open.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if the URL is invalid or the handshake fails
    /// - [`Error::ConnectionClosed`] if `close` was called while the
    ///   connect was in flight
    pub async fn connect(&self, url: &str) -> Result<()> {
        let _connecting = self.shared.connect_lock.lock().await;

        if self.is_connected() {
            return Ok(());
        }

        let parsed =
            Url::parse(url).map_err(|e| Error::connection(format!("invalid URL: {e}")))?;

        self.shared.explicit_close.store(false, Ordering::SeqCst);

        let (ws_stream, _response) = tokio_tungstenite::connect_async(parsed.as_str())
            .await
            .map_err(|e| Error::connection(e.to_string()))?;

        // A close issued while the handshake was in flight wins.
        if self.shared.explicit_close.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;

        *self.shared.outgoing.lock() = Some(outgoing_tx);
        self.shared.connected.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        tokio::spawn(Self::run_event_loop(ws_stream, outgoing_rx, shared, generation));

        debug!(url, generation, "Connected");
        Ok(())
    }

    /// Returns `true` if a connection is currently open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Produces a fresh correlation id.
    #[inline]
    #[must_use]
    pub fn create_request_id(&self) -> RequestId {
        RequestId::generate()
    }

    /// Returns the number of requests awaiting responses.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.correlation.pending_count()
    }

    /// Sends an envelope without awaiting anything.
    ///
    /// Fire-and-forget: silently dropped when the connection is not open
    /// or the envelope fails to serialize. Delivery correctness is the
    /// caller's responsibility at this layer.
    pub fn send(&self, envelope: &Envelope) {
        if !self.is_connected() {
            trace!(kind = %envelope.kind, "Dropped send on closed socket");
            return;
        }

        let json = match serde_json::to_string(envelope) {
            Ok(j) => j,
            Err(e) => {
                warn!(error = %e, "Failed to serialize outgoing envelope");
                return;
            }
        };

        let guard = self.shared.outgoing.lock();
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(OutgoingFrame::Text(json));
        }
    }

    /// Sends a correlated request and awaits its response with the default
    /// timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if not connected, or the connection
    ///   drops before the response arrives
    /// - [`Error::SessionClosed`] if `close` is called while pending
    /// - [`Error::RequestTimeout`] if no response arrives in time
    pub async fn request(&self, envelope: Envelope) -> Result<Envelope> {
        self.request_with_timeout(envelope, DEFAULT_REQUEST_TIMEOUT)
            .await
    }

    /// Sends a correlated request and awaits its response.
    ///
    /// The envelope must carry an id. On timeout the correlation entry is
    /// removed, so a late response is dropped as unknown.
    ///
    /// # Errors
    ///
    /// Same as [`ChatSocket::request`].
    pub async fn request_with_timeout(
        &self,
        envelope: Envelope,
        request_timeout: Duration,
    ) -> Result<Envelope> {
        let Some(request_id) = envelope.id.clone() else {
            return Err(Error::invalid_response("request envelope without id"));
        };

        if !self.is_connected() {
            return Err(Error::ConnectionClosed);
        }

        // Register before sending so a fast response cannot race the entry.
        let response_rx = self.shared.correlation.register(request_id.clone());
        self.send(&envelope);

        match timeout(request_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                self.shared.correlation.remove(&request_id);

                Err(Error::request_timeout(
                    request_id,
                    request_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Terminates the connection.
    ///
    /// Pending requests are failed with [`Error::SessionClosed`]; the
    /// unexpected-close handler is not invoked.
    pub fn close(&self) {
        self.shared.explicit_close.store(true, Ordering::SeqCst);

        let guard = self.shared.outgoing.lock();
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(OutgoingFrame::Shutdown);
        }
        drop(guard);

        self.shared.correlation.fail_all();
    }

    /// Sets the handler invoked for every identifier-less envelope.
    pub fn set_push_handler(&self, handler: PushHandler) {
        *self.shared.push_handler.lock() = Some(handler);
    }

    /// Sets the handler invoked when the connection closes unexpectedly.
    pub fn on_unexpected_close(&self, handler: CloseHandler) {
        *self.shared.close_handler.lock() = Some(handler);
    }

    // ========================================================================
    // Event loop
    // ========================================================================

    /// Event loop that owns the WebSocket I/O for one connection.
    async fn run_event_loop(
        ws_stream: WsStream,
        mut outgoing_rx: mpsc::UnboundedReceiver<OutgoingFrame>,
        shared: Arc<Shared>,
        generation: u64,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Incoming frames from the server
                frame = ws_read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_incoming_frame(text.as_str(), &shared);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Outgoing frames queued by the API
                command = outgoing_rx.recv() => {
                    match command {
                        Some(OutgoingFrame::Text(json)) => {
                            if let Err(e) = ws_write.send(Message::Text(json.into())).await {
                                warn!(error = %e, "Failed to send frame");
                                break;
                            }
                        }

                        Some(OutgoingFrame::Shutdown) => {
                            debug!("Shutdown frame received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Outgoing queue closed");
                            break;
                        }
                    }
                }
            }
        }

        shared.finish_loop(generation);
    }

    /// Routes one incoming text frame.
    ///
    /// Malformed frames are dropped here and never reach correlation or
    /// push dispatch. Correlated envelopes consumed by the table are not
    /// forwarded to the push handler; neither are unknown-id responses.
    fn handle_incoming_frame(text: &str, shared: &Arc<Shared>) {
        let Some(envelope) = Envelope::parse_frame(text) else {
            warn!("Dropped malformed frame");
            return;
        };

        if envelope.id.is_some() {
            // complete() logs unknown ids; either way the frame stops here.
            let _ = shared.correlation.complete(envelope);
            return;
        }

        let guard = shared.push_handler.lock();
        if let Some(handler) = guard.as_ref() {
            handler(envelope);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
