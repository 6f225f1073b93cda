//! Fun-chat client - Session synchronization engine for the fun-chat
//! protocol.
//!
//! This library keeps a local chat client synchronized with a fun-chat
//! WebSocket server: it correlates requests with responses, folds
//! server-initiated pushes into an application state snapshot, and
//! recovers the session automatically after a connection loss.
//!
//! # Architecture
//!
//! The engine is a client-side pipeline:
//!
//! - **Transport**: one [`ChatSocket`] owns the WebSocket and its event
//!   loop; responses are matched to callers by request id, pushes are
//!   handed to a dispatcher
//! - **Protocol**: every frame is a JSON envelope `{id, type, payload}`;
//!   `id: null` marks a push
//! - **State**: a single snapshot behind a writer lock, mutated only by
//!   pure reconciliation rules, observed through subscribe/notify
//! - **Session**: [`ChatSession`] ties the layers together and retries the
//!   connection with stored credentials when it drops unexpectedly
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use funchat_client::{ChatSession, MemoryCredentialStore, ReconnectConfig, Result, Route};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let credentials = Arc::new(MemoryCredentialStore::new());
//!     let session = ChatSession::new(
//!         ReconnectConfig::new("ws://127.0.0.1:4000"),
//!         credentials,
//!     );
//!
//!     // Re-render whenever the snapshot changes.
//!     session.store().subscribe(Box::new(|route| {
//!         if route == Route::Chat {
//!             // redraw the chat view from session.snapshot()
//!         }
//!     }));
//!
//!     if !session.restore_session().await? {
//!         session.login("alice", "s3cret").await?;
//!     }
//!     session.load_users().await?;
//!     session.select_user("bob").await;
//!     session.send_text("hello").await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Envelope format and typed payloads |
//! | [`transport`] | WebSocket connection and request correlation |
//! | [`state`] | State snapshot, store and reconciliation rules |
//! | [`session`] | Session facade, typed requests, reconnection |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for requests and messages.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Wire protocol message types.
///
/// The envelope format, the message-type vocabulary, and the typed
/// payload parsing both response handling and push dispatch build on.
pub mod protocol;

/// WebSocket transport layer.
///
/// Connection lifecycle, the event loop, and request/response
/// correlation.
pub mod transport;

/// Application state: snapshot, store, reconciliation rules.
pub mod state;

/// Session orchestration: facade, typed requests, credential storage,
/// reconnection.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

// Session types
pub use session::{
    ChatSession, CredentialStore, Credentials, MemoryCredentialStore, ReconnectConfig,
    ReconnectSupervisor,
};

// State types
pub use state::{AppSnapshot, ChatState, Route, StateStore, UserPresence};

// Protocol types
pub use protocol::{ChatMessage, Envelope, MessageStatus, MessageType, Push};

// Transport types
pub use transport::{ChatSocket, DEFAULT_REQUEST_TIMEOUT};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{MessageId, RequestId};
