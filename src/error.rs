//! Error types for the fun-chat client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use funchat_client::{Result, Error};
//!
//! async fn example(session: &ChatSession) -> Result<()> {
//!     session.send_text("hi there").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::SessionClosed`] |
//! | Protocol | [`Error::Server`], [`Error::InvalidResponse`], [`Error::LoginRejected`] |
//! | Execution | [`Error::RequestTimeout`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::RequestId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Faults map onto the engine's recovery taxonomy: connection errors feed
/// the reconnection supervisor, server errors reject the originating
/// request, shape errors reject with an invalid-response message. No
/// variant is fatal to the process.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    ///
    /// Returned when the connection cannot be established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// The connection closed while an operation was in flight.
    ///
    /// Returned for requests interrupted by an unexpected close.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The session was torn down by the caller.
    ///
    /// Returned for requests still pending when `close()` was invoked.
    /// Pending futures are failed explicitly rather than left unresolved.
    #[error("Session closed")]
    SessionClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// The server answered a request with an `ERROR` envelope.
    ///
    /// Carries the server-supplied message (`"Unknown error"` if absent).
    #[error("Server error: {message}")]
    Server {
        /// Error text from the server payload.
        message: String,
    },

    /// A response payload did not match the expected structure.
    ///
    /// Local validation failure; the request is rejected, the connection
    /// stays up.
    #[error("Invalid response: {reason}")]
    InvalidResponse {
        /// Which structural expectation was violated.
        reason: String,
    },

    /// The server reported the account as not logged in.
    ///
    /// Returned by login and reauthentication when the response is
    /// well-formed but `isLogined` is not `true`.
    #[error("Login rejected")]
    LoginRejected,

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// A request did not receive its response in time.
    ///
    /// The correlation entry is removed when this is returned; a late
    /// response for the same id is dropped.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a server error with the supplied message.
    #[inline]
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Creates an invalid-response error.
    #[inline]
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout { .. })
    }

    /// Returns `true` if this is a connection error.
    ///
    /// Connection errors are the class the reconnection supervisor reacts
    /// to; everything else stays local to the failed request.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::SessionClosed
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::RequestTimeout { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
