//! Type-safe identifiers for protocol entities.
//!
//! Newtype wrappers prevent mixing a request correlation id with a chat
//! message id at compile time. Both are strings on the wire.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// RequestId
// ============================================================================

/// Correlation id linking a request to its eventual response.
///
/// # Format
///
/// `{unix_millis}-{uuid-v4-simple}`, e.g.
/// `1714321099182-67e5504410b1426f9247bb680e5fe0c8`.
///
/// The time prefix keeps ids sortable in server logs; the random suffix
/// makes collision within a session overwhelmingly unlikely. Collisions are
/// not actively prevented.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Generates a fresh id unique within the session.
    #[must_use]
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();

        Self(format!("{millis}-{}", Uuid::new_v4().simple()))
    }

    /// Wraps an id received on the wire.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// MessageId
// ============================================================================

/// Server-assigned identity of a chat message.
///
/// The server is the source of truth for message ids; the client never
/// creates one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wraps an id received on the wire.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
