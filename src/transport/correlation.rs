//! Request/response correlation.
//!
//! Maps outstanding request ids to one-shot response channels. Exactly one
//! response is consumed per id: the entry is removed *before* the response
//! is delivered, so a duplicate frame carrying the same id finds no handler
//! and is dropped. Responses for unregistered ids are dropped here as well,
//! never forwarded to push dispatch.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::Envelope;

// ============================================================================
// Types
// ============================================================================

/// One-shot channel delivering the correlated response (or a teardown
/// error) to the awaiting request future.
type ResponseSender = oneshot::Sender<Result<Envelope>>;

// ============================================================================
// CorrelationTable
// ============================================================================

/// Table of pending requests awaiting their responses.
///
/// Cloning is cheap; clones share the same table.
#[derive(Clone, Default)]
pub struct CorrelationTable {
    inner: Arc<Mutex<FxHashMap<RequestId, ResponseSender>>>,
}

impl CorrelationTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pending request and returns the receiving half.
    ///
    /// At most one entry exists per id; registering the same id twice
    /// replaces the previous entry, whose receiver resolves with a channel
    /// error once the old sender is dropped.
    pub fn register(&self, id: RequestId) -> oneshot::Receiver<Result<Envelope>> {
        let (tx, rx) = oneshot::channel();

        if self.inner.lock().insert(id.clone(), tx).is_some() {
            warn!(%id, "Replaced existing correlation entry");
        }

        rx
    }

    /// Delivers a response envelope to its registered handler.
    ///
    /// Returns `true` if a handler consumed the envelope. Envelopes without
    /// an id, or whose id has no registered handler, return `false` and are
    /// dropped by the caller.
    pub fn complete(&self, envelope: Envelope) -> bool {
        let Some(id) = envelope.id.clone() else {
            return false;
        };

        // Remove first: a second frame with the same id must not deliver.
        let Some(tx) = self.inner.lock().remove(&id) else {
            warn!(%id, "Response for unknown request");
            return false;
        };

        let _ = tx.send(Ok(envelope));
        true
    }

    /// Removes an entry without resolving it.
    ///
    /// Used by the timeout path; a response arriving after removal is
    /// treated as unknown and dropped.
    pub fn remove(&self, id: &RequestId) {
        self.inner.lock().remove(id);
    }

    /// Fails every pending request with [`Error::SessionClosed`].
    ///
    /// Called on explicit teardown so no future is left permanently
    /// unresolved.
    pub fn fail_all(&self) {
        self.fail_all_with(|| Error::SessionClosed);
    }

    /// Fails every pending request with a caller-chosen error.
    ///
    /// The event loop uses this with [`Error::ConnectionClosed`] when the
    /// connection dies underneath outstanding requests.
    pub fn fail_all_with(&self, error: impl Fn() -> Error) {
        let pending: Vec<_> = self.inner.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(error()));
        }

        if count > 0 {
            debug!(count, "Failed pending requests on teardown");
        }
    }

    /// Returns the number of pending requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.lock().len()
    }
}

// ============================================================================
// Tests
// ============================================================================
