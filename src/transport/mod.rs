//! WebSocket transport layer.
//!
//! This module multiplexes one bidirectional message-oriented connection
//! into correlated request/response exchanges and identifier-less pushes.
//!
//! ```text
//! ┌───────────────┐                          ┌───────────────┐
//! │  ChatSocket   │        WebSocket         │  fun-chat     │
//! │  event loop   │◄────────────────────────►│  server       │
//! │  correlation  │     ws://host:4000       │               │
//! └───────────────┘                          └───────────────┘
//! ```
//!
//! # Routing
//!
//! 1. A raw frame is parsed tolerantly; malformed frames are dropped here.
//! 2. Envelopes carrying an id go to the [`CorrelationTable`]: one-shot
//!    delivery, duplicates and unknown ids dropped.
//! 3. Envelopes without an id go to the registered push handler.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `correlation` | Pending-request table with at-most-once delivery |
//! | `socket` | Connection lifecycle and event loop |

// ============================================================================
// Submodules
// ============================================================================

/// Request/response correlation.
pub mod correlation;

/// WebSocket connection and event loop.
pub mod socket;

// ============================================================================
// Re-exports
// ============================================================================

pub use correlation::CorrelationTable;
pub use socket::{ChatSocket, CloseHandler, DEFAULT_REQUEST_TIMEOUT, PushHandler};
