//! Wire protocol message types.
//!
//! This module defines the envelope format shared by every frame, the chat
//! message data model, and the typed parsing layer both the request API and
//! the push dispatcher build on.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | request (`id` set) | client → server | correlated command |
//! | response (`id` set) | server → client | command result or `ERROR` |
//! | push (`id` null) | server → client | unsolicited event |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `envelope` | Envelope shape and message type vocabulary |
//! | `message` | Chat message data types |
//! | `payload` | Typed payload parsers |
//! | `push` | Typed push messages |

// ============================================================================
// Submodules
// ============================================================================

/// Envelope shape and message type vocabulary.
pub mod envelope;

/// Chat message data types.
pub mod message;

/// Typed payload parsers.
pub mod payload;

/// Typed push messages.
pub mod push;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::{Envelope, MessageType};
pub use message::{ChatMessage, MessageStatus};
pub use payload::{EditUpdate, LoginAck, ShapeError, StatusUpdate, UnreadCountUpdate};
pub use push::Push;
