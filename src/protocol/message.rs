//! Chat message data types.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::MessageId;

// ============================================================================
// MessageStatus
// ============================================================================

/// Delivery lifecycle flags of a chat message.
///
/// All three default to `false` at creation. `is_delivered` and `is_readed`
/// are monotonic (never unset); `is_edited` flips together with a text
/// replacement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageStatus {
    /// Message reached the recipient's server-side queue.
    #[serde(rename = "isDelivered")]
    pub is_delivered: bool,

    /// Recipient opened the conversation past this message.
    #[serde(rename = "isReaded")]
    pub is_readed: bool,

    /// Text was replaced after sending.
    #[serde(rename = "isEdited")]
    pub is_edited: bool,
}

// ============================================================================
// ChatMessage
// ============================================================================

/// A chat message as the server represents it.
///
/// Identity is `id`; the server assigns `id`, `datetime` and the initial
/// `status`, so messages only enter local state from server responses and
/// pushes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Server-assigned message id.
    pub id: MessageId,

    /// Sender login.
    pub from: String,

    /// Recipient login.
    pub to: String,

    /// Message body.
    pub text: String,

    /// Send time, unix milliseconds.
    pub datetime: i64,

    /// Delivery lifecycle flags.
    pub status: MessageStatus,
}

// ============================================================================
// Tests
// ============================================================================
