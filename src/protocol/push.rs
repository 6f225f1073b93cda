//! Typed push messages.
//!
//! Pushes are identifier-less envelopes the server sends without being
//! asked: presence changes, incoming messages, broadcast status updates.
//!
//! | Wire type | Variant |
//! |-----------|---------|
//! | `USER_EXTERNAL_LOGIN` | [`Push::ExternalLogin`] |
//! | `USER_EXTERNAL_LOGOUT` | [`Push::ExternalLogout`] |
//! | `MSG_FROM_USER` (singular `message`) | [`Push::IncomingMessage`] |
//! | `MSG_DELIVER` | [`Push::Delivered`] |
//! | `MSG_READ` | [`Push::Read`] |
//! | `MSG_DELETE` | [`Push::Deleted`] |
//! | `MSG_EDIT` | [`Push::Edited`] |
//! | `MSG_COUNT_NOT_READED_FROM_USER` | [`Push::UnreadCount`] |

// ============================================================================
// Imports
// ============================================================================

use crate::protocol::envelope::{Envelope, MessageType};
use crate::protocol::message::ChatMessage;
use crate::protocol::payload::{self, EditUpdate, StatusUpdate, UnreadCountUpdate};

// ============================================================================
// Push
// ============================================================================

/// A server-initiated event, parsed into its typed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Push {
    /// Another user logged in.
    ExternalLogin {
        /// Login that came online.
        login: String,
    },

    /// Another user logged out.
    ExternalLogout {
        /// Login that went offline.
        login: String,
    },

    /// A new message addressed to some user arrived.
    ///
    /// Whether it is addressed to the *current* user is the reconciler's
    /// decision; the parser only establishes the shape.
    IncomingMessage(ChatMessage),

    /// Delivery confirmation for a previously sent message.
    Delivered(StatusUpdate),

    /// Read confirmation broadcast.
    Read(StatusUpdate),

    /// Deletion broadcast.
    Deleted(StatusUpdate),

    /// Edit broadcast.
    Edited(EditUpdate),

    /// Unread counter changed for a conversation partner.
    UnreadCount(UnreadCountUpdate),
}

impl Push {
    /// Parses an identifier-less envelope into a typed push.
    ///
    /// Returns `None` for unknown types (forward-compatible ignore) and for
    /// payloads that do not match their expected shape (fail-open, pushes
    /// have no caller awaiting them). Envelopes that still carry an id are
    /// never pushes.
    #[must_use]
    pub fn parse(envelope: &Envelope) -> Option<Self> {
        if !envelope.is_push() {
            return None;
        }

        let payload = &envelope.payload;

        match envelope.message_type()? {
            MessageType::UserExternalLogin => payload::external_login(payload)
                .ok()
                .map(|login| Self::ExternalLogin { login }),

            MessageType::UserExternalLogout => payload::external_login(payload)
                .ok()
                .map(|login| Self::ExternalLogout { login }),

            // A history response carries a `messages` array under the same
            // type; only the singular `message` shape is an incoming push.
            MessageType::MsgFromUser if payload::has_singular_message(payload) => {
                payload::single_message(payload).ok().map(Self::IncomingMessage)
            }

            MessageType::MsgDeliver => payload::deliver_update(payload).ok().map(Self::Delivered),

            MessageType::MsgRead => payload::read_update(payload).ok().map(Self::Read),

            MessageType::MsgDelete => payload::delete_update(payload).ok().map(Self::Deleted),

            MessageType::MsgEdit => payload::edit_update(payload).ok().map(Self::Edited),

            MessageType::MsgCountNotReadedFromUser => {
                payload::count_update(payload).ok().map(Self::UnreadCount)
            }

            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
