//! Wire envelope and message type vocabulary.
//!
//! Every frame exchanged with the fun-chat server is a JSON envelope:
//!
//! ```json
//! { "id": "1714321099182-67e55044…", "type": "MSG_SEND", "payload": { … } }
//! ```
//!
//! A non-null `id` marks a request/response pair; a null `id` marks a
//! server-initiated push. `payload` may be `null` (e.g. the user-list
//! requests) but the key must be present.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;

use crate::identifiers::RequestId;

// ============================================================================
// MessageType
// ============================================================================

/// Operation/event kind carried in the envelope `type` field.
///
/// Wire strings are fixed by the server protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Authenticate a user (request/response).
    UserLogin,
    /// Log a user out (request/response).
    UserLogout,
    /// Another user logged in (push).
    UserExternalLogin,
    /// Another user logged out (push).
    UserExternalLogout,
    /// List currently logged-in users (request/response).
    UserActive,
    /// List registered but logged-out users (request/response).
    UserInactive,
    /// Server-side failure of the correlated request.
    Error,
    /// Send a chat message (request/response).
    MsgSend,
    /// Message history with a user (request/response) or a new incoming
    /// message (push, singular `message` payload).
    MsgFromUser,
    /// Unread counter for a user (request/response or push).
    MsgCountNotReadedFromUser,
    /// Delivery confirmation (push).
    MsgDeliver,
    /// Read confirmation (request/response or broadcast push).
    MsgRead,
    /// Message deletion (request/response or broadcast push).
    MsgDelete,
    /// Message edit (request/response or broadcast push).
    MsgEdit,
}

impl MessageType {
    /// Returns the exact wire string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserLogin => "USER_LOGIN",
            Self::UserLogout => "USER_LOGOUT",
            Self::UserExternalLogin => "USER_EXTERNAL_LOGIN",
            Self::UserExternalLogout => "USER_EXTERNAL_LOGOUT",
            Self::UserActive => "USER_ACTIVE",
            Self::UserInactive => "USER_INACTIVE",
            Self::Error => "ERROR",
            Self::MsgSend => "MSG_SEND",
            Self::MsgFromUser => "MSG_FROM_USER",
            Self::MsgCountNotReadedFromUser => "MSG_COUNT_NOT_READED_FROM_USER",
            Self::MsgDeliver => "MSG_DELIVER",
            Self::MsgRead => "MSG_READ",
            Self::MsgDelete => "MSG_DELETE",
            Self::MsgEdit => "MSG_EDIT",
        }
    }

    /// Parses a wire string into a known message type.
    ///
    /// Unknown strings return `None`; the caller decides whether that is a
    /// drop (responses) or a forward-compatible ignore (pushes).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "USER_LOGIN" => Some(Self::UserLogin),
            "USER_LOGOUT" => Some(Self::UserLogout),
            "USER_EXTERNAL_LOGIN" => Some(Self::UserExternalLogin),
            "USER_EXTERNAL_LOGOUT" => Some(Self::UserExternalLogout),
            "USER_ACTIVE" => Some(Self::UserActive),
            "USER_INACTIVE" => Some(Self::UserInactive),
            "ERROR" => Some(Self::Error),
            "MSG_SEND" => Some(Self::MsgSend),
            "MSG_FROM_USER" => Some(Self::MsgFromUser),
            "MSG_COUNT_NOT_READED_FROM_USER" => Some(Self::MsgCountNotReadedFromUser),
            "MSG_DELIVER" => Some(Self::MsgDeliver),
            "MSG_READ" => Some(Self::MsgRead),
            "MSG_DELETE" => Some(Self::MsgDelete),
            "MSG_EDIT" => Some(Self::MsgEdit),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// A parsed wire frame.
///
/// `kind` stays a plain string so unknown server types survive parsing and
/// can be ignored downstream instead of failing the whole frame.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    /// Correlation id; `None` for pushes.
    pub id: Option<RequestId>,

    /// Operation/event kind (`type` on the wire).
    #[serde(rename = "type")]
    pub kind: String,

    /// Type-specific payload, possibly `null`.
    pub payload: Value,
}

impl Envelope {
    /// Builds a request envelope carrying a correlation id.
    #[inline]
    #[must_use]
    pub fn request(id: RequestId, kind: MessageType, payload: Value) -> Self {
        Self {
            id: Some(id),
            kind: kind.as_str().to_string(),
            payload,
        }
    }

    /// Returns the known message type, if any.
    #[inline]
    #[must_use]
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::parse(&self.kind)
    }

    /// Returns `true` if this envelope carries no correlation id.
    #[inline]
    #[must_use]
    pub fn is_push(&self) -> bool {
        self.id.is_none()
    }

    /// Returns `true` if this is a server `ERROR` envelope.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind == MessageType::Error.as_str()
    }

    /// Parses a raw text frame into an envelope.
    ///
    /// Tolerant by design, mirroring the transport contract:
    ///
    /// - frames that are not valid JSON objects are dropped (`None`);
    /// - frames lacking a `type` or `payload` key are dropped;
    /// - a non-string `type` is coerced to `""`;
    /// - an `id` that is neither a string nor null is coerced to "no id"
    ///   (push-like).
    #[must_use]
    pub fn parse_frame(text: &str) -> Option<Self> {
        let raw: Value = serde_json::from_str(text).ok()?;
        let obj = raw.as_object()?;

        // Both keys must be present; payload may still be null.
        if !obj.contains_key("type") || !obj.contains_key("payload") {
            return None;
        }

        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let id = obj
            .get("id")
            .and_then(Value::as_str)
            .map(RequestId::new);

        let payload = obj.get("payload").cloned().unwrap_or(Value::Null);

        Some(Self { id, kind, payload })
    }
}

// ============================================================================
// Tests
// ============================================================================
