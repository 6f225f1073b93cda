//! Typed payload parsing.
//!
//! One parser per payload kind, shared between request/response handling
//! and push dispatch. Each parser returns a tagged result: `Ok(value)` or
//! `Err(ShapeError)` naming the violated expectation. Request flows map a
//! `ShapeError` to [`crate::Error::InvalidResponse`]; push flows ignore it
//! (fail-open, nobody is awaiting a push).
//!
//! Collection payloads that the server may legitimately send partially
//! malformed (history, user lists) fail open instead: invalid entries are
//! skipped and a missing collection parses as empty.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::identifiers::MessageId;
use crate::protocol::message::ChatMessage;

// ============================================================================
// ShapeError
// ============================================================================

/// A payload did not match the expected structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ShapeError {
    /// Which structural expectation was violated.
    pub reason: &'static str,
}

impl ShapeError {
    const fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

impl From<ShapeError> for crate::Error {
    fn from(err: ShapeError) -> Self {
        Self::invalid_response(err.reason)
    }
}

/// Parser result alias.
pub type ShapeResult<T> = Result<T, ShapeError>;

// ============================================================================
// Parsed payload types
// ============================================================================

/// Login/logout acknowledgement: `{user:{login,isLogined}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAck {
    /// Acknowledged login.
    pub login: String,
    /// Whether the server considers the account logged in.
    ///
    /// Absent on the wire is treated as `false`.
    pub is_logined: bool,
}

/// Unread counter update: `{user:{login}, count}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadCountUpdate {
    /// Login the counter belongs to.
    pub login: String,
    /// Unread message count, clamped to `>= 0`.
    pub count: u32,
}

/// A single-flag status update: `{message:{id,status:{<flag>}}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Message the update applies to.
    pub id: MessageId,
    /// New flag value.
    pub flag: bool,
}

/// An edit update: `{message:{id,text,status:{isEdited}}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditUpdate {
    /// Message the edit applies to.
    pub id: MessageId,
    /// Replacement text.
    pub text: String,
    /// New `isEdited` value.
    pub is_edited: bool,
}

// ============================================================================
// Value helpers
// ============================================================================

fn get_str<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

fn get_object<'a>(payload: &'a Value, key: &str) -> Option<&'a Value> {
    payload.get(key).filter(|v| v.is_object())
}

// ============================================================================
// Parsers
// ============================================================================

/// Extracts the error text from an `ERROR` payload.
///
/// Missing or malformed text degrades to `"Unknown error"`.
#[must_use]
pub fn error_text(payload: &Value) -> String {
    get_str(payload, "error")
        .unwrap_or("Unknown error")
        .to_string()
}

/// Parses a login/logout acknowledgement.
///
/// # Errors
///
/// Returns [`ShapeError`] when `user` or `user.login` is missing, or when
/// `isLogined` is present but not a boolean.
pub fn login_ack(payload: &Value) -> ShapeResult<LoginAck> {
    let user = get_object(payload, "user").ok_or(ShapeError::new("missing user object"))?;
    let login = get_str(user, "login").ok_or(ShapeError::new("missing user.login"))?;

    let is_logined = match user.get("isLogined") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(ShapeError::new("isLogined is not a boolean")),
    };

    Ok(LoginAck {
        login: login.to_string(),
        is_logined,
    })
}

/// Parses a singular message payload: `{message: ChatMessage}`.
///
/// # Errors
///
/// Returns [`ShapeError`] when the `message` object is absent or any of its
/// fields has the wrong type.
pub fn single_message(payload: &Value) -> ShapeResult<ChatMessage> {
    let message = payload
        .get("message")
        .ok_or(ShapeError::new("missing message object"))?;

    serde_json::from_value(message.clone())
        .map_err(|_| ShapeError::new("malformed message object"))
}

/// Parses a history payload: `{messages: ChatMessage[]}`.
///
/// Fails open: a missing or non-array `messages` yields an empty list, and
/// malformed entries are skipped.
#[must_use]
pub fn message_list(payload: &Value) -> Vec<ChatMessage> {
    let Some(items) = payload.get("messages").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect()
}

/// Returns `true` when the payload carries a singular `message` object and
/// no `messages` array.
///
/// This is the disambiguation rule between the new-incoming-message push
/// and other `MSG_FROM_USER`-shaped frames.
#[must_use]
pub fn has_singular_message(payload: &Value) -> bool {
    match payload.as_object() {
        Some(obj) => obj.contains_key("message") && !obj.contains_key("messages"),
        None => false,
    }
}

/// Parses a user-list payload: `{users:[{login,…}]}`.
///
/// Fails open: entries without a non-empty string `login` are skipped.
#[must_use]
pub fn user_logins(payload: &Value) -> Vec<String> {
    let Some(items) = payload.get("users").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| get_str(item, "login"))
        .filter(|login| !login.is_empty())
        .map(str::to_string)
        .collect()
}

/// Extracts the unread count from a `{count}` payload.
///
/// Non-numeric or negative counts degrade to 0.
#[must_use]
pub fn unread_count(payload: &Value) -> u32 {
    payload
        .get("count")
        .and_then(Value::as_i64)
        .filter(|n| *n >= 0)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}

/// Parses an unread-counter push: `{user:{login}, count}`.
///
/// # Errors
///
/// Returns [`ShapeError`] when `user.login` is missing; the count itself
/// degrades to 0 like [`unread_count`].
pub fn count_update(payload: &Value) -> ShapeResult<UnreadCountUpdate> {
    let user = get_object(payload, "user").ok_or(ShapeError::new("missing user object"))?;
    let login = get_str(user, "login").ok_or(ShapeError::new("missing user.login"))?;

    Ok(UnreadCountUpdate {
        login: login.to_string(),
        count: unread_count(payload),
    })
}

/// Parses an external presence payload: `{user:{login}}`.
///
/// # Errors
///
/// Returns [`ShapeError`] when `user.login` is missing or empty.
pub fn external_login(payload: &Value) -> ShapeResult<String> {
    let user = get_object(payload, "user").ok_or(ShapeError::new("missing user object"))?;
    let login = get_str(user, "login").ok_or(ShapeError::new("missing user.login"))?;

    if login.is_empty() {
        return Err(ShapeError::new("empty user.login"));
    }

    Ok(login.to_string())
}

fn status_flag(payload: &Value, flag: &'static str) -> ShapeResult<StatusUpdate> {
    let message = get_object(payload, "message").ok_or(ShapeError::new("missing message object"))?;
    let id = get_str(message, "id").ok_or(ShapeError::new("missing message.id"))?;
    let status = get_object(message, "status").ok_or(ShapeError::new("missing status object"))?;
    let value = status
        .get(flag)
        .and_then(Value::as_bool)
        .ok_or(ShapeError::new("missing status flag"))?;

    Ok(StatusUpdate {
        id: MessageId::new(id),
        flag: value,
    })
}

/// Parses a delivery update: `{message:{id,status:{isDelivered}}}`.
///
/// # Errors
///
/// Returns [`ShapeError`] on any missing field.
pub fn deliver_update(payload: &Value) -> ShapeResult<StatusUpdate> {
    status_flag(payload, "isDelivered")
}

/// Parses a read update: `{message:{id,status:{isReaded}}}`.
///
/// # Errors
///
/// Returns [`ShapeError`] on any missing field.
pub fn read_update(payload: &Value) -> ShapeResult<StatusUpdate> {
    status_flag(payload, "isReaded")
}

/// Parses a delete update: `{message:{id,status:{isDeleted}}}`.
///
/// # Errors
///
/// Returns [`ShapeError`] on any missing field.
pub fn delete_update(payload: &Value) -> ShapeResult<StatusUpdate> {
    status_flag(payload, "isDeleted")
}

/// Parses an edit update: `{message:{id,text,status:{isEdited}}}`.
///
/// # Errors
///
/// Returns [`ShapeError`] on any missing field.
pub fn edit_update(payload: &Value) -> ShapeResult<EditUpdate> {
    let message = get_object(payload, "message").ok_or(ShapeError::new("missing message object"))?;
    let id = get_str(message, "id").ok_or(ShapeError::new("missing message.id"))?;
    let text = get_str(message, "text").ok_or(ShapeError::new("missing message.text"))?;
    let status = get_object(message, "status").ok_or(ShapeError::new("missing status object"))?;
    let is_edited = status
        .get("isEdited")
        .and_then(Value::as_bool)
        .ok_or(ShapeError::new("missing status flag"))?;

    Ok(EditUpdate {
        id: MessageId::new(id),
        text: text.to_string(),
        is_edited,
    })
}

// ============================================================================
// Tests
// ============================================================================
