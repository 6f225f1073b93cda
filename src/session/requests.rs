//! Typed request/response API over [`ChatSocket`].
//!
//! One function per server operation. Each builds the request envelope,
//! awaits the correlated response, and maps the three response classes:
//!
//! - `ERROR` envelopes become [`Error::Server`] carrying the server text;
//! - a response of the wrong type becomes [`Error::InvalidResponse`];
//! - a matching response is parsed into its typed payload.
//!
//! User-list queries are the exception: the original client treats any
//! non-matching response as an empty list, and callers render whatever
//! arrived, so those fail open instead of erroring.

// ============================================================================
// Imports
// ============================================================================

use serde_json::json;

use crate::error::{Error, Result};
use crate::identifiers::MessageId;
use crate::protocol::envelope::{Envelope, MessageType};
use crate::protocol::payload::{self, EditUpdate, StatusUpdate};
use crate::protocol::ChatMessage;
use crate::transport::ChatSocket;

// ============================================================================
// Exchange helper
// ============================================================================

/// Sends one correlated request and validates the response class.
async fn exchange(
    socket: &ChatSocket,
    kind: MessageType,
    payload: serde_json::Value,
) -> Result<Envelope> {
    let envelope = Envelope::request(socket.create_request_id(), kind, payload);
    let response = socket.request(envelope).await?;

    if response.is_error() {
        return Err(Error::server(payload::error_text(&response.payload)));
    }
    if response.message_type() != Some(kind) {
        return Err(Error::invalid_response("unexpected response type"));
    }

    Ok(response)
}

// ============================================================================
// Authentication
// ============================================================================

/// Authenticates against the server.
///
/// # Errors
///
/// - [`Error::Server`] when the server rejects with `ERROR`
/// - [`Error::LoginRejected`] when the acknowledgement carries
///   `isLogined != true`
/// - [`Error::InvalidResponse`] on a malformed or mismatched response
/// - transport errors from [`ChatSocket::request`]
pub async fn login(socket: &ChatSocket, login: &str, password: &str) -> Result<()> {
    let payload = json!({ "user": { "login": login, "password": password } });
    let response = exchange(socket, MessageType::UserLogin, payload).await?;

    let ack = payload::login_ack(&response.payload)?;
    if !ack.is_logined {
        return Err(Error::LoginRejected);
    }

    Ok(())
}

/// Sends a logout request without awaiting the acknowledgement.
///
/// Logout is best effort: the session tears down locally regardless of
/// whether the server ever answers, so nothing correlates this request.
pub fn send_logout(socket: &ChatSocket, login: &str, password: &str) {
    let payload = json!({ "user": { "login": login, "password": password } });
    let envelope = Envelope::request(socket.create_request_id(), MessageType::UserLogout, payload);
    socket.send(&envelope);
}

// ============================================================================
// User lists
// ============================================================================

/// Queries the logins currently online.
///
/// Fails open: any response that is not a well-formed `USER_ACTIVE`
/// acknowledgement yields an empty list.
///
/// # Errors
///
/// Transport errors from [`ChatSocket::request`] only.
pub async fn list_active_users(socket: &ChatSocket) -> Result<Vec<String>> {
    user_list(socket, MessageType::UserActive).await
}

/// Queries the logins currently offline.
///
/// Fails open like [`list_active_users`].
///
/// # Errors
///
/// Transport errors from [`ChatSocket::request`] only.
pub async fn list_inactive_users(socket: &ChatSocket) -> Result<Vec<String>> {
    user_list(socket, MessageType::UserInactive).await
}

async fn user_list(socket: &ChatSocket, kind: MessageType) -> Result<Vec<String>> {
    let envelope = Envelope::request(socket.create_request_id(), kind, json!(null));
    let response = socket.request(envelope).await?;

    if response.message_type() != Some(kind) {
        return Ok(Vec::new());
    }

    Ok(payload::user_logins(&response.payload))
}

// ============================================================================
// Messages
// ============================================================================

/// Sends a message and returns the server-confirmed copy.
///
/// The server assigns id, timestamp and initial status; the returned
/// message is what the conversation should display.
///
/// # Errors
///
/// [`Error::Server`], [`Error::InvalidResponse`], or transport errors.
pub async fn send_message(socket: &ChatSocket, to: &str, text: &str) -> Result<ChatMessage> {
    let payload = json!({ "message": { "to": to, "text": text } });
    let response = exchange(socket, MessageType::MsgSend, payload).await?;

    Ok(payload::single_message(&response.payload)?)
}

/// Fetches the full message history with one partner.
///
/// The list fails open on malformed entries; see
/// [`payload::message_list`].
///
/// # Errors
///
/// [`Error::Server`], [`Error::InvalidResponse`], or transport errors.
pub async fn fetch_history(socket: &ChatSocket, with_login: &str) -> Result<Vec<ChatMessage>> {
    let payload = json!({ "user": { "login": with_login } });
    let response = exchange(socket, MessageType::MsgFromUser, payload).await?;

    Ok(payload::message_list(&response.payload))
}

/// Fetches the unread counter for messages from one partner.
///
/// # Errors
///
/// [`Error::Server`], [`Error::InvalidResponse`], or transport errors.
pub async fn fetch_unread_count(socket: &ChatSocket, from_login: &str) -> Result<u32> {
    let payload = json!({ "user": { "login": from_login } });
    let response = exchange(socket, MessageType::MsgCountNotReadedFromUser, payload).await?;

    Ok(payload::unread_count(&response.payload))
}

/// Marks a message as read.
///
/// # Errors
///
/// [`Error::Server`], [`Error::InvalidResponse`], or transport errors.
pub async fn mark_read(socket: &ChatSocket, id: &MessageId) -> Result<StatusUpdate> {
    let payload = json!({ "message": { "id": id } });
    let response = exchange(socket, MessageType::MsgRead, payload).await?;

    Ok(payload::read_update(&response.payload)?)
}

/// Deletes a message.
///
/// # Errors
///
/// [`Error::Server`], [`Error::InvalidResponse`], or transport errors.
pub async fn delete_message(socket: &ChatSocket, id: &MessageId) -> Result<StatusUpdate> {
    let payload = json!({ "message": { "id": id } });
    let response = exchange(socket, MessageType::MsgDelete, payload).await?;

    Ok(payload::delete_update(&response.payload)?)
}

/// Replaces a message's text.
///
/// # Errors
///
/// [`Error::Server`], [`Error::InvalidResponse`], or transport errors.
pub async fn edit_message(socket: &ChatSocket, id: &MessageId, text: &str) -> Result<EditUpdate> {
    let payload = json!({ "message": { "id": id, "text": text } });
    let response = exchange(socket, MessageType::MsgEdit, payload).await?;

    Ok(payload::edit_update(&response.payload)?)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::{SinkExt, StreamExt};
    use serde_json::{json, Value};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::WebSocketStream;

    async fn loopback() -> (String, TcpListener) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        (format!("ws://127.0.0.1:{port}"), listener)
    }

    async fn accept_ws(listener: &TcpListener) -> WebSocketStream<TcpStream> {
        let (stream, _) = listener.accept().await.expect("accept");
        tokio_tungstenite::accept_async(stream).await.expect("ws upgrade")
    }

    /// Reads one request and replies with the given type and payload,
    /// echoing the request id.
    async fn reply_once(ws: &mut WebSocketStream<TcpStream>, kind: &str, payload: Value) {
        loop {
            let frame = ws.next().await.expect("frame").expect("ok frame");
            if let Message::Text(text) = frame {
                let incoming: Value = serde_json::from_str(text.as_str()).expect("json");
                let reply = json!({ "id": incoming["id"], "type": kind, "payload": payload });
                ws.send(Message::Text(reply.to_string().into()))
                    .await
                    .expect("send reply");
                return;
            }
        }
    }

    async fn connected_socket(url: &str) -> ChatSocket {
        let socket = ChatSocket::new();
        socket.connect(url).await.expect("connect");
        socket
    }

    #[tokio::test]
    async fn test_login_success() -> anyhow::Result<()> {
        let (url, listener) = loopback().await;
        let server = tokio::spawn(async move {
            let mut ws = accept_ws(&listener).await;
            reply_once(
                &mut ws,
                "USER_LOGIN",
                json!({ "user": { "login": "alice", "isLogined": true } }),
            )
            .await;
        });

        let socket = connected_socket(&url).await;
        login(&socket, "alice", "pw").await?;

        socket.close();
        server.await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_login_rejected_when_not_logined() {
        let (url, listener) = loopback().await;
        let server = tokio::spawn(async move {
            let mut ws = accept_ws(&listener).await;
            reply_once(
                &mut ws,
                "USER_LOGIN",
                json!({ "user": { "login": "alice", "isLogined": false } }),
            )
            .await;
        });

        let socket = connected_socket(&url).await;
        let err = login(&socket, "alice", "pw").await.expect_err("must fail");
        assert!(matches!(err, Error::LoginRejected));

        socket.close();
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn test_error_envelope_becomes_server_error() {
        let (url, listener) = loopback().await;
        let server = tokio::spawn(async move {
            let mut ws = accept_ws(&listener).await;
            reply_once(
                &mut ws,
                "ERROR",
                json!({ "error": "incorrect password" }),
            )
            .await;
        });

        let socket = connected_socket(&url).await;
        let err = login(&socket, "alice", "wrong").await.expect_err("must fail");
        assert!(matches!(err, Error::Server { ref message } if message == "incorrect password"));

        socket.close();
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn test_wrong_response_type_is_invalid() {
        let (url, listener) = loopback().await;
        let server = tokio::spawn(async move {
            let mut ws = accept_ws(&listener).await;
            reply_once(&mut ws, "MSG_READ", json!({})).await;
        });

        let socket = connected_socket(&url).await;
        let err = login(&socket, "alice", "pw").await.expect_err("must fail");
        assert!(matches!(err, Error::InvalidResponse { .. }));

        socket.close();
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn test_user_list_fails_open_on_mismatch() {
        let (url, listener) = loopback().await;
        let server = tokio::spawn(async move {
            let mut ws = accept_ws(&listener).await;
            reply_once(&mut ws, "ERROR", json!({ "error": "boom" })).await;
        });

        let socket = connected_socket(&url).await;
        let users = list_active_users(&socket).await.expect("fail open");
        assert!(users.is_empty());

        socket.close();
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn test_send_message_returns_confirmed_copy() -> anyhow::Result<()> {
        let (url, listener) = loopback().await;
        let server = tokio::spawn(async move {
            let mut ws = accept_ws(&listener).await;
            reply_once(
                &mut ws,
                "MSG_SEND",
                json!({
                    "message": {
                        "id": "m1", "from": "alice", "to": "bob", "text": "hi",
                        "datetime": 1_700_000_000,
                        "status": { "isDelivered": false, "isReaded": false, "isEdited": false }
                    }
                }),
            )
            .await;
        });

        let socket = connected_socket(&url).await;
        let message = send_message(&socket, "bob", "hi").await?;
        assert_eq!(message.id, MessageId::new("m1"));
        assert_eq!(message.from, "alice");

        socket.close();
        server.await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_unread_count() {
        let (url, listener) = loopback().await;
        let server = tokio::spawn(async move {
            let mut ws = accept_ws(&listener).await;
            reply_once(
                &mut ws,
                "MSG_COUNT_NOT_READED_FROM_USER",
                json!({ "user": { "login": "bob" }, "count": 4 }),
            )
            .await;
        });

        let socket = connected_socket(&url).await;
        let count = fetch_unread_count(&socket, "bob").await.expect("count");
        assert_eq!(count, 4);

        socket.close();
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn test_mark_read_returns_update() {
        let (url, listener) = loopback().await;
        let server = tokio::spawn(async move {
            let mut ws = accept_ws(&listener).await;
            reply_once(
                &mut ws,
                "MSG_READ",
                json!({ "message": { "id": "m1", "status": { "isReaded": true } } }),
            )
            .await;
        });

        let socket = connected_socket(&url).await;
        let update = mark_read(&socket, &MessageId::new("m1")).await.expect("update");
        assert_eq!(update.id, MessageId::new("m1"));
        assert!(update.flag);

        socket.close();
        server.await.expect("server task");
    }
}
