//! State reconciliation rules.
//!
//! Every server response or push that touches application state flows
//! through one of these functions. Each rule takes the previous state plus
//! one event and produces the next state; none of them performs I/O, which
//! keeps the merge semantics unit-testable in isolation. The session layer
//! decides what to send and when to notify renderers.
//!
//! Status flags are monotonic: a delivered/read confirmation can set a flag
//! but never unset it. The exception is an edit, which replaces the text
//! and sets `is_edited` together.

// ============================================================================
// Imports
// ============================================================================

use crate::identifiers::MessageId;
use crate::protocol::{ChatMessage, EditUpdate, StatusUpdate};
use crate::state::snapshot::{AppSnapshot, ChatState, UserPresence};

// ============================================================================
// IncomingOutcome
// ============================================================================

/// What an incoming-message push did to the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingOutcome {
    /// The message was appended to the open conversation; the caller must
    /// immediately mark it read.
    AppendedToSelected(MessageId),

    /// The sender is not the selected partner; their unread counter was
    /// bumped.
    CounterBumped,

    /// Not addressed to the current user, or nobody is logged in.
    Ignored,
}

// ============================================================================
// Auth rules
// ============================================================================

/// Login success: record the authenticated user.
///
/// Credential persistence is the session layer's job; the snapshot only
/// holds the login.
pub fn apply_login_success(snapshot: &mut AppSnapshot, login: &str) {
    snapshot.auth.user = Some(login.to_string());
}

/// Clears the entire session: auth and chat state alike.
///
/// Used by logout and by reauthentication failure, regardless of network
/// outcome.
pub fn clear_session(snapshot: &mut AppSnapshot) {
    *snapshot = AppSnapshot::default();
}

// ============================================================================
// User list rules
// ============================================================================

/// Merges active and inactive user-list query results into `list_users`.
///
/// De-duplicated by login, the current user excluded, previously known
/// unread counters preserved. Entries from the active set are online;
/// entries from the inactive set are online iff present in `online_users`
/// (a presence push may have arrived between the two queries).
pub fn merge_user_lists(
    chat: &mut ChatState,
    active: &[String],
    inactive: &[String],
    current_user: &str,
) {
    let mut seen = std::collections::HashSet::new();
    let mut merged = Vec::with_capacity(active.len() + inactive.len());

    for login in active {
        if login == current_user || !seen.insert(login.clone()) {
            continue;
        }
        merged.push(UserPresence {
            login: login.clone(),
            is_online: true,
            unread_count: chat.unread_counts.get(login).copied().unwrap_or(0),
        });
    }

    for login in inactive {
        if login == current_user || !seen.insert(login.clone()) {
            continue;
        }
        merged.push(UserPresence {
            login: login.clone(),
            is_online: chat.online_users.contains(login),
            unread_count: chat.unread_counts.get(login).copied().unwrap_or(0),
        });
    }

    chat.list_users = merged;
}

/// External login push: the login joins `online_users` and either flips its
/// existing list entry online or is inserted fresh with a zero counter.
pub fn apply_external_login(chat: &mut ChatState, login: &str) {
    if !chat.online_users.iter().any(|l| l == login) {
        chat.online_users.push(login.to_string());
    }

    match chat.list_users.iter_mut().find(|u| u.login == login) {
        Some(entry) => entry.is_online = true,
        None => chat.list_users.push(UserPresence {
            login: login.to_string(),
            is_online: true,
            unread_count: 0,
        }),
    }
}

/// External logout push: the login leaves `online_users` and its list entry
/// flips offline in place.
pub fn apply_external_logout(chat: &mut ChatState, login: &str) {
    chat.online_users.retain(|l| l != login);

    if let Some(entry) = chat.list_users.iter_mut().find(|u| u.login == login) {
        entry.is_online = false;
    }
}

/// Overwrites the unread counter for a login and keeps the matching
/// `list_users` entry synchronized.
pub fn set_unread_count(chat: &mut ChatState, login: &str, count: u32) {
    chat.unread_counts.insert(login.to_string(), count);

    if let Some(entry) = chat.list_users.iter_mut().find(|u| u.login == login) {
        entry.unread_count = count;
    }
}

// ============================================================================
// Conversation rules
// ============================================================================

/// Selecting a conversation partner clears any previously loaded messages
/// and resets the unread divider; history arrives asynchronously via
/// [`replace_history`].
pub fn select_user(chat: &mut ChatState, login: &str) {
    chat.selected_user = Some(login.to_string());
    chat.messages_with_selected = Vec::new();
    chat.unread_divider_dismissed = false;
}

/// Replaces the conversation with freshly fetched history.
pub fn replace_history(chat: &mut ChatState, messages: Vec<ChatMessage>) {
    chat.messages_with_selected = messages;
}

/// Marks the unread divider dismissed and returns the ids the session must
/// mark as read: messages addressed to the current user that are not yet
/// read.
pub fn dismiss_divider(snapshot: &mut AppSnapshot) -> Vec<MessageId> {
    snapshot.chat.unread_divider_dismissed = true;

    let Some(current_user) = snapshot.auth.user.clone() else {
        return Vec::new();
    };

    snapshot
        .chat
        .messages_with_selected
        .iter()
        .filter(|m| m.from != current_user && !m.status.is_readed)
        .map(|m| m.id.clone())
        .collect()
}

/// Appends a server-confirmed sent message to the open conversation.
///
/// The server is the source of truth for id, time and status. A message
/// whose id is already present is not appended twice.
pub fn append_sent(chat: &mut ChatState, message: ChatMessage) {
    if chat
        .messages_with_selected
        .iter()
        .any(|m| m.id == message.id)
    {
        return;
    }
    chat.messages_with_selected.push(message);
}

/// Applies an incoming-message push.
///
/// Only messages addressed to the current user count. From the selected
/// partner: append to the open conversation (deduplicated by id) and
/// consider the divider dismissed; from anyone else: bump their unread
/// counter by one.
pub fn apply_incoming(snapshot: &mut AppSnapshot, message: &ChatMessage) -> IncomingOutcome {
    let Some(current_user) = snapshot.auth.user.clone() else {
        return IncomingOutcome::Ignored;
    };
    if message.to != current_user {
        return IncomingOutcome::Ignored;
    }

    if snapshot.chat.selected_user.as_deref() == Some(message.from.as_str()) {
        let id = message.id.clone();
        append_sent(&mut snapshot.chat, message.clone());
        snapshot.chat.unread_divider_dismissed = true;
        return IncomingOutcome::AppendedToSelected(id);
    }

    let previous = snapshot
        .chat
        .unread_counts
        .get(&message.from)
        .copied()
        .unwrap_or(0);
    set_unread_count(&mut snapshot.chat, &message.from, previous + 1);
    IncomingOutcome::CounterBumped
}

// ============================================================================
// Status update rules
// ============================================================================

/// Delivery confirmation: sets `is_delivered` on the matching message.
///
/// Monotonic; a `false` flag or an unknown id is a no-op.
pub fn apply_delivered(chat: &mut ChatState, update: &StatusUpdate) {
    if !update.flag {
        return;
    }
    if let Some(m) = chat
        .messages_with_selected
        .iter_mut()
        .find(|m| m.id == update.id)
    {
        m.status.is_delivered = true;
    }
}

/// Read confirmation: sets `is_readed` on the matching message.
///
/// Monotonic; a `false` flag or an unknown id is a no-op.
pub fn apply_read(chat: &mut ChatState, update: &StatusUpdate) {
    if !update.flag {
        return;
    }
    if let Some(m) = chat
        .messages_with_selected
        .iter_mut()
        .find(|m| m.id == update.id)
    {
        m.status.is_readed = true;
    }
}

/// Edit: replaces the text and sets `is_edited` on the matching message.
///
/// An unknown id is a no-op.
pub fn apply_edited(chat: &mut ChatState, update: &EditUpdate) {
    if let Some(m) = chat
        .messages_with_selected
        .iter_mut()
        .find(|m| m.id == update.id)
    {
        m.text = update.text.clone();
        m.status.is_edited = update.is_edited;
    }
}

/// Deletion: removes the matching message from the open conversation.
///
/// Only a confirmed deletion (`flag == true`) removes; an unknown id is a
/// no-op and the list is unchanged.
pub fn apply_deleted(chat: &mut ChatState, update: &StatusUpdate) {
    if !update.flag {
        return;
    }
    chat.messages_with_selected.retain(|m| m.id != update.id);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use crate::protocol::MessageStatus;

    fn message(id: &str, from: &str, to: &str, text: &str) -> ChatMessage {
        ChatMessage {
            id: MessageId::new(id),
            from: from.into(),
            to: to.into(),
            text: text.into(),
            datetime: 1_714_321_099_182,
            status: MessageStatus::default(),
        }
    }

    fn logged_in(user: &str) -> AppSnapshot {
        let mut snapshot = AppSnapshot::default();
        apply_login_success(&mut snapshot, user);
        snapshot
    }

    #[test]
    fn test_clear_session_resets_everything() {
        let mut snapshot = logged_in("alice");
        apply_external_login(&mut snapshot.chat, "bob");
        select_user(&mut snapshot.chat, "bob");

        clear_session(&mut snapshot);
        assert_eq!(snapshot, AppSnapshot::default());
    }

    #[test]
    fn test_merge_user_lists_dedupes_and_excludes_current() {
        let mut chat = ChatState::default();
        chat.unread_counts.insert("bob".into(), 4);
        chat.online_users.push("dave".into());

        merge_user_lists(
            &mut chat,
            &["bob".into(), "alice".into(), "bob".into()],
            &["carol".into(), "bob".into(), "dave".into()],
            "alice",
        );

        let logins: Vec<_> = chat.list_users.iter().map(|u| u.login.as_str()).collect();
        assert_eq!(logins, vec!["bob", "carol", "dave"]);

        // Previously known unread counts survive the reload.
        assert_eq!(chat.list_users[0].unread_count, 4);
        assert!(chat.list_users[0].is_online);
        // Inactive entry, but a presence push already marked it online.
        assert!(chat.list_users[2].is_online);
        assert!(!chat.list_users[1].is_online);
    }

    #[test]
    fn test_external_login_inserts_or_flips() {
        let mut chat = ChatState::default();

        apply_external_login(&mut chat, "bob");
        assert_eq!(chat.online_users, vec!["bob"]);
        assert_eq!(chat.list_users.len(), 1);
        assert_eq!(chat.list_users[0].unread_count, 0);

        // Re-login of a known user flips the flag, no duplicate entry.
        apply_external_logout(&mut chat, "bob");
        assert!(!chat.list_users[0].is_online);
        apply_external_login(&mut chat, "bob");
        assert_eq!(chat.list_users.len(), 1);
        assert!(chat.list_users[0].is_online);
    }

    #[test]
    fn test_external_logout_keeps_list_entry() {
        let mut chat = ChatState::default();
        apply_external_login(&mut chat, "bob");
        apply_external_logout(&mut chat, "bob");

        assert!(chat.online_users.is_empty());
        assert_eq!(chat.list_users.len(), 1);
        assert!(!chat.list_users[0].is_online);
    }

    #[test]
    fn test_unread_count_push_scenario() {
        // Push {user:{login:"B"}, count:3} => B's entry reads 3.
        let mut chat = ChatState::default();
        apply_external_login(&mut chat, "B");

        set_unread_count(&mut chat, "B", 3);
        assert_eq!(chat.unread_counts.get("B"), Some(&3));
        assert_eq!(chat.list_users[0].unread_count, 3);
    }

    #[test]
    fn test_select_user_resets_conversation() {
        let mut chat = ChatState::default();
        chat.messages_with_selected.push(message("m0", "x", "y", "old"));
        chat.unread_divider_dismissed = true;

        select_user(&mut chat, "bob");
        assert_eq!(chat.selected_user.as_deref(), Some("bob"));
        assert!(chat.messages_with_selected.is_empty());
        assert!(!chat.unread_divider_dismissed);
    }

    #[test]
    fn test_send_scenario_appends_at_end() {
        // A sends {to:"B", text:"hi"}; server confirms m1 => conversation
        // with B ends with m1.
        let mut snapshot = logged_in("A");
        select_user(&mut snapshot.chat, "B");
        replace_history(&mut snapshot.chat, vec![message("m0", "B", "A", "yo")]);

        append_sent(&mut snapshot.chat, message("m1", "A", "B", "hi"));

        let ids: Vec<_> = snapshot
            .chat
            .messages_with_selected
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(ids, vec!["m0", "m1"]);

        // Same confirmation replayed does not duplicate.
        append_sent(&mut snapshot.chat, message("m1", "A", "B", "hi"));
        assert_eq!(snapshot.chat.messages_with_selected.len(), 2);
    }

    #[test]
    fn test_incoming_from_selected_partner() {
        let mut snapshot = logged_in("alice");
        select_user(&mut snapshot.chat, "bob");

        let outcome = apply_incoming(&mut snapshot, &message("m1", "bob", "alice", "hi"));
        assert_eq!(
            outcome,
            IncomingOutcome::AppendedToSelected(MessageId::new("m1"))
        );
        assert_eq!(snapshot.chat.messages_with_selected.len(), 1);
        assert!(snapshot.chat.unread_divider_dismissed);
    }

    #[test]
    fn test_incoming_from_other_partner_bumps_counter() {
        let mut snapshot = logged_in("alice");
        select_user(&mut snapshot.chat, "bob");
        apply_external_login(&mut snapshot.chat, "carol");

        let outcome = apply_incoming(&mut snapshot, &message("m1", "carol", "alice", "psst"));
        assert_eq!(outcome, IncomingOutcome::CounterBumped);
        assert!(snapshot.chat.messages_with_selected.is_empty());
        assert_eq!(snapshot.chat.unread_counts.get("carol"), Some(&1));
        assert_eq!(snapshot.chat.list_users[0].unread_count, 1);
    }

    #[test]
    fn test_incoming_not_addressed_to_current_user_ignored() {
        let mut snapshot = logged_in("alice");
        select_user(&mut snapshot.chat, "bob");

        let outcome = apply_incoming(&mut snapshot, &message("m1", "bob", "carol", "hi"));
        assert_eq!(outcome, IncomingOutcome::Ignored);
        assert!(snapshot.chat.messages_with_selected.is_empty());
    }

    #[test]
    fn test_dismiss_divider_collects_unread_from_partner() {
        let mut snapshot = logged_in("alice");
        select_user(&mut snapshot.chat, "bob");

        let mut read_one = message("m1", "bob", "alice", "seen");
        read_one.status.is_readed = true;
        replace_history(
            &mut snapshot.chat,
            vec![
                read_one,
                message("m2", "bob", "alice", "unseen"),
                message("m3", "alice", "bob", "mine"),
            ],
        );

        let to_mark = dismiss_divider(&mut snapshot);
        assert_eq!(to_mark, vec![MessageId::new("m2")]);
        assert!(snapshot.chat.unread_divider_dismissed);
    }

    #[test]
    fn test_dismiss_divider_without_user_is_empty() {
        let mut snapshot = AppSnapshot::default();
        snapshot
            .chat
            .messages_with_selected
            .push(message("m1", "bob", "alice", "hi"));

        assert!(dismiss_divider(&mut snapshot).is_empty());
    }

    #[test]
    fn test_read_update_touches_only_read_flag() {
        let mut chat = ChatState::default();
        chat.messages_with_selected.push(message("m1", "b", "a", "x"));

        apply_read(
            &mut chat,
            &StatusUpdate {
                id: MessageId::new("m1"),
                flag: true,
            },
        );

        let m = &chat.messages_with_selected[0];
        assert!(m.status.is_readed);
        assert!(!m.status.is_delivered);
        assert!(!m.status.is_edited);
        assert_eq!(m.text, "x");
    }

    #[test]
    fn test_status_flags_are_monotonic() {
        let mut chat = ChatState::default();
        let mut delivered = message("m1", "b", "a", "x");
        delivered.status.is_delivered = true;
        chat.messages_with_selected.push(delivered);

        apply_delivered(
            &mut chat,
            &StatusUpdate {
                id: MessageId::new("m1"),
                flag: false,
            },
        );
        assert!(chat.messages_with_selected[0].status.is_delivered);
    }

    #[test]
    fn test_delete_unknown_id_is_noop() {
        let mut chat = ChatState::default();
        chat.messages_with_selected.push(message("m1", "b", "a", "x"));
        let before = chat.messages_with_selected.clone();

        apply_deleted(
            &mut chat,
            &StatusUpdate {
                id: MessageId::new("missing"),
                flag: true,
            },
        );
        assert_eq!(chat.messages_with_selected, before);
    }

    #[test]
    fn test_unconfirmed_delete_is_noop() {
        let mut chat = ChatState::default();
        chat.messages_with_selected.push(message("m1", "b", "a", "x"));

        apply_deleted(
            &mut chat,
            &StatusUpdate {
                id: MessageId::new("m1"),
                flag: false,
            },
        );
        assert_eq!(chat.messages_with_selected.len(), 1);
    }

    #[test]
    fn test_edit_replaces_text_and_flag() {
        let mut chat = ChatState::default();
        chat.messages_with_selected.push(message("m1", "b", "a", "old"));

        apply_edited(
            &mut chat,
            &EditUpdate {
                id: MessageId::new("m1"),
                text: "new".into(),
                is_edited: true,
            },
        );

        let m = &chat.messages_with_selected[0];
        assert_eq!(m.text, "new");
        assert!(m.status.is_edited);
        assert!(!m.status.is_readed);
    }

    // ------------------------------------------------------------------
    // Idempotence: applying the same update twice equals applying it once.
    // ------------------------------------------------------------------

    fn arb_chat() -> impl Strategy<Value = ChatState> {
        proptest::collection::vec((0u8..5, any::<bool>(), any::<bool>()), 0..5).prop_map(
            |seeds| {
                let mut chat = ChatState::default();
                for (n, delivered, readed) in seeds {
                    let id = format!("m{n}");
                    if chat
                        .messages_with_selected
                        .iter()
                        .any(|m| m.id.as_str() == id)
                    {
                        continue;
                    }
                    let mut m = message(&id, "bob", "alice", "text");
                    m.status.is_delivered = delivered;
                    m.status.is_readed = readed;
                    chat.messages_with_selected.push(m);
                }
                chat
            },
        )
    }

    proptest! {
        #[test]
        fn prop_delivered_idempotent(chat in arb_chat(), n in 0u8..6, flag: bool) {
            let update = StatusUpdate { id: MessageId::new(format!("m{n}")), flag };

            let mut once = chat.clone();
            apply_delivered(&mut once, &update);

            let mut twice = once.clone();
            apply_delivered(&mut twice, &update);

            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_read_idempotent(chat in arb_chat(), n in 0u8..6, flag: bool) {
            let update = StatusUpdate { id: MessageId::new(format!("m{n}")), flag };

            let mut once = chat.clone();
            apply_read(&mut once, &update);

            let mut twice = once.clone();
            apply_read(&mut twice, &update);

            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_edited_idempotent(chat in arb_chat(), n in 0u8..6, text in "[a-z]{0,8}") {
            let update = EditUpdate {
                id: MessageId::new(format!("m{n}")),
                text,
                is_edited: true,
            };

            let mut once = chat.clone();
            apply_edited(&mut once, &update);

            let mut twice = once.clone();
            apply_edited(&mut twice, &update);

            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_deleted_idempotent(chat in arb_chat(), n in 0u8..6) {
            let update = StatusUpdate { id: MessageId::new(format!("m{n}")), flag: true };

            let mut once = chat.clone();
            apply_deleted(&mut once, &update);

            let mut twice = once.clone();
            apply_deleted(&mut twice, &update);

            prop_assert_eq!(once, twice);
        }
    }
}
