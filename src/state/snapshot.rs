//! In-memory application state snapshot.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;

use crate::protocol::ChatMessage;

// ============================================================================
// UserPresence
// ============================================================================

/// A conversation partner as shown in the user list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPresence {
    /// Partner login. Unique within the list.
    pub login: String,

    /// Whether the partner is currently logged in.
    pub is_online: bool,

    /// Messages from this partner not yet read by the current user.
    pub unread_count: u32,
}

// ============================================================================
// AuthState
// ============================================================================

/// Authentication slice of the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    /// Login of the authenticated user, if any.
    pub user: Option<String>,
}

// ============================================================================
// ChatState
// ============================================================================

/// Chat slice of the snapshot.
///
/// Invariants maintained by the reconciler:
///
/// - `list_users` has unique logins and never contains the current user;
/// - every login in `online_users` appears in `list_users`;
/// - `messages_with_selected` is the fetched history plus locally appended
///   sent/received messages, unique by message id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatState {
    /// Logins currently online.
    pub online_users: Vec<String>,

    /// All known conversation partners.
    pub list_users: Vec<UserPresence>,

    /// Last known unread counters, kept across user-list reloads.
    pub unread_counts: FxHashMap<String, u32>,

    /// The partner whose conversation is open, if any.
    pub selected_user: Option<String>,

    /// Conversation with the selected partner.
    pub messages_with_selected: Vec<ChatMessage>,

    /// Whether the unread divider was dismissed for the selected partner.
    pub unread_divider_dismissed: bool,
}

// ============================================================================
// AppSnapshot
// ============================================================================

/// The full application state at one point in time.
///
/// Mutated only by the reconciler, only through the state store's
/// single-writer lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppSnapshot {
    /// Authentication slice.
    pub auth: AuthState,

    /// Chat slice.
    pub chat: ChatState,
}

impl AppSnapshot {
    /// Looks up a partner's entry in the user list.
    #[must_use]
    pub fn user_entry(&self, login: &str) -> Option<&UserPresence> {
        self.chat.list_users.iter().find(|u| u.login == login)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snapshot_is_logged_out() {
        let snapshot = AppSnapshot::default();
        assert!(snapshot.auth.user.is_none());
        assert!(snapshot.chat.list_users.is_empty());
        assert!(!snapshot.chat.unread_divider_dismissed);
    }

    #[test]
    fn test_user_entry_lookup() {
        let mut snapshot = AppSnapshot::default();
        snapshot.chat.list_users.push(UserPresence {
            login: "bob".into(),
            is_online: true,
            unread_count: 2,
        });

        assert_eq!(snapshot.user_entry("bob").map(|u| u.unread_count), Some(2));
        assert!(snapshot.user_entry("carol").is_none());
    }
}
