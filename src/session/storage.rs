//! Credential storage collaborator interface.
//!
//! The engine never owns credentials; it reads and writes them through
//! accessors the caller provides. A browser host backs these with
//! localStorage/sessionStorage, tests use [`MemoryCredentialStore`].

// ============================================================================
// Imports
// ============================================================================

use parking_lot::Mutex;

// ============================================================================
// Credentials
// ============================================================================

/// A stored login/password pair, available when both halves are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Persistent login.
    pub login: String,
    /// Session-scoped password.
    pub password: String,
}

// ============================================================================
// CredentialStore
// ============================================================================

/// Caller-provided persistent login and session-scoped password accessors.
///
/// The login is expected to survive restarts; the password only the
/// session. Reauthentication is possible only while both are available.
pub trait CredentialStore: Send + Sync {
    /// Returns the stored login, if any.
    fn login(&self) -> Option<String>;

    /// Stores the login.
    fn set_login(&self, login: &str);

    /// Removes the stored login.
    fn clear_login(&self);

    /// Returns the session password, if any.
    fn session_password(&self) -> Option<String>;

    /// Stores the session password.
    fn set_session_password(&self, password: &str);

    /// Removes the session password.
    fn clear_session_password(&self);

    /// Returns both halves when both are present.
    fn credentials(&self) -> Option<Credentials> {
        match (self.login(), self.session_password()) {
            (Some(login), Some(password)) => Some(Credentials { login, password }),
            _ => None,
        }
    }

    /// Stores both halves.
    fn store(&self, login: &str, password: &str) {
        self.set_login(login);
        self.set_session_password(password);
    }

    /// Removes both halves.
    fn clear(&self) {
        self.clear_login();
        self.clear_session_password();
    }
}

// ============================================================================
// MemoryCredentialStore
// ============================================================================

/// In-memory [`CredentialStore`] for tests and non-browser hosts.
#[derive(Default)]
pub struct MemoryCredentialStore {
    login: Mutex<Option<String>>,
    password: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn login(&self) -> Option<String> {
        self.login.lock().clone()
    }

    fn set_login(&self, login: &str) {
        *self.login.lock() = Some(login.to_string());
    }

    fn clear_login(&self) {
        *self.login.lock() = None;
    }

    fn session_password(&self) -> Option<String> {
        self.password.lock().clone()
    }

    fn set_session_password(&self, password: &str) {
        *self.password.lock() = Some(password.to_string());
    }

    fn clear_session_password(&self) {
        *self.password.lock() = None;
    }
}

// ============================================================================
// Tests
// ============================================================================
