//! Session orchestration: the facade tying transport, state and
//! reconnection together.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `storage` | Caller-provided credential accessors |
//! | `requests` | Typed request/response API |
//! | `reconnect` | Connection-loss recovery cycle |
//!
//! [`ChatSession`] is the entry point applications hold: it owns the
//! socket, the state store and the reconnection supervisor, wires pushes
//! into the reconciler, and exposes one method per user-facing operation.

// ============================================================================
// Submodules
// ============================================================================

/// Caller-provided credential accessors.
pub mod storage;

/// Typed request/response API.
pub mod requests;

/// Connection-loss recovery cycle.
pub mod reconnect;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::identifiers::MessageId;
use crate::protocol::{Envelope, Push};
use crate::state::{reconciler, AppSnapshot, IncomingOutcome, Route, StateStore};
use crate::transport::ChatSocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use reconnect::{
    CONNECTION_LOST_BANNER, RECONNECT_DELAY, ReconnectConfig, ReconnectSupervisor,
};
pub use storage::{CredentialStore, Credentials, MemoryCredentialStore};

// ============================================================================
// Types
// ============================================================================

/// Callback invoked when the session decides the application must switch
/// routes (successful login, logout, failed reauthentication).
pub type NavigateHandler = Box<dyn Fn(Route) + Send + Sync>;

// ============================================================================
// ChatSession
// ============================================================================

/// The application-facing session facade.
///
/// Owns one [`ChatSocket`], one [`StateStore`] and one
/// [`ReconnectSupervisor`]; every server push flows through the reconciler
/// exactly once, and every state change ends in a render notification.
///
/// # Wiring
///
/// - subscribe to renders through [`ChatSession::store`];
/// - set the navigation callback with [`ChatSession::set_navigate`];
/// - call [`ChatSession::restore_session`] on startup, then the operation
///   methods as the user acts.
pub struct ChatSession {
    socket: ChatSocket,
    store: Arc<StateStore>,
    credentials: Arc<dyn CredentialStore>,
    supervisor: Arc<ReconnectSupervisor>,
    navigate: Mutex<Option<NavigateHandler>>,
    last_route: Mutex<Route>,
    url: String,
}

impl ChatSession {
    /// Creates a session and wires push and close handling.
    #[must_use]
    pub fn new(config: ReconnectConfig, credentials: Arc<dyn CredentialStore>) -> Arc<Self> {
        let socket = ChatSocket::new();
        let store = Arc::new(StateStore::new());
        let supervisor = ReconnectSupervisor::new(
            socket.clone(),
            Arc::clone(&credentials),
            Arc::clone(&store),
            config.clone(),
        );

        let session = Arc::new(Self {
            socket,
            store,
            credentials,
            supervisor,
            navigate: Mutex::new(None),
            last_route: Mutex::new(Route::Login),
            url: config.url,
        });

        let weak = Arc::downgrade(&session);
        session.socket.set_push_handler(Box::new(move |envelope| {
            if let Some(session) = weak.upgrade() {
                session.handle_push(&envelope);
            }
        }));

        let weak = Arc::downgrade(&session);
        session.socket.on_unexpected_close(Box::new(move || {
            if let Some(session) = weak.upgrade() {
                session.supervisor.connection_lost();
            }
        }));

        // Banner up: re-render the current route so the view shows it.
        let weak = Arc::downgrade(&session);
        session.supervisor.on_cycle_start(Box::new(move || {
            if let Some(session) = weak.upgrade() {
                let route = *session.last_route.lock();
                session.render(route);
            }
        }));

        let weak = Arc::downgrade(&session);
        session.supervisor.on_reauth_success(Box::new(move || {
            if let Some(session) = weak.upgrade() {
                let route = *session.last_route.lock();
                session.render(route);
            }
        }));

        let weak = Arc::downgrade(&session);
        session.supervisor.on_reauth_failure(Box::new(move || {
            if let Some(session) = weak.upgrade() {
                session.navigate_to(Route::Login);
            }
        }));

        session
    }

    // ========================================================================
    // Wiring and accessors
    // ========================================================================

    /// The state store; subscribe here for render notifications.
    #[must_use]
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Returns a copy of the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> AppSnapshot {
        self.store.snapshot()
    }

    /// Returns the reconnection banner while a recovery cycle is running.
    #[must_use]
    pub fn banner(&self) -> Option<String> {
        self.supervisor.banner()
    }

    /// Returns `true` while a connection is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.socket.is_connected()
    }

    /// Sets the route-navigation callback.
    pub fn set_navigate(&self, handler: NavigateHandler) {
        *self.navigate.lock() = Some(handler);
    }

    /// Records the route and notifies render subscribers.
    fn render(&self, route: Route) {
        *self.last_route.lock() = route;
        self.store.notify(route);
    }

    /// Switches routes: invokes the navigation callback, then renders.
    fn navigate_to(&self, route: Route) {
        {
            let guard = self.navigate.lock();
            if let Some(handler) = guard.as_ref() {
                handler(route);
            }
        }
        self.render(route);
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// Connects and authenticates with fresh credentials.
    ///
    /// On success the credentials are persisted for reconnection and the
    /// session navigates to the chat route.
    ///
    /// # Errors
    ///
    /// Connection errors from [`ChatSocket::connect`] and authentication
    /// errors from [`requests::login`].
    pub async fn login(&self, login: &str, password: &str) -> Result<()> {
        self.socket.connect(&self.url).await?;
        requests::login(&self.socket, login, password).await?;

        self.credentials.store(login, password);
        self.store
            .update(|snapshot| reconciler::apply_login_success(snapshot, login));
        self.navigate_to(Route::Chat);

        Ok(())
    }

    /// Attempts to resume a previous session from stored credentials.
    ///
    /// Returns `Ok(false)` when no credentials are stored or the server
    /// rejects them; rejected credentials are cleared so the next startup
    /// goes straight to the login route.
    ///
    /// # Errors
    ///
    /// Connection errors only; an authentication failure is an ordinary
    /// `Ok(false)`.
    pub async fn restore_session(&self) -> Result<bool> {
        let Some(creds) = self.credentials.credentials() else {
            return Ok(false);
        };

        self.socket.connect(&self.url).await?;

        match requests::login(&self.socket, &creds.login, &creds.password).await {
            Ok(()) => {
                self.store
                    .update(|snapshot| reconciler::apply_login_success(snapshot, &creds.login));
                self.navigate_to(Route::Chat);
                Ok(true)
            }
            Err(e) => {
                debug!(error = %e, "Stored session not restorable");
                self.credentials.clear();
                Ok(false)
            }
        }
    }

    /// Logs out and tears the session down locally.
    ///
    /// The logout request is best effort: it is sent only when a
    /// connection is open and credentials are known, and nothing awaits
    /// the acknowledgement. Local teardown happens regardless.
    pub fn logout(&self) {
        if self.socket.is_connected() {
            if let Some(creds) = self.credentials.credentials() {
                requests::send_logout(&self.socket, &creds.login, &creds.password);
            }
        }

        self.socket.close();
        self.credentials.clear();
        self.store.update(reconciler::clear_session);
        self.navigate_to(Route::Login);
    }

    // ========================================================================
    // User list
    // ========================================================================

    /// Loads and merges the active and inactive user lists.
    ///
    /// A no-op when disconnected or logged out.
    ///
    /// # Errors
    ///
    /// Transport errors from the two queries; the queries themselves fail
    /// open to empty lists.
    pub async fn load_users(&self) -> Result<()> {
        if !self.socket.is_connected() {
            return Ok(());
        }
        let Some(current_user) = self.store.snapshot().auth.user else {
            return Ok(());
        };

        let (active, inactive) = tokio::join!(
            requests::list_active_users(&self.socket),
            requests::list_inactive_users(&self.socket),
        );
        let (active, inactive) = (active?, inactive?);

        self.store.update(|snapshot| {
            reconciler::merge_user_lists(&mut snapshot.chat, &active, &inactive, &current_user);
        });
        self.render(Route::Chat);

        Ok(())
    }

    // ========================================================================
    // Conversation
    // ========================================================================

    /// Opens the conversation with a partner and fetches its history.
    ///
    /// The conversation renders immediately after selection; history
    /// replaces the empty view when the fetch succeeds, and a failed fetch
    /// leaves it empty rather than stale.
    pub async fn select_user(&self, login: &str) {
        self.store
            .update(|snapshot| reconciler::select_user(&mut snapshot.chat, login));

        match requests::fetch_history(&self.socket, login).await {
            Ok(messages) => {
                self.store.update(|snapshot| {
                    // The selection may have changed while the fetch was in
                    // flight; only the still-open conversation gets it.
                    if snapshot.chat.selected_user.as_deref() == Some(login) {
                        reconciler::replace_history(&mut snapshot.chat, messages);
                    }
                });
            }
            Err(e) => warn!(error = %e, login, "History fetch failed"),
        }

        self.render(Route::Chat);
    }

    /// Dismisses the unread divider and marks the unread messages read.
    ///
    /// Re-renders once every mark-read request settles; failed requests
    /// leave their message unread until the next history fetch.
    pub async fn dismiss_unread_divider(&self) {
        let ids = self.store.update(reconciler::dismiss_divider);

        let results = join_all(
            ids.iter()
                .map(|id| requests::mark_read(&self.socket, id)),
        )
        .await;

        self.store.update(|snapshot| {
            for update in results.iter().filter_map(|r| r.as_ref().ok()) {
                reconciler::apply_read(&mut snapshot.chat, update);
            }
        });
        self.render(Route::Chat);
    }

    /// Sends a message to the selected partner.
    ///
    /// Blank text (empty after trimming) and no selection are silent
    /// no-ops. The conversation shows only the server-confirmed copy; on
    /// failure nothing is appended but a re-render still fires so the view
    /// can surface the state.
    ///
    /// # Errors
    ///
    /// [`crate::Error::Server`] or transport errors from the send.
    pub async fn send_text(&self, text: &str) -> Result<()> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(());
        }
        let Some(to) = self.store.snapshot().chat.selected_user else {
            return Ok(());
        };

        match requests::send_message(&self.socket, &to, trimmed).await {
            Ok(message) => {
                self.store.update(|snapshot| {
                    reconciler::append_sent(&mut snapshot.chat, message);
                    snapshot.chat.unread_divider_dismissed = true;
                });
                self.render(Route::Chat);
                Ok(())
            }
            Err(e) => {
                self.render(Route::Chat);
                Err(e)
            }
        }
    }

    /// Deletes one of the current user's messages.
    ///
    /// # Errors
    ///
    /// [`crate::Error::Server`] or transport errors.
    pub async fn delete_message(&self, id: &MessageId) -> Result<()> {
        let update = requests::delete_message(&self.socket, id).await?;

        self.store
            .update(|snapshot| reconciler::apply_deleted(&mut snapshot.chat, &update));
        self.render(Route::Chat);

        Ok(())
    }

    /// Replaces the text of one of the current user's messages.
    ///
    /// Blank replacement text is a silent no-op.
    ///
    /// # Errors
    ///
    /// [`crate::Error::Server`] or transport errors.
    pub async fn edit_message(&self, id: &MessageId, text: &str) -> Result<()> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(());
        }

        let update = requests::edit_message(&self.socket, id, trimmed).await?;

        self.store
            .update(|snapshot| reconciler::apply_edited(&mut snapshot.chat, &update));
        self.render(Route::Chat);

        Ok(())
    }

    // ========================================================================
    // Push handling
    // ========================================================================

    /// Routes one identifier-less envelope through the reconciler.
    fn handle_push(self: &Arc<Self>, envelope: &Envelope) {
        let Some(push) = Push::parse(envelope) else {
            trace!(kind = %envelope.kind, "Ignored push");
            return;
        };

        match push {
            Push::ExternalLogin { login } => {
                self.store
                    .update(|s| reconciler::apply_external_login(&mut s.chat, &login));
                self.render(Route::Chat);
            }

            Push::ExternalLogout { login } => {
                self.store
                    .update(|s| reconciler::apply_external_logout(&mut s.chat, &login));
                self.render(Route::Chat);
            }

            Push::IncomingMessage(message) => {
                let outcome = self
                    .store
                    .update(|s| reconciler::apply_incoming(s, &message));

                match outcome {
                    IncomingOutcome::AppendedToSelected(id) => {
                        self.mark_read_in_background(id);
                        self.render(Route::Chat);
                    }
                    IncomingOutcome::CounterBumped => self.render(Route::Chat),
                    IncomingOutcome::Ignored => {}
                }
            }

            Push::Delivered(update) => {
                self.store
                    .update(|s| reconciler::apply_delivered(&mut s.chat, &update));
                self.render(Route::Chat);
            }

            Push::Read(update) => {
                self.store
                    .update(|s| reconciler::apply_read(&mut s.chat, &update));
                self.render(Route::Chat);
            }

            Push::Deleted(update) => {
                self.store
                    .update(|s| reconciler::apply_deleted(&mut s.chat, &update));
                self.render(Route::Chat);
            }

            Push::Edited(update) => {
                self.store
                    .update(|s| reconciler::apply_edited(&mut s.chat, &update));
                self.render(Route::Chat);
            }

            Push::UnreadCount(update) => {
                self.store.update(|s| {
                    reconciler::set_unread_count(&mut s.chat, &update.login, update.count);
                });
                self.render(Route::Chat);
            }
        }
    }

    /// Marks a just-received message read without blocking the push path.
    fn mark_read_in_background(self: &Arc<Self>, id: MessageId) {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let Some(session) = weak.upgrade() else {
                return;
            };
            match requests::mark_read(&session.socket, &id).await {
                Ok(update) => {
                    session
                        .store
                        .update(|s| reconciler::apply_read(&mut s.chat, &update));
                    session.render(Route::Chat);
                }
                Err(e) => debug!(error = %e, "Mark-read after receive failed"),
            }
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
