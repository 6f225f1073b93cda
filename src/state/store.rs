//! State container with a subscribe/notify contract.
//!
//! The store decouples the reconciler from any rendering technology: the
//! engine mutates the snapshot through the store's single writer lock and
//! signals "state changed" with a route identifier; whoever renders
//! subscribes and decides what to do with it.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::Mutex;

use crate::state::snapshot::AppSnapshot;

// ============================================================================
// Route
// ============================================================================

/// Opaque route identifier passed through render and navigation hooks.
///
/// The engine never interprets routes beyond picking which one to signal;
/// layout and history handling live outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Login form.
    Login,
    /// Registration form.
    Register,
    /// Chat view.
    Chat,
    /// About page.
    About,
}

// ============================================================================
// Types
// ============================================================================

/// Callback invoked when the snapshot changed and a view should re-render.
pub type RenderListener = Box<dyn Fn(Route) + Send + Sync>;

// ============================================================================
// StateStore
// ============================================================================

/// Mutex-guarded [`AppSnapshot`] plus render subscribers.
///
/// All mutation goes through [`StateStore::update`], giving the engine the
/// single-writer discipline the snapshot requires once real tasks are in
/// play.
#[derive(Default)]
pub struct StateStore {
    snapshot: Mutex<AppSnapshot>,
    listeners: Mutex<Vec<RenderListener>>,
}

impl StateStore {
    /// Creates a store holding the logged-out snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> AppSnapshot {
        self.snapshot.lock().clone()
    }

    /// Mutates the snapshot under the writer lock.
    ///
    /// The closure's return value is passed through, which lets callers
    /// extract data from the pre- or post-state in the same critical
    /// section.
    pub fn update<R>(&self, f: impl FnOnce(&mut AppSnapshot) -> R) -> R {
        let mut guard = self.snapshot.lock();
        f(&mut guard)
    }

    /// Registers a render listener.
    pub fn subscribe(&self, listener: RenderListener) {
        self.listeners.lock().push(listener);
    }

    /// Signals every listener that state changed.
    ///
    /// Listeners run outside the snapshot lock; they may call
    /// [`StateStore::snapshot`] freely.
    pub fn notify(&self, route: Route) {
        let guard = self.listeners.lock();
        for listener in guard.iter() {
            listener(route);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
