//! Application state: snapshot, container, reconciliation rules.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `snapshot` | The in-memory state data model |
//! | `store` | Mutex-guarded container with subscribe/notify |
//! | `reconciler` | Pure merge rules applied per server event |

// ============================================================================
// Submodules
// ============================================================================

/// In-memory application state snapshot.
pub mod snapshot;

/// State container with a subscribe/notify contract.
pub mod store;

/// State reconciliation rules.
pub mod reconciler;

// ============================================================================
// Re-exports
// ============================================================================

pub use reconciler::IncomingOutcome;
pub use snapshot::{AppSnapshot, AuthState, ChatState, UserPresence};
pub use store::{RenderListener, Route, StateStore};
