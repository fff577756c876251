//! Error types for the session layer.

use tickward_protocol::ClientSlot;

/// Errors that can occur while managing per-client state.
///
/// All of these are precondition violations: the operation is refused and
/// the state is left as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Every slot is taken.
    #[error("all {capacity} client slots are in use")]
    Full { capacity: usize },

    /// The slot is empty (never connected, or already disconnected).
    #[error("no client connected on slot {0}")]
    NotConnected(ClientSlot),

    /// A timed action is already running for this client.
    #[error("timed action '{0}' is already running")]
    CooldownActive(String),
}
