//! Unified error type for Tickward.

use tickward_account::AccountError;
use tickward_command::CommandError;
use tickward_persist::PersistError;
use tickward_protocol::{ClientSlot, ProtocolError};
use tickward_session::SessionError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TickwardError {
    /// A template/argument mismatch.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A storage failure or malformed row.
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// A per-client precondition (slot empty, table full, action running).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// An account or registry precondition.
    #[error(transparent)]
    Account(#[from] AccountError),

    /// Command registration or dispatch.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The client has no character in the world right now.
    #[error("client {0} has no character in the world")]
    NoCharacter(ClientSlot),

    /// The client is not logged in to an account.
    #[error("client {0} is not logged in")]
    NotLoggedIn(ClientSlot),

    /// Reading the configuration failed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// The engine loop is gone.
    #[error("engine is not running")]
    EngineStopped,
}
