//! # Tickward
//!
//! A tick-driven per-player session engine for persistent multiplayer
//! worlds.
//!
//! One logical thread owns the [`World`]: connected clients, their timed
//! actions, menus and broadcast lines, resident accounts, and the house,
//! group and guild registries. Storage runs off that thread through the
//! query gateway and comes back as continuations applied at a fixed point
//! of every tick.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tickward::{Engine, EngineConfig, EngineHandle};
//! use tickward::persist::MemoryBackend;
//!
//! # async fn demo() -> Result<(), tickward::TickwardError> {
//! let engine = Engine::new(Arc::new(MemoryBackend::new()), EngineConfig::default())?;
//! let (handle, commands) = EngineHandle::channel(256);
//! let (deliveries, _outbound) = tokio::sync::mpsc::unbounded_channel();
//!
//! // The engine is not Send: run it on this task and drive it via `handle`.
//! engine.run(commands, deliveries).await
//! # }
//! ```

mod builtin;
mod config;
mod engine;
mod error;
mod world;

pub use builtin::COMMANDS_PAGE;
pub use config::EngineConfig;
pub use engine::{Delivery, Engine, EngineCommand, EngineHandle, MenuCommandHandler};
pub use error::TickwardError;
pub use world::{ClientState, World};

pub use tickward_account as account;
pub use tickward_command as command;
pub use tickward_persist as persist;
pub use tickward_protocol as protocol;
pub use tickward_session as session;
pub use tickward_tick as tick;

/// Installs a `tracing` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tickward=info".into()),
        )
        .with_target(false)
        .try_init();
}

pub mod prelude {
    //! The types most engine users need.
    pub use crate::{Engine, EngineConfig, EngineHandle, TickwardError, World};
    pub use tickward_command::{Args, CommandScope};
    pub use tickward_protocol::{
        Arg, BroadcastPriority, ClientSlot, MenuAction, MenuPage, OptionCode, Outbound, Position,
        Recipient, targs,
    };
    pub use tickward_session::{MenuBuilder, ParticipantKind};
}
