//! Per-client state for Tickward.
//!
//! Every connected client owns a handful of small machines that the engine
//! advances once per tick:
//!
//! 1. **Slots** ([`SlotTable`]): which client indices are taken, by whom,
//!    and at which generation.
//! 2. **Timed actions** ([`Cooldown`]): "hold still for three seconds"
//!    style actions with a progress bar and interruption on movement.
//! 3. **Menus** ([`MenuState`], [`MenuProducers`]): the paged option list
//!    and queued optional follow-up prompts.
//! 4. **Broadcasts** ([`BroadcastState`]): priority pre-emption and
//!    de-duplication of the center-screen line.
//!
//! # How it fits in the stack
//!
//! ```text
//! Engine (above)   ← owns a SlotTable of per-client state, steps it each tick
//!     ↕
//! Session layer (this crate)   ← pure state machines, no I/O
//!     ↕
//! Protocol / Tick (below)   ← ClientSlot, MenuItem, Clock
//! ```
//!
//! None of these machines touch the network or storage. They return what
//! happened and the engine turns that into outbound messages.

mod broadcast;
mod config;
mod cooldown;
mod error;
mod menu;
mod slots;

pub use broadcast::BroadcastState;
pub use config::SessionConfig;
pub use cooldown::{Cooldown, CooldownCallback, CooldownState, CooldownStep};
pub use error::SessionError;
pub use menu::{FollowUp, MenuBuilder, MenuProducers, MenuState, Producer};
pub use slots::{ParticipantKind, SlotTable};
