//! Shared vocabulary for Tickward.
//!
//! This crate defines the types every other layer speaks:
//!
//! - **Identity** ([`ClientSlot`], [`SlotTicket`], [`AccountId`], and the
//!   aggregate IDs): who a piece of state belongs to.
//! - **Output** ([`Outbound`], [`Recipient`], [`MenuItem`], [`Effect`]):
//!   what the engine hands to the network layer for delivery.
//! - **Templates** ([`Template`], [`Arg`], [`targs!`]): chat and broadcast
//!   text with positional placeholders checked against their arguments.
//!
//! # Architecture
//!
//! The protocol layer knows nothing about ticks, sessions, or storage. It
//! only describes values. Encoding them for a particular client is left to
//! whoever consumes the engine's delivery channel.
//!
//! ```text
//! Engine (state machines) → Outbound → embedding server (wire encoding)
//! ```

mod error;
mod format;
mod types;

pub use error::ProtocolError;
pub use format::{Arg, Template, group_thousands};
pub use types::{
    AccountId, BroadcastPriority, ClientSlot, Effect, Emote, GroupId, GuildId, HouseId,
    MenuAction, MenuItem, MenuPage, OptionCode, Outbound, Position, Recipient, SlotTicket,
};
