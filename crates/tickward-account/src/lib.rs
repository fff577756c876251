//! Accounts and the aggregates they belong to.
//!
//! An [`Account`] holds a player's persistent progress and *weak*
//! references (IDs only) to the house it owns, the group it is in and the
//! guild it joined. Those references are a materialized view over the
//! registries in [`Aggregates`] and are refreshed two ways:
//!
//! - eagerly, when an account is initialized from its load result
//!   ([`Account::init`] runs all three reinitializers), and
//! - after membership changes: every registry mutation appends a
//!   [`MembershipChange`], and [`AccountRegistry::reconcile`] replays the
//!   log once per tick against resident accounts.
//!
//! Everything here lives on the tick thread; there are no locks.

mod account;
mod aggregates;
mod config;
mod error;
mod registry;

pub use account::{ACCOUNTS_TABLE, Account, AccountEvent, Periods, SaveKind, experience_for_level};
pub use aggregates::{
    Aggregates, Group, GroupRegistry, Guild, GuildMember, GuildRegistry, House, HouseRegistry,
    MembershipChange,
};
pub use config::AccountConfig;
pub use error::AccountError;
pub use registry::AccountRegistry;
