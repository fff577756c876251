//! Error types for the account layer.

use tickward_persist::PersistError;
use tickward_protocol::{AccountId, GroupId, GuildId, HouseId};

/// Errors from account loading and registry mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    /// The load result was missing a column or had the wrong type.
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// No resident account with this ID.
    #[error("account {0} is not resident")]
    NotResident(AccountId),

    #[error("house {0} does not exist")]
    NoSuchHouse(HouseId),

    #[error("house {0} already has an owner")]
    HouseOwned(HouseId),

    #[error("account {0} already owns a house")]
    AlreadyHomeowner(AccountId),

    #[error("group {0} does not exist")]
    NoSuchGroup(GroupId),

    #[error("guild {0} does not exist")]
    NoSuchGuild(GuildId),

    /// The account is already in a group or guild of that kind.
    #[error("account {0} is already a member")]
    AlreadyMember(AccountId),

    #[error("account {0} is not a member")]
    NotMember(AccountId),
}
