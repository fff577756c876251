//! Houses, groups and guilds.
//!
//! The registries are read freely, but every mutation goes through
//! [`Aggregates`] so it can append a [`MembershipChange`] for each account
//! whose house, group or guild reference may now be wrong.

use std::collections::{BTreeMap, BTreeSet};

use tickward_persist::{PersistError, ResultSet};
use tickward_protocol::{AccountId, GroupId, GuildId, HouseId};
use tracing::{debug, info};

use crate::AccountError;

/// An account whose relationship reference needs a re-scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipChange {
    House(AccountId),
    Group(AccountId),
    Guild(AccountId),
}

// ---------------------------------------------------------------------------
// Houses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct House {
    pub id: HouseId,
    pub owner: Option<AccountId>,
    pub price: i64,
}

#[derive(Debug, Default)]
pub struct HouseRegistry {
    houses: BTreeMap<HouseId, House>,
}

impl HouseRegistry {
    pub fn get(&self, id: HouseId) -> Option<&House> {
        self.houses.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &House> {
        self.houses.values()
    }

    pub fn len(&self) -> usize {
        self.houses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.houses.is_empty()
    }

    /// Adds or replaces a house (world setup, load results).
    pub fn insert(&mut self, house: House) {
        self.houses.insert(house.id, house);
    }

    /// Reads `ID`, `UserID` (0 = unowned) and `Price` rows.
    pub fn load(&mut self, mut rows: ResultSet) -> Result<usize, PersistError> {
        let mut n = 0;
        while rows.next() {
            let owner = rows.get_int64("UserID")?;
            self.insert(House {
                id: HouseId(rows.get_int64("ID")?),
                owner: (owner > 0).then_some(AccountId(owner)),
                price: rows.get_int64("Price")?,
            });
            n += 1;
        }
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: GroupId,
    pub leader: AccountId,
    pub members: BTreeSet<AccountId>,
}

#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: BTreeMap<GroupId, Group>,
    next_id: i64,
}

impl GroupRegistry {
    pub fn get(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// The group `account` is in, if any.
    pub fn group_of(&self, account: AccountId) -> Option<&Group> {
        self.groups.values().find(|g| g.members.contains(&account))
    }

    /// Reads `ID`, `OwnerUID` and `AccountIDs` (comma separated) rows.
    pub fn load(&mut self, mut rows: ResultSet) -> Result<usize, PersistError> {
        let mut n = 0;
        while rows.next() {
            let id = GroupId(rows.get_int64("ID")?);
            let leader = AccountId(rows.get_int64("OwnerUID")?);
            let mut members: BTreeSet<AccountId> = rows
                .get_string("AccountIDs")?
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .map(AccountId)
                .collect();
            members.insert(leader);
            self.next_id = self.next_id.max(id.0);
            self.groups.insert(
                id,
                Group {
                    id,
                    leader,
                    members,
                },
            );
            n += 1;
        }
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// Guilds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuildMember {
    pub deposit: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guild {
    pub id: GuildId,
    pub name: String,
    pub leader: AccountId,
    pub level: i32,
    pub experience: i64,
    pub members: BTreeMap<AccountId, GuildMember>,
}

impl Guild {
    /// Adds guild experience, levelling up every `100 * level` points.
    /// Returns the number of levels gained.
    pub fn add_experience(&mut self, amount: i64) -> u32 {
        self.experience += amount;
        let mut gained = 0;
        loop {
            let need = 100 * self.level.max(1) as i64;
            if self.experience < need {
                break;
            }
            self.experience -= need;
            self.level += 1;
            gained += 1;
        }
        gained
    }
}

#[derive(Debug, Default)]
pub struct GuildRegistry {
    guilds: BTreeMap<GuildId, Guild>,
    next_id: i64,
}

impl GuildRegistry {
    pub fn get(&self, id: GuildId) -> Option<&Guild> {
        self.guilds.get(&id)
    }

    /// Guild experience and levels are not membership, so mutable access
    /// is fine here.
    pub fn get_mut(&mut self, id: GuildId) -> Option<&mut Guild> {
        self.guilds.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Guild> {
        self.guilds.values()
    }

    pub fn len(&self) -> usize {
        self.guilds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guilds.is_empty()
    }

    pub fn guild_of(&self, account: AccountId) -> Option<&Guild> {
        self.guilds
            .values()
            .find(|g| g.members.contains_key(&account))
    }

    /// Reads `ID`, `Name`, `UserID` (leader), `Level`, `Experience` rows.
    pub fn load(&mut self, mut rows: ResultSet) -> Result<usize, PersistError> {
        let mut n = 0;
        while rows.next() {
            let id = GuildId(rows.get_int64("ID")?);
            let leader = AccountId(rows.get_int64("UserID")?);
            self.next_id = self.next_id.max(id.0);
            self.guilds.insert(
                id,
                Guild {
                    id,
                    name: rows.get_string("Name")?,
                    leader,
                    level: rows.get_int("Level")?,
                    experience: rows.get_int64("Experience")?,
                    members: BTreeMap::from([(leader, GuildMember::default())]),
                },
            );
            n += 1;
        }
        Ok(n)
    }

    /// Reads `UserID`, `GuildID`, `Deposit` rows. Rows for unknown guilds
    /// are skipped.
    pub fn load_members(&mut self, mut rows: ResultSet) -> Result<usize, PersistError> {
        let mut n = 0;
        while rows.next() {
            let guild = GuildId(rows.get_int64("GuildID")?);
            let Some(g) = self.guilds.get_mut(&guild) else {
                debug!(%guild, "member row for unknown guild skipped");
                continue;
            };
            g.members.insert(
                AccountId(rows.get_int64("UserID")?),
                GuildMember {
                    deposit: rows.get_int64("Deposit")?,
                },
            );
            n += 1;
        }
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// Aggregates: the mutation front door
// ---------------------------------------------------------------------------

/// All relationship registries plus the membership change log.
#[derive(Debug, Default)]
pub struct Aggregates {
    pub houses: HouseRegistry,
    pub groups: GroupRegistry,
    pub guilds: GuildRegistry,
    changes: Vec<MembershipChange>,
}

impl Aggregates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains the change log.
    pub fn take_changes(&mut self) -> Vec<MembershipChange> {
        std::mem::take(&mut self.changes)
    }

    pub fn pending_changes(&self) -> usize {
        self.changes.len()
    }

    // -- houses -------------------------------------------------------------

    pub fn buy_house(&mut self, house: HouseId, buyer: AccountId) -> Result<(), AccountError> {
        if self.houses.iter().any(|h| h.owner == Some(buyer)) {
            return Err(AccountError::AlreadyHomeowner(buyer));
        }
        let h = self
            .houses
            .houses
            .get_mut(&house)
            .ok_or(AccountError::NoSuchHouse(house))?;
        if h.owner.is_some() {
            return Err(AccountError::HouseOwned(house));
        }
        h.owner = Some(buyer);
        self.changes.push(MembershipChange::House(buyer));
        info!(%house, account = %buyer, "house bought");
        Ok(())
    }

    /// Clears the owner. Returns the previous owner.
    pub fn sell_house(&mut self, house: HouseId) -> Result<Option<AccountId>, AccountError> {
        let h = self
            .houses
            .houses
            .get_mut(&house)
            .ok_or(AccountError::NoSuchHouse(house))?;
        let previous = h.owner.take();
        if let Some(owner) = previous {
            self.changes.push(MembershipChange::House(owner));
            info!(%house, account = %owner, "house sold");
        }
        Ok(previous)
    }

    // -- groups -------------------------------------------------------------

    pub fn create_group(&mut self, leader: AccountId) -> Result<GroupId, AccountError> {
        if self.groups.group_of(leader).is_some() {
            return Err(AccountError::AlreadyMember(leader));
        }
        self.groups.next_id += 1;
        let id = GroupId(self.groups.next_id);
        self.groups.groups.insert(
            id,
            Group {
                id,
                leader,
                members: BTreeSet::from([leader]),
            },
        );
        self.changes.push(MembershipChange::Group(leader));
        info!(group = %id, %leader, "group created");
        Ok(id)
    }

    pub fn join_group(&mut self, group: GroupId, account: AccountId) -> Result<(), AccountError> {
        if self.groups.group_of(account).is_some() {
            return Err(AccountError::AlreadyMember(account));
        }
        let g = self
            .groups
            .groups
            .get_mut(&group)
            .ok_or(AccountError::NoSuchGroup(group))?;
        g.members.insert(account);
        self.changes.push(MembershipChange::Group(account));
        Ok(())
    }

    /// Removes `account`. The last member leaving disbands the group; a
    /// leaving leader hands over to the lowest remaining account ID.
    pub fn leave_group(&mut self, group: GroupId, account: AccountId) -> Result<(), AccountError> {
        let g = self
            .groups
            .groups
            .get_mut(&group)
            .ok_or(AccountError::NoSuchGroup(group))?;
        if !g.members.remove(&account) {
            return Err(AccountError::NotMember(account));
        }
        self.changes.push(MembershipChange::Group(account));

        match g.members.first().copied() {
            None => {
                self.groups.groups.remove(&group);
                debug!(%group, "empty group removed");
            }
            Some(next) if g.leader == account => g.leader = next,
            Some(_) => {}
        }
        Ok(())
    }

    pub fn disband_group(&mut self, group: GroupId) -> Result<(), AccountError> {
        let g = self
            .groups
            .groups
            .remove(&group)
            .ok_or(AccountError::NoSuchGroup(group))?;
        self.changes
            .extend(g.members.iter().copied().map(MembershipChange::Group));
        info!(%group, members = g.members.len(), "group disbanded");
        Ok(())
    }

    // -- guilds -------------------------------------------------------------

    pub fn create_guild(
        &mut self,
        name: impl Into<String>,
        leader: AccountId,
    ) -> Result<GuildId, AccountError> {
        if self.guilds.guild_of(leader).is_some() {
            return Err(AccountError::AlreadyMember(leader));
        }
        self.guilds.next_id += 1;
        let id = GuildId(self.guilds.next_id);
        self.guilds.guilds.insert(
            id,
            Guild {
                id,
                name: name.into(),
                leader,
                level: 1,
                experience: 0,
                members: BTreeMap::from([(leader, GuildMember::default())]),
            },
        );
        self.changes.push(MembershipChange::Guild(leader));
        info!(guild = %id, %leader, "guild created");
        Ok(id)
    }

    pub fn join_guild(&mut self, guild: GuildId, account: AccountId) -> Result<(), AccountError> {
        if self.guilds.guild_of(account).is_some() {
            return Err(AccountError::AlreadyMember(account));
        }
        let g = self
            .guilds
            .guilds
            .get_mut(&guild)
            .ok_or(AccountError::NoSuchGuild(guild))?;
        g.members.insert(account, GuildMember::default());
        self.changes.push(MembershipChange::Guild(account));
        Ok(())
    }

    /// Removes a member. The leader cannot leave; transfer or dissolve instead.
    pub fn leave_guild(&mut self, guild: GuildId, account: AccountId) -> Result<(), AccountError> {
        let g = self
            .guilds
            .guilds
            .get_mut(&guild)
            .ok_or(AccountError::NoSuchGuild(guild))?;
        if g.leader == account || g.members.remove(&account).is_none() {
            return Err(AccountError::NotMember(account));
        }
        self.changes.push(MembershipChange::Guild(account));
        Ok(())
    }

    pub fn transfer_guild(&mut self, guild: GuildId, new_leader: AccountId) -> Result<(), AccountError> {
        let g = self
            .guilds
            .guilds
            .get_mut(&guild)
            .ok_or(AccountError::NoSuchGuild(guild))?;
        if !g.members.contains_key(&new_leader) {
            return Err(AccountError::NotMember(new_leader));
        }
        let old = std::mem::replace(&mut g.leader, new_leader);
        self.changes.push(MembershipChange::Guild(old));
        self.changes.push(MembershipChange::Guild(new_leader));
        info!(%guild, from = %old, to = %new_leader, "guild leadership transferred");
        Ok(())
    }

    pub fn dissolve_guild(&mut self, guild: GuildId) -> Result<(), AccountError> {
        let g = self
            .guilds
            .guilds
            .remove(&guild)
            .ok_or(AccountError::NoSuchGuild(guild))?;
        self.changes
            .extend(g.members.keys().copied().map(MembershipChange::Guild));
        info!(%guild, members = g.members.len(), "guild dissolved");
        Ok(())
    }
}
