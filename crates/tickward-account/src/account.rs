//! The account: persistent per-player progress.

use std::collections::{BTreeMap, BTreeSet};

use tickward_persist::{Query, ResultSet};
use tickward_protocol::{AccountId, ClientSlot, GroupId, GuildId, HouseId};
use tracing::{debug, info};

use crate::{AccountConfig, AccountError, Aggregates, GroupRegistry, GuildRegistry, HouseRegistry};

/// Table accounts are loaded from and saved to.
pub const ACCOUNTS_TABLE: &str = "tw_accounts";

/// Experience needed to advance from `level` to `level + 1`.
pub fn experience_for_level(level: i32) -> i64 {
    let level = level.max(1) as i64;
    20 * level * level + 80
}

/// Daily / weekly / monthly reset stamps (unix seconds).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Periods {
    pub daily_stamp: i64,
    pub week_stamp: i64,
    pub month_stamp: i64,
}

/// Which columns a save writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SaveKind {
    /// Level and experience.
    Stats,
    /// Upgrade points and attribute columns.
    Upgrades,
    /// Relations, prison time, daily chair gold.
    SocialStatus,
}

/// Something the engine should tell the player or act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountEvent {
    LevelUp { level: i32 },
    RelationsChanged { relations: i32 },
    /// Relations hit the maximum.
    Wanted,
    GuildExperience { guild: GuildId, amount: i64 },
}

#[derive(Debug, Clone)]
pub struct Account {
    id: AccountId,
    login: String,
    last_login: i64,
    slot: Option<ClientSlot>,

    pub level: i32,
    pub exp: i64,
    pub upgrade: i32,
    pub prison_seconds: i32,
    pub daily_chair_golds: i32,
    pub relations: i32,
    pub world_id: i32,
    pub periods: Periods,
    /// Attribute column name to value.
    pub stats: BTreeMap<String, i32>,

    house: Option<HouseId>,
    group: Option<GroupId>,
    guild: Option<GuildId>,

    pending_saves: BTreeSet<SaveKind>,
    gains: u32,
    offline_since: Option<u64>,
}

impl Account {
    /// A blank account; call [`init`](Self::init) with its load result.
    pub fn new(id: AccountId, login: impl Into<String>) -> Self {
        Self {
            id,
            login: login.into(),
            last_login: 0,
            slot: None,
            level: 1,
            exp: 0,
            upgrade: 0,
            prison_seconds: 0,
            daily_chair_golds: 0,
            relations: 0,
            world_id: 0,
            periods: Periods::default(),
            stats: BTreeMap::new(),
            house: None,
            group: None,
            guild: None,
            pending_saves: BTreeSet::new(),
            gains: 0,
            offline_since: None,
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    /// Last login stamp as loaded (unix seconds, 0 if never).
    pub fn last_login(&self) -> i64 {
        self.last_login
    }

    /// The slot this account is bound to, if online.
    pub fn slot(&self) -> Option<ClientSlot> {
        self.slot
    }

    pub(crate) fn set_slot(&mut self, slot: Option<ClientSlot>) {
        if slot.is_some() {
            self.offline_since = None;
        }
        self.slot = slot;
    }

    /// Tick of the last detach, `None` while online.
    pub fn offline_since(&self) -> Option<u64> {
        self.offline_since
    }

    pub(crate) fn set_offline_since(&mut self, tick: u64) {
        self.offline_since = Some(tick);
    }

    pub fn house(&self) -> Option<HouseId> {
        self.house
    }

    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    pub fn guild(&self) -> Option<GuildId> {
        self.guild
    }

    pub fn is_prisoned(&self) -> bool {
        self.prison_seconds > 0
    }

    /// Fills scalar fields from `rows` (positioned on the account row), then
    /// resolves house, group and guild against `aggregates`.
    ///
    /// # Errors
    /// A missing or mistyped required column. The account is left unchanged.
    pub fn init(
        &mut self,
        rows: &ResultSet,
        config: &AccountConfig,
        aggregates: &Aggregates,
    ) -> Result<(), AccountError> {
        let mut stats = BTreeMap::new();
        for column in &config.stat_columns {
            stats.insert(column.clone(), rows.get_int(column)?);
        }
        let level = rows.get_int("Level")?;
        let exp = rows.get_int64("Exp")?;
        let upgrade = rows.get_int("Upgrade")?;
        let prison_seconds = rows.get_int("PrisonSeconds")?;
        let daily_chair_golds = rows.get_int("DailyChairGolds")?;
        let relations = rows.get_int("Relations")?;
        let world_id = rows.get_int("WorldID")?;
        let periods = Periods {
            daily_stamp: rows.get_int64("DailyStamp")?,
            week_stamp: rows.get_int64("WeekStamp")?,
            month_stamp: rows.get_int64("MonthStamp")?,
        };

        self.level = level.max(1);
        self.exp = exp;
        self.upgrade = upgrade;
        self.prison_seconds = prison_seconds;
        self.daily_chair_golds = daily_chair_golds;
        self.relations = relations;
        self.world_id = world_id;
        self.periods = periods;
        self.stats = stats;
        // Optional column.
        self.last_login = rows.get_int64("LoginDate").unwrap_or(0);

        self.reinitialize_house(&aggregates.houses);
        self.reinitialize_group(&aggregates.groups);
        self.reinitialize_guild(&aggregates.guilds);

        info!(account = %self.id, login = %self.login, level = self.level, "account initialized");
        Ok(())
    }

    // -- relationship resolution --------------------------------------------

    /// Points `house` at the house this account owns, or clears it.
    pub fn reinitialize_house(&mut self, houses: &HouseRegistry) {
        self.house = houses
            .iter()
            .find(|h| h.owner == Some(self.id))
            .map(|h| h.id);
    }

    pub fn reinitialize_group(&mut self, groups: &GroupRegistry) {
        self.group = groups.group_of(self.id).map(|g| g.id);
    }

    pub fn reinitialize_guild(&mut self, guilds: &GuildRegistry) {
        self.guild = guilds.guild_of(self.id).map(|g| g.id);
    }

    /// Both accounts belong to the same guild.
    pub fn same_guild(&self, other: &Account) -> bool {
        self.guild.is_some() && self.guild == other.guild
    }

    // -- progression ----------------------------------------------------------

    /// Adds experience, levelling up as often as it covers up to
    /// `config.max_level`. Experience saturates at `i64::MAX`.
    pub fn add_experience(&mut self, value: i64, config: &AccountConfig) -> Vec<AccountEvent> {
        let mut events = Vec::new();
        self.exp = self.exp.saturating_add(value);

        let mut levelled = false;
        while self.level < config.max_level && self.exp >= experience_for_level(self.level) {
            self.exp -= experience_for_level(self.level);
            self.level += 1;
            self.upgrade = self.upgrade.saturating_add(1);
            levelled = true;
            events.push(AccountEvent::LevelUp { level: self.level });
        }
        if levelled {
            self.request_save(SaveKind::Stats);
            self.request_save(SaveKind::Upgrades);
            info!(account = %self.id, level = self.level, "level up");
        }

        self.gains += 1;
        if self.gains >= config.stats_save_every.max(1) {
            self.gains = 0;
            self.request_save(SaveKind::Stats);
        }

        if let Some(guild) = self.guild {
            events.push(AccountEvent::GuildExperience { guild, amount: 1 });
        }
        events
    }

    /// Raises relations, capped at `config.max_relations`. No-op once maxed.
    pub fn increase_relations(&mut self, value: i32, config: &AccountConfig) -> Vec<AccountEvent> {
        if self.relations >= config.max_relations {
            return Vec::new();
        }
        self.relations = self
            .relations
            .saturating_add(value.max(0))
            .min(config.max_relations);
        self.request_save(SaveKind::SocialStatus);

        let mut events = vec![AccountEvent::RelationsChanged {
            relations: self.relations,
        }];
        if self.relations >= config.max_relations {
            events.push(AccountEvent::Wanted);
        }
        events
    }

    pub fn reset_relations(&mut self) {
        self.relations = 0;
        self.request_save(SaveKind::SocialStatus);
    }

    pub fn imprison(&mut self, seconds: i32) {
        self.prison_seconds = seconds;
        self.request_save(SaveKind::SocialStatus);
    }

    pub fn release(&mut self) {
        self.prison_seconds = -1;
        self.request_save(SaveKind::SocialStatus);
    }

    pub fn reset_daily_chair_golds(&mut self) {
        self.daily_chair_golds = 0;
        self.request_save(SaveKind::SocialStatus);
    }

    // -- saving ---------------------------------------------------------------

    pub fn request_save(&mut self, kind: SaveKind) {
        if self.pending_saves.insert(kind) {
            debug!(account = %self.id, ?kind, "save requested");
        }
    }

    /// Requests every save kind, so the stored row matches the live state.
    pub fn request_full_save(&mut self) {
        for kind in [SaveKind::Stats, SaveKind::Upgrades, SaveKind::SocialStatus] {
            self.request_save(kind);
        }
    }

    pub fn has_pending_saves(&self) -> bool {
        !self.pending_saves.is_empty()
    }

    /// Drains the requested saves as UPDATE queries, in [`SaveKind`] order.
    pub fn take_save_queries(&mut self) -> Vec<Query> {
        std::mem::take(&mut self.pending_saves)
            .into_iter()
            .map(|kind| self.save_query(kind))
            .collect()
    }

    /// The UPDATE writing the columns of `kind`.
    pub fn save_query(&self, kind: SaveKind) -> Query {
        let q = Query::update(ACCOUNTS_TABLE).filter("ID", self.id.0);
        match kind {
            SaveKind::Stats => q.set("Level", self.level).set("Exp", self.exp),
            SaveKind::Upgrades => self
                .stats
                .iter()
                .fold(q.set("Upgrade", self.upgrade), |q, (column, value)| {
                    q.set(column.as_str(), *value)
                }),
            SaveKind::SocialStatus => q
                .set("Relations", self.relations)
                .set("PrisonSeconds", self.prison_seconds)
                .set("DailyChairGolds", self.daily_chair_golds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickward_persist::{Row, Value};

    fn account_row() -> Row {
        Row::new()
            .with("ID", 7)
            .with("Username", "mira")
            .with("Level", 3)
            .with("Exp", 10)
            .with("Upgrade", 2)
            .with("PrisonSeconds", 0)
            .with("DailyChairGolds", 40)
            .with("Relations", 5)
            .with("WorldID", 1)
            .with("DailyStamp", 1_700_000_000i64)
            .with("WeekStamp", 1_699_900_000i64)
            .with("MonthStamp", 1_698_000_000i64)
            .with("Strength", 4)
            .with("Dexterity", 1)
            .with("Hardness", 0)
            .with("Vampirism", 0)
    }

    fn positioned(row: Row) -> ResultSet {
        let mut rs = ResultSet::from_rows(vec![row]);
        rs.next();
        rs
    }

    fn loaded() -> Account {
        let mut acc = Account::new(AccountId(7), "mira");
        acc.init(&positioned(account_row()), &AccountConfig::default(), &Aggregates::new())
            .unwrap();
        acc
    }

    #[test]
    fn test_init_populates_scalars_and_stats() {
        let acc = loaded();
        assert_eq!(acc.level, 3);
        assert_eq!(acc.exp, 10);
        assert_eq!(acc.daily_chair_golds, 40);
        assert_eq!(acc.periods.week_stamp, 1_699_900_000);
        assert_eq!(acc.stats.get("Strength"), Some(&4));
        assert_eq!(acc.last_login(), 0);
    }

    #[test]
    fn test_init_missing_column_leaves_account_untouched() {
        let mut row = account_row();
        row.set("Level", Value::Str("three".into()));
        let mut acc = Account::new(AccountId(7), "mira");
        let err = acc
            .init(&positioned(row), &AccountConfig::default(), &Aggregates::new())
            .unwrap_err();
        assert!(matches!(err, AccountError::Persist(_)));
        assert_eq!(acc.level, 1);
        assert!(acc.stats.is_empty());
    }

    #[test]
    fn test_init_resolves_relationships() {
        let mut agg = Aggregates::new();
        let guild = agg.create_guild("Anchors", AccountId(7)).unwrap();
        let group = agg.create_group(AccountId(7)).unwrap();
        let mut acc = Account::new(AccountId(7), "mira");
        acc.init(&positioned(account_row()), &AccountConfig::default(), &agg)
            .unwrap();
        assert_eq!(acc.guild(), Some(guild));
        assert_eq!(acc.group(), Some(group));
        assert_eq!(acc.house(), None);
    }

    #[test]
    fn test_add_experience_multi_level_up() {
        let mut acc = loaded();
        let need = experience_for_level(3) + experience_for_level(4) - acc.exp;
        let events = acc.add_experience(need, &AccountConfig::default());
        assert_eq!(
            events,
            vec![
                AccountEvent::LevelUp { level: 4 },
                AccountEvent::LevelUp { level: 5 },
            ]
        );
        assert_eq!(acc.exp, 0);
        assert_eq!(acc.upgrade, 4);
        let saves = acc.take_save_queries();
        assert_eq!(saves.len(), 2);
        assert!(!acc.has_pending_saves());
    }

    #[test]
    fn test_add_experience_routine_save_every_n_gains() {
        let config = AccountConfig {
            stats_save_every: 3,
            ..AccountConfig::default()
        };
        let mut acc = loaded();
        acc.add_experience(1, &config);
        acc.add_experience(1, &config);
        assert!(!acc.has_pending_saves());
        acc.add_experience(1, &config);
        assert!(acc.has_pending_saves());
    }

    #[test]
    fn test_add_experience_huge_value_saturates_at_max_level() {
        let config = AccountConfig {
            max_level: 10,
            ..AccountConfig::default()
        };
        let mut acc = loaded();
        let events = acc.add_experience(i64::MAX, &config);
        assert_eq!(acc.level, 10);
        assert_eq!(events.len(), 7);
        assert!(acc.exp > 0);

        acc.add_experience(i64::MAX, &config);
        assert_eq!(acc.exp, i64::MAX);
        assert_eq!(acc.level, 10);
    }

    #[test]
    fn test_increase_relations_huge_value_caps_without_overflow() {
        let config = AccountConfig::default();
        let mut acc = loaded();
        acc.increase_relations(i32::MAX, &config);
        assert_eq!(acc.relations, config.max_relations);

        acc.reset_relations();
        assert_eq!(acc.increase_relations(i32::MIN, &config).len(), 1);
        assert_eq!(acc.relations, 0);
    }

    #[test]
    fn test_increase_relations_caps_and_flags_wanted() {
        let config = AccountConfig::default();
        let mut acc = loaded();
        let events = acc.increase_relations(200, &config);
        assert_eq!(acc.relations, 100);
        assert_eq!(
            events,
            vec![
                AccountEvent::RelationsChanged { relations: 100 },
                AccountEvent::Wanted
            ]
        );
        assert!(acc.increase_relations(5, &config).is_empty());
        acc.reset_relations();
        assert_eq!(acc.relations, 0);
    }

    #[test]
    fn test_same_guild_requires_a_guild() {
        let a = loaded();
        let b = loaded();
        assert!(!a.same_guild(&b));
    }

    #[test]
    fn test_save_query_upgrades_writes_stat_columns() {
        let acc = loaded();
        let q = acc.save_query(SaveKind::Upgrades);
        assert_eq!(q.values.get("Upgrade"), Some(&Value::Int(2)));
        assert_eq!(q.values.get("Strength"), Some(&Value::Int(4)));
        assert_eq!(q.table, ACCOUNTS_TABLE);
    }
}
