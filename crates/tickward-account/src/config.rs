//! Account configuration.

use serde::{Deserialize, Serialize};

/// Tuning for account loading and progression.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Attribute columns read into [`Account::stats`](crate::Account::stats)
    /// on load and written back with upgrade saves.
    pub stat_columns: Vec<String>,

    /// Upper bound of the social relations counter.
    pub max_relations: i32,

    /// Level-ups stop here; further experience is kept but not spent.
    pub max_level: i32,

    /// Experience gains between routine stats saves.
    pub stats_save_every: u32,

    /// Seconds an offline account stays resident before it is dropped.
    /// `0` keeps offline accounts for the life of the process.
    pub evict_after_secs: u64,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            stat_columns: ["Strength", "Dexterity", "Hardness", "Vampirism"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_relations: 100,
            max_level: 500,
            stats_save_every: 5,
            evict_after_secs: 600,
        }
    }
}
