//! Engine configuration.

use serde::{Deserialize, Serialize};
use tickward_account::AccountConfig;
use tickward_persist::GatewayConfig;
use tickward_session::SessionConfig;
use tickward_tick::TickConfig;

use crate::TickwardError;

/// Everything the engine needs to start, one section per layer.
///
/// Every section falls back to its defaults, so a partial JSON document
/// is enough:
///
/// ```
/// use tickward::EngineConfig;
///
/// let config = EngineConfig::from_json_str(r#"{ "tick": { "tick_rate_hz": 25 } }"#).unwrap();
/// assert_eq!(config.tick.tick_rate_hz, 25);
/// assert_eq!(config.session.max_clients, 64);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tick: TickConfig,
    pub session: SessionConfig,
    pub gateway: GatewayConfig,
    pub account: AccountConfig,
    /// Shown by `/pos`.
    pub world_name: String,
    /// Bound on queued engine commands before senders wait.
    pub command_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick: TickConfig::default(),
            session: SessionConfig::default(),
            gateway: GatewayConfig::default(),
            account: AccountConfig::default(),
            world_name: "world".into(),
            command_buffer: 256,
        }
    }
}

impl EngineConfig {
    /// Parses a JSON document and clamps out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self, TickwardError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    /// Clamps every section.
    pub fn validated(mut self) -> Self {
        self.tick = self.tick.validated();
        self.session = self.session.validated();
        self.gateway = self.gateway.validated();
        if self.world_name.is_empty() {
            self.world_name = "world".into();
        }
        self.command_buffer = self.command_buffer.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_str_missing_sections_use_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config.tick.tick_rate_hz, 50);
        assert_eq!(config.gateway.workers, 4);
        assert_eq!(config.account.max_relations, 100);
        assert_eq!(config.world_name, "world");
    }

    #[test]
    fn test_from_json_str_clamps_values() {
        let config = EngineConfig::from_json_str(
            r#"{ "tick": { "tick_rate_hz": 0 }, "gateway": { "workers": 0 }, "command_buffer": 0 }"#,
        )
        .unwrap();
        assert_eq!(config.tick.tick_rate_hz, 1);
        assert_eq!(config.gateway.workers, 1);
        assert_eq!(config.command_buffer, 1);
    }

    #[test]
    fn test_from_json_str_malformed_errors() {
        let err = EngineConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, TickwardError::Config(_)));
    }
}
