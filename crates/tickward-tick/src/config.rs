use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// What the driver does when a tick fires later than scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TickPolicy {
    /// Forget the missed ticks; the next one is a full step from now.
    #[default]
    Skip,
    /// Fire missed ticks back to back, but never more than `max_catchup`
    /// behind. Beyond that the rest are skipped.
    CatchUp { max_catchup: u32 },
    /// Stay on the fixed grid; late ticks are neither replayed nor skipped.
    Drop,
}

/// Tick driver settings. Part of the engine config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Simulation steps per second, clamped to `1..=MAX_TICK_RATE_HZ`.
    /// Every countdown in the engine is expressed in these ticks.
    pub tick_rate_hz: u32,
    pub policy: TickPolicy,
    /// Share of the step budget (0.0 to 1.0) that triggers a warning.
    pub budget_warn_threshold: f64,
    /// Share of the step budget that counts as a blown step.
    pub budget_critical_threshold: f64,
    /// Keep average and worst step times in [`TickMetrics`](crate::TickMetrics).
    pub metrics_enabled: bool,
    /// Upper bound (µs) of a random delay before the first tick.
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: Self::DEFAULT_TICK_RATE_HZ,
            policy: TickPolicy::Skip,
            budget_warn_threshold: 0.8,
            budget_critical_threshold: 1.0,
            metrics_enabled: true,
            initial_jitter_us: 0,
        }
    }
}

impl TickConfig {
    /// 50 Hz: progress bars refresh at 25 Hz, one tick is 20 ms.
    pub const DEFAULT_TICK_RATE_HZ: u32 = 50;
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Self::default()
        }
    }

    /// Returns the config with every field in range. The simulation always
    /// steps, so a rate of 0 becomes 1 rather than "event driven".
    pub fn validated(mut self) -> Self {
        let clamped = self.tick_rate_hz.clamp(1, Self::MAX_TICK_RATE_HZ);
        if clamped != self.tick_rate_hz {
            warn!(
                requested = self.tick_rate_hz,
                using = clamped,
                "tick_rate_hz out of range"
            );
            self.tick_rate_hz = clamped;
        }
        self.budget_critical_threshold = self.budget_critical_threshold.clamp(0.0, 1.0);
        self.budget_warn_threshold = self
            .budget_warn_threshold
            .clamp(0.0, self.budget_critical_threshold);
        self
    }

    /// Length of one step, `1 / tick_rate_hz`.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validated_in_range_unchanged() {
        let cfg = TickConfig::with_rate(25).validated();
        assert_eq!(cfg.tick_rate_hz, 25);
        assert_eq!(cfg.budget_warn_threshold, 0.8);
    }

    #[test]
    fn test_policy_deserializes_from_json() {
        let policy: TickPolicy = serde_json::from_str(r#"{"CatchUp":{"max_catchup":4}}"#).unwrap();
        assert_eq!(policy, TickPolicy::CatchUp { max_catchup: 4 });
    }
}
