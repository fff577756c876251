//! Session configuration.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Limits and tuning for the per-client machines.
///
/// Sensible defaults are provided; override only what you need:
///
/// ```
/// use tickward_session::SessionConfig;
///
/// let config = SessionConfig {
///     max_clients: 16,
///     ..SessionConfig::default()
/// };
/// assert_eq!(config.cooldown_radius, 48.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Capacity of the slot table.
    pub max_clients: u16,

    /// How far (world units) a client may drift from where a timed action
    /// started before it is interrupted.
    pub cooldown_radius: f32,

    /// How often per second a running timed action refreshes its progress
    /// broadcast. The interval in ticks is `max(1, tick_rate / progress_hz)`.
    pub progress_hz: u32,

    /// Optional follow-ups kept per client; the oldest is evicted beyond this.
    pub max_optionals: usize,

    /// Re-send an unchanged broadcast after this many ticks. 0 disables it.
    pub broadcast_keepalive_ticks: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_clients: 64,
            cooldown_radius: 48.0,
            progress_hz: 25,
            max_optionals: 8,
            broadcast_keepalive_ticks: 0,
        }
    }
}

impl SessionConfig {
    /// Clamps out-of-range values.
    pub fn validated(mut self) -> Self {
        if self.max_clients == 0 {
            warn!("max_clients is 0, using 1");
            self.max_clients = 1;
        }
        if !(self.cooldown_radius.is_finite() && self.cooldown_radius >= 0.0) {
            warn!(radius = self.cooldown_radius, "invalid cooldown_radius, using 48");
            self.cooldown_radius = 48.0;
        }
        self.progress_hz = self.progress_hz.max(1);
        self.max_optionals = self.max_optionals.max(1);
        self
    }
}
