//! Simulation clock and fixed-timestep tick driver for Tickward.
//!
//! - [`Clock`]: tick counter plus tick rate, the only notion of time the
//!   per-client machines have (`tick % interval`).
//! - [`TickScheduler`]: the async driver firing one engine step per tick,
//!   with an overrun policy, step budget warnings and pause/resume.
//!
//! The scheduler sits in the engine's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = commands.recv() => { /* connect, chat, ... */ }
//!         info = scheduler.wait_for_tick() => {
//!             engine.step(info.clock);
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```

mod clock;
mod config;
mod scheduler;

pub use clock::Clock;
pub use config::{TickConfig, TickPolicy};
pub use scheduler::{TickInfo, TickMetrics, TickScheduler};
