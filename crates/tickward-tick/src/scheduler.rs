use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

use crate::{Clock, TickConfig, TickPolicy};

/// One fired tick.
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Clock to step the world with. The first tick is 1.
    pub clock: Clock,
    pub dt: Duration,
    /// Fired more than a tenth of a step late.
    pub overrun: bool,
    /// Ticks dropped by the overrun policy; the counter does not include them.
    pub ticks_skipped: u64,
}

/// Step timing, updated by [`TickScheduler::record_tick_end`].
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Moving average of step time, weight 0.1 on the newest sample.
    pub avg_tick_time: Duration,
    pub max_tick_time: Duration,
    /// Last step time over the step budget.
    pub budget_utilization: f64,
}

impl TickMetrics {
    const AVG_WEIGHT: f64 = 0.1;

    fn sample(&mut self, elapsed: Duration) {
        self.max_tick_time = self.max_tick_time.max(elapsed);
        let avg = self.avg_tick_time.as_secs_f64();
        self.avg_tick_time = Duration::from_secs_f64(
            avg + (elapsed.as_secs_f64() - avg) * Self::AVG_WEIGHT,
        );
    }
}

/// When the following tick is due, and what the late one cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Plan {
    next: TokioInstant,
    overrun: bool,
    skipped: u64,
}

/// Decides the next deadline after a tick scheduled for `due` fired at `now`.
fn plan(policy: TickPolicy, due: TokioInstant, now: TokioInstant, step: Duration) -> Plan {
    let late_by = now.saturating_duration_since(due);
    let overrun = late_by > step / 10;
    let behind = (late_by.as_nanos() / step.as_nanos().max(1)) as u64;
    let on_grid = due + step;

    let (next, skipped) = match policy {
        _ if !overrun => (on_grid, 0),
        TickPolicy::Skip => (now + step, behind),
        TickPolicy::CatchUp { max_catchup } => {
            let cap = u64::from(max_catchup);
            if behind <= cap {
                (on_grid, 0)
            } else {
                (now + step, behind - cap)
            }
        }
        TickPolicy::Drop => (on_grid, 0),
    };
    Plan {
        next,
        overrun,
        skipped,
    }
}

/// Drives the engine at a fixed rate on Tokio time.
///
/// The scheduler only counts ticks. Every timed behavior in the engine is
/// derived from the [`Clock`] it hands out, so pausing it freezes all of
/// them at once.
pub struct TickScheduler {
    config: TickConfig,
    tick_duration: Duration,
    tick_count: u64,
    due: TokioInstant,
    step_start: Option<Instant>,
    paused: bool,
    metrics: TickMetrics,
}

impl TickScheduler {
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let tick_duration = config.tick_duration();
        let jitter = match config.initial_jitter_us {
            0 => Duration::ZERO,
            max => Duration::from_micros(rand::rng().random_range(0..max)),
        };
        debug!(
            rate_hz = config.tick_rate_hz,
            policy = ?config.policy,
            jitter_us = jitter.as_micros() as u64,
            "tick scheduler created"
        );
        Self {
            due: TokioInstant::now() + tick_duration + jitter,
            config,
            tick_duration,
            tick_count: 0,
            step_start: None,
            paused: false,
            metrics: TickMetrics::default(),
        }
    }

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Resolves when the next tick is due. Pends forever while paused, so it
    /// is meant to sit in a `tokio::select!` next to the command channel.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        if self.paused {
            std::future::pending::<()>().await;
        }
        time::sleep_until(self.due).await;

        let plan = plan(
            self.config.policy,
            self.due,
            TokioInstant::now(),
            self.tick_duration,
        );
        self.due = plan.next;
        self.tick_count += 1;
        self.step_start = Some(Instant::now());

        self.metrics.total_ticks += 1;
        if plan.overrun {
            self.metrics.total_overruns += 1;
            self.metrics.total_skipped += plan.skipped;
            warn!(
                tick = self.tick_count,
                skipped = plan.skipped,
                policy = ?self.config.policy,
                "tick fired late"
            );
        }
        trace!(tick = self.tick_count, "tick");

        TickInfo {
            clock: self.clock(),
            dt: self.tick_duration,
            overrun: plan.overrun,
            ticks_skipped: plan.skipped,
        }
    }

    /// Marks the end of the step started by the last `wait_for_tick`. Budget
    /// warnings and timing metrics come from here.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.step_start.take() else {
            return;
        };
        let elapsed = start.elapsed();
        let share = elapsed.as_secs_f64() / self.tick_duration.as_secs_f64();
        self.metrics.budget_utilization = share;

        if share >= self.config.budget_warn_threshold {
            let critical = share >= self.config.budget_critical_threshold;
            warn!(
                tick = self.tick_count,
                elapsed_us = elapsed.as_micros() as u64,
                budget_pct = (share * 100.0).round() as u64,
                critical,
                "slow step"
            );
        }
        if self.config.metrics_enabled {
            self.metrics.sample(elapsed);
        }
    }

    /// Stops the tick counter. Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, "ticks paused");
        }
    }

    /// Restarts one step from now; paused time is not replayed.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.due = TokioInstant::now() + self.tick_duration;
            debug!(tick = self.tick_count, "ticks resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn clock(&self) -> Clock {
        Clock::new(self.tick_count, self.config.tick_rate_hz)
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP: Duration = Duration::from_millis(20);

    fn late(steps: f64) -> (TokioInstant, TokioInstant) {
        let due = TokioInstant::now();
        (due, due + STEP.mul_f64(steps))
    }

    #[tokio::test(start_paused = true)]
    async fn test_plan_on_time_stays_on_grid() {
        let (due, now) = late(0.05);
        for policy in [
            TickPolicy::Skip,
            TickPolicy::Drop,
            TickPolicy::CatchUp { max_catchup: 2 },
        ] {
            let p = plan(policy, due, now, STEP);
            assert_eq!(p.next, due + STEP);
            assert!(!p.overrun);
            assert_eq!(p.skipped, 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_plan_skip_restarts_from_now() {
        let (due, now) = late(3.5);
        let p = plan(TickPolicy::Skip, due, now, STEP);
        assert_eq!(p.next, now + STEP);
        assert!(p.overrun);
        assert_eq!(p.skipped, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_plan_catch_up_within_cap_replays() {
        let (due, now) = late(2.0);
        let p = plan(TickPolicy::CatchUp { max_catchup: 3 }, due, now, STEP);
        assert_eq!(p.next, due + STEP);
        assert_eq!(p.skipped, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_plan_catch_up_beyond_cap_skips_rest() {
        let (due, now) = late(5.0);
        let p = plan(TickPolicy::CatchUp { max_catchup: 2 }, due, now, STEP);
        assert_eq!(p.next, now + STEP);
        assert_eq!(p.skipped, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_plan_drop_keeps_grid() {
        let (due, now) = late(4.0);
        let p = plan(TickPolicy::Drop, due, now, STEP);
        assert_eq!(p.next, due + STEP);
        assert!(p.overrun);
        assert_eq!(p.skipped, 0);
    }

    #[test]
    fn test_metrics_sample_tracks_max_and_average() {
        let mut m = TickMetrics::default();
        m.sample(Duration::from_millis(10));
        m.sample(Duration::from_millis(2));
        assert_eq!(m.max_tick_time, Duration::from_millis(10));
        assert!(m.avg_tick_time > Duration::ZERO);
        assert!(m.avg_tick_time < Duration::from_millis(10));
    }
}
