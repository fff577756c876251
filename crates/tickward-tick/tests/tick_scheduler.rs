//! Integration tests for the tick driver, on paused Tokio time so
//! `sleep_until` resolves as soon as the runtime is idle.

use std::time::Duration;

use tickward_tick::{Clock, TickConfig, TickPolicy, TickScheduler};

const RATE: u32 = 50;

fn scheduler() -> TickScheduler {
    TickScheduler::new(TickConfig {
        initial_jitter_us: 0,
        ..TickConfig::with_rate(RATE)
    })
}

// =========================================================================
// TickConfig
// =========================================================================

#[test]
fn test_default_config_fifty_hz_twenty_ms() {
    let cfg = TickConfig::default();
    assert_eq!(cfg.tick_rate_hz, 50);
    assert_eq!(cfg.tick_duration(), Duration::from_millis(20));
    assert_eq!(cfg.policy, TickPolicy::Skip);
}

#[test]
fn test_validated_rate_clamped_both_ends() {
    assert_eq!(TickConfig::with_rate(0).validated().tick_rate_hz, 1);
    assert_eq!(
        TickConfig::with_rate(1_000).validated().tick_rate_hz,
        TickConfig::MAX_TICK_RATE_HZ
    );
}

#[test]
fn test_validated_warn_never_above_critical() {
    let cfg = TickConfig {
        budget_warn_threshold: 0.9,
        budget_critical_threshold: 0.6,
        ..TickConfig::default()
    }
    .validated();
    assert_eq!(cfg.budget_critical_threshold, 0.6);
    assert_eq!(cfg.budget_warn_threshold, 0.6);
}

// =========================================================================
// Ticking
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_first_tick_is_one_with_configured_rate() {
    let mut s = scheduler();
    assert_eq!(s.clock(), Clock::new(0, RATE));

    let info = s.wait_for_tick().await;
    assert_eq!(info.clock, Clock::new(1, RATE));
    assert_eq!(info.dt, Duration::from_millis(20));
    assert!(!info.overrun);
}

#[tokio::test(start_paused = true)]
async fn test_one_second_of_ticks_hits_every_secs_once() {
    let mut s = scheduler();
    let mut second_marks = 0;
    for _ in 0..RATE {
        let info = s.wait_for_tick().await;
        s.record_tick_end();
        if info.clock.every_secs(1) {
            second_marks += 1;
        }
    }
    assert_eq!(s.tick_count(), u64::from(RATE));
    assert_eq!(second_marks, 1);
    assert_eq!(s.metrics().total_ticks, u64::from(RATE));
}

#[tokio::test(start_paused = true)]
async fn test_pause_freezes_clock() {
    let mut s = scheduler();
    s.wait_for_tick().await;
    s.pause();

    let waited = tokio::time::timeout(Duration::from_secs(5), s.wait_for_tick()).await;
    assert!(waited.is_err());
    assert_eq!(s.clock().tick(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_resume_does_not_replay_paused_time() {
    let mut s = scheduler();
    s.wait_for_tick().await;
    s.pause();
    s.pause();
    tokio::time::advance(Duration::from_secs(10)).await;
    s.resume();
    s.resume();
    assert!(!s.is_paused());

    let info = s.wait_for_tick().await;
    assert_eq!(info.clock.tick(), 2);
    assert_eq!(info.ticks_skipped, 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_step_under_skip_policy_skips_ticks() {
    let mut s = scheduler();
    s.wait_for_tick().await;
    // A step that ate five budgets.
    tokio::time::advance(Duration::from_millis(100)).await;
    s.record_tick_end();

    let info = s.wait_for_tick().await;
    assert!(info.overrun);
    assert!(info.ticks_skipped >= 3);
    assert_eq!(info.clock.tick(), 2);
    assert_eq!(s.metrics().total_overruns, 1);
}

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_twice_counts_once() {
    let mut s = TickScheduler::new(TickConfig {
        metrics_enabled: false,
        ..TickConfig::with_rate(RATE)
    });
    s.record_tick_end();
    s.wait_for_tick().await;
    s.record_tick_end();
    s.record_tick_end();
    assert_eq!(s.metrics().total_ticks, 1);
    assert_eq!(s.metrics().max_tick_time, Duration::ZERO);
}

// =========================================================================
// select! loop
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_loop_serves_commands_between_ticks() {
    let mut s = scheduler();
    let (tx, mut rx) = tokio::sync::mpsc::channel::<u32>(8);

    tokio::spawn(async move {
        for n in 1..=3 {
            tokio::time::sleep(Duration::from_millis(45)).await;
            if tx.send(n).await.is_err() {
                return;
            }
        }
    });

    let mut received = Vec::new();
    let mut ticks = 0u64;
    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(n) => received.push((n, ticks)),
                None => break,
            },
            info = s.wait_for_tick() => {
                ticks = info.clock.tick();
                s.record_tick_end();
            }
        }
    }

    assert_eq!(received.iter().map(|(n, _)| *n).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(received.windows(2).all(|w| w[0].1 < w[1].1));
}
