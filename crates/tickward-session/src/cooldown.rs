//! Timed actions ("cooldowns").
//!
//! A client starts an action such as "Gathering ore" that takes a few
//! seconds. While it runs the client must stay within
//! [`cooldown_radius`](crate::SessionConfig::cooldown_radius) of where it
//! started. It ends one of three ways:
//!
//! ```text
//!            start()                remaining == 0
//!   Idle ─────────────► Active ───────────────────► Completed ──► Idle
//!    ▲                    │                         (callback runs)
//!    │                    │ moved too far
//!    │                    ▼
//!    └──── next tick ── Interrupted                 (callback dropped)
//! ```
//!
//! `reset()` and a vanished entity go straight back to Idle without the
//! callback. The machine itself produces no output; [`Cooldown::advance`]
//! returns a [`CooldownStep`] and the engine emits effects and broadcasts.

use tickward_protocol::Position;
use tickward_tick::Clock;

use crate::SessionError;

/// Runs once when a timed action completes.
pub type CooldownCallback<C> = Box<dyn FnOnce(&mut C)>;

/// Coarse state for queries and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownState {
    Idle,
    Active,
    Interrupted,
}

/// What happened on one [`Cooldown::advance`].
pub enum CooldownStep<C> {
    /// Nothing running.
    Idle,
    /// Running; no progress refresh due this tick.
    Running,
    /// Running; refresh the progress broadcast with `text`.
    Progress { text: String },
    /// Finished. The caller must run `callback`; `at` is the start position.
    Completed {
        callback: CooldownCallback<C>,
        at: Position,
    },
    /// The client moved too far. Announce it; the machine settles next tick.
    Interrupted,
    /// An interruption from the previous tick was cleared.
    Settled,
    /// The entity disappeared; the action was dropped silently.
    Vanished,
}

impl<C> std::fmt::Debug for CooldownStep<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("Idle"),
            Self::Running => f.write_str("Running"),
            Self::Progress { text } => f.debug_struct("Progress").field("text", text).finish(),
            Self::Completed { at, .. } => f.debug_struct("Completed").field("at", at).finish(),
            Self::Interrupted => f.write_str("Interrupted"),
            Self::Settled => f.write_str("Settled"),
            Self::Vanished => f.write_str("Vanished"),
        }
    }
}

struct Running<C> {
    label: String,
    duration: u64,
    remaining: u64,
    start: Position,
    callback: CooldownCallback<C>,
    interrupted: bool,
}

/// One client's timed-action slot. At most one action at a time.
pub struct Cooldown<C> {
    running: Option<Running<C>>,
    radius: f32,
    progress_hz: u32,
}

impl<C> Default for Cooldown<C> {
    fn default() -> Self {
        Self::new(48.0, 25)
    }
}

impl<C> Cooldown<C> {
    /// Creates an idle machine with the given interruption radius and
    /// progress refresh rate.
    pub fn new(radius: f32, progress_hz: u32) -> Self {
        Self {
            running: None,
            radius,
            progress_hz: progress_hz.max(1),
        }
    }

    /// Starts an action lasting `duration_ticks`.
    ///
    /// # Errors
    /// [`SessionError::CooldownActive`] if an action is already running;
    /// the running action is left untouched.
    pub fn start<F>(
        &mut self,
        duration_ticks: u64,
        label: impl Into<String>,
        start: Position,
        callback: F,
    ) -> Result<(), SessionError>
    where
        F: FnOnce(&mut C) + 'static,
    {
        if let Some(running) = &self.running {
            return Err(SessionError::CooldownActive(running.label.clone()));
        }
        self.running = Some(Running {
            label: label.into(),
            duration: duration_ticks,
            remaining: duration_ticks,
            start,
            callback: Box::new(callback),
            interrupted: false,
        });
        Ok(())
    }

    /// Drops any running action without invoking its callback.
    pub fn reset(&mut self) {
        self.running = None;
    }

    pub fn state(&self) -> CooldownState {
        match &self.running {
            None => CooldownState::Idle,
            Some(r) if r.interrupted => CooldownState::Interrupted,
            Some(_) => CooldownState::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.running.is_some()
    }

    pub fn label(&self) -> Option<&str> {
        self.running.as_ref().map(|r| r.label.as_str())
    }

    pub fn remaining(&self) -> Option<u64> {
        self.running.as_ref().map(|r| r.remaining)
    }

    /// Advances one tick. `position` is the entity's current position, or
    /// `None` if it no longer exists (died, left the world).
    pub fn advance(&mut self, clock: Clock, position: Option<Position>) -> CooldownStep<C> {
        let Some(running) = self.running.as_mut() else {
            return CooldownStep::Idle;
        };

        let Some(position) = position else {
            self.running = None;
            return CooldownStep::Vanished;
        };

        if running.interrupted {
            self.running = None;
            return CooldownStep::Settled;
        }

        // Checked before completion: leaving on the last tick still interrupts.
        if position.distance(running.start) > self.radius {
            running.interrupted = true;
            return CooldownStep::Interrupted;
        }

        if running.remaining == 0 {
            return match self.running.take() {
                Some(done) => CooldownStep::Completed {
                    callback: done.callback,
                    at: done.start,
                },
                None => CooldownStep::Idle,
            };
        }

        let interval = (clock.rate() / self.progress_hz).max(1) as u64;
        let step = if clock.every(interval) {
            CooldownStep::Progress {
                text: progress_text(clock, running),
            }
        } else {
            CooldownStep::Running
        };
        running.remaining -= 1;
        step
    }
}

/// `"{label}\n< 2.50s > ▰▰▰▰▰▱▱▱▱▱ - Action"`.
fn progress_text<C>(clock: Clock, running: &Running<C>) -> String {
    const CELLS: u64 = 10;
    let (secs, hundredths) = clock.split_ticks(running.remaining);
    let filled = if running.duration == 0 {
        0
    } else {
        (running.remaining * CELLS).div_ceil(running.duration)
    };
    let bar: String = (0..CELLS)
        .map(|i| if i < filled { '▰' } else { '▱' })
        .collect();
    format!(
        "{}\n< {secs}.{hundredths:02}s > {bar} - Action",
        running.label
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test context: counts callback invocations.
    #[derive(Default)]
    struct Hits(u32);

    const RATE: u32 = 50;
    const ORIGIN: Position = Position::new(0.0, 0.0);

    fn clock(tick: u64) -> Clock {
        Clock::new(tick, RATE)
    }

    fn started(duration: u64) -> Cooldown<Hits> {
        let mut cd = Cooldown::new(48.0, 25);
        cd.start(duration, "Mining", ORIGIN, |hits: &mut Hits| hits.0 += 1)
            .unwrap();
        cd
    }

    /// Advances in place until the machine goes idle; runs the callback.
    fn run_to_end(cd: &mut Cooldown<Hits>, hits: &mut Hits, pos: Position) -> Vec<&'static str> {
        let mut seen = Vec::new();
        for tick in 0..1_000 {
            let step = cd.advance(clock(tick), Some(pos));
            seen.push(match step {
                CooldownStep::Idle => break,
                CooldownStep::Running | CooldownStep::Progress { .. } => "tick",
                CooldownStep::Completed { callback, .. } => {
                    callback(&mut *hits);
                    "completed"
                }
                CooldownStep::Interrupted => "interrupted",
                CooldownStep::Settled => "settled",
                CooldownStep::Vanished => "vanished",
            });
        }
        seen
    }

    // =====================================================================
    // start()
    // =====================================================================

    #[test]
    fn test_start_while_active_is_refused() {
        let mut cd = started(10);
        let err = cd
            .start(5, "Fishing", ORIGIN, |_: &mut Hits| {})
            .unwrap_err();
        assert_eq!(err, SessionError::CooldownActive("Mining".into()));
        assert_eq!(cd.label(), Some("Mining"));
        assert_eq!(cd.remaining(), Some(10));
    }

    #[test]
    fn test_start_then_reset_never_runs_callback() {
        let mut cd = started(3);
        let mut hits = Hits::default();
        cd.reset();
        assert_eq!(cd.state(), CooldownState::Idle);
        assert_eq!(run_to_end(&mut cd, &mut hits, ORIGIN), Vec::<&str>::new());
        assert_eq!(hits.0, 0);
    }

    // =====================================================================
    // advance()
    // =====================================================================

    #[test]
    fn test_advance_completes_once_after_duration() {
        let mut cd = started(3);
        let mut hits = Hits::default();
        let seen = run_to_end(&mut cd, &mut hits, ORIGIN);
        assert_eq!(seen, vec!["tick", "tick", "tick", "completed"]);
        assert_eq!(hits.0, 1);
        assert_eq!(cd.state(), CooldownState::Idle);
    }

    #[test]
    fn test_advance_zero_duration_completes_on_first_tick() {
        let mut cd = started(0);
        let mut hits = Hits::default();
        assert_eq!(run_to_end(&mut cd, &mut hits, ORIGIN), vec!["completed"]);
        assert_eq!(hits.0, 1);
    }

    #[test]
    fn test_advance_moving_away_interrupts_before_callback() {
        let mut cd = started(5);
        let mut hits = Hits::default();
        let far = Position::new(48.5, 0.0);
        assert_eq!(run_to_end(&mut cd, &mut hits, far), vec!["interrupted", "settled"]);
        assert_eq!(hits.0, 0);
    }

    #[test]
    fn test_advance_moving_away_on_final_tick_drops_callback() {
        let mut cd = started(1);
        let mut hits = Hits::default();
        assert!(matches!(
            cd.advance(clock(1), Some(ORIGIN)),
            CooldownStep::Running | CooldownStep::Progress { .. }
        ));
        assert_eq!(cd.remaining(), Some(0));

        let far = Position::new(100.0, 0.0);
        assert_eq!(run_to_end(&mut cd, &mut hits, far), vec!["interrupted", "settled"]);
        assert_eq!(hits.0, 0);
    }

    #[test]
    fn test_advance_within_radius_keeps_running() {
        let mut cd = started(2);
        let mut hits = Hits::default();
        let near = Position::new(48.0, 0.0);
        assert_eq!(
            run_to_end(&mut cd, &mut hits, near),
            vec!["tick", "tick", "completed"]
        );
        assert_eq!(hits.0, 1);
    }

    #[test]
    fn test_advance_interrupted_state_visible_until_next_tick() {
        let mut cd = started(5);
        cd.advance(clock(0), Some(Position::new(100.0, 0.0)));
        assert_eq!(cd.state(), CooldownState::Interrupted);
        assert!(matches!(cd.advance(clock(1), Some(ORIGIN)), CooldownStep::Settled));
        assert_eq!(cd.state(), CooldownState::Idle);
    }

    #[test]
    fn test_advance_vanished_entity_drops_silently() {
        let mut cd = started(5);
        assert!(matches!(cd.advance(clock(0), None), CooldownStep::Vanished));
        assert!(!cd.is_active());
        assert!(matches!(cd.advance(clock(1), None), CooldownStep::Idle));
    }

    // =====================================================================
    // progress
    // =====================================================================

    #[test]
    fn test_progress_every_two_ticks_at_fifty_hz() {
        let mut cd = started(10);
        let progress: Vec<u64> = (0..6)
            .filter(|&t| matches!(cd.advance(clock(t), Some(ORIGIN)), CooldownStep::Progress { .. }))
            .collect();
        assert_eq!(progress, vec![0, 2, 4]);
    }

    #[test]
    fn test_progress_text_format() {
        let mut cd = started(125);
        let CooldownStep::Progress { text } = cd.advance(clock(0), Some(ORIGIN)) else {
            panic!("expected progress on tick 0");
        };
        assert_eq!(text, "Mining\n< 2.50s > ▰▰▰▰▰▰▰▰▰▰ - Action");
    }

    #[test]
    fn test_progress_bar_shrinks_with_remaining() {
        let mut cd = started(100);
        for t in 0..50 {
            cd.advance(clock(t + 1), Some(ORIGIN));
        }
        let CooldownStep::Progress { text } = cd.advance(clock(100), Some(ORIGIN)) else {
            panic!("expected progress on tick 100");
        };
        assert_eq!(text, "Mining\n< 1.00s > ▰▰▰▰▰▱▱▱▱▱ - Action");
    }
}
