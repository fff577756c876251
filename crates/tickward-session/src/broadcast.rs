//! Broadcast de-duplication.
//!
//! Many systems want the center-screen line at once: a cooldown progress
//! bar, a zone warning, a quest hint. Within a tick the highest priority
//! wins; across ticks an unchanged line is not re-sent unless forced or the
//! keep-alive period lapsed.
//!
//! A push with a lifespan becomes the *timed* message and keeps competing
//! every tick until its lifespan runs out. A push without one only
//! competes on the next tick.

use tickward_protocol::BroadcastPriority;
use tickward_tick::Clock;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Line {
    priority: BroadcastPriority,
    text: String,
}

#[derive(Debug, Clone)]
struct Timed {
    line: Line,
    remaining: u64,
}

#[derive(Debug, Clone)]
struct Sent {
    text: String,
    at_tick: u64,
}

/// One client's broadcast line.
#[derive(Debug, Clone, Default)]
pub struct BroadcastState {
    next: Option<Line>,
    timed: Option<Timed>,
    sent: Option<Sent>,
    forced: bool,
    keepalive_ticks: u64,
}

impl BroadcastState {
    /// `keepalive_ticks` of 0 never re-sends an unchanged line.
    pub fn new(keepalive_ticks: u64) -> Self {
        Self {
            keepalive_ticks,
            ..Self::default()
        }
    }

    /// Offers a line. `lifespan_ticks == 0` means "next tick only".
    ///
    /// A lower priority push never replaces a higher one already queued;
    /// an equal one does.
    pub fn push(&mut self, priority: BroadcastPriority, lifespan_ticks: u64, text: impl Into<String>) {
        let line = Line {
            priority,
            text: text.into(),
        };
        if lifespan_ticks == 0 {
            if self.next.as_ref().is_none_or(|n| priority >= n.priority) {
                self.next = Some(line);
            }
        } else if self.timed.as_ref().is_none_or(|t| priority >= t.line.priority) {
            self.timed = Some(Timed {
                line,
                remaining: lifespan_ticks,
            });
        }
    }

    /// Sends the next winning line even if it is unchanged.
    pub fn force(&mut self) {
        self.forced = true;
    }

    /// The last text actually sent.
    pub fn last_sent(&self) -> Option<&str> {
        self.sent.as_ref().map(|s| s.text.as_str())
    }

    /// Picks this tick's line. Returns the text to send, if any.
    pub fn tick(&mut self, clock: Clock) -> Option<String> {
        let mut line = self.next.take();
        let mut expired = false;

        if self.timed.as_ref().is_some_and(|t| t.remaining == 0) {
            self.timed = None;
            expired = true;
        }
        if let Some(timed) = &mut self.timed {
            if line.as_ref().is_none_or(|n| timed.line.priority > n.priority) {
                line = Some(timed.line.clone());
            }
            timed.remaining -= 1;
        }

        let line = match line {
            Some(line) => line,
            // A timed line that just lapsed is cleared from the screen.
            None if expired => Line {
                priority: BroadcastPriority::Lower,
                text: String::new(),
            },
            None => return None,
        };

        let changed = match &self.sent {
            Some(sent) => sent.text != line.text,
            None => !line.text.is_empty(),
        };
        let stale = self.keepalive_ticks > 0
            && self
                .sent
                .as_ref()
                .is_some_and(|s| clock.tick().saturating_sub(s.at_tick) >= self.keepalive_ticks);

        if !(changed || self.forced || stale) {
            return None;
        }
        self.forced = false;
        self.sent = Some(Sent {
            text: line.text.clone(),
            at_tick: clock.tick(),
        });
        Some(line.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BroadcastPriority::*;

    fn clock(tick: u64) -> Clock {
        Clock::new(tick, 50)
    }

    #[test]
    fn test_tick_nothing_pushed_sends_nothing() {
        let mut b = BroadcastState::default();
        assert_eq!(b.tick(clock(1)), None);
    }

    #[test]
    fn test_same_text_twice_sends_once() {
        let mut b = BroadcastState::default();
        b.push(Basic, 0, "Welcome");
        b.push(Basic, 0, "Welcome");
        assert_eq!(b.tick(clock(1)).as_deref(), Some("Welcome"));
        b.push(Basic, 0, "Welcome");
        assert_eq!(b.tick(clock(2)), None);
    }

    #[test]
    fn test_force_resends_unchanged_text() {
        let mut b = BroadcastState::default();
        b.push(Basic, 0, "Welcome");
        b.tick(clock(1));
        b.push(Basic, 0, "Welcome");
        b.force();
        assert_eq!(b.tick(clock(2)).as_deref(), Some("Welcome"));
    }

    #[test]
    fn test_higher_priority_preempts_within_tick() {
        let mut b = BroadcastState::default();
        b.push(Warning, 0, "Danger");
        b.push(Basic, 0, "Hint");
        assert_eq!(b.tick(clock(1)).as_deref(), Some("Danger"));
    }

    #[test]
    fn test_timed_line_outranks_lower_next() {
        let mut b = BroadcastState::default();
        b.push(VeryImportant, 3, "< Interrupted >");
        b.push(Basic, 0, "Hint");
        assert_eq!(b.tick(clock(1)).as_deref(), Some("< Interrupted >"));
        b.push(Basic, 0, "Hint");
        assert_eq!(b.tick(clock(2)), None);
    }

    #[test]
    fn test_timed_line_expires_and_clears() {
        let mut b = BroadcastState::default();
        b.push(Information, 2, "Zone: Harbor");
        assert_eq!(b.tick(clock(1)).as_deref(), Some("Zone: Harbor"));
        assert_eq!(b.tick(clock(2)), None);
        assert_eq!(b.tick(clock(3)).as_deref(), Some(""));
        assert_eq!(b.tick(clock(4)), None);
        assert_eq!(b.last_sent(), Some(""));
    }

    #[test]
    fn test_lower_timed_does_not_replace_higher_timed() {
        let mut b = BroadcastState::default();
        b.push(Warning, 10, "Danger");
        b.push(Basic, 10, "Hint");
        assert_eq!(b.tick(clock(1)).as_deref(), Some("Danger"));
    }

    #[test]
    fn test_keepalive_resends_after_period() {
        let mut b = BroadcastState::new(5);
        b.push(Basic, 100, "Quest: find the key");
        assert!(b.tick(clock(10)).is_some());
        for t in 11..15 {
            assert_eq!(b.tick(clock(t)), None);
        }
        assert_eq!(b.tick(clock(15)).as_deref(), Some("Quest: find the key"));
    }
}
