//! Paged menus ("votes") and optional follow-up prompts.
//!
//! A page is not stored anywhere: it is produced on demand by the
//! [`Producer`]s registered for it, called in registration order so every
//! option keeps a stable position. The per-client [`MenuState`] only
//! remembers which page is showing and the rendered lines.
//!
//! Rendering needs read access to the whole world while the menu state
//! lives inside that world, so rendering and storing are split: the caller
//! renders with [`MenuProducers::render`], then hands the lines to
//! [`MenuState::replace_options`].

use std::collections::{HashMap, VecDeque};

use tickward_protocol::{ClientSlot, MenuAction, MenuItem, MenuPage, OptionCode};
use tickward_tick::Clock;
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// MenuBuilder
// ---------------------------------------------------------------------------

/// Render sink handed to producers.
#[derive(Debug, Default)]
pub struct MenuBuilder {
    items: Vec<MenuItem>,
}

impl MenuBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(&mut self, text: impl Into<String>) -> &mut Self {
        self.items.push(MenuItem::Header(text.into()));
        self
    }

    pub fn item(&mut self, label: impl Into<String>, action: MenuAction) -> &mut Self {
        self.items.push(MenuItem::Item {
            label: label.into(),
            action,
        });
        self
    }

    /// Item that runs menu command `name` with two payload values.
    pub fn command(
        &mut self,
        label: impl Into<String>,
        name: impl Into<String>,
        value1: i64,
        value2: i64,
    ) -> &mut Self {
        self.item(
            label,
            MenuAction::Command {
                name: name.into(),
                value1,
                value2,
            },
        )
    }

    pub fn divider(&mut self) -> &mut Self {
        self.items.push(MenuItem::Divider);
        self
    }

    /// The standard "Back" line.
    pub fn back_item(&mut self) -> &mut Self {
        self.item("Back", MenuAction::Back)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Closes the page with a terminator.
    pub fn finish(mut self) -> Vec<MenuItem> {
        self.items.push(MenuItem::Terminator);
        self.items
    }
}

// ---------------------------------------------------------------------------
// MenuProducers
// ---------------------------------------------------------------------------

/// Appends one feature's lines for a page.
pub type Producer<C> = Box<dyn Fn(&C, ClientSlot, &mut MenuBuilder)>;

/// Registered producers per page.
pub struct MenuProducers<C> {
    pages: HashMap<MenuPage, Vec<Producer<C>>>,
}

impl<C> Default for MenuProducers<C> {
    fn default() -> Self {
        Self {
            pages: HashMap::new(),
        }
    }
}

impl<C> MenuProducers<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a producer to `page`, after those already registered.
    pub fn register<F>(&mut self, page: MenuPage, producer: F)
    where
        F: Fn(&C, ClientSlot, &mut MenuBuilder) + 'static,
    {
        self.pages.entry(page).or_default().push(Box::new(producer));
    }

    pub fn producer_count(&self, page: MenuPage) -> usize {
        self.pages.get(&page).map_or(0, Vec::len)
    }

    /// Renders `page` for `slot`. Unknown pages render as just a terminator.
    pub fn render(&self, ctx: &C, slot: ClientSlot, page: MenuPage) -> Vec<MenuItem> {
        let mut builder = MenuBuilder::new();
        for producer in self.pages.get(&page).into_iter().flatten() {
            producer(ctx, slot, &mut builder);
        }
        trace!(%slot, %page, lines = builder.len(), "menu rendered");
        builder.finish()
    }
}

// ---------------------------------------------------------------------------
// Optional follow-ups
// ---------------------------------------------------------------------------

/// A queued "accept this?" offer.
pub struct FollowUp<C> {
    code: OptionCode,
    expires_at: u64,
    text: String,
    action: Box<dyn FnOnce(&mut C)>,
}

impl<C> FollowUp<C> {
    pub fn code(&self) -> OptionCode {
        self.code
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Tick at which the offer lapses.
    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    /// Consumes the offer, yielding what accepting it does.
    pub fn into_action(self) -> Box<dyn FnOnce(&mut C)> {
        self.action
    }
}

// ---------------------------------------------------------------------------
// MenuState
// ---------------------------------------------------------------------------

/// One client's menu position, rendered lines and pending follow-ups.
pub struct MenuState<C> {
    current: MenuPage,
    previous: MenuPage,
    options: Vec<MenuItem>,
    follow_ups: VecDeque<FollowUp<C>>,
    max_follow_ups: usize,
}

impl<C> Default for MenuState<C> {
    fn default() -> Self {
        Self::new(8)
    }
}

impl<C> MenuState<C> {
    /// Starts on [`MenuPage::MAIN`] with nothing rendered.
    pub fn new(max_follow_ups: usize) -> Self {
        Self {
            current: MenuPage::MAIN,
            previous: MenuPage::MAIN,
            options: Vec::new(),
            follow_ups: VecDeque::new(),
            max_follow_ups: max_follow_ups.max(1),
        }
    }

    pub fn current(&self) -> MenuPage {
        self.current
    }

    pub fn previous(&self) -> MenuPage {
        self.previous
    }

    /// Moves to `page`. The caller must rebuild the options afterwards.
    pub fn set_page(&mut self, page: MenuPage) {
        self.previous = self.current;
        self.current = page;
    }

    /// Moves to the previous page and returns it.
    pub fn back(&mut self) -> MenuPage {
        let target = self.previous;
        self.set_page(target);
        target
    }

    /// A strong update of `page` applies only while it is showing.
    pub fn needs_strong_update(&self, page: MenuPage) -> bool {
        self.current == page
    }

    /// Stores freshly rendered lines. Returns `true` if they differ from
    /// what was showing.
    pub fn replace_options(&mut self, options: Vec<MenuItem>) -> bool {
        if self.options == options {
            return false;
        }
        self.options = options;
        true
    }

    pub fn options(&self) -> &[MenuItem] {
        &self.options
    }

    /// The action of the line at `index`, if it is selectable.
    pub fn action_at(&self, index: usize) -> Option<&MenuAction> {
        match self.options.get(index)? {
            MenuItem::Item { action, .. } => Some(action),
            _ => None,
        }
    }

    /// Queues a follow-up valid for `ttl_secs`. If the queue is full the
    /// oldest offer is evicted and returned.
    pub fn push_optional<F>(
        &mut self,
        clock: Clock,
        code: OptionCode,
        ttl_secs: u64,
        text: impl Into<String>,
        action: F,
    ) -> Option<FollowUp<C>>
    where
        F: FnOnce(&mut C) + 'static,
    {
        let evicted = if self.follow_ups.len() >= self.max_follow_ups {
            self.follow_ups.pop_front()
        } else {
            None
        };
        if let Some(old) = &evicted {
            debug!(code = %old.code, "follow-up queue full, evicting oldest");
        }
        self.follow_ups.push_back(FollowUp {
            code,
            expires_at: clock.deadline(clock.secs_to_ticks(ttl_secs)),
            text: text.into(),
            action: Box::new(action),
        });
        evicted
    }

    /// Drops lapsed offers, then removes and returns the oldest one
    /// matching `code`.
    pub fn resolve(&mut self, clock: Clock, code: OptionCode) -> Option<FollowUp<C>> {
        self.follow_ups.retain(|f| !clock.reached(f.expires_at));
        let index = self.follow_ups.iter().position(|f| f.code == code)?;
        self.follow_ups.remove(index)
    }

    pub fn pending_follow_ups(&self) -> usize {
        self.follow_ups.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shop {
        items: Vec<&'static str>,
    }

    fn producers() -> MenuProducers<Shop> {
        let mut p = MenuProducers::new();
        p.register(MenuPage(1), |_: &Shop, _, b: &mut MenuBuilder| {
            b.header("Shop");
        });
        p.register(MenuPage(1), |shop: &Shop, _, b: &mut MenuBuilder| {
            for (i, item) in shop.items.iter().enumerate() {
                b.command(*item, "BUY", i as i64, 0);
            }
            b.divider().back_item();
        });
        p
    }

    const SLOT: ClientSlot = ClientSlot(0);

    // =====================================================================
    // Rendering
    // =====================================================================

    #[test]
    fn test_render_runs_producers_in_registration_order() {
        let shop = Shop {
            items: vec!["Axe", "Rod"],
        };
        let lines = producers().render(&shop, SLOT, MenuPage(1));
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], MenuItem::Header("Shop".into()));
        assert!(matches!(&lines[1], MenuItem::Item { label, .. } if label == "Axe"));
        assert_eq!(lines[3], MenuItem::Divider);
        assert_eq!(lines[5], MenuItem::Terminator);
    }

    #[test]
    fn test_render_unknown_page_is_terminator_only() {
        let shop = Shop { items: vec![] };
        assert_eq!(
            producers().render(&shop, SLOT, MenuPage(99)),
            vec![MenuItem::Terminator]
        );
    }

    #[test]
    fn test_rebuild_twice_is_identical() {
        let shop = Shop {
            items: vec!["Axe"],
        };
        let p = producers();
        let mut state: MenuState<Shop> = MenuState::new(4);
        state.set_page(MenuPage(1));
        assert!(state.replace_options(p.render(&shop, SLOT, state.current())));
        let first = state.options().to_vec();
        assert!(!state.replace_options(p.render(&shop, SLOT, state.current())));
        assert_eq!(state.options(), first.as_slice());
    }

    // =====================================================================
    // Navigation
    // =====================================================================

    #[test]
    fn test_set_page_tracks_previous() {
        let mut state: MenuState<Shop> = MenuState::default();
        state.set_page(MenuPage(3));
        assert_eq!(state.previous(), MenuPage::MAIN);
        assert_eq!(state.current(), MenuPage(3));
        assert_eq!(state.back(), MenuPage::MAIN);
        assert_eq!(state.previous(), MenuPage(3));
    }

    #[test]
    fn test_needs_strong_update_only_on_current_page() {
        let mut state: MenuState<Shop> = MenuState::default();
        state.set_page(MenuPage(2));
        assert!(state.needs_strong_update(MenuPage(2)));
        assert!(!state.needs_strong_update(MenuPage::MAIN));
    }

    #[test]
    fn test_action_at_skips_non_selectable() {
        let shop = Shop {
            items: vec!["Axe"],
        };
        let mut state: MenuState<Shop> = MenuState::default();
        state.replace_options(producers().render(&shop, SLOT, MenuPage(1)));
        assert_eq!(state.action_at(0), None);
        assert_eq!(
            state.action_at(1),
            Some(&MenuAction::Command {
                name: "BUY".into(),
                value1: 0,
                value2: 0
            })
        );
        assert_eq!(state.action_at(3), Some(&MenuAction::Back));
        assert_eq!(state.action_at(50), None);
    }

    // =====================================================================
    // Follow-ups
    // =====================================================================

    fn clock(tick: u64) -> Clock {
        Clock::new(tick, 50)
    }

    #[test]
    fn test_resolve_runs_matching_follow_up() {
        let mut shop = Shop { items: vec![] };
        let mut state: MenuState<Shop> = MenuState::default();
        state.push_optional(clock(0), OptionCode(1), 10, "Accept?", |s: &mut Shop| {
            s.items.push("gift")
        });

        let follow_up = state.resolve(clock(5), OptionCode(1)).unwrap();
        assert_eq!(follow_up.text(), "Accept?");
        (follow_up.into_action())(&mut shop);
        assert_eq!(shop.items, vec!["gift"]);
        assert_eq!(state.pending_follow_ups(), 0);
    }

    #[test]
    fn test_resolve_unknown_code_is_noop() {
        let mut state: MenuState<Shop> = MenuState::default();
        state.push_optional(clock(0), OptionCode(1), 10, "a", |_: &mut Shop| {});
        assert!(state.resolve(clock(1), OptionCode(2)).is_none());
        assert_eq!(state.pending_follow_ups(), 1);
    }

    #[test]
    fn test_resolve_discards_expired() {
        let mut state: MenuState<Shop> = MenuState::default();
        state.push_optional(clock(0), OptionCode(1), 1, "short", |_: &mut Shop| {});
        state.push_optional(clock(0), OptionCode(2), 60, "long", |_: &mut Shop| {});
        // 1s at 50 Hz lapses at tick 50.
        assert!(state.resolve(clock(50), OptionCode(1)).is_none());
        assert_eq!(state.pending_follow_ups(), 1);
    }

    #[test]
    fn test_resolve_takes_oldest_of_duplicate_codes() {
        let mut state: MenuState<Shop> = MenuState::default();
        state.push_optional(clock(0), OptionCode(7), 10, "first", |_: &mut Shop| {});
        state.push_optional(clock(0), OptionCode(7), 10, "second", |_: &mut Shop| {});
        let got = state.resolve(clock(1), OptionCode(7)).unwrap();
        assert_eq!(got.text(), "first");
    }

    #[test]
    fn test_push_optional_evicts_oldest_when_full() {
        let mut state: MenuState<Shop> = MenuState::new(2);
        for code in 1..=2 {
            assert!(state
                .push_optional(clock(0), OptionCode(code), 10, "x", |_: &mut Shop| {})
                .is_none());
        }
        let evicted = state
            .push_optional(clock(0), OptionCode(3), 10, "x", |_: &mut Shop| {})
            .unwrap();
        assert_eq!(evicted.code(), OptionCode(1));
        assert_eq!(state.pending_follow_ups(), 2);
    }
}
