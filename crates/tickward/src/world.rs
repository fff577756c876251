//! The world: all state owned by the tick thread.
//!
//! Command handlers, menu producers, timed-action callbacks, follow-up
//! actions and query continuations all receive `&mut World` (or `&World`)
//! and nothing else. They never see the engine, so they cannot submit
//! queries or render menus directly. Instead they leave requests here:
//!
//! - output goes to the outbox and is delivered at the end of the step,
//! - queries go to [`World::queries_mut`] and are submitted after the step,
//! - page changes and strong updates are recorded and applied by the engine.

use std::time::{SystemTime, UNIX_EPOCH};

use tickward_account::{
    ACCOUNTS_TABLE, Account, AccountConfig, AccountEvent, AccountRegistry, Aggregates,
};
use tickward_persist::{CompletionContext, Issuer, Query, QueryQueue, QueryResult};
use tickward_protocol::{
    AccountId, Arg, BroadcastPriority, ClientSlot, Effect, Emote, MenuPage, OptionCode, Outbound,
    Position, Recipient, SlotTicket, Template, targs,
};
use tickward_session::{
    BroadcastState, Cooldown, CooldownStep, MenuState, ParticipantKind, SessionConfig,
    SessionError, SlotTable,
};
use tickward_tick::Clock;
use tracing::{debug, info, warn};

use crate::{EngineConfig, TickwardError};

/// Ticks the "< Interrupted >" notice stays up.
const INTERRUPT_NOTICE_TICKS: u64 = 50;
/// Lifespan of a progress bar line; refreshed well before it lapses.
const PROGRESS_TICKS: u64 = 10;

// ---------------------------------------------------------------------------
// Per-client state
// ---------------------------------------------------------------------------

/// Everything one connected client owns. Dropped on disconnect.
pub struct ClientState {
    pub cooldown: Cooldown<World>,
    pub menu: MenuState<World>,
    pub broadcast: BroadcastState,
    /// `None` while the client has no character in the world.
    pub position: Option<Position>,
}

impl ClientState {
    fn new(config: &SessionConfig, spawn: Option<Position>) -> Self {
        Self {
            cooldown: Cooldown::new(config.cooldown_radius, config.progress_hz),
            menu: MenuState::new(config.max_optionals),
            broadcast: BroadcastState::new(config.broadcast_keepalive_ticks),
            position: spawn,
        }
    }
}

/// A menu change the engine applies with its producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MenuRequest {
    Open { slot: ClientSlot, page: MenuPage },
    Back { slot: ClientSlot },
    /// Rebuild `page` for `slot` (or every client) if it is showing.
    Refresh {
        slot: Option<ClientSlot>,
        page: MenuPage,
    },
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

pub struct World {
    clock: Clock,
    world_name: String,
    session_config: SessionConfig,
    account_config: AccountConfig,
    clients: SlotTable<ClientState>,
    pub accounts: AccountRegistry,
    pub aggregates: Aggregates,
    outbox: Vec<(Recipient, Outbound)>,
    queries: QueryQueue<World>,
    menu_requests: Vec<MenuRequest>,
    command_help: Vec<String>,
}

impl CompletionContext for World {
    fn ticket_is_current(&self, ticket: SlotTicket) -> bool {
        self.clients.is_current(ticket)
    }
}

impl World {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            clock: Clock::new(0, config.tick.tick_rate_hz),
            world_name: config.world_name.clone(),
            session_config: config.session.clone(),
            account_config: config.account.clone(),
            clients: SlotTable::new(config.session.max_clients as usize),
            accounts: AccountRegistry::new(),
            aggregates: Aggregates::new(),
            outbox: Vec::new(),
            queries: QueryQueue::new(),
            menu_requests: Vec::new(),
            command_help: Vec::new(),
        }
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub(crate) fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }

    pub fn world_name(&self) -> &str {
        &self.world_name
    }

    pub fn account_config(&self) -> &AccountConfig {
        &self.account_config
    }

    pub fn clients(&self) -> &SlotTable<ClientState> {
        &self.clients
    }

    pub fn client(&self, slot: ClientSlot) -> Option<&ClientState> {
        self.clients.get(slot)
    }

    pub fn client_mut(&mut self, slot: ClientSlot) -> Option<&mut ClientState> {
        self.clients.get_mut(slot)
    }

    pub fn position(&self, slot: ClientSlot) -> Option<Position> {
        self.clients.get(slot).and_then(|c| c.position)
    }

    /// Queries to submit after the current step. Continuations that need a
    /// follow-up query push it here too.
    pub fn queries_mut(&mut self) -> &mut QueryQueue<World> {
        &mut self.queries
    }

    pub(crate) fn take_queries(&mut self) -> QueryQueue<World> {
        std::mem::take(&mut self.queries)
    }

    /// `/usage - help` lines for every chat command.
    pub fn command_help(&self) -> &[String] {
        &self.command_help
    }

    pub(crate) fn set_command_help(&mut self, lines: Vec<String>) {
        self.command_help = lines;
    }

    // -- connection ---------------------------------------------------------

    /// Takes the lowest free slot. `spawn` is the character's position, or
    /// `None` if it has not entered the world yet.
    pub fn connect(
        &mut self,
        kind: ParticipantKind,
        spawn: Option<Position>,
    ) -> Result<SlotTicket, SessionError> {
        let state = ClientState::new(&self.session_config, spawn);
        let ticket = self.clients.connect(kind, state)?;
        self.refresh_page(ticket.slot, MenuPage::MAIN);
        Ok(ticket)
    }

    /// Frees the slot. Any running action is dropped without its callback.
    /// The account is saved in full and stays resident until evicted.
    pub fn disconnect(&mut self, slot: ClientSlot) -> Result<(), SessionError> {
        self.clients.disconnect(slot)?;
        if let Some(account) = self.accounts.by_slot_mut(slot) {
            account.request_full_save();
            for query in account.take_save_queries() {
                self.queries.push_detached(Issuer::Global, query);
            }
        }
        self.accounts.detach(slot, self.clock.tick());
        self.outbox.retain(|(to, _)| *to != Recipient::Slot(slot));
        Ok(())
    }

    /// Moves a client's character, or removes it with `None`.
    pub fn move_to(&mut self, slot: ClientSlot, position: Option<Position>) -> Result<(), SessionError> {
        let client = self
            .clients
            .get_mut(slot)
            .ok_or(SessionError::NotConnected(slot))?;
        client.position = position;
        Ok(())
    }

    // -- output -------------------------------------------------------------

    /// Queues a raw message.
    pub fn send(&mut self, to: Recipient, message: Outbound) {
        self.outbox.push((to, message));
    }

    /// Queues a chat line rendered from `template`.
    ///
    /// # Errors
    /// [`ProtocolError`](tickward_protocol::ProtocolError) if `args` does not
    /// fit the placeholders. Nothing is sent.
    pub fn chat(&mut self, to: Recipient, template: &str, args: &[Arg]) -> Result<(), TickwardError> {
        let text = Template::parse(template).render(args)?;
        self.send(to, Outbound::Chat { text });
        Ok(())
    }

    /// Shorthand for a chat line to one client.
    pub fn chat_to(&mut self, slot: ClientSlot, template: &str, args: &[Arg]) -> Result<(), TickwardError> {
        self.chat(Recipient::Slot(slot), template, args)
    }

    /// Offers a broadcast line to one client's de-dup state.
    pub fn broadcast(
        &mut self,
        slot: ClientSlot,
        priority: BroadcastPriority,
        lifespan_ticks: u64,
        template: &str,
        args: &[Arg],
    ) -> Result<(), TickwardError> {
        let text = Template::parse(template).render(args)?;
        let client = self
            .clients
            .get_mut(slot)
            .ok_or(SessionError::NotConnected(slot))?;
        client.broadcast.push(priority, lifespan_ticks, text);
        Ok(())
    }

    /// Queues a world effect for every player.
    pub fn effect(&mut self, effect: Effect) {
        self.send(Recipient::All, Outbound::Effect(effect));
    }

    pub(crate) fn take_outbox(&mut self) -> Vec<(Recipient, Outbound)> {
        std::mem::take(&mut self.outbox)
    }

    // -- timed actions ------------------------------------------------------

    /// Starts a timed action for `slot` at its current position.
    ///
    /// # Errors
    /// No client, no character, or an action already running.
    pub fn start_action<F>(
        &mut self,
        slot: ClientSlot,
        duration_ticks: u64,
        label: impl Into<String>,
        callback: F,
    ) -> Result<(), TickwardError>
    where
        F: FnOnce(&mut World) + 'static,
    {
        let client = self
            .clients
            .get_mut(slot)
            .ok_or(SessionError::NotConnected(slot))?;
        let at = client.position.ok_or(TickwardError::NoCharacter(slot))?;
        let label = label.into();
        client.cooldown.start(duration_ticks, label.as_str(), at, callback)?;

        debug!(%slot, %label, ticks = duration_ticks, "timed action started");
        self.effect(Effect::SpawnFlash { at });
        self.effect(Effect::Emote {
            slot,
            emote: Emote::Blink,
            ticks: duration_ticks,
        });
        Ok(())
    }

    /// Drops the running action of `slot`, if any, without its callback.
    pub fn cancel_action(&mut self, slot: ClientSlot) {
        if let Some(client) = self.clients.get_mut(slot) {
            client.cooldown.reset();
        }
    }

    /// Advances every client's timed action by one tick.
    pub(crate) fn advance_actions(&mut self) {
        let clock = self.clock;
        for slot in self.clients.slots() {
            let Some(client) = self.clients.get_mut(slot) else {
                continue;
            };
            let position = client.position;
            match client.cooldown.advance(clock, position) {
                CooldownStep::Idle | CooldownStep::Running | CooldownStep::Settled => {}
                CooldownStep::Progress { text } => {
                    client
                        .broadcast
                        .push(BroadcastPriority::VeryImportant, PROGRESS_TICKS, text);
                }
                CooldownStep::Interrupted => {
                    client.broadcast.push(
                        BroadcastPriority::VeryImportant,
                        INTERRUPT_NOTICE_TICKS,
                        "< Interrupted >",
                    );
                    debug!(%slot, "timed action interrupted");
                    self.effect(Effect::Emote {
                        slot,
                        emote: Emote::Normal,
                        ticks: 0,
                    });
                }
                CooldownStep::Completed { callback, at } => {
                    // Replaces the progress line so it does not linger.
                    client
                        .broadcast
                        .push(BroadcastPriority::VeryImportant, 1, String::new());
                    debug!(%slot, "timed action completed");
                    self.effect(Effect::Emote {
                        slot,
                        emote: Emote::Normal,
                        ticks: 0,
                    });
                    self.effect(Effect::SpawnFlash { at });
                    callback(self);
                }
                CooldownStep::Vanished => {
                    debug!(%slot, "timed action dropped, character gone");
                }
            }
        }
    }

    /// Picks this tick's broadcast line for every client.
    pub(crate) fn tick_broadcasts(&mut self) {
        let clock = self.clock;
        for (slot, client) in self.clients.iter_mut() {
            if let Some(text) = client.broadcast.tick(clock) {
                self.outbox
                    .push((Recipient::Slot(slot), Outbound::Broadcast { text }));
            }
        }
    }

    // -- menus --------------------------------------------------------------

    /// Navigates `slot` to `page`.
    pub fn open_page(&mut self, slot: ClientSlot, page: MenuPage) {
        self.menu_requests.push(MenuRequest::Open { slot, page });
    }

    /// Navigates `slot` to its previous page.
    pub fn go_back(&mut self, slot: ClientSlot) {
        self.menu_requests.push(MenuRequest::Back { slot });
    }

    /// Rebuilds `page` for `slot` if that is what it is looking at.
    pub fn refresh_page(&mut self, slot: ClientSlot, page: MenuPage) {
        self.menu_requests.push(MenuRequest::Refresh {
            slot: Some(slot),
            page,
        });
    }

    /// Rebuilds `page` for every client looking at it.
    pub fn refresh_page_all(&mut self, page: MenuPage) {
        self.menu_requests.push(MenuRequest::Refresh { slot: None, page });
    }

    pub(crate) fn take_menu_requests(&mut self) -> Vec<MenuRequest> {
        std::mem::take(&mut self.menu_requests)
    }

    /// Offers `slot` an optional follow-up valid for `ttl_secs`. The client
    /// gets a prompt; accepting it with `code` runs `action`.
    pub fn push_optional<F>(
        &mut self,
        slot: ClientSlot,
        code: OptionCode,
        ttl_secs: u64,
        template: &str,
        args: &[Arg],
        action: F,
    ) -> Result<(), TickwardError>
    where
        F: FnOnce(&mut World) + 'static,
    {
        let text = Template::parse(template).render(args)?;
        let clock = self.clock;
        let client = self
            .clients
            .get_mut(slot)
            .ok_or(SessionError::NotConnected(slot))?;
        if let Some(evicted) = client
            .menu
            .push_optional(clock, code, ttl_secs, text.as_str(), action)
        {
            debug!(%slot, code = %evicted.code(), "follow-up evicted unanswered");
        }
        self.send(
            Recipient::Slot(slot),
            Outbound::Prompt {
                code,
                text,
                ttl_secs,
            },
        );
        Ok(())
    }

    /// Accepts a follow-up. Lapsed or unknown codes do nothing.
    pub fn resolve_optional(&mut self, slot: ClientSlot, code: OptionCode) -> bool {
        let clock = self.clock;
        let Some(follow_up) = self
            .clients
            .get_mut(slot)
            .and_then(|c| c.menu.resolve(clock, code))
        else {
            debug!(%slot, %code, "no pending follow-up for code");
            return false;
        };
        follow_up.into_action()(self);
        true
    }

    // -- accounts -----------------------------------------------------------

    pub fn account(&self, slot: ClientSlot) -> Option<&Account> {
        self.accounts.by_slot(slot)
    }

    pub fn account_mut(&mut self, slot: ClientSlot) -> Option<&mut Account> {
        self.accounts.by_slot_mut(slot)
    }

    /// The account on `slot`, or [`TickwardError::NotLoggedIn`].
    pub fn require_account(&self, slot: ClientSlot) -> Result<&Account, TickwardError> {
        self.accounts
            .by_slot(slot)
            .ok_or(TickwardError::NotLoggedIn(slot))
    }

    /// Looks up `login` and binds the account to `slot` when the row arrives.
    ///
    /// Nothing changes until then. If the client leaves first the result is
    /// discarded.
    pub fn load_account(&mut self, slot: ClientSlot, login: &str, password: &str) -> Result<(), TickwardError> {
        let ticket = self
            .clients
            .ticket(slot)
            .ok_or(SessionError::NotConnected(slot))?;
        let query = Query::select(ACCOUNTS_TABLE).filter("Username", login);
        let login = login.to_string();
        let password = password.to_string();
        self.queries
            .push(Issuer::Slot(ticket), query, move |world: &mut World, result| {
                world.finish_login(slot, &login, &password, result);
            });
        debug!(%slot, "account load requested");
        Ok(())
    }

    fn finish_login(&mut self, slot: ClientSlot, login: &str, password: &str, result: QueryResult) {
        let rows = result
            .into_first()
            .filter(|rows| rows.get_string("Password").is_ok_and(|p| p == password));
        let Some(rows) = rows else {
            info!(%slot, %login, "login rejected");
            self.notify(slot, "Wrong login or password.", targs![]);
            return;
        };
        let id = match rows.get_int64("ID") {
            Ok(id) => AccountId(id),
            Err(e) => {
                warn!(%slot, %login, error = %e, "account row without ID");
                self.notify(slot, "Account data is unavailable, try again later.", targs![]);
                return;
            }
        };
        if self
            .accounts
            .get(id)
            .and_then(Account::slot)
            .is_some_and(|bound| bound != slot)
        {
            self.notify(slot, "This account is already in use.", targs![]);
            return;
        }

        let loaded = if self.accounts.get(id).is_some() {
            // Resident from an earlier session: the live state is newer than
            // the row, so only re-home and re-resolve relationships.
            self.accounts
                .update_pointer(id, slot)
                .map(|account| {
                    account.reinitialize_house(&self.aggregates.houses);
                    account.reinitialize_group(&self.aggregates.groups);
                    account.reinitialize_guild(&self.aggregates.guilds);
                    account.level
                })
                .map_err(TickwardError::from)
        } else {
            let mut account = Account::new(id, login);
            match account.init(&rows, &self.account_config, &self.aggregates) {
                Ok(()) => Ok(self.accounts.attach(account, slot).level),
                Err(e) => Err(e.into()),
            }
        };
        let level = match loaded {
            Ok(level) => level,
            Err(e) => {
                warn!(%slot, account = %id, error = %e, "account init failed");
                self.notify(slot, "Account data is unavailable, try again later.", targs![]);
                return;
            }
        };

        self.queries.push_detached(
            Issuer::Global,
            Query::update(ACCOUNTS_TABLE)
                .filter("ID", id.0)
                .set("LoginDate", unix_now()),
        );
        self.refresh_page(slot, MenuPage::MAIN);
        self.notify(slot, "Welcome, {STR}! You are level {INT}.", targs![login, level]);
        info!(%slot, account = %id, "logged in");
    }

    /// Grants experience to the account on `slot` and reports level-ups.
    pub fn add_experience(&mut self, slot: ClientSlot, value: i64) -> Result<(), TickwardError> {
        let account = self
            .accounts
            .by_slot_mut(slot)
            .ok_or(TickwardError::NotLoggedIn(slot))?;
        let events = account.add_experience(value, &self.account_config);
        for event in events {
            match event {
                AccountEvent::LevelUp { level } => {
                    self.chat_to(slot, "Level UP. Now Level {INT}!", &targs![level])?;
                    self.refresh_page(slot, MenuPage::MAIN);
                }
                AccountEvent::GuildExperience { guild, amount } => {
                    if let Some(g) = self.aggregates.guilds.get_mut(guild) {
                        let levels = g.add_experience(amount);
                        if levels > 0 {
                            info!(%guild, level = g.level, "guild levelled up");
                        }
                    }
                }
                AccountEvent::RelationsChanged { .. } | AccountEvent::Wanted => {}
            }
        }
        Ok(())
    }

    /// Moves pending account saves into the query queue.
    pub(crate) fn queue_account_saves(&mut self) -> usize {
        let mut queued = 0;
        for account in self.accounts.iter_mut() {
            if !account.has_pending_saves() {
                continue;
            }
            for query in account.take_save_queries() {
                self.queries.push_detached(Issuer::Global, query);
                queued += 1;
            }
        }
        queued
    }

    /// Drops accounts offline for longer than `evict_after_secs`.
    pub(crate) fn evict_idle_accounts(&mut self) -> usize {
        let after = self.account_config.evict_after_secs;
        if after == 0 {
            return 0;
        }
        let after_ticks = self.clock.secs_to_ticks(after);
        self.accounts.evict_idle(self.clock.tick(), after_ticks).len()
    }

    /// Chat to one client where a template mistake is a bug, not input.
    pub(crate) fn notify(&mut self, slot: ClientSlot, template: &str, args: Vec<Arg>) {
        if let Err(e) = self.chat_to(slot, template, &args) {
            warn!(%slot, template, error = %e, "notice not sent");
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}
