//! The engine: one tick thread driving every client.
//!
//! # Step pipeline
//!
//! ```text
//!  drain query completions ─► reconcile memberships ─► apply menu requests
//!        ─► advance timed actions ─► apply menu requests ─► pick broadcasts
//!        ─► queue account saves ─► submit queries ─► deliver output
//! ```
//!
//! Input (connect, chat, menu choices) is applied between steps, each
//! followed by the tail of the pipeline so replies go out without waiting
//! for the next tick.

use std::collections::HashMap;
use std::sync::Arc;

use tickward_command::{Args, CommandError, CommandScope, CommandTable};
use tickward_persist::{Backend, QueryGateway};
use tickward_protocol::{
    ClientSlot, MenuAction, MenuPage, OptionCode, Outbound, Position, Recipient, SlotTicket, targs,
};
use tickward_session::{MenuBuilder, MenuProducers, ParticipantKind};
use tickward_tick::{Clock, TickScheduler};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::world::MenuRequest;
use crate::{EngineConfig, TickwardError, World, builtin};

/// Handler for a menu line carrying [`MenuAction::Command`].
pub type MenuCommandHandler = Box<dyn Fn(&mut World, ClientSlot, i64, i64)>;

/// One message for one client.
pub type Delivery = (ClientSlot, Outbound);

// ---------------------------------------------------------------------------
// Engine commands
// ---------------------------------------------------------------------------

/// Requests from the network side to the engine loop.
#[derive(Debug)]
pub enum EngineCommand {
    Connect {
        kind: ParticipantKind,
        spawn: Option<Position>,
        reply: oneshot::Sender<Result<SlotTicket, TickwardError>>,
    },
    Disconnect {
        slot: ClientSlot,
    },
    Move {
        slot: ClientSlot,
        position: Option<Position>,
    },
    Chat {
        slot: ClientSlot,
        line: String,
    },
    ChooseOption {
        slot: ClientSlot,
        index: usize,
    },
    AcceptFollowUp {
        slot: ClientSlot,
        code: OptionCode,
    },
    Shutdown,
}

/// Cheap to clone handle for talking to a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    /// Creates a handle and the receiver to pass to [`Engine::run`].
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<EngineCommand>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self { sender }, receiver)
    }

    async fn send(&self, command: EngineCommand) -> Result<(), TickwardError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| TickwardError::EngineStopped)
    }

    pub async fn connect(
        &self,
        kind: ParticipantKind,
        spawn: Option<Position>,
    ) -> Result<SlotTicket, TickwardError> {
        let (reply, reply_rx) = oneshot::channel();
        self.send(EngineCommand::Connect { kind, spawn, reply }).await?;
        reply_rx.await.map_err(|_| TickwardError::EngineStopped)?
    }

    pub async fn disconnect(&self, slot: ClientSlot) -> Result<(), TickwardError> {
        self.send(EngineCommand::Disconnect { slot }).await
    }

    pub async fn move_to(&self, slot: ClientSlot, position: Option<Position>) -> Result<(), TickwardError> {
        self.send(EngineCommand::Move { slot, position }).await
    }

    pub async fn chat(&self, slot: ClientSlot, line: impl Into<String>) -> Result<(), TickwardError> {
        self.send(EngineCommand::Chat {
            slot,
            line: line.into(),
        })
        .await
    }

    pub async fn choose_option(&self, slot: ClientSlot, index: usize) -> Result<(), TickwardError> {
        self.send(EngineCommand::ChooseOption { slot, index }).await
    }

    pub async fn accept_follow_up(&self, slot: ClientSlot, code: OptionCode) -> Result<(), TickwardError> {
        self.send(EngineCommand::AcceptFollowUp { slot, code }).await
    }

    pub async fn shutdown(&self) -> Result<(), TickwardError> {
        self.send(EngineCommand::Shutdown).await
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Owns the world and everything that acts on it.
///
/// Not `Send`: continuations and callbacks stay on the tick thread. Await
/// [`run`](Self::run) on the current task (or inside a `LocalSet`).
pub struct Engine {
    config: EngineConfig,
    world: World,
    gateway: QueryGateway<World>,
    commands: CommandTable<World>,
    menu_commands: HashMap<String, MenuCommandHandler>,
    producers: MenuProducers<World>,
}

impl Engine {
    /// Creates an engine with the built-in commands registered. Must be
    /// called inside a Tokio runtime (the query gateway spawns its
    /// dispatcher).
    pub fn new<B: Backend>(backend: Arc<B>, config: EngineConfig) -> Result<Self, TickwardError> {
        let config = config.validated();
        let gateway = QueryGateway::new(backend, config.gateway.clone());
        let mut engine = Self {
            world: World::new(&config),
            gateway,
            commands: CommandTable::new(),
            menu_commands: HashMap::new(),
            producers: MenuProducers::new(),
            config,
        };
        builtin::register(&mut engine)?;
        info!(
            rate_hz = engine.config.tick.tick_rate_hz,
            max_clients = engine.config.session.max_clients,
            commands = engine.commands.len(),
            "engine created"
        );
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn commands(&self) -> &CommandTable<World> {
        &self.commands
    }

    /// Queries submitted whose continuation has not run yet.
    pub fn queries_in_flight(&self) -> usize {
        self.gateway.in_flight()
    }

    // -- registration -------------------------------------------------------

    /// Registers a command and refreshes the `/cmdlist` text.
    pub fn register_command<F>(
        &mut self,
        name: &str,
        spec: &str,
        scope: CommandScope,
        help: &str,
        handler: F,
    ) -> Result<(), TickwardError>
    where
        F: Fn(&mut World, ClientSlot, &Args) + 'static,
    {
        self.commands.register(name, spec, scope, help, handler)?;
        let lines = self
            .commands
            .in_scope(CommandScope::Chat)
            .map(|c| {
                if c.help().is_empty() {
                    format!("/{}", c.usage())
                } else {
                    format!("/{} - {}", c.usage(), c.help())
                }
            })
            .collect();
        self.world.set_command_help(lines);
        Ok(())
    }

    /// Registers the handler for menu lines with `MenuAction::Command { name, .. }`.
    pub fn register_menu_command<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(&mut World, ClientSlot, i64, i64) + 'static,
    {
        self.menu_commands.insert(name.to_string(), Box::new(handler));
    }

    /// Adds an option producer to `page`, after those already registered.
    pub fn register_menu<F>(&mut self, page: MenuPage, producer: F)
    where
        F: Fn(&World, ClientSlot, &mut MenuBuilder) + 'static,
    {
        self.producers.register(page, producer);
    }

    // -- input --------------------------------------------------------------

    pub fn connect(
        &mut self,
        kind: ParticipantKind,
        spawn: Option<Position>,
    ) -> Result<SlotTicket, TickwardError> {
        let ticket = self.world.connect(kind, spawn)?;
        self.apply_menu_requests();
        Ok(ticket)
    }

    pub fn disconnect(&mut self, slot: ClientSlot) -> Result<(), TickwardError> {
        self.world.disconnect(slot)?;
        Ok(())
    }

    pub fn move_to(&mut self, slot: ClientSlot, position: Option<Position>) -> Result<(), TickwardError> {
        self.world.move_to(slot, position)?;
        Ok(())
    }

    /// Handles a chat line. Lines starting with `/` are commands; usage and
    /// not-found errors are answered in chat. Anything else is said to
    /// everyone.
    pub fn handle_chat(&mut self, slot: ClientSlot, line: &str) {
        if !self.world.clients().is_connected(slot) {
            debug!(%slot, "chat from empty slot ignored");
            return;
        }
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if !line.starts_with('/') {
            let name = self
                .world
                .account(slot)
                .map_or_else(|| slot.to_string(), |a| a.login().to_string());
            if let Err(e) = self.world.chat(
                Recipient::All,
                "{STR}: {STR}",
                &targs![name, line],
            ) {
                warn!(%slot, error = %e, "chat line dropped");
            }
            return;
        }
        match self.commands.dispatch_chat(&mut self.world, slot, line) {
            Ok(()) => {}
            Err(e @ (CommandError::NotFound(_) | CommandError::Usage { .. })) => {
                let message = e.user_message();
                self.world.notify(slot, "{STR}", targs![message]);
            }
            Err(e) => warn!(%slot, error = %e, "command dispatch failed"),
        }
    }

    /// Handles the client choosing line `index` of its current page.
    pub fn choose_option(&mut self, slot: ClientSlot, index: usize) {
        let Some(action) = self
            .world
            .client(slot)
            .and_then(|c| c.menu.action_at(index))
            .cloned()
        else {
            debug!(%slot, index, "menu choice not selectable");
            return;
        };
        match action {
            MenuAction::Page(page) => self.world.open_page(slot, page),
            MenuAction::Back => self.world.go_back(slot),
            MenuAction::Command {
                name,
                value1,
                value2,
            } => match self.menu_commands.get(&name) {
                Some(handler) => handler(&mut self.world, slot, value1, value2),
                None => warn!(%slot, command = %name, "menu command not registered"),
            },
        }
        self.apply_menu_requests();
    }

    /// Accepts a pending follow-up offer.
    pub fn accept_follow_up(&mut self, slot: ClientSlot, code: OptionCode) -> bool {
        let accepted = self.world.resolve_optional(slot, code);
        self.apply_menu_requests();
        accepted
    }

    pub fn set_page(&mut self, slot: ClientSlot, page: MenuPage) {
        self.world.open_page(slot, page);
        self.apply_menu_requests();
    }

    pub fn back(&mut self, slot: ClientSlot) {
        self.world.go_back(slot);
        self.apply_menu_requests();
    }

    /// Rebuilds `page` for `slot` only if it is showing.
    pub fn strong_update(&mut self, slot: ClientSlot, page: MenuPage) {
        self.world.refresh_page(slot, page);
        self.apply_menu_requests();
    }

    /// Rebuilds `page` for every client looking at it.
    pub fn strong_update_all(&mut self, page: MenuPage) {
        self.world.refresh_page_all(page);
        self.apply_menu_requests();
    }

    // -- step ---------------------------------------------------------------

    /// Runs one simulation step at `clock` and returns what to deliver.
    pub fn step(&mut self, clock: Clock) -> Vec<Delivery> {
        self.world.set_clock(clock);

        let applied = self.gateway.drain(&mut self.world);
        let refreshed = self.world.accounts.reconcile(&mut self.world.aggregates);
        self.apply_menu_requests();

        self.world.advance_actions();
        self.apply_menu_requests();
        self.world.tick_broadcasts();

        let saves = self.world.queue_account_saves();
        let evicted = if clock.every_secs(1) {
            self.world.evict_idle_accounts()
        } else {
            0
        };
        if applied + refreshed + saves + evicted > 0 {
            debug!(tick = clock.tick(), applied, refreshed, saves, evicted, "step");
        }
        self.flush_output()
    }

    /// Submits queued queries and turns the outbox into deliveries. Called
    /// at the end of every step and after every input.
    pub fn flush_output(&mut self) -> Vec<Delivery> {
        let mut queue = self.world.take_queries();
        self.gateway.submit_all(&mut queue);
        self.deliver()
    }

    fn deliver(&mut self) -> Vec<Delivery> {
        let outbox = self.world.take_outbox();
        let mut deliveries = Vec::new();
        for (to, message) in outbox {
            for (slot, _) in self.world.clients().iter() {
                let receives = self
                    .world
                    .clients()
                    .kind(slot)
                    .is_some_and(|k| k.receives_output());
                if receives && to.includes(slot) {
                    deliveries.push((slot, message.clone()));
                }
            }
        }
        deliveries
    }

    /// Applies page changes and strong updates requested since the last call.
    fn apply_menu_requests(&mut self) {
        for request in self.world.take_menu_requests() {
            match request {
                MenuRequest::Open { slot, page } => {
                    if let Some(client) = self.world.client_mut(slot) {
                        client.menu.set_page(page);
                        self.render(slot, true);
                    }
                }
                MenuRequest::Back { slot } => {
                    if let Some(client) = self.world.client_mut(slot) {
                        client.menu.back();
                        self.render(slot, true);
                    }
                }
                MenuRequest::Refresh { slot: Some(slot), page } => {
                    if self
                        .world
                        .client(slot)
                        .is_some_and(|c| c.menu.needs_strong_update(page))
                    {
                        self.render(slot, false);
                    }
                }
                MenuRequest::Refresh { slot: None, page } => {
                    for slot in self.world.clients().slots() {
                        if self
                            .world
                            .client(slot)
                            .is_some_and(|c| c.menu.needs_strong_update(page))
                        {
                            self.render(slot, false);
                        }
                    }
                }
            }
        }
    }

    /// Renders the current page of `slot`; sends it if it changed or `always`.
    fn render(&mut self, slot: ClientSlot, always: bool) {
        let Some(page) = self.world.client(slot).map(|c| c.menu.current()) else {
            return;
        };
        let items = self.producers.render(&self.world, slot, page);
        let Some(client) = self.world.client_mut(slot) else {
            return;
        };
        let changed = client.menu.replace_options(items);
        if changed || always {
            let items = client.menu.options().to_vec();
            self.world.send(
                Recipient::Slot(slot),
                Outbound::Menu { items },
            );
        }
    }

    /// Waits for every in-flight query and applies it.
    pub async fn flush_queries(&mut self) {
        loop {
            self.gateway.flush(&mut self.world).await;
            let mut queue = self.world.take_queries();
            if queue.is_empty() {
                break;
            }
            self.gateway.submit_all(&mut queue);
        }
        self.world.accounts.reconcile(&mut self.world.aggregates);
        self.apply_menu_requests();
    }

    // -- run loop -----------------------------------------------------------

    /// Runs the tick loop until [`EngineCommand::Shutdown`] or until every
    /// handle is dropped. Pending saves and queries are flushed on exit.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<EngineCommand>,
        deliveries: mpsc::UnboundedSender<Delivery>,
    ) -> Result<(), TickwardError> {
        let mut scheduler = TickScheduler::new(self.config.tick.clone());
        info!(rate_hz = scheduler.tick_rate_hz(), "engine running");

        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else {
                        debug!("all engine handles dropped");
                        break;
                    };
                    if matches!(command, EngineCommand::Shutdown) {
                        break;
                    }
                    self.apply_command(command);
                    send_all(&deliveries, self.flush_output());
                }
                info = scheduler.wait_for_tick() => {
                    let out = self.step(info.clock);
                    scheduler.record_tick_end();
                    send_all(&deliveries, out);
                }
            }
        }

        info!(tick = scheduler.tick_count(), "engine shutting down");
        for slot in self.world.clients().slots() {
            if let Err(e) = self.world.disconnect(slot) {
                warn!(%slot, error = %e, "disconnect on shutdown failed");
            }
        }
        self.world.queue_account_saves();
        self.flush_queries().await;
        info!("engine stopped");
        Ok(())
    }

    fn apply_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Connect { kind, spawn, reply } => {
                let _ = reply.send(self.connect(kind, spawn));
            }
            EngineCommand::Disconnect { slot } => {
                if let Err(e) = self.disconnect(slot) {
                    debug!(%slot, error = %e, "disconnect ignored");
                }
            }
            EngineCommand::Move { slot, position } => {
                if let Err(e) = self.move_to(slot, position) {
                    debug!(%slot, error = %e, "move ignored");
                }
            }
            EngineCommand::Chat { slot, line } => self.handle_chat(slot, &line),
            EngineCommand::ChooseOption { slot, index } => self.choose_option(slot, index),
            EngineCommand::AcceptFollowUp { slot, code } => {
                self.accept_follow_up(slot, code);
            }
            EngineCommand::Shutdown => {}
        }
    }
}

/// Sends deliveries, dropping them if the network side is gone.
fn send_all(deliveries: &mpsc::UnboundedSender<Delivery>, out: Vec<Delivery>) {
    for delivery in out {
        if deliveries.send(delivery).is_err() {
            debug!("delivery receiver gone");
            return;
        }
    }
}
