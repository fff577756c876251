//! The slot table: a fixed-capacity arena of per-client state.
//!
//! Each slot has a generation counter that is bumped on every connect and
//! every disconnect. A [`SlotTicket`] taken while a client is connected
//! therefore stops matching the moment that client leaves, even if a new
//! client lands on the same index one tick later. Async work checks its
//! ticket with [`SlotTable::is_current`] before touching anything.
//!
//! ```text
//!  generation:   0 ──connect──► 1 ──disconnect──► 2 ──connect──► 3 ...
//!  occupied:     no             yes               no             yes
//! ```
//!
//! Not thread-safe by itself: the table is owned by the tick thread.

use tickward_protocol::{ClientSlot, SlotTicket};
use tracing::{debug, info};

use crate::SessionError;

/// What is sitting in a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticipantKind {
    /// A human client.
    Player,
    /// A server-driven participant. Bots never receive text or menus.
    Bot { bot_id: u32 },
}

impl ParticipantKind {
    /// Whether chat, broadcast, menu and prompt output should be sent.
    pub fn receives_output(&self) -> bool {
        matches!(self, ParticipantKind::Player)
    }
}

struct Occupant<S> {
    kind: ParticipantKind,
    state: S,
}

struct Entry<S> {
    generation: u64,
    occupant: Option<Occupant<S>>,
}

/// Fixed-capacity per-client storage with generation checks.
pub struct SlotTable<S> {
    entries: Vec<Entry<S>>,
    occupied: usize,
}

impl<S> SlotTable<S> {
    /// Creates an empty table with `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        let entries = (0..capacity)
            .map(|_| Entry {
                generation: 0,
                occupant: None,
            })
            .collect();
        Self {
            entries,
            occupied: 0,
        }
    }

    /// Places a new client on the lowest free slot.
    ///
    /// # Errors
    /// [`SessionError::Full`] when every slot is taken.
    pub fn connect(&mut self, kind: ParticipantKind, state: S) -> Result<SlotTicket, SessionError> {
        let capacity = self.entries.len();
        let (index, entry) = self
            .entries
            .iter_mut()
            .enumerate()
            .find(|(_, e)| e.occupant.is_none())
            .ok_or(SessionError::Full { capacity })?;

        entry.generation += 1;
        entry.occupant = Some(Occupant { kind, state });
        self.occupied += 1;

        // Capacity comes from a u16 config value.
        let slot = ClientSlot(index as u16);
        let ticket = SlotTicket::new(slot, entry.generation);
        info!(%slot, generation = ticket.generation, ?kind, "client connected");
        Ok(ticket)
    }

    /// Frees a slot and returns its state. All per-client state goes with it.
    ///
    /// # Errors
    /// [`SessionError::NotConnected`] if the slot is empty.
    pub fn disconnect(&mut self, slot: ClientSlot) -> Result<S, SessionError> {
        let entry = self
            .entries
            .get_mut(slot.index())
            .ok_or(SessionError::NotConnected(slot))?;
        let occupant = entry
            .occupant
            .take()
            .ok_or(SessionError::NotConnected(slot))?;
        entry.generation += 1;
        self.occupied -= 1;
        info!(%slot, generation = entry.generation, "client disconnected");
        Ok(occupant.state)
    }

    /// The current ticket of an occupied slot.
    pub fn ticket(&self, slot: ClientSlot) -> Option<SlotTicket> {
        let entry = self.entries.get(slot.index())?;
        entry
            .occupant
            .as_ref()
            .map(|_| SlotTicket::new(slot, entry.generation))
    }

    /// Is `ticket` still the identity of its slot?
    pub fn is_current(&self, ticket: SlotTicket) -> bool {
        let current = self.ticket(ticket.slot) == Some(ticket);
        if !current {
            debug!(%ticket, "ticket is stale");
        }
        current
    }

    pub fn is_connected(&self, slot: ClientSlot) -> bool {
        self.ticket(slot).is_some()
    }

    pub fn kind(&self, slot: ClientSlot) -> Option<ParticipantKind> {
        self.occupant(slot).map(|o| o.kind)
    }

    pub fn get(&self, slot: ClientSlot) -> Option<&S> {
        self.occupant(slot).map(|o| &o.state)
    }

    pub fn get_mut(&mut self, slot: ClientSlot) -> Option<&mut S> {
        self.entries
            .get_mut(slot.index())
            .and_then(|e| e.occupant.as_mut())
            .map(|o| &mut o.state)
    }

    fn occupant(&self, slot: ClientSlot) -> Option<&Occupant<S>> {
        self.entries.get(slot.index()).and_then(|e| e.occupant.as_ref())
    }

    /// Occupied slots in index order. Collected, so the caller may mutate
    /// the table while walking it.
    pub fn slots(&self) -> Vec<ClientSlot> {
        self.iter().map(|(slot, _)| slot).collect()
    }

    /// Occupied slots with their state.
    pub fn iter(&self) -> impl Iterator<Item = (ClientSlot, &S)> {
        self.entries.iter().enumerate().filter_map(|(i, e)| {
            e.occupant
                .as_ref()
                .map(|o| (ClientSlot(i as u16), &o.state))
        })
    }

    /// Occupied slots with mutable state.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ClientSlot, &mut S)> {
        self.entries.iter_mut().enumerate().filter_map(|(i, e)| {
            e.occupant
                .as_mut()
                .map(|o| (ClientSlot(i as u16), &mut o.state))
        })
    }

    /// Number of connected clients.
    pub fn len(&self) -> usize {
        self.occupied
    }

    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }
}
