//! Core value types shared by every Tickward layer.
//!
//! Nothing in here owns behavior beyond small helpers: these are the nouns
//! the engine, the session machines and the persistence gateway pass around.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Index of a connected client, in `[0, capacity)`.
///
/// Slots are reused: when a client disconnects the index goes back to the
/// free pool and the next connect may receive it. Anything that outlives a
/// single tick must hold a [`SlotTicket`] instead of a bare slot.
///
/// `#[serde(transparent)]` keeps it a plain number in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientSlot(pub u16);

impl ClientSlot {
    /// The slot as an array index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ClientSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

/// A slot plus the generation it had when the ticket was taken.
///
/// The slot table bumps a slot's generation on every connect and
/// disconnect, so a ticket taken before a reconnect no longer matches
/// and whatever carried it is treated as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotTicket {
    pub slot: ClientSlot,
    pub generation: u64,
}

impl SlotTicket {
    pub fn new(slot: ClientSlot, generation: u64) -> Self {
        Self { slot, generation }
    }
}

impl fmt::Display for SlotTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.slot, self.generation)
    }
}

/// Primary key of an account row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A-{}", self.0)
    }
}

/// Primary key of a house.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HouseId(pub i64);

impl fmt::Display for HouseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H-{}", self.0)
    }
}

/// Primary key of a group (party).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub i64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G-{}", self.0)
    }
}

/// Primary key of a guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuildId(pub i64);

impl fmt::Display for GuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// World position
// ---------------------------------------------------------------------------

/// A point in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

// ---------------------------------------------------------------------------
// Broadcast priority
// ---------------------------------------------------------------------------

/// Importance of a broadcast line.
///
/// Variants are declared from lowest to highest, so the derived `Ord`
/// gives `Lower < Basic < ... < VeryImportant`. Within one tick a higher
/// priority message replaces a lower one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum BroadcastPriority {
    #[default]
    Lower,
    Basic,
    Information,
    MainInformation,
    Warning,
    VeryImportant,
}

// ---------------------------------------------------------------------------
// Menus
// ---------------------------------------------------------------------------

/// Identifier of a menu page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MenuPage(pub u16);

impl MenuPage {
    /// The page every client lands on after connecting.
    pub const MAIN: MenuPage = MenuPage(0);
}

impl fmt::Display for MenuPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page-{}", self.0)
    }
}

/// What choosing a menu item does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuAction {
    /// Navigate to another page.
    Page(MenuPage),
    /// Navigate to the previously shown page.
    Back,
    /// Run a menu command with two integer payloads.
    Command {
        name: String,
        value1: i64,
        value2: i64,
    },
}

/// One rendered line of a menu page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuItem {
    /// Non-selectable title line.
    Header(String),
    /// Selectable line.
    Item { label: String, action: MenuAction },
    /// Visual separator.
    Divider,
    /// Marks the end of the page. Always the last item.
    Terminator,
}

impl MenuItem {
    /// `true` for lines the client can choose.
    pub fn is_selectable(&self) -> bool {
        matches!(self, MenuItem::Item { .. })
    }
}

/// Opaque key of an optional follow-up prompt ("yes/no" style offers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionCode(pub u32);

impl fmt::Display for OptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "opt-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Specifies who should receive an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every connected player.
    All,
    /// One specific client.
    Slot(ClientSlot),
    /// Everyone except the given client.
    AllExcept(ClientSlot),
}

impl Recipient {
    /// Does this recipient include `slot`?
    pub fn includes(&self, slot: ClientSlot) -> bool {
        match self {
            Recipient::All => true,
            Recipient::Slot(s) => *s == slot,
            Recipient::AllExcept(s) => *s != slot,
        }
    }
}

/// Character emote shown by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Emote {
    #[default]
    Normal,
    Blink,
}

/// A visual side effect tied to the world, not to text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    /// Short spawn flash at a position.
    SpawnFlash { at: Position },
    /// Switch a client's character emote for `ticks` ticks (0 = until changed).
    Emote {
        slot: ClientSlot,
        emote: Emote,
        ticks: u64,
    },
    /// Play a world sound at a position.
    Sound { sound: u32, at: Position },
}

/// One message for one client, produced by the engine each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outbound {
    /// A chat line.
    Chat { text: String },
    /// The broadcast line (center of screen). An empty text clears it.
    Broadcast { text: String },
    /// A full menu page, terminator included.
    Menu { items: Vec<MenuItem> },
    /// An optional follow-up offer the client may accept within `ttl_secs`.
    Prompt {
        code: OptionCode,
        text: String,
        ttl_secs: u64,
    },
    /// A world effect.
    Effect(Effect),
}

#[cfg(test)]
mod tests {
    use super::*;

    // =====================================================================
    // Identity types
    // =====================================================================

    #[test]
    fn test_client_slot_serializes_as_plain_number() {
        let json = serde_json::to_string(&ClientSlot(3)).unwrap();
        assert_eq!(json, "3");
    }

    #[test]
    fn test_client_slot_display() {
        assert_eq!(ClientSlot(7).to_string(), "C-7");
        assert_eq!(ClientSlot(7).index(), 7);
    }

    #[test]
    fn test_slot_ticket_display_includes_generation() {
        let ticket = SlotTicket::new(ClientSlot(2), 5);
        assert_eq!(ticket.to_string(), "C-2#5");
    }

    #[test]
    fn test_account_id_deserializes_from_plain_number() {
        let id: AccountId = serde_json::from_str("42").unwrap();
        assert_eq!(id, AccountId(42));
        assert_eq!(id.to_string(), "A-42");
    }

    // =====================================================================
    // Position / priority
    // =====================================================================

    #[test]
    fn test_position_distance() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(3.0, 4.0);
        assert_eq!(a.distance(b), 5.0);
        assert_eq!(b.distance(a), 5.0);
    }

    #[test]
    fn test_broadcast_priority_orders_lowest_first() {
        assert!(BroadcastPriority::Lower < BroadcastPriority::Basic);
        assert!(BroadcastPriority::Warning < BroadcastPriority::VeryImportant);
        assert_eq!(BroadcastPriority::default(), BroadcastPriority::Lower);
    }

    // =====================================================================
    // Recipient / menus
    // =====================================================================

    #[test]
    fn test_recipient_includes() {
        let me = ClientSlot(1);
        let other = ClientSlot(2);
        assert!(Recipient::All.includes(me));
        assert!(Recipient::Slot(me).includes(me));
        assert!(!Recipient::Slot(me).includes(other));
        assert!(!Recipient::AllExcept(me).includes(me));
        assert!(Recipient::AllExcept(me).includes(other));
    }

    #[test]
    fn test_menu_item_selectable_only_for_items() {
        let item = MenuItem::Item {
            label: "Shop".into(),
            action: MenuAction::Page(MenuPage(4)),
        };
        assert!(item.is_selectable());
        assert!(!MenuItem::Header("Main".into()).is_selectable());
        assert!(!MenuItem::Divider.is_selectable());
        assert!(!MenuItem::Terminator.is_selectable());
    }

    #[test]
    fn test_outbound_json_is_externally_tagged() {
        let json = serde_json::to_string(&Outbound::Chat { text: "hi".into() }).unwrap();
        assert_eq!(json, r#"{"Chat":{"text":"hi"}}"#);
    }
}
