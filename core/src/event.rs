//! The generation log: every generator call and player decision of a run.
//!
//! RULE: the orchestrator is the only writer. Each entry carries the floor
//! it happened on, so two runs can be diffed floor by floor.

use crate::{
    card_reward::RewardCard,
    combat_reward::RewardItem,
    neow::NeowOption,
    registry::StreamCounters,
    shop::ShopInventory,
    treasure::TreasureReward,
    types::{Act, Ascension, CharacterClass, Floor, RoomKind, RunId},
};
use serde::{Deserialize, Serialize};

/// Every event the orchestrator records.
/// Variants may be added; never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenEvent {
    // ── Run lifecycle ──────────────────────────────
    RunStarted {
        floor: Floor,
        seed: i64,
        seed_text: String,
        character: CharacterClass,
        ascension: Ascension,
    },
    RunEnded {
        floor: Floor,
        victory: bool,
        counters: StreamCounters,
    },

    // ── Neow ───────────────────────────────────────
    NeowOptionsGenerated {
        floor: Floor,
        options: Vec<NeowOption>,
    },
    NeowChosen {
        floor: Floor,
        option: NeowOption,
    },

    // ── Act generation ─────────────────────────────
    ActEntered {
        floor: Floor,
        act: Act,
        card_counter_before: u32,
        card_counter_after: u32,
    },
    MapGenerated {
        floor: Floor,
        act: Act,
        rooms: usize,
        elites: usize,
        map_counter: u32,
    },
    EncountersGenerated {
        floor: Floor,
        act: Act,
        normal: Vec<String>,
        elite: Vec<String>,
        bosses: Vec<String>,
    },

    // ── Floors ─────────────────────────────────────
    FloorEntered {
        floor: Floor,
        x: usize,
        y: usize,
        room: RoomKind,
    },
    UnknownRoomResolved {
        floor: Floor,
        room: RoomKind,
    },
    CombatStarted {
        floor: Floor,
        room: RoomKind,
        encounter: String,
    },
    CombatResolved {
        floor: Floor,
        encounter: String,
        hp_after: i32,
    },
    EventSelected {
        floor: Floor,
        event: String,
    },

    // ── Rewards ────────────────────────────────────
    RewardsGenerated {
        floor: Floor,
        items: Vec<RewardItem>,
    },
    RewardTaken {
        floor: Floor,
        item: RewardItem,
    },
    CardPicked {
        floor: Floor,
        card: RewardCard,
    },
    CardsSkipped {
        floor: Floor,
    },
    ShopGenerated {
        floor: Floor,
        inventory: ShopInventory,
    },
    ItemPurchased {
        floor: Floor,
        item: String,
        price: i32,
    },
    CardPurged {
        floor: Floor,
        price: i32,
    },
    TreasureOpened {
        floor: Floor,
        reward: TreasureReward,
    },
    BossRelicsOffered {
        floor: Floor,
        relics: Vec<String>,
    },
    BossRelicChosen {
        floor: Floor,
        relic: Option<String>,
    },

    // ── Rest sites ─────────────────────────────────
    Rested {
        floor: Floor,
        healed: i32,
    },
    Smithed {
        floor: Floor,
    },
    KeyObtained {
        floor: Floor,
        key: String,
    },
}

impl GenEvent {
    pub fn floor(&self) -> Floor {
        match self {
            Self::RunStarted { floor, .. }
            | Self::RunEnded { floor, .. }
            | Self::NeowOptionsGenerated { floor, .. }
            | Self::NeowChosen { floor, .. }
            | Self::ActEntered { floor, .. }
            | Self::MapGenerated { floor, .. }
            | Self::EncountersGenerated { floor, .. }
            | Self::FloorEntered { floor, .. }
            | Self::UnknownRoomResolved { floor, .. }
            | Self::CombatStarted { floor, .. }
            | Self::CombatResolved { floor, .. }
            | Self::EventSelected { floor, .. }
            | Self::RewardsGenerated { floor, .. }
            | Self::RewardTaken { floor, .. }
            | Self::CardPicked { floor, .. }
            | Self::CardsSkipped { floor }
            | Self::ShopGenerated { floor, .. }
            | Self::ItemPurchased { floor, .. }
            | Self::CardPurged { floor, .. }
            | Self::TreasureOpened { floor, .. }
            | Self::BossRelicsOffered { floor, .. }
            | Self::BossRelicChosen { floor, .. }
            | Self::Rested { floor, .. }
            | Self::Smithed { floor }
            | Self::KeyObtained { floor, .. } => *floor,
        }
    }

    /// The part of the engine that produced the event.
    pub fn source(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } | Self::RunEnded { .. } | Self::ActEntered { .. } => "orchestrator",
            Self::NeowOptionsGenerated { .. } | Self::NeowChosen { .. } => "neow",
            Self::MapGenerated { .. } | Self::FloorEntered { .. } => "map",
            Self::EncountersGenerated { .. }
            | Self::CombatStarted { .. }
            | Self::CombatResolved { .. } => "encounters",
            Self::UnknownRoomResolved { .. } | Self::EventSelected { .. } => "events",
            Self::RewardsGenerated { .. }
            | Self::RewardTaken { .. }
            | Self::CardPicked { .. }
            | Self::CardsSkipped { .. } => "rewards",
            Self::ShopGenerated { .. } | Self::ItemPurchased { .. } | Self::CardPurged { .. } => "shop",
            Self::TreasureOpened { .. } | Self::BossRelicsOffered { .. } | Self::BossRelicChosen { .. } => "treasure",
            Self::Rested { .. } | Self::Smithed { .. } | Self::KeyObtained { .. } => "rest",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub run_id: RunId,
    pub floor: Floor,
    pub source: String,
    pub event_type: String,
    pub payload: String, // JSON-serialized GenEvent
}
