//! Unknown-room resolution and event selection, both on the event stream.

use crate::{
    config::{ActData, EventCondition, EventTables},
    error::{SimError, SimResult},
    rng::StreamRng,
    types::{Act, Floor, RoomKind},
};
use serde::{Deserialize, Serialize};

const MONSTER_BASE: f32 = 0.1;
const SHOP_BASE: f32 = 0.03;
const TREASURE_BASE: f32 = 0.02;
const SHRINE_CHANCE: f32 = 0.25;
const TINY_CHEST_PERIOD: u32 = 4;

/// Running odds that a `?` room turns into something other than an event.
/// Reset at every act.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnknownRoomOdds {
    pub monster:  f32,
    pub shop:     f32,
    pub treasure: f32,
    /// Tiny Chest progress; every fourth `?` room is forced to treasure.
    pub tiny_chest_counter: u32,
}

impl Default for UnknownRoomOdds {
    fn default() -> Self {
        Self { monster: MONSTER_BASE, shop: SHOP_BASE, treasure: TREASURE_BASE, tiny_chest_counter: 0 }
    }
}

impl UnknownRoomOdds {
    pub fn reset(&mut self) {
        let counter = self.tiny_chest_counter;
        *self = Self { tiny_chest_counter: counter, ..Self::default() };
    }

    /// Lay the current odds out over 100 slots. Whatever the odds leave
    /// uncovered is an event.
    fn slots(&self) -> [RoomKind; 100] {
        let mut slots = [RoomKind::Event; 100];
        let mut fill = 0usize;
        for (kind, chance) in [
            (RoomKind::Monster, self.monster),
            (RoomKind::Shop, self.shop),
            (RoomKind::Treasure, self.treasure),
        ] {
            let size = (chance * 100.0) as usize;
            let start = fill.min(99);
            let end = (fill + size).min(100);
            if start < end {
                slots[start..end].fill(kind);
            }
            fill += size;
        }
        slots
    }

    /// One float draw picks the room; the odds then move.
    pub fn resolve(&mut self, relics: &[String], rng: &mut StreamRng) -> RoomKind {
        let roll = rng.random_float();
        let has = |name: &str| relics.iter().any(|r| r == name);

        let mut forced_chest = false;
        if has("Tiny Chest") {
            self.tiny_chest_counter += 1;
            if self.tiny_chest_counter == TINY_CHEST_PERIOD {
                self.tiny_chest_counter = 0;
                forced_chest = true;
            }
        }

        let mut choice = if forced_chest {
            RoomKind::Treasure
        } else {
            let index = ((roll * 100.0) as usize).min(99);
            self.slots()[index]
        };

        if choice == RoomKind::Monster {
            if has("Juzu Bracelet") {
                choice = RoomKind::Event;
            }
            self.monster = MONSTER_BASE;
        } else {
            self.monster += MONSTER_BASE;
        }
        if choice == RoomKind::Shop {
            self.shop = SHOP_BASE;
        } else {
            self.shop += SHOP_BASE;
        }
        if choice == RoomKind::Treasure {
            self.treasure = TREASURE_BASE;
        } else {
            self.treasure += TREASURE_BASE;
        }
        log::debug!("unknown room: roll {roll:.4} -> {choice:?}");
        choice
    }
}

/// Run state the event gates read when a `?` room becomes an event.
#[derive(Debug, Clone, Copy)]
pub struct EventContext<'a> {
    pub floor:     Floor,
    pub act:       Act,
    pub gold:      i32,
    pub hp:        i32,
    pub max_hp:    i32,
    pub relics:    &'a [String],
    pub has_curse: bool,
    /// Row of the current node, if any.
    pub map_row:   Option<usize>,
    pub map_rows:  usize,
}

impl EventContext<'_> {
    pub fn allows(&self, condition: Option<&EventCondition>) -> bool {
        let Some(c) = condition else {
            return true;
        };
        let has = |relic: &str| self.relics.iter().any(|r| r == relic);
        c.min_floor.is_none_or(|f| self.floor >= f)
            && (c.acts.is_empty() || c.acts.contains(&self.act))
            && c.min_gold.is_none_or(|g| self.gold >= g)
            && c.min_hp.is_none_or(|h| self.hp >= h)
            && c.min_relics.is_none_or(|n| self.relics.len() >= n)
            && (!c.needs_curse || self.has_curse)
            && (!c.past_half_map || self.map_row.is_some_and(|y| y > self.map_rows / 2))
            && c.low_hp_unless_relic.as_deref().is_none_or(|relic| {
                has(relic) || self.hp as f32 / self.max_hp.max(1) as f32 <= 0.5
            })
    }

    fn eligible<'e>(&self, names: impl Iterator<Item = &'e String>, tables: &EventTables) -> Vec<String> {
        names.filter(|e| self.allows(tables.condition(e))).cloned().collect()
    }
}

/// Remaining events. Act events and shrines refill per act; one-time
/// events last the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPools {
    pub events:   Vec<String>,
    pub shrines:  Vec<String>,
    pub one_time: Vec<String>,
}

impl EventPools {
    pub fn new(tables: &EventTables, act: &ActData) -> Self {
        Self {
            events:   act.events.clone(),
            shrines:  tables.shrines.clone(),
            one_time: tables.one_time.clone(),
        }
    }

    /// New act: refill act events and shrines, keep one-time leftovers.
    pub fn enter_act(&mut self, tables: &EventTables, act: &ActData) {
        self.events = act.events.clone();
        self.shrines = tables.shrines.clone();
    }

    /// Shrines plus every one-time event whose gate passes.
    fn take_shrine(
        &mut self,
        tables: &EventTables,
        ctx: &EventContext<'_>,
        rng: &mut StreamRng,
    ) -> Option<String> {
        let candidates = ctx.eligible(self.shrines.iter().chain(self.one_time.iter()), tables);
        if candidates.is_empty() {
            return None;
        }
        let pick = candidates[rng.random_int(candidates.len() as i32 - 1) as usize].clone();
        self.shrines.retain(|e| *e != pick);
        self.one_time.retain(|e| *e != pick);
        Some(pick)
    }

    /// Index draw over the act events whose gate passes; shrines when
    /// none do.
    fn take_event(
        &mut self,
        tables: &EventTables,
        ctx: &EventContext<'_>,
        rng: &mut StreamRng,
    ) -> Option<String> {
        let candidates = ctx.eligible(self.events.iter(), tables);
        if candidates.is_empty() {
            return self.take_shrine(tables, ctx, rng);
        }
        let pick = candidates[rng.random_int(candidates.len() as i32 - 1) as usize].clone();
        self.events.retain(|e| *e != pick);
        Some(pick)
    }

    /// Shrine-chance draw, then an index draw from the gated list.
    pub fn pick_event(
        &mut self,
        tables: &EventTables,
        ctx: &EventContext<'_>,
        rng: &mut StreamRng,
    ) -> SimResult<String> {
        let shrine = rng.random_float_scaled(1.0) < SHRINE_CHANCE;
        let picked = if shrine && (!self.shrines.is_empty() || !self.one_time.is_empty()) {
            match self.take_shrine(tables, ctx, rng) {
                Some(event) => Some(event),
                None => self.take_event(tables, ctx, rng),
            }
        } else {
            self.take_event(tables, ctx, rng)
        };
        if let Some(event) = &picked {
            log::debug!("floor={} events: picked {event}", ctx.floor);
        }
        picked.ok_or_else(|| SimError::PoolExhausted { pool: "events".into() })
    }
}
