//! The RNG registry: every stream for one run, with its lifecycle rules.
//!
//! Stream classes:
//!   - Persistent: card, monster, event, relic, treasure, potion, merchant.
//!     Seeded once from the run seed.
//!   - Per-floor: monster_hp, ai, shuffle, card_random, misc.
//!     Recreated from (seed + floor) on every floor entry.
//!   - Per-act: map. Recreated from (seed + act offset) on every act entry.
//!
//! RULE: generators borrow a stream for one call and never keep it.
//! Cloning the registry is the only way to branch a prediction.

use crate::{
    error::{SimError, SimResult},
    rng::StreamRng,
    types::{Act, Ascension, Floor},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Canonical stream identifiers.
/// NEVER reorder: the discriminant indexes the registry's stream table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(usize)]
pub enum StreamName {
    Card       = 0,
    Monster    = 1,
    Event      = 2,
    Relic      = 3,
    Treasure   = 4,
    Potion     = 5,
    Merchant   = 6,
    MonsterHp  = 7,
    Ai         = 8,
    Shuffle    = 9,
    CardRandom = 10,
    Misc       = 11,
    Map        = 12,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamClass {
    Persistent,
    PerFloor,
    PerAct,
}

impl StreamName {
    pub const ALL: [StreamName; 13] = [
        Self::Card, Self::Monster, Self::Event, Self::Relic, Self::Treasure,
        Self::Potion, Self::Merchant, Self::MonsterHp, Self::Ai, Self::Shuffle,
        Self::CardRandom, Self::Misc, Self::Map,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Card       => "card",
            Self::Monster    => "monster",
            Self::Event      => "event",
            Self::Relic      => "relic",
            Self::Treasure   => "treasure",
            Self::Potion     => "potion",
            Self::Merchant   => "merchant",
            Self::MonsterHp  => "monster_hp",
            Self::Ai         => "ai",
            Self::Shuffle    => "shuffle",
            Self::CardRandom => "card_random",
            Self::Misc       => "misc",
            Self::Map        => "map",
        }
    }

    pub fn class(&self) -> StreamClass {
        match self {
            Self::Card | Self::Monster | Self::Event | Self::Relic
            | Self::Treasure | Self::Potion | Self::Merchant => StreamClass::Persistent,
            Self::MonsterHp | Self::Ai | Self::Shuffle
            | Self::CardRandom | Self::Misc => StreamClass::PerFloor,
            Self::Map => StreamClass::PerAct,
        }
    }
}

impl FromStr for StreamName {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|n| n.name() == s)
            .ok_or_else(|| SimError::UnknownStream { name: s.to_string() })
    }
}

/// Counter value of every stream, keyed by name.
pub type StreamCounters = BTreeMap<StreamName, u32>;

/// Seed offset of the map stream for an act.
pub fn map_seed_offset(act: Act) -> SimResult<i64> {
    match act {
        1 => Ok(1),
        2 => Ok(2 * 100),
        3 => Ok(3 * 200),
        4 => Ok(4 * 300),
        _ => Err(SimError::InvalidAct { act }),
    }
}

/// Card-stream checkpoint applied at act transitions.
pub fn snapped_card_counter(counter: u32) -> u32 {
    match counter {
        1..=249   => 250,
        251..=499 => 500,
        501..=749 => 750,
        other     => other,
    }
}

#[derive(Debug, Clone)]
pub struct RngRegistry {
    seed:      i64,
    ascension: Ascension,
    act:       Act,
    floor:     Floor,
    streams:   Vec<StreamRng>,
}

impl RngRegistry {
    /// All streams for a fresh run. Per-floor streams start at floor 0,
    /// the map stream at act 1.
    pub fn create_run(seed: i64, ascension: Ascension) -> Self {
        let streams = StreamName::ALL
            .iter()
            .map(|name| {
                let stream_seed = match name.class() {
                    StreamClass::Persistent | StreamClass::PerFloor => seed,
                    StreamClass::PerAct => seed.wrapping_add(1),
                };
                StreamRng::new(stream_seed).with_name(name.name())
            })
            .collect();
        Self { seed, ascension, act: 1, floor: 0, streams }
    }

    /// Rebuild every stream at exact counters, e.g. from a decoded save.
    /// Streams missing from `counters` start at zero.
    pub fn restore(
        seed: i64,
        ascension: Ascension,
        act: Act,
        floor: Floor,
        counters: &StreamCounters,
    ) -> SimResult<Self> {
        let map_seed = seed.wrapping_add(map_seed_offset(act)?);
        let streams = StreamName::ALL
            .iter()
            .map(|name| {
                let stream_seed = match name.class() {
                    StreamClass::Persistent => seed,
                    StreamClass::PerFloor   => seed.wrapping_add(floor as i64),
                    StreamClass::PerAct     => map_seed,
                };
                let counter = counters.get(name).copied().unwrap_or(0);
                StreamRng::with_counter(stream_seed, counter).with_name(name.name())
            })
            .collect();
        Ok(Self { seed, ascension, act, floor, streams })
    }

    pub fn seed(&self) -> i64 { self.seed }
    pub fn ascension(&self) -> Ascension { self.ascension }
    pub fn act(&self) -> Act { self.act }
    pub fn floor(&self) -> Floor { self.floor }

    pub fn stream(&self, name: StreamName) -> &StreamRng {
        &self.streams[name as usize]
    }

    pub fn stream_mut(&mut self, name: StreamName) -> &mut StreamRng {
        &mut self.streams[name as usize]
    }

    /// Several distinct streams at once, e.g. for a shop visit.
    pub fn streams_mut<const N: usize>(
        &mut self,
        names: [StreamName; N],
    ) -> SimResult<[&mut StreamRng; N]> {
        self.streams
            .get_disjoint_mut(names.map(|n| n as usize))
            .map_err(|_| SimError::UnknownStream { name: format!("overlapping request {names:?}") })
    }

    /// Look up a stream by its canonical string name.
    pub fn stream_by_name(&self, name: &str) -> SimResult<&StreamRng> {
        let key: StreamName = name.parse()?;
        Ok(self.stream(key))
    }

    pub fn counter(&self, name: StreamName) -> u32 {
        self.stream(name).counter()
    }

    pub fn counters(&self) -> StreamCounters {
        StreamName::ALL.iter().map(|n| (*n, self.counter(*n))).collect()
    }

    /// Recreate all per-floor streams from (seed + floor).
    pub fn enter_floor(&mut self, floor: Floor) {
        let floor_seed = self.seed.wrapping_add(floor as i64);
        for name in StreamName::ALL {
            if name.class() == StreamClass::PerFloor {
                self.streams[name as usize] = StreamRng::new(floor_seed).with_name(name.name());
            }
        }
        self.floor = floor;
        log::debug!("floor={floor} registry: per-floor streams reseeded");
    }

    /// Recreate the map stream from (seed + act offset).
    pub fn enter_act(&mut self, act: Act) -> SimResult<()> {
        let map_seed = self.seed.wrapping_add(map_seed_offset(act)?);
        self.streams[StreamName::Map as usize] =
            StreamRng::new(map_seed).with_name(StreamName::Map.name());
        self.act = act;
        Ok(())
    }

    /// Apply the card-stream checkpoint. Returns (before, after).
    pub fn snap_card_counter(&mut self) -> (u32, u32) {
        let card = self.stream_mut(StreamName::Card);
        let before = card.counter();
        let after = snapped_card_counter(before);
        card.set_counter(after);
        (before, after)
    }

    /// Full act transition: snap the card stream, then reseed the map.
    /// Call after all generation for the outgoing act is finished.
    pub fn transition_to_act(&mut self, act: Act) -> SimResult<(u32, u32)> {
        map_seed_offset(act)?;
        let snap = self.snap_card_counter();
        self.enter_act(act)?;
        log::info!(
            "act={act} registry: card counter snapped {} -> {}",
            snap.0, snap.1
        );
        Ok(snap)
    }
}
