//! Snapshot serialization: full run state to/from JSON.
//!
//! A snapshot is taken whenever a run enters a new act. It captures every
//! stream counter plus the pools and queues the generators consume, so a
//! run can continue from it without replaying from floor 0.
//!
//! RULE: streams are restored by counter. Every counted draw costs exactly
//! one primitive call, so a stream rebuilt at counter N continues exactly
//! where the live one stood. The map stream is the exception (its room
//! shuffle is uncounted); it is never drawn again before the next act
//! reseeds it.

use crate::{
    card_reward::{CardBlizzard, CardPools},
    config::{GameData, RunConfig},
    encounter_generator::EncounterQueues,
    error::{SimError, SimResult},
    event_generator::{EventPools, UnknownRoomOdds},
    map_generator::{self, Coord, MapGraph},
    orchestrator::{Action, Phase, RunOrchestrator, ACTION_SCHEMA_VERSION},
    potion_reward::{PotionBlizzard, PotionPool},
    registry::{map_seed_offset, RngRegistry, StreamCounters},
    relic_reward::RelicPools,
    rng::StreamRng,
    run_state::{DeckCard, Keys, RunState},
    seed::SeedMaterial,
    types::{Act, Ascension, CharacterClass, Floor, RelicTier, RunId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub schema_version: u32,
    pub run_id:         RunId,
    pub config:         RunConfig,
    pub seed:           i64,
    pub counters:       StreamCounters,
    pub neow_counter:   u32,
    pub state:          RunState,
    pub relic_pools:    RelicPools,
    pub event_pools:    EventPools,
    pub encounters:     EncounterQueues,
    pub map:            MapGraph,
    pub phase:          Phase,
    /// Actions taken before the snapshot, for audit and replay.
    pub actions:        Vec<Action>,
}

/// The fields a decoded game save provides. Decoding the save file itself
/// happens outside the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveState {
    pub seed:       i64,
    pub ascension:  Ascension,
    pub character:  CharacterClass,
    #[serde(default)]
    pub final_act:  bool,
    pub act:        Act,
    pub floor:      Floor,
    pub counters:   StreamCounters,

    pub hp:         i32,
    pub max_hp:     i32,
    pub gold:       i32,
    pub deck:       Vec<DeckCard>,
    pub relics:     Vec<String>,
    pub potions:    Vec<String>,
    pub potion_slots: usize,
    #[serde(default)]
    pub keys:       Keys,
    pub card_blizzard:   CardBlizzard,
    pub potion_blizzard: PotionBlizzard,
    #[serde(default)]
    pub unknown_odds:    UnknownRoomOdds,
    pub purge_count:     u32,

    /// Remaining queues, next encounter first.
    pub monster_list: Vec<String>,
    pub elite_list:   Vec<String>,
    pub boss_list:    Vec<String>,
    pub relic_pools:  BTreeMap<RelicTier, Vec<String>>,
    pub event_list:   Vec<String>,
    pub shrine_list:  Vec<String>,
    pub one_time_event_list: Vec<String>,
    pub position:     Option<Coord>,
    #[serde(default)]
    pub encounter_history: Vec<String>,
}

impl RunOrchestrator {
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            schema_version: ACTION_SCHEMA_VERSION,
            run_id:         self.run_id.clone(),
            config:         self.config.clone(),
            seed:           self.seed,
            counters:       self.registry.counters(),
            neow_counter:   self.neow_rng.counter(),
            state:          self.state.clone(),
            relic_pools:    self.relic_pools.clone(),
            event_pools:    self.event_pools.clone(),
            encounters:     self.encounters.clone(),
            map:            self.map.clone(),
            phase:          self.phase.clone(),
            actions:        self.actions.clone(),
        }
    }

    /// Continue a run from a snapshot. The event log starts empty.
    pub fn resume(snapshot: RunSnapshot, data: GameData) -> SimResult<Self> {
        let RunSnapshot {
            run_id, config, seed, counters, neow_counter, state, relic_pools,
            event_pools, encounters, map, phase, actions, ..
        } = snapshot;

        let registry = RngRegistry::restore(seed, config.ascension, state.act, state.floor, &counters)?;
        let card_pools = CardPools::for_character(&data, config.character)?;
        let potion_pool = PotionPool::for_character(&data, config.character);
        log::info!(
            "floor={} orchestrator: resumed run {run_id} in act {}",
            state.floor, state.act
        );

        Ok(Self {
            run_id,
            seed,
            registry,
            neow_rng: StreamRng::with_counter(seed, neow_counter).with_name("neow"),
            state,
            card_pools,
            potion_pool,
            relic_pools: relic_pools.with_catalog(&data),
            event_pools,
            encounters,
            map,
            phase,
            actions,
            events: Vec::new(),
            persisted: 0,
            config,
            data,
        })
    }

    /// Start generating from a decoded game save. The act's map is rebuilt
    /// from a fresh map stream and the run waits on the map screen.
    pub fn from_save_state(run_id: RunId, save: SaveState, data: GameData) -> SimResult<Self> {
        let config = RunConfig::new(SeedMaterial::Numeric(save.seed), save.ascension, save.character)
            .with_final_act(save.final_act);
        let registry = RngRegistry::restore(save.seed, save.ascension, save.act, save.floor, &save.counters)?;
        let act = data.act(save.act).ok_or(SimError::InvalidAct { act: save.act })?;

        let mut map_rng = StreamRng::new(save.seed.wrapping_add(map_seed_offset(save.act)?));
        let map = map_generator::generate(save.act, save.ascension, &act.room_chances, save.final_act, &mut map_rng)?;

        let mut state = RunState::new(&data, &config)?;
        state.act = save.act;
        state.floor = save.floor;
        state.hp = save.hp;
        state.max_hp = save.max_hp;
        state.gold = save.gold;
        state.deck = save.deck;
        state.relics = save.relics;
        state.potions = save.potions;
        state.potion_slots = save.potion_slots;
        state.keys = save.keys;
        state.card_blizzard = save.card_blizzard;
        state.potion_blizzard = save.potion_blizzard;
        state.unknown_odds = save.unknown_odds;
        state.purge_count = save.purge_count;
        state.position = save.position;
        state.encounters = save.encounter_history;

        let encounters = EncounterQueues::from_lists(save.act, save.monster_list, save.elite_list, save.boss_list);
        let event_pools = EventPools {
            events:   save.event_list,
            shrines:  save.shrine_list,
            one_time: save.one_time_event_list,
        };
        let relic_pools = RelicPools::from_remaining(save.relic_pools, &data);
        let card_pools = CardPools::for_character(&data, config.character)?;
        let potion_pool = PotionPool::for_character(&data, config.character);

        log::info!(
            "floor={} orchestrator: loaded save for {} A{} act {}",
            save.floor, save.character, save.ascension, save.act
        );
        Ok(Self {
            run_id,
            seed: save.seed,
            registry,
            neow_rng: StreamRng::new(save.seed).with_name("neow"),
            state,
            card_pools,
            potion_pool,
            relic_pools,
            event_pools,
            encounters,
            map,
            phase: Phase::MapChoice,
            actions: Vec::new(),
            events: Vec::new(),
            persisted: 0,
            config,
            data,
        })
    }
}
