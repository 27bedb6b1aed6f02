//! Post-combat reward screen.
//!
//! DRAW ORDER (fixed):
//!   1. gold: treasure stream (misc stream for bosses)
//!   2. elite relics: relic stream, one tier roll per relic
//!   3. potion drop: potion stream
//!   4. card rewards: card stream
//!
//! The emerald key, when earned, sits between the relics and the potion
//! and counts toward the potion's reward cap.

use crate::{
    card_reward::{generate_card_reward, CardPools, CardRewardContext, RewardCard},
    config::FallbackPolicy,
    error::SimResult,
    potion_reward::{roll_potion_drop, PotionPool},
    registry::{RngRegistry, StreamName},
    relic_reward::{generate_relic_reward, RelicPools, SpawnContext},
    run_state::RunState,
    types::{round_half_up, RoomKind},
};
use serde::{Deserialize, Serialize};

pub const BOSS_GOLD_BASE: i32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewardItem {
    Gold { amount: i32 },
    Relic { id: String },
    Potion { id: String },
    Cards { cards: Vec<RewardCard> },
    EmeraldKey,
}

/// Content tables a combat reward reads.
#[derive(Clone, Copy)]
pub struct RewardTables<'a> {
    pub cards:   &'a CardPools,
    pub potions: &'a PotionPool,
    pub policy:  &'a FallbackPolicy,
}

fn combat_gold(room: RoomKind, state: &RunState, registry: &mut RngRegistry) -> i32 {
    match room {
        RoomKind::Boss => {
            let base = BOSS_GOLD_BASE + registry.stream_mut(StreamName::Misc).random_range(-5, 5);
            if state.ascension >= 13 {
                round_half_up(base as f32 * 0.75)
            } else {
                base
            }
        }
        RoomKind::Elite => registry.stream_mut(StreamName::Treasure).random_range(25, 35),
        _ => registry.stream_mut(StreamName::Treasure).random_range(10, 20),
    }
}

/// Generate the reward screen for a won fight in `room`. Moves the card and
/// potion blizzards on `state`; nothing is granted until the player takes it.
pub fn generate_combat_rewards(
    room: RoomKind,
    upgrade_chance: f32,
    burning_elite: bool,
    state: &mut RunState,
    relic_pools: &mut RelicPools,
    tables: RewardTables<'_>,
    registry: &mut RngRegistry,
) -> SimResult<Vec<RewardItem>> {
    let mut rewards = Vec::new();

    // ── Gold ───────────────────────────────────────────────────────
    // Rolled even under Ectoplasm.
    let amount = combat_gold(room, state, registry);
    if !state.has_relic("Ectoplasm") {
        rewards.push(RewardItem::Gold { amount });
    }

    // ── Relics ─────────────────────────────────────────────────────
    if room == RoomKind::Elite {
        let relic_count = if state.has_relic("Black Star") { 2 } else { 1 };
        for _ in 0..relic_count {
            let ctx = SpawnContext { act: state.act, floor: state.floor, owned: &state.relics };
            let id = generate_relic_reward(
                relic_pools,
                &ctx,
                tables.policy,
                registry.stream_mut(StreamName::Relic),
            )?;
            rewards.push(RewardItem::Relic { id });
        }
        if burning_elite && !state.keys.emerald {
            rewards.push(RewardItem::EmeraldKey);
        }
    }

    // ── Potion ─────────────────────────────────────────────────────
    let potion = roll_potion_drop(
        tables.potions,
        room,
        &mut state.potion_blizzard,
        &state.relics,
        rewards.len(),
        registry.stream_mut(StreamName::Potion),
    )?;
    if let Some(id) = potion {
        rewards.push(RewardItem::Potion { id });
    }

    // ── Cards ──────────────────────────────────────────────────────
    let ctx = CardRewardContext { room, upgrade_chance, relics: &state.relics };
    let card_rewards = if room == RoomKind::Monster && state.has_relic("Prayer Wheel") { 2 } else { 1 };
    for _ in 0..card_rewards {
        let cards = generate_card_reward(
            tables.cards,
            &ctx,
            &mut state.card_blizzard,
            registry.stream_mut(StreamName::Card),
        )?;
        if !cards.is_empty() {
            rewards.push(RewardItem::Cards { cards });
        }
    }

    log::debug!("floor={} rewards: {} items after {room:?}", state.floor, rewards.len());
    Ok(rewards)
}
