//! Relic pools and relic reward generation.
//!
//! The five tier pools are built and shuffled once per run, in the order
//! common, uncommon, rare, shop, boss; each shuffle costs one relic-stream
//! draw. After that relics are popped, never drawn: rewards take from the
//! front, shops from the back.
//!
//! RULE: a relic that fails its spawn gate is discarded and the pop retried
//! from the opposite end of the same tier.

use crate::{
    config::{FallbackPolicy, GameData, RelicDef},
    error::{SimError, SimResult},
    rng::StreamRng,
    types::{Act, CharacterClass, Floor, RelicTier},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const POOL_ORDER: [RelicTier; 5] = [
    RelicTier::Common,
    RelicTier::Uncommon,
    RelicTier::Rare,
    RelicTier::Shop,
    RelicTier::Boss,
];

pub const BOSS_CHOICES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolEnd {
    Front,
    Back,
}

impl PoolEnd {
    fn flip(self) -> Self {
        match self {
            Self::Front => Self::Back,
            Self::Back  => Self::Front,
        }
    }
}

/// What a spawn gate needs to know about the run.
#[derive(Debug, Clone, Copy)]
pub struct SpawnContext<'a> {
    pub act:   Act,
    pub floor: Floor,
    pub owned: &'a [String],
}

impl SpawnContext<'_> {
    fn allows(&self, def: Option<&RelicDef>) -> bool {
        let Some(def) = def else { return true };
        if def.max_act.is_some_and(|max| self.act > max) {
            return false;
        }
        if def.max_floor.is_some_and(|max| self.floor > max) {
            return false;
        }
        if let Some(required) = &def.requires {
            return self.owned.iter().any(|r| r == required);
        }
        true
    }
}

/// The shuffled per-tier relic pools of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelicPools {
    pools: BTreeMap<RelicTier, Vec<String>>,
    #[serde(skip)]
    defs:  BTreeMap<String, RelicDef>,
}

impl RelicPools {
    /// Shared plus class relics per tier, minus anything already owned,
    /// each tier shuffled off one relic-stream draw.
    pub fn initialize(
        data: &GameData,
        class: CharacterClass,
        owned: &[String],
        rng: &mut StreamRng,
    ) -> Self {
        let mut pools = BTreeMap::new();
        for tier in POOL_ORDER {
            let mut pool: Vec<String> = data
                .relics
                .iter()
                .filter(|r| r.tier == tier)
                .filter(|r| r.class.is_none_or(|c| c == class))
                .filter(|r| !owned.contains(&r.id))
                .map(|r| r.id.clone())
                .collect();
            rng.shuffle_seeded(&mut pool);
            pools.insert(tier, pool);
        }
        let defs = data.relics.iter().map(|r| (r.id.clone(), r.clone())).collect();
        log::debug!("relic pools: shuffled, relic counter {}", rng.counter());
        Self { pools, defs }
    }

    /// Pools restored from a snapshot need the catalog re-attached for
    /// spawn gates.
    pub fn with_catalog(mut self, data: &GameData) -> Self {
        self.defs = data.relics.iter().map(|r| (r.id.clone(), r.clone())).collect();
        self
    }

    /// Pools as read back from a save, in their saved order.
    pub fn from_remaining(pools: BTreeMap<RelicTier, Vec<String>>, data: &GameData) -> Self {
        Self { pools, defs: BTreeMap::new() }.with_catalog(data)
    }

    pub fn remaining(&self, tier: RelicTier) -> &[String] {
        self.pools.get(&tier).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Catalog tier of a relic. Unknown ids read as `Special`.
    pub fn tier_of(&self, relic: &str) -> RelicTier {
        self.defs.get(relic).map_or(RelicTier::Special, |d| d.tier)
    }

    /// Drop a relic from every pool, e.g. after it was obtained elsewhere.
    pub fn remove(&mut self, relic: &str) {
        for pool in self.pools.values_mut() {
            pool.retain(|r| r != relic);
        }
    }

    fn pop(&mut self, tier: RelicTier, end: PoolEnd) -> Option<String> {
        let pool = self.pools.get_mut(&tier)?;
        if pool.is_empty() {
            return None;
        }
        Some(match end {
            PoolEnd::Front => pool.remove(0),
            PoolEnd::Back  => pool.remove(pool.len() - 1),
        })
    }

    /// Pop a relic of `tier`, spilling down the fallback chain when a pool
    /// is empty and switching ends when a spawn gate rejects.
    pub fn take(
        &mut self,
        tier: RelicTier,
        end: PoolEnd,
        ctx: &SpawnContext<'_>,
        policy: &FallbackPolicy,
    ) -> SimResult<String> {
        let mut end = end;
        loop {
            let relic = self.pop_with_fallback(tier, end, policy)?;
            let terminal = policy.terminal.as_deref() == Some(relic.as_str())
                || policy.boss_terminal.as_deref() == Some(relic.as_str());
            if terminal || ctx.allows(self.defs.get(&relic)) {
                return Ok(relic);
            }
            log::debug!("floor={} relic: {relic} cannot spawn, retrying other end", ctx.floor);
            end = end.flip();
        }
    }

    fn pop_with_fallback(
        &mut self,
        tier: RelicTier,
        end: PoolEnd,
        policy: &FallbackPolicy,
    ) -> SimResult<String> {
        let mut current = tier;
        loop {
            if let Some(relic) = self.pop(current, end) {
                return Ok(relic);
            }
            match policy.spill.get(&current) {
                Some(next) => {
                    log::warn!("relic: {current:?} pool empty, spilling to {next:?}");
                    current = *next;
                }
                None => {
                    let terminal = if current == RelicTier::Boss {
                        &policy.boss_terminal
                    } else {
                        &policy.terminal
                    };
                    return terminal.clone().ok_or_else(|| SimError::PoolExhausted {
                        pool: format!("{current:?} relics"),
                    });
                }
            }
        }
    }

    /// Three boss relics from the front of the boss pool. No draws.
    pub fn boss_choices(
        &mut self,
        ctx: &SpawnContext<'_>,
        policy: &FallbackPolicy,
    ) -> SimResult<Vec<String>> {
        (0..BOSS_CHOICES)
            .map(|_| self.take(RelicTier::Boss, PoolEnd::Front, ctx, policy))
            .collect()
    }
}

/// Elite and event relic tier: `relic.random_range(0, 99)`,
/// under 50 common, under 83 uncommon, otherwise rare.
pub fn roll_relic_tier(rng: &mut StreamRng) -> RelicTier {
    let roll = rng.random_range(0, 99);
    if roll < 50 {
        RelicTier::Common
    } else if roll < 83 {
        RelicTier::Uncommon
    } else {
        RelicTier::Rare
    }
}

/// Shop relic tier: `merchant.random_int(99)`, under 48 common,
/// under 82 uncommon, otherwise rare.
pub fn roll_shop_relic_tier(rng: &mut StreamRng) -> RelicTier {
    let roll = rng.random_int(99);
    if roll < 48 {
        RelicTier::Common
    } else if roll < 82 {
        RelicTier::Uncommon
    } else {
        RelicTier::Rare
    }
}

/// One tier roll then a front pop.
pub fn generate_relic_reward(
    pools: &mut RelicPools,
    ctx: &SpawnContext<'_>,
    policy: &FallbackPolicy,
    rng: &mut StreamRng,
) -> SimResult<String> {
    let tier = roll_relic_tier(rng);
    let relic = pools.take(tier, PoolEnd::Front, ctx, policy)?;
    log::debug!("floor={} relic: {tier:?} -> {relic}", ctx.floor);
    Ok(relic)
}
