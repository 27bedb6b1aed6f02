//! Treasure chests. Every roll is on the treasure stream; the relic is
//! popped from the front of its pool.

use crate::{
    config::FallbackPolicy,
    error::SimResult,
    relic_reward::{PoolEnd, RelicPools, SpawnContext},
    rng::StreamRng,
    types::{round_half_up, RelicTier},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChestSize {
    Small,
    Medium,
    Large,
}

struct ChestTable {
    common:      i32,
    uncommon:    i32,
    gold_chance: i32,
    gold_amount: f32,
}

impl ChestSize {
    fn table(self) -> ChestTable {
        match self {
            Self::Small  => ChestTable { common: 75, uncommon: 25, gold_chance: 50, gold_amount: 25.0 },
            Self::Medium => ChestTable { common: 35, uncommon: 50, gold_chance: 35, gold_amount: 50.0 },
            Self::Large  => ChestTable { common: 0,  uncommon: 75, gold_chance: 50, gold_amount: 75.0 },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasureReward {
    pub size:  ChestSize,
    pub tier:  RelicTier,
    pub relic: String,
    pub gold:  Option<i32>,
}

pub fn roll_chest_size(rng: &mut StreamRng) -> ChestSize {
    let roll = rng.random_range(0, 99);
    if roll < 50 {
        ChestSize::Small
    } else if roll < 83 {
        ChestSize::Medium
    } else {
        ChestSize::Large
    }
}

/// A chest as rolled on room entry, before it is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChestRoll {
    pub size:     ChestSize,
    pub tier:     RelicTier,
    pub has_gold: bool,
}

/// Size roll, then one reward roll shared by the relic tier and the gold
/// chance.
pub fn roll_chest(rng: &mut StreamRng) -> ChestRoll {
    let size = roll_chest_size(rng);
    let table = size.table();
    let roll = rng.random_range(0, 99);
    let tier = if roll < table.common {
        RelicTier::Common
    } else if roll < table.common + table.uncommon {
        RelicTier::Uncommon
    } else {
        RelicTier::Rare
    };
    ChestRoll { size, tier, has_gold: roll < table.gold_chance }
}

/// Opening draws the gold amount, if any, then pops the relic.
pub fn open_chest(
    chest: ChestRoll,
    pools: &mut RelicPools,
    ctx: &SpawnContext<'_>,
    policy: &FallbackPolicy,
    rng: &mut StreamRng,
) -> SimResult<TreasureReward> {
    let table = chest.size.table();
    let gold = if chest.has_gold {
        let amount = rng.random_float_range(table.gold_amount * 0.9, table.gold_amount * 1.1);
        Some(round_half_up(amount))
    } else {
        None
    };
    let relic = pools.take(chest.tier, PoolEnd::Front, ctx, policy)?;
    log::debug!(
        "floor={} treasure: {:?} chest, {:?} {relic}, gold {gold:?}",
        ctx.floor, chest.size, chest.tier
    );
    Ok(TreasureReward { size: chest.size, tier: chest.tier, relic, gold })
}

/// Roll and open in one go.
pub fn generate_treasure(
    pools: &mut RelicPools,
    ctx: &SpawnContext<'_>,
    policy: &FallbackPolicy,
    rng: &mut StreamRng,
) -> SimResult<TreasureReward> {
    let chest = roll_chest(rng);
    open_chest(chest, pools, ctx, policy, rng)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chest_roll_uses_two_draws() {
        let mut rng = StreamRng::new(77);
        let chest = roll_chest(&mut rng);
        assert_eq!(rng.counter(), 2);
        if chest.size == ChestSize::Large {
            assert_ne!(chest.tier, RelicTier::Common);
        }
    }
}
