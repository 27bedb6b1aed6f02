//! The floor-0 blessing.
//!
//! Options come from a throwaway stream seeded with the run seed, so they
//! never move a registry counter. Choosing an option may draw from that
//! stream again (cards, curses) or from the registry's relic and potion
//! streams.

use crate::{
    card_reward::{CardPools, RewardCard},
    error::SimResult,
    rng::StreamRng,
    types::CardRarity,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NeowReward {
    ThreeCards,
    OneRandomRareCard,
    RemoveCard,
    UpgradeCard,
    TransformCard,
    RandomColorless,
    ThreeSmallPotions,
    RandomCommonRelic,
    TenPercentHpBonus,
    ThreeEnemyKill,
    HundredGold,
    RandomColorless2,
    RemoveTwo,
    OneRareRelic,
    ThreeRareCards,
    TwoFiftyGold,
    TransformTwoCards,
    TwentyPercentHpBonus,
    BossRelic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NeowDrawback {
    None,
    TenPercentHpLoss,
    NoGold,
    Curse,
    PercentDamage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeowOption {
    pub category: u8,
    pub reward:   NeowReward,
    pub drawback: NeowDrawback,
}

const DRAWBACKS: [NeowDrawback; 4] = [
    NeowDrawback::TenPercentHpLoss,
    NeowDrawback::NoGold,
    NeowDrawback::Curse,
    NeowDrawback::PercentDamage,
];

fn reward_options(category: u8, drawback: NeowDrawback) -> Vec<NeowReward> {
    use NeowReward::*;
    match category {
        0 => vec![ThreeCards, OneRandomRareCard, RemoveCard, UpgradeCard, TransformCard, RandomColorless],
        1 => vec![ThreeSmallPotions, RandomCommonRelic, TenPercentHpBonus, ThreeEnemyKill, HundredGold],
        2 => {
            let mut out = vec![RandomColorless2];
            if drawback != NeowDrawback::Curse {
                out.push(RemoveTwo);
            }
            out.push(OneRareRelic);
            out.push(ThreeRareCards);
            if drawback != NeowDrawback::NoGold {
                out.push(TwoFiftyGold);
            }
            out.push(TransformTwoCards);
            if drawback != NeowDrawback::TenPercentHpLoss {
                out.push(TwentyPercentHpBonus);
            }
            out
        }
        _ => vec![BossRelic],
    }
}

fn pick<T: Copy>(options: &[T], rng: &mut StreamRng) -> T {
    options[rng.random_range(0, options.len() as i32 - 1) as usize]
}

/// The four blessing options, one per category. Category 2 draws its
/// drawback before its reward.
pub fn generate_options(neow: &mut StreamRng) -> Vec<NeowOption> {
    (0..4u8)
        .map(|category| {
            let drawback = if category == 2 { pick(&DRAWBACKS, neow) } else { NeowDrawback::None };
            let reward = pick(&reward_options(category, drawback), neow);
            NeowOption { category, reward, drawback }
        })
        .collect()
}

/// Three distinct cards for a card blessing. Non-rare slots are uncommon
/// on a 0.33 boolean draw, common otherwise.
pub fn blessing_cards(pools: &CardPools, rare_only: bool, neow: &mut StreamRng) -> SimResult<Vec<RewardCard>> {
    let mut out: Vec<RewardCard> = Vec::with_capacity(3);
    for _ in 0..3 {
        let rarity = if rare_only {
            CardRarity::Rare
        } else if neow.random_boolean_chance(0.33) {
            CardRarity::Uncommon
        } else {
            CardRarity::Common
        };
        let mut card = pools.draw(rarity, neow)?;
        while out.iter().any(|c| c.id == card.id) {
            card = pools.draw(rarity, neow)?;
        }
        out.push(card);
    }
    Ok(out)
}

/// Three distinct colorless cards; rare on a 0.33 boolean draw unless
/// `rare_only`.
pub fn blessing_colorless(pools: &CardPools, rare_only: bool, neow: &mut StreamRng) -> SimResult<Vec<RewardCard>> {
    let mut out: Vec<RewardCard> = Vec::with_capacity(3);
    for _ in 0..3 {
        let rarity = if rare_only || neow.random_boolean_chance(0.33) {
            CardRarity::Rare
        } else {
            CardRarity::Uncommon
        };
        let mut card = pools.draw_colorless(rarity, neow)?;
        while out.iter().any(|c| c.id == card.id) {
            card = pools.draw_colorless(rarity, neow)?;
        }
        out.push(card);
    }
    Ok(out)
}

/// Max-HP bonus of the small HP blessing; the large one is twice this.
pub fn hp_bonus(max_hp: i32) -> i32 {
    (max_hp as f32 * 0.1) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_two_respects_drawback() {
        let opts = reward_options(2, NeowDrawback::NoGold);
        assert!(!opts.contains(&NeowReward::TwoFiftyGold));
        assert!(opts.contains(&NeowReward::RemoveTwo));
        let opts = reward_options(2, NeowDrawback::Curse);
        assert!(!opts.contains(&NeowReward::RemoveTwo));
    }

    #[test]
    fn one_option_per_category() {
        let mut rng = StreamRng::new(1234);
        let opts = generate_options(&mut rng);
        assert_eq!(opts.len(), 4);
        assert_eq!(opts[3].reward, NeowReward::BossRelic);
        assert_ne!(opts[2].drawback, NeowDrawback::None);
        assert_eq!(rng.counter(), 5);
    }
}
