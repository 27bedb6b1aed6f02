//! Merchant inventory.
//!
//! DRAW ORDER (fixed):
//!   1. card: rarity roll + typed draw for attack, attack, skill, skill,
//!      power; then colorless uncommon and rare
//!   2. merchant: card prices, then the sale slot
//!   3. merchant + relic pools: relic tier rolls, back pops, relic prices
//!   4. potion + merchant: three random potions, each priced on draw
//!
//! Ascension and relic discounts are applied last, as whole-shop
//! multipliers rounded half-up.

use crate::{
    card_reward::{roll_rarity, CardBlizzard, CardPools, RewardCard},
    config::FallbackPolicy,
    error::SimResult,
    potion_reward::{random_potion, PotionPool},
    relic_reward::{roll_shop_relic_tier, PoolEnd, RelicPools, SpawnContext},
    rng::StreamRng,
    types::{round_half_up, Ascension, CardRarity, CardType, PotionRarity, RelicTier, RoomKind},
};
use serde::{Deserialize, Serialize};

pub const BASE_PURGE_COST: i32 = 75;
pub const PURGE_COST_STEP: i32 = 25;
pub const SMILING_MASK_PURGE_COST: i32 = 50;
const SALE_SLOTS: i32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopItem<T> {
    pub item:  T,
    pub price: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopInventory {
    pub cards:      Vec<ShopItem<RewardCard>>,
    pub colorless:  Vec<ShopItem<RewardCard>>,
    pub relics:     Vec<ShopItem<String>>,
    pub potions:    Vec<ShopItem<String>>,
    pub purge_cost: i32,
    /// Index into `cards` of the half-price card.
    pub sale_index: usize,
}

/// Streams a shop visit draws from, borrowed for one call.
pub struct ShopStreams<'a> {
    pub card:     &'a mut StreamRng,
    pub merchant: &'a mut StreamRng,
    pub potion:   &'a mut StreamRng,
}

#[derive(Debug, Clone, Copy)]
pub struct ShopContext<'a> {
    pub ascension:   Ascension,
    pub blizzard:    CardBlizzard,
    pub purge_count: u32,
    pub spawn:       SpawnContext<'a>,
}

impl ShopContext<'_> {
    fn has(&self, relic: &str) -> bool {
        self.spawn.owned.iter().any(|r| r == relic)
    }
}

pub fn card_base_price(rarity: CardRarity) -> f32 {
    match rarity {
        CardRarity::Uncommon => 75.0,
        CardRarity::Rare     => 150.0,
        _                    => 50.0,
    }
}

pub fn relic_base_price(tier: RelicTier) -> f32 {
    match tier {
        RelicTier::Uncommon => 250.0,
        RelicTier::Rare | RelicTier::Starter => 300.0,
        RelicTier::Special => 400.0,
        RelicTier::Boss => 999.0,
        RelicTier::Common | RelicTier::Shop => 150.0,
    }
}

pub fn potion_base_price(rarity: PotionRarity) -> f32 {
    match rarity {
        PotionRarity::Common   => 50.0,
        PotionRarity::Uncommon => 75.0,
        PotionRarity::Rare     => 100.0,
    }
}

/// Removal price before discounts. Never drawn.
pub fn purge_cost(purge_count: u32, relics: &[String]) -> i32 {
    if relics.iter().any(|r| r == "Smiling Mask") {
        SMILING_MASK_PURGE_COST
    } else {
        BASE_PURGE_COST + PURGE_COST_STEP * purge_count as i32
    }
}

fn colored_card(
    pools: &CardPools,
    card_type: CardType,
    blizzard: &CardBlizzard,
    rng: &mut StreamRng,
) -> SimResult<RewardCard> {
    let rarity = roll_rarity(rng, blizzard, RoomKind::Shop);
    pools.draw_typed(rarity, card_type, rng)
}

/// Typed draw that re-rolls rarity and card while the id repeats `previous`.
fn colored_card_unlike(
    pools: &CardPools,
    card_type: CardType,
    previous: &str,
    blizzard: &CardBlizzard,
    rng: &mut StreamRng,
) -> SimResult<RewardCard> {
    let mut card = colored_card(pools, card_type, blizzard, rng)?;
    while card.id == previous {
        card = colored_card(pools, card_type, blizzard, rng)?;
    }
    Ok(card)
}

fn discount<T>(items: &mut [ShopItem<T>], multiplier: f32) {
    for entry in items.iter_mut() {
        entry.price = round_half_up(entry.price as f32 * multiplier);
    }
}

pub fn generate_shop(
    card_pools: &CardPools,
    potion_pool: &PotionPool,
    relic_pools: &mut RelicPools,
    ctx: &ShopContext<'_>,
    policy: &FallbackPolicy,
    streams: ShopStreams<'_>,
) -> SimResult<ShopInventory> {
    let ShopStreams { card, merchant, potion } = streams;
    let blizzard = &ctx.blizzard;

    // ── Cards ──────────────────────────────────────────────────────
    let attack1 = colored_card(card_pools, CardType::Attack, blizzard, card)?;
    let attack2 = colored_card_unlike(card_pools, CardType::Attack, &attack1.id, blizzard, card)?;
    let skill1 = colored_card(card_pools, CardType::Skill, blizzard, card)?;
    let skill2 = colored_card_unlike(card_pools, CardType::Skill, &skill1.id, blizzard, card)?;
    let power = colored_card(card_pools, CardType::Power, blizzard, card)?;
    let colorless_uncommon = card_pools.draw_colorless(CardRarity::Uncommon, card)?;
    let colorless_rare = card_pools.draw_colorless(CardRarity::Rare, card)?;

    let mut cards: Vec<ShopItem<RewardCard>> = [attack1, attack2, skill1, skill2, power]
        .into_iter()
        .map(|c| {
            let price = (card_base_price(c.rarity) * merchant.random_float_range(0.9, 1.1)) as i32;
            ShopItem { item: c, price }
        })
        .collect();
    let mut colorless: Vec<ShopItem<RewardCard>> = [colorless_uncommon, colorless_rare]
        .into_iter()
        .map(|c| {
            let mut price = card_base_price(c.rarity) * merchant.random_float_range(0.9, 1.1);
            price *= 1.2;
            ShopItem { item: c, price: price as i32 }
        })
        .collect();
    let sale_index = merchant.random_range(0, SALE_SLOTS - 1) as usize;
    cards[sale_index].price /= 2;

    // ── Relics ─────────────────────────────────────────────────────
    let mut relics = Vec::with_capacity(3);
    for slot in 0..3 {
        let tier = if slot == 2 { RelicTier::Shop } else { roll_shop_relic_tier(merchant) };
        let relic = relic_pools.take(tier, PoolEnd::Back, &ctx.spawn, policy)?;
        let base = relic_base_price(relic_pools.tier_of(&relic));
        let price = round_half_up(base * merchant.random_float_range(0.95, 1.05));
        relics.push(ShopItem { item: relic, price });
    }

    // ── Potions ────────────────────────────────────────────────────
    let mut potions = Vec::with_capacity(3);
    for _ in 0..3 {
        let id = random_potion(potion_pool, false, potion)?;
        let rarity = potion_pool.rarity_of(&id).unwrap_or(PotionRarity::Common);
        let price = round_half_up(potion_base_price(rarity) * merchant.random_float_range(0.95, 1.05));
        potions.push(ShopItem { item: id, price });
    }

    let mut purge = purge_cost(ctx.purge_count, ctx.spawn.owned);

    // ── Discounts ──────────────────────────────────────────────────
    let mut apply = |multiplier: f32, affects_purge: bool| {
        discount(&mut relics, multiplier);
        discount(&mut potions, multiplier);
        discount(&mut cards, multiplier);
        discount(&mut colorless, multiplier);
        if affects_purge {
            purge = round_half_up(purge as f32 * multiplier);
        }
    };
    if ctx.ascension >= 16 {
        apply(1.1, false);
    }
    if ctx.has("The Courier") {
        apply(0.8, true);
    }
    if ctx.has("Membership Card") {
        apply(0.5, true);
    }

    log::debug!(
        "floor={} shop: relics {:?}, merchant counter {}",
        ctx.spawn.floor,
        relics.iter().map(|r| r.item.as_str()).collect::<Vec<_>>(),
        merchant.counter()
    );

    Ok(ShopInventory { cards, colorless, relics, potions, purge_cost: purge, sale_index })
}
