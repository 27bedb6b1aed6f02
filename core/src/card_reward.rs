//! Card reward generation and the per-run card pools.
//!
//! RULES:
//!   - Rarity rolls are `card.random_int(99) + blizzard offset`, one per slot.
//!   - Only combat rewards move the blizzard offset. Shop rolls read it.
//!   - A card already in the offer is re-drawn from the same rarity pool.
//!   - The upgrade roll is drawn only for non-rare slots.

use crate::{
    config::{CardDef, GameData},
    error::{SimError, SimResult},
    rng::StreamRng,
    types::{CardRarity, CardType, CharacterClass, RoomKind},
};
use serde::{Deserialize, Serialize};

pub const BLIZZARD_START: i32 = 5;
pub const BLIZZARD_GROWTH: i32 = 1;
pub const BLIZZARD_FLOOR: i32 = -40;
pub const BASE_REWARD_SIZE: usize = 3;

/// Pity offset added to every card rarity roll. Falls with each common,
/// resets on a rare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardBlizzard {
    pub offset: i32,
}

impl Default for CardBlizzard {
    fn default() -> Self {
        Self { offset: BLIZZARD_START }
    }
}

impl CardBlizzard {
    pub fn new(offset: i32) -> Self {
        Self { offset }
    }

    fn record(&mut self, rarity: CardRarity) {
        match rarity {
            CardRarity::Rare   => self.offset = BLIZZARD_START,
            CardRarity::Common => self.offset = (self.offset - BLIZZARD_GROWTH).max(BLIZZARD_FLOOR),
            _ => {}
        }
    }
}

/// (rare, uncommon) thresholds of a room's rarity table.
pub fn rarity_thresholds(room: RoomKind) -> (i32, i32) {
    match room {
        RoomKind::Elite => (10, 40),
        RoomKind::Shop  => (9, 37),
        _               => (3, 37),
    }
}

/// Map an offset roll to a rarity for `room`. Boss rooms are always rare.
pub fn rarity_for_roll(roll: i32, room: RoomKind) -> CardRarity {
    if room == RoomKind::Boss {
        return CardRarity::Rare;
    }
    let (rare, uncommon) = rarity_thresholds(room);
    if roll < rare {
        CardRarity::Rare
    } else if roll >= rare + uncommon {
        CardRarity::Common
    } else {
        CardRarity::Uncommon
    }
}

/// One card draw of the rarity roll. Does not touch the blizzard.
pub fn roll_rarity(rng: &mut StreamRng, blizzard: &CardBlizzard, room: RoomKind) -> CardRarity {
    let roll = rng.random_int(99) + blizzard.offset;
    rarity_for_roll(roll, room)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardCard {
    pub id:        String,
    pub rarity:    CardRarity,
    pub card_type: CardType,
    pub upgraded:  bool,
}

impl RewardCard {
    fn from_def(def: &CardDef) -> Self {
        Self { id: def.id.clone(), rarity: def.rarity, card_type: def.card_type, upgraded: false }
    }
}

/// The run's card pools, in table order.
#[derive(Debug, Clone)]
pub struct CardPools {
    pub common:    Vec<CardDef>,
    pub uncommon:  Vec<CardDef>,
    pub rare:      Vec<CardDef>,
    pub colorless: Vec<CardDef>,
    pub curses:    Vec<String>,
}

impl CardPools {
    pub fn for_character(data: &GameData, class: CharacterClass) -> anyhow::Result<Self> {
        let cards = &data.character(class)?.cards;
        let of = |rarity: CardRarity| -> Vec<CardDef> {
            cards.iter().filter(|c| c.rarity == rarity).cloned().collect()
        };
        Ok(Self {
            common:    of(CardRarity::Common),
            uncommon:  of(CardRarity::Uncommon),
            rare:      of(CardRarity::Rare),
            colorless: data.colorless.clone(),
            curses:    data.curses.clone(),
        })
    }

    pub fn pool(&self, rarity: CardRarity) -> &[CardDef] {
        match rarity {
            CardRarity::Common   => &self.common,
            CardRarity::Uncommon => &self.uncommon,
            CardRarity::Rare     => &self.rare,
            _                    => &[],
        }
    }

    /// `pool[rng.random_int(len - 1)]`.
    pub fn draw(&self, rarity: CardRarity, rng: &mut StreamRng) -> SimResult<RewardCard> {
        pick_from(self.pool(rarity), rng, || format!("{rarity:?} cards"))
    }

    /// Draw from the id-sorted subset of `rarity` with type `card_type`.
    /// Empty power pools spill common → uncommon → rare.
    pub fn draw_typed(
        &self,
        rarity: CardRarity,
        card_type: CardType,
        rng: &mut StreamRng,
    ) -> SimResult<RewardCard> {
        let mut subset: Vec<CardDef> = self
            .pool(rarity)
            .iter()
            .filter(|c| c.card_type == card_type)
            .cloned()
            .collect();
        if subset.is_empty() {
            return match (card_type, rarity) {
                (CardType::Power, CardRarity::Common)   => self.draw_typed(CardRarity::Uncommon, card_type, rng),
                (CardType::Power, CardRarity::Uncommon) => self.draw_typed(CardRarity::Rare, card_type, rng),
                _ => Err(SimError::PoolExhausted { pool: format!("{rarity:?} {card_type:?} cards") }),
            };
        }
        subset.sort_by(|a, b| a.id.cmp(&b.id));
        pick_from(&subset, rng, || format!("{rarity:?} {card_type:?} cards"))
    }

    /// Draw from the id-sorted colorless cards of `rarity`.
    pub fn draw_colorless(&self, rarity: CardRarity, rng: &mut StreamRng) -> SimResult<RewardCard> {
        let mut subset: Vec<CardDef> =
            self.colorless.iter().filter(|c| c.rarity == rarity).cloned().collect();
        subset.sort_by(|a, b| a.id.cmp(&b.id));
        pick_from(&subset, rng, || format!("colorless {rarity:?} cards"))
    }

    pub fn draw_curse(&self, rng: &mut StreamRng) -> SimResult<String> {
        if self.curses.is_empty() {
            return Err(SimError::PoolExhausted { pool: "curses".into() });
        }
        let i = rng.random_int(self.curses.len() as i32 - 1) as usize;
        Ok(self.curses[i].clone())
    }
}

fn pick_from(
    pool: &[CardDef],
    rng: &mut StreamRng,
    label: impl FnOnce() -> String,
) -> SimResult<RewardCard> {
    if pool.is_empty() {
        return Err(SimError::PoolExhausted { pool: label() });
    }
    let i = rng.random_int(pool.len() as i32 - 1) as usize;
    Ok(RewardCard::from_def(&pool[i]))
}

/// Inputs of one combat card reward.
#[derive(Debug, Clone, Copy)]
pub struct CardRewardContext<'a> {
    pub room:           RoomKind,
    pub upgrade_chance: f32,
    pub relics:         &'a [String],
}

impl CardRewardContext<'_> {
    fn has(&self, relic: &str) -> bool {
        self.relics.iter().any(|r| r == relic)
    }

    pub fn card_count(&self) -> usize {
        let mut n = BASE_REWARD_SIZE;
        if self.has("Question Card") {
            n += 1;
        }
        if self.has("Busted Crown") {
            n = n.saturating_sub(2);
        }
        n
    }
}

fn egg_upgrades(ctx: &CardRewardContext<'_>, card_type: CardType) -> bool {
    match card_type {
        CardType::Attack => ctx.has("Molten Egg 2"),
        CardType::Skill  => ctx.has("Toxic Egg 2"),
        CardType::Power  => ctx.has("Frozen Egg 2"),
        _ => false,
    }
}

/// Generate a card reward. Moves `blizzard` as the rarities come out.
pub fn generate_card_reward(
    pools: &CardPools,
    ctx: &CardRewardContext<'_>,
    blizzard: &mut CardBlizzard,
    rng: &mut StreamRng,
) -> SimResult<Vec<RewardCard>> {
    let counter_before = rng.counter();
    let mut offer: Vec<RewardCard> = Vec::new();
    for _ in 0..ctx.card_count() {
        let rarity = roll_rarity(rng, blizzard, ctx.room);
        blizzard.record(rarity);
        let distinct = pools.pool(rarity).len();
        if offer.iter().filter(|c| c.rarity == rarity).count() >= distinct {
            return Err(SimError::PoolExhausted { pool: format!("{rarity:?} cards") });
        }
        let mut card = pools.draw(rarity, rng)?;
        while offer.iter().any(|c| c.id == card.id) {
            card = pools.draw(rarity, rng)?;
        }
        offer.push(card);
    }

    for card in offer.iter_mut() {
        if card.rarity != CardRarity::Rare && rng.random_boolean_chance(ctx.upgrade_chance) {
            card.upgraded = true;
        } else if egg_upgrades(ctx, card.card_type) {
            card.upgraded = true;
        }
    }

    log::debug!(
        "card reward: {:?} blizzard={} card draws {} -> {}",
        offer.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
        blizzard.offset,
        counter_before,
        rng.counter()
    );
    Ok(offer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rarity_tables() {
        assert_eq!(rarity_for_roll(2, RoomKind::Monster), CardRarity::Rare);
        assert_eq!(rarity_for_roll(3, RoomKind::Monster), CardRarity::Uncommon);
        assert_eq!(rarity_for_roll(40, RoomKind::Monster), CardRarity::Common);
        assert_eq!(rarity_for_roll(9, RoomKind::Elite), CardRarity::Rare);
        assert_eq!(rarity_for_roll(49, RoomKind::Elite), CardRarity::Uncommon);
        assert_eq!(rarity_for_roll(50, RoomKind::Elite), CardRarity::Common);
        assert_eq!(rarity_for_roll(104, RoomKind::Boss), CardRarity::Rare);
    }

    #[test]
    fn blizzard_moves_and_clamps() {
        let mut b = CardBlizzard::default();
        b.record(CardRarity::Common);
        assert_eq!(b.offset, 4);
        b.record(CardRarity::Uncommon);
        assert_eq!(b.offset, 4);
        for _ in 0..100 {
            b.record(CardRarity::Common);
        }
        assert_eq!(b.offset, BLIZZARD_FLOOR);
        b.record(CardRarity::Rare);
        assert_eq!(b.offset, BLIZZARD_START);
    }
}
