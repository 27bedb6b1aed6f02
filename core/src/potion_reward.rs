//! Potion drops and random potions, all on the potion stream.

use crate::{
    config::{GameData, PotionDef},
    error::{SimError, SimResult},
    rng::StreamRng,
    types::{CharacterClass, PotionRarity, RoomKind},
};
use serde::{Deserialize, Serialize};

pub const BASE_DROP_CHANCE: i32 = 40;
pub const BLIZZARD_STEP: i32 = 10;
pub const MAX_REWARDS_FOR_DROP: usize = 4;
const LIMITED_EXCLUDED: &str = "Fruit Juice";

/// Pity modifier on the potion drop chance. Misses raise it, drops lower it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotionBlizzard {
    pub modifier: i32,
}

/// The class-filtered potion list: class potions first, then shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PotionPool {
    potions: Vec<PotionDef>,
}

impl PotionPool {
    pub fn for_character(data: &GameData, class: CharacterClass) -> Self {
        let (mut own, shared): (Vec<PotionDef>, Vec<PotionDef>) = data
            .potions
            .iter()
            .filter(|p| p.class.is_none_or(|c| c == class))
            .cloned()
            .partition(|p| p.class.is_some());
        own.extend(shared);
        Self { potions: own }
    }

    pub fn len(&self) -> usize {
        self.potions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.potions.is_empty()
    }

    fn draw(&self, rng: &mut StreamRng) -> &PotionDef {
        let i = rng.random_int(self.potions.len() as i32 - 1) as usize;
        &self.potions[i]
    }

    /// One index draw, any rarity.
    pub fn draw_any(&self, rng: &mut StreamRng) -> SimResult<String> {
        if self.potions.is_empty() {
            return Err(SimError::PoolExhausted { pool: "potions".into() });
        }
        Ok(self.draw(rng).id.clone())
    }

    pub fn rarity_of(&self, id: &str) -> Option<PotionRarity> {
        self.potions.iter().find(|p| p.id == id).map(|p| p.rarity)
    }
}

/// Rarity roll `random_range(0, 99)`: 65 common, 25 uncommon, 10 rare.
pub fn roll_potion_rarity(rng: &mut StreamRng) -> PotionRarity {
    let roll = rng.random_range(0, 99);
    if roll < 65 {
        PotionRarity::Common
    } else if roll < 90 {
        PotionRarity::Uncommon
    } else {
        PotionRarity::Rare
    }
}

/// Draw potions until one of `rarity` comes out. `limited` forbids
/// Fruit Juice and always costs at least one redraw.
pub fn random_potion_of(
    pool: &PotionPool,
    rarity: PotionRarity,
    limited: bool,
    rng: &mut StreamRng,
) -> SimResult<String> {
    if !pool.potions.iter().any(|p| p.rarity == rarity && !(limited && p.id == LIMITED_EXCLUDED)) {
        return Err(SimError::PoolExhausted { pool: format!("{rarity:?} potions") });
    }
    let mut potion = pool.draw(rng);
    let mut spam_check = limited;
    while potion.rarity != rarity || spam_check {
        spam_check = limited;
        potion = pool.draw(rng);
        if potion.id != LIMITED_EXCLUDED {
            spam_check = false;
        }
    }
    Ok(potion.id.clone())
}

/// A rarity roll followed by pool draws.
pub fn random_potion(pool: &PotionPool, limited: bool, rng: &mut StreamRng) -> SimResult<String> {
    let rarity = roll_potion_rarity(rng);
    random_potion_of(pool, rarity, limited, rng)
}

/// Drop chance of a room before the roll.
pub fn drop_chance(
    room: RoomKind,
    blizzard: &PotionBlizzard,
    relics: &[String],
    rewards_so_far: usize,
) -> i32 {
    let mut chance = match room {
        RoomKind::Monster | RoomKind::Elite | RoomKind::Boss | RoomKind::Event => {
            BASE_DROP_CHANCE + blizzard.modifier
        }
        _ => 0,
    };
    if relics.iter().any(|r| r == "White Beast Statue") {
        chance = 100;
    }
    if rewards_so_far >= MAX_REWARDS_FOR_DROP {
        chance = 0;
    }
    chance
}

/// Roll the drop and, on a hit, the potion. The drop roll is always drawn.
pub fn roll_potion_drop(
    pool: &PotionPool,
    room: RoomKind,
    blizzard: &mut PotionBlizzard,
    relics: &[String],
    rewards_so_far: usize,
    rng: &mut StreamRng,
) -> SimResult<Option<String>> {
    let chance = drop_chance(room, blizzard, relics, rewards_so_far);
    let roll = rng.random_range(0, 99);
    if roll >= chance {
        blizzard.modifier += BLIZZARD_STEP;
        log::debug!("potion: roll {roll} >= {chance}, no drop");
        return Ok(None);
    }
    let potion = random_potion(pool, false, rng)?;
    blizzard.modifier -= BLIZZARD_STEP;
    log::debug!("potion: roll {roll} < {chance}, dropped {potion}");
    Ok(Some(potion))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chance_overrides() {
        let b = PotionBlizzard { modifier: -10 };
        assert_eq!(drop_chance(RoomKind::Monster, &b, &[], 1), 30);
        assert_eq!(drop_chance(RoomKind::Treasure, &b, &[], 1), 0);
        let statue = vec!["White Beast Statue".to_string()];
        assert_eq!(drop_chance(RoomKind::Monster, &b, &statue, 1), 100);
        assert_eq!(drop_chance(RoomKind::Monster, &b, &statue, 4), 0);
    }
}
