//! Player-side run state: HP, gold, deck, relics, potions and the pity
//! counters the generators read.
//!
//! RULE: generators read RunState as context; only the orchestrator
//! writes it.

use crate::{
    card_reward::{CardBlizzard, RewardCard},
    config::{GameData, RunConfig},
    event_generator::UnknownRoomOdds,
    map_generator::Coord,
    potion_reward::PotionBlizzard,
    types::{round_half_up, Act, Ascension, CharacterClass, Floor},
};
use serde::{Deserialize, Serialize};

pub const BASE_POTION_SLOTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckCard {
    pub id:       String,
    pub upgraded: bool,
}

/// Deck edits the engine records but does not resolve; the caller picks
/// the cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeckEdit {
    Remove { count: u8 },
    Upgrade { count: u8 },
    Transform { count: u8 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keys {
    pub ruby:     bool,
    pub emerald:  bool,
    pub sapphire: bool,
}

impl Keys {
    pub fn all(&self) -> bool {
        self.ruby && self.emerald && self.sapphire
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub character: CharacterClass,
    pub ascension: Ascension,
    pub final_act: bool,
    pub act:       Act,
    pub floor:     Floor,
    pub hp:        i32,
    pub max_hp:    i32,
    pub gold:      i32,
    pub deck:      Vec<DeckCard>,
    pub relics:    Vec<String>,
    pub potions:   Vec<String>,
    pub potion_slots: usize,
    pub keys:      Keys,

    pub card_blizzard:   CardBlizzard,
    pub potion_blizzard: PotionBlizzard,
    pub unknown_odds:    UnknownRoomOdds,
    pub purge_count:     u32,
    pub pending_edits:   Vec<DeckEdit>,

    /// Current map node; `None` before the first room of an act.
    pub position:   Option<Coord>,
    /// Every encounter fought, in order.
    pub encounters: Vec<String>,
}

impl RunState {
    /// Starting state for the configured character, with ascension
    /// modifiers applied.
    pub fn new(data: &GameData, config: &RunConfig) -> anyhow::Result<Self> {
        let character = data.character(config.character)?;
        let ascension = config.ascension;

        let mut max_hp = character.max_hp;
        if ascension >= 14 {
            max_hp -= config.character.ascension_hp_penalty();
        }
        let hp = if ascension >= 6 { round_half_up(max_hp as f32 * 0.9) } else { max_hp };

        let mut deck: Vec<DeckCard> = character
            .starter_deck
            .iter()
            .map(|id| DeckCard { id: id.clone(), upgraded: false })
            .collect();
        if ascension >= 10 {
            deck.push(DeckCard { id: data.ascension_curse.clone(), upgraded: false });
        }

        Ok(Self {
            character: config.character,
            ascension,
            final_act: config.final_act,
            act: 1,
            floor: 0,
            hp,
            max_hp,
            gold: character.starting_gold,
            deck,
            relics: vec![character.starter_relic.clone()],
            potions: Vec::new(),
            potion_slots: if ascension >= 11 { BASE_POTION_SLOTS - 1 } else { BASE_POTION_SLOTS },
            keys: Keys::default(),
            card_blizzard: CardBlizzard::default(),
            potion_blizzard: PotionBlizzard::default(),
            unknown_odds: UnknownRoomOdds::default(),
            purge_count: 0,
            pending_edits: Vec::new(),
            position: None,
            encounters: Vec::new(),
        })
    }

    pub fn has_relic(&self, id: &str) -> bool {
        self.relics.iter().any(|r| r == id)
    }

    pub fn add_relic(&mut self, id: &str) {
        self.relics.push(id.to_string());
        match id {
            "Potion Belt" => self.potion_slots += 2,
            "Strawberry"  => self.gain_max_hp(7),
            "Pear"        => self.gain_max_hp(10),
            "Mango"       => self.gain_max_hp(14),
            "Old Coin"    => self.gain_gold(300),
            _ => {}
        }
    }

    pub fn remove_relic(&mut self, id: &str) -> bool {
        match self.relics.iter().position(|r| r == id) {
            Some(i) => {
                self.relics.remove(i);
                true
            }
            None => false,
        }
    }

    /// Ectoplasm blocks all gold gain.
    pub fn gain_gold(&mut self, amount: i32) {
        if self.has_relic("Ectoplasm") {
            return;
        }
        self.gold += amount;
    }

    pub fn spend_gold(&mut self, amount: i32) -> bool {
        if amount > self.gold {
            return false;
        }
        self.gold -= amount;
        true
    }

    pub fn heal(&mut self, amount: i32) {
        self.hp = (self.hp + amount.max(0)).min(self.max_hp);
    }

    pub fn gain_max_hp(&mut self, amount: i32) {
        self.max_hp += amount;
        self.heal(amount);
    }

    pub fn lose_max_hp(&mut self, amount: i32) {
        self.max_hp = (self.max_hp - amount).max(1);
        self.hp = self.hp.min(self.max_hp);
    }

    /// Between acts: full heal, or 75% of missing HP from ascension 5.
    pub fn act_transition_heal(&mut self) {
        if self.ascension >= 5 {
            self.heal(round_half_up((self.max_hp - self.hp) as f32 * 0.75));
        } else {
            self.hp = self.max_hp;
        }
    }

    pub fn rest_heal_amount(&self) -> i32 {
        (self.max_hp as f32 * 0.3) as i32
    }

    pub fn add_card(&mut self, card: &RewardCard) {
        self.deck.push(DeckCard { id: card.id.clone(), upgraded: card.upgraded });
    }

    pub fn add_curse(&mut self, id: &str) {
        self.deck.push(DeckCard { id: id.to_string(), upgraded: false });
    }

    /// A curse from the random curse pool; Ascender's Bane and other
    /// fixed curses never count.
    pub fn has_removable_curse(&self, curses: &[String]) -> bool {
        self.deck.iter().any(|c| curses.contains(&c.id))
    }

    pub fn has_potion_slot(&self) -> bool {
        self.potions.len() < self.potion_slots
    }

    pub fn add_potion(&mut self, id: &str) -> bool {
        if !self.has_potion_slot() {
            return false;
        }
        self.potions.push(id.to_string());
        true
    }

    pub fn deck_ids(&self) -> Vec<String> {
        self.deck
            .iter()
            .map(|c| if c.upgraded { format!("{}+", c.id) } else { c.id.clone() })
            .collect()
    }
}
