//! Shared primitive types used across the entire engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Floor number. Floor 0 is Neow; act 1 rooms start at floor 1.
pub type Floor = u32;

/// Act number, 1-based.
pub type Act = u8;

/// Difficulty level, 0..=20.
pub type Ascension = u8;

/// The canonical run identifier.
pub type RunId = String;

pub const MAX_ASCENSION: Ascension = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterClass {
    Ironclad,
    Silent,
    Defect,
    Watcher,
}

impl CharacterClass {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ironclad => "ironclad",
            Self::Silent   => "silent",
            Self::Defect   => "defect",
            Self::Watcher  => "watcher",
        }
    }

    /// Max HP lost at ascension 14+.
    pub fn ascension_hp_penalty(&self) -> i32 {
        match self {
            Self::Ironclad => 5,
            Self::Silent | Self::Defect | Self::Watcher => 4,
        }
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CharacterClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ironclad" => Ok(Self::Ironclad),
            "silent"   => Ok(Self::Silent),
            "defect"   => Ok(Self::Defect),
            "watcher"  => Ok(Self::Watcher),
            other      => Err(format!("unknown character class '{other}'")),
        }
    }
}

/// Room tag on a map node, or the kind of room the player is standing in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    Monster,
    Elite,
    Boss,
    Event,
    Shop,
    Rest,
    Treasure,
    BossTreasure,
}

impl RoomKind {
    pub fn symbol(&self) -> char {
        match self {
            Self::Monster      => 'M',
            Self::Elite        => 'E',
            Self::Boss         => 'B',
            Self::Event        => '?',
            Self::Shop         => '$',
            Self::Rest         => 'R',
            Self::Treasure     => 'T',
            Self::BossTreasure => 'T',
        }
    }

    pub fn is_combat(&self) -> bool {
        matches!(self, Self::Monster | Self::Elite | Self::Boss)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardRarity {
    Basic,
    Common,
    Uncommon,
    Rare,
    Special,
    Curse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    Attack,
    Skill,
    Power,
    Status,
    Curse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelicTier {
    Starter,
    Common,
    Uncommon,
    Rare,
    Shop,
    Boss,
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PotionRarity {
    Common,
    Uncommon,
    Rare,
}

/// Half-up rounding of a single-precision value, as the reference's
/// `Math.round(float)` does.
pub fn round_half_up(value: f32) -> i32 {
    (value + 0.5).floor() as i32
}
