//! Content tables and run configuration.
//!
//! RULE: table order is draw order. Pools are indexed by stream draws, so
//! reordering an entry in a data file changes every prediction after it.
//! The data files are the single place to correct an ordering.

use crate::types::{
    Act, Ascension, Floor, CardRarity, CardType, CharacterClass, PotionRarity, RelicTier,
};
use crate::seed::SeedMaterial;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Cards ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDef {
    pub id:        String,
    pub rarity:    CardRarity,
    pub card_type: CardType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterData {
    pub class:         CharacterClass,
    pub max_hp:        i32,
    pub starting_gold: i32,
    pub starter_relic: String,
    pub starter_deck:  Vec<String>,
    pub cards:         Vec<CardDef>,
}

#[derive(Debug, Clone, Deserialize)]
struct CharactersFile {
    characters:      Vec<CharacterData>,
    colorless:       Vec<CardDef>,
    curses:          Vec<String>,
    ascension_curse: String,
}

// ── Relics ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelicDef {
    pub id:   String,
    pub tier: RelicTier,
    /// Class-restricted relics only enter that class's pools.
    #[serde(default)]
    pub class: Option<CharacterClass>,
    /// Last act in which the relic may spawn.
    #[serde(default)]
    pub max_act: Option<Act>,
    /// Last floor on which the relic may spawn.
    #[serde(default)]
    pub max_floor: Option<u32>,
    /// Relic that must be owned for this one to spawn.
    #[serde(default)]
    pub requires: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RelicsFile {
    relics: Vec<RelicDef>,
}

// ── Potions ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotionDef {
    pub id:     String,
    pub rarity: PotionRarity,
    #[serde(default)]
    pub class:  Option<CharacterClass>,
}

#[derive(Debug, Clone, Deserialize)]
struct PotionsFile {
    potions: Vec<PotionDef>,
}

// ── Acts ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterWeight {
    pub name:   String,
    pub weight: f32,
}

/// Base room-type budget of a generated map, as fractions of its rooms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoomChances {
    pub shop:     f32,
    pub rest:     f32,
    pub treasure: f32,
    pub event:    f32,
    pub elite:    f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActData {
    pub act:          Act,
    pub name:         String,
    pub weak_count:   usize,
    pub strong_count: usize,
    pub elite_count:  usize,
    pub weak:         Vec<MonsterWeight>,
    pub strong:       Vec<MonsterWeight>,
    pub elites:       Vec<MonsterWeight>,
    /// Strong encounters forbidden right after a given weak encounter.
    pub exclusions:   BTreeMap<String, Vec<String>>,
    /// Fixed queues used instead of weighted rolls (the final act).
    #[serde(default)]
    pub fixed_encounters: Vec<String>,
    #[serde(default)]
    pub fixed_elites: Vec<String>,
    pub bosses:           Vec<String>,
    pub events:           Vec<String>,
    pub room_chances:     RoomChances,
    pub upgrade_chance:   f32,
    pub upgrade_chance_a12: f32,
}

impl ActData {
    pub fn upgrade_chance_for(&self, ascension: Ascension) -> f32 {
        if ascension >= 12 { self.upgrade_chance_a12 } else { self.upgrade_chance }
    }

    pub fn is_fixed(&self) -> bool {
        !self.fixed_encounters.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ActsFile {
    acts: Vec<ActData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTables {
    pub shrines:  Vec<String>,
    pub one_time: Vec<String>,
    /// Gates keyed by event name. Events without an entry are always
    /// eligible.
    #[serde(default)]
    pub conditions: BTreeMap<String, EventCondition>,
}

impl EventTables {
    pub fn condition(&self, event: &str) -> Option<&EventCondition> {
        self.conditions.get(event)
    }
}

/// Every set field must hold for the event to enter the draw list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventCondition {
    pub min_floor:     Option<Floor>,
    /// Empty means any act.
    pub acts:          Vec<Act>,
    pub min_gold:      Option<i32>,
    pub min_hp:        Option<i32>,
    pub min_relics:    Option<usize>,
    pub needs_curse:   bool,
    /// Current map row strictly past the middle row.
    pub past_half_map: bool,
    /// At most half HP, unless this relic is held.
    pub low_hp_unless_relic: Option<String>,
}

// ── Fallbacks ──────────────────────────────────────────────────────

/// Where an exhausted relic pool spills to, and what is handed out when
/// every pool on the chain is empty. `None` as a terminal relic makes
/// exhaustion an error instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackPolicy {
    pub spill:         BTreeMap<RelicTier, RelicTier>,
    pub terminal:      Option<String>,
    pub boss_terminal: Option<String>,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        let mut spill = BTreeMap::new();
        spill.insert(RelicTier::Common,   RelicTier::Uncommon);
        spill.insert(RelicTier::Uncommon, RelicTier::Rare);
        spill.insert(RelicTier::Shop,     RelicTier::Uncommon);
        Self {
            spill,
            terminal:      Some("Circlet".to_string()),
            boss_terminal: Some("Red Circlet".to_string()),
        }
    }
}

// ── GameData ───────────────────────────────────────────────────────

/// Every content table the generators read.
#[derive(Debug, Clone)]
pub struct GameData {
    pub characters:      BTreeMap<CharacterClass, CharacterData>,
    pub colorless:       Vec<CardDef>,
    pub curses:          Vec<String>,
    pub ascension_curse: String,
    pub relics:          Vec<RelicDef>,
    pub potions:         Vec<PotionDef>,
    pub acts:            Vec<ActData>,
    pub events:          EventTables,
    pub fallback:        FallbackPolicy,
}

impl GameData {
    /// Load all content tables from JSON files in `data_dir`.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let read = |file: &str| -> anyhow::Result<String> {
            let path = format!("{data_dir}/{file}");
            std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))
        };
        Self::from_sources(
            &read("characters.json")?,
            &read("relics.json")?,
            &read("potions.json")?,
            &read("acts.json")?,
            &read("events.json")?,
        )
    }

    /// The tables compiled into the crate. Used by tests and the
    /// prediction surface when no data directory is given.
    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_sources(
            include_str!("../../data/characters.json"),
            include_str!("../../data/relics.json"),
            include_str!("../../data/potions.json"),
            include_str!("../../data/acts.json"),
            include_str!("../../data/events.json"),
        )
    }

    fn from_sources(
        characters: &str,
        relics: &str,
        potions: &str,
        acts: &str,
        events: &str,
    ) -> anyhow::Result<Self> {
        let chars: CharactersFile = serde_json::from_str(characters)
            .map_err(|e| anyhow::anyhow!("characters.json: {e}"))?;
        let relics: RelicsFile = serde_json::from_str(relics)
            .map_err(|e| anyhow::anyhow!("relics.json: {e}"))?;
        let potions: PotionsFile = serde_json::from_str(potions)
            .map_err(|e| anyhow::anyhow!("potions.json: {e}"))?;
        let mut acts: ActsFile = serde_json::from_str(acts)
            .map_err(|e| anyhow::anyhow!("acts.json: {e}"))?;
        let events: EventTables = serde_json::from_str(events)
            .map_err(|e| anyhow::anyhow!("events.json: {e}"))?;

        acts.acts.sort_by_key(|a| a.act);
        for (i, act) in acts.acts.iter().enumerate() {
            if act.act as usize != i + 1 {
                anyhow::bail!("acts.json: acts must be numbered 1..=n, found {}", act.act);
            }
            if act.bosses.is_empty() {
                anyhow::bail!("acts.json: act {} has no bosses", act.act);
            }
        }

        Ok(Self {
            characters: chars
                .characters
                .into_iter()
                .map(|c| (c.class, c))
                .collect(),
            colorless:       chars.colorless,
            curses:          chars.curses,
            ascension_curse: chars.ascension_curse,
            relics:          relics.relics,
            potions:         potions.potions,
            acts:            acts.acts,
            events,
            fallback:        FallbackPolicy::default(),
        })
    }

    pub fn character(&self, class: CharacterClass) -> anyhow::Result<&CharacterData> {
        self.characters
            .get(&class)
            .ok_or_else(|| anyhow::anyhow!("No character data for {class}"))
    }

    /// Act table, or `None` for an act the data does not define.
    pub fn act(&self, act: Act) -> Option<&ActData> {
        self.acts.get((act as usize).checked_sub(1)?)
    }
}

/// Everything that identifies one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub seed:      SeedMaterial,
    pub ascension: Ascension,
    pub character: CharacterClass,
    /// Whether keys and the fourth act are in play.
    pub final_act: bool,
}

impl RunConfig {
    pub fn new(seed: impl Into<SeedMaterial>, ascension: Ascension, character: CharacterClass) -> Self {
        Self { seed: seed.into(), ascension, character, final_act: false }
    }

    pub fn with_final_act(mut self, final_act: bool) -> Self {
        self.final_act = final_act;
        self
    }

    /// Fixed configuration used by tests: a known seed, ascension 0, Ironclad.
    pub fn default_test() -> Self {
        Self::new(SeedMaterial::Numeric(42), 0, CharacterClass::Ironclad)
    }
}
