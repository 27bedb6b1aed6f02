//! Parity: predicted floor state against what the game actually shows.
//!
//! A mismatch is a finding, not an error. Each one is classified with its
//! most likely cause and logged.

use crate::{
    orchestrator::RunOrchestrator,
    registry::{StreamCounters, StreamName},
    types::{Act, Floor},
};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// The comparable slice of a run at one floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorState {
    pub floor:    Floor,
    pub act:      Act,
    pub counters: StreamCounters,
    pub hp:       i32,
    pub max_hp:   i32,
    pub gold:     i32,
    pub deck:     Vec<String>,
    pub relics:   Vec<String>,
    pub potions:  Vec<String>,
    #[serde(default)]
    pub last_encounter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum MismatchCause {
    /// A stream made a different number of draws than predicted.
    RngStreamDesync { stream: StreamName },
    /// Streams agree but the content differs: a table order or pool bug.
    ContentTable,
    /// HP differs after combat, which the engine does not simulate.
    CombatResolution,
    EconomyDrift,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub field:     String,
    pub predicted: String,
    pub observed:  String,
    pub cause:     MismatchCause,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParityReport {
    pub floor:      Floor,
    pub mismatches: Vec<Mismatch>,
}

impl ParityReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Streams that drifted, in canonical order.
    pub fn desynced_streams(&self) -> Vec<StreamName> {
        let mut streams: Vec<StreamName> = self
            .mismatches
            .iter()
            .filter_map(|m| match m.cause {
                MismatchCause::RngStreamDesync { stream } => Some(stream),
                _ => None,
            })
            .collect();
        streams.sort_unstable();
        streams.dedup();
        streams
    }
}

impl RunOrchestrator {
    pub fn floor_state(&self) -> FloorState {
        FloorState {
            floor:    self.state.floor,
            act:      self.state.act,
            counters: self.registry.counters(),
            hp:       self.state.hp,
            max_hp:   self.state.max_hp,
            gold:     self.state.gold,
            deck:     self.state.deck_ids(),
            relics:   self.state.relics.clone(),
            potions:  self.state.potions.clone(),
            last_encounter: self.state.encounters.last().cloned(),
        }
    }
}

fn push<T: Debug + PartialEq>(
    out: &mut Vec<Mismatch>,
    field: &str,
    predicted: &T,
    observed: &T,
    cause: MismatchCause,
) {
    if predicted != observed {
        out.push(Mismatch {
            field:     field.to_string(),
            predicted: format!("{predicted:?}"),
            observed:  format!("{observed:?}"),
            cause,
        });
    }
}

/// Compare two floor states field by field.
///
/// Content differences are blamed on the stream that produces them when
/// that stream's counter also drifted, and on the content tables otherwise.
pub fn compare(predicted: &FloorState, observed: &FloorState) -> ParityReport {
    let mut mismatches = Vec::new();
    let mut drifted: Vec<StreamName> = Vec::new();

    for name in StreamName::ALL {
        let p = predicted.counters.get(&name).copied().unwrap_or(0);
        let o = observed.counters.get(&name).copied().unwrap_or(0);
        if p != o {
            drifted.push(name);
            push(&mut mismatches, &format!("counter.{}", name.name()), &p, &o,
                MismatchCause::RngStreamDesync { stream: name });
        }
    }
    let blame = |stream: StreamName| {
        if drifted.contains(&stream) {
            MismatchCause::RngStreamDesync { stream }
        } else {
            MismatchCause::ContentTable
        }
    };

    push(&mut mismatches, "floor", &predicted.floor, &observed.floor, MismatchCause::ContentTable);
    push(&mut mismatches, "act", &predicted.act, &observed.act, MismatchCause::ContentTable);
    push(&mut mismatches, "hp", &predicted.hp, &observed.hp, MismatchCause::CombatResolution);
    push(&mut mismatches, "max_hp", &predicted.max_hp, &observed.max_hp, MismatchCause::ContentTable);
    push(&mut mismatches, "gold", &predicted.gold, &observed.gold, MismatchCause::EconomyDrift);
    push(&mut mismatches, "deck", &predicted.deck, &observed.deck, blame(StreamName::Card));
    push(&mut mismatches, "relics", &predicted.relics, &observed.relics, blame(StreamName::Relic));
    push(&mut mismatches, "potions", &predicted.potions, &observed.potions, blame(StreamName::Potion));
    push(
        &mut mismatches,
        "last_encounter",
        &predicted.last_encounter,
        &observed.last_encounter,
        blame(StreamName::Monster),
    );

    for m in &mismatches {
        log::warn!(
            "floor={} parity: {} predicted {} observed {} ({:?})",
            observed.floor, m.field, m.predicted, m.observed, m.cause
        );
    }
    ParityReport { floor: observed.floor, mismatches }
}
