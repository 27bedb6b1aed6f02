//! Deterministic seeded generation engine for Slay the Spire runs.
//!
//! Dependency order:
//!   rng → registry → {map_generator, encounter_generator, rewards} → orchestrator
//!
//! Everything a run generates is a pure function of (seed, ascension,
//! character, actions taken). See `orchestrator` for the draw order.

pub mod types;
pub mod error;
pub mod seed;
pub mod rng;
pub mod registry;
pub mod config;

pub mod map_generator;
pub mod encounter_generator;
pub mod event_generator;
pub mod card_reward;
pub mod relic_reward;
pub mod potion_reward;
pub mod shop;
pub mod treasure;
pub mod neow;
pub mod combat_reward;

pub mod run_state;
pub mod event;
pub mod orchestrator;
pub mod snapshot;
pub mod prediction;
pub mod parity;
pub mod agent;
pub mod store;

pub use config::{GameData, RunConfig};
pub use error::{SimError, SimResult};
pub use orchestrator::{Action, Observation, Phase, RunOrchestrator, StepResult};
