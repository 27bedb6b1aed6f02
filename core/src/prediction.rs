//! What-if queries for dashboards and tooling.
//!
//! RULE: a prediction never touches a live run. Each query works on a
//! disposable stream or on a clone of the orchestrator.

use crate::{
    card_reward::{generate_card_reward, CardBlizzard, CardPools, CardRewardContext, RewardCard},
    combat_reward::RewardItem,
    config::GameData,
    error::{SimError, SimResult},
    map_generator::Coord,
    orchestrator::{Action, Phase, RunOrchestrator},
    registry::StreamCounters,
    relic_reward::SpawnContext,
    rng::StreamRng,
    types::{Act, Ascension, CharacterClass, Floor, RoomKind},
};
use serde::{Deserialize, Serialize};

/// A card reward asked for by raw stream state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRewardQuery {
    pub seed:      i64,
    /// Card stream counter before the reward.
    pub counter:   u32,
    pub blizzard:  i32,
    pub act:       Act,
    pub room:      RoomKind,
    pub ascension: Ascension,
    pub character: CharacterClass,
    #[serde(default)]
    pub relics:    Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRewardPrediction {
    pub cards:          Vec<RewardCard>,
    pub counter_after:  u32,
    pub blizzard_after: i32,
}

pub fn predict_card_reward(data: &GameData, query: &CardRewardQuery) -> SimResult<CardRewardPrediction> {
    let act = data.act(query.act).ok_or(SimError::InvalidAct { act: query.act })?;
    let pools = CardPools::for_character(data, query.character)?;
    let mut rng = StreamRng::with_counter(query.seed, query.counter).with_name("card");
    let mut blizzard = CardBlizzard::new(query.blizzard);
    let ctx = CardRewardContext {
        room:           query.room,
        upgrade_chance: act.upgrade_chance_for(query.ascension),
        relics:         &query.relics,
    };
    let cards = generate_card_reward(&pools, &ctx, &mut blizzard, &mut rng)?;
    Ok(CardRewardPrediction {
        cards,
        counter_after:  rng.counter(),
        blizzard_after: blizzard.offset,
    })
}

/// The three boss relics the current act's boss chest will offer,
/// assuming no relic is taken from the boss pool before then.
pub fn predict_boss_relics(run: &RunOrchestrator) -> SimResult<Vec<String>> {
    let state = run.state();
    let mut pools = run.relic_pools().clone();
    let ctx = SpawnContext { act: state.act, floor: state.floor, owned: &state.relics };
    pools.boss_choices(&ctx, &run.data().fallback)
}

/// One floor of a predicted path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathStep {
    pub floor:    Floor,
    pub node:     Coord,
    /// What the room generated on entry.
    pub entered:  Phase,
    /// The reward screen after a won fight, if the room had one.
    pub rewards:  Option<Vec<RewardItem>>,
    pub counters: StreamCounters,
}

/// Walk `lanes` from the current map position on a clone of the run.
/// Fights cost no HP, rewards and shops are left untouched, and rest sites
/// smith. The walk stops early when the run ends.
pub fn predict_path(run: &RunOrchestrator, lanes: &[usize]) -> SimResult<Vec<PathStep>> {
    let mut branch = run.clone();
    let mut steps = Vec::with_capacity(lanes.len());
    for &x in lanes {
        branch.step(Action::ChooseNode { x })?;
        let floor = branch.state().floor;
        let node = branch.state().position.unwrap_or((x, 0));
        let entered = branch.phase().clone();
        let mut rewards = None;

        while !matches!(branch.phase(), Phase::MapChoice | Phase::RunComplete { .. }) {
            let action = match branch.phase() {
                Phase::Combat { .. } => Action::ResolveCombat { hp_after: branch.state().hp },
                Phase::Rewards { items, .. } => {
                    rewards.get_or_insert_with(|| items.clone());
                    Action::Proceed
                }
                Phase::Event { .. } => Action::LeaveEvent,
                Phase::Shop { .. } => Action::LeaveShop,
                Phase::Treasure { .. } => Action::OpenChest,
                Phase::Rest if branch.valid_actions().contains(&Action::Smith) => Action::Smith,
                _ => match branch.valid_actions().into_iter().next() {
                    Some(action) => action,
                    None => break,
                },
            };
            branch.step(action)?;
        }

        log::debug!("floor={floor} prediction: lane {x} -> {}", entered.name());
        steps.push(PathStep { floor, node, entered, rewards, counters: branch.registry().counters() });
        if branch.is_complete() {
            break;
        }
    }
    Ok(steps)
}
