//! Prediction surface tests.
//!
//! Every prediction is checked against what the live run then generates,
//! and must leave the live run untouched.

use spire_core::{
    agent::{FirstChoicePolicy, Policy},
    combat_reward::RewardItem,
    config::{GameData, RunConfig},
    orchestrator::{Action, Phase, RunOrchestrator},
    prediction::{predict_boss_relics, predict_card_reward, predict_path, CardRewardQuery},
    registry::StreamName,
    types::{CharacterClass, RoomKind},
};

fn run_at_map(seed: &str, character: CharacterClass, ascension: u8) -> RunOrchestrator {
    let config = RunConfig::new(seed, ascension, character);
    let data = GameData::builtin().expect("builtin data");
    let mut run = RunOrchestrator::new("predict".into(), config, data).expect("new run");
    run.step(Action::ChooseNeow { index: 1 }).expect("neow");
    if matches!(run.phase(), Phase::Rewards { .. }) {
        run.step(Action::Proceed).expect("leave neow rewards");
    }
    run
}

#[test]
fn card_reward_prediction_matches_the_first_fight() {
    let mut run = run_at_map("1234567890", CharacterClass::Watcher, 20);
    let x = run.next_nodes()[0].0;
    run.step(Action::ChooseNode { x }).expect("floor 1");

    let query = CardRewardQuery {
        seed:      run.seed(),
        counter:   run.registry().counter(StreamName::Card),
        blizzard:  run.state().card_blizzard.offset,
        act:       1,
        room:      RoomKind::Monster,
        ascension: 20,
        character: CharacterClass::Watcher,
        relics:    run.state().relics.clone(),
    };
    let before = run.observe();
    let prediction = predict_card_reward(run.data(), &query).expect("prediction");
    assert_eq!(run.observe(), before, "prediction must not touch the run");

    let hp = run.state().hp;
    run.step(Action::ResolveCombat { hp_after: hp }).expect("win");
    let Phase::Rewards { items, .. } = run.phase() else {
        panic!("expected rewards, got {:?}", run.phase());
    };
    let offered = items
        .iter()
        .find_map(|item| match item {
            RewardItem::Cards { cards } => Some(cards.clone()),
            _ => None,
        })
        .expect("a card reward");

    assert_eq!(prediction.cards, offered);
    assert_eq!(prediction.counter_after, run.registry().counter(StreamName::Card));
    assert_eq!(prediction.blizzard_after, run.state().card_blizzard.offset);
}

#[test]
fn boss_relic_prediction_matches_the_chest() {
    let mut run = run_at_map("ABC123", CharacterClass::Ironclad, 0);
    let before = run.observe();
    let predicted = predict_boss_relics(&run).expect("prediction");
    assert_eq!(run.observe(), before);
    assert_eq!(predicted.len(), 3);

    let mut policy = FirstChoicePolicy;
    for _ in 0..2000 {
        if matches!(run.phase(), Phase::BossRelic { .. }) {
            break;
        }
        let action = policy.choose(&run.observe()).expect("an action");
        run.step(action).expect("step");
    }
    let Phase::BossRelic { choices } = run.phase() else {
        panic!("never reached the boss chest, at {:?}", run.phase());
    };
    assert_eq!(&predicted, choices);
}

#[test]
fn path_prediction_walks_a_clone() {
    let mut run = run_at_map("SPIRE", CharacterClass::Silent, 10);
    let mut lanes = Vec::new();
    let mut at = run.next_nodes()[0];
    lanes.push(at.0);
    for _ in 0..3 {
        let next = run.map().children(at)[0];
        lanes.push(next.0);
        at = next;
    }

    let before = run.observe();
    let steps = predict_path(&run, &lanes).expect("prediction");
    assert_eq!(run.observe(), before, "the live run must not move");

    assert_eq!(steps.len(), lanes.len());
    for (i, step) in steps.iter().enumerate() {
        assert_eq!(step.floor, i as u32 + 1);
        assert_eq!(step.node, (lanes[i], i));
    }
    assert!(matches!(steps[0].entered, Phase::Combat { room: RoomKind::Monster, .. }));
    assert!(steps[0].rewards.is_some(), "a won fight shows rewards");

    let result = run.step(Action::ChooseNode { x: lanes[0] }).expect("floor 1");
    assert_eq!(result.observation.phase, steps[0].entered);
}

#[test]
fn illegal_lane_is_an_error() {
    let run = run_at_map("SPIRE", CharacterClass::Silent, 10);
    let taken: Vec<usize> = run.next_nodes().iter().map(|n| n.0).collect();
    let missing = (0..7).find(|x| !taken.contains(x)).expect("some lane has no start node");
    assert!(predict_path(&run, &[missing]).is_err());
}
