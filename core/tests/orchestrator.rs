//! Run orchestrator tests.
//!
//! Tests cover: run start, the first floor, ascension modifiers, illegal
//! actions, act transitions, run completion, snapshots and save states.

use spire_core::{
    agent::{drive, FirstChoicePolicy, Policy, RandomPolicy},
    config::{GameData, RunConfig},
    encounter_generator::generate_act_encounters,
    error::SimError,
    event::GenEvent,
    orchestrator::{replay_to_floor, Action, Observation, Phase, RunOrchestrator},
    registry::{snapped_card_counter, StreamName},
    relic_reward::POOL_ORDER,
    rng::StreamRng,
    snapshot::{RunSnapshot, SaveState},
    types::{CharacterClass, RoomKind},
};
use std::collections::BTreeMap;

fn watcher(ascension: u8) -> RunOrchestrator {
    let config = RunConfig::new("1234567890", ascension, CharacterClass::Watcher);
    let data = GameData::builtin().expect("builtin data");
    RunOrchestrator::new("orch-test".into(), config, data).expect("new run")
}

/// Take the Neow option at `index` and clear any reward screen it opens.
fn leave_neow(run: &mut RunOrchestrator, index: usize) {
    run.step(Action::ChooseNeow { index }).expect("neow");
    if matches!(run.phase(), Phase::Rewards { .. }) {
        run.step(Action::Proceed).expect("leave neow rewards");
    }
    assert_eq!(run.phase(), &Phase::MapChoice);
}

fn step_until(run: &mut RunOrchestrator, policy: &mut dyn Policy, done: impl Fn(&RunOrchestrator) -> bool) {
    for _ in 0..5000 {
        if done(run) || run.is_complete() {
            return;
        }
        let action = policy.choose(&run.observe()).expect("an action");
        run.step(action).expect("step");
    }
    panic!("condition never reached");
}

fn without_edits(mut obs: Observation) -> Observation {
    obs.pending_edits.clear();
    obs
}

#[test]
fn new_run_waits_on_four_neow_options() {
    let run = watcher(20);
    let Phase::Neow { options } = run.phase() else {
        panic!("expected Neow, got {:?}", run.phase());
    };
    assert_eq!(options.len(), 4);
    assert_eq!(run.valid_actions().len(), 4);
    assert!(run.neow_counter() > 0);
    assert_eq!(run.state().floor, 0);

    let kinds: Vec<&str> = run.events().iter().map(spire_core::orchestrator::event_type_name).collect();
    assert_eq!(
        kinds,
        vec!["run_started", "encounters_generated", "map_generated", "neow_options_generated"]
    );
}

#[test]
fn floor_one_is_the_first_queued_fight() {
    let mut run = watcher(20);
    let first = run.encounters().normal[0].clone();
    leave_neow(&mut run, 1);

    let x = run.next_nodes()[0].0;
    let result = run.step(Action::ChooseNode { x }).expect("enter floor 1");
    assert_eq!(run.state().floor, 1);
    assert!(result.events.iter().any(|e| matches!(
        e,
        GenEvent::FloorEntered { floor: 1, room: RoomKind::Monster, .. }
    )));
    match run.phase() {
        Phase::Combat { room, encounter } => {
            assert_eq!(*room, RoomKind::Monster);
            assert_eq!(encounter, &first);
        }
        other => panic!("expected combat, got {other:?}"),
    }
}

#[test]
fn ascension_changes_state_but_not_topology() {
    let a0 = watcher(0);
    let a20 = watcher(20);

    assert_eq!((a0.state().hp, a0.state().max_hp), (72, 72));
    assert_eq!((a20.state().hp, a20.state().max_hp), (61, 68));
    assert!(a20.state().deck_ids().contains(&"AscendersBane".to_string()));
    assert!(!a0.state().deck_ids().contains(&"AscendersBane".to_string()));
    assert_eq!(a20.state().potion_slots + 1, a0.state().potion_slots);

    let edges = |run: &RunOrchestrator| -> Vec<Vec<(usize, usize)>> {
        run.map().rows.iter().flatten().map(|n| n.edges.iter().map(|e| e.dst()).collect()).collect()
    };
    assert_eq!(edges(&a0), edges(&a20));
    let budget0 = a0.map().budget.expect("budget");
    let budget20 = a20.map().budget.expect("budget");
    assert!(budget20.elite > budget0.elite);
}

#[test]
fn illegal_actions_change_nothing() {
    let mut run = watcher(0);
    let before = run.observe();
    let err = run.step(Action::Proceed).expect_err("proceed at Neow");
    assert!(matches!(err, SimError::IllegalAction { .. }), "got {err:?}");
    assert!(run.step(Action::ChooseNeow { index: 9 }).is_err());
    assert!(run.step(Action::ChooseNode { x: 0 }).is_err());
    assert_eq!(run.observe(), before);
    assert!(run.actions().is_empty());
}

#[test]
fn act_transition_snaps_the_card_stream() {
    let mut run = watcher(0);
    let mut policy = FirstChoicePolicy;
    step_until(&mut run, &mut policy, |r| {
        r.events().iter().any(|e| matches!(e, GenEvent::ActEntered { .. }))
    });

    let (before, after) = run
        .events()
        .iter()
        .find_map(|e| match e {
            GenEvent::ActEntered { act: 2, card_counter_before, card_counter_after, .. } => {
                Some((*card_counter_before, *card_counter_after))
            }
            _ => None,
        })
        .expect("act 2 entered");
    assert_eq!(after, snapped_card_counter(before));
    assert_eq!(run.state().act, 2);
    assert_eq!(run.state().floor, 17, "15 map rows, the boss and its chest");
    assert_eq!(run.state().position, None);
    assert_eq!(run.map().act, 2);
    assert_eq!(run.encounters().act, 2);
    assert_eq!(run.phase(), &Phase::MapChoice);
}

#[test]
fn each_act_starts_a_fresh_encounter_history() {
    let mut run = watcher(0);
    let mut policy = FirstChoicePolicy;
    let mut monster_before = run.registry().counter(StreamName::Monster);
    while run.state().act < 2 {
        monster_before = run.registry().counter(StreamName::Monster);
        let action = policy.choose(&run.observe()).expect("an action");
        run.step(action).expect("step");
    }
    assert!(!run.state().encounters.is_empty());

    let data = GameData::builtin().expect("builtin data");
    let act_two = data.acts.iter().find(|a| a.act == 2).expect("act 2");
    let mut rng = StreamRng::with_counter(run.seed(), monster_before);
    let fresh = generate_act_encounters(act_two, 0, &[], &mut rng).expect("queues");
    assert_eq!(run.encounters().normal, fresh.normal);
    assert_eq!(run.encounters().elite, fresh.elite);
    assert_eq!(run.registry().counter(StreamName::Monster), rng.counter());
}

/// First shop entered with enough gold for a removal, across a few policies.
fn run_into_shop() -> RunOrchestrator {
    for seed in 0..20 {
        let mut run = watcher(0);
        let mut policy = RandomPolicy::new(seed);
        for _ in 0..3000 {
            if let Phase::Shop { inventory, purged: false } = run.phase() {
                if run.state().gold >= inventory.purge_cost {
                    return run;
                }
            }
            if run.is_complete() {
                break;
            }
            let action = policy.choose(&run.observe()).expect("an action");
            run.step(action).expect("step");
        }
    }
    panic!("no policy reached a shop with gold to spend");
}

#[test]
fn shop_spending_comes_out_of_gold() {
    let mut run = run_into_shop();
    let Phase::Shop { inventory, .. } = run.phase().clone() else {
        panic!("expected a shop, got {:?}", run.phase());
    };
    let gold = run.state().gold;
    let purges = run.state().purge_count;

    run.step(Action::Purge).expect("purge");
    assert_eq!(run.state().gold, gold - inventory.purge_cost);
    assert_eq!(run.state().purge_count, purges + 1);
    assert!(run.step(Action::Purge).is_err(), "one removal per visit");
    assert_eq!(run.state().gold, gold - inventory.purge_cost);

    let left = run.state().gold;
    let cheapest = inventory
        .cards
        .iter()
        .enumerate()
        .filter(|(_, c)| c.price <= left)
        .min_by_key(|(_, c)| c.price)
        .map(|(i, c)| (i, c.price));
    if let Some((index, price)) = cheapest {
        run.step(Action::BuyCard { index }).expect("buy");
        assert_eq!(run.state().gold, left - price);
    }
}

#[test]
fn finished_runs_refuse_further_actions() {
    let mut run = watcher(20);
    let steps = drive(&mut run, &mut FirstChoicePolicy, 5000).expect("drive");
    assert!(steps > 0);
    assert_eq!(run.phase(), &Phase::RunComplete { victory: true });
    assert_eq!(run.state().act, 3, "no keys, no fourth act");
    assert!(run.valid_actions().is_empty());

    let err = run.step(Action::Proceed).expect_err("run is over");
    assert!(matches!(err, SimError::RunComplete), "got {err:?}");
    assert!(matches!(run.events().last(), Some(GenEvent::RunEnded { victory: true, .. })));
}

#[test]
fn replay_to_floor_stops_where_the_live_run_stood() {
    let config = RunConfig::new("SPIRE", 5, CharacterClass::Defect);
    let data = GameData::builtin().expect("builtin data");
    let mut live = RunOrchestrator::new("live".into(), config.clone(), data.clone()).expect("new run");
    let mut policy = RandomPolicy::new(17);
    step_until(&mut live, &mut policy, |r| r.state().floor >= 6);
    let at_six = live.observe();

    drive(&mut live, &mut policy, 40).expect("keep going");
    let replayed = replay_to_floor("replay".into(), config, data, live.actions(), 6).expect("replay");
    assert_eq!(replayed.observe(), at_six);
}

#[test]
fn snapshot_resume_matches_live_continuation() {
    let mut live = watcher(20);
    drive(&mut live, &mut RandomPolicy::new(3), 45).expect("drive");

    let json = serde_json::to_string(&live.snapshot()).expect("serialize");
    let snapshot: RunSnapshot = serde_json::from_str(&json).expect("deserialize");
    let data = GameData::builtin().expect("builtin data");
    let mut resumed = RunOrchestrator::resume(snapshot, data).expect("resume");

    assert_eq!(resumed.observe(), live.observe());
    assert!(resumed.events().is_empty());

    drive(&mut live, &mut FirstChoicePolicy, 120).expect("live continues");
    drive(&mut resumed, &mut FirstChoicePolicy, 120).expect("resumed continues");
    assert_eq!(resumed.observe(), live.observe());
    assert_eq!(resumed.registry().counters(), live.registry().counters());
}

#[test]
fn save_state_continues_like_the_live_run() {
    let mut live = watcher(0);
    leave_neow(&mut live, 1);
    step_until(&mut live, &mut FirstChoicePolicy, |r| {
        r.state().floor >= 4 && r.phase() == &Phase::MapChoice
    });

    let state = live.state().clone();
    let pools: BTreeMap<_, _> = POOL_ORDER
        .iter()
        .map(|t| (*t, live.relic_pools().remaining(*t).to_vec()))
        .collect();
    let snapshot = live.snapshot();
    let save = SaveState {
        seed:       live.seed(),
        ascension:  state.ascension,
        character:  state.character,
        final_act:  state.final_act,
        act:        state.act,
        floor:      state.floor,
        counters:   live.registry().counters(),
        hp:         state.hp,
        max_hp:     state.max_hp,
        gold:       state.gold,
        deck:       state.deck.clone(),
        relics:     state.relics.clone(),
        potions:    state.potions.clone(),
        potion_slots: state.potion_slots,
        keys:       state.keys,
        card_blizzard:   state.card_blizzard,
        potion_blizzard: state.potion_blizzard,
        unknown_odds:    state.unknown_odds,
        purge_count:     state.purge_count,
        monster_list: live.encounters().upcoming_normal().to_vec(),
        elite_list:   live.encounters().upcoming_elite().to_vec(),
        boss_list:    live.encounters().bosses.clone(),
        relic_pools:  pools,
        event_list:   snapshot.event_pools.events.clone(),
        shrine_list:  snapshot.event_pools.shrines.clone(),
        one_time_event_list: snapshot.event_pools.one_time.clone(),
        position:     state.position,
        encounter_history: state.encounters.clone(),
    };

    let data = GameData::builtin().expect("builtin data");
    let mut loaded = RunOrchestrator::from_save_state("loaded".into(), save, data).expect("load save");
    assert_eq!(loaded.map(), live.map(), "act map is rebuilt from the seed");
    assert_eq!(without_edits(loaded.observe()), without_edits(live.observe()));

    drive(&mut live, &mut FirstChoicePolicy, 60).expect("live continues");
    drive(&mut loaded, &mut FirstChoicePolicy, 60).expect("loaded continues");
    assert_eq!(without_edits(loaded.observe()), without_edits(live.observe()));
}
