//! Encounter queue tests.
//!
//! Tests cover: repeat rules, the first-strong exclusion, double bosses,
//! fixed acts, history carry-over, and queue extension.

use spire_core::{
    config::{ActData, GameData},
    encounter_generator::generate_act_encounters,
    rng::StreamRng,
    types::{Act, Ascension},
};

const SEEDS: [i64; 5] = [1, 42, 1_234_567_890, -7, 31_337];

fn act(n: Act) -> ActData {
    GameData::builtin().expect("builtin data").act(n).expect("act data").clone()
}

fn queues_for(seed: i64, n: Act, ascension: Ascension) -> spire_core::encounter_generator::EncounterQueues {
    let mut rng = StreamRng::new(seed);
    generate_act_encounters(&act(n), ascension, &[], &mut rng).expect("queues")
}

#[test]
fn queue_lengths_follow_act_counts() {
    for n in 1..=3 {
        let data = act(n);
        let q = queues_for(42, n, 0);
        assert_eq!(q.normal.len(), data.weak_count + 1 + data.strong_count, "act {n} normal");
        assert_eq!(q.elite.len(), data.elite_count, "act {n} elite");
        assert_eq!(q.bosses.len(), 1, "act {n} bosses");
    }
}

#[test]
fn normal_queue_never_repeats_within_two() {
    for seed in SEEDS {
        for n in 1..=3 {
            let q = queues_for(seed, n, 20);
            for i in 1..q.normal.len() {
                assert_ne!(q.normal[i], q.normal[i - 1], "seed {seed} act {n} index {i}");
                if i >= 2 {
                    assert_ne!(q.normal[i], q.normal[i - 2], "seed {seed} act {n} index {i}");
                }
            }
        }
    }
}

#[test]
fn elite_queue_never_repeats_back_to_back() {
    for seed in SEEDS {
        let q = queues_for(seed, 2, 0);
        for pair in q.elite.windows(2) {
            assert_ne!(pair[0], pair[1], "seed {seed}: {:?}", q.elite);
        }
    }
}

#[test]
fn first_strong_respects_the_last_weak_exclusions() {
    for seed in SEEDS {
        for n in 1..=3 {
            let data = act(n);
            let q = queues_for(seed, n, 0);
            let last_weak = &q.normal[data.weak_count - 1];
            let first_strong = &q.normal[data.weak_count];
            if let Some(blocked) = data.exclusions.get(last_weak) {
                assert!(
                    !blocked.contains(first_strong),
                    "seed {seed} act {n}: {first_strong} follows {last_weak}"
                );
            }
            assert!(data.weak.iter().any(|m| &m.name == last_weak));
            assert!(data.strong.iter().any(|m| &m.name == first_strong));
        }
    }
}

#[test]
fn act_three_on_a20_has_two_distinct_bosses() {
    for seed in SEEDS {
        let double = queues_for(seed, 3, 20);
        assert_eq!(double.bosses.len(), 2, "seed {seed}");
        assert_ne!(double.bosses[0], double.bosses[1]);

        let single = queues_for(seed, 3, 19);
        assert_eq!(single.bosses.len(), 1, "seed {seed}");
        assert_eq!(single.bosses[0], double.bosses[0], "same shuffle, shorter list");
    }
}

#[test]
fn final_act_queues_are_fixed_and_free() {
    let mut rng = StreamRng::new(99);
    let q = generate_act_encounters(&act(4), 20, &[], &mut rng).expect("queues");
    assert_eq!(rng.counter(), 0, "fixed queues draw nothing");
    assert_eq!(q.bosses, vec!["The Heart".to_string()]);
    assert!(q.normal.iter().all(|e| e == "Shield and Spear"));
    assert!(!q.normal.is_empty());
}

#[test]
fn history_feeds_the_repeat_rule() {
    let seen = vec!["Cultist".to_string(), "Jaw Worm".to_string()];
    for seed in SEEDS {
        let mut rng = StreamRng::new(seed);
        let q = generate_act_encounters(&act(1), 0, &seen, &mut rng).expect("queues");
        assert!(!seen.contains(&q.normal[0]), "seed {seed}: {} repeats history", q.normal[0]);
        assert_ne!(q.normal[1], "Jaw Worm", "seed {seed}");
        assert_eq!(q.normal.len(), 3 + 1 + 12, "history entries are not part of the queue");
    }
}

#[test]
fn consumed_entries_are_never_rewritten() {
    let data = act(1);
    let mut rng = StreamRng::new(8_008_135);
    let mut q = generate_act_encounters(&data, 0, &[], &mut rng).expect("queues");
    let original = q.normal.clone();

    let mut taken = Vec::new();
    for _ in 0..original.len() {
        taken.push(q.take_normal(&data, &mut rng).expect("take"));
    }
    assert_eq!(taken, original);
    assert!(q.upcoming_normal().is_empty());

    let before = rng.counter();
    let extra = q.take_normal(&data, &mut rng).expect("extended");
    assert!(rng.counter() > before, "extension draws from the monster stream");
    assert_eq!(&q.normal[..original.len()], &original[..]);
    assert_eq!(q.normal[original.len()], extra);
}

#[test]
fn bosses_run_out() {
    let mut q = queues_for(5, 1, 0);
    let boss = q.peek_boss().map(str::to_string).expect("boss");
    assert_eq!(q.take_boss().expect("first boss"), boss);
    assert!(!q.has_next_boss());
    assert!(q.take_boss().is_err());
}

#[test]
fn same_seed_same_queues() {
    assert_eq!(queues_for(1_234_567_890, 2, 20), queues_for(1_234_567_890, 2, 20));
    assert_ne!(queues_for(1, 2, 20).normal, queues_for(2, 2, 20).normal);
}
