//! Stream and registry lifecycle tests.
//!
//! Tests cover: counters, restore by counter, per-floor isolation, the
//! act-transition card snap, and stream lookup by name.

use spire_core::{
    error::SimError,
    registry::{snapped_card_counter, RngRegistry, StreamCounters, StreamName},
    rng::StreamRng,
};

#[test]
fn every_draw_advances_the_counter_by_one() {
    let mut rng = StreamRng::new(1234);
    rng.random_int(99);
    rng.random_range(10, 20);
    rng.random_float();
    rng.random_float_range(0.9, 1.1);
    rng.random_boolean();
    rng.random_boolean_chance(0.33);
    rng.next_long();
    rng.next_double();
    assert_eq!(rng.counter(), 8);

    let mut items: Vec<u32> = (0..10).collect();
    rng.shuffle_seeded(&mut items);
    assert_eq!(rng.counter(), 9, "seeded shuffle costs one draw");
    rng.shuffle_uncounted(&mut items);
    assert_eq!(rng.counter(), 9, "uncounted shuffle leaves the counter alone");
}

#[test]
fn same_seed_same_sequence() {
    let mut a = StreamRng::new(-8_675_309);
    let mut b = StreamRng::new(-8_675_309);
    for _ in 0..500 {
        assert_eq!(a.random_int(999), b.random_int(999));
        assert_eq!(a.random_float().to_bits(), b.random_float().to_bits());
    }
}

#[test]
fn with_counter_continues_where_the_live_stream_stood() {
    let mut live = StreamRng::new(5150);
    for _ in 0..137 {
        live.random_range(0, 99);
    }
    let mut restored = StreamRng::with_counter(5150, 137);
    assert_eq!(restored.counter(), 137);
    for _ in 0..50 {
        assert_eq!(live.random_int(99), restored.random_int(99));
    }
}

#[test]
fn set_counter_never_moves_backwards() {
    let mut rng = StreamRng::new(3);
    rng.set_counter(40);
    assert_eq!(rng.counter(), 40);
    rng.set_counter(10);
    assert_eq!(rng.counter(), 40);
}

#[test]
fn act_transition_snap_checkpoints() {
    assert_eq!(snapped_card_counter(137), 250);
    assert_eq!(snapped_card_counter(312), 500);
    assert_eq!(snapped_card_counter(612), 750);
    assert_eq!(snapped_card_counter(0), 0);
    assert_eq!(snapped_card_counter(250), 250);
    assert_eq!(snapped_card_counter(800), 800);
}

#[test]
fn transition_snaps_card_stream_and_reseeds_map() {
    let mut registry = RngRegistry::create_run(77, 0);
    for _ in 0..137 {
        registry.stream_mut(StreamName::Card).random_int(99);
    }
    registry.stream_mut(StreamName::Map).random_int(99);

    let (before, after) = registry.transition_to_act(2).expect("act 2");
    assert_eq!((before, after), (137, 250));
    assert_eq!(registry.counter(StreamName::Card), 250);
    assert_eq!(registry.counter(StreamName::Map), 0, "map stream is recreated");
    assert_eq!(registry.act(), 2);
}

#[test]
fn invalid_act_is_rejected() {
    let mut registry = RngRegistry::create_run(77, 0);
    let err = registry.transition_to_act(9).expect_err("act 9 must fail");
    assert!(matches!(err, SimError::InvalidAct { act: 9 }), "got {err:?}");
    assert_eq!(registry.counter(StreamName::Card), 0, "failed transition must not snap");
}

#[test]
fn per_floor_streams_are_isolated() {
    let mut registry = RngRegistry::create_run(424_242, 20);
    registry.enter_floor(6);
    let first: Vec<i32> = (0..10).map(|_| registry.stream_mut(StreamName::Misc).random_int(99)).collect();
    let card_before = registry.counter(StreamName::Card);

    registry.enter_floor(7);
    registry.stream_mut(StreamName::Misc).random_int(99);
    registry.enter_floor(6);
    let again: Vec<i32> = (0..10).map(|_| registry.stream_mut(StreamName::Misc).random_int(99)).collect();

    assert_eq!(first, again, "floor 6 must replay identically");
    assert_eq!(registry.counter(StreamName::Card), card_before, "persistent streams untouched");
}

#[test]
fn restore_matches_live_registry() {
    let mut live = RngRegistry::create_run(31_337, 0);
    for _ in 0..12 {
        live.stream_mut(StreamName::Relic).random_int(99);
        live.stream_mut(StreamName::Potion).random_range(0, 99);
    }
    live.enter_floor(3);
    live.stream_mut(StreamName::MonsterHp).random_int(10);

    let counters: StreamCounters = live.counters();
    let mut restored = RngRegistry::restore(31_337, 0, 1, 3, &counters).expect("restore");
    assert_eq!(restored.counters(), counters);
    for name in [StreamName::Relic, StreamName::Potion, StreamName::MonsterHp, StreamName::Card] {
        assert_eq!(
            live.stream_mut(name).random_int(999),
            restored.stream_mut(name).random_int(999),
            "stream {name:?} diverged after restore"
        );
    }
}

#[test]
fn streams_are_found_by_name() {
    let registry = RngRegistry::create_run(1, 0);
    assert_eq!(registry.stream_by_name("card_random").expect("known").name, "card_random");
    let err = registry.stream_by_name("loot").expect_err("unknown stream");
    assert!(matches!(err, SimError::UnknownStream { .. }), "got {err:?}");
}
