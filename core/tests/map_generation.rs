//! Map generator tests.
//!
//! Tests cover: connectivity, fixed rows, placement rules, idempotence,
//! ascension elite density, and the burning elite.

use spire_core::{
    config::{GameData, RoomChances},
    map_generator::{generate, MapGraph, BOSS_LANE, MAP_HEIGHT, MAP_WIDTH},
    registry::{map_seed_offset, RngRegistry, StreamName},
    rng::StreamRng,
    types::{Act, Ascension, RoomKind},
};

const SEEDS: [i64; 6] = [1, 42, 1_234_567_890, -99, 8_008_135, i64::MAX];

fn chances(act: Act) -> RoomChances {
    let data = GameData::builtin().expect("builtin data");
    data.act(act).expect("act data").room_chances
}

fn map_for(seed: i64, act: Act, ascension: Ascension, final_act: bool) -> MapGraph {
    let mut rng = StreamRng::new(seed.wrapping_add(map_seed_offset(act).expect("offset")));
    generate(act, ascension, &chances(act), final_act, &mut rng).expect("map")
}

fn edges(map: &MapGraph) -> Vec<Vec<(usize, usize)>> {
    map.rows
        .iter()
        .flatten()
        .map(|n| n.edges.iter().map(|e| e.dst()).collect())
        .collect()
}

#[test]
fn every_generated_map_is_fully_connected() {
    for seed in SEEDS {
        for act in 1..=3 {
            let map = map_for(seed, act, 20, false);
            assert_eq!(map.height(), MAP_HEIGHT);
            assert!(map.rows.iter().all(|r| r.len() == MAP_WIDTH));
            assert!(map.is_fully_connected(), "seed {seed} act {act} has a dead end");
            assert!(!map.start_nodes().is_empty());
        }
    }
}

#[test]
fn fixed_rows_hold_their_rooms() {
    for seed in SEEDS {
        let map = map_for(seed, 1, 0, false);
        for node in map.path_nodes() {
            match node.y {
                0 => assert_eq!(node.room, Some(RoomKind::Monster), "row 0 at lane {}", node.x),
                8 => assert_eq!(node.room, Some(RoomKind::Treasure), "row 8 at lane {}", node.x),
                14 => assert_eq!(node.room, Some(RoomKind::Rest), "row 14 at lane {}", node.x),
                _ => assert!(node.room.is_some(), "unassigned node at {:?}", (node.x, node.y)),
            }
        }
    }
}

#[test]
fn early_rows_have_no_elites_or_rests() {
    for seed in SEEDS {
        let map = map_for(seed, 2, 20, false);
        for node in map.path_nodes().filter(|n| n.y <= 4) {
            assert!(
                !matches!(node.room, Some(RoomKind::Elite) | Some(RoomKind::Rest)),
                "seed {seed}: {:?} at row {}",
                node.room,
                node.y
            );
        }
        for node in map.path_nodes().filter(|n| n.y == 13) {
            assert_ne!(node.room, Some(RoomKind::Rest), "seed {seed}: rest before the final rest row");
        }
    }
}

#[test]
fn only_the_top_row_reaches_the_boss() {
    let map = map_for(42, 1, 0, false);
    for node in map.path_nodes() {
        let to_boss = node.edges.iter().any(|e| e.to_boss);
        assert_eq!(to_boss, node.y == MAP_HEIGHT - 1, "node {:?}", (node.x, node.y));
        for edge in node.edges.iter().filter(|e| e.to_boss) {
            assert_eq!(edge.dst(), (BOSS_LANE, map.boss_row()));
        }
    }
}

#[test]
fn same_stream_state_same_map() {
    let a = map_for(1_234_567_890, 3, 15, false);
    let b = map_for(1_234_567_890, 3, 15, false);
    assert_eq!(a, b);
}

#[test]
fn ascension_keeps_topology_but_raises_elite_budget() {
    for seed in SEEDS {
        let a0 = map_for(seed, 1, 0, false);
        let a20 = map_for(seed, 1, 20, false);
        assert_eq!(edges(&a0), edges(&a20), "seed {seed}: topology must not depend on ascension");

        let b0 = a0.budget.expect("budget");
        let b20 = a20.budget.expect("budget");
        assert_eq!(b0.available, b20.available);
        assert!(b20.elite > b0.elite, "seed {seed}: elite budget {} vs {}", b20.elite, b0.elite);
    }
}

#[test]
fn burning_elite_costs_one_extra_draw() {
    let offset = map_seed_offset(1).expect("offset");
    let mut plain = StreamRng::new(77 + offset);
    let mut keyed = StreamRng::new(77 + offset);
    let without = generate(1, 20, &chances(1), false, &mut plain).expect("map");
    let with = generate(1, 20, &chances(1), true, &mut keyed).expect("map");

    assert_eq!(keyed.counter(), plain.counter() + 1);
    assert_eq!(without.path_nodes().filter(|n| n.burning_elite).count(), 0);
    let burning: Vec<_> = with.path_nodes().filter(|n| n.burning_elite).collect();
    assert_eq!(burning.len(), 1);
    assert_eq!(burning[0].room, Some(RoomKind::Elite));
}

#[test]
fn registry_map_stream_matches_act_offsets() {
    let mut registry = RngRegistry::create_run(500, 0);
    let from_registry = generate(1, 0, &chances(1), false, registry.stream_mut(StreamName::Map)).expect("map");
    assert_eq!(from_registry, map_for(500, 1, 0, false));

    registry.transition_to_act(2).expect("act 2");
    let act2 = generate(2, 0, &chances(2), false, registry.stream_mut(StreamName::Map)).expect("map");
    assert_eq!(act2, map_for(500, 2, 0, false));
}

#[test]
fn final_act_corridor() {
    let map = map_for(9, 4, 20, true);
    let rooms: Vec<_> = map.path_nodes().map(|n| n.room).collect();
    assert_eq!(rooms, vec![Some(RoomKind::Rest), Some(RoomKind::Shop), Some(RoomKind::Elite)]);
    assert!(map.is_fully_connected());
}
