//! Parity report tests.

use spire_core::{
    agent::{drive, RandomPolicy},
    config::{GameData, RunConfig},
    orchestrator::RunOrchestrator,
    parity::{compare, FloorState, MismatchCause},
    registry::StreamName,
    types::CharacterClass,
};

fn floor_state() -> FloorState {
    let config = RunConfig::new(8_008_135i64, 15, CharacterClass::Defect);
    let data = GameData::builtin().expect("builtin data");
    let mut run = RunOrchestrator::new("parity".into(), config, data).expect("new run");
    drive(&mut run, &mut RandomPolicy::new(21), 30).expect("drive");
    run.floor_state()
}

#[test]
fn identical_states_are_clean() {
    let state = floor_state();
    let report = compare(&state, &state.clone());
    assert!(report.is_clean(), "{:?}", report.mismatches);
    assert_eq!(report.floor, state.floor);
}

#[test]
fn extra_card_draws_blame_the_card_stream() {
    let predicted = floor_state();
    let mut observed = predicted.clone();
    *observed.counters.entry(StreamName::Card).or_insert(0) += 1;
    observed.deck.push("Strike_B".to_string());

    let report = compare(&predicted, &observed);
    assert_eq!(report.mismatches.len(), 2, "{:?}", report.mismatches);
    assert!(report
        .mismatches
        .iter()
        .all(|m| m.cause == MismatchCause::RngStreamDesync { stream: StreamName::Card }));
    assert_eq!(report.desynced_streams(), vec![StreamName::Card]);
}

#[test]
fn content_without_drift_blames_the_tables() {
    let predicted = floor_state();
    let mut observed = predicted.clone();
    observed.relics.push("Anchor".to_string());
    observed.last_encounter = Some("Lagavulin".to_string());

    let report = compare(&predicted, &observed);
    let fields: Vec<&str> = report.mismatches.iter().map(|m| m.field.as_str()).collect();
    assert_eq!(fields, vec!["relics", "last_encounter"]);
    assert!(report.mismatches.iter().all(|m| m.cause == MismatchCause::ContentTable));
    assert!(report.desynced_streams().is_empty());
}

#[test]
fn hp_and_gold_have_their_own_causes() {
    let predicted = floor_state();
    let mut observed = predicted.clone();
    observed.hp -= 3;
    observed.gold += 12;

    let report = compare(&predicted, &observed);
    let causes: Vec<(&str, &MismatchCause)> =
        report.mismatches.iter().map(|m| (m.field.as_str(), &m.cause)).collect();
    assert_eq!(
        causes,
        vec![("hp", &MismatchCause::CombatResolution), ("gold", &MismatchCause::EconomyDrift)]
    );
    assert_eq!(report.mismatches[1].predicted, predicted.gold.to_string());
}

#[test]
fn reports_serialize_with_a_cause_tag() {
    let predicted = floor_state();
    let mut observed = predicted.clone();
    *observed.counters.entry(StreamName::Potion).or_insert(0) += 2;

    let report = compare(&predicted, &observed);
    let json = serde_json::to_value(&report).expect("serialize");
    let cause = &json["mismatches"][0]["cause"];
    assert_eq!(cause["cause"], "rng_stream_desync");
    assert_eq!(cause["stream"], "potion");
    assert_eq!(json["mismatches"][0]["field"], "counter.potion");
}
