//! Seed string encoding tests.

use spire_core::{
    error::SimError,
    seed::{seed_from_string, seed_to_string, sterilize, SeedMaterial},
};

#[test]
fn typed_seeds_round_trip() {
    for raw in ["1234567890", "ABC123", "SPIRE", "Z", "1", "10", "XYZ9PQ"] {
        let seed = seed_from_string(raw).expect("valid seed");
        assert_eq!(seed_to_string(seed), raw, "round trip of {raw}");
        assert_eq!(seed_from_string(&seed_to_string(seed)).expect("re-parse"), seed);
    }
}

#[test]
fn numeric_seeds_round_trip() {
    for seed in [0i64, 1, 34, 35, -1, i64::MIN, i64::MAX, 8_008_135, -4_213_131_337] {
        let text = seed_to_string(seed);
        assert_eq!(seed_from_string(&text).expect("canonical string"), seed, "round trip of {seed}");
    }
}

#[test]
fn letter_o_reads_as_zero() {
    assert_eq!(sterilize(" ao1 "), "A01");
    assert_eq!(
        seed_from_string("OOPS").expect("valid"),
        seed_from_string("00PS").expect("valid")
    );
    assert_eq!(seed_from_string("abc").expect("lowercase"), seed_from_string("ABC").expect("upper"));
}

#[test]
fn base_35_digits() {
    assert_eq!(seed_from_string("10").expect("valid"), 35);
    assert_eq!(seed_from_string("Z").expect("valid"), 34);
    assert_eq!(seed_to_string(0), "0");
}

#[test]
fn bad_characters_are_rejected() {
    for raw in ["", "   ", "AB-12", "seed!"] {
        let err = seed_from_string(raw).expect_err("must fail");
        assert!(matches!(err, SimError::SeedFormat { .. }), "{raw}: got {err:?}");
    }
}

#[test]
fn seed_material_resolves_both_forms() {
    let text = SeedMaterial::from("ABC123");
    let numeric = SeedMaterial::from(seed_from_string("ABC123").expect("valid"));
    assert_eq!(text.resolve().expect("text"), numeric.resolve().expect("numeric"));

    let json: SeedMaterial = serde_json::from_str("\"ABC123\"").expect("string form");
    assert_eq!(json, text);
    let json: SeedMaterial = serde_json::from_str("42").expect("number form");
    assert_eq!(json, SeedMaterial::Numeric(42));
}

#[test]
fn seed_strings_have_known_values() {
    assert_eq!(seed_from_string("10").expect("valid"), 35);
    assert_eq!(seed_from_string("ZZ").expect("valid"), 1_224);
    assert_eq!(seed_from_string("SPIRE").expect("valid"), 41_568_849);
    assert_eq!(seed_from_string("ABC123").expect("valid"), 542_241_423);
    assert_eq!(seed_from_string("1234567890").expect("valid"), 83_520_032_329_615);
    assert_eq!(seed_to_string(7_592_253_339_725_112_178), "ZZZZZZZZZZZZZ");
}
