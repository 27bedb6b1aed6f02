//! Seed encoding.
//!
//! Seeds are typed by players as base-35 strings over the alphabet
//! `0-9 A-Z` without the letter `O` (read as zero). The numeric seed is the
//! base-35 value accumulated with 64-bit wrapping arithmetic, so every
//! `i64` has exactly one canonical string and vice versa up to leading zeros.

use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};

const SEED_ALPHABET: &[u8; 35] = b"0123456789ABCDEFGHIJKLMNPQRSTUVWXYZ";
const BASE: u64 = 35;

/// Normalise a typed seed: trim, uppercase, `O` → `0`.
pub fn sterilize(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| c.to_ascii_uppercase())
        .map(|c| if c == 'O' { '0' } else { c })
        .collect()
}

/// Convert a seed string to the numeric seed.
pub fn seed_from_string(raw: &str) -> SimResult<i64> {
    let clean = sterilize(raw);
    if clean.is_empty() {
        return Err(SimError::SeedFormat {
            input:  raw.to_string(),
            reason: "empty seed".into(),
        });
    }

    let mut total: u64 = 0;
    for c in clean.bytes() {
        let digit = SEED_ALPHABET
            .iter()
            .position(|&a| a == c)
            .ok_or_else(|| SimError::SeedFormat {
                input:  raw.to_string(),
                reason: format!("character '{}' is not in the seed alphabet", c as char),
            })?;
        total = total.wrapping_mul(BASE).wrapping_add(digit as u64);
    }
    Ok(total as i64)
}

/// Convert a numeric seed to its canonical string (no leading zeros).
/// The seed is read as an unsigned 64-bit value.
pub fn seed_to_string(seed: i64) -> String {
    let mut left = seed as u64;
    if left == 0 {
        return "0".into();
    }
    let mut digits = Vec::new();
    while left > 0 {
        digits.push(SEED_ALPHABET[(left % BASE) as usize]);
        left /= BASE;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// Seed material accepted at the edges of the engine.
/// Serialised untagged: a JSON string is typed text, a number is numeric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeedMaterial {
    Text(String),
    Numeric(i64),
}

impl SeedMaterial {
    pub fn resolve(&self) -> SimResult<i64> {
        match self {
            Self::Text(s)    => seed_from_string(s),
            Self::Numeric(n) => Ok(*n),
        }
    }
}

impl From<i64> for SeedMaterial {
    fn from(n: i64) -> Self { Self::Numeric(n) }
}

impl From<&str> for SeedMaterial {
    fn from(s: &str) -> Self { Self::Text(s.to_string()) }
}

impl From<String> for SeedMaterial {
    fn from(s: String) -> Self { Self::Text(s) }
}
