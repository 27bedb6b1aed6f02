//! Deterministic random number generation.
//!
//! RULE: Nothing in the engine may call any platform RNG.
//! All randomness flows through StreamRng instances derived from the
//! single run seed, owned by the RngRegistry.
//!
//! The primitive is a 128-bit xorshift generator seeded through the
//! MurmurHash3 finaliser. Every StreamRng draw advances the primitive by
//! exactly the calls the game client makes and bumps `counter` by one,
//! so a (seed, counter) pair pins the stream state for parity checks.

use crate::error::SimResult;
use crate::seed::SeedMaterial;

const NORM_DOUBLE: f64 = 1.0 / (1u64 << 53) as f64;
const NORM_FLOAT: f64 = 1.0 / (1u64 << 24) as f64;

fn murmur_hash3(mut x: u64) -> u64 {
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^= x >> 33;
    x = x.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    x ^= x >> 33;
    x
}

/// The xorshift128+ primitive behind every stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Xs128 {
    seed0: u64,
    seed1: u64,
}

impl Xs128 {
    pub fn new(seed: i64) -> Self {
        let s0 = murmur_hash3(if seed == 0 { i64::MIN as u64 } else { seed as u64 });
        Self { seed0: s0, seed1: murmur_hash3(s0) }
    }

    pub fn next_long(&mut self) -> i64 {
        let mut s1 = self.seed0;
        let s0 = self.seed1;
        self.seed0 = s0;
        s1 ^= s1 << 23;
        self.seed1 = s1 ^ s0 ^ (s1 >> 17) ^ (s0 >> 26);
        self.seed1.wrapping_add(s0) as i64
    }

    /// Uniform in [0, n). Rejection sampling on the top 63 bits.
    pub fn next_long_below(&mut self, n: i64) -> i64 {
        debug_assert!(n > 0, "bound must be positive");
        loop {
            let bits = ((self.next_long() as u64) >> 1) as i64;
            let value = bits % n;
            if bits.wrapping_sub(value).wrapping_add(n - 1) >= 0 {
                return value;
            }
        }
    }

    pub fn next_int(&mut self, n: i32) -> i32 {
        self.next_long_below(n as i64) as i32
    }

    pub fn next_double(&mut self) -> f64 {
        ((self.next_long() as u64) >> 11) as f64 * NORM_DOUBLE
    }

    pub fn next_float(&mut self) -> f32 {
        (((self.next_long() as u64) >> 40) as f64 * NORM_FLOAT) as f32
    }

    pub fn next_boolean(&mut self) -> bool {
        self.next_long() & 1 != 0
    }
}

/// 48-bit linear congruential generator with the host collection
/// library's semantics. Only used to shuffle lists seeded from a stream draw.
#[derive(Debug, Clone)]
pub struct Lcg48 {
    state: u64,
}

impl Lcg48 {
    const MULTIPLIER: u64 = 0x5_DEEC_E66D;
    const ADDEND: u64 = 0xB;
    const MASK: u64 = (1 << 48) - 1;

    pub fn new(seed: i64) -> Self {
        Self { state: (seed as u64 ^ Self::MULTIPLIER) & Self::MASK }
    }

    fn next(&mut self, bits: u32) -> i32 {
        self.state = self.state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::ADDEND)
            & Self::MASK;
        (self.state >> (48 - bits)) as u32 as i32
    }

    pub fn next_int(&mut self, bound: i32) -> i32 {
        debug_assert!(bound > 0, "bound must be positive");
        if bound & bound.wrapping_neg() == bound {
            return ((bound as i64 * self.next(31) as i64) >> 31) as i32;
        }
        loop {
            let bits = self.next(31);
            let value = bits % bound;
            if bits.wrapping_sub(value).wrapping_add(bound - 1) >= 0 {
                return value;
            }
        }
    }
}

/// Anything that can drive a collection shuffle.
pub trait ShuffleSource {
    fn next_int(&mut self, bound: i32) -> i32;
}

impl ShuffleSource for Xs128 {
    fn next_int(&mut self, bound: i32) -> i32 { Xs128::next_int(self, bound) }
}

impl ShuffleSource for Lcg48 {
    fn next_int(&mut self, bound: i32) -> i32 { Lcg48::next_int(self, bound) }
}

/// In-place shuffle with the host collection library's swap order.
pub fn shuffle<T, S: ShuffleSource>(items: &mut [T], source: &mut S) {
    for i in (2..=items.len()).rev() {
        let j = source.next_int(i as i32) as usize;
        items.swap(i - 1, j);
    }
}

/// A named, counted, deterministic RNG stream.
#[derive(Debug, Clone)]
pub struct StreamRng {
    pub name: &'static str,
    seed:     i64,
    counter:  u32,
    inner:    Xs128,
}

impl StreamRng {
    pub fn new(seed: i64) -> Self {
        Self {
            name:    "unnamed",
            seed,
            counter: 0,
            inner:   Xs128::new(seed),
        }
    }

    /// Rebuild a stream that has already made `counter` draws.
    pub fn with_counter(seed: i64, counter: u32) -> Self {
        let mut rng = Self::new(seed);
        for _ in 0..counter {
            rng.random_int(999);
        }
        rng
    }

    pub fn from_material(material: &SeedMaterial) -> SimResult<Self> {
        Ok(Self::new(material.resolve()?))
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn seed(&self) -> i64 { self.seed }

    pub fn counter(&self) -> u32 { self.counter }

    /// Uniform integer in [0, range].
    pub fn random_int(&mut self, range: i32) -> i32 {
        self.counter += 1;
        self.inner.next_int(range + 1)
    }

    /// Uniform integer in [start, end].
    pub fn random_range(&mut self, start: i32, end: i32) -> i32 {
        self.counter += 1;
        start + self.inner.next_int(end - start + 1)
    }

    pub fn next_long(&mut self) -> i64 {
        self.counter += 1;
        self.inner.next_long()
    }

    /// Float in [0, 1) at double precision.
    pub fn next_double(&mut self) -> f64 {
        self.counter += 1;
        self.inner.next_double()
    }

    /// Float in [0, 1) at single precision.
    pub fn random_float(&mut self) -> f32 {
        self.counter += 1;
        self.inner.next_float()
    }

    pub fn random_float_scaled(&mut self, range: f32) -> f32 {
        self.counter += 1;
        self.inner.next_float() * range
    }

    pub fn random_float_range(&mut self, start: f32, end: f32) -> f32 {
        self.counter += 1;
        start + self.inner.next_float() * (end - start)
    }

    pub fn random_boolean(&mut self) -> bool {
        self.counter += 1;
        self.inner.next_boolean()
    }

    pub fn random_boolean_chance(&mut self, chance: f32) -> bool {
        self.counter += 1;
        self.inner.next_float() < chance
    }

    /// Advance with boolean draws until `counter` reaches `target`.
    /// Never moves backwards.
    pub fn set_counter(&mut self, target: u32) {
        while self.counter < target {
            self.random_boolean();
        }
    }

    /// Shuffle straight off the primitive. Does not touch `counter`.
    pub fn shuffle_uncounted<T>(&mut self, items: &mut [T]) {
        shuffle(items, &mut self.inner);
    }

    /// Shuffle with a secondary LCG seeded from one counted `next_long`.
    pub fn shuffle_seeded<T>(&mut self, items: &mut [T]) {
        let mut lcg = Lcg48::new(self.next_long());
        shuffle(items, &mut lcg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn murmur_of_zero_is_zero() {
        assert_eq!(murmur_hash3(0), 0);
    }

    #[test]
    fn zero_seed_is_remapped() {
        let a = Xs128::new(0);
        let b = Xs128::new(i64::MIN);
        assert_eq!(a, b);
    }

    #[test]
    fn bounded_draws_stay_in_range() {
        let mut rng = StreamRng::new(987_654_321);
        for _ in 0..2_000 {
            let v = rng.random_range(-5, 5);
            assert!((-5..=5).contains(&v), "got {v}");
            let f = rng.random_float();
            assert!((0.0..1.0).contains(&f), "got {f}");
            let d = rng.next_double();
            assert!((0.0..1.0).contains(&d), "got {d}");
        }
        assert_eq!(rng.counter(), 6_000);
    }

    #[test]
    fn murmur_known_answer() {
        assert_eq!(murmur_hash3(1) as i64, -5_451_962_507_482_445_012);
    }

    // Reference values from libGDX RandomXS128 and java.util.Random.

    #[test]
    fn xs128_known_answers() {
        let mut rng = Xs128::new(1);
        assert_eq!(rng.next_long(), 3_787_875_997_830_008_111);
        assert_eq!(rng.next_long(), 7_110_081_793_310_507_210);
        assert_eq!(Xs128::new(0).next_long(), 2_940_871_956_904_845_945);
        assert_eq!(Xs128::new(-1).next_long(), -7_651_268_203_606_709_133);
    }

    #[test]
    fn stream_random_int_known_answers() {
        let mut rng = StreamRng::new(12_345);
        let drawn: Vec<i32> = (0..5).map(|_| rng.random_int(999)).collect();
        assert_eq!(drawn, vec![186, 102, 38, 877, 874]);
    }

    #[test]
    fn lcg_known_answers() {
        assert_eq!(Lcg48::new(42).next(32), -1_170_105_035);
        assert_eq!(Lcg48::new(42).next_int(10), 0);
        assert_eq!(Lcg48::new(42).next_int(1 << 30), 781_215_565);
        let mut lcg = Lcg48::new(42);
        let drawn: Vec<i32> = (0..5).map(|_| lcg.next_int(100)).collect();
        assert_eq!(drawn, vec![30, 63, 48, 84, 70]);
    }

    #[test]
    fn lcg_shuffle_known_answer() {
        let mut items: Vec<u32> = (0..10).collect();
        shuffle(&mut items, &mut Lcg48::new(42));
        assert_eq!(items, vec![4, 6, 2, 1, 7, 9, 8, 5, 3, 0]);
    }

    #[test]
    fn lcg_power_of_two_bound() {
        let mut lcg = Lcg48::new(42);
        for _ in 0..500 {
            let v = lcg.next_int(8);
            assert!((0..8).contains(&v));
        }
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut items: Vec<u32> = (0..20).collect();
        let mut lcg = Lcg48::new(-77);
        shuffle(&mut items, &mut lcg);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }
}
