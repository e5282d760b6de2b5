//! Deterministic PRNG for spawn-table resolution.
//!
//! Uses the SplitMix64 algorithm: fast, 8 bytes of state, and reproducible
//! across platforms so a given seed always spawns the same items.

use fixed::types::I32F32;

/// Q32.32 probability in [0, 1].
pub type Probability = I32F32;

/// SplitMix64 pseudo-random number generator.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SpawnRng {
    state: u64,
}

impl SpawnRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Returns `true` with the given probability.
    ///
    /// - probability <= 0 always returns false
    /// - probability >= 1 always returns true
    pub fn chance(&mut self, probability: Probability) -> bool {
        if probability <= Probability::ZERO {
            return false;
        }
        if probability >= Probability::from_num(1) {
            return true;
        }
        // For p in (0,1) the raw Q32.32 bits are the fraction scaled to
        // [0, 2^32); compare against a uniform u32.
        let upper = (self.next_u64() >> 32) as u32;
        (upper as u64) < probability.to_bits() as u64
    }

    /// Returns `true` with `percent`% probability.
    pub fn percent(&mut self, percent: i32) -> bool {
        self.chance(Probability::from_num(percent.clamp(0, 100)) / Probability::from_num(100))
    }

    /// Uniform integer in `[0, bound)`. Returns 0 when `bound` is 0.
    pub fn below(&mut self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        self.next_u64() % bound
    }

    /// Uniform integer in `[lo, hi]`. Bounds are swapped if reversed.
    pub fn range_inclusive(&mut self, lo: i32, hi: i32) -> i32 {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        let span = (hi as i64 - lo as i64 + 1) as u64;
        (lo as i64 + self.below(span) as i64) as i32
    }

    pub fn state(&self) -> u64 {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let mut a = SpawnRng::new(42);
        let mut b = SpawnRng::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn percent_bounds() {
        let mut rng = SpawnRng::new(7);
        for _ in 0..100 {
            assert!(!rng.percent(0));
            assert!(rng.percent(100));
        }
    }

    #[test]
    fn percent_half_is_roughly_half() {
        let mut rng = SpawnRng::new(12345);
        let hits = (0..10_000).filter(|_| rng.percent(50)).count();
        assert!((4_500..5_500).contains(&hits), "hits = {hits}");
    }

    #[test]
    fn range_inclusive_stays_in_bounds() {
        let mut rng = SpawnRng::new(3);
        for _ in 0..1000 {
            let v = rng.range_inclusive(2, 5);
            assert!((2..=5).contains(&v));
        }
        assert_eq!(rng.range_inclusive(4, 4), 4);
        let v = rng.range_inclusive(9, 1);
        assert!((1..=9).contains(&v));
    }

    #[test]
    fn below_zero_is_zero() {
        let mut rng = SpawnRng::new(1);
        assert_eq!(rng.below(0), 0);
    }
}
