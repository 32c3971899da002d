//! Small deterministic generators used where results must be bit-reproducible
//! from a seed, independent of the `rand` crate's algorithm choices.

use rand::RngCore;

/// Uniform randomness consumed by shuffles and resampling.
///
/// Implemented for every [`RngCore`], so callers can hand in either one of the
/// fixed generators below or any `rand` generator.
pub trait RandomSource {
    /// Next raw 32-bit output.
    fn raw(&mut self) -> u32;

    /// Uniform draw in `[0, 1)`.
    fn next(&mut self) -> f64 {
        f64::from(self.raw()) / 4_294_967_296.0
    }

    /// Uniform index in `0..n`. Returns 0 when `n == 0`.
    fn int(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        ((self.next() * n as f64) as usize).min(n - 1)
    }
}

impl<R: RngCore + ?Sized> RandomSource for R {
    fn raw(&mut self) -> u32 {
        self.next_u32()
    }
}

/// Marsaglia xorshift32 generator (shift triple 13/17/5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Xorshift32 {
    state: u32,
}

impl Xorshift32 {
    /// Build a generator; a zero seed is replaced by 1 since zero is a fixed point.
    #[must_use]
    pub const fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Current internal state.
    #[must_use]
    pub const fn state(&self) -> u32 {
        self.state
    }
}

impl RngCore for Xorshift32 {
    fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    fn next_u64(&mut self) -> u64 {
        let hi = u64::from(self.next_u32());
        let lo = u64::from(self.next_u32());
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        fill_from_u32(self, dst);
    }
}

/// Numerical Recipes 32-bit linear congruential generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lcg32 {
    state: u32,
}

impl Lcg32 {
    const MULTIPLIER: u32 = 1_664_525;
    const INCREMENT: u32 = 1_013_904_223;

    #[must_use]
    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }
}

impl RngCore for Lcg32 {
    fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT);
        self.state
    }

    fn next_u64(&mut self) -> u64 {
        let hi = u64::from(self.next_u32());
        let lo = u64::from(self.next_u32());
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        fill_from_u32(self, dst);
    }
}

fn fill_from_u32<R: RngCore>(rng: &mut R, dst: &mut [u8]) {
    for chunk in dst.chunks_mut(4) {
        let bytes = rng.next_u32().to_le_bytes();
        chunk.copy_from_slice(&bytes[..chunk.len()]);
    }
}

/// Fisher-Yates shuffle driven by raw 32-bit draws (`j = raw % (i + 1)`).
pub fn shuffle_in_place<T, R: RandomSource + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = (rng.raw() % (i as u32 + 1)) as usize;
        items.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::SmallRng};

    #[test]
    fn xorshift_zero_seed_is_promoted() {
        let mut rng = Xorshift32::new(0);
        assert_eq!(rng.state(), 1);
        // 1 -> 1 ^ (1 << 13) = 8193; ^ (8193 >> 17) = 8193; ^ (8193 << 5) = 270369
        assert_eq!(rng.next_u32(), 270_369);
    }

    #[test]
    fn lcg_matches_reference_sequence() {
        let mut rng = Lcg32::new(0);
        assert_eq!(rng.next_u32(), 1_013_904_223);
        assert_eq!(rng.next_u32(), 1_196_435_762);
    }

    #[test]
    fn unit_draws_stay_in_half_open_interval() {
        let mut rng = Lcg32::new(7);
        for _ in 0..10_000 {
            let v = rng.next();
            assert!((0.0..1.0).contains(&v));
            assert!(rng.int(5) < 5);
        }
        assert_eq!(rng.int(0), 0);
    }

    #[test]
    fn shuffle_is_a_permutation_and_seed_stable() {
        let mut a: Vec<u32> = (0..50).collect();
        let mut b = a.clone();
        shuffle_in_place(&mut a, &mut Xorshift32::new(999));
        shuffle_in_place(&mut b, &mut Xorshift32::new(999));
        assert_eq!(a, b);
        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn rand_generators_are_random_sources() {
        let mut rng = SmallRng::seed_from_u64(3);
        let idx = RandomSource::int(&mut rng, 10);
        assert!(idx < 10);
    }
}
