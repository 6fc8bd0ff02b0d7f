//! Deterministic Random Number Generator
//!
//! Uses Xorshift128+ for fast, seedable randomness. Board generation and
//! display names draw from this so a round can be reproduced from its seed.

use sha2::{Sha256, Digest};

/// Seedable PRNG using the Xorshift128+ algorithm.
///
/// Not cryptographically strong. Given the same seed it produces the same
/// sequence on every platform, which is what the board tests rely on.
///
/// # Example
///
/// ```
/// use minefield::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a random integer in range [0, max).
    #[inline]
    pub fn next_int(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        // Simple modulo - slight bias for very large max, but acceptable
        (self.next_u64() % max as u64) as u32
    }

    /// Generate a float uniformly distributed in [0, 1).
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        // Top 53 bits fill the f64 mantissa exactly
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Return true with the given probability.
    ///
    /// Probabilities at or below 0 are never true, at or above 1 always
    /// true. Still consumes one value so the sequence stays aligned.
    #[inline]
    pub fn chance(&mut self, probability: f64) -> bool {
        let roll = self.next_f64();
        if probability <= 0.0 {
            false
        } else if probability >= 1.0 {
            true
        } else {
            roll < probability
        }
    }

    /// Select a random element from a slice.
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        if slice.is_empty() {
            None
        } else {
            let idx = self.next_int(slice.len() as u32) as usize;
            Some(&slice[idx])
        }
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Seed material for processes started without a configured seed.
pub fn entropy_seed() -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    let id = uuid::Uuid::new_v4().as_u64_pair().0;
    nanos ^ id
}

/// Derive the board seed for a given round.
///
/// Every round gets its own seed so any round can be regenerated from the
/// process seed and the round number alone.
pub fn derive_round_seed(base_seed: u64, round: u64) -> u64 {
    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(b"MINEFIELD_ROUND_SEED_V1");
    hasher.update(base_seed.to_le_bytes());
    hasher.update(round.to_le_bytes());

    let hash = hasher.finalize();
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[0..8]);
    u64::from_le_bytes(seed)
}

// =============================================================================
// TESTS
// =============================================================================
