//! Random stream fan-out
//!
//! Turns one run seed into an independent generator per execution unit with a
//! pure function `(seed, unit index) → stream`. Keys are scrambled through the
//! SplitMix64 finalizer so that adjacent photon indices start from unrelated
//! xorshift states.

use super::PhotonRng;
use serde::{Deserialize, Serialize};

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// SplitMix64 output function
///
/// A bijective 64-bit mixer; equal inputs give equal outputs and
/// neighbouring inputs give statistically unrelated outputs.
#[inline]
pub fn splitmix64(value: u64) -> u64 {
    let mut z = value.wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Deterministic source of per-unit random streams
///
/// # Example
/// ```
/// use photon_transport_core_rs::rng::RandomStreamProvider;
///
/// let provider = RandomStreamProvider::new(42);
/// let mut a = provider.stream(7);
/// let mut b = provider.stream(7);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomStreamProvider {
    seed: u64,
}

impl RandomStreamProvider {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Provider for the `index`-th simulation of a run
    ///
    /// Gives each simulation of a batch its own family of streams, so that two
    /// identical descriptors in one batch are still independent samples.
    pub fn derive(&self, index: u64) -> Self {
        Self::new(splitmix64(self.seed ^ splitmix64(index.wrapping_mul(GOLDEN_GAMMA))))
    }

    /// Generator for execution unit `unit`
    pub fn stream(&self, unit: u64) -> PhotonRng {
        let key = splitmix64(self.seed.wrapping_add(splitmix64(unit)));
        PhotonRng::new(splitmix64(key))
    }
}
