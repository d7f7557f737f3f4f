//! xorshift64* random number generator
//!
//! Fast, small-state PRNG used for every photon packet.
//!
//! # Algorithm
//!
//! xorshift64* is a variant of xorshift that passes TestU01's BigCrush
//! statistical tests. It uses 64-bit state and produces 64-bit output.
//! Floating-point draws use the upper 53 bits.
//!
//! # Determinism
//!
//! Same state → same sequence of draws, which makes every photon's random walk
//! replayable from its stream key alone.

use serde::{Deserialize, Serialize};

/// Per-photon deterministic random number generator using xorshift64*
///
/// # Example
/// ```
/// use photon_transport_core_rs::rng::PhotonRng;
///
/// let mut rng = PhotonRng::new(12345);
/// let u = rng.next_f64();
/// assert!(u >= 0.0 && u < 1.0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotonRng {
    /// Internal state (64-bit, never zero)
    state: u64,
}

const INV_2_53: f64 = 1.0 / ((1u64 << 53) as f64);

impl PhotonRng {
    /// Create a generator from a raw state
    ///
    /// A zero state is replaced by 1 (xorshift requirement).
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Generate next random u64 value
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Uniform draw in [0.0, 1.0)
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * INV_2_53
    }

    /// Uniform draw in (0.0, 1.0]
    ///
    /// Safe to pass to `ln()` without producing infinities.
    #[inline]
    pub fn next_f64_open_closed(&mut self) -> f64 {
        ((self.next_u64() >> 11) + 1) as f64 * INV_2_53
    }

    /// Get current state (for replay)
    pub fn get_state(&self) -> u64 {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_seed_converted_to_nonzero() {
        let rng = PhotonRng::new(0);
        assert_ne!(rng.get_state(), 0, "Zero seed should be converted to 1");
    }

    #[test]
    fn test_next_f64_in_range() {
        let mut rng = PhotonRng::new(12345);

        for _ in 0..1000 {
            let val = rng.next_f64();
            assert!(
                (0.0..1.0).contains(&val),
                "next_f64() produced value {} outside [0.0, 1.0)",
                val
            );
        }
    }

    #[test]
    fn test_open_closed_never_zero() {
        let mut rng = PhotonRng::new(777);

        for _ in 0..1000 {
            let val = rng.next_f64_open_closed();
            assert!(val > 0.0 && val <= 1.0);
            assert!(val.ln().is_finite());
        }
    }

    #[test]
    fn test_replay_from_state() {
        let mut rng1 = PhotonRng::new(99999);
        for _ in 0..10 {
            rng1.next_u64();
        }

        let mut rng2 = PhotonRng::new(rng1.get_state());
        for _ in 0..100 {
            assert_eq!(rng1.next_f64(), rng2.next_f64());
        }
    }
}
