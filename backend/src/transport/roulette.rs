//! Russian roulette for low-weight packets
//!
//! A packet whose weight drops below `threshold` survives with probability
//! `survival_chance`, in which case its weight is divided by that chance.
//! The expected weight carried forward is unchanged.

use crate::core::constants::{DEFAULT_ROULETTE_THRESHOLD, DEFAULT_SURVIVAL_CHANCE};
use crate::core::WEIGHT_SCALE;
use crate::models::PhotonState;
use serde::{Deserialize, Serialize};

/// Roulette parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouletteConfig {
    /// Weight below which the roulette is played; 0 disables it
    pub threshold: f64,

    /// Survival probability (1 / ROULETTE_FACTOR)
    pub survival_chance: f64,
}

impl Default for RouletteConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_ROULETTE_THRESHOLD,
            survival_chance: DEFAULT_SURVIVAL_CHANCE,
        }
    }
}

impl RouletteConfig {
    /// No roulette: packets run until they escape or can no longer
    /// register a single tally unit
    pub fn disabled() -> Self {
        Self {
            threshold: 0.0,
            survival_chance: 1.0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.threshold > 0.0
    }

    /// Weight multiplier applied to survivors
    pub fn factor(&self) -> f64 {
        1.0 / self.survival_chance
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.threshold >= 0.0 && self.threshold.is_finite()) {
            return Err(format!("roulette threshold {} must be >= 0", self.threshold));
        }
        if !(self.survival_chance > 0.0 && self.survival_chance <= 1.0) {
            return Err(format!(
                "survival chance {} outside (0, 1]",
                self.survival_chance
            ));
        }
        Ok(())
    }

    /// Apply the end-of-step termination rules
    ///
    /// Returns `false` when the packet was terminated.
    pub fn play(&self, photon: &mut PhotonState) -> bool {
        if photon.weight <= 0.0 {
            photon.terminate();
            return false;
        }

        if self.is_enabled() {
            if photon.weight < self.threshold {
                if photon.rng.next_f64() < self.survival_chance {
                    photon.weight *= self.factor();
                } else {
                    photon.terminate();
                    return false;
                }
            }
        } else if photon.weight * WEIGHT_SCALE < 1.0 {
            photon.terminate();
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::PhotonRng;

    fn photon(weight: f64, seed: u64) -> PhotonState {
        let mut p = PhotonState::launch(1.0, 0.0, PhotonRng::new(seed));
        p.weight = weight;
        p
    }

    #[test]
    fn test_heavy_packets_untouched() {
        let roulette = RouletteConfig::default();
        let mut p = photon(0.5, 1);
        assert!(roulette.play(&mut p));
        assert_eq!(p.weight, 0.5);
    }

    #[test]
    fn test_zero_weight_terminates() {
        let mut p = photon(0.0, 1);
        assert!(!RouletteConfig::disabled().play(&mut p));
        assert!(!p.alive);
    }

    #[test]
    fn test_roulette_preserves_expected_weight() {
        let roulette = RouletteConfig::default();
        let n = 200_000;
        let w = 5e-5;
        let mut carried = 0.0;
        let mut survivors = 0;
        for seed in 0..n {
            let mut p = photon(w, seed + 1);
            if roulette.play(&mut p) {
                survivors += 1;
                carried += p.weight;
            }
        }
        let expected = w * n as f64;
        assert!((carried - expected).abs() / expected < 0.05);
        assert!(survivors > 0 && survivors < n);
    }

    #[test]
    fn test_invalid_chance_rejected() {
        let cfg = RouletteConfig {
            threshold: 1e-4,
            survival_chance: 0.0,
        };
        assert!(cfg.validate().is_err());
        assert!(RouletteConfig::default().validate().is_ok());
    }
}
