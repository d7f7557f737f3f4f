//! Constants used by the photon transport kernel
//!
//! Roulette defaults follow the classic MCML choices: packets below
//! `1e-4` of a photon's weight play a 1-in-10 roulette.

/// Weight below which a packet plays Russian roulette
pub const DEFAULT_ROULETTE_THRESHOLD: f64 = 1e-4;

/// Probability that a packet survives the roulette (1 / ROULETTE_FACTOR)
pub const DEFAULT_SURVIVAL_CHANCE: f64 = 0.1;

/// Direction cosines with magnitude above this are treated as parallel to z
pub const COS_ZERO: f64 = 1.0 - 1.0e-12;

/// Interaction lengths at or above this value mean the layer never interacts.
///
/// Input decks mark non-scattering (glass) layers with `FLT_MAX`, so any
/// reciprocal coefficient at least that large is ballistic.
pub const BALLISTIC_MUTR: f64 = f32::MAX as f64;

/// Default number of photons launched together in one wave on a device
pub const DEFAULT_UNITS_PER_WAVE: usize = 4096;

/// Default number of absorption grid replicas
pub const DEFAULT_ABSORPTION_COPIES: usize = 4;
