//! Deterministic random number generation
//!
//! Uses the xorshift64* algorithm for the per-photon generators. Every photon
//! owns its own generator, derived by [`RandomStreamProvider`] from the run
//! seed and the photon's global index. There is no process-wide random state.
//! CRITICAL: All randomness in the engine MUST go through this module.

mod streams;
mod xorshift;

pub use streams::{splitmix64, RandomStreamProvider};
pub use xorshift::PhotonRng;
