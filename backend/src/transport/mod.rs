//! Photon transport kernel
//!
//! The per-photon random walk of the MCML method:
//!
//! ```text
//! launch → loop {
//!     draw step size (exponential, scaled by the layer's mean free path)
//!     if the step reaches a boundary:
//!         move to the boundary, Fresnel reflect or transmit
//!         transmit into an ambient layer → record escape, done
//!     else:
//!         move, deposit absorbed weight, scatter (Henyey-Greenstein)
//!     roulette if the weight is small
//! }
//! ```
//!
//! - **boundary**: Fresnel reflectance and Snell refraction
//! - **scatter**: Henyey-Greenstein direction sampling
//! - **roulette**: Russian roulette configuration
//! - **kernel**: the state machine tying them together

pub mod boundary;
pub mod kernel;
pub mod roulette;
pub mod scatter;

pub use kernel::{KernelScratch, PhotonFate, TransportKernel};
pub use roulette::RouletteConfig;
