//! Shared numeric foundations for the transport engine
//!
//! - **constants**: physical and algorithmic constants
//! - **fixed_point**: conversion between photon weight and integer tally units

pub mod constants;
pub mod fixed_point;

pub use fixed_point::{units_to_weight, weight_to_units, WEIGHT_SCALE};
