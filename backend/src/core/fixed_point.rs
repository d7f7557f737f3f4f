//! Fixed-point photon weight
//!
//! Every deposit into a detection histogram is converted to an integer number
//! of weight units before it is combined. Integer addition is associative, so
//! the final tallies do not depend on the order in which thousands of photon
//! workers happen to commit their deposits.

/// Integer tally units per unit of photon weight
pub const WEIGHT_SCALE: f64 = 12_000_000.0;

/// Convert a photon weight to tally units (truncating toward zero)
///
/// Negative and NaN weights convert to zero.
///
/// # Example
/// ```
/// use photon_transport_core_rs::core::{weight_to_units, WEIGHT_SCALE};
///
/// assert_eq!(weight_to_units(1.0), WEIGHT_SCALE as u64);
/// assert_eq!(weight_to_units(-0.5), 0);
/// ```
#[inline]
pub fn weight_to_units(weight: f64) -> u64 {
    (weight * WEIGHT_SCALE) as u64
}

/// Convert accumulated tally units back to photon weight
#[inline]
pub fn units_to_weight(units: u64) -> f64 {
    units as f64 / WEIGHT_SCALE
}
