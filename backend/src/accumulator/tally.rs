//! Finalized raw tallies

use crate::core::units_to_weight;
use serde::{Deserialize, Serialize};

/// Integer histogram contents of a finished (or checkpointed) simulation
///
/// Layouts: absorption `[ir * nz + iz]`, escape grids `[ir * na + ia]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTally {
    pub nr: usize,
    pub nz: usize,
    pub na: usize,

    /// Absorption grid; `None` when not recorded
    pub absorption: Option<Vec<u64>>,

    /// Absorption per layer (ambient layers included)
    pub layers: Vec<u64>,

    pub reflectance: Vec<u64>,
    pub transmittance: Vec<u64>,
}

impl RawTally {
    pub fn absorbed_units(&self) -> u64 {
        self.layers.iter().sum()
    }

    /// Units absorbed inside the detection grid
    pub fn grid_absorbed_units(&self) -> u64 {
        self.absorption.as_ref().map_or(0, |a| a.iter().sum())
    }

    pub fn reflected_units(&self) -> u64 {
        self.reflectance.iter().sum()
    }

    pub fn transmitted_units(&self) -> u64 {
        self.transmittance.iter().sum()
    }

    /// Every unit deposited anywhere
    pub fn total_units(&self) -> u64 {
        self.absorbed_units() + self.reflected_units() + self.transmitted_units()
    }

    /// Total deposited weight, in photon-weight units
    pub fn total_weight(&self) -> f64 {
        units_to_weight(self.total_units())
    }

    /// True when `other` has the same histogram shapes
    pub fn same_shape(&self, other: &RawTally) -> bool {
        self.nr == other.nr
            && self.nz == other.nz
            && self.na == other.na
            && self.layers.len() == other.layers.len()
            && self.absorption.is_some() == other.absorption.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals() {
        let tally = RawTally {
            nr: 1,
            nz: 2,
            na: 1,
            absorption: Some(vec![3, 4]),
            layers: vec![0, 9, 0],
            reflectance: vec![5],
            transmittance: vec![6],
        };
        assert_eq!(tally.absorbed_units(), 9);
        assert_eq!(tally.grid_absorbed_units(), 7);
        assert_eq!(tally.total_units(), 20);
    }
}
