//! Normalized simulation results
//!
//! Units follow the classic MCML conventions: absorption density in 1/cm³,
//! depth-resolved absorption in 1/cm, radially resolved escape in 1/cm², and
//! angularly resolved escape in 1/sr. Summary scalars are fractions of the
//! launched light.

use crate::accumulator::RawTally;
use serde::{Deserialize, Serialize};

/// Dense row-major 2-D histogram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram2 {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl Histogram2 {
    /// Build from row-major values
    ///
    /// # Panics
    /// Panics if `values.len() != rows * cols`
    pub fn from_values(rows: usize, cols: usize, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), rows * cols, "histogram shape mismatch");
        Self { rows, cols, values }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.cols + col]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Light leaving the stack through one face (top or bottom)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscapeDistribution {
    /// Per (r, angle) cell, normalized by annulus area [1/cm²]
    pub per_cell: Histogram2,

    /// Per radial bin [1/cm²]
    pub by_radius: Vec<f64>,

    /// Per exit-angle bin [1/sr]
    pub by_angle: Vec<f64>,

    /// Fraction of launched light [-]
    pub total: f64,
}

/// Light absorbed inside the stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbsorptionDistribution {
    /// Fraction absorbed per layer, ambient layers included (always 0) [-]
    pub by_layer: Vec<f64>,

    /// Per (r, z) cell [1/cm³]; `None` when the grid was not recorded
    pub density: Option<Histogram2>,

    /// Per depth bin [1/cm]; `None` when the grid was not recorded
    pub by_depth: Option<Vec<f64>>,
}

/// Scalar summary of a simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub specular_reflectance: f64,
    pub diffuse_reflectance: f64,
    pub absorption: f64,
    pub transmittance: f64,

    /// Depth at which the absorbed light reaches 1/e of what entered [cm]
    pub penetration_depth: Option<f64>,
}

impl ResultSummary {
    /// Sum of all fates; ≈ 1 for a conserving simulation
    pub fn energy_balance(&self) -> f64 {
        self.specular_reflectance + self.diffuse_reflectance + self.absorption + self.transmittance
    }
}

/// Normalized output of one completed simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Output label copied from the descriptor
    pub label: String,

    /// SHA-256 of the descriptor that produced this result
    pub descriptor_hash: String,

    /// Photons the normalization is based on
    pub photons: u64,

    pub summary: ResultSummary,
    pub absorption: AbsorptionDistribution,
    pub reflectance: EscapeDistribution,
    pub transmittance: EscapeDistribution,

    /// Raw fixed-point tallies the result was computed from
    pub raw: RawTally,
}
