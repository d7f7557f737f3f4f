//! Cylindrical detection grid
//!
//! Absorption is binned by radial distance from the launch axis and depth
//! below the surface; escaping packets are binned by radial distance and
//! exit angle.
//!
//! # Bin boundaries
//!
//! Bin `k` covers the half-open interval `[k·w, (k+1)·w)`, with the edge
//! computed as `k as f64 * w`. A value lying exactly on an edge therefore
//! always lands in the upper bin. [`bin_index`] corrects the rounding of
//! `value / w` so this holds even when the division is inexact.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Geometry of the detection histograms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionGrid {
    /// Radial bin width [cm]
    pub dr: f64,

    /// Depth bin width [cm]
    pub dz: f64,

    /// Number of radial bins
    pub nr: usize,

    /// Number of depth bins
    pub nz: usize,

    /// Number of exit-angle bins over [0, π/2]
    pub na: usize,
}

/// Index of the bin containing `value` for bins of width `width`
///
/// Lower edges are inclusive. Non-positive and NaN values map to bin 0.
///
/// # Example
/// ```
/// use photon_transport_core_rs::models::grid::bin_index;
///
/// assert_eq!(bin_index(0.99, 0.5), 1);
/// assert_eq!(bin_index(1.0, 0.5), 2);
/// assert_eq!(bin_index(3.0 * 0.1, 0.1), 3);
/// ```
pub fn bin_index(value: f64, width: f64) -> usize {
    if !(value > 0.0) {
        return 0;
    }

    let mut k = (value / width).floor() as usize;

    if k > 0 && value < k as f64 * width {
        k -= 1;
    } else if value >= k.saturating_add(1) as f64 * width {
        k = k.saturating_add(1);
    }
    k
}

impl DetectionGrid {
    /// Angular bin width [rad]
    pub fn da(&self) -> f64 {
        PI / (2.0 * self.na as f64)
    }

    pub fn rz_len(&self) -> usize {
        self.nr * self.nz
    }

    pub fn ra_len(&self) -> usize {
        self.nr * self.na
    }

    /// Flat index of the absorption cell at radius `r` and depth `depth`
    ///
    /// `None` outside the grid; such deposits are not recorded in the grid.
    #[inline]
    pub fn absorption_cell(&self, r: f64, depth: f64) -> Option<usize> {
        let ir = bin_index(r, self.dr);
        let iz = bin_index(depth, self.dz);
        (ir < self.nr && iz < self.nz).then(|| ir * self.nz + iz)
    }

    /// Flat index of the escape cell for radius `r` and exit cosine `cos_exit`
    ///
    /// Radii and angles past the last bin are collected in the last bin.
    #[inline]
    pub fn escape_cell(&self, r: f64, cos_exit: f64) -> usize {
        let ir = bin_index(r, self.dr).min(self.nr - 1);
        let angle = cos_exit.abs().min(1.0).acos();
        let ia = bin_index(angle, self.da()).min(self.na - 1);
        ir * self.na + ia
    }

    /// Area of the annulus of radial bin `ir` [cm²]
    pub fn annulus_area(&self, ir: usize) -> f64 {
        PI * (2.0 * ir as f64 + 1.0) * self.dr * self.dr
    }

    /// Volume of the ring cell of radial bin `ir` [cm³]
    pub fn cell_volume(&self, ir: usize) -> f64 {
        self.annulus_area(ir) * self.dz
    }

    /// Solid angle of exit-angle bin `ia` [sr]
    pub fn solid_angle(&self, ia: usize) -> f64 {
        let da = self.da();
        4.0 * PI * ((ia as f64 + 0.5) * da).sin() * (0.5 * da).sin()
    }
}
