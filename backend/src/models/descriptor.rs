//! Simulation descriptor
//!
//! One fully-populated description of a simulation run, handed over by the
//! ingestion layer. The engine does not parse anything itself; it only guards
//! the numeric properties it relies on (see [`SimulationDescriptor::validate`]).

use crate::models::grid::DetectionGrid;
use crate::models::layer::Layer;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric guard failures on a descriptor
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DescriptorError {
    #[error("Layer stack needs two ambient layers, got {0} layers in total")]
    MissingAmbientLayers(usize),

    #[error("Layer {index}: {reason}")]
    InvalidLayer { index: usize, reason: String },

    #[error("Layers {upper} and {lower} are not contiguous")]
    NonContiguousLayers { upper: usize, lower: usize },

    #[error("Detection grid: {0}")]
    InvalidGrid(String),

    #[error("Photon count must be positive")]
    NoPhotons,

    #[error("Start weight {0} outside [0, 1]")]
    InvalidStartWeight(f64),
}

/// Output encoding requested by the input deck (used by the I/O layer only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    Ascii,
    Binary,
}

/// Identifying metadata passed through to the output collaborator
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DescriptorLabels {
    /// Source of the description (e.g. the input file name)
    pub input: String,

    /// Name of the output record
    pub output: String,

    pub format: OutputFormat,
}

/// Complete specification of one simulation run
///
/// `layers` includes the ambient medium above (index 0) and below (last
/// index); `n_layers()` counts only the real layers between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationDescriptor {
    pub layers: Vec<Layer>,

    pub grid: DetectionGrid,

    /// Number of photon packets to launch
    pub photons: u64,

    /// Launch weight after specular reflection at the surface
    pub start_weight: f64,

    /// Record the (r, z) absorption grid (escape grids are always recorded)
    pub record_absorption: bool,

    #[serde(default)]
    pub labels: DescriptorLabels,
}

/// Launch weight left after specular reflection at normal incidence
///
/// # Example
/// ```
/// use photon_transport_core_rs::models::descriptor::specular_start_weight;
///
/// assert_eq!(specular_start_weight(1.0, 1.0), 1.0);
/// assert!((specular_start_weight(1.0, 1.5) - 0.96).abs() < 1e-12);
/// ```
pub fn specular_start_weight(n_ambient: f64, n_first: f64) -> f64 {
    let r = (n_ambient - n_first) / (n_ambient + n_first);
    1.0 - r * r
}

impl SimulationDescriptor {
    /// Descriptor with the launch weight derived from the surface indices
    pub fn new(layers: Vec<Layer>, grid: DetectionGrid, photons: u64) -> Self {
        let start_weight = match layers.get(1) {
            Some(first) if layers.len() > 2 => specular_start_weight(layers[0].n, first.n),
            _ => 1.0,
        };

        Self {
            layers,
            grid,
            photons,
            start_weight,
            record_absorption: true,
            labels: DescriptorLabels::default(),
        }
    }

    /// Set the output label
    pub fn with_output_label(mut self, label: impl Into<String>) -> Self {
        self.labels.output = label.into();
        self
    }

    /// Enable or disable the absorption grid
    pub fn with_absorption_grid(mut self, record: bool) -> Self {
        self.record_absorption = record;
        self
    }

    /// Number of real (non-ambient) layers
    pub fn n_layers(&self) -> usize {
        self.layers.len().saturating_sub(2)
    }

    /// Depth of the entry surface [cm]
    pub fn surface_z(&self) -> f64 {
        if self.n_layers() > 0 {
            self.layers[1].z_min
        } else {
            0.0
        }
    }

    /// Total thickness of the real layers [cm]
    pub fn tissue_depth(&self) -> f64 {
        match self.n_layers() {
            0 => 0.0,
            n => self.layers[n].z_max - self.layers[1].z_min,
        }
    }

    /// Fraction of the incident light lost to specular reflection
    pub fn specular_loss(&self) -> f64 {
        1.0 - self.start_weight
    }

    /// Check the numeric properties the engine relies on
    ///
    /// Only guards that would otherwise produce divisions by zero, NaNs or
    /// out-of-range indices are checked. Structural validation is the
    /// ingestion layer's responsibility.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.layers.len() < 2 {
            return Err(DescriptorError::MissingAmbientLayers(self.layers.len()));
        }

        let grid = &self.grid;
        if !(grid.dr > 0.0 && grid.dr.is_finite()) {
            return Err(DescriptorError::InvalidGrid(format!(
                "dr must be positive, got {}",
                grid.dr
            )));
        }
        if !(grid.dz > 0.0 && grid.dz.is_finite()) {
            return Err(DescriptorError::InvalidGrid(format!(
                "dz must be positive, got {}",
                grid.dz
            )));
        }
        if grid.nr == 0 || grid.nz == 0 || grid.na == 0 {
            return Err(DescriptorError::InvalidGrid(format!(
                "bin counts must be at least 1, got nr={} nz={} na={}",
                grid.nr, grid.nz, grid.na
            )));
        }

        if self.photons == 0 {
            return Err(DescriptorError::NoPhotons);
        }

        if !(0.0..=1.0).contains(&self.start_weight) {
            return Err(DescriptorError::InvalidStartWeight(self.start_weight));
        }

        for (index, layer) in self.layers.iter().enumerate() {
            if !(layer.n > 0.0 && layer.n.is_finite()) {
                return Err(DescriptorError::InvalidLayer {
                    index,
                    reason: format!("refractive index must be positive, got {}", layer.n),
                });
            }
        }

        let last = self.layers.len() - 1;
        for index in 1..last {
            let layer = &self.layers[index];
            let invalid = |reason: String| DescriptorError::InvalidLayer { index, reason };

            if !(-1.0..=1.0).contains(&layer.g) {
                return Err(invalid(format!("anisotropy {} outside [-1, 1]", layer.g)));
            }
            if !(layer.mua >= 0.0 && layer.mua.is_finite()) {
                return Err(invalid(format!("absorption {} must be >= 0", layer.mua)));
            }
            if !(layer.mutr > 0.0) {
                return Err(invalid(format!("mutr {} must be > 0", layer.mutr)));
            }
            if !(layer.z_min < layer.z_max) || !layer.z_min.is_finite() || !layer.z_max.is_finite() {
                return Err(invalid(format!(
                    "z_min {} must be below z_max {}",
                    layer.z_min, layer.z_max
                )));
            }
            if index > 1 && self.layers[index - 1].z_max != layer.z_min {
                return Err(DescriptorError::NonContiguousLayers {
                    upper: index - 1,
                    lower: index,
                });
            }
        }

        Ok(())
    }
}
