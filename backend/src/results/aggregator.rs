//! Normalization of raw tallies
//!
//! Every raw unit is `1 / WEIGHT_SCALE` of a photon weight. Quantities are
//! divided by the number of photons actually launched and by the cell
//! geometry (annulus area, ring volume, solid angle) as appropriate.

use crate::accumulator::RawTally;
use crate::core::WEIGHT_SCALE;
use crate::models::{
    AbsorptionDistribution, DetectionGrid, EscapeDistribution, Histogram2, ResultSummary, SimulationDescriptor,
    SimulationResult,
};
use std::f64::consts::E;

/// Builds [`SimulationResult`]s from raw tallies
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator;

impl ResultAggregator {
    /// Normalize `raw` for `photons` launched packets of `descriptor`
    ///
    /// `photons` may be lower than `descriptor.photons` for partial results.
    pub fn aggregate(
        descriptor: &SimulationDescriptor,
        raw: RawTally,
        photons: u64,
        descriptor_hash: String,
    ) -> SimulationResult {
        let grid = &descriptor.grid;
        let n = photons.max(1) as f64;
        let scale = WEIGHT_SCALE * n;

        let summary = ResultSummary {
            specular_reflectance: descriptor.specular_loss(),
            diffuse_reflectance: raw.reflected_units() as f64 / scale,
            absorption: raw.absorbed_units() as f64 / scale,
            transmittance: raw.transmitted_units() as f64 / scale,
            penetration_depth: raw
                .absorption
                .as_ref()
                .map(|cells| penetration_depth(cells, raw.transmitted_units(), grid, descriptor.tissue_depth())),
        };

        let absorption = AbsorptionDistribution {
            by_layer: raw.layers.iter().map(|&u| u as f64 / scale).collect(),
            density: raw.absorption.as_ref().map(|cells| {
                let values = cells
                    .iter()
                    .enumerate()
                    .map(|(i, &u)| u as f64 / (grid.cell_volume(i / grid.nz) * scale))
                    .collect();
                Histogram2::from_values(grid.nr, grid.nz, values)
            }),
            by_depth: raw.absorption.as_ref().map(|cells| {
                (0..grid.nz)
                    .map(|iz| {
                        let units: u64 = (0..grid.nr).map(|ir| cells[ir * grid.nz + iz]).sum();
                        units as f64 / (grid.dz * scale)
                    })
                    .collect()
            }),
        };

        SimulationResult {
            label: descriptor.labels.output.clone(),
            descriptor_hash,
            photons,
            summary,
            absorption,
            reflectance: escape_distribution(&raw.reflectance, grid, scale),
            transmittance: escape_distribution(&raw.transmittance, grid, scale),
            raw,
        }
    }
}

fn escape_distribution(cells: &[u64], grid: &DetectionGrid, scale: f64) -> EscapeDistribution {
    let per_cell = cells
        .iter()
        .enumerate()
        .map(|(i, &u)| u as f64 / (grid.annulus_area(i / grid.na) * scale))
        .collect();

    let by_radius = (0..grid.nr)
        .map(|ir| {
            let units: u64 = cells[ir * grid.na..(ir + 1) * grid.na].iter().sum();
            units as f64 / (grid.annulus_area(ir) * scale)
        })
        .collect();

    let by_angle = (0..grid.na)
        .map(|ia| {
            let units: u64 = (0..grid.nr).map(|ir| cells[ir * grid.na + ia]).sum();
            units as f64 / (grid.solid_angle(ia) * scale)
        })
        .collect();

    EscapeDistribution {
        per_cell: Histogram2::from_values(grid.nr, grid.na, per_cell),
        by_radius,
        by_angle,
        total: cells.iter().sum::<u64>() as f64 / scale,
    }
}

/// Depth at which the cumulative absorption exceeds `(A + T) / e`
///
/// `A` is the absorption recorded in the grid and `T` the transmitted units;
/// reflected light is left out because the beam below the surface is what is
/// being attenuated. Depth slices are summed over all radii, shallowest
/// first. When the threshold is never exceeded but something was absorbed,
/// the whole tissue depth is returned; with nothing absorbed, 0.
pub fn penetration_depth(absorption: &[u64], transmitted: u64, grid: &DetectionGrid, tissue_depth: f64) -> f64 {
    let absorbed: u64 = absorption.iter().sum();
    let threshold = (absorbed + transmitted) as f64 / E;

    let mut cumulative = 0u64;
    for iz in 0..grid.nz {
        for ir in 0..grid.nr {
            cumulative += absorption[ir * grid.nz + iz];
            if cumulative as f64 > threshold {
                return iz as f64 * grid.dz;
            }
        }
    }

    if cumulative > 0 {
        tissue_depth
    } else {
        0.0
    }
}
