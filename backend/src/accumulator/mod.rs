//! Detection accumulator
//!
//! Shared histograms every photon worker of a simulation deposits into.
//!
//! # Concurrency
//!
//! Cells are `AtomicU64` counters of fixed-point weight units (see
//! [`crate::core::fixed_point`]). A deposit is a single relaxed `fetch_add`,
//! so photon workers never take a lock and never lose an update. Because the
//! combine is integer addition, the final totals are identical for every
//! interleaving.
//!
//! The absorption grid is the hottest structure, so it is replicated
//! `copies` times; each worker thread writes to the replica picked by its
//! thread index and snapshots sum the replicas.

mod tally;

pub use tally::RawTally;

use crate::models::{DetectionGrid, SimulationDescriptor};
use std::sync::atomic::{AtomicU64, Ordering};

/// Histogram a deposit is combined into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TallyBin {
    /// Flat (r, z) absorption cell
    Absorption(usize),

    /// Absorption total of one layer
    Layer(usize),

    /// Flat (r, angle) cell of light leaving through the top
    Reflectance(usize),

    /// Flat (r, angle) cell of light leaving through the bottom
    Transmittance(usize),
}

fn zeroed(len: usize) -> Box<[AtomicU64]> {
    (0..len).map(|_| AtomicU64::new(0)).collect()
}

fn read_all(cells: &[AtomicU64]) -> Vec<u64> {
    cells.iter().map(|c| c.load(Ordering::Relaxed)).collect()
}

/// Concurrent fixed-point histograms of one simulation
#[derive(Debug)]
pub struct DetectionAccumulator {
    grid: DetectionGrid,
    absorption: Vec<Box<[AtomicU64]>>,
    layers: Box<[AtomicU64]>,
    reflectance: Box<[AtomicU64]>,
    transmittance: Box<[AtomicU64]>,
}

impl DetectionAccumulator {
    /// Allocate zeroed histograms
    ///
    /// `layer_count` includes the ambient layers. No absorption grid is
    /// allocated when `record_absorption` is false.
    pub fn new(grid: DetectionGrid, layer_count: usize, record_absorption: bool, copies: usize) -> Self {
        let absorption = if record_absorption {
            (0..copies.max(1)).map(|_| zeroed(grid.rz_len())).collect()
        } else {
            Vec::new()
        };

        Self {
            grid,
            absorption,
            layers: zeroed(layer_count),
            reflectance: zeroed(grid.ra_len()),
            transmittance: zeroed(grid.ra_len()),
        }
    }

    /// Accumulator shaped for `descriptor`
    pub fn for_descriptor(descriptor: &SimulationDescriptor, copies: usize) -> Self {
        Self::new(
            descriptor.grid,
            descriptor.layers.len(),
            descriptor.record_absorption,
            copies,
        )
    }

    pub fn grid(&self) -> &DetectionGrid {
        &self.grid
    }

    pub fn records_absorption(&self) -> bool {
        !self.absorption.is_empty()
    }

    /// Number of absorption grid replicas (0 when not recorded)
    pub fn replicas(&self) -> usize {
        self.absorption.len()
    }

    /// Combine `units` into `bin`
    ///
    /// `replica` selects the absorption grid copy (taken modulo the number of
    /// copies). Absorption deposits are ignored when the grid is disabled.
    #[inline]
    pub fn deposit(&self, bin: TallyBin, units: u64, replica: usize) {
        if units == 0 {
            return;
        }

        let cell = match bin {
            TallyBin::Absorption(cell) => {
                if self.absorption.is_empty() {
                    return;
                }
                &self.absorption[replica % self.absorption.len()][cell]
            }
            TallyBin::Layer(layer) => &self.layers[layer],
            TallyBin::Reflectance(cell) => &self.reflectance[cell],
            TallyBin::Transmittance(cell) => &self.transmittance[cell],
        };
        cell.fetch_add(units, Ordering::Relaxed);
    }

    /// Move everything accumulated here into `target`, leaving this zeroed
    ///
    /// Used to commit a device's wave tally into the simulation tally.
    pub fn drain_into(&self, target: &DetectionAccumulator) {
        fn drain(src: &[AtomicU64], dst: &[AtomicU64]) {
            for (s, d) in src.iter().zip(dst) {
                let units = s.swap(0, Ordering::Relaxed);
                if units != 0 {
                    d.fetch_add(units, Ordering::Relaxed);
                }
            }
        }

        if let Some(dst) = target.absorption.first() {
            for copy in &self.absorption {
                drain(copy, dst);
            }
        }
        drain(&self.layers, &target.layers);
        drain(&self.reflectance, &target.reflectance);
        drain(&self.transmittance, &target.transmittance);
    }

    /// Combine a previously taken snapshot back in (checkpoint resume)
    pub fn merge(&self, tally: &RawTally) {
        fn add(src: &[u64], dst: &[AtomicU64]) {
            for (s, d) in src.iter().zip(dst) {
                if *s != 0 {
                    d.fetch_add(*s, Ordering::Relaxed);
                }
            }
        }

        if let (Some(src), Some(dst)) = (&tally.absorption, self.absorption.first()) {
            add(src, dst);
        }
        add(&tally.layers, &self.layers);
        add(&tally.reflectance, &self.reflectance);
        add(&tally.transmittance, &self.transmittance);
    }

    /// Finalize the histograms
    ///
    /// Consumes the accumulator: once every photon has terminated the tallies
    /// are read out and no further deposit is possible.
    pub fn into_snapshot(self) -> RawTally {
        let absorption = if self.absorption.is_empty() {
            None
        } else {
            let mut summed = vec![0u64; self.grid.rz_len()];
            for copy in &self.absorption {
                for (acc, cell) in summed.iter_mut().zip(copy.iter()) {
                    *acc += cell.load(Ordering::Relaxed);
                }
            }
            Some(summed)
        };

        RawTally {
            nr: self.grid.nr,
            nz: self.grid.nz,
            na: self.grid.na,
            absorption,
            layers: read_all(&self.layers),
            reflectance: read_all(&self.reflectance),
            transmittance: read_all(&self.transmittance),
        }
    }
}
