//! Per-photon transport state machine
//!
//! One call to [`TransportKernel::run_photon`] carries a packet from launch to
//! escape or termination. The kernel itself is immutable and shared by every
//! worker of a simulation; all mutable per-worker state lives in a
//! [`KernelScratch`].
//!
//! # Deposits
//!
//! Consecutive absorption drops landing in the same grid cell are coalesced
//! in the scratch and written as one deposit. Per-layer absorption is summed
//! in the scratch and flushed when the packet ends, so the accumulator sees a
//! handful of atomic adds per photon instead of one per interaction.

use crate::accumulator::{DetectionAccumulator, TallyBin};
use crate::core::weight_to_units;
use crate::models::{DetectionGrid, LayerOptics, PhotonState, SimulationDescriptor};
use crate::rng::PhotonRng;
use crate::transport::boundary::{fresnel, refract};
use crate::transport::roulette::RouletteConfig;
use crate::transport::scatter::spin;

/// How a packet's walk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotonFate {
    /// Left through the top surface
    Reflected,

    /// Left through the bottom surface
    Transmitted,

    /// Lost the roulette or ran out of weight
    Terminated,
}

/// Mutable per-worker state reused across photons
#[derive(Debug, Clone)]
pub struct KernelScratch {
    /// Absorption grid replica this worker deposits into
    replica: usize,

    pending_cell: Option<usize>,
    pending_units: u64,

    layer_units: Vec<u64>,

    /// Interactions performed since creation
    pub steps: u64,
}

impl KernelScratch {
    pub fn new(layer_count: usize, replica: usize) -> Self {
        Self {
            replica,
            pending_cell: None,
            pending_units: 0,
            layer_units: vec![0; layer_count],
            steps: 0,
        }
    }

    pub fn replica(&self) -> usize {
        self.replica
    }

    fn absorb(&mut self, layer: usize, cell: Option<usize>, units: u64, tally: &DetectionAccumulator) {
        self.layer_units[layer] += units;

        let Some(cell) = cell else { return };
        if self.pending_cell == Some(cell) {
            self.pending_units += units;
        } else {
            self.flush_pending(tally);
            self.pending_cell = Some(cell);
            self.pending_units = units;
        }
    }

    fn flush_pending(&mut self, tally: &DetectionAccumulator) {
        if let Some(cell) = self.pending_cell.take() {
            tally.deposit(TallyBin::Absorption(cell), self.pending_units, self.replica);
            self.pending_units = 0;
        }
    }

    /// Write every buffered deposit to `tally`
    pub fn flush(&mut self, tally: &DetectionAccumulator) {
        self.flush_pending(tally);
        for (layer, units) in self.layer_units.iter_mut().enumerate() {
            if *units != 0 {
                tally.deposit(TallyBin::Layer(layer), *units, self.replica);
                *units = 0;
            }
        }
    }
}

/// Immutable transport parameters of one simulation
#[derive(Debug, Clone)]
pub struct TransportKernel {
    optics: Vec<LayerOptics>,
    grid: DetectionGrid,
    start_weight: f64,
    surface_z: f64,
    record_absorption: bool,
    roulette: RouletteConfig,
}

impl TransportKernel {
    /// Build the kernel for a validated descriptor
    pub fn new(descriptor: &SimulationDescriptor, roulette: RouletteConfig) -> Self {
        Self {
            optics: LayerOptics::from_stack(&descriptor.layers),
            grid: descriptor.grid,
            start_weight: descriptor.start_weight,
            surface_z: descriptor.surface_z(),
            record_absorption: descriptor.record_absorption,
            roulette,
        }
    }

    /// Number of layers including the ambient ones
    pub fn layer_count(&self) -> usize {
        self.optics.len()
    }

    /// Fresh scratch for a worker writing to absorption replica `replica`
    pub fn scratch(&self, replica: usize) -> KernelScratch {
        KernelScratch::new(self.optics.len(), replica)
    }

    /// Transport one packet drawing from `rng` until it leaves or dies
    pub fn run_photon(
        &self,
        rng: PhotonRng,
        tally: &DetectionAccumulator,
        scratch: &mut KernelScratch,
    ) -> PhotonFate {
        let mut photon = PhotonState::launch(self.start_weight, self.surface_z, rng);

        // No real layers: the light passes straight through
        if self.optics.len() <= 2 {
            let cell = self.grid.escape_cell(0.0, 1.0);
            tally.deposit(
                TallyBin::Transmittance(cell),
                weight_to_units(photon.weight),
                scratch.replica,
            );
            return PhotonFate::Transmitted;
        }

        let fate = loop {
            if let Some(fate) = self.step(&mut photon, tally, scratch) {
                break fate;
            }
        };

        scratch.flush(tally);
        fate
    }

    /// One interaction of a live packet
    ///
    /// Returns the packet's fate once it has left the stack or died.
    pub fn step(
        &self,
        photon: &mut PhotonState,
        tally: &DetectionAccumulator,
        scratch: &mut KernelScratch,
    ) -> Option<PhotonFate> {
        scratch.steps += 1;
        let layer = &self.optics[photon.layer];

        let s = if layer.ballistic {
            f64::INFINITY
        } else {
            -photon.rng.next_f64_open_closed().ln() * layer.mutr
        };

        let boundary = if photon.uz > 0.0 {
            Some(((layer.z_bottom - photon.z) / photon.uz, layer.z_bottom))
        } else if photon.uz < 0.0 {
            Some(((layer.z_top - photon.z) / photon.uz, layer.z_top))
        } else {
            None
        };

        match boundary {
            Some((distance, z_boundary)) if s > distance => {
                photon.hop(distance);
                photon.z = z_boundary;
                if let Some(fate) = self.cross_boundary(photon, tally, scratch) {
                    return Some(fate);
                }
            }
            None if layer.ballistic => {
                // parallel to the faces of a non-interacting layer
                photon.terminate();
                return Some(PhotonFate::Terminated);
            }
            _ => {
                photon.hop(s);
                self.interact(photon, tally, scratch);
            }
        }

        if self.roulette.play(photon) {
            None
        } else {
            Some(PhotonFate::Terminated)
        }
    }

    /// Absorb part of the weight at the current position, then scatter
    fn interact(&self, photon: &mut PhotonState, tally: &DetectionAccumulator, scratch: &mut KernelScratch) {
        let layer = &self.optics[photon.layer];

        let dw = photon.weight * layer.absorb_fraction;
        photon.weight -= dw;

        let units = weight_to_units(dw);
        if units != 0 {
            let cell = if self.record_absorption {
                self.grid
                    .absorption_cell(photon.radius(), photon.z - self.surface_z)
            } else {
                None
            };
            scratch.absorb(photon.layer, cell, units, tally);
        }

        spin(photon, layer.g);
    }

    /// Reflect or transmit a packet sitting on a boundary
    fn cross_boundary(
        &self,
        photon: &mut PhotonState,
        tally: &DetectionAccumulator,
        scratch: &mut KernelScratch,
    ) -> Option<PhotonFate> {
        let current = &self.optics[photon.layer];
        let (next, cos_critical) = if photon.uz > 0.0 {
            (photon.layer + 1, current.cos_crit_bottom)
        } else {
            (photon.layer - 1, current.cos_crit_top)
        };
        let n_next = self.optics[next].n;

        let interface = fresnel(current.n, n_next, photon.uz, cos_critical);

        if photon.rng.next_f64() < interface.reflectance {
            photon.uz = -photon.uz;
            return None;
        }

        let last = self.optics.len() - 1;
        if next == 0 || next == last {
            let cell = self.grid.escape_cell(photon.radius(), interface.cos_transmitted);
            let units = weight_to_units(photon.weight);
            photon.terminate();

            return Some(if next == 0 {
                tally.deposit(TallyBin::Reflectance(cell), units, scratch.replica);
                PhotonFate::Reflected
            } else {
                tally.deposit(TallyBin::Transmittance(cell), units, scratch.replica);
                PhotonFate::Transmitted
            });
        }

        let (ux, uy, uz) = refract(
            photon.ux,
            photon.uy,
            photon.uz,
            current.n,
            n_next,
            interface.cos_transmitted,
        );
        photon.ux = ux;
        photon.uy = uy;
        photon.uz = uz;
        photon.layer = next;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::WEIGHT_SCALE;
    use crate::models::layer::{build_stack, SlabSpec};
    use crate::rng::RandomStreamProvider;

    fn grid() -> DetectionGrid {
        DetectionGrid {
            dr: 0.01,
            dz: 0.01,
            nr: 20,
            nz: 20,
            na: 10,
        }
    }

    fn run(descriptor: &SimulationDescriptor, roulette: RouletteConfig, seed: u64) -> DetectionAccumulator {
        let kernel = TransportKernel::new(descriptor, roulette);
        let tally = DetectionAccumulator::for_descriptor(descriptor, 1);
        let mut scratch = kernel.scratch(0);
        let streams = RandomStreamProvider::new(seed);
        for i in 0..descriptor.photons {
            kernel.run_photon(streams.stream(i), &tally, &mut scratch);
        }
        tally
    }

    #[test]
    fn test_empty_stack_transmits_everything() {
        let descriptor = SimulationDescriptor::new(build_stack(1.0, &[], 1.0), grid(), 10);
        let raw = run(&descriptor, RouletteConfig::default(), 1).into_snapshot();
        assert_eq!(raw.transmittance[0], 10 * WEIGHT_SCALE as u64);
        assert_eq!(raw.reflected_units(), 0);
    }

    #[test]
    fn test_glass_slab_transmits_on_axis() {
        let glass = SlabSpec {
            n: 1.0,
            mua: 0.0,
            mus: 0.0,
            g: 0.0,
            thickness: 0.3,
        };
        let descriptor = SimulationDescriptor::new(build_stack(1.0, &[glass], 1.0), grid(), 50);
        let raw = run(&descriptor, RouletteConfig::default(), 3).into_snapshot();
        assert_eq!(raw.transmittance[0], 50 * WEIGHT_SCALE as u64);
        assert_eq!(raw.absorbed_units(), 0);
    }

    #[test]
    fn test_non_absorbing_medium_conserves_weight_exactly() {
        let slab = SlabSpec {
            n: 1.0,
            mua: 0.0,
            mus: 50.0,
            g: 0.5,
            thickness: 0.05,
        };
        let descriptor = SimulationDescriptor::new(build_stack(1.0, &[slab], 1.0), grid(), 200);
        let raw = run(&descriptor, RouletteConfig::default(), 9).into_snapshot();
        assert_eq!(raw.absorbed_units(), 0);
        assert_eq!(
            raw.reflected_units() + raw.transmitted_units(),
            200 * WEIGHT_SCALE as u64
        );
    }

    #[test]
    fn test_layer_tally_covers_grid_tally() {
        let slab = SlabSpec {
            n: 1.4,
            mua: 5.0,
            mus: 45.0,
            g: 0.8,
            thickness: 0.1,
        };
        let descriptor = SimulationDescriptor::new(build_stack(1.0, &[slab], 1.0), grid(), 200);
        let raw = run(&descriptor, RouletteConfig::default(), 21).into_snapshot();
        assert!(raw.absorbed_units() > 0);
        assert!(raw.grid_absorbed_units() <= raw.absorbed_units());
        assert_eq!(raw.layers[0], 0);
        assert_eq!(raw.layers[2], 0);
    }

    #[test]
    fn test_scratch_counts_steps_and_flushes() {
        let slab = SlabSpec {
            n: 1.0,
            mua: 1.0,
            mus: 20.0,
            g: 0.0,
            thickness: 0.1,
        };
        let descriptor = SimulationDescriptor::new(build_stack(1.0, &[slab], 1.0), grid(), 1);
        let kernel = TransportKernel::new(&descriptor, RouletteConfig::default());
        let tally = DetectionAccumulator::for_descriptor(&descriptor, 1);
        let mut scratch = kernel.scratch(0);
        kernel.run_photon(PhotonRng::new(77), &tally, &mut scratch);
        assert!(scratch.steps > 0);
        assert_eq!(scratch.pending_cell, None);
        assert!(scratch.layer_units.iter().all(|&u| u == 0));
    }
}
