//! Transient per-photon state
//!
//! A `PhotonState` is created at launch, mutated only by the kernel instance
//! that owns it and dropped when the packet escapes or is terminated. It owns
//! its random stream, so no two photons ever share mutable state.

use crate::rng::PhotonRng;

/// State of one photon packet
#[derive(Debug, Clone)]
pub struct PhotonState {
    // cartesian coordinates [cm]
    pub x: f64,
    pub y: f64,
    pub z: f64,

    // direction cosines
    pub ux: f64,
    pub uy: f64,
    pub uz: f64,

    /// Remaining fraction of the packet, in [0, 1]
    pub weight: f64,

    /// Index of the layer the packet is in
    pub layer: usize,

    pub alive: bool,

    /// Private random stream
    pub rng: PhotonRng,
}

impl PhotonState {
    /// Launch a packet on the axis at the entry surface, travelling down
    pub fn launch(start_weight: f64, surface_z: f64, rng: PhotonRng) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: surface_z,
            ux: 0.0,
            uy: 0.0,
            uz: 1.0,
            weight: start_weight,
            layer: 1,
            alive: true,
            rng,
        }
    }

    /// Distance from the launch axis [cm]
    #[inline]
    pub fn radius(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Move `s` cm along the current direction
    #[inline]
    pub fn hop(&mut self, s: f64) {
        self.x += s * self.ux;
        self.y += s * self.uy;
        self.z += s * self.uz;
    }

    pub fn terminate(&mut self) {
        self.weight = 0.0;
        self.alive = false;
    }
}
