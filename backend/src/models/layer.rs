//! Optical layers of a planar multi-layer medium
//!
//! A stack always starts and ends with a semi-infinite ambient layer. The
//! ambient layers only contribute their refractive index; their depths are
//! sentinels and they never absorb or scatter.

use crate::core::constants::BALLISTIC_MUTR;
use serde::{Deserialize, Serialize};

/// One slab of the medium stack
///
/// `mutr` is the reciprocal of the total interaction coefficient
/// (`1 / (mua + mus)`), i.e. the mean free path between interactions.
/// Non-scattering layers (glass, vacuum gaps) carry [`Layer::GLASS_MUTR`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Refractive index
    pub n: f64,

    /// Henyey-Greenstein anisotropy factor in [-1, 1]
    pub g: f64,

    /// Absorption coefficient [1/cm]
    pub mua: f64,

    /// Reciprocal of the total interaction coefficient [cm]
    pub mutr: f64,

    /// Depth of the top boundary [cm]
    pub z_min: f64,

    /// Depth of the bottom boundary [cm]
    pub z_max: f64,
}

/// Physical description of a real layer, as written in input decks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlabSpec {
    pub n: f64,
    pub mua: f64,
    pub mus: f64,
    pub g: f64,
    pub thickness: f64,
}

impl Layer {
    /// Interaction length marking a layer that never scatters or absorbs
    pub const GLASS_MUTR: f64 = BALLISTIC_MUTR;

    /// Ambient medium with refractive index `n`
    ///
    /// Depth bounds are sentinels covering everything outside the stack.
    pub fn ambient(n: f64) -> Self {
        Self {
            n,
            g: 0.0,
            mua: 0.0,
            mutr: Self::GLASS_MUTR,
            z_min: f64::MIN,
            z_max: f64::MAX,
        }
    }

    /// Build a real layer from absorption and scattering coefficients
    ///
    /// A layer with `mus == 0` is treated as glass: photons cross it
    /// ballistically and it absorbs nothing.
    pub fn from_coefficients(spec: &SlabSpec, z_min: f64) -> Self {
        let (mua, mutr) = if spec.mus == 0.0 {
            (0.0, Self::GLASS_MUTR)
        } else {
            (spec.mua, 1.0 / (spec.mua + spec.mus))
        };

        Self {
            n: spec.n,
            g: spec.g,
            mua,
            mutr,
            z_min,
            z_max: z_min + spec.thickness,
        }
    }

    /// True when the photon crosses this layer in a straight line
    pub fn is_ballistic(&self) -> bool {
        !(self.mutr < BALLISTIC_MUTR)
    }

    /// Layer thickness [cm]
    pub fn thickness(&self) -> f64 {
        self.z_max - self.z_min
    }
}

/// Assemble a full stack (ambient above, slabs, ambient below)
///
/// Slabs are stacked contiguously starting at depth 0.
///
/// # Example
/// ```
/// use photon_transport_core_rs::models::layer::{build_stack, SlabSpec};
///
/// let layers = build_stack(
///     1.0,
///     &[SlabSpec { n: 1.37, mua: 1.0, mus: 100.0, g: 0.9, thickness: 0.1 }],
///     1.0,
/// );
/// assert_eq!(layers.len(), 3);
/// assert_eq!(layers[1].z_max, 0.1);
/// ```
pub fn build_stack(n_above: f64, slabs: &[SlabSpec], n_below: f64) -> Vec<Layer> {
    let mut layers = Vec::with_capacity(slabs.len() + 2);
    layers.push(Layer::ambient(n_above));

    let mut depth = 0.0;
    for slab in slabs {
        let layer = Layer::from_coefficients(slab, depth);
        depth = layer.z_max;
        layers.push(layer);
    }

    layers.push(Layer::ambient(n_below));
    layers
}

// ============================================================================
// Kernel-side optics
// ============================================================================

/// Per-layer quantities the kernel needs at every step
///
/// Derived once per simulation from the descriptor's layers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerOptics {
    pub z_top: f64,
    pub z_bottom: f64,
    pub n: f64,
    pub g: f64,

    /// Mean free path [cm]; meaningless when `ballistic`
    pub mutr: f64,

    /// Fraction of the packet weight absorbed per interaction (`mua * mutr`)
    pub absorb_fraction: f64,

    pub ballistic: bool,

    /// Cosine of the critical angle at the top boundary (0 if none)
    pub cos_crit_top: f64,

    /// Cosine of the critical angle at the bottom boundary (0 if none)
    pub cos_crit_bottom: f64,
}

impl LayerOptics {
    /// Derive kernel optics for every layer of a stack
    pub fn from_stack(layers: &[Layer]) -> Vec<LayerOptics> {
        let last = layers.len().saturating_sub(1);

        layers
            .iter()
            .enumerate()
            .map(|(i, layer)| {
                let ambient = i == 0 || i == last;
                let ballistic = ambient || layer.is_ballistic();

                let absorb_fraction = if ballistic {
                    0.0
                } else {
                    (layer.mua * layer.mutr).clamp(0.0, 1.0)
                };

                let cos_crit_top = if i > 0 {
                    critical_cosine(layer.n, layers[i - 1].n)
                } else {
                    0.0
                };
                let cos_crit_bottom = if i < last {
                    critical_cosine(layer.n, layers[i + 1].n)
                } else {
                    0.0
                };

                LayerOptics {
                    z_top: layer.z_min,
                    z_bottom: layer.z_max,
                    n: layer.n,
                    g: layer.g,
                    mutr: layer.mutr,
                    absorb_fraction,
                    ballistic,
                    cos_crit_top,
                    cos_crit_bottom,
                }
            })
            .collect()
    }
}

/// Cosine of the critical angle going from index `n_inside` to `n_outside`
///
/// Zero when no total internal reflection is possible.
pub fn critical_cosine(n_inside: f64, n_outside: f64) -> f64 {
    if n_inside > n_outside {
        let ratio = n_outside / n_inside;
        (1.0 - ratio * ratio).sqrt()
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glass_layer_is_ballistic() {
        let spec = SlabSpec {
            n: 1.5,
            mua: 3.0,
            mus: 0.0,
            g: 0.0,
            thickness: 0.2,
        };
        let layer = Layer::from_coefficients(&spec, 0.0);
        assert!(layer.is_ballistic());
        assert_eq!(layer.mua, 0.0);
    }

    #[test]
    fn test_stack_is_contiguous() {
        let slab = SlabSpec {
            n: 1.4,
            mua: 1.0,
            mus: 10.0,
            g: 0.8,
            thickness: 0.05,
        };
        let layers = build_stack(1.0, &[slab, slab, slab], 1.0);
        for pair in layers[1..4].windows(2) {
            assert_eq!(pair[0].z_max, pair[1].z_min);
        }
        assert!((layers[3].z_max - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_critical_cosine() {
        assert_eq!(critical_cosine(1.0, 1.5), 0.0);
        let c = critical_cosine(1.5, 1.0);
        // sin(theta_c) = 1/1.5
        assert!((c - (1.0f64 - 1.0 / 2.25).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_optics_absorb_fraction() {
        let slab = SlabSpec {
            n: 1.0,
            mua: 10.0,
            mus: 90.0,
            g: 0.75,
            thickness: 0.02,
        };
        let optics = LayerOptics::from_stack(&build_stack(1.0, &[slab], 1.0));
        assert!((optics[1].absorb_fraction - 0.1).abs() < 1e-12);
        assert!(optics[0].ballistic && optics[2].ballistic);
        assert_eq!(optics[0].absorb_fraction, 0.0);
    }
}
