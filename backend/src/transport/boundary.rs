//! Boundary optics between two layers
//!
//! Reflection at an interface is decided by comparing a uniform draw with the
//! unpolarized Fresnel reflectance; the packet keeps its full weight either
//! way.

use crate::core::constants::COS_ZERO;

/// Below this incidence cosine the packet grazes the interface and reflects
const COS_90: f64 = 1.0e-6;

/// Fresnel result for one incidence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interface {
    /// Probability of reflection in [0, 1]
    pub reflectance: f64,

    /// Cosine of the transmitted direction against the normal
    pub cos_transmitted: f64,
}

/// Fresnel reflectance for a packet crossing from index `n_i` into `n_t`
///
/// `cos_incident` is the absolute direction cosine against the boundary
/// normal; `cos_critical` the pre-computed critical-angle cosine for this
/// boundary (0 when total internal reflection is impossible).
///
/// # Example
/// ```
/// use photon_transport_core_rs::transport::boundary::fresnel;
///
/// let normal = fresnel(1.0, 1.5, 1.0, 0.0);
/// assert!((normal.reflectance - 0.04).abs() < 1e-12);
///
/// let matched = fresnel(1.33, 1.33, 0.3, 0.0);
/// assert_eq!(matched.reflectance, 0.0);
/// ```
pub fn fresnel(n_i: f64, n_t: f64, cos_incident: f64, cos_critical: f64) -> Interface {
    let ca1 = cos_incident.abs().min(1.0);

    if ca1 <= cos_critical {
        return Interface {
            reflectance: 1.0,
            cos_transmitted: 0.0,
        };
    }

    if n_i == n_t {
        return Interface {
            reflectance: 0.0,
            cos_transmitted: ca1,
        };
    }

    if ca1 > COS_ZERO {
        let r = (n_i - n_t) / (n_i + n_t);
        return Interface {
            reflectance: r * r,
            cos_transmitted: ca1,
        };
    }

    if ca1 < COS_90 {
        return Interface {
            reflectance: 1.0,
            cos_transmitted: 0.0,
        };
    }

    let sa1 = (1.0 - ca1 * ca1).sqrt();
    let sa2 = n_i / n_t * sa1;
    if sa2 >= 1.0 {
        return Interface {
            reflectance: 1.0,
            cos_transmitted: 0.0,
        };
    }
    let ca2 = (1.0 - sa2 * sa2).sqrt();

    // cos(a1 ± a2), sin(a1 ± a2)
    let cap = ca1 * ca2 - sa1 * sa2;
    let cam = ca1 * ca2 + sa1 * sa2;
    let sap = sa1 * ca2 + ca1 * sa2;
    let sam = sa1 * ca2 - ca1 * sa2;

    let reflectance = 0.5 * sam * sam * (cam * cam + cap * cap) / (sap * sap * cam * cam);

    Interface {
        reflectance: reflectance.clamp(0.0, 1.0),
        cos_transmitted: ca2,
    }
}

/// Snell refraction of a unit direction through a z-normal interface
///
/// Returns the new `(ux, uy, uz)`; `uz` keeps its sign.
#[inline]
pub fn refract(ux: f64, uy: f64, uz: f64, n_i: f64, n_t: f64, cos_transmitted: f64) -> (f64, f64, f64) {
    let ratio = n_i / n_t;
    (ux * ratio, uy * ratio, cos_transmitted.copysign(uz))
}
