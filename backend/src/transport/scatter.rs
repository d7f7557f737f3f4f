//! Henyey-Greenstein scattering

use crate::core::constants::COS_ZERO;
use crate::models::PhotonState;
use crate::rng::PhotonRng;
use std::f64::consts::PI;

/// Draw the cosine of the deflection angle for anisotropy `g`
///
/// `g == 0` scatters isotropically; `|g| >= 1` never deflects away from
/// `g.signum()`.
#[inline]
pub fn sample_cos_theta(g: f64, rng: &mut PhotonRng) -> f64 {
    let xi = rng.next_f64();

    if g == 0.0 {
        return 2.0 * xi - 1.0;
    }
    if g.abs() >= 1.0 {
        return g.signum();
    }

    let temp = (1.0 - g * g) / (1.0 - g + 2.0 * g * xi);
    ((1.0 + g * g - temp * temp) / (2.0 * g)).clamp(-1.0, 1.0)
}

/// Scatter the packet into a new direction
pub fn spin(photon: &mut PhotonState, g: f64) {
    let cost = sample_cos_theta(g, &mut photon.rng);
    let sint = (1.0 - cost * cost).sqrt();

    let psi = 2.0 * PI * photon.rng.next_f64();
    let (sinp, cosp) = psi.sin_cos();

    let (ux, uy, uz) = (photon.ux, photon.uy, photon.uz);

    if uz.abs() > COS_ZERO {
        photon.ux = sint * cosp;
        photon.uy = sint * sinp;
        photon.uz = if uz >= 0.0 { cost } else { -cost };
    } else {
        let temp = (1.0 - uz * uz).sqrt();
        photon.ux = sint * (ux * uz * cosp - uy * sinp) / temp + ux * cost;
        photon.uy = sint * (uy * uz * cosp + ux * sinp) / temp + uy * cost;
        photon.uz = -sint * cosp * temp + uz * cost;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_mean_cosine_equals_g() {
        let mut rng = PhotonRng::new(2024);
        for &g in &[0.0, 0.5, 0.9, -0.3] {
            let n = 200_000;
            let mean: f64 = (0..n).map(|_| sample_cos_theta(g, &mut rng)).sum::<f64>() / n as f64;
            assert!((mean - g).abs() < 0.01, "g={} mean={}", g, mean);
        }
    }

    #[test]
    fn test_spin_keeps_unit_direction() {
        let mut photon = PhotonState::launch(1.0, 0.0, PhotonRng::new(5));
        for _ in 0..1000 {
            spin(&mut photon, 0.8);
            let norm = photon.ux * photon.ux + photon.uy * photon.uy + photon.uz * photon.uz;
            assert!((norm - 1.0).abs() < 1e-9, "norm drifted to {}", norm);
        }
    }

    #[test]
    fn test_isotropic_scatter_from_axis_goes_both_ways() {
        let n = 100_000;
        let mut sum_uz = 0.0;
        let mut backward = 0;
        let mut rng = PhotonRng::new(31);
        for _ in 0..n {
            let mut photon = PhotonState::launch(1.0, 0.0, rng);
            spin(&mut photon, 0.0);
            rng = photon.rng.clone();
            sum_uz += photon.uz;
            if photon.uz < 0.0 {
                backward += 1;
            }
        }
        let mean = sum_uz / n as f64;
        let backward_share = backward as f64 / n as f64;
        assert!(mean.abs() < 0.01, "mean uz {}", mean);
        assert!((backward_share - 0.5).abs() < 0.01, "backward share {}", backward_share);
    }

    #[test]
    fn test_forward_peaked_scatter_from_upward_axis_keeps_sign() {
        let mut rng = PhotonRng::new(9);
        let mut upward = 0;
        for _ in 0..1000 {
            let mut photon = PhotonState::launch(1.0, 0.0, rng);
            photon.uz = -1.0;
            spin(&mut photon, 0.95);
            rng = photon.rng.clone();
            if photon.uz < 0.0 {
                upward += 1;
            }
        }
        assert!(upward > 950, "only {} of 1000 kept going up", upward);
    }

    #[test]
    fn test_degenerate_anisotropy_is_finite() {
        let mut rng = PhotonRng::new(0);
        for &g in &[1.0, -1.0] {
            for _ in 0..1000 {
                assert_eq!(sample_cos_theta(g, &mut rng), g);
            }
        }
    }

    proptest! {
        #[test]
        fn cos_theta_in_range(g in -1.0f64..=1.0, seed in any::<u64>()) {
            let mut rng = PhotonRng::new(seed);
            let c = sample_cos_theta(g, &mut rng);
            prop_assert!((-1.0..=1.0).contains(&c));
        }
    }
}
