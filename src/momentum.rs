//! The SGHMC momentum update with injected, preconditioned noise.
//!
//! With `Minv` the inverse mass estimated during burn-in, one step is
//!
//! ```text
//! v <- v - eps^2 * Minv * grad - mdecay * v + N(0, sigma^2)
//! theta <- theta + v
//! ```
//!
//! where `sigma^2 = 2 eps_s^2 mdecay Minv - 2 eps_s^3 Minv^2 noise - eps_s^4`
//! and `eps_s = eps / sqrt(scale_grad)`.

use ndarray::{Array1, Zip};
use rand::Rng;
use rand_distr::StandardNormal;

/// Lower bound of the injected noise variance. Keeps sigma real when the
/// estimated variance turns negative.
pub const NOISE_VARIANCE_FLOOR: f64 = 1e-16;

/// Variance of the injected noise for one component, before clamping.
pub fn noise_scale(minv: f64, epsilon_scaled: f64, mdecay: f64, noise: f64) -> f64 {
    2. * epsilon_scaled.powi(2) * mdecay * minv
        - 2. * epsilon_scaled.powi(3) * minv * minv * noise
        - epsilon_scaled.powi(4)
}

/// Standard deviation of the injected noise, per component.
pub fn noise_stddev(minv: &Array1<f64>, epsilon_scaled: f64, mdecay: f64, noise: f64) -> Array1<f64> {
    minv.mapv(|m| {
        noise_scale(m, epsilon_scaled, mdecay, noise)
            .max(NOISE_VARIANCE_FLOOR)
            .sqrt()
    })
}

/// Draw one normal sample per component with the given standard deviations.
pub fn draw_noise<R: Rng + ?Sized>(sigma: &Array1<f64>, rng: &mut R) -> Array1<f64> {
    sigma.mapv(|s| s * rng.sample::<f64, _>(StandardNormal))
}

/// Next momentum, given the previous one and the noise sample of this step.
pub fn update_momentum(
    v_old: &Array1<f64>,
    grad: &Array1<f64>,
    minv: &Array1<f64>,
    epsilon: f64,
    mdecay: f64,
    sample: &Array1<f64>,
) -> Array1<f64> {
    let eps2 = epsilon * epsilon;
    let mut v_new = v_old.clone();
    Zip::from(&mut v_new)
        .and(grad)
        .and(minv)
        .and(sample)
        .for_each(|v, &grad, &minv, &sample| *v += -eps2 * minv * grad - mdecay * *v + sample);
    v_new
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_momentum_update_without_decay_or_noise() {
        let v_new = update_momentum(
            &arr1(&[0.]),
            &arr1(&[1.]),
            &arr1(&[1.]),
            0.1,
            0.,
            &arr1(&[0.]),
        );
        assert_abs_diff_eq!(v_new[0], -0.01, epsilon = 1e-15);
    }

    #[test]
    fn test_momentum_update_with_decay() {
        let v_new = update_momentum(
            &arr1(&[1., -2.]),
            &arr1(&[2., 0.]),
            &arr1(&[0.5, 1.]),
            0.1,
            0.05,
            &arr1(&[0.25, 0.]),
        );
        // 1 - 0.01 * 0.5 * 2 - 0.05 + 0.25
        assert_abs_diff_eq!(v_new[0], 1.19, epsilon = 1e-12);
        assert_abs_diff_eq!(v_new[1], -1.9, epsilon = 1e-12);
    }

    #[test]
    fn test_noise_scale() {
        // 2 * 0.01 * 0.05 * 1 - 0 - 1e-4
        assert_abs_diff_eq!(noise_scale(1., 0.1, 0.05, 0.), 0.0009, epsilon = 1e-15);
        // injected noise estimate lowers the variance
        assert!(noise_scale(1., 0.1, 0.05, 1.) < noise_scale(1., 0.1, 0.05, 0.));
    }

    #[test]
    fn test_noise_stddev_is_clamped() {
        // no friction leaves only the negative eps^4 term
        assert!(noise_scale(1., 0.1, 0., 0.) < 0.);
        let sigma = noise_stddev(&arr1(&[1., 0.]), 0.1, 0., 0.);
        assert_eq!(sigma, Array1::from_elem(2, NOISE_VARIANCE_FLOOR.sqrt()));
    }

    #[test]
    fn test_draw_noise_is_reproducible() {
        let sigma = arr1(&[1., 2., 3.]);
        let a = draw_noise(&sigma, &mut ChaCha8Rng::seed_from_u64(3));
        let b = draw_noise(&sigma, &mut ChaCha8Rng::seed_from_u64(3));
        assert_eq!(a, b);
        assert_eq!(draw_noise(&arr1(&[0., 0.]), &mut ChaCha8Rng::seed_from_u64(3)), arr1(&[0., 0.]));
    }

    #[test]
    fn test_draw_noise_scales_with_sigma() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let n = 20000;
        let samples = draw_noise(&Array1::from_elem(n, 2.), &mut rng);
        let mean = samples.sum() / n as f64;
        let var = samples.mapv(|s| (s - mean) * (s - mean)).sum() / n as f64;
        assert!(mean.abs() < 0.1);
        assert!((var - 4.).abs() < 0.3);
    }

    proptest! {
        #[test]
        fn prop_sigma_respects_floor(
            minv in 0f64..1e3,
            eps in 1e-6f64..10.,
            mdecay in 0f64..1.,
            noise in -1f64..10.,
        ) {
            let sigma = noise_stddev(&arr1(&[minv]), eps, mdecay, noise);
            prop_assert!(sigma[0] >= NOISE_VARIANCE_FLOOR.sqrt());
            prop_assert!(sigma[0].is_finite());
        }
    }
}
