use crate::error::SamplerError;
use crate::math_helpers::{safe_divide, safe_divide_arr, safe_sqrt_arr};
use ndarray::{Array1, Zip};

/// Running gradient statistics of one (vectorized) parameter, adapted on every step.
///
/// `g` and `v_hat` are exponential moving averages of the gradient and the squared
/// gradient, mixed with weight `r = 1 / (tau + 1)`. `minv = v_hat^{-1/2}` is the
/// diagonal inverse mass used to precondition the momentum update.
#[derive(Debug, Clone, PartialEq)]
pub struct BurnInState {
    tau: Array1<f64>,
    r: Array1<f64>,
    g: Array1<f64>,
    v_hat: Array1<f64>,
    minv: Array1<f64>,
}

impl BurnInState {
    pub fn new(dim: usize) -> Self {
        let tau = Array1::<f64>::ones(dim);
        let v_hat = Array1::<f64>::ones(dim);
        Self {
            r: tau.mapv(|t| 1. / (t + 1.)),
            minv: v_hat.mapv(|v| 1. / v.sqrt()),
            tau,
            g: Array1::ones(dim),
            v_hat,
        }
    }

    /// State with the given statistics, which must all have the same length.
    pub fn from_parts(tau: Array1<f64>, g: Array1<f64>, v_hat: Array1<f64>) -> Result<Self, SamplerError> {
        for other in [&g, &v_hat] {
            if other.len() != tau.len() {
                return Err(SamplerError::ShapeMismatch {
                    expected: vec![tau.len()],
                    found: vec![other.len()],
                });
            }
        }
        Ok(Self {
            r: tau.mapv(|t| 1. / (t + 1.)),
            minv: v_hat.mapv(|v| 1. / v.sqrt()),
            tau,
            g,
            v_hat,
        })
    }

    pub fn dim(&self) -> usize {
        self.tau.len()
    }

    /// Adapt the statistics to a new gradient and return the inverse mass for this step.
    ///
    /// `r` and `minv` are read from the previous step's `tau` and `v_hat` before any of
    /// `tau`, `g` or `v_hat` is written.
    pub fn update(&mut self, grad: &Array1<f64>) -> &Array1<f64> {
        let r_t = self.tau.mapv(|tau| 1. / (tau + 1.));
        let minv_t = safe_divide_arr(&Array1::ones(self.dim()), &safe_sqrt_arr(&self.v_hat));

        Zip::from(&mut self.tau)
            .and(&self.g)
            .and(&self.v_hat)
            .for_each(|tau, &g, &v_hat| *tau += safe_divide(-g * g * *tau, v_hat) + 1.);
        Zip::from(&mut self.g)
            .and(&r_t)
            .and(grad)
            .for_each(|g, &r, &grad| *g += -r * *g + r * grad);
        Zip::from(&mut self.v_hat)
            .and(&r_t)
            .and(grad)
            .for_each(|v_hat, &r, &grad| *v_hat += -r * *v_hat + r * grad * grad);

        self.r = r_t;
        self.minv = minv_t;
        &self.minv
    }

    pub fn tau(&self) -> &Array1<f64> {
        &self.tau
    }

    pub fn r(&self) -> &Array1<f64> {
        &self.r
    }

    pub fn g(&self) -> &Array1<f64> {
        &self.g
    }

    pub fn v_hat(&self) -> &Array1<f64> {
        &self.v_hat
    }

    pub fn minv(&self) -> &Array1<f64> {
        &self.minv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;

    #[test]
    fn test_initial_state() {
        let state = BurnInState::new(3);
        assert_eq!(state.tau(), &Array1::<f64>::ones(3));
        assert_eq!(state.g(), &Array1::<f64>::ones(3));
        assert_eq!(state.v_hat(), &Array1::<f64>::ones(3));
        assert_eq!(state.r(), &Array1::from_elem(3, 0.5));
        assert_eq!(state.minv(), &Array1::<f64>::ones(3));
    }

    #[test]
    fn test_update_reads_previous_state() {
        let mut state = BurnInState::from_parts(arr1(&[1.]), arr1(&[2.]), arr1(&[4.])).unwrap();
        let minv_t = state.update(&arr1(&[1.])).clone();
        assert_abs_diff_eq!(state.r()[0], 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(state.tau()[0], 1., epsilon = 1e-15);
        assert_abs_diff_eq!(minv_t[0], 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(state.g()[0], 1.5, epsilon = 1e-15);
        assert_abs_diff_eq!(state.v_hat()[0], 2.5, epsilon = 1e-15);
    }

    #[test]
    fn test_computing_tau_first_diverges() {
        let (tau_old, g_old, v_hat_old, grad) = (1., 1., 4., 3.);

        let tau_new = tau_old + safe_divide(-g_old * g_old * tau_old, v_hat_old) + 1.;
        let r_from_new_tau = 1. / (tau_new + 1.);
        let g_from_new_tau = g_old - r_from_new_tau * g_old + r_from_new_tau * grad;

        let mut state = BurnInState::from_parts(arr1(&[tau_old]), arr1(&[g_old]), arr1(&[v_hat_old])).unwrap();
        state.update(&arr1(&[grad]));

        assert_abs_diff_eq!(state.tau()[0], tau_new, epsilon = 1e-15);
        assert_abs_diff_eq!(state.r()[0], 0.5, epsilon = 1e-15);
        assert!((state.r()[0] - r_from_new_tau).abs() > 1e-3);
        assert!((state.g()[0] - g_from_new_tau).abs() > 1e-3);
    }

    #[test]
    fn test_components_are_independent() {
        let mut state = BurnInState::new(2);
        state.update(&arr1(&[1., 3.]));
        // gradient equal to the running mean leaves the first component's averages fixed
        assert_abs_diff_eq!(state.g()[0], 1., epsilon = 1e-15);
        assert_abs_diff_eq!(state.v_hat()[0], 1., epsilon = 1e-15);
        assert_abs_diff_eq!(state.g()[1], 2., epsilon = 1e-15);
        assert_abs_diff_eq!(state.v_hat()[1], 5., epsilon = 1e-15);
    }

    #[test]
    fn test_tracks_constant_gradient() {
        let mut state = BurnInState::new(1);
        let grad = arr1(&[3.]);
        for _ in 0..500 {
            state.update(&grad);
        }
        assert_abs_diff_eq!(state.g()[0], 3., epsilon = 1e-6);
        assert_abs_diff_eq!(state.v_hat()[0], 9., epsilon = 1e-6);
        assert_abs_diff_eq!(state.update(&grad)[0], 1. / 3., epsilon = 1e-6);
    }

    #[test]
    fn test_from_parts_rejects_mismatched_lengths() {
        assert!(matches!(
            BurnInState::from_parts(arr1(&[1., 1.]), arr1(&[1.]), arr1(&[1., 1.])),
            Err(SamplerError::ShapeMismatch { expected, found }) if expected == vec![2] && found == vec![1]
        ));
        assert!(BurnInState::from_parts(arr1(&[1.]), arr1(&[1.]), arr1(&[1., 1.])).is_err());
    }
}
