use crate::error::SamplerError;
use ndarray::{Array1, ArrayD, Zip};
use std::collections::HashMap;

/// One minibatch, mapping placeholder names to data arrays.
pub type Batch = HashMap<String, ArrayD<f64>>;

/// Cost functions that can be sampled with the samplers in this crate.
///
/// The cost is the negative (unnormalized) log density `U(theta)`.
pub trait Target {
    // Compute the cost at `params`, on `batch` if the sampler is fed minibatches
    fn cost(&self, params: &[ArrayD<f64>], batch: Option<&Batch>) -> f64;
    // Compute the gradient of the cost, one array per parameter with matching shape
    fn gradient(&self, params: &[ArrayD<f64>], batch: Option<&Batch>) -> Vec<ArrayD<f64>>;
}

fn concat(params: &[ArrayD<f64>]) -> Vec<f64> {
    params.iter().flat_map(|p| p.iter().copied()).collect()
}

/// Cut `flat` into arrays shaped like `params`.
fn split_like(flat: &[f64], params: &[ArrayD<f64>]) -> Vec<ArrayD<f64>> {
    let mut offset = 0;
    params
        .iter()
        .map(|p| {
            let mut out = ArrayD::zeros(p.raw_dim());
            out.iter_mut()
                .zip(&flat[offset..offset + p.len()])
                .for_each(|(o, v)| *o = *v);
            offset += p.len();
            out
        })
        .collect()
}

/// Independent normal distribution with equal variance over all parameter components.
pub struct IsotropicGaussian {
    variance: f64,
    log_sqrt_2_pi_var: f64,
}

impl IsotropicGaussian {
    pub fn new(variance: f64) -> Self {
        IsotropicGaussian {
            variance,
            log_sqrt_2_pi_var: (2.0 * std::f64::consts::PI * variance).sqrt().ln(),
        }
    }

    pub fn standard() -> Self {
        Self::new(1.)
    }
}

impl Target for IsotropicGaussian {
    fn cost(&self, params: &[ArrayD<f64>], _batch: Option<&Batch>) -> f64 {
        params
            .iter()
            .flat_map(|p| p.iter())
            .map(|x| 0.5 * x * x / self.variance + self.log_sqrt_2_pi_var)
            .sum()
    }

    fn gradient(&self, params: &[ArrayD<f64>], _batch: Option<&Batch>) -> Vec<ArrayD<f64>> {
        params.iter().map(|p| p / self.variance).collect()
    }
}

/// The two-dimensional banana-shaped density
/// `log p(x, y) = -0.5 * (0.01 x^2 + (y + 0.1 x^2 - 10)^2)`.
///
/// `x` and `y` are the first two components of the concatenated parameters;
/// all other components are ignored and get zero gradient.
pub struct Banana;

impl Banana {
    fn xy(params: &[ArrayD<f64>]) -> (f64, f64) {
        let flat = concat(params);
        (
            flat.first().copied().unwrap_or(0.),
            flat.get(1).copied().unwrap_or(0.),
        )
    }
}

impl Target for Banana {
    fn cost(&self, params: &[ArrayD<f64>], _batch: Option<&Batch>) -> f64 {
        let (x, y) = Self::xy(params);
        let bend = y + 0.1 * x * x - 10.;
        0.5 * (0.01 * x * x + bend * bend)
    }

    fn gradient(&self, params: &[ArrayD<f64>], _batch: Option<&Batch>) -> Vec<ArrayD<f64>> {
        let (x, y) = Self::xy(params);
        let bend = y + 0.1 * x * x - 10.;
        let mut flat = vec![0.; params.iter().map(|p| p.len()).sum()];
        if let Some(dx) = flat.get_mut(0) {
            *dx = 0.01 * x + 0.2 * x * bend;
        }
        if let Some(dy) = flat.get_mut(1) {
            *dy = bend;
        }
        split_like(&flat, params)
    }
}

/// Mixture of univariate normals, applied independently to every parameter component.
pub struct GaussianMixture {
    log_weights: Array1<f64>,
    means: Array1<f64>,
    stds: Array1<f64>,
}

impl GaussianMixture {
    /// Weights are normalized to sum to one. All three arrays need one entry per component.
    pub fn new(weights: Array1<f64>, means: Array1<f64>, stds: Array1<f64>) -> Result<Self, SamplerError> {
        for other in [&means, &stds] {
            if other.len() != weights.len() {
                return Err(SamplerError::ShapeMismatch {
                    expected: vec![weights.len()],
                    found: vec![other.len()],
                });
            }
        }
        let total = weights.sum();
        Ok(GaussianMixture {
            log_weights: weights.mapv(|w| (w / total).ln()),
            means,
            stds,
        })
    }

    // log N(x | mean_k, std_k) + log w_k for every component k
    fn component_log_densities(&self, x: f64) -> Array1<f64> {
        let log_sqrt_2_pi = (2.0 * std::f64::consts::PI).sqrt().ln();
        let mut res = self.log_weights.clone();
        Zip::from(&mut res)
            .and(&self.means)
            .and(&self.stds)
            .for_each(|lp, &m, &s| {
                let z = (x - m) / s;
                *lp += -0.5 * z * z - s.ln() - log_sqrt_2_pi;
            });
        res
    }

    fn log_density(&self, x: f64) -> f64 {
        log_sum_exp(&self.component_log_densities(x))
    }

    fn log_density_gradient(&self, x: f64) -> f64 {
        let lps = self.component_log_densities(x);
        let norm = log_sum_exp(&lps);
        lps.iter()
            .zip(self.means.iter().zip(self.stds.iter()))
            .map(|(lp, (m, s))| (lp - norm).exp() * -(x - m) / (s * s))
            .sum()
    }
}

fn log_sum_exp(values: &Array1<f64>) -> f64 {
    let max = values.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
    if !max.is_finite() {
        return max;
    }
    max + values.mapv(|v| (v - max).exp()).sum().ln()
}

impl Target for GaussianMixture {
    fn cost(&self, params: &[ArrayD<f64>], _batch: Option<&Batch>) -> f64 {
        -params
            .iter()
            .flat_map(|p| p.iter())
            .map(|&x| self.log_density(x))
            .sum::<f64>()
    }

    fn gradient(&self, params: &[ArrayD<f64>], _batch: Option<&Batch>) -> Vec<ArrayD<f64>> {
        params
            .iter()
            .map(|p| p.mapv(|x| -self.log_density_gradient(x)))
            .collect()
    }
}

/// Posterior over the mean `mu` of normally distributed data with known variance,
/// under a zero-mean normal prior. Observations arrive in minibatches under the key
/// `"x"`; the likelihood of a minibatch is rescaled to the full `dataset_size`.
///
/// Every component of the parameters is an independent mean estimate.
pub struct GaussianMeanModel {
    pub prior_variance: f64,
    pub noise_variance: f64,
    pub dataset_size: usize,
}

impl GaussianMeanModel {
    pub const DATA_KEY: &'static str = "x";

    fn observations<'a>(&self, batch: Option<&'a Batch>) -> Option<&'a ArrayD<f64>> {
        batch
            .and_then(|b| b.get(Self::DATA_KEY))
            .filter(|x| !x.is_empty())
    }

    fn likelihood_scale(&self, observations: &ArrayD<f64>) -> f64 {
        self.dataset_size as f64 / observations.len() as f64
    }
}

impl Target for GaussianMeanModel {
    fn cost(&self, params: &[ArrayD<f64>], batch: Option<&Batch>) -> f64 {
        let observations = self.observations(batch);
        params
            .iter()
            .flat_map(|p| p.iter())
            .map(|&mu| {
                let prior = 0.5 * mu * mu / self.prior_variance;
                let likelihood = observations.map_or(0., |xs| {
                    self.likelihood_scale(xs)
                        * xs.iter()
                            .map(|x| 0.5 * (x - mu) * (x - mu) / self.noise_variance)
                            .sum::<f64>()
                });
                prior + likelihood
            })
            .sum()
    }

    fn gradient(&self, params: &[ArrayD<f64>], batch: Option<&Batch>) -> Vec<ArrayD<f64>> {
        let observations = self.observations(batch);
        params
            .iter()
            .map(|p| {
                p.mapv(|mu| {
                    let prior = mu / self.prior_variance;
                    let likelihood = observations.map_or(0., |xs| {
                        self.likelihood_scale(xs)
                            * xs.iter().map(|x| (mu - x) / self.noise_variance).sum::<f64>()
                    });
                    prior + likelihood
                })
            })
            .collect()
    }
}
