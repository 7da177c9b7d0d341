use crate::error::SamplerError;
use serde::{Deserialize, Serialize};

/// Configuration of an SGHMC sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SghmcConfig {
    /// Discretization parameter, used as the stepsize of the default constant schedule.
    pub epsilon: f64,
    /// Number of initial steps during which the sampler adapts its preconditioner.
    pub burn_in_steps: usize,
    /// Scales the injected noise; usually the number of datapoints in the full dataset.
    pub scale_grad: f64,
    /// Constant momentum decay per step.
    pub mdecay: f64,
    /// Estimate of the gradient noise that is already present in the gradients.
    pub noise: f64,
    /// Seed of the sampler's random number generator. Drawn from entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for SghmcConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.01,
            burn_in_steps: 3000,
            scale_grad: 1.0,
            mdecay: 0.05,
            noise: 0.0,
            seed: None,
        }
    }
}

impl SghmcConfig {
    /// Parse a configuration from JSON. Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self, SamplerError> {
        let config: SghmcConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SamplerError> {
        if !(self.epsilon.is_finite() && self.epsilon > 0.) {
            return Err(SamplerError::InvalidConfig(format!(
                "epsilon must be positive and finite, got {}",
                self.epsilon
            )));
        }
        if !(self.scale_grad.is_finite() && self.scale_grad > 0.) {
            return Err(SamplerError::InvalidConfig(format!(
                "scale_grad must be positive and finite, got {}",
                self.scale_grad
            )));
        }
        if !(self.mdecay.is_finite() && self.mdecay >= 0.) {
            return Err(SamplerError::InvalidConfig(format!(
                "mdecay must be non-negative and finite, got {}",
                self.mdecay
            )));
        }
        if !self.noise.is_finite() {
            return Err(SamplerError::InvalidConfig(format!(
                "noise must be finite, got {}",
                self.noise
            )));
        }
        Ok(())
    }

    /// Epsilon divided by the square root of `scale_grad`, the stepsize the noise term sees.
    pub fn scaled_epsilon(&self, epsilon: f64) -> f64 {
        epsilon / self.scale_grad.sqrt()
    }
}
