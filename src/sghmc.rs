//! Stochastic Gradient Hamiltonian Monte Carlo with an adaptive burn-in.
//!
//! Every step updates, per scalar parameter component, running estimates of the
//! mean and second moment of the gradient and derives a diagonal inverse mass
//! from them (Springenberg et al. 2016), then performs the SGHMC update of
//! Chen et al. (2014) with that preconditioner. The first `burn_in_steps` steps
//! are the burn-in whose samples [`Sghmc::sample`] discards.

use crate::burn_in::BurnInState;
use crate::config::SghmcConfig;
use crate::error::SamplerError;
use crate::math_helpers::kinetic_energy;
use crate::momentum::{draw_noise, noise_scale, noise_stddev, update_momentum, NOISE_VARIANCE_FLOOR};
use crate::stepsize::{ConstantStepsizeSchedule, Leapfrog, LeapfrogState, StepsizeSchedule};
use crate::target::{Batch, Target};
use crate::vectorize::{unvectorize, vectorize};
use ndarray::{Array1, ArrayD};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::iter::Peekable;

type Batches = Peekable<Box<dyn Iterator<Item = Batch>>>;

/// Parameter values after a step, with the cost at the values the step started from.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub params: Vec<ArrayD<f64>>,
    pub cost: f64,
}

/// Sampler state belonging to one parameter.
#[derive(Debug, Clone)]
struct ParameterState {
    burn_in: BurnInState,
    momentum: Array1<f64>,
}

impl ParameterState {
    fn new(dim: usize) -> Self {
        Self {
            burn_in: BurnInState::new(dim),
            momentum: Array1::zeros(dim),
        }
    }
}

pub struct Sghmc<D>
where
    D: Target,
{
    target: D,
    params: Vec<ArrayD<f64>>,
    initial_params: Vec<ArrayD<f64>>,
    states: Vec<ParameterState>,
    config: SghmcConfig,
    schedule: Box<dyn StepsizeSchedule>,
    batches: Option<Batches>,
    rng: ChaCha8Rng,
    current_step: usize,
}

impl<D> Sghmc<D>
where
    D: Target,
{
    pub fn new(target: D, params: Vec<ArrayD<f64>>, config: SghmcConfig) -> Result<Self, SamplerError> {
        Self::build(target, params, config, None)
    }

    /// Sampler whose target is evaluated on one batch of `batches` per step.
    pub fn with_batches<I>(
        target: D,
        params: Vec<ArrayD<f64>>,
        config: SghmcConfig,
        batches: I,
    ) -> Result<Self, SamplerError>
    where
        I: Iterator<Item = Batch> + 'static,
    {
        let batches: Box<dyn Iterator<Item = Batch>> = Box::new(batches);
        Self::build(target, params, config, Some(batches.peekable()))
    }

    fn build(
        target: D,
        params: Vec<ArrayD<f64>>,
        config: SghmcConfig,
        mut batches: Option<Batches>,
    ) -> Result<Self, SamplerError> {
        config.validate()?;
        if params.is_empty() {
            return Err(SamplerError::NoParameters);
        }
        // probe the gradient once so that a mismatching target fails here
        let batch = batches.as_mut().and_then(|b| b.peek());
        vectorized_gradients(&target, &params, batch)?;

        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let states = params.iter().map(|p| ParameterState::new(p.len())).collect();
        Ok(Self {
            target,
            initial_params: params.clone(),
            params,
            states,
            schedule: Box::new(ConstantStepsizeSchedule::new(config.epsilon)),
            config,
            batches,
            rng,
            current_step: 0,
        })
    }

    pub fn with_stepsize_schedule<S>(mut self, schedule: S) -> Self
    where
        S: StepsizeSchedule + 'static,
    {
        self.schedule = Box::new(schedule);
        self
    }

    pub fn stepsize_schedule(&self) -> &dyn StepsizeSchedule {
        self.schedule.as_ref()
    }

    pub fn config(&self) -> &SghmcConfig {
        &self.config
    }

    pub fn params(&self) -> &[ArrayD<f64>] {
        &self.params
    }

    pub fn target(&self) -> &D {
        &self.target
    }

    pub fn momentum(&self) -> Vec<Array1<f64>> {
        self.states.iter().map(|s| s.momentum.clone()).collect()
    }

    pub fn burn_in_state(&self, param_ix: usize) -> Option<&BurnInState> {
        self.states.get(param_ix).map(|s| &s.burn_in)
    }

    /// Inverse mass per parameter, as used by the last step.
    pub fn minv(&self) -> Vec<Array1<f64>> {
        self.states.iter().map(|s| s.burn_in.minv().clone()).collect()
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn is_burning_in(&self) -> bool {
        self.current_step < self.config.burn_in_steps
    }

    /// Perform one step with the stepsize of the schedule, then feed the schedule
    /// the state the step started from.
    pub fn step(&mut self) -> Result<Sample, SamplerError> {
        let epsilon = self.schedule.next_stepsize();
        let start_kinetic_energy = kinetic_energy(self.states.iter().map(|s| &s.momentum));
        let sample = self.advance(epsilon)?;
        self.schedule.update(sample.cost, start_kinetic_energy);
        Ok(sample)
    }

    /// Run the remaining burn-in steps.
    pub fn burn_in(&mut self) -> Result<(), SamplerError> {
        while self.is_burning_in() {
            self.step()?;
        }
        Ok(())
    }

    /// Finish burn-in, then draw `n_samples` samples.
    pub fn sample(&mut self, n_samples: usize) -> Result<Vec<Sample>, SamplerError> {
        self.burn_in()?;
        let samples = (0..n_samples)
            .map(|_| self.step())
            .collect::<Result<Vec<_>, _>>()?;
        log::info!(
            "drew {} samples after {} steps with {}",
            samples.len(),
            self.current_step,
            self.schedule
        );
        Ok(samples)
    }

    fn next_batch(&mut self) -> Result<Option<Batch>, SamplerError> {
        match self.batches.as_mut() {
            None => Ok(None),
            Some(batches) => batches.next().map(Some).ok_or(SamplerError::BatchesExhausted),
        }
    }

    fn advance(&mut self, epsilon: f64) -> Result<Sample, SamplerError> {
        let batch = self.next_batch()?;
        let cost = self.target.cost(&self.params, batch.as_ref());
        let grads = vectorized_gradients(&self.target, &self.params, batch.as_ref())?;

        let epsilon_scaled = self.config.scaled_epsilon(epsilon);
        let (mdecay, noise) = (self.config.mdecay, self.config.noise);

        for ((param, state), grad) in self.params.iter_mut().zip(self.states.iter_mut()).zip(grads.iter()) {
            // minv of this step is read from the statistics of the previous step
            let minv = state.burn_in.update(grad).clone();

            let sigma = noise_stddev(&minv, epsilon_scaled, mdecay, noise);
            if log::log_enabled!(log::Level::Trace) {
                let clamped = minv
                    .iter()
                    .filter(|&&m| noise_scale(m, epsilon_scaled, mdecay, noise) < NOISE_VARIANCE_FLOOR)
                    .count();
                log::trace!("step {}: clamped noise variance of {clamped} components", self.current_step);
            }
            let sample = draw_noise(&sigma, &mut self.rng);

            state.momentum = update_momentum(&state.momentum, grad, &minv, epsilon, mdecay, &sample);
            let theta = vectorize(param) + &state.momentum;
            let shape = param.shape().to_vec();
            *param = unvectorize(theta, &shape)?;
        }

        self.current_step += 1;
        if self.current_step == self.config.burn_in_steps {
            log::debug!("burn-in finished after {} steps", self.current_step);
        }
        Ok(Sample {
            params: self.params.clone(),
            cost,
        })
    }

    fn peeked_cost(&mut self) -> f64 {
        let batch = self.batches.as_mut().and_then(|b| b.peek());
        self.target.cost(&self.params, batch)
    }
}

impl<D> Leapfrog for Sghmc<D>
where
    D: Target,
{
    fn current_state(&mut self) -> LeapfrogState {
        LeapfrogState {
            cost: self.peeked_cost(),
            momentum: self.momentum(),
        }
    }

    /// One step with `epsilon` in place of the schedule's stepsize. The cost is
    /// evaluated at the parameters the step ends in.
    fn leapfrog(&mut self, epsilon: f64) -> Result<LeapfrogState, SamplerError> {
        self.advance(epsilon)?;
        Ok(self.current_state())
    }

    fn reset(&mut self) {
        self.params = self.initial_params.clone();
        self.states = self.params.iter().map(|p| ParameterState::new(p.len())).collect();
        self.current_step = 0;
    }
}

impl<D> Iterator for Sghmc<D>
where
    D: Target,
{
    type Item = Result<Sample, SamplerError>;

    /// Ends when the batches run out.
    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Err(SamplerError::BatchesExhausted) => None,
            res => Some(res),
        }
    }
}

/// Gradient of `target` at `params`, one vector per parameter, checked against
/// the parameters' count and shapes.
fn vectorized_gradients<D: Target + ?Sized>(
    target: &D,
    params: &[ArrayD<f64>],
    batch: Option<&Batch>,
) -> Result<Vec<Array1<f64>>, SamplerError> {
    let grads = target.gradient(params, batch);
    if grads.len() != params.len() {
        return Err(SamplerError::GradientCountMismatch {
            params: params.len(),
            gradients: grads.len(),
        });
    }
    grads
        .iter()
        .zip(params.iter())
        .map(|(grad, param)| {
            if grad.shape() != param.shape() {
                return Err(SamplerError::ShapeMismatch {
                    expected: param.shape().to_vec(),
                    found: grad.shape().to_vec(),
                });
            }
            Ok(vectorize(grad))
        })
        .collect()
}
