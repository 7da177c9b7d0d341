//! Stepsize schedules for the sampler's discretization parameter.

use crate::error::SamplerError;
use crate::math_helpers::kinetic_energy;
use ndarray::Array1;
use std::f64::consts::LN_2;
use std::fmt;

const DELTA: f64 = 0.65;
const GAMMA: f64 = 0.05;
const T0: f64 = 10.;
const KAPPA: f64 = 0.75;
const MAX_RESCALINGS: usize = 64;

/// Policy producing the stepsize for every step of a sampler.
pub trait StepsizeSchedule: fmt::Display {
    /// Stepsize to use for the next step.
    fn next_stepsize(&mut self) -> f64;
    /// Feed back the state `(cost, kinetic energy)` the last step started from.
    fn update(&mut self, cost: f64, kinetic_energy: f64);
    fn initial_value(&self) -> f64;
}

/// Cost and momentum of a sampler state.
#[derive(Debug, Clone, PartialEq)]
pub struct LeapfrogState {
    pub cost: f64,
    pub momentum: Vec<Array1<f64>>,
}

impl LeapfrogState {
    /// Log of the unnormalized joint density `exp(-cost - 0.5 * r.r)`.
    pub fn log_density(&self) -> f64 {
        -self.cost - kinetic_energy(&self.momentum)
    }
}

/// Samplers that can simulate single steps under an explicitly given stepsize.
pub trait Leapfrog {
    fn current_state(&mut self) -> LeapfrogState;
    /// Perform one step with stepsize `epsilon` and return the state it ends in.
    fn leapfrog(&mut self, epsilon: f64) -> Result<LeapfrogState, SamplerError>;
    /// Restore the state the sampler was constructed with.
    fn reset(&mut self);
}

/// Heuristic of Hoffman & Gelman (2014) for an initial stepsize.
///
/// Starting from `epsilon = 1`, repeatedly doubles or halves the stepsize until
/// the density ratio of a single step's proposal to the starting state crosses
/// `0.5`, and returns the first stepsize past the crossing. The sampler is reset
/// before every trial and once more before returning.
pub fn find_reasonable_epsilon<L: Leapfrog + ?Sized>(sampler: &mut L) -> Result<f64, SamplerError> {
    let mut epsilon = 1.;
    sampler.reset();
    let log_p0 = sampler.current_state().log_density();
    let mut log_ratio = sampler.leapfrog(epsilon)?.log_density() - log_p0;

    // ratio^a > 2^-a, in log space
    let a: f64 = if log_ratio > -LN_2 { 1. } else { -1. };
    let mut rescalings = 0;
    while a * log_ratio > -a * LN_2 {
        if rescalings == MAX_RESCALINGS {
            sampler.reset();
            return Err(SamplerError::StepsizeSearchDiverged { epsilon });
        }
        epsilon *= 2_f64.powf(a);
        sampler.reset();
        log_ratio = sampler.leapfrog(epsilon)?.log_density() - log_p0;
        log::debug!("stepsize heuristic: epsilon = {epsilon}, log density ratio = {log_ratio}");
        rescalings += 1;
    }
    sampler.reset();
    Ok(epsilon)
}

/// Trivial schedule that keeps the stepsize at a constant value.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantStepsizeSchedule {
    initial_value: f64,
}

impl ConstantStepsizeSchedule {
    pub fn new(initial_value: f64) -> Self {
        Self { initial_value }
    }
}

impl StepsizeSchedule for ConstantStepsizeSchedule {
    fn next_stepsize(&mut self) -> f64 {
        self.initial_value
    }

    fn update(&mut self, _cost: f64, _kinetic_energy: f64) {}

    fn initial_value(&self) -> f64 {
        self.initial_value
    }
}

impl Iterator for ConstantStepsizeSchedule {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        Some(self.next_stepsize())
    }
}

impl fmt::Display for ConstantStepsizeSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConstantStepsizeSchedule(stepsize={})", self.initial_value)
    }
}

/// Stepsize adaptation by dual averaging (Hoffman & Gelman 2014, Algorithm 5).
///
/// The acceptance statistic of an update is the Metropolis ratio
/// `min(1, exp(H_prev - H))` between the joint energies `H = cost + kinetic energy`
/// of two consecutive states. The log stepsize is driven so that the average
/// statistic approaches `delta`. After `adaptation_steps` updates (if set), the
/// schedule switches to the averaged stepsize and ignores further feedback.
#[derive(Debug, Clone, PartialEq)]
pub struct DualAveragingStepsizeSchedule {
    initial_value: f64,
    delta: f64,
    gamma: f64,
    t_0: f64,
    kappa: f64,
    adaptation_steps: Option<usize>,
    // shrinkage target of the log stepsize
    mu: f64,
    stepsize: f64,
    log_averaged_stepsize: f64,
    h_bar: f64,
    m: usize,
    last_hamiltonian: Option<f64>,
}

impl DualAveragingStepsizeSchedule {
    pub fn new(initial_value: f64) -> Self {
        Self {
            initial_value,
            delta: DELTA,
            gamma: GAMMA,
            t_0: T0,
            kappa: KAPPA,
            adaptation_steps: None,
            mu: (10. * initial_value).ln(),
            stepsize: initial_value,
            log_averaged_stepsize: initial_value.ln(),
            h_bar: 0.,
            m: 1,
            last_hamiltonian: None,
        }
    }

    /// Target acceptance `delta`, adaptation rate `gamma` and stabilization offset `t_0`.
    pub fn with_parameters(mut self, delta: f64, gamma: f64, t_0: f64) -> Self {
        self.delta = delta;
        self.gamma = gamma;
        self.t_0 = t_0;
        self
    }

    pub fn with_adaptation_steps(mut self, adaptation_steps: usize) -> Self {
        self.adaptation_steps = Some(adaptation_steps);
        self
    }

    /// Restart the adaptation from the stepsize found by [`find_reasonable_epsilon`].
    pub fn initialize_from<L: Leapfrog + ?Sized>(&mut self, sampler: &mut L) -> Result<f64, SamplerError> {
        let epsilon = find_reasonable_epsilon(sampler)?;
        *self = Self {
            delta: self.delta,
            gamma: self.gamma,
            t_0: self.t_0,
            kappa: self.kappa,
            adaptation_steps: self.adaptation_steps,
            ..Self::new(epsilon)
        };
        Ok(epsilon)
    }

    pub fn is_adapting(&self) -> bool {
        self.adaptation_steps.map_or(true, |n| self.m <= n)
    }

    pub fn averaged_stepsize(&self) -> f64 {
        self.log_averaged_stepsize.exp()
    }
}

impl StepsizeSchedule for DualAveragingStepsizeSchedule {
    fn next_stepsize(&mut self) -> f64 {
        if self.is_adapting() {
            self.stepsize
        } else {
            self.averaged_stepsize()
        }
    }

    fn update(&mut self, cost: f64, kinetic_energy: f64) {
        if !self.is_adapting() {
            return;
        }
        let hamiltonian = cost + kinetic_energy;
        let Some(last_hamiltonian) = self.last_hamiltonian.replace(hamiltonian) else {
            return;
        };
        let log_alpha = last_hamiltonian - hamiltonian;
        let alpha = if log_alpha.is_nan() { 0. } else { log_alpha.min(0.).exp() };

        let m = self.m as f64;
        let w = 1. / (m + self.t_0);
        self.h_bar = (1. - w) * self.h_bar + w * (self.delta - alpha);
        let log_stepsize = self.mu - (m.sqrt() / self.gamma) * self.h_bar;
        self.stepsize = log_stepsize.exp();
        let m_pow_neg_kappa = m.powf(-self.kappa);
        self.log_averaged_stepsize =
            m_pow_neg_kappa * log_stepsize + (1. - m_pow_neg_kappa) * self.log_averaged_stepsize;
        self.m += 1;

        if !self.is_adapting() {
            log::debug!(
                "dual averaging finished after {} updates, stepsize {}",
                self.m - 1,
                self.averaged_stepsize()
            );
        }
    }

    fn initial_value(&self) -> f64 {
        self.initial_value
    }
}

impl fmt::Display for DualAveragingStepsizeSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DualAveragingStepsizeSchedule(stepsize={}, delta={}, gamma={}, t_0={})",
            self.stepsize, self.delta, self.gamma, self.t_0
        )
    }
}
