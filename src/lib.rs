//! Stochastic Gradient Hamiltonian Monte Carlo with an adaptive burn-in procedure,
//! and stepsize schedules for its discretization parameter.

pub mod burn_in;
pub mod config;
pub mod error;
pub mod math_helpers;
pub mod momentum;
pub mod sghmc;
pub mod stepsize;
pub mod target;
pub mod vectorize;

pub use config::SghmcConfig;
pub use error::SamplerError;
pub use sghmc::{Sample, Sghmc};
pub use stepsize::{
    find_reasonable_epsilon, ConstantStepsizeSchedule, DualAveragingStepsizeSchedule, Leapfrog,
    StepsizeSchedule,
};
pub use target::{Batch, Target};
