use thiserror::Error;

/// Errors surfaced by the sampler.
///
/// Numerical degeneracies (zero denominators, negative variances) are never
/// reported here; they are absorbed by the safe operations in `math_helpers`.
#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("target returned {gradients} gradients for {params} parameters")]
    GradientCountMismatch { params: usize, gradients: usize },

    #[error("a sampler needs at least one parameter to sample")]
    NoParameters,

    #[error("the batch source ran out of batches")]
    BatchesExhausted,

    #[error("invalid sampler configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse sampler configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("no reasonable stepsize found, search stopped at epsilon = {epsilon:e}")]
    StepsizeSearchDiverged { epsilon: f64 },
}
