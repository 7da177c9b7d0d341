//! Flattening of arbitrarily shaped parameters into vectors, so that the sampler
//! can keep its statistics per scalar component.

use crate::error::SamplerError;
use ndarray::{Array1, ArrayD, IxDyn};

/// Flatten `tensor` into a vector, in logical (row-major) order.
pub fn vectorize(tensor: &ArrayD<f64>) -> Array1<f64> {
    tensor.iter().copied().collect()
}

/// Reshape `vector` back into `original_shape`. Inverse of [`vectorize`].
pub fn unvectorize(vector: Array1<f64>, original_shape: &[usize]) -> Result<ArrayD<f64>, SamplerError> {
    let found = vec![vector.len()];
    if vector.len() != original_shape.iter().product::<usize>() {
        return Err(SamplerError::ShapeMismatch {
            expected: original_shape.to_vec(),
            found,
        });
    }
    vector
        .into_shape(IxDyn(original_shape))
        .map_err(|_| SamplerError::ShapeMismatch {
            expected: original_shape.to_vec(),
            found,
        })
}
