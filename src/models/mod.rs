//! Built-in model implementations for common fitting problems.
//!
//! Every model can carry a prefix that is put in front of its parameter
//! names, so several instances can share one parameter set. Each model module
//! registers its constructor with the [`ModelRegistry`] through
//! [`register_builtin`].

use ndarray::Array1;

use crate::error::{FitError, Result};
use crate::model::Value;
use crate::registry::ModelRegistry;

mod constant;
mod exponential;
mod linear;
mod peak;

// Re-export the models
pub use constant::ConstantModel;
pub use exponential::ExponentialModel;
pub use linear::LinearModel;
pub use peak::GaussianModel;

/// Register every built-in model under its type name
pub fn register_builtin(registry: &ModelRegistry) {
    constant::register(registry);
    linear::register(registry);
    exponential::register(registry);
    peak::register(registry);
}

/// Samples of the independent variable `var` handed to a guess, checked
/// against the data length
pub(crate) fn guess_samples(
    var: &str,
    data: &Array1<f64>,
    independent: Option<(&str, &Value)>,
) -> Result<Array1<f64>> {
    let (_, value) = independent.ok_or_else(|| FitError::MissingBinding(var.to_string()))?;
    let x = value.to_array();

    if x.len() != data.len() {
        return Err(FitError::DimensionMismatch(format!(
            "'{}' has {} samples but the data has {}",
            var,
            x.len(),
            data.len()
        )));
    }
    if x.is_empty() {
        return Err(FitError::InvalidInput("No data to guess from".to_string()));
    }
    Ok(x)
}

/// Least-squares straight line through `(x, y)`, as `(slope, intercept)`.
///
/// A vertical or single-point cloud gives a zero slope through the mean.
pub(crate) fn linear_regression(x: &Array1<f64>, y: &Array1<f64>) -> (f64, f64) {
    let n = x.len() as f64;
    let mean_x = x.sum() / n;
    let mean_y = y.sum() / n;

    let sxx: f64 = x.iter().map(|&xi| (xi - mean_x).powi(2)).sum();
    let sxy: f64 = x
        .iter()
        .zip(y.iter())
        .map(|(&xi, &yi)| (xi - mean_x) * (yi - mean_y))
        .sum();

    if sxx == 0.0 {
        return (0.0, mean_y);
    }

    let slope = sxy / sxx;
    (slope, mean_y - slope * mean_x)
}
