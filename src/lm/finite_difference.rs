//! Forward-difference Jacobian for residual functions.

use ndarray::{Array1, Array2};

use crate::error::{FitError, Result};

/// Compute the Jacobian of `f` at `x` with forward differences.
///
/// `residuals` must be `f(x)`; it is passed in so the caller's evaluation is
/// reused. The step for each parameter is `epsilon` scaled by the
/// parameter's magnitude, or `epsilon` itself near zero. When expressions
/// cannot be evaluated at the forward point, a backward step is used instead.
pub fn jacobian<F>(f: &mut F, x: &Array1<f64>, residuals: &Array1<f64>, epsilon: f64) -> Result<Array2<f64>>
where
    F: FnMut(&Array1<f64>) -> Result<Array1<f64>>,
{
    let n_params = x.len();
    let n_residuals = residuals.len();
    let mut jac = Array2::zeros((n_residuals, n_params));

    for j in 0..n_params {
        let mut perturbed = x.clone();

        // Adapt epsilon to parameter scale
        let eps_j = if x[j].abs() > epsilon {
            x[j].abs() * epsilon
        } else {
            epsilon
        };
        perturbed[j] += eps_j;

        let (shifted, eps_j) = match f(&perturbed) {
            Ok(shifted) => (shifted, eps_j),
            Err(err) if err.is_evaluation_error() => {
                perturbed[j] = x[j] - eps_j;
                (f(&perturbed)?, -eps_j)
            }
            Err(err) => return Err(err),
        };
        if shifted.len() != n_residuals {
            return Err(FitError::DimensionMismatch(format!(
                "Expected {} residuals, got {}",
                n_residuals,
                shifted.len()
            )));
        }

        for i in 0..n_residuals {
            jac[[i, j]] = (shifted[i] - residuals[i]) / eps_j;
        }
    }

    Ok(jac)
}
