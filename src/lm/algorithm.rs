//! Core Levenberg-Marquardt algorithm implementation.
//!
//! Each iteration solves the damped normal equations
//! `(JᵀJ + λ·diag(JᵀJ)) δ = −Jᵀr` with a Cholesky factorisation, falling back
//! to LU when the damped matrix is not positive definite. Steps that lower the
//! cost are accepted and shrink λ; rejected steps grow it.
//!
//! As in MINPACK, the step is also held inside a bound `Δ` on `‖D·δ‖`, where
//! `D` holds the largest Jacobian column norms seen so far. `Δ` starts at
//! `step_bound·‖D·x0‖`, halves on rejected steps and doubles when the cost
//! drops as the linear model predicted.

use std::fmt;

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};
use tracing::debug;

use super::config::LmConfig;
use super::finite_difference;
use crate::error::{FitError, Result};

/// Result of the Levenberg-Marquardt optimization.
#[derive(Debug, Clone)]
pub struct LmReport {
    /// Optimized parameter values
    pub x: Array1<f64>,

    /// Residuals at the solution
    pub residuals: Array1<f64>,

    /// Sum of squared residuals
    pub cost: f64,

    /// Number of iterations performed
    pub iterations: usize,

    /// Number of residual function evaluations
    pub nfev: usize,

    /// Whether the optimization converged
    pub success: bool,

    /// A message describing the result
    pub message: String,

    /// The Jacobian at the solution
    pub jacobian: Array2<f64>,
}

impl fmt::Display for LmReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Result:")?;
        writeln!(f, "  Success: {}", self.success)?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.nfev)?;
        writeln!(f, "  Parameters: {:?}", self.x)?;
        Ok(())
    }
}

/// The Levenberg-Marquardt optimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    config: LmConfig,
}

impl LevenbergMarquardt {
    /// Create a new Levenberg-Marquardt optimizer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new Levenberg-Marquardt optimizer with the given configuration.
    pub fn with_config(config: LmConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    /// Minimize the sum of squared residuals returned by `residual_fn`.
    ///
    /// Non-finite trial residuals count as a rejected step, and so does a
    /// trial point whose expressions cannot be evaluated. Both are errors at
    /// `x0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fitter_rs::lm::LevenbergMarquardt;
    /// use ndarray::{array, Array1};
    ///
    /// // Minimum of (a - 3)^2 + (b + 1)^2
    /// let residuals = |p: &Array1<f64>| Ok(array![p[0] - 3.0, p[1] + 1.0]);
    /// let report = LevenbergMarquardt::new().minimize(residuals, array![0.0, 0.0]).unwrap();
    ///
    /// assert!(report.success);
    /// assert!((report.x[0] - 3.0).abs() < 1e-6);
    /// assert!((report.x[1] + 1.0).abs() < 1e-6);
    /// ```
    pub fn minimize<F>(&self, mut residual_fn: F, x0: Array1<f64>) -> Result<LmReport>
    where
        F: FnMut(&Array1<f64>) -> Result<Array1<f64>>,
    {
        let config = &self.config;
        let n_params = x0.len();

        let mut x = x0;
        let mut residuals = residual_fn(&x)?;
        let mut nfev = 1;

        if residuals.iter().any(|r| !r.is_finite()) {
            return Err(FitError::InvalidInput(
                "Residuals are not finite at the starting point".to_string(),
            ));
        }
        let mut cost = sum_of_squares(&residuals);

        if n_params == 0 {
            return Ok(LmReport {
                x,
                jacobian: Array2::zeros((residuals.len(), 0)),
                residuals,
                cost,
                iterations: 0,
                nfev,
                success: true,
                message: "No parameters to optimize".to_string(),
            });
        }

        let mut jacobian = finite_difference::jacobian(&mut residual_fn, &x, &residuals, config.epsilon)?;
        nfev += n_params;

        let mut lambda = config.initial_lambda;
        let mut iterations = 0;
        let mut scale = Array1::<f64>::zeros(n_params);
        let mut bound: Option<f64> = None;

        let (success, message) = loop {
            if iterations >= config.max_iterations {
                break (
                    false,
                    format!("Maximum iterations ({}) reached", config.max_iterations),
                );
            }

            let j = to_matrix(&jacobian);
            let r = DVector::from_iterator(residuals.len(), residuals.iter().copied());
            let jtj = j.transpose() * &j;
            let g = j.transpose() * &r;

            let gradient_max = g.amax();
            if gradient_max <= config.gtol {
                break (
                    true,
                    format!(
                        "Gradient convergence: max |g| = {:.2e} <= {:.2e}",
                        gradient_max, config.gtol
                    ),
                );
            }

            iterations += 1;

            let Some(solved) = solve_damped(&jtj, &g, lambda) else {
                lambda *= config.lambda_factor;
                if lambda > config.max_lambda {
                    break (
                        false,
                        "Singular normal equations and lambda reached its maximum".to_string(),
                    );
                }
                continue;
            };
            let mut step = Array1::from_iter(solved.iter().copied());

            for (i, d) in scale.iter_mut().enumerate() {
                *d = d.max(jtj[(i, i)].sqrt());
            }
            let delta = *bound.get_or_insert_with(|| {
                let x_scaled = scaled_norm(&scale, &x);
                if x_scaled > 0.0 {
                    config.step_bound * x_scaled
                } else {
                    config.step_bound
                }
            });
            let mut step_scaled = scaled_norm(&scale, &step);
            if step_scaled > delta {
                step *= delta / step_scaled;
                step_scaled = delta;
            }

            let x_norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();
            let step_norm = step.iter().map(|v| v * v).sum::<f64>().sqrt();
            if step_norm <= config.xtol * (x_norm + config.xtol) {
                break (
                    true,
                    format!(
                        "Parameter convergence: |dx| = {:.2e} <= xtol * |x|",
                        step_norm
                    ),
                );
            }

            let x_new = &x + &step;
            let trial = match residual_fn(&x_new) {
                Ok(r_new) => Some(r_new),
                Err(err) if err.is_evaluation_error() => {
                    debug!(%err, "trial point rejected");
                    None
                }
                Err(err) => return Err(err),
            };
            nfev += 1;

            let accepted = trial.and_then(|r_new| {
                let new_cost = if r_new.iter().all(|v| v.is_finite()) {
                    sum_of_squares(&r_new)
                } else {
                    f64::INFINITY
                };
                (new_cost < cost).then_some((r_new, new_cost))
            });

            if let Some((r_new, new_cost)) = accepted {
                let reduction = (cost - new_cost) / cost;
                let predicted = cost - sum_of_squares(&(&residuals + &jacobian.dot(&step)));
                if predicted > 0.0 && (cost - new_cost) / predicted > 0.75 {
                    bound = Some(delta.max(2.0 * step_scaled));
                }

                x = x_new;
                residuals = r_new;
                cost = new_cost;
                lambda = (lambda / config.lambda_factor).max(config.min_lambda);

                jacobian = finite_difference::jacobian(&mut residual_fn, &x, &residuals, config.epsilon)?;
                nfev += n_params;

                if reduction <= config.ftol {
                    break (
                        true,
                        format!(
                            "Cost convergence: relative reduction {:.2e} <= {:.2e}",
                            reduction, config.ftol
                        ),
                    );
                }
            } else {
                bound = Some(0.5 * delta.min(step_scaled));
                lambda *= config.lambda_factor;
                if lambda > config.max_lambda {
                    break (
                        false,
                        "Failed to decrease the cost and lambda reached its maximum".to_string(),
                    );
                }
            }
        };

        debug!(iterations, nfev, cost, success, %message, "Levenberg-Marquardt finished");

        Ok(LmReport {
            x,
            residuals,
            cost,
            iterations,
            nfev,
            success,
            message,
            jacobian,
        })
    }
}

/// Unscaled covariance `(JᵀJ)⁻¹`, or `None` when `JᵀJ` is singular
pub fn covariance(jacobian: &Array2<f64>) -> Option<Array2<f64>> {
    let j = to_matrix(jacobian);
    let inverse = (j.transpose() * &j).try_inverse()?;
    if inverse.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(Array2::from_shape_fn(inverse.shape(), |(r, c)| inverse[(r, c)]))
}

fn solve_damped(jtj: &DMatrix<f64>, g: &DVector<f64>, lambda: f64) -> Option<DVector<f64>> {
    let mut damped = jtj.clone();
    for i in 0..damped.nrows() {
        damped[(i, i)] += lambda * jtj[(i, i)].max(1e-12);
    }

    let rhs = g.map(|v| -v);
    let step = match damped.clone().cholesky() {
        Some(cholesky) => cholesky.solve(&rhs),
        None => damped.lu().solve(&rhs)?,
    };

    step.iter().all(|v| v.is_finite()).then_some(step)
}

fn scaled_norm(scale: &Array1<f64>, v: &Array1<f64>) -> f64 {
    scale.iter().zip(v.iter()).map(|(d, v)| (d * v).powi(2)).sum::<f64>().sqrt()
}

fn to_matrix(array: &Array2<f64>) -> DMatrix<f64> {
    let (rows, cols) = array.dim();
    DMatrix::from_fn(rows, cols, |r, c| array[[r, c]])
}

fn sum_of_squares(residuals: &Array1<f64>) -> f64 {
    residuals.iter().map(|r| r * r).sum()
}
