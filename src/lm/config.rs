//! Configuration options for the Levenberg-Marquardt algorithm.

/// Configuration options for the Levenberg-Marquardt algorithm.
#[derive(Debug, Clone, PartialEq)]
pub struct LmConfig {
    /// Maximum number of iterations. Default: 200
    pub max_iterations: usize,

    /// Relative tolerance for the decrease of the cost. Default: 1e-10
    pub ftol: f64,

    /// Relative tolerance for the step size. Default: 1e-10
    pub xtol: f64,

    /// Tolerance for the largest gradient component. Default: 1e-10
    pub gtol: f64,

    /// Initial value for the damping parameter. Default: 1e-3
    pub initial_lambda: f64,

    /// Factor by which lambda grows after a rejected step and shrinks after
    /// an accepted one. Default: 10.0
    pub lambda_factor: f64,

    /// Minimum value for lambda. Default: 1e-12
    pub min_lambda: f64,

    /// Maximum value for lambda. Default: 1e12
    pub max_lambda: f64,

    /// Relative step for the forward-difference Jacobian. Default: 1e-8
    pub epsilon: f64,

    /// Initial bound on the scaled step, as a multiple of `‖D·x0‖` where `D`
    /// holds the Jacobian column norms. Used as the bound itself when
    /// `x0` is zero. Default: 1.0
    pub step_bound: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-10,
            initial_lambda: 1e-3,
            lambda_factor: 10.0,
            min_lambda: 1e-12,
            max_lambda: 1e12,
            epsilon: 1e-8,
            step_bound: 1.0,
        }
    }
}

impl LmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.ftol = ftol;
        self
    }

    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.xtol = xtol;
        self
    }

    pub fn with_gtol(mut self, gtol: f64) -> Self {
        self.gtol = gtol;
        self
    }

    /// Set the initial value for the damping parameter.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.initial_lambda = lambda;
        self
    }

    pub fn with_lambda_factor(mut self, factor: f64) -> Self {
        self.lambda_factor = factor;
        self
    }

    pub fn with_lambda_range(mut self, min_lambda: f64, max_lambda: f64) -> Self {
        self.min_lambda = min_lambda;
        self.max_lambda = max_lambda;
        self
    }

    /// Set the relative finite-difference step.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set the factor for the initial step bound.
    pub fn with_step_bound(mut self, factor: f64) -> Self {
        self.step_bound = factor;
        self
    }
}
