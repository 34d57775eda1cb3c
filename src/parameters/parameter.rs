//! Parameter definition and implementation
//!
//! A [`Parameter`] is either free (its value is set directly by a guess, a fit
//! or an override) or derived (its value is computed from an expression over
//! other parameters). The value is optional: `None` means it has not been
//! determined yet and must be resolved before the parameter is used.

use crate::parameters::bounds::{Bounds, BoundsError};
use crate::parameters::expression::{Expression, ExpressionError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when working with parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Parameter '{name}' cannot have both an expression and be varied")]
    ExpressionAndVary { name: String },

    #[error("Bounds error: {0}")]
    BoundsError(#[from] BoundsError),

    #[error("Cannot parse expression '{expr}' for parameter '{name}': {source}")]
    ExpressionParse {
        name: String,
        expr: String,
        source: ExpressionError,
    },

    #[error("Cannot evaluate expression '{expr}' for parameter '{name}': {source}")]
    ExpressionEvaluation {
        name: String,
        expr: String,
        source: ExpressionError,
    },

    #[error("Parameter '{name}' not found")]
    ParameterNotFound { name: String },

    #[error("Parameter '{name}' has no value")]
    UnsetValue { name: String },

    #[error("Circular dependency in parameter expressions: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },
}

/// A named model parameter, similar to lmfit-py's Parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    /// Name of the parameter; empty until it is placed in a set
    #[serde(default)]
    name: String,

    /// Current value, `None` while undetermined
    value: Option<f64>,

    /// Whether the solver varies this parameter
    vary: bool,

    bounds: Bounds,

    /// Source of the expression this parameter is derived from
    expr: Option<String>,

    /// Standard error of the parameter (set after fitting)
    #[serde(default)]
    stderr: Option<f64>,

    /// Parsed `expr`, cached on first use
    #[serde(skip)]
    ast: Option<Expression>,

    /// Names of the known parameters `expr` refers to, first-seen order
    #[serde(skip)]
    deps: Vec<String>,
}

impl Parameter {
    /// Create a free parameter with a value and no bounds
    ///
    /// # Examples
    ///
    /// ```
    /// use fitter_rs::parameters::Parameter;
    ///
    /// let param = Parameter::new("amplitude", 10.0);
    /// assert_eq!(param.name(), "amplitude");
    /// assert_eq!(param.value(), Some(10.0));
    /// assert!(param.vary());
    /// ```
    pub fn new(name: &str, value: f64) -> Self {
        Self {
            value: Some(value),
            ..Self::unset(name)
        }
    }

    /// Create a free parameter whose value is not determined yet
    pub fn unset(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: None,
            vary: true,
            bounds: Bounds::default(),
            expr: None,
            stderr: None,
            ast: None,
            deps: Vec::new(),
        }
    }

    /// Create a free parameter with bounds; the value is clamped into them
    ///
    /// # Examples
    ///
    /// ```
    /// use fitter_rs::parameters::Parameter;
    ///
    /// let param = Parameter::with_bounds("sigma", -1.0, 0.0, f64::INFINITY).unwrap();
    /// assert_eq!(param.value(), Some(0.0));
    /// assert_eq!(param.min(), 0.0);
    /// ```
    pub fn with_bounds(name: &str, value: f64, min: f64, max: f64) -> Result<Self, ParameterError> {
        let bounds = Bounds::new(min, max)?;

        Ok(Self {
            value: Some(bounds.clamp(value)),
            bounds,
            ..Self::unset(name)
        })
    }

    /// Create a free parameter with already validated bounds; the value is
    /// clamped into them
    pub fn bounded(name: &str, value: f64, bounds: Bounds) -> Self {
        Self {
            value: Some(bounds.clamp(value)),
            bounds,
            ..Self::unset(name)
        }
    }

    /// Create a derived parameter. Its value stays undetermined until the
    /// expression is resolved.
    ///
    /// # Examples
    ///
    /// ```
    /// use fitter_rs::parameters::Parameter;
    ///
    /// let param = Parameter::with_expr("half_amplitude", "amplitude / 2");
    /// assert_eq!(param.expr(), Some("amplitude / 2"));
    /// assert_eq!(param.value(), None);
    /// assert!(!param.vary());
    /// ```
    pub fn with_expr(name: &str, expr: &str) -> Self {
        Self {
            vary: false,
            expr: Some(expr.to_string()),
            ..Self::unset(name)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Set the value, rejecting values outside the bounds
    pub fn set_value(&mut self, value: f64) -> Result<(), ParameterError> {
        if !self.bounds.contains(value) {
            return Err(ParameterError::BoundsError(BoundsError::ValueOutsideBounds {
                value,
                min: self.bounds.min,
                max: self.bounds.max,
            }));
        }

        self.value = Some(value);
        Ok(())
    }

    /// Set the value, clamping it into the bounds
    pub fn set_value_clamped(&mut self, value: f64) {
        self.value = Some(self.bounds.clamp(value));
    }

    /// Forget the value; it has to be resolved again before use
    pub fn clear_value(&mut self) {
        self.value = None;
    }

    pub fn vary(&self) -> bool {
        self.vary
    }

    /// Set whether the solver varies this parameter.
    ///
    /// A derived parameter can never vary.
    pub fn set_vary(&mut self, vary: bool) -> Result<(), ParameterError> {
        if vary && self.expr.is_some() {
            return Err(ParameterError::ExpressionAndVary {
                name: self.name.clone(),
            });
        }

        self.vary = vary;
        Ok(())
    }

    pub fn min(&self) -> f64 {
        self.bounds.min
    }

    pub fn max(&self) -> f64 {
        self.bounds.max
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Set the bounds, clamping the current value into them
    pub fn set_bounds(&mut self, min: f64, max: f64) -> Result<(), ParameterError> {
        let bounds = Bounds::new(min, max)?;
        self.bounds = bounds;
        self.value = self.value.map(|v| bounds.clamp(v));
        Ok(())
    }

    pub fn expr(&self) -> Option<&str> {
        self.expr.as_deref()
    }

    /// Whether the value comes from an expression
    pub fn is_derived(&self) -> bool {
        self.expr.is_some()
    }

    /// Replace the expression. Setting one stops the parameter from varying;
    /// removing one leaves `vary` to the caller.
    pub fn set_expr(&mut self, expr: Option<&str>) {
        self.expr = expr.map(str::to_string);
        self.ast = None;
        self.deps.clear();
        if self.expr.is_some() {
            self.vary = false;
        }
    }

    /// Parsed expression, parsing and caching it on first use.
    ///
    /// Returns `Ok(None)` for a free parameter.
    pub fn ast(&mut self) -> Result<Option<&Expression>, ParameterError> {
        let Some(source) = self.expr.as_deref() else {
            return Ok(None);
        };

        if self.ast.is_none() {
            let parsed = Expression::parse(source).map_err(|source_err| {
                ParameterError::ExpressionParse {
                    name: self.name.clone(),
                    expr: source.to_string(),
                    source: source_err,
                }
            })?;
            self.ast = Some(parsed);
        }

        Ok(self.ast.as_ref())
    }

    /// The cached expression tree, if it has been parsed
    pub fn cached_ast(&self) -> Option<&Expression> {
        self.ast.as_ref()
    }

    /// Dependencies recorded by the last resolution pass
    pub fn deps(&self) -> &[String] {
        &self.deps
    }

    pub(crate) fn set_deps(&mut self, deps: Vec<String>) {
        self.deps = deps;
    }

    pub fn stderr(&self) -> Option<f64> {
        self.stderr
    }

    pub fn set_stderr(&mut self, stderr: Option<f64>) {
        self.stderr = stderr;
    }
}

impl PartialEq for Parameter {
    // The parse cache and dependency list are derived data
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.value == other.value
            && self.vary == other.vary
            && self.bounds == other.bounds
            && self.expr == other.expr
            && self.stderr == other.stderr
    }
}
