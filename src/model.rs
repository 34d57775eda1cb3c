//! Model trait, argument values and fit results.
//!
//! A [`Model`] describes a parameterised function of zero or more named
//! independent variables. It creates its own parameter set, may guess starting
//! values from data, evaluates itself and fits itself. The default fit runs the
//! built-in Levenberg-Marquardt solver through [`crate::lm::fit_model`].

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use ndarray::Array1;

use crate::error::{FitError, Result};
use crate::parameters::ParameterSet;

/// A value bound to a name: either a scalar or an array of samples
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Array(Array1<f64>),
}

impl Value {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            Value::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array1<f64>> {
        match self {
            Value::Array(a) => Some(a),
            Value::Scalar(_) => None,
        }
    }

    /// The samples of this value; a scalar is a single sample
    pub fn to_array(&self) -> Array1<f64> {
        match self {
            Value::Scalar(v) => Array1::from_elem(1, *v),
            Value::Array(a) => a.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Value::Scalar(_) => 1,
            Value::Array(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(v)
    }
}

impl From<Array1<f64>> for Value {
    fn from(a: Array1<f64>) -> Self {
        Value::Array(a)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Array(Array1::from_vec(v))
    }
}

/// Insertion-ordered name to value map
pub type Bindings = IndexMap<String, Value>;

/// Look up an independent variable and return its samples
pub fn independent_values(bindings: &Bindings, name: &str) -> Result<Array1<f64>> {
    bindings
        .get(name)
        .map(Value::to_array)
        .ok_or_else(|| FitError::MissingBinding(name.to_string()))
}

/// Everything a model needs for one fit: the starting parameters and the
/// named values (independent variables and any extra keyword values)
#[derive(Debug, Clone, Default)]
pub struct FitArgs {
    pub params: ParameterSet,
    pub bindings: Bindings,
}

impl FitArgs {
    pub fn new(params: ParameterSet, bindings: Bindings) -> Self {
        Self { params, bindings }
    }
}

/// A trait representing a model that can be fit to data.
///
/// Only [`Model::name`], [`Model::independent_vars`], [`Model::make_params`]
/// and [`Model::eval`] are required. Models without a guess strategy keep the
/// default [`Model::guess`], which reports [`FitError::UnsupportedGuess`].
pub trait Model {
    /// Display name of the model
    fn name(&self) -> &str;

    /// Names of the independent variables, in declaration order
    fn independent_vars(&self) -> &[String];

    /// A fresh parameter set with the model's default values
    fn make_params(&self) -> ParameterSet;

    /// Guess starting values from data.
    ///
    /// `independent` carries the name and samples of the single independent
    /// variable, or `None` for a model without one. Parameters the guess
    /// cannot determine are left unset for the resolver.
    fn guess(
        &self,
        _data: &Array1<f64>,
        _independent: Option<(&str, &Value)>,
    ) -> Result<ParameterSet> {
        Err(FitError::UnsupportedGuess(format!(
            "{} does not implement guess",
            self.name()
        )))
    }

    /// Evaluate the model with resolved parameters
    fn eval(&self, params: &ParameterSet, bindings: &Bindings) -> Result<Array1<f64>>;

    /// Fit the model to `data`
    fn fit(&self, data: &Array1<f64>, args: FitArgs) -> Result<FitResult> {
        crate::lm::fit_model(self, data, args)
    }
}

impl fmt::Debug for dyn Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name())
            .field("independent_vars", &self.independent_vars())
            .finish()
    }
}

/// Zero-argument model constructor
pub type ModelConstructor = Arc<dyn Fn() -> Box<dyn Model> + Send + Sync>;

/// What a session can be bound to: a ready model or a way to build one
pub enum ModelSource {
    Instance(Box<dyn Model>),
    Constructor(ModelConstructor),
}

impl ModelSource {
    /// Wrap a constructor function
    pub fn constructor<F>(f: F) -> Self
    where
        F: Fn() -> Box<dyn Model> + Send + Sync + 'static,
    {
        ModelSource::Constructor(Arc::new(f))
    }

    /// Produce the model, calling the constructor if needed
    pub fn instantiate(self) -> Box<dyn Model> {
        match self {
            ModelSource::Instance(model) => model,
            ModelSource::Constructor(ctor) => ctor(),
        }
    }
}

impl fmt::Debug for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::Instance(model) => f.debug_tuple("Instance").field(model).finish(),
            ModelSource::Constructor(_) => f.write_str("Constructor(..)"),
        }
    }
}

impl From<Box<dyn Model>> for ModelSource {
    fn from(model: Box<dyn Model>) -> Self {
        ModelSource::Instance(model)
    }
}

impl<M: Model + 'static> From<M> for ModelSource {
    fn from(model: M) -> Self {
        ModelSource::Instance(Box::new(model))
    }
}

impl From<ModelConstructor> for ModelSource {
    fn from(ctor: ModelConstructor) -> Self {
        ModelSource::Constructor(ctor)
    }
}

type EvalFn = dyn Fn(&ParameterSet, &Bindings) -> Result<Array1<f64>> + Send + Sync;
type GuessFn = dyn Fn(&Array1<f64>, Option<(&str, &Value)>) -> Result<ParameterSet> + Send + Sync;

/// A model assembled from closures.
///
/// Useful for one-off functions that do not deserve their own type.
///
/// # Examples
///
/// ```
/// use fitter_rs::model::{Bindings, FunctionModel, Model, Value};
/// use fitter_rs::parameters::ParameterSet;
/// use ndarray::array;
///
/// let mut defaults = ParameterSet::new();
/// defaults.add_param("scale", 2.0);
///
/// let model = FunctionModel::new("scaled", &["x"], defaults, |params, bindings| {
///     let scale = params.value_of("scale")?;
///     let x = fitter_rs::model::independent_values(bindings, "x")?;
///     Ok(x * scale)
/// });
///
/// let mut bindings = Bindings::new();
/// bindings.insert("x".to_string(), Value::from(array![1.0, 2.0]));
/// let y = model.eval(&model.make_params(), &bindings).unwrap();
/// assert_eq!(y, array![2.0, 4.0]);
/// ```
pub struct FunctionModel {
    name: String,
    independent_vars: Vec<String>,
    defaults: ParameterSet,
    eval_func: Box<EvalFn>,
    guess_func: Option<Box<GuessFn>>,
}

impl FunctionModel {
    pub fn new<F>(name: &str, independent_vars: &[&str], defaults: ParameterSet, eval_func: F) -> Self
    where
        F: Fn(&ParameterSet, &Bindings) -> Result<Array1<f64>> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            independent_vars: independent_vars.iter().map(|s| s.to_string()).collect(),
            defaults,
            eval_func: Box::new(eval_func),
            guess_func: None,
        }
    }

    /// Set the guess function for the model
    pub fn with_guess<F>(mut self, guess_func: F) -> Self
    where
        F: Fn(&Array1<f64>, Option<(&str, &Value)>) -> Result<ParameterSet> + Send + Sync + 'static,
    {
        self.guess_func = Some(Box::new(guess_func));
        self
    }
}

impl Model for FunctionModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn independent_vars(&self) -> &[String] {
        &self.independent_vars
    }

    fn make_params(&self) -> ParameterSet {
        self.defaults.clone()
    }

    fn guess(&self, data: &Array1<f64>, independent: Option<(&str, &Value)>) -> Result<ParameterSet> {
        match &self.guess_func {
            Some(func) => func(data, independent),
            None => Err(FitError::UnsupportedGuess(format!(
                "{} has no guess function",
                self.name
            ))),
        }
    }

    fn eval(&self, params: &ParameterSet, bindings: &Bindings) -> Result<Array1<f64>> {
        (self.eval_func)(params, bindings)
    }
}

/// Outcome of a fit
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    /// Fitted parameters, derived values resolved and standard errors set
    pub params: ParameterSet,

    /// Parameters the fit started from
    pub init_params: ParameterSet,

    /// Model evaluated with the fitted parameters
    pub best_fit: Array1<f64>,

    /// Model evaluated with the starting parameters
    pub init_fit: Array1<f64>,

    /// `best_fit - data`
    pub residuals: Array1<f64>,

    /// Sum of squared residuals
    pub chisqr: f64,

    /// `chisqr / (ndata - nvarys)`, NaN when there are no degrees of freedom
    pub redchi: f64,

    /// Number of function evaluations
    pub nfev: usize,

    /// Number of varied parameters
    pub nvarys: usize,

    /// Number of data points
    pub ndata: usize,

    /// Whether the solver reported convergence
    pub success: bool,

    /// Solver message
    pub message: String,
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[[Fit Statistics]]")?;
        writeln!(f, "    # function evals   = {}", self.nfev)?;
        writeln!(f, "    # data points      = {}", self.ndata)?;
        writeln!(f, "    # variables        = {}", self.nvarys)?;
        writeln!(f, "    chi-square         = {:.6e}", self.chisqr)?;
        writeln!(f, "    reduced chi-square = {:.6e}", self.redchi)?;
        writeln!(f, "    success            = {} ({})", self.success, self.message)?;
        writeln!(f, "[[Variables]]")?;
        for (name, param) in &self.params {
            let value = param
                .value()
                .map_or_else(|| "unset".to_string(), |v| format!("{:.6e}", v));
            write!(f, "    {:<12} {}", format!("{}:", name), value)?;
            if let Some(stderr) = param.stderr() {
                write!(f, " +/- {:.6e}", stderr)?;
            }
            if let Some(expr) = param.expr() {
                write!(f, " == '{}'", expr)?;
            } else if !param.vary() {
                write!(f, " (fixed)")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
