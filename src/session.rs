//! Interactive fit sessions.
//!
//! A [`Fitter`] keeps the state of an iterative fit: the data, the session
//! bindings (independent variables and other named values), the bound model
//! and the parameters the next fit starts from. Every successful fit replaces
//! those parameters with the fitted ones, so repeated calls refine the
//! result.
//!
//! A front end can attach a [`ParamView`] to edit parameters live and a
//! [`Renderer`] to draw the data with the fitted curves.
//!
//! ```
//! use fitter_rs::model::{Bindings, Value};
//! use fitter_rs::models::LinearModel;
//! use fitter_rs::session::Fitter;
//! use ndarray::Array1;
//!
//! let x = Array1::linspace(0.0, 4.0, 5);
//! let data = x.mapv(|x| 2.0 * x + 1.0);
//!
//! let mut bindings = Bindings::new();
//! bindings.insert("x".to_string(), Value::from(x));
//!
//! let mut fitter = Fitter::with_model(data, LinearModel::new(), bindings).unwrap();
//! fitter.fit(Bindings::new()).unwrap();
//!
//! let slope = fitter.current_params().value_of("slope").unwrap();
//! assert!((slope - 2.0).abs() < 1e-6);
//! ```

use ndarray::Array1;
use tracing::{debug, info, warn};

use crate::error::{FitError, Result};
use crate::model::{independent_values, Bindings, FitArgs, FitResult, Model, ModelSource, Value};
use crate::parameters::ParameterSet;
use crate::registry::{ModelRegistry, DEFAULT_MODEL};
use crate::resolver::Resolver;

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No model bound yet
    Unbound,
    /// A model is bound but has not been fitted since
    Bound,
    /// The last fit of the bound model succeeded
    Fitted,
}

/// What a per-fit override does to a parameter defined by an expression
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExprOverridePolicy {
    /// The expression wins and the override is ignored with a warning
    #[default]
    KeepExpression,
    /// The override fixes the value for that fit, dropping the expression
    ReplaceExpression,
}

/// Session behaviour switches
#[derive(Debug, Clone, PartialEq)]
pub struct FitterConfig {
    /// Handling of overrides that name expression parameters
    pub expr_override: ExprOverridePolicy,

    /// Whether a successful fit is handed to the renderer. Default: true
    pub render_after_fit: bool,
}

impl Default for FitterConfig {
    fn default() -> Self {
        Self {
            expr_override: ExprOverridePolicy::default(),
            render_after_fit: true,
        }
    }
}

impl FitterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expr_override(mut self, policy: ExprOverridePolicy) -> Self {
        self.expr_override = policy;
        self
    }

    pub fn with_render_after_fit(mut self, render: bool) -> Self {
        self.render_after_fit = render;
        self
    }
}

/// A live, editable view of the session parameters.
///
/// The session pulls values from the view before every read of its
/// parameters and pushes them after every write.
pub trait ParamView {
    /// Recreate the view for a newly bound model's parameters
    fn rebuild(&mut self, params: &ParameterSet);

    /// Current values shown in the view
    fn pull(&self) -> Vec<(String, Option<f64>)>;

    /// Show new values
    fn push(&mut self, params: &ParameterSet);

    /// Whether the model can guess starting values
    fn set_guess_enabled(&mut self, enabled: bool);
}

/// Draws a [`PlotFrame`]
pub trait Renderer {
    fn render(&mut self, frame: &PlotFrame) -> Result<()>;
}

/// Everything needed to draw the data and the fitted curves
#[derive(Debug, Clone, PartialEq)]
pub struct PlotFrame {
    /// Name of the bound model
    pub model: String,

    /// Name of the independent variable, or `index` for models without one
    pub x_label: String,

    pub x: Array1<f64>,
    pub data: Array1<f64>,

    /// Model with the starting parameters of the last fit
    pub init_fit: Option<Array1<f64>>,

    /// Model with the fitted parameters of the last fit
    pub best_fit: Option<Array1<f64>>,
}

/// A stateful fit session.
pub struct Fitter {
    data: Array1<f64>,
    bindings: Bindings,
    model: Option<Box<dyn Model>>,
    current_params: ParameterSet,
    current_result: Option<FitResult>,
    guess_enabled: bool,
    resolver: Resolver,
    config: FitterConfig,
    view: Option<Box<dyn ParamView>>,
    renderer: Option<Box<dyn Renderer>>,
}

impl Fitter {
    /// Create a session without a model
    pub fn new(data: Array1<f64>, bindings: Bindings) -> Self {
        Self {
            data,
            bindings,
            model: None,
            current_params: ParameterSet::new(),
            current_result: None,
            guess_enabled: false,
            resolver: Resolver::new(),
            config: FitterConfig::default(),
            view: None,
            renderer: None,
        }
    }

    /// Create a session and bind `model` to it
    pub fn with_model(
        data: Array1<f64>,
        model: impl Into<ModelSource>,
        bindings: Bindings,
    ) -> Result<Self> {
        let mut fitter = Self::new(data, bindings);
        fitter.bind(model)?;
        Ok(fitter)
    }

    /// Create a session bound to the registry's default model
    pub fn with_default_model(data: Array1<f64>, bindings: Bindings) -> Result<Self> {
        let mut fitter = Self::new(data, bindings);
        fitter.bind_named(DEFAULT_MODEL)?;
        Ok(fitter)
    }

    /// Replace the session configuration
    pub fn with_config(mut self, config: FitterConfig) -> Self {
        self.config = config;
        self
    }

    /// Bind a model: fresh parameters, a fresh resolver and a new guess.
    ///
    /// When the guess fails the session keeps its previous model, parameters
    /// and result, and the error is returned.
    pub fn bind(&mut self, source: impl Into<ModelSource>) -> Result<()> {
        let model = source.into().instantiate();
        info!(model = model.name(), "binding model");

        let initial = model.make_params();
        let mut resolver = Resolver::new();
        let guess = run_guess(model.as_ref(), &self.data, &self.bindings, &initial, &mut resolver)?;

        let guess_enabled = guess.is_some();
        self.model = Some(model);
        self.current_params = guess.unwrap_or(initial);
        self.current_result = None;
        self.resolver = resolver;
        self.guess_enabled = guess_enabled;

        if let Some(view) = self.view.as_mut() {
            view.rebuild(&self.current_params);
            view.set_guess_enabled(guess_enabled);
        }
        Ok(())
    }

    /// Bind the model registered under `name` in the global registry
    pub fn bind_named(&mut self, name: &str) -> Result<()> {
        let constructor = ModelRegistry::global().constructor(name)?;
        self.bind(ModelSource::Constructor(constructor))
    }

    /// Guess starting values for the bound model from the data.
    ///
    /// Models with more than one independent variable, or without a guess
    /// strategy, disable guessing; that is not an error. Any other failure
    /// leaves the session unchanged.
    pub fn guess(&mut self) -> Result<()> {
        self.pull_view();
        let model = self.model.as_deref().ok_or(FitError::NoModel)?;

        let mut resolver = self.resolver.clone();
        let guess = run_guess(model, &self.data, &self.bindings, &self.current_params, &mut resolver)?;

        self.resolver = resolver;
        self.guess_enabled = guess.is_some();
        if let Some(params) = guess {
            self.current_params = params;
            self.push_view();
        }
        if let Some(view) = self.view.as_mut() {
            view.set_guess_enabled(self.guess_enabled);
        }
        Ok(())
    }

    /// Fit the bound model, starting from the current parameters.
    ///
    /// Session bindings and then `overrides` are layered over the current
    /// parameters. A scalar named like a parameter sets that parameter's
    /// starting value; everything else is passed to the model as a binding.
    /// The session bindings themselves are never changed.
    pub fn fit(&mut self, overrides: Bindings) -> Result<&FitResult> {
        self.pull_view();
        let model = self.model.as_deref().ok_or(FitError::NoModel)?;

        let mut params = self.current_params.clone();
        let mut call_bindings = Bindings::new();
        for (name, value) in self.bindings.iter().chain(overrides.iter()) {
            apply_argument(
                &mut params,
                &mut call_bindings,
                name,
                value,
                self.config.expr_override,
            )?;
        }

        let result = model.fit(&self.data, FitArgs::new(params, call_bindings))?;
        let n_vars = model.independent_vars().len();
        info!(
            model = model.name(),
            chisqr = result.chisqr,
            success = result.success,
            "session fit finished"
        );

        self.current_params = result.params.clone();
        self.push_view();

        if self.config.render_after_fit && self.renderer.is_some() {
            if n_vars > 1 {
                warn!(count = n_vars, "not rendering a model with several independent variables");
            } else if let Err(err) = self.frame(Some(&result)).and_then(|frame| self.render(&frame)) {
                warn!(%err, "rendering the fit failed");
            }
        }

        let result: &FitResult = self.current_result.insert(result);
        Ok(result)
    }

    /// Build the plot of the data and the last fit, rendering it if a
    /// renderer is attached
    pub fn plot(&mut self) -> Result<PlotFrame> {
        let frame = self.frame(self.current_result.as_ref())?;
        self.render(&frame)?;
        Ok(frame)
    }

    fn frame(&self, result: Option<&FitResult>) -> Result<PlotFrame> {
        let model = self.model.as_deref().ok_or(FitError::NoModel)?;

        let (x_label, x) = match model.independent_vars() {
            [] => (
                "index".to_string(),
                Array1::from_iter((0..self.data.len()).map(|i| i as f64)),
            ),
            [var] => (var.clone(), independent_values(&self.bindings, var)?),
            vars => return Err(FitError::UnsupportedDimensionality { count: vars.len() }),
        };

        Ok(PlotFrame {
            model: model.name().to_string(),
            x_label,
            x,
            data: self.data.clone(),
            init_fit: result.map(|r| r.init_fit.clone()),
            best_fit: result.map(|r| r.best_fit.clone()),
        })
    }

    fn render(&mut self, frame: &PlotFrame) -> Result<()> {
        match self.renderer.as_mut() {
            Some(renderer) => renderer.render(frame),
            None => Ok(()),
        }
    }

    /// Parameters the next fit starts from, with live edits from the view
    pub fn current_params(&mut self) -> &ParameterSet {
        self.pull_view();
        &self.current_params
    }

    /// Replace the parameters the next fit starts from
    pub fn set_current_params(&mut self, params: ParameterSet) {
        self.current_params = params;
        self.push_view();
    }

    pub fn current_result(&self) -> Option<&FitResult> {
        self.current_result.as_ref()
    }

    pub fn data(&self) -> &Array1<f64> {
        &self.data
    }

    pub fn set_data(&mut self, data: Array1<f64>) {
        self.data = data;
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Add or replace a session binding
    pub fn set_binding(&mut self, name: &str, value: impl Into<Value>) {
        self.bindings.insert(name.to_string(), value.into());
    }

    pub fn model(&self) -> Option<&dyn Model> {
        self.model.as_deref()
    }

    pub fn guess_enabled(&self) -> bool {
        self.guess_enabled
    }

    pub fn state(&self) -> SessionState {
        match (&self.model, &self.current_result) {
            (None, _) => SessionState::Unbound,
            (Some(_), None) => SessionState::Bound,
            (Some(_), Some(_)) => SessionState::Fitted,
        }
    }

    pub fn config(&self) -> &FitterConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: FitterConfig) {
        self.config = config;
    }

    /// Attach a view, showing the current parameters in it
    pub fn attach_view<V: ParamView + 'static>(&mut self, view: V) {
        let mut view: Box<dyn ParamView> = Box::new(view);
        view.rebuild(&self.current_params);
        view.set_guess_enabled(self.guess_enabled);
        self.view = Some(view);
    }

    /// Detach the view, keeping its last values
    pub fn detach_view(&mut self) -> Option<Box<dyn ParamView>> {
        self.pull_view();
        self.view.take()
    }

    pub fn set_renderer<R: Renderer + 'static>(&mut self, renderer: R) {
        self.renderer = Some(Box::new(renderer));
    }

    pub fn remove_renderer(&mut self) -> Option<Box<dyn Renderer>> {
        self.renderer.take()
    }

    fn pull_view(&mut self) {
        let Some(view) = self.view.as_ref() else {
            return;
        };

        for (name, value) in view.pull() {
            match (self.current_params.get_mut(&name), value) {
                (Some(param), Some(value)) => param.set_value_clamped(value),
                (Some(param), None) => param.clear_value(),
                (None, _) => debug!(parameter = %name, "view shows an unknown parameter"),
            }
        }
    }

    fn push_view(&mut self) {
        if let Some(view) = self.view.as_mut() {
            view.push(&self.current_params);
        }
    }
}

/// Guess and resolve starting values. `Ok(None)` means the model cannot
/// guess, which disables guessing for the session.
fn run_guess(
    model: &dyn Model,
    data: &Array1<f64>,
    bindings: &Bindings,
    known: &ParameterSet,
    resolver: &mut Resolver,
) -> Result<Option<ParameterSet>> {
    let guessed = match model.independent_vars() {
        [] => model.guess(data, None),
        [var] => {
            let value = bindings
                .get(var)
                .ok_or_else(|| FitError::MissingBinding(var.clone()))?;
            model.guess(data, Some((var.as_str(), value)))
        }
        vars => {
            debug!(
                model = model.name(),
                count = vars.len(),
                "guessing disabled for several independent variables"
            );
            return Ok(None);
        }
    };

    let mut guess = match guessed {
        Ok(guess) => guess,
        Err(FitError::UnsupportedGuess(reason)) => {
            debug!(model = model.name(), %reason, "guessing disabled");
            return Ok(None);
        }
        Err(err) => return Err(err),
    };

    resolver.resolve_unset(&mut guess, known)?;
    debug!(model = model.name(), "guess resolved");
    Ok(Some(guess))
}

fn apply_argument(
    params: &mut ParameterSet,
    call_bindings: &mut Bindings,
    name: &str,
    value: &Value,
    policy: ExprOverridePolicy,
) -> Result<()> {
    let Some(param) = params.get_mut(name) else {
        call_bindings.insert(name.to_string(), value.clone());
        return Ok(());
    };

    let Value::Scalar(v) = value else {
        return Err(FitError::InvalidInput(format!(
            "Parameter '{}' needs a scalar value",
            name
        )));
    };

    if param.is_derived() {
        match policy {
            ExprOverridePolicy::KeepExpression => {
                warn!(
                    parameter = name,
                    expr = param.expr().unwrap_or_default(),
                    "ignoring override of an expression parameter"
                );
            }
            ExprOverridePolicy::ReplaceExpression => {
                debug!(parameter = name, value = *v, "override replaces expression");
                param.set_expr(None);
                param.set_value_clamped(*v);
            }
        }
    } else {
        param.set_value_clamped(*v);
    }
    Ok(())
}
