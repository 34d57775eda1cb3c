//! Tests for the stateful fit session

use fitter_rs::error::FitError;
use fitter_rs::model::{independent_values, Bindings, FunctionModel, Model, ModelSource, Value};
use fitter_rs::models::{ConstantModel, ExponentialModel, LinearModel};
use fitter_rs::parameters::{ParameterError, ParameterSet};
use fitter_rs::session::{ExprOverridePolicy, Fitter, FitterConfig, SessionState};
use ndarray::{array, Array1};

use crate::test_helpers::{approx_eq, x_bindings, RecordingRenderer, RecordingView};

/// z = a * x + b * y
fn plane_model() -> FunctionModel {
    let mut defaults = ParameterSet::new();
    defaults.add_param("a", 1.0);
    defaults.add_param("b", 1.0);

    FunctionModel::new("plane", &["x", "y"], defaults, |params, bindings| {
        let x = independent_values(bindings, "x")?;
        let y = independent_values(bindings, "y")?;
        Ok(x * params.value_of("a")? + y * params.value_of("b")?)
    })
}

/// slope * x + foo, where `foo` is a plain binding, not a parameter
fn shifted_line() -> FunctionModel {
    let mut defaults = ParameterSet::new();
    defaults.add_param("slope", 1.0);

    FunctionModel::new("shifted", &["x"], defaults, |params, bindings| {
        let x = independent_values(bindings, "x")?;
        let foo = bindings
            .get("foo")
            .and_then(Value::as_scalar)
            .ok_or_else(|| FitError::MissingBinding("foo".to_string()))?;
        Ok(x * params.value_of("slope")? + foo)
    })
}

fn line_data() -> (Array1<f64>, Array1<f64>) {
    let x = Array1::linspace(0.0, 9.0, 10);
    let data = x.mapv(|x| 1.5 * x - 4.0);
    (x, data)
}

#[test]
fn test_guess_without_independent_variables() {
    let data = array![2.0, 4.0, 6.0];
    let mut fitter = Fitter::with_model(data, ConstantModel::new(), Bindings::new()).unwrap();

    assert!(fitter.guess_enabled());
    assert_eq!(fitter.current_params().value_of("c").unwrap(), 4.0);

    fitter.guess().unwrap();
    assert_eq!(fitter.current_params().value_of("c").unwrap(), 4.0);
}

#[test]
fn test_two_independent_variables_disable_guess() {
    let x = array![0.0, 1.0, 2.0, 3.0];
    let y = array![1.0, 0.0, 2.0, 5.0];
    let data = &x * 2.0 - &y * 0.5;

    let mut bindings = Bindings::new();
    bindings.insert("x".to_string(), Value::from(x));
    bindings.insert("y".to_string(), Value::from(y));

    let model = plane_model();
    let defaults = model.make_params();

    let (renderer, frames) = RecordingRenderer::new();
    let mut fitter = Fitter::new(data, bindings);
    fitter.set_renderer(renderer);
    fitter.bind(model).unwrap();

    assert!(!fitter.guess_enabled());
    assert_eq!(fitter.current_params(), &defaults);

    // Still not an error
    fitter.guess().unwrap();
    assert!(!fitter.guess_enabled());

    let result = fitter.fit(Bindings::new()).unwrap();
    assert!(approx_eq(result.params.value_of("a").unwrap(), 2.0, 1e-6));
    assert!(approx_eq(result.params.value_of("b").unwrap(), -0.5, 1e-6));

    // Rendering is skipped after the fit, but asking for it is an error
    assert!(frames.borrow().is_empty());
    assert!(matches!(
        fitter.plot(),
        Err(FitError::UnsupportedDimensionality { count: 2 })
    ));
}

#[test]
fn test_current_params_follow_the_result() {
    let (x, data) = line_data();
    let mut fitter = Fitter::with_model(data, LinearModel::new(), x_bindings(&x)).unwrap();
    assert_eq!(fitter.state(), SessionState::Bound);

    fitter.fit(Bindings::new()).unwrap();
    assert_eq!(fitter.state(), SessionState::Fitted);

    let fitted = fitter.current_result().unwrap().params.clone();
    assert_eq!(fitter.current_params(), &fitted);
    assert!(approx_eq(fitted.value_of("slope").unwrap(), 1.5, 1e-6));
    assert!(approx_eq(fitted.value_of("intercept").unwrap(), -4.0, 1e-6));
}

#[test]
fn test_call_override_beats_session_binding() {
    let x = Array1::linspace(0.0, 4.0, 5);
    let data = x.mapv(|x| 2.0 * x + 5.0);

    let mut bindings = x_bindings(&x);
    bindings.insert("foo".to_string(), Value::Scalar(1.0));
    let mut fitter = Fitter::with_model(data, shifted_line(), bindings).unwrap();

    let mut overrides = Bindings::new();
    overrides.insert("foo".to_string(), Value::Scalar(5.0));
    let result = fitter.fit(overrides).unwrap();

    assert!(result.chisqr < 1e-10);
    assert!(approx_eq(result.params.value_of("slope").unwrap(), 2.0, 1e-6));
    assert_eq!(fitter.bindings().get("foo"), Some(&Value::Scalar(1.0)));

    // Without the override the session binding applies again
    let result = fitter.fit(Bindings::new()).unwrap();
    assert!(result.chisqr > 1.0);
}

#[test]
fn test_override_sets_starting_value() {
    let (x, data) = line_data();
    let mut fitter = Fitter::with_model(data, LinearModel::new(), x_bindings(&x)).unwrap();

    let mut overrides = Bindings::new();
    overrides.insert("slope".to_string(), Value::Scalar(40.0));
    let result = fitter.fit(overrides).unwrap();

    assert_eq!(result.init_params.value_of("slope").unwrap(), 40.0);
    assert!(approx_eq(result.params.value_of("slope").unwrap(), 1.5, 1e-6));
}

#[test]
fn test_expression_override_policies() {
    let (x, data) = line_data();
    let mut tied = LinearModel::new().make_params();
    tied.add_param_with_expr("intercept", "-slope * 8 / 3");

    let mut overrides = Bindings::new();
    overrides.insert("intercept".to_string(), Value::Scalar(-4.0));

    // The expression wins
    let mut fitter = Fitter::with_model(data.clone(), LinearModel::new(), x_bindings(&x)).unwrap();
    fitter.set_current_params(tied.clone());
    let result = fitter.fit(overrides.clone()).unwrap();
    let slope = result.params.value_of("slope").unwrap();
    assert!(approx_eq(result.params.value_of("intercept").unwrap(), -slope * 8.0 / 3.0, 1e-9));
    assert_eq!(result.nvarys, 1);

    // The override replaces the expression for the fit
    let config = FitterConfig::new().with_expr_override(ExprOverridePolicy::ReplaceExpression);
    let mut fitter = Fitter::with_model(data, LinearModel::new(), x_bindings(&x))
        .unwrap()
        .with_config(config);
    fitter.set_current_params(tied);
    let result = fitter.fit(overrides).unwrap();
    let intercept = result.params.get("intercept").unwrap();
    assert_eq!(intercept.value(), Some(-4.0));
    assert!(intercept.expr().is_none());
    assert!(approx_eq(result.params.value_of("slope").unwrap(), 1.5, 1e-6));
}

#[test]
fn test_malformed_expression_leaves_session_unchanged() {
    let (x, data) = line_data();
    let mut fitter = Fitter::with_model(data, LinearModel::new(), x_bindings(&x)).unwrap();
    let before = fitter.current_params().clone();

    let mut broken = ParameterSet::new();
    broken.add_param("slope", 1.0);
    broken.add_param_with_expr("intercept", "2 * (slope");
    let model = FunctionModel::new("broken", &["x"], broken, |_, bindings| {
        independent_values(bindings, "x")
    })
    .with_guess(|_, _| {
        let mut guess = ParameterSet::new();
        guess.add_param("slope", 1.0);
        guess.add_param_with_expr("intercept", "2 * (slope");
        Ok(guess)
    });

    let err = fitter.bind(model).unwrap_err();
    assert!(err.is_parse_error());
    assert_eq!(fitter.model().unwrap().name(), "LinearModel");
    assert_eq!(fitter.current_params(), &before);

    // The same through a fit
    let mut params = before.clone();
    params.add_param_with_expr("tilt", "slope * (");
    fitter.set_current_params(params.clone());
    let err = fitter.fit(Bindings::new()).unwrap_err();
    assert!(err.is_parse_error());
    assert_eq!(fitter.current_params(), &params);
    assert!(fitter.current_result().is_none());
}

#[test]
fn test_cycle_fails_the_fit() {
    let (x, data) = line_data();
    let mut fitter = Fitter::with_model(data, LinearModel::new(), x_bindings(&x)).unwrap();

    let mut params = ParameterSet::new();
    params.add_param_with_expr("slope", "intercept + 1");
    params.add_param_with_expr("intercept", "slope - 1");
    fitter.set_current_params(params);

    assert!(matches!(
        fitter.fit(Bindings::new()),
        Err(FitError::Parameter(ParameterError::CircularDependency { .. }))
    ));
    assert_eq!(fitter.state(), SessionState::Bound);
}

#[test]
fn test_failed_bind_keeps_previous_model() {
    let data = array![1.0, 2.0, 3.0];
    let mut fitter = Fitter::with_model(data, ConstantModel::new(), Bindings::new()).unwrap();
    fitter.fit(Bindings::new()).unwrap();

    // No binding for `x`
    match fitter.bind(LinearModel::new()) {
        Err(FitError::MissingBinding(name)) => assert_eq!(name, "x"),
        other => panic!("Expected MissingBinding error, got {:?}", other),
    }
    assert_eq!(fitter.model().unwrap().name(), "ConstantModel");
    assert_eq!(fitter.state(), SessionState::Fitted);
}

#[test]
fn test_bind_from_constructor_and_registry() {
    let x = Array1::<f64>::linspace(0.0, 3.0, 20);
    let data = x.mapv(|x: f64| 5.0 * (-x / 0.8).exp());

    let mut fitter = Fitter::with_default_model(data, x_bindings(&x)).unwrap();
    assert_eq!(fitter.model().unwrap().name(), "ExponentialModel");
    assert!(approx_eq(fitter.current_params().value_of("decay").unwrap(), 0.8, 1e-6));

    fitter
        .bind(ModelSource::constructor(|| Box::new(ExponentialModel::with_prefix("e_"))))
        .unwrap();
    assert!(fitter.current_params().contains("e_decay"));

    fitter.bind_named("LinearModel").unwrap();
    assert_eq!(fitter.model().unwrap().name(), "LinearModel");

    assert!(matches!(
        fitter.bind_named("NoSuchModel"),
        Err(FitError::UnknownModel(_))
    ));
    assert_eq!(fitter.model().unwrap().name(), "LinearModel");
}

#[test]
fn test_view_pull_and_push() {
    let (x, data) = line_data();
    let (view, state) = RecordingView::new();

    let mut fitter = Fitter::new(data, x_bindings(&x));
    fitter.attach_view(view);
    assert_eq!(state.borrow().rebuilds, 1);
    assert!(state.borrow().shown.is_empty());

    fitter.bind(LinearModel::new()).unwrap();
    assert_eq!(state.borrow().rebuilds, 2);
    assert_eq!(state.borrow().guess_enabled, Some(true));
    assert!(approx_eq(state.borrow().shown_value("slope").unwrap(), 1.5, 1e-9));

    // Unsubmitted edits win on read
    state.borrow_mut().edit("slope", Some(3.0));
    assert_eq!(fitter.current_params().value_of("slope").unwrap(), 3.0);

    state.borrow_mut().edit("intercept", None);
    assert_eq!(fitter.current_params().get("intercept").unwrap().value(), None);
    state.borrow_mut().edit("intercept", Some(0.0));

    // Writes and fits are pushed
    let pushes = state.borrow().pushes;
    let result = fitter.fit(Bindings::new()).unwrap();
    let slope = result.params.value_of("slope").unwrap();
    assert!(state.borrow().pushes > pushes);
    assert_eq!(state.borrow().shown_value("slope"), Some(slope));

    let mut params = ParameterSet::new();
    params.add_param("slope", -1.0);
    params.add_param("intercept", 2.0);
    fitter.set_current_params(params);
    assert_eq!(state.borrow().shown_value("slope"), Some(-1.0));

    let detached = fitter.detach_view();
    assert!(detached.is_some());
    state.borrow_mut().edit("slope", Some(99.0));
    assert_eq!(fitter.current_params().value_of("slope").unwrap(), -1.0);
}

#[test]
fn test_fit_returns_the_stored_result() {
    let (x, data) = line_data();
    let (renderer, frames) = RecordingRenderer::new();
    let mut fitter = Fitter::with_model(data, LinearModel::new(), x_bindings(&x)).unwrap();
    fitter.set_renderer(renderer);

    let returned = fitter.fit(Bindings::new()).unwrap().clone();
    let stored = fitter.current_result().unwrap();
    assert_eq!(stored.params, returned.params);
    assert_eq!(stored.best_fit, returned.best_fit);
    assert_eq!(stored.chisqr, returned.chisqr);

    // The frame drawn after the fit shows the same result
    assert_eq!(frames.borrow().len(), 1);
    assert_eq!(frames.borrow()[0].best_fit.as_ref(), Some(&returned.best_fit));
}

#[test]
fn test_renderer_receives_fit() {
    let (x, data) = line_data();
    let (renderer, frames) = RecordingRenderer::new();

    let mut fitter = Fitter::with_model(data.clone(), LinearModel::new(), x_bindings(&x)).unwrap();
    fitter.set_renderer(renderer);

    let frame = fitter.plot().unwrap();
    assert_eq!(frame.x_label, "x");
    assert!(frame.best_fit.is_none());

    fitter.fit(Bindings::new()).unwrap();
    let frames = frames.borrow();
    assert_eq!(frames.len(), 2);
    let last = &frames[1];
    assert_eq!(last.model, "LinearModel");
    assert_eq!(last.data, data);
    assert_eq!(last.x, x);
    assert!(last.init_fit.is_some());
    assert!(last
        .best_fit
        .as_ref()
        .map(|fit| fit.iter().zip(data.iter()).all(|(f, d)| approx_eq(*f, *d, 1e-6)))
        .unwrap_or(false));
}

#[test]
fn test_rendering_can_be_turned_off() {
    let data = array![1.0, 1.5, 2.0];
    let (renderer, frames) = RecordingRenderer::new();

    let config = FitterConfig::new().with_render_after_fit(false);
    let mut fitter = Fitter::with_model(data, ConstantModel::new(), Bindings::new())
        .unwrap()
        .with_config(config);
    fitter.set_renderer(renderer);

    fitter.fit(Bindings::new()).unwrap();
    assert!(frames.borrow().is_empty());

    // Models without an independent variable are drawn against the index
    let frame = fitter.plot().unwrap();
    assert_eq!(frame.x_label, "index");
    assert_eq!(frame.x, array![0.0, 1.0, 2.0]);
    assert_eq!(frames.borrow().len(), 1);
}

#[test]
fn test_refit_starts_from_previous_result() {
    let x = Array1::<f64>::linspace(0.0, 4.0, 25);
    let data = x.mapv(|x: f64| 2.5 * (-x / 1.3).exp());

    let mut fitter = Fitter::with_model(data, ExponentialModel::new(), x_bindings(&x)).unwrap();
    let first = fitter.fit(Bindings::new()).unwrap().clone();
    let second = fitter.fit(Bindings::new()).unwrap();

    assert_eq!(second.init_params, first.params);
    assert!(second.chisqr <= first.chisqr + 1e-12);
}

#[test]
fn test_set_binding_changes_the_session() {
    let data = array![1.0, 2.0, 3.0];
    let mut fitter = Fitter::new(data, Bindings::new());
    assert!(matches!(fitter.fit(Bindings::new()), Err(FitError::NoModel)));

    fitter.set_binding("x", vec![0.0, 1.0, 2.0]);
    fitter.bind(LinearModel::new()).unwrap();
    assert!(approx_eq(fitter.current_params().value_of("slope").unwrap(), 1.0, 1e-12));

    fitter.set_data(array![3.0, 2.0, 1.0]);
    fitter.guess().unwrap();
    assert!(approx_eq(fitter.current_params().value_of("slope").unwrap(), -1.0, 1e-12));
}
