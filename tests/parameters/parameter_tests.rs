//! Integration tests for the Parameter struct

use fitter_rs::parameters::{Bounds, BoundsError, Parameter, ParameterError};

#[test]
fn test_parameter_lifecycle() {
    let mut param = Parameter::new("amplitude", 10.0);

    assert_eq!(param.name(), "amplitude");
    assert_eq!(param.value(), Some(10.0));
    assert!(param.vary());
    assert_eq!(param.min(), f64::NEG_INFINITY);
    assert_eq!(param.max(), f64::INFINITY);
    assert!(param.expr().is_none());
    assert!(param.stderr().is_none());

    param.set_bounds(0.0, 20.0).unwrap();
    assert_eq!(param.min(), 0.0);
    assert_eq!(param.max(), 20.0);

    // Outside the bounds
    assert!(matches!(
        param.set_value(-5.0),
        Err(ParameterError::BoundsError(BoundsError::ValueOutsideBounds { .. }))
    ));
    assert!(param.set_value(25.0).is_err());
    assert_eq!(param.value(), Some(10.0));

    param.set_value_clamped(25.0);
    assert_eq!(param.value(), Some(20.0));

    param.set_vary(false).unwrap();
    assert!(!param.vary());

    // An expression freezes the parameter
    param.set_vary(true).unwrap();
    param.set_expr(Some("other_param * 2"));
    assert_eq!(param.expr(), Some("other_param * 2"));
    assert!(param.is_derived());
    assert!(!param.vary());
    assert!(matches!(
        param.set_vary(true),
        Err(ParameterError::ExpressionAndVary { .. })
    ));

    param.set_expr(None);
    assert!(!param.is_derived());
    param.set_vary(true).unwrap();
    assert!(param.vary());

    param.clear_value();
    assert_eq!(param.value(), None);
}

#[test]
fn test_unset_parameter() {
    let param = Parameter::unset("later");
    assert_eq!(param.value(), None);
    assert!(param.vary());
    assert!(!param.is_derived());
}

#[test]
fn test_bounded_constructors() {
    let param = Parameter::with_bounds("sigma", 5.0, 0.0, 2.0).unwrap();
    assert_eq!(param.value(), Some(2.0));

    assert!(Parameter::with_bounds("bad", 1.0, 3.0, 1.0).is_err());

    let param = Parameter::bounded("width", -1.0, Bounds::min_only(0.0));
    assert_eq!(param.value(), Some(0.0));
    assert_eq!(param.max(), f64::INFINITY);
}

#[test]
fn test_expression_cache() {
    let mut param = Parameter::with_expr("fwhm", "2.3548200 * sigma");
    assert!(param.cached_ast().is_none());

    let ast = param.ast().unwrap().cloned().unwrap();
    assert_eq!(ast.variables(), vec!["sigma".to_string()]);
    assert!(param.cached_ast().is_some());

    // Changing the expression drops the cache
    param.set_expr(Some("3 * sigma"));
    assert!(param.cached_ast().is_none());

    let mut free = Parameter::new("sigma", 1.0);
    assert!(free.ast().unwrap().is_none());
}

#[test]
fn test_malformed_expression_names_parameter() {
    let mut param = Parameter::with_expr("broken", "2 * (sigma");
    match param.ast() {
        Err(ParameterError::ExpressionParse { name, expr, .. }) => {
            assert_eq!(name, "broken");
            assert_eq!(expr, "2 * (sigma");
        }
        other => panic!("Expected ExpressionParse error, got {:?}", other),
    }
}

#[test]
fn test_bounds_transformations() {
    let bounds = Bounds::new(0.0, 10.0).unwrap();

    for value in [0.5, 2.0, 5.0, 9.9] {
        let internal = bounds.to_internal(value).unwrap();
        let external = bounds.to_external(internal);
        assert!((external - value).abs() < 1e-9, "{} -> {}", value, external);
    }

    // Any internal value maps inside the bounds
    for internal in [-1e6, -3.0, 0.0, 3.0, 1e6] {
        assert!(bounds.contains(bounds.to_external(internal)));
    }

    let lower = Bounds::min_only(1.0);
    let internal = lower.to_internal(5.0).unwrap();
    assert!((lower.to_external(internal) - 5.0).abs() < 1e-9);

    let unbounded = Bounds::unbounded();
    assert_eq!(unbounded.to_internal(-7.0).unwrap(), -7.0);
    assert_eq!(unbounded.external_gradient(3.0), 1.0);
}
