//! Tests for the Expression parsing and evaluation

use fitter_rs::parameters::expression::{
    EvaluationContext, Expression, ExpressionError, SymbolTable,
};
use std::collections::HashMap;

fn context() -> HashMap<String, f64> {
    let mut context = HashMap::new();
    context.insert("x".to_string(), 2.0);
    context.insert("y".to_string(), 3.0);
    context.insert("z".to_string(), 4.0);
    context
}

fn eval(input: &str) -> Result<f64, ExpressionError> {
    Expression::parse(input)?.evaluate(&context())
}

#[test]
fn test_expression_parsing() {
    let expr = Expression::parse("42").unwrap();
    assert!(expr.variables().is_empty());

    assert_eq!(Expression::parse("x + y").unwrap().variables().len(), 2);
    assert_eq!(Expression::parse("x^2").unwrap().variables().len(), 1);
    assert_eq!(Expression::parse("2 * (x + 1)").unwrap().variables().len(), 1);
    assert_eq!(Expression::parse("sin(x) + cos(y)").unwrap().variables().len(), 2);
    assert_eq!(Expression::parse("max(a, b, c)").unwrap().variables().len(), 3);
    assert_eq!(Expression::parse("(x + y) * (z - 1) / w").unwrap().variables().len(), 4);

    // Whitespace is insignificant
    assert_eq!(Expression::parse("  (  x  +  y  )  *  z  ").unwrap().variables().len(), 3);

    // Signed operands
    assert_eq!(Expression::parse("-x").unwrap().variables().len(), 1);
    assert_eq!(Expression::parse("x + (-y)").unwrap().variables().len(), 2);

    // Invalid expressions
    for input in ["", "x +", "x + (y", "@#$%", "2 * * x", "f(x,"] {
        assert!(
            matches!(Expression::parse(input), Err(ExpressionError::ParseError { .. })),
            "{:?} should not parse",
            input
        );
    }
}

#[test]
fn test_expression_variables() {
    let vars = Expression::parse("x + x + x").unwrap().variables();
    assert_eq!(vars, vec!["x".to_string()]);

    let vars = Expression::parse("2 * (y + x) / z").unwrap().variables();
    assert_eq!(vars, vec!["y".to_string(), "x".to_string(), "z".to_string()]);

    // Function names are not variables
    let vars = Expression::parse("sqrt(a) + max(a, b)").unwrap().variables();
    assert_eq!(vars, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn test_expression_evaluation_simple() {
    assert_eq!(eval("42").unwrap(), 42.0);
    assert_eq!(eval("x").unwrap(), 2.0);
    assert_eq!(eval("-x").unwrap(), -2.0);
    assert_eq!(eval("x + y").unwrap(), 5.0);
    assert_eq!(eval("x - y").unwrap(), -1.0);
    assert_eq!(eval("x * y").unwrap(), 6.0);
    assert_eq!(eval("y / x").unwrap(), 1.5);
    assert_eq!(eval("x^2").unwrap(), 4.0);
    assert_eq!(eval("x**3").unwrap(), 8.0);
    assert_eq!(eval("2 * (x + y)").unwrap(), 10.0);
    assert_eq!(eval("(x + y) * (x - y)").unwrap(), -5.0);
    assert_eq!(eval("x^2 + y^2").unwrap(), 13.0);
    assert_eq!(eval("1.5e1 - x").unwrap(), 13.0);
}

#[test]
fn test_expression_evaluation_functions() {
    assert!((eval("sin(x)").unwrap() - 2.0f64.sin()).abs() < 1e-10);
    assert!((eval("cos(y)").unwrap() - 3.0f64.cos()).abs() < 1e-10);
    assert!((eval("tan(x)").unwrap() - 2.0f64.tan()).abs() < 1e-10);
    assert!((eval("exp(x)").unwrap() - 2.0f64.exp()).abs() < 1e-10);
    assert!((eval("log(y)").unwrap() - 3.0f64.ln()).abs() < 1e-10);
    assert!((eval("log10(z)").unwrap() - 4.0f64.log10()).abs() < 1e-10);
    assert!((eval("sqrt(z)").unwrap() - 2.0).abs() < 1e-10);
    assert!((eval("abs(-x)").unwrap() - 2.0).abs() < 1e-10);
    assert!((eval("atan2(y, x)").unwrap() - 3.0f64.atan2(2.0)).abs() < 1e-10);

    assert_eq!(eval("max(x, y, z)").unwrap(), 4.0);
    assert_eq!(eval("min(x, y, z)").unwrap(), 2.0);

    assert!((eval("sin(x)^2 + cos(x)^2").unwrap() - 1.0).abs() < 1e-10);
    assert!((eval("log(exp(x))").unwrap() - 2.0).abs() < 1e-10);
}

#[test]
fn test_expression_evaluation_errors() {
    match eval("w") {
        Err(ExpressionError::UndefinedVariable { name }) => assert_eq!(name, "w"),
        other => panic!("Expected UndefinedVariable error, got {:?}", other),
    }

    assert_eq!(eval("x / 0"), Err(ExpressionError::DivisionByZero));

    match eval("unknown_func(x)") {
        Err(ExpressionError::UndefinedFunction { name }) => assert_eq!(name, "unknown_func"),
        other => panic!("Expected UndefinedFunction error, got {:?}", other),
    }

    assert!(matches!(eval("sin(x, y)"), Err(ExpressionError::InvalidOperation { .. })));
    assert!(matches!(eval("max(x)"), Err(ExpressionError::InvalidOperation { .. })));
    assert!(matches!(eval("sqrt(-x)"), Err(ExpressionError::InvalidOperation { .. })));
}

#[test]
fn test_symbol_table_context() {
    let mut symbols = SymbolTable::new();
    assert!(symbols.has_variable("pi"));
    assert!(symbols.has_variable("e"));

    symbols.set("amplitude", Some(3.0));
    symbols.set("pending", None);

    let expr = Expression::parse("amplitude * pi").unwrap();
    assert!((expr.evaluate(&symbols).unwrap() - 3.0 * std::f64::consts::PI).abs() < 1e-12);

    // Registered but without a value
    match Expression::parse("pending + 1").unwrap().evaluate(&symbols) {
        Err(ExpressionError::UnsetVariable { name }) => assert_eq!(name, "pending"),
        other => panic!("Expected UnsetVariable error, got {:?}", other),
    }

    let empty = SymbolTable::empty();
    assert!(empty.is_empty());
    assert!(!empty.has_variable("pi"));
}
