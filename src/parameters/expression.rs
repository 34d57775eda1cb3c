//! Expression parsing and evaluation for derived parameters
//!
//! Expressions are parsed once into an [`Expression`] tree and evaluated
//! against an [`EvaluationContext`]. The [`SymbolTable`] is the context used
//! while resolving a parameter set: it maps names to their last known value,
//! where `None` marks a name that is registered but not determined yet.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::recognize,
    multi::many0,
    number::complete::double,
    sequence::pair,
    IResult, Parser,
};
use std::collections::HashMap;
use std::f64::consts::{E, PI};
use thiserror::Error;

/// Error that can occur during expression parsing or evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Failed to parse expression: {message}")]
    ParseError { message: String },

    #[error("Undefined variable: {name}")]
    UndefinedVariable { name: String },

    #[error("Variable '{name}' has no value yet")]
    UnsetVariable { name: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("Undefined function: {name}")]
    UndefinedFunction { name: String },
}

/// Result type for expression evaluation
type ExprResult<T> = Result<T, ExpressionError>;

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Constant number
    Number(f64),

    /// Variable reference
    Variable(String),

    /// Unary operations
    Unary(UnaryOp, Box<Expression>),

    /// Binary operations
    Binary(BinaryOp, Box<Expression>, Box<Expression>),

    /// Function call
    Function(String, Vec<Expression>),
}

/// Unary operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    /// Negation (-)
    Neg,
}

/// Binary operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    /// Addition (+)
    Add,

    /// Subtraction (-)
    Sub,

    /// Multiplication (*)
    Mul,

    /// Division (/)
    Div,

    /// Power (** or ^)
    Pow,
}

/// Context for expression evaluation, providing variable values
pub trait EvaluationContext {
    /// Get the value of a variable
    fn get_variable(&self, name: &str) -> ExprResult<f64>;

    /// Check if a variable exists
    fn has_variable(&self, name: &str) -> bool;
}

/// Name to value mapping shared by one resolution pass.
///
/// A fresh table holds the constants `pi` and `e`. Names registered with
/// `None` exist but fail evaluation with [`ExpressionError::UnsetVariable`].
#[derive(Debug, Clone)]
pub struct SymbolTable {
    symbols: HashMap<String, Option<f64>>,
}

impl SymbolTable {
    /// Create a table seeded with the mathematical constants
    pub fn new() -> Self {
        let mut table = Self::empty();
        table.set("pi", Some(PI));
        table.set("e", Some(E));
        table
    }

    /// Create a table without any symbols
    pub fn empty() -> Self {
        Self {
            symbols: HashMap::new(),
        }
    }

    /// Register `name`, replacing any previous value
    pub fn set(&mut self, name: &str, value: Option<f64>) {
        self.symbols.insert(name.to_string(), value);
    }

    /// Last known value of `name`; the outer `None` means unregistered
    pub fn get(&self, name: &str) -> Option<Option<f64>> {
        self.symbols.get(name).copied()
    }

    pub fn remove(&mut self, name: &str) -> Option<Option<f64>> {
        self.symbols.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EvaluationContext for SymbolTable {
    fn get_variable(&self, name: &str) -> ExprResult<f64> {
        match self.symbols.get(name) {
            Some(Some(value)) => Ok(*value),
            Some(None) => Err(ExpressionError::UnsetVariable {
                name: name.to_string(),
            }),
            None => Err(ExpressionError::UndefinedVariable {
                name: name.to_string(),
            }),
        }
    }

    fn has_variable(&self, name: &str) -> bool {
        self.contains(name)
    }
}

impl EvaluationContext for HashMap<String, f64> {
    fn get_variable(&self, name: &str) -> ExprResult<f64> {
        self.get(name)
            .copied()
            .ok_or_else(|| ExpressionError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    fn has_variable(&self, name: &str) -> bool {
        self.contains_key(name)
    }
}

impl Expression {
    /// Parse an expression from a string
    ///
    /// # Examples
    ///
    /// ```
    /// use fitter_rs::parameters::expression::{Expression, SymbolTable};
    ///
    /// let expr = Expression::parse("2 * pi * radius").unwrap();
    /// let mut symbols = SymbolTable::new();
    /// symbols.set("radius", Some(0.5));
    /// assert!((expr.evaluate(&symbols).unwrap() - std::f64::consts::PI).abs() < 1e-12);
    /// ```
    pub fn parse(input: &str) -> ExprResult<Self> {
        if input.trim().is_empty() {
            return Err(ExpressionError::ParseError {
                message: "empty expression".to_string(),
            });
        }

        match expr_parser(input) {
            Ok((remainder, expr)) => {
                // Make sure the entire input was consumed
                if remainder.trim().is_empty() {
                    Ok(expr)
                } else {
                    Err(ExpressionError::ParseError {
                        message: format!("Unexpected trailing characters: '{}'", remainder.trim()),
                    })
                }
            }
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                Err(ExpressionError::ParseError {
                    message: format!("Unexpected input at '{}' in '{}'", e.input, input),
                })
            }
            Err(nom::Err::Incomplete(_)) => Err(ExpressionError::ParseError {
                message: format!("Incomplete expression '{}'", input),
            }),
        }
    }

    /// Evaluate the expression with the given context
    pub fn evaluate<C: EvaluationContext + ?Sized>(&self, context: &C) -> ExprResult<f64> {
        match self {
            Self::Number(n) => Ok(*n),

            Self::Variable(name) => context.get_variable(name),

            Self::Unary(UnaryOp::Neg, expr) => Ok(-expr.evaluate(context)?),

            Self::Binary(op, left, right) => {
                let lhs = left.evaluate(context)?;
                let rhs = right.evaluate(context)?;

                match op {
                    BinaryOp::Add => Ok(lhs + rhs),
                    BinaryOp::Sub => Ok(lhs - rhs),
                    BinaryOp::Mul => Ok(lhs * rhs),
                    BinaryOp::Div => {
                        if rhs == 0.0 {
                            Err(ExpressionError::DivisionByZero)
                        } else {
                            Ok(lhs / rhs)
                        }
                    }
                    BinaryOp::Pow => Ok(lhs.powf(rhs)),
                }
            }

            Self::Function(name, args) => {
                let evaluated_args = args
                    .iter()
                    .map(|arg| arg.evaluate(context))
                    .collect::<ExprResult<Vec<f64>>>()?;
                call_function(name, &evaluated_args)
            }
        }
    }

    /// Free variable names in first-seen order, without duplicates.
    ///
    /// Function names are not variables.
    pub fn variables(&self) -> Vec<String> {
        let mut vars = Vec::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables(&self, vars: &mut Vec<String>) {
        match self {
            Self::Number(_) => {}

            Self::Variable(name) => {
                if !vars.contains(name) {
                    vars.push(name.clone());
                }
            }

            Self::Unary(_, expr) => expr.collect_variables(vars),

            Self::Binary(_, left, right) => {
                left.collect_variables(vars);
                right.collect_variables(vars);
            }

            Self::Function(_, args) => {
                for arg in args {
                    arg.collect_variables(vars);
                }
            }
        }
    }
}

fn expect_arity(name: &str, args: &[f64], count: usize) -> ExprResult<()> {
    if args.len() != count {
        return Err(ExpressionError::InvalidOperation {
            message: format!(
                "{}() requires {} argument(s), got {}",
                name,
                count,
                args.len()
            ),
        });
    }
    Ok(())
}

fn call_function(name: &str, args: &[f64]) -> ExprResult<f64> {
    let unary = |f: fn(f64) -> f64| -> ExprResult<f64> {
        expect_arity(name, args, 1)?;
        Ok(f(args[0]))
    };
    let binary = |f: fn(f64, f64) -> f64| -> ExprResult<f64> {
        expect_arity(name, args, 2)?;
        Ok(f(args[0], args[1]))
    };

    let value = match name {
        "sin" => unary(f64::sin)?,
        "cos" => unary(f64::cos)?,
        "tan" => unary(f64::tan)?,
        "asin" => unary(f64::asin)?,
        "acos" => unary(f64::acos)?,
        "atan" => unary(f64::atan)?,
        "exp" => unary(f64::exp)?,
        "log" | "ln" => unary(f64::ln)?,
        "log10" => unary(f64::log10)?,
        "sqrt" => unary(f64::sqrt)?,
        "abs" => unary(f64::abs)?,
        "atan2" => binary(f64::atan2)?,
        "pow" => binary(f64::powf)?,
        "max" | "min" => {
            if args.len() < 2 {
                return Err(ExpressionError::InvalidOperation {
                    message: format!(
                        "{}() requires at least 2 arguments, got {}",
                        name,
                        args.len()
                    ),
                });
            }
            if name == "max" {
                args.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b))
            } else {
                args.iter().fold(f64::INFINITY, |a, &b| a.min(b))
            }
        }
        _ => {
            return Err(ExpressionError::UndefinedFunction {
                name: name.to_string(),
            })
        }
    };

    // NaN out of NaN-free arguments is a math domain error, e.g. sqrt(-1)
    if value.is_nan() && !args.iter().any(|a| a.is_nan()) {
        return Err(ExpressionError::InvalidOperation {
            message: format!("math domain error in {}()", name),
        });
    }

    Ok(value)
}

// Parser functions using nom

fn ws(input: &str) -> IResult<&str, &str> {
    multispace0(input)
}

/// Skip whitespace, then match the single character `c`
fn punct(input: &str, c: char) -> IResult<&str, char> {
    let (input, _) = ws(input)?;
    char::<&str, nom::error::Error<&str>>(c).parse(input)
}

/// Parse an identifier (variable or function name)
fn identifier(input: &str) -> IResult<&str, String> {
    let mut parser = recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ));

    let parsed: IResult<&str, &str> = parser.parse(input);
    let (input, matched) = parsed?;
    Ok((input, matched.to_string()))
}

/// Parse a number; identifiers such as `inf` or `nan` are left to [`variable`]
fn number(input: &str) -> IResult<&str, Expression> {
    match input.chars().next() {
        Some(c) if c.is_ascii_digit() || c == '.' => {
            let parsed: IResult<&str, f64> = double(input);
            let (input, num) = parsed?;
            Ok((input, Expression::Number(num)))
        }
        _ => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Float,
        ))),
    }
}

/// Parse a comma-separated list of expressions (for function arguments)
fn args_list(input: &str) -> IResult<&str, Vec<Expression>> {
    let (mut input, first) = expr_parser(input)?;
    let mut args = vec![first];

    while let Ok((after_comma, _)) = punct(input, ',') {
        let (after_expr, expr) = expr_parser(after_comma)?;
        args.push(expr);
        input = after_expr;
    }

    Ok((input, args))
}

/// Parse a function call or, failing the opening parenthesis, a variable
fn call_or_variable(input: &str) -> IResult<&str, Expression> {
    let (input, name) = identifier(input)?;

    let Ok((after_paren, _)) = punct(input, '(') else {
        return Ok((input, Expression::Variable(name)));
    };

    // Handle empty arguments case
    if let Ok((input, _)) = punct(after_paren, ')') {
        return Ok((input, Expression::Function(name, vec![])));
    }

    let (input, args) = args_list(after_paren)?;
    let (input, _) = punct(input, ')')?;

    Ok((input, Expression::Function(name, args)))
}

/// Parse a parenthesized expression
fn parens(input: &str) -> IResult<&str, Expression> {
    let (input, _) = punct(input, '(')?;
    let (input, expr) = expr_parser(input)?;
    let (input, _) = punct(input, ')')?;
    Ok((input, expr))
}

/// Parse a primary expression (number, variable, function call, or parenthesized expression)
fn primary(input: &str) -> IResult<&str, Expression> {
    let (input, _) = ws(input)?;
    alt((number, call_or_variable, parens)).parse(input)
}

fn pow_operator(input: &str) -> IResult<&str, &str> {
    let (input, _) = ws(input)?;
    alt((tag("**"), tag("^"))).parse(input)
}

/// Parse a power expression; right associative, the exponent may be signed
fn power(input: &str) -> IResult<&str, Expression> {
    let (input, base) = primary(input)?;

    match pow_operator(input) {
        Ok((after_op, _)) => {
            let (remaining, exponent) = unary(after_op)?;
            Ok((
                remaining,
                Expression::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)),
            ))
        }
        Err(_) => Ok((input, base)),
    }
}

/// Parse a signed expression (-expr, +expr); binds looser than `**`
fn unary(input: &str) -> IResult<&str, Expression> {
    if let Ok((after_sign, _)) = punct(input, '-') {
        let (remaining, expr) = unary(after_sign)?;
        return Ok((remaining, Expression::Unary(UnaryOp::Neg, Box::new(expr))));
    }
    if let Ok((after_sign, _)) = punct(input, '+') {
        return unary(after_sign);
    }
    power(input)
}

fn mul_operator(input: &str) -> IResult<&str, BinaryOp> {
    let (input, _) = ws(input)?;
    // `**` belongs to the power level
    if input.starts_with("**") {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        )));
    }
    let parsed: IResult<&str, char> = alt((char('*'), char('/'))).parse(input);
    let (input, op) = parsed?;
    Ok((input, if op == '*' { BinaryOp::Mul } else { BinaryOp::Div }))
}

/// Parse a multiplicative expression, folding to the left
fn term(input: &str) -> IResult<&str, Expression> {
    let (mut input, mut left) = unary(input)?;

    while let Ok((after_op, op)) = mul_operator(input) {
        let (remaining, right) = unary(after_op)?;
        left = Expression::Binary(op, Box::new(left), Box::new(right));
        input = remaining;
    }

    Ok((input, left))
}

fn add_operator(input: &str) -> IResult<&str, BinaryOp> {
    let (input, _) = ws(input)?;
    let parsed: IResult<&str, char> = alt((char('+'), char('-'))).parse(input);
    let (input, op) = parsed?;
    Ok((input, if op == '+' { BinaryOp::Add } else { BinaryOp::Sub }))
}

/// Parse an additive expression, folding to the left
fn expr_parser(input: &str) -> IResult<&str, Expression> {
    let (mut input, mut left) = term(input)?;

    while let Ok((after_op, op)) = add_operator(input) {
        let (remaining, right) = term(after_op)?;
        left = Expression::Binary(op, Box::new(left), Box::new(right));
        input = remaining;
    }

    Ok((input, left))
}
