//! # fitter-rs
//!
//! `fitter-rs` drives iterative curve fitting sessions: bind a model to some
//! data, guess starting values, fit, tweak, and fit again.
//!
//! The library provides:
//! - Named parameters with bounds and algebraic constraint expressions
//! - A dependency resolver that evaluates constraint expressions in order
//! - A [`Model`] trait with a Levenberg-Marquardt fit and a handful of
//!   built-in models
//! - A registry of named model constructors
//! - A [`Fitter`] session that keeps parameters between fits and talks to an
//!   optional parameter view and renderer
//!
//! ## Basic Usage
//!
//! ```
//! use fitter_rs::{Bindings, Fitter, Value};
//! use ndarray::Array1;
//!
//! let x = Array1::<f64>::linspace(0.0, 5.0, 30);
//! let data = x.mapv(|x: f64| 4.0 * (-x / 1.5).exp());
//!
//! let mut bindings = Bindings::new();
//! bindings.insert("x".to_string(), Value::from(x));
//!
//! // Binds the registry's default model, the exponential decay
//! let mut fitter = Fitter::with_default_model(data, bindings).unwrap();
//! let result = fitter.fit(Bindings::new()).unwrap();
//!
//! let decay = result.params.value_of("decay").unwrap();
//! assert!((decay - 1.5).abs() < 1e-4);
//! ```

pub mod error;
pub mod lm;
pub mod model;
pub mod parameters;
pub mod registry;
pub mod resolver;
pub mod session;

#[cfg(feature = "models")]
pub mod models;

// Re-exports for convenience
pub use error::{FitError, Result};
pub use lm::{LevenbergMarquardt, LmConfig};
pub use model::{Bindings, FitArgs, FitResult, FunctionModel, Model, ModelSource, Value};
pub use parameters::{Bounds, Parameter, ParameterError, ParameterSet};
pub use registry::ModelRegistry;
pub use resolver::Resolver;
pub use session::{ExprOverridePolicy, Fitter, FitterConfig, ParamView, PlotFrame, Renderer, SessionState};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
