//! # Parameter System
//!
//! Named parameters for model fitting, similar to lmfit-py's.
//!
//! ## Key Features
//!
//! - **Optional values**: a parameter's value may be undetermined (`None`) until a
//!   guess, a fit or the resolver provides one
//! - **Bounds**: min/max limits with the bounded-parameter transform used by the solver
//! - **Derived parameters**: values defined by an expression over other parameters
//! - **Serialization**: save and load parameter sets as JSON
//!
//! ## Example Usage
//!
//! ```rust
//! use fitter_rs::parameters::ParameterSet;
//! use fitter_rs::resolver::Resolver;
//!
//! let mut params = ParameterSet::new();
//! params.add_param("a", 2.0);
//! params.add_param("b", 3.0);
//! params.add_param_with_expr("c", "a + b");
//!
//! let known = params.clone();
//! let mut resolver = Resolver::new();
//! resolver.resolve_all(&mut params, &known).unwrap();
//! assert_eq!(params.get("c").unwrap().value(), Some(5.0));
//! ```

pub mod bounds;
pub mod expression;
pub mod parameter;
pub mod parameters;


// Re-export key types
pub use bounds::{Bounds, BoundsError};
pub use expression::{EvaluationContext, Expression, ExpressionError, SymbolTable};
pub use parameter::{Parameter, ParameterError};
pub use parameters::{ParameterSet, SerializationError};
