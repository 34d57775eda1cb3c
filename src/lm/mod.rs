//! Levenberg-Marquardt algorithm implementation.
//!
//! [`LevenbergMarquardt`] minimises any residual closure. [`fit_model`] wraps
//! it for [`Model`](crate::model::Model)s: bounds, fixed parameters and
//! expression constraints are handled there, which is what the default
//! [`Model::fit`](crate::model::Model::fit) uses.

pub mod algorithm;
pub mod config;
pub mod finite_difference;
pub mod fit;

// Re-export key types
pub use algorithm::{covariance, LevenbergMarquardt, LmReport};
pub use config::LmConfig;
pub use fit::{fit_model, fit_model_with_config};
