//! Integration tests for the fitter-rs library
//!
//! These fit the built-in models to synthetic data, through the model API and
//! through a session.
