use thiserror::Error;

use crate::parameters::{ExpressionError, ParameterError, SerializationError};

/// Error types for the fitter-rs library.
#[derive(Error, Debug)]
pub enum FitError {
    /// Parameter, expression and dependency errors raised while resolving.
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    /// A required independent variable is absent from the session bindings.
    #[error("Missing binding for independent variable '{0}'")]
    MissingBinding(String),

    /// The model offers no guess strategy. Sessions treat this as a
    /// capability restriction, not a failure.
    #[error("Guessing is not supported: {0}")]
    UnsupportedGuess(String),

    /// The operation needs zero or one independent variables.
    #[error("Cannot handle models with {count} independent variables (at most one is supported)")]
    UnsupportedDimensionality { count: usize },

    /// No model with this name is registered.
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// The session has no bound model.
    #[error("No model is bound to the session")]
    NoModel,

    /// Error indicating a mismatch in array dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Parameter persistence error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// Generic error for cases that don't fit the other categories.
    #[error("Error: {0}")]
    Other(String),
}

impl FitError {
    /// Whether the error comes from a malformed expression
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            FitError::Parameter(ParameterError::ExpressionParse { .. })
        )
    }

    /// Whether the error comes from evaluating a parsed expression
    pub fn is_evaluation_error(&self) -> bool {
        matches!(
            self,
            FitError::Parameter(ParameterError::ExpressionEvaluation { .. })
        )
    }

    /// The underlying expression error, if any
    pub fn expression_error(&self) -> Option<&ExpressionError> {
        match self {
            FitError::Parameter(ParameterError::ExpressionParse { source, .. })
            | FitError::Parameter(ParameterError::ExpressionEvaluation { source, .. }) => {
                Some(source)
            }
            _ => None,
        }
    }
}

/// Result type alias for fitter-rs operations.
pub type Result<T> = std::result::Result<T, FitError>;

impl From<crate::parameters::BoundsError> for FitError {
    fn from(err: crate::parameters::BoundsError) -> Self {
        FitError::Parameter(ParameterError::from(err))
    }
}

impl From<String> for FitError {
    fn from(s: String) -> Self {
        FitError::Other(s)
    }
}

impl From<&str> for FitError {
    fn from(s: &str) -> Self {
        FitError::Other(s.to_string())
    }
}
