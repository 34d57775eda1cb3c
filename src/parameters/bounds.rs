//! Parameter bounds and the bounded-parameter transform
//!
//! The solver works in an unbounded "internal" space. Bounded parameters are
//! mapped in and out of it with the MINUIT-style transforms used by lmfit:
//! an arcsine mapping for two-sided bounds and a square-root mapping for
//! one-sided bounds.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when working with bounds
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    #[error("Invalid bounds: min ({min}) must not exceed max ({max})")]
    InvalidBounds { min: f64, max: f64 },

    #[error("Value {value} is outside bounds [{min}, {max}]")]
    ValueOutsideBounds { value: f64, min: f64, max: f64 },
}

/// Minimum and maximum allowed value; infinities mean "unbounded"
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "BoundsRepr", try_from = "BoundsRepr")]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

/// JSON has no infinities, so a missing limit is written as `null`
#[derive(Serialize, Deserialize)]
struct BoundsRepr {
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
}

impl From<Bounds> for BoundsRepr {
    fn from(bounds: Bounds) -> Self {
        Self {
            min: bounds.min.is_finite().then_some(bounds.min),
            max: bounds.max.is_finite().then_some(bounds.max),
        }
    }
}

impl TryFrom<BoundsRepr> for Bounds {
    type Error = BoundsError;

    fn try_from(repr: BoundsRepr) -> Result<Self, Self::Error> {
        Bounds::new(
            repr.min.unwrap_or(f64::NEG_INFINITY),
            repr.max.unwrap_or(f64::INFINITY),
        )
    }
}

impl Bounds {
    /// Create bounds, rejecting `min > max` and NaN limits
    pub fn new(min: f64, max: f64) -> Result<Self, BoundsError> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(BoundsError::InvalidBounds { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn unbounded() -> Self {
        Self {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }

    pub fn min_only(min: f64) -> Self {
        Self {
            min,
            max: f64::INFINITY,
        }
    }

    pub fn max_only(max: f64) -> Self {
        Self {
            min: f64::NEG_INFINITY,
            max,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.min == f64::NEG_INFINITY && self.max == f64::INFINITY
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    /// Map an external (bounded) value to the solver's internal space
    pub fn to_internal(&self, value: f64) -> Result<f64, BoundsError> {
        if !self.contains(value) {
            return Err(BoundsError::ValueOutsideBounds {
                value,
                min: self.min,
                max: self.max,
            });
        }

        let internal = match (self.min.is_finite(), self.max.is_finite()) {
            (false, false) => value,
            (true, false) => ((value - self.min + 1.0).powi(2) - 1.0).sqrt(),
            (false, true) => ((self.max - value + 1.0).powi(2) - 1.0).sqrt(),
            (true, true) => {
                if self.max == self.min {
                    0.0
                } else {
                    (2.0 * (value - self.min) / (self.max - self.min) - 1.0).asin()
                }
            }
        };
        Ok(internal)
    }

    /// Map an internal solver value back to the bounded range
    pub fn to_external(&self, internal: f64) -> f64 {
        match (self.min.is_finite(), self.max.is_finite()) {
            (false, false) => internal,
            (true, false) => self.min - 1.0 + (internal * internal + 1.0).sqrt(),
            (false, true) => self.max + 1.0 - (internal * internal + 1.0).sqrt(),
            (true, true) => self.min + (internal.sin() + 1.0) * (self.max - self.min) / 2.0,
        }
    }

    /// Derivative of the external value with respect to the internal one
    pub fn external_gradient(&self, internal: f64) -> f64 {
        match (self.min.is_finite(), self.max.is_finite()) {
            (false, false) => 1.0,
            (true, false) => internal / (internal * internal + 1.0).sqrt(),
            (false, true) => -internal / (internal * internal + 1.0).sqrt(),
            (true, true) => internal.cos() * (self.max - self.min) / 2.0,
        }
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::unbounded()
    }
}
