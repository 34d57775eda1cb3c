//! Exponential decay model.

use ndarray::Array1;

use super::{guess_samples, linear_regression};
use crate::error::Result;
use crate::model::{independent_values, Bindings, Model, Value};
use crate::parameters::ParameterSet;
use crate::registry::ModelRegistry;

/// An exponential model for fitting exponential decay or growth
///
/// f(x) = amplitude * exp(-x / decay)
///
/// A negative decay describes growth.
#[derive(Debug, Clone)]
pub struct ExponentialModel {
    prefix: String,
    independent_vars: Vec<String>,
}

impl ExponentialModel {
    pub fn new() -> Self {
        Self::with_prefix("")
    }

    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            independent_vars: vec!["x".to_string()],
        }
    }

    fn param(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

impl Default for ExponentialModel {
    fn default() -> Self {
        Self::new()
    }
}

impl Model for ExponentialModel {
    fn name(&self) -> &str {
        "ExponentialModel"
    }

    fn independent_vars(&self) -> &[String] {
        &self.independent_vars
    }

    fn make_params(&self) -> ParameterSet {
        let mut params = ParameterSet::new();
        params.add_param(&self.param("amplitude"), 1.0);
        params.add_param(&self.param("decay"), 1.0);
        params
    }

    /// Straight line through `ln|y|` against `x`
    fn guess(&self, data: &Array1<f64>, independent: Option<(&str, &Value)>) -> Result<ParameterSet> {
        let x = guess_samples(&self.independent_vars[0], data, independent)?;
        let ln_y = data.mapv(|y| (y.abs() + 1e-15).ln());

        // ln(y) = ln(amplitude) - x / decay
        let (slope, intercept) = linear_regression(&x, &ln_y);
        let decay = if slope != 0.0 { -1.0 / slope } else { 1.0 };
        let amplitude = intercept.exp();

        let mut params = self.make_params();
        params.set_value(&self.param("amplitude"), amplitude)?;
        params.set_value(&self.param("decay"), decay)?;
        Ok(params)
    }

    fn eval(&self, params: &ParameterSet, bindings: &Bindings) -> Result<Array1<f64>> {
        let amplitude = params.value_of(&self.param("amplitude"))?;
        let decay = params.value_of(&self.param("decay"))?;
        let x = independent_values(bindings, &self.independent_vars[0])?;
        Ok(x.mapv(|x| amplitude * (-x / decay).exp()))
    }
}

pub(crate) fn register(registry: &ModelRegistry) {
    registry.register("ExponentialModel", || Box::new(ExponentialModel::new()));
}
