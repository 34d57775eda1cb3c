//! Straight line model.

use ndarray::Array1;

use super::{guess_samples, linear_regression};
use crate::error::Result;
use crate::model::{independent_values, Bindings, Model, Value};
use crate::parameters::ParameterSet;
use crate::registry::ModelRegistry;

/// f(x) = slope * x + intercept
#[derive(Debug, Clone)]
pub struct LinearModel {
    prefix: String,
    independent_vars: Vec<String>,
}

impl LinearModel {
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

impl Default for LinearModel {
    fn default() -> Self {
        Self::new()
    }
}

impl Model for LinearModel {
    fn name(&self) -> &str {
        "LinearModel"
    }

    fn independent_vars(&self) -> &[String] {
        &self.independent_vars
    }

    fn make_params(&self) -> ParameterSet {
        let mut params = ParameterSet::new();
        params.add_param(&self.param("slope"), 1.0);
        params.add_param(&self.param("intercept"), 0.0);
        params
    }

    fn guess(&self, data: &Array1<f64>, independent: Option<(&str, &Value)>) -> Result<ParameterSet> {
        let x = guess_samples(&self.independent_vars[0], data, independent)?;
        let (slope, intercept) = linear_regression(&x, data);

        let mut params = self.make_params();
        params.set_value(&self.param("slope"), slope)?;
        params.set_value(&self.param("intercept"), intercept)?;
        Ok(params)
    }

    fn eval(&self, params: &ParameterSet, bindings: &Bindings) -> Result<Array1<f64>> {
        let slope = params.value_of(&self.param("slope"))?;
        let intercept = params.value_of(&self.param("intercept"))?;
        let x = independent_values(bindings, &self.independent_vars[0])?;
        Ok(x.mapv(|x| slope * x + intercept))
    }
}

pub(crate) fn register(registry: &ModelRegistry) {
    registry.register("LinearModel", || Box::new(LinearModel::new()));
}
