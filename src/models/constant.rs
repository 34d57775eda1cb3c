//! Constant model: a single level with no independent variable.

use ndarray::Array1;

use crate::error::{FitError, Result};
use crate::model::{Bindings, Model, Value};
use crate::parameters::ParameterSet;
use crate::registry::ModelRegistry;

/// f = c
///
/// The model has no independent variable. It evaluates to a single value,
/// which the fit broadcasts over the data.
#[derive(Debug, Clone, Default)]
pub struct ConstantModel {
    prefix: String,
}

impl ConstantModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }

    fn c(&self) -> String {
        format!("{}c", self.prefix)
    }
}

impl Model for ConstantModel {
    fn name(&self) -> &str {
        "ConstantModel"
    }

    fn independent_vars(&self) -> &[String] {
        &[]
    }

    fn make_params(&self) -> ParameterSet {
        let mut params = ParameterSet::new();
        params.add_param(&self.c(), 0.0);
        params
    }

    /// The mean of the data
    fn guess(&self, data: &Array1<f64>, _independent: Option<(&str, &Value)>) -> Result<ParameterSet> {
        let mean = data
            .mean()
            .ok_or_else(|| FitError::InvalidInput("No data to guess from".to_string()))?;

        let mut params = self.make_params();
        params.set_value(&self.c(), mean)?;
        Ok(params)
    }

    fn eval(&self, params: &ParameterSet, _bindings: &Bindings) -> Result<Array1<f64>> {
        Ok(Array1::from_elem(1, params.value_of(&self.c())?))
    }
}

pub(crate) fn register(registry: &ModelRegistry) {
    registry.register("ConstantModel", || Box::new(ConstantModel::new()));
}
