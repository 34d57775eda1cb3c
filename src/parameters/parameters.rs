//! Parameter collection implementation
//!
//! [`ParameterSet`] maps names to [`Parameter`]s and keeps insertion order,
//! which is the order parameters are displayed in. Evaluation order of
//! derived parameters is decided by the [`Resolver`](crate::resolver::Resolver),
//! never by this order.

use crate::parameters::parameter::{Parameter, ParameterError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// An insertion-ordered collection of named parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    params: IndexMap<String, Parameter>,
}

impl ParameterSet {
    /// Create a new empty parameter set
    ///
    /// # Examples
    ///
    /// ```
    /// use fitter_rs::parameters::ParameterSet;
    ///
    /// let params = ParameterSet::new();
    /// assert!(params.is_empty());
    /// ```
    pub fn new() -> Self {
        Self {
            params: IndexMap::new(),
        }
    }

    /// Add a parameter under its own name, replacing any parameter of the
    /// same name in place
    pub fn add(&mut self, param: Parameter) {
        self.params.insert(param.name().to_string(), param);
    }

    /// Add a parameter under `key`. The parameter's name may be empty; the
    /// resolver fills it in from the key.
    pub fn insert(&mut self, key: &str, param: Parameter) {
        self.params.insert(key.to_string(), param);
    }

    /// Add a free parameter with a value
    ///
    /// # Examples
    ///
    /// ```
    /// use fitter_rs::parameters::ParameterSet;
    ///
    /// let mut params = ParameterSet::new();
    /// params.add_param("amplitude", 10.0);
    /// assert_eq!(params.get("amplitude").unwrap().value(), Some(10.0));
    /// ```
    pub fn add_param(&mut self, name: &str, value: f64) {
        self.add(Parameter::new(name, value));
    }

    /// Add a free parameter with bounds
    pub fn add_param_with_bounds(
        &mut self,
        name: &str,
        value: f64,
        min: f64,
        max: f64,
    ) -> Result<(), ParameterError> {
        self.add(Parameter::with_bounds(name, value, min, max)?);
        Ok(())
    }

    /// Add a derived parameter
    ///
    /// # Examples
    ///
    /// ```
    /// use fitter_rs::parameters::ParameterSet;
    ///
    /// let mut params = ParameterSet::new();
    /// params.add_param("sigma", 1.5);
    /// params.add_param_with_expr("fwhm", "2.3548200 * sigma");
    /// assert!(params.get("fwhm").unwrap().is_derived());
    /// ```
    pub fn add_param_with_expr(&mut self, name: &str, expr: &str) {
        self.add(Parameter::with_expr(name, expr));
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.params.get_mut(name)
    }

    /// Value of `name`, failing when the parameter is missing or unset
    pub fn value_of(&self, name: &str) -> Result<f64, ParameterError> {
        self.get(name)
            .ok_or_else(|| ParameterError::ParameterNotFound {
                name: name.to_string(),
            })?
            .value()
            .ok_or_else(|| ParameterError::UnsetValue {
                name: name.to_string(),
            })
    }

    /// Set the value of an existing parameter
    pub fn set_value(&mut self, name: &str, value: f64) -> Result<(), ParameterError> {
        self.get_mut(name)
            .ok_or_else(|| ParameterError::ParameterNotFound {
                name: name.to_string(),
            })?
            .set_value(value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// Remove a parameter, keeping the order of the others
    pub fn remove(&mut self, name: &str) -> Option<Parameter> {
        self.params.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Names in insertion order
    pub fn names(&self) -> Vec<String> {
        self.params.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Parameter)> {
        self.params.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Parameter)> {
        self.params.iter_mut()
    }

    /// Name to value map, in insertion order
    pub fn values(&self) -> IndexMap<String, Option<f64>> {
        self.params
            .iter()
            .map(|(name, p)| (name.clone(), p.value()))
            .collect()
    }

    /// Free parameters the solver varies, in insertion order
    pub fn varying(&self) -> Vec<&Parameter> {
        self.params
            .values()
            .filter(|p| p.vary() && !p.is_derived())
            .collect()
    }

    /// Parameters whose value comes from an expression
    pub fn derived(&self) -> Vec<&Parameter> {
        self.params.values().filter(|p| p.is_derived()).collect()
    }
}

impl<'a> IntoIterator for &'a ParameterSet {
    type Item = (&'a String, &'a Parameter);
    type IntoIter = indexmap::map::Iter<'a, String, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

impl FromIterator<Parameter> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        let mut set = Self::new();
        for param in iter {
            set.add(param);
        }
        set
    }
}

/// Error that can occur during serialization/deserialization
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ParameterSet {
    /// Save the parameters to a JSON file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), SerializationError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Serialize the parameters to a JSON string
    ///
    /// # Examples
    ///
    /// ```
    /// use fitter_rs::parameters::ParameterSet;
    ///
    /// let mut params = ParameterSet::new();
    /// params.add_param("amplitude", 10.0);
    /// params.add_param_with_expr("half", "amplitude / 2");
    ///
    /// let json = params.to_json().unwrap();
    /// let restored = ParameterSet::from_json(&json).unwrap();
    /// assert_eq!(restored, params);
    /// ```
    pub fn to_json(&self) -> Result<String, SerializationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load parameters from a JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, SerializationError> {
        let reader = BufReader::new(File::open(path)?);
        let params: ParameterSet = serde_json::from_reader(reader)?;
        Ok(params.with_names_from_keys())
    }

    /// Load parameters from a JSON string
    pub fn from_json(json: &str) -> Result<Self, SerializationError> {
        let params: ParameterSet = serde_json::from_str(json)?;
        Ok(params.with_names_from_keys())
    }

    // Hand-written files may leave out the name inside each entry
    fn with_names_from_keys(mut self) -> Self {
        for (key, param) in self.params.iter_mut() {
            if param.name().is_empty() {
                param.set_name(key);
            }
        }
        self
    }
}
