//! Registry of named model constructors.
//!
//! The global registry is created on first use. With the `models` feature
//! enabled it starts out holding the built-in models, each registered by its
//! own module.
//!
//! # Example
//!
//! ```rust
//! use fitter_rs::registry::ModelRegistry;
//!
//! let registry = ModelRegistry::global();
//! for name in registry.names() {
//!     let model = registry.create(&name).unwrap();
//!     println!("{}: {:?}", name, model.independent_vars());
//! }
//! ```

use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{FitError, Result};
use crate::model::{Model, ModelConstructor};

/// Name of the model sessions bind when none is given
pub const DEFAULT_MODEL: &str = "ExponentialModel";

static GLOBAL: OnceLock<ModelRegistry> = OnceLock::new();

/// Name to constructor map, safe to share between threads
#[derive(Default)]
pub struct ModelRegistry {
    entries: RwLock<IndexMap<String, ModelConstructor>>,
}

impl ModelRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry.
    pub fn global() -> &'static ModelRegistry {
        GLOBAL.get_or_init(|| {
            let registry = ModelRegistry::new();
            #[cfg(feature = "models")]
            crate::models::register_builtin(&registry);
            registry
        })
    }

    /// Add a constructor, replacing any previous one under `name`
    pub fn register<F>(&self, name: &str, constructor: F)
    where
        F: Fn() -> Box<dyn Model> + Send + Sync + 'static,
    {
        self.register_constructor(name, Arc::new(constructor));
    }

    pub fn register_constructor(&self, name: &str, constructor: ModelConstructor) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.insert(name.to_string(), constructor).is_some() {
            debug!(model = name, "replaced registered model");
        } else {
            debug!(model = name, "registered model");
        }
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(name)
    }

    /// The constructor registered under `name`
    pub fn constructor(&self, name: &str) -> Result<ModelConstructor> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(name)
            .cloned()
            .ok_or_else(|| FitError::UnknownModel(name.to_string()))
    }

    /// Instantiate the model registered under `name`
    pub fn create(&self, name: &str) -> Result<Box<dyn Model>> {
        let constructor = self.constructor(name)?;
        Ok(constructor())
    }

    /// Instantiate the default model
    pub fn default_model(&self) -> Result<Box<dyn Model>> {
        self.create(DEFAULT_MODEL)
    }
}
