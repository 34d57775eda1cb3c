//! Tests for the model registry

use std::sync::Arc;
use std::thread;

use fitter_rs::error::FitError;
use fitter_rs::model::{Model, ModelConstructor};
use fitter_rs::models::{ConstantModel, LinearModel};
use fitter_rs::registry::{ModelRegistry, DEFAULT_MODEL};

#[test]
fn test_global_registry_holds_builtins() {
    let registry = ModelRegistry::global();
    for name in ["ConstantModel", "LinearModel", "ExponentialModel", "GaussianModel"] {
        assert!(registry.contains(name), "{} is not registered", name);
        assert_eq!(registry.create(name).unwrap().name(), name);
    }

    assert_eq!(registry.default_model().unwrap().name(), DEFAULT_MODEL);
}

#[test]
fn test_unknown_model() {
    let registry = ModelRegistry::new();
    match registry.create("NoSuchModel") {
        Err(FitError::UnknownModel(name)) => assert_eq!(name, "NoSuchModel"),
        other => panic!("Expected UnknownModel error, got {:?}", other.map(|m| m.name().to_string())),
    }
    assert!(matches!(registry.default_model(), Err(FitError::UnknownModel(_))));
}

#[test]
fn test_constructors_build_fresh_models() {
    let registry = ModelRegistry::new();
    registry.register("offset", || Box::new(ConstantModel::with_prefix("offset_")));

    let constructor: ModelConstructor = registry.constructor("offset").unwrap();
    let first = constructor();
    let second = constructor();
    assert_eq!(first.make_params().names(), vec!["offset_c"]);
    assert_eq!(first.make_params(), second.make_params());
}

#[test]
fn test_registration_from_several_threads() {
    let registry = Arc::new(ModelRegistry::new());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let prefix = format!("line{}_", i);
                registry.register(&format!("Line{}", i), move || {
                    Box::new(LinearModel::with_prefix(&prefix)) as Box<dyn Model>
                });
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(registry.names().len(), 4);
    let model = registry.create("Line2").unwrap();
    assert!(model.make_params().contains("line2_slope"));
}
