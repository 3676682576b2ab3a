//! Registry behaviour seen through the public API: serialized round-trips, catalog order,
//! duplicate handling and file registration.

use ai_fn_runtime::{
    sync_fn, CallArgs, Error, FunctionDefinition, FunctionRegistry, ParameterSchema, RegistrationPolicy,
};
use serde_json::json;
use std::collections::HashMap;

fn weather_schema() -> serde_json::Value {
    json!({
        "name": "get_weather",
        "description": "Get the current weather for a location",
        "parameters": {
            "type": "object",
            "properties": {
                "location": {"type": "string", "description": "City name"},
                "unit": {"type": "string", "enum": ["celsius", "fahrenheit"]},
                "days": {"type": "integer", "minimum": 1}
            },
            "required": ["location"]
        }
    })
}

#[test]
fn test_serialized_round_trip_is_exact() {
    let mut registry = FunctionRegistry::new();
    registry.register_serialized(&weather_schema(), None).unwrap();
    assert_eq!(registry.catalog_serialized(), vec![weather_schema()]);
}

#[test]
fn test_image_flags_survive_round_trip() {
    let schema = json!({
        "name": "describe_image",
        "description": "Describe an image",
        "parameters": {
            "type": "object",
            "properties": {"image": {"type": "string", "format": "binary"}},
            "required": ["image"]
        },
        "supports_images": true,
        "has_image_output": true
    });
    let mut registry = FunctionRegistry::new();
    registry.register_serialized(&schema, None).unwrap();
    let def = registry.lookup("describe_image").unwrap();
    assert!(def.supports_binary_input);
    assert!(def.returns_image);
    assert_eq!(def.binary_parameters(), vec!["image"]);
    assert_eq!(registry.catalog_serialized()[0], schema);
}

#[test]
fn test_catalog_preserves_registration_order() {
    let mut registry = FunctionRegistry::new();
    for name in ["zeta", "alpha", "mid"] {
        registry
            .register(FunctionDefinition::new(name, "", ParameterSchema::object()))
            .unwrap();
    }
    let names: Vec<String> = registry.catalog().iter().map(|d| d.name.clone()).collect();
    assert_eq!(names, vec!["zeta", "alpha", "mid"]);
}

#[test]
fn test_overwrite_replaces_implementation_in_place() {
    let mut registry = FunctionRegistry::new();
    registry
        .register(FunctionDefinition::new("a", "first", ParameterSchema::object()))
        .unwrap();
    registry
        .register(FunctionDefinition::new("b", "", ParameterSchema::object()))
        .unwrap();
    registry
        .register(
            FunctionDefinition::new("a", "second", ParameterSchema::object())
                .with_implementation(sync_fn(|_: &CallArgs| Ok(json!(1)))),
        )
        .unwrap();

    assert_eq!(registry.names(), vec!["a", "b"]);
    let a = registry.lookup("a").unwrap();
    assert_eq!(a.description, "second");
    assert!(a.implementation.is_some());
}

#[test]
fn test_reject_policy_keeps_original() {
    let mut registry = FunctionRegistry::with_policy(RegistrationPolicy::Reject);
    registry.register_serialized(&weather_schema(), None).unwrap();
    let err = registry.register_serialized(&weather_schema(), None).unwrap_err();
    assert!(matches!(err, Error::DuplicateName { ref name } if name == "get_weather"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_malformed_schema_reports_path() {
    let mut registry = FunctionRegistry::new();
    let err = registry
        .register_serialized(
            &json!({
                "name": "bad",
                "parameters": {
                    "type": "object",
                    "properties": {"tags": {"type": "array"}}
                }
            }),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, Error::Schema { .. }));
    assert!(registry.is_empty());
}

#[test]
fn test_register_many_with_implementations() {
    let mut registry = FunctionRegistry::new();
    let mut impls = HashMap::new();
    impls.insert("get_weather".to_string(), sync_fn(|_: &CallArgs| Ok(json!("sunny"))));
    let names = registry
        .register_many(
            &[
                weather_schema(),
                json!({"name": "get_time", "parameters": {"type": "object"}}),
            ],
            impls,
        )
        .unwrap();
    assert_eq!(names, vec!["get_weather", "get_time"]);
    assert!(registry.lookup("get_weather").unwrap().implementation.is_some());
    assert!(registry.lookup("get_time").unwrap().implementation.is_none());
}

#[test]
fn test_register_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("weather.json");
    std::fs::write(&path, serde_json::to_string_pretty(&weather_schema()).unwrap()).unwrap();

    let mut registry = FunctionRegistry::new();
    registry.register_file(&path, None).unwrap();
    assert!(registry.contains("get_weather"));

    let missing = registry.register_file(dir.path().join("nope.json"), None);
    assert!(matches!(missing, Err(Error::Io(_))));
}
