//! Parameter schema model and the serialized function schema exchanged with converters.
//!
//! Schemas are parsed strictly: a malformed schema is rejected with [`Error::Schema`]
//! carrying the offending field path, never repaired.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Format hint that marks a parameter as an image payload.
pub const BINARY_FORMAT: &str = "binary";

/// Kind of a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ParameterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema of one parameter (or of the root parameter object of a function).
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSchema {
    pub kind: ParameterKind,
    pub description: Option<String>,
    /// Enumeration of allowed values (`enum` on the wire).
    pub allowed_values: Option<Vec<Value>>,
    pub format: Option<String>,
    pub items: Option<Box<ParameterSchema>>,
    /// Object properties in declaration order.
    pub properties: Option<Vec<(String, ParameterSchema)>>,
    pub required: Option<Vec<String>>,
    /// Keys this model does not interpret (e.g. `minimum`, `pattern`), kept for round-trips
    /// and for the constraint checks of the argument validator.
    pub extra: Map<String, Value>,
}

impl ParameterSchema {
    pub fn new(kind: ParameterKind) -> Self {
        Self {
            kind,
            description: None,
            allowed_values: None,
            format: None,
            items: None,
            properties: if kind == ParameterKind::Object {
                Some(Vec::new())
            } else {
                None
            },
            required: None,
            extra: Map::new(),
        }
    }

    pub fn string() -> Self {
        Self::new(ParameterKind::String)
    }

    pub fn number() -> Self {
        Self::new(ParameterKind::Number)
    }

    pub fn integer() -> Self {
        Self::new(ParameterKind::Integer)
    }

    pub fn boolean() -> Self {
        Self::new(ParameterKind::Boolean)
    }

    pub fn object() -> Self {
        Self::new(ParameterKind::Object)
    }

    pub fn array(items: ParameterSchema) -> Self {
        let mut schema = Self::new(ParameterKind::Array);
        schema.items = Some(Box::new(items));
        schema
    }

    /// String parameter carrying an image reference.
    pub fn image() -> Self {
        Self::string().with_format(BINARY_FORMAT)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_allowed_values(mut self, values: Vec<Value>) -> Self {
        self.allowed_values = Some(values);
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Add an object property. `required` appends the name to the required set.
    pub fn with_property(
        mut self,
        name: impl Into<String>,
        schema: ParameterSchema,
        required: bool,
    ) -> Self {
        let name = name.into();
        if required {
            self.required.get_or_insert_with(Vec::new).push(name.clone());
        }
        let props = self.properties.get_or_insert_with(Vec::new);
        match props.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = schema,
            None => props.push((name, schema)),
        }
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn is_binary(&self) -> bool {
        self.format.as_deref() == Some(BINARY_FORMAT)
    }

    pub fn property(&self, name: &str) -> Option<&ParameterSchema> {
        self.properties
            .as_ref()?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties
            .iter()
            .flat_map(|props| props.iter().map(|(n, _)| n.as_str()))
    }

    pub fn required_names(&self) -> &[String] {
        self.required.as_deref().unwrap_or(&[])
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required_names().iter().any(|r| r == name)
    }

    /// Parse a schema from its JSON form. `path` names the location for error reports.
    pub fn from_value(value: &Value, path: &str) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::schema("schema must be a mapping", path))?;

        let kind = match obj.get("type") {
            Some(Value::String(t)) => ParameterKind::parse(t).ok_or_else(|| {
                Error::schema(format!("unknown parameter type '{}'", t), format!("{path}.type"))
            })?,
            Some(_) => return Err(Error::schema("type must be a string", format!("{path}.type"))),
            None => return Err(Error::schema("missing type", path)),
        };

        let description = match obj.get("description") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                return Err(Error::schema(
                    "description must be a string",
                    format!("{path}.description"),
                ))
            }
        };

        let allowed_values = match obj.get("enum") {
            None => None,
            Some(Value::Array(values)) => Some(values.clone()),
            Some(_) => return Err(Error::schema("enum must be a list", format!("{path}.enum"))),
        };

        let format = match obj.get("format") {
            None => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                return Err(Error::schema("format must be a string", format!("{path}.format")))
            }
        };

        let items = match (kind, obj.get("items")) {
            (ParameterKind::Array, Some(items)) => Some(Box::new(Self::from_value(
                items,
                &format!("{path}.items"),
            )?)),
            (ParameterKind::Array, None) => {
                return Err(Error::schema("array parameter requires items", path))
            }
            (_, Some(_)) => {
                return Err(Error::schema(
                    format!("items only allowed on array kind, found {}", kind),
                    format!("{path}.items"),
                ))
            }
            (_, None) => None,
        };

        let (properties, required) = if kind == ParameterKind::Object {
            let properties = match obj.get("properties") {
                None => None,
                Some(Value::Object(props)) => {
                    let mut out = Vec::with_capacity(props.len());
                    for (name, schema) in props {
                        let prop_path = format!("{path}.properties.{name}");
                        out.push((name.clone(), Self::from_value(schema, &prop_path)?));
                    }
                    Some(out)
                }
                Some(_) => {
                    return Err(Error::schema(
                        "properties must be a mapping",
                        format!("{path}.properties"),
                    ))
                }
            };
            let required = match obj.get("required") {
                None => None,
                Some(Value::Array(names)) => {
                    let mut out = Vec::with_capacity(names.len());
                    for name in names {
                        let name = name.as_str().ok_or_else(|| {
                            Error::schema(
                                "required entries must be strings",
                                format!("{path}.required"),
                            )
                        })?;
                        if !properties.iter().flatten().any(|(n, _)| n == name) {
                            return Err(Error::schema(
                                format!("required property '{}' is not declared", name),
                                format!("{path}.required"),
                            ));
                        }
                        out.push(name.to_string());
                    }
                    Some(out)
                }
                Some(_) => {
                    return Err(Error::schema(
                        "required must be a list",
                        format!("{path}.required"),
                    ))
                }
            };
            (properties, required)
        } else {
            if obj.contains_key("properties") || obj.contains_key("required") {
                tracing::warn!(path, kind = %kind, "ignoring properties/required on non-object parameter");
            }
            (None, None)
        };

        let extra = obj
            .iter()
            .filter(|(k, _)| {
                !matches!(
                    k.as_str(),
                    "type" | "description" | "enum" | "format" | "items" | "properties" | "required"
                )
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            kind,
            description,
            allowed_values,
            format,
            items,
            properties,
            required,
            extra,
        })
    }

    /// JSON form of this schema, properties in declaration order.
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("type".to_string(), Value::String(self.kind.as_str().to_string()));
        if let Some(description) = &self.description {
            obj.insert("description".to_string(), Value::String(description.clone()));
        }
        if let Some(values) = &self.allowed_values {
            obj.insert("enum".to_string(), Value::Array(values.clone()));
        }
        if let Some(format) = &self.format {
            obj.insert("format".to_string(), Value::String(format.clone()));
        }
        if let Some(items) = &self.items {
            obj.insert("items".to_string(), items.to_value());
        }
        if let Some(props) = &self.properties {
            let props: Map<String, Value> = props
                .iter()
                .map(|(name, schema)| (name.clone(), schema.to_value()))
                .collect();
            obj.insert("properties".to_string(), Value::Object(props));
        }
        if let Some(required) = &self.required {
            obj.insert(
                "required".to_string(),
                Value::Array(required.iter().cloned().map(Value::String).collect()),
            );
        }
        for (k, v) in &self.extra {
            obj.insert(k.clone(), v.clone());
        }
        Value::Object(obj)
    }
}

impl Serialize for ParameterSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ParameterSchema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value, "$").map_err(serde::de::Error::custom)
    }
}

/// Serialized function schema: the form converters produce and prompts embed.
///
/// It never carries the implementation.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
    pub supports_images: bool,
    pub has_image_output: bool,
}

impl FunctionSchema {
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::schema("function schema must be a mapping", "$"))?;

        let name = match obj.get("name") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::String(_)) => return Err(Error::schema("name must not be empty", "name")),
            Some(_) => return Err(Error::schema("name must be a string", "name")),
            None => return Err(Error::schema("missing name", "name")),
        };

        let description = match obj.get("description") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(Error::schema("description must be a string", "description")),
        };

        let parameters = match obj.get("parameters") {
            Some(params @ Value::Object(p)) => {
                // The root may omit its type; anything else than an object is rejected.
                let schema = if p.contains_key("type") {
                    ParameterSchema::from_value(params, "parameters")?
                } else {
                    let mut with_type = p.clone();
                    with_type.insert("type".to_string(), Value::String("object".to_string()));
                    ParameterSchema::from_value(&Value::Object(with_type), "parameters")?
                };
                if schema.kind != ParameterKind::Object {
                    return Err(Error::schema(
                        format!("parameters root must be an object, found {}", schema.kind),
                        "parameters.type",
                    ));
                }
                schema
            }
            Some(_) => return Err(Error::schema("parameters must be a mapping", "parameters")),
            None => return Err(Error::schema("missing parameters", "parameters")),
        };

        let flag = |key: &str| -> Result<bool> {
            match obj.get(key) {
                None | Some(Value::Null) => Ok(false),
                Some(Value::Bool(b)) => Ok(*b),
                Some(_) => Err(Error::schema(format!("{} must be a boolean", key), key)),
            }
        };

        Ok(Self {
            name,
            description,
            parameters,
            supports_images: flag("supports_images")?,
            has_image_output: flag("has_image_output")?,
        })
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("name".to_string(), Value::String(self.name.clone()));
        obj.insert("description".to_string(), Value::String(self.description.clone()));
        obj.insert("parameters".to_string(), self.parameters.to_value());
        if self.supports_images {
            obj.insert("supports_images".to_string(), Value::Bool(true));
        }
        if self.has_image_output {
            obj.insert("has_image_output".to_string(), Value::Bool(true));
        }
        Value::Object(obj)
    }
}

impl Serialize for FunctionSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FunctionSchema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_nested_schema_keeps_property_order() {
        let value = json!({
            "type": "object",
            "properties": {
                "zeta": {"type": "string"},
                "alpha": {"type": "array", "items": {"type": "integer"}},
                "mid": {"type": "object", "properties": {"x": {"type": "number"}}, "required": ["x"]}
            },
            "required": ["zeta"]
        });
        let schema = ParameterSchema::from_value(&value, "parameters").unwrap();
        let names: Vec<&str> = schema.property_names().collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(
            schema.property("alpha").unwrap().items.as_ref().unwrap().kind,
            ParameterKind::Integer
        );
        assert!(schema.property("mid").unwrap().is_required("x"));
        assert_eq!(schema.to_value(), value);
    }

    #[test]
    fn test_items_on_non_array_rejected() {
        let value = json!({"type": "string", "items": {"type": "string"}});
        let err = ParameterSchema::from_value(&value, "parameters.properties.tag").unwrap_err();
        let ctx = err.context().unwrap();
        assert_eq!(ctx.field_path.as_deref(), Some("parameters.properties.tag.items"));
    }

    #[test]
    fn test_array_without_items_rejected() {
        let value = json!({"type": "array"});
        assert!(ParameterSchema::from_value(&value, "p").is_err());
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let value = json!({"type": "image"});
        let err = ParameterSchema::from_value(&value, "p").unwrap_err();
        assert!(err.to_string().contains("unknown parameter type 'image'"));
    }

    #[test]
    fn test_required_must_be_declared() {
        let value = json!({"type": "object", "properties": {"a": {"type": "string"}}, "required": ["b"]});
        assert!(ParameterSchema::from_value(&value, "p").is_err());
    }

    #[test]
    fn test_extra_keys_round_trip() {
        let value = json!({"type": "integer", "minimum": 1, "maximum": 10});
        let schema = ParameterSchema::from_value(&value, "p").unwrap();
        assert_eq!(schema.extra.get("minimum"), Some(&json!(1)));
        assert_eq!(schema.to_value(), value);
    }

    #[test]
    fn test_function_schema_requires_name() {
        let err = FunctionSchema::from_value(&json!({"description": "d", "parameters": {"type": "object"}}))
            .unwrap_err();
        assert!(err.to_string().contains("missing name"));

        let err = FunctionSchema::from_value(&json!({"name": "  ", "parameters": {"type": "object"}}))
            .unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn test_function_schema_rejects_non_object_root() {
        let err = FunctionSchema::from_value(&json!({
            "name": "f",
            "description": "d",
            "parameters": {"type": "string"}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("parameters root must be an object"));

        assert!(FunctionSchema::from_value(&json!({"name": "f", "parameters": []})).is_err());
    }

    #[test]
    fn test_function_schema_root_type_defaults_to_object() {
        let schema = FunctionSchema::from_value(&json!({
            "name": "testFunction",
            "description": "Test function",
            "parameters": {"properties": {"param1": {"type": "string"}}}
        }))
        .unwrap();
        assert_eq!(schema.parameters.kind, ParameterKind::Object);
        assert!(!schema.supports_images);
    }

    #[test]
    fn test_absent_properties_stay_absent() {
        let value = json!({"name": "ping", "description": "", "parameters": {"type": "object"}});
        let schema = FunctionSchema::from_value(&value).unwrap();
        assert_eq!(schema.to_value(), value);
    }

    #[test]
    fn test_function_schema_image_flags() {
        let schema = FunctionSchema::from_value(&json!({
            "name": "detect_objects",
            "description": "Detect objects",
            "parameters": {
                "type": "object",
                "properties": {"image": {"type": "string", "format": "binary"}},
                "required": ["image"]
            },
            "supports_images": true
        }))
        .unwrap();
        assert!(schema.supports_images);
        assert!(schema.parameters.property("image").unwrap().is_binary());
        assert_eq!(schema.to_value()["supports_images"], json!(true));
        assert!(schema.to_value().get("has_image_output").is_none());
    }
}
