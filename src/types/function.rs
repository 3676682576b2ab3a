//! Function definitions, calls and call results.

use crate::registry::Callable;
use crate::types::schema::{FunctionSchema, ParameterSchema};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A callable function as the registry stores it.
///
/// The definition is immutable once registered; re-registration under the same name replaces it.
#[derive(Clone)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    /// Root parameter schema, always of object kind.
    pub parameters: ParameterSchema,
    /// Binary (image) parameters are run through the image pipeline before invocation.
    pub supports_binary_input: bool,
    /// String results are turned into data URLs after invocation.
    pub returns_image: bool,
    pub implementation: Option<Arc<dyn Callable>>,
}

impl FunctionDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ParameterSchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            supports_binary_input: false,
            returns_image: false,
            implementation: None,
        }
    }

    /// Build a definition from its serialized schema. No implementation is bound.
    pub fn from_schema(schema: FunctionSchema) -> Self {
        Self {
            name: schema.name,
            description: schema.description,
            parameters: schema.parameters,
            supports_binary_input: schema.supports_images,
            returns_image: schema.has_image_output,
            implementation: None,
        }
    }

    pub fn with_implementation(mut self, implementation: Arc<dyn Callable>) -> Self {
        self.implementation = Some(implementation);
        self
    }

    pub fn with_binary_input(mut self, enabled: bool) -> Self {
        self.supports_binary_input = enabled;
        self
    }

    pub fn with_image_output(mut self, enabled: bool) -> Self {
        self.returns_image = enabled;
        self
    }

    /// Serialized projection, without the callable.
    pub fn to_schema(&self) -> FunctionSchema {
        FunctionSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
            supports_images: self.supports_binary_input,
            has_image_output: self.returns_image,
        }
    }

    pub fn to_value(&self) -> Value {
        self.to_schema().to_value()
    }

    /// Names of parameters carrying images (`format: binary`).
    pub fn binary_parameters(&self) -> Vec<&str> {
        self.parameters
            .properties
            .iter()
            .flatten()
            .filter(|(_, schema)| schema.is_binary())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

impl std::fmt::Debug for FunctionDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .field("supports_binary_input", &self.supports_binary_input)
            .field("returns_image", &self.returns_image)
            .field("has_implementation", &self.implementation.is_some())
            .finish()
    }
}

/// A function invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default, alias = "arguments")]
    pub parameters: Map<String, Value>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, parameters: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }
}

/// Uniform outcome of one function execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallResult {
    pub function_name: String,
    pub arguments: Map<String, Value>,
    /// `Some(Value::Null)` is a call that returned null; `None` is no result at all.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// A present key always yields `Some`, even when its value is `null`.
fn present_value<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl FunctionCallResult {
    pub fn success(
        function_name: impl Into<String>,
        arguments: Map<String, Value>,
        result: Value,
    ) -> Self {
        Self {
            function_name: function_name.into(),
            arguments,
            result: Some(result),
            error: None,
            duration_ms: None,
        }
    }

    pub fn failure(
        function_name: impl Into<String>,
        arguments: Map<String, Value>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            function_name: function_name.into(),
            arguments,
            result: None,
            error: Some(error.into()),
            duration_ms: None,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Text shown to the model after an action: the error, or the result
    /// (strings verbatim, other values pretty-printed).
    pub fn observation(&self) -> String {
        if let Some(error) = &self.error {
            return format!("Error: {}", error);
        }
        match &self.result {
            Some(Value::String(s)) => s.clone(),
            Some(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            None => "null".to_string(),
        }
    }

    /// One-line summary used as the content of a function message.
    pub fn summary(&self) -> String {
        match &self.error {
            Some(error) => format!("Function {} error: {}", self.function_name, error),
            None => {
                let rendered = match &self.result {
                    Some(Value::String(s)) => s.clone(),
                    Some(value) => value.to_string(),
                    None => "null".to_string(),
                };
                format!("Function {} returned: {}", self.function_name, rendered)
            }
        }
    }
}
