//! Core data types of the function-calling runtime.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ParameterSchema`] | Typed schema of one parameter, nested for arrays/objects |
//! | [`FunctionSchema`] | Serialized function schema (no callable) |
//! | [`FunctionDefinition`] | Registered function with its bound callable |
//! | [`FunctionCall`] | `{name, parameters}` requested by the model |
//! | [`FunctionCallResult`] | Uniform success/failure outcome of an execution |
//! | [`Message`] | Role-tagged conversation entry |
//!
//! ## Example
//!
//! ```rust
//! use ai_fn_runtime::types::{FunctionDefinition, ParameterSchema};
//!
//! let def = FunctionDefinition::new(
//!     "get_weather",
//!     "Get current weather for a location",
//!     ParameterSchema::object()
//!         .with_property("location", ParameterSchema::string(), true),
//! );
//! assert_eq!(def.to_value()["parameters"]["required"][0], "location");
//! ```

pub mod function;
pub mod message;
pub mod schema;

pub use function::{FunctionCall, FunctionCallResult, FunctionDefinition};
pub use message::{Message, Role};
pub use schema::{FunctionSchema, ParameterKind, ParameterSchema, BINARY_FORMAT};
