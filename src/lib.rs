//! # ai-fn-runtime
//!
//! Function-calling runtime for language models: register host functions with typed
//! schemas, extract calls from free-form model output, execute them with argument
//! validation, and drive multi-turn ReAct (Thought / Action / Observation) loops over
//! persistent conversations.
//!
//! ## Overview
//!
//! A [`Runtime`] owns a [`FunctionRegistry`], a [`ModelProvider`] handle, a
//! [`ConversationManager`] and an [`ExecutionHistory`]. Each loop run appends the user
//! query to its conversation and steps a small state machine until the model gives a final
//! answer, the turn budget runs out, the model fails, or the run is cancelled. Failures
//! below the loop (parse errors, unknown functions, bad arguments, function errors) become
//! observations the model can react to.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_fn_runtime::{sync_fn, CallArgs, FunctionDefinition, ParameterSchema, Runtime, ScriptedModel};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> ai_fn_runtime::Result<()> {
//!     let model = Arc::new(ScriptedModel::new([
//!         " I need the weather.\nAction: get_weather\nAction Input: {\"location\": \"Paris\"}",
//!         " Got it.\nFinal Answer: It is sunny in Paris.",
//!     ]));
//!     let runtime = Runtime::builder().model(model).build()?;
//!
//!     runtime
//!         .register_function(
//!             FunctionDefinition::new(
//!                 "get_weather",
//!                 "Get the current weather for a location",
//!                 ParameterSchema::object().with_property("location", ParameterSchema::string(), true),
//!             )
//!             .with_implementation(sync_fn(|args: &CallArgs| Ok(json!({"forecast": "sunny", "location": args.str("location")})))),
//!         )
//!         .await?;
//!
//!     let report = runtime.execute("demo", "What's the weather in Paris?").await;
//!     println!("{}", report.outcome.summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Schemas, definitions, calls, results and messages |
//! | [`registry`] | Function registry and callable adapters |
//! | [`parser`] | JSON / call-expression extraction and ReAct step parsing |
//! | [`executor`] | Argument validation and function execution |
//! | [`conversation`] | Conversation state and the conversation manager |
//! | [`react`] | ReAct state machine and execution history |
//! | [`image`] | Image loading, normalization and encoding |
//! | [`model`] | Model provider trait, HTTP provider and scripted provider |
//! | [`runtime`] | [`Runtime`] facade and [`RuntimeBuilder`] |

pub mod config;
pub mod conversation;
pub mod executor;
pub mod image;
pub mod model;
pub mod parser;
pub mod prompt;
pub mod react;
pub mod registry;
pub mod runtime;
pub mod types;
pub mod utils;

mod error;

pub use crate::config::RuntimeConfig;
pub use crate::conversation::{Conversation, ConversationManager, SharedConversation};
pub use crate::error::{Error, ErrorContext};
pub use crate::executor::{ArgumentError, ArgumentValidator, FunctionExecutor};
pub use crate::image::{ImageOptions, ImageProcessor, LoadedImage};
pub use crate::model::{HttpModelProvider, ModelProvider, ScriptedModel, ScriptedReply};
pub use crate::parser::{
    parse_call, parse_react_step, CallEncoding, ParseFailure, ParsedCall, ResponseParser,
};
pub use crate::react::{
    ExecutionHistory, ExecutionRecord, LoopOutcome, LoopState, OutcomeKind, ReactAgent,
    ReactReport,
};
pub use crate::registry::{async_fn, sync_fn, CallArgs, Callable, FunctionRegistry, RegistrationPolicy};
pub use crate::runtime::{Runtime, RuntimeBuilder};
pub use crate::types::{
    FunctionCall, FunctionCallResult, FunctionDefinition, FunctionSchema, Message, ParameterKind,
    ParameterSchema, Role,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
