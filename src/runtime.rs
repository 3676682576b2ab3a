//! Runtime facade tying the registry, model, executor and conversations together.
//!
//! Keep the public surface small: build with [`RuntimeBuilder`], register functions, then
//! drive either the ReAct loop ([`Runtime::execute`]) or a single-shot call
//! ([`Runtime::call_once`]).

pub mod builder;
pub mod core;

pub use builder::RuntimeBuilder;
pub use core::Runtime;
