//! Conversation messages.

use crate::types::function::{FunctionCall, FunctionCallResult};
use crate::utils::timestamp;
use serde::{Deserialize, Serialize};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Function,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Function => "function",
        }
    }
}

/// One entry of a conversation.
///
/// `content` is serialized as `null` when absent so that "no text" and "empty text"
/// survive a round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_result: Option<FunctionCallResult>,
    pub timestamp: f64,
}

impl Message {
    pub fn new(role: Role, content: Option<String>) -> Self {
        Self {
            role,
            content,
            function_call: None,
            function_result: None,
            timestamp: timestamp(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, Some(text.into()))
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, Some(text.into()))
    }

    pub fn assistant_call(text: impl Into<String>, call: FunctionCall) -> Self {
        let mut msg = Self::assistant(text);
        msg.function_call = Some(call);
        msg
    }

    pub fn function_result(result: FunctionCallResult) -> Self {
        let mut msg = Self::new(Role::Function, Some(result.summary()));
        msg.function_result = Some(result);
        msg
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}
