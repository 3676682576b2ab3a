//! Conversation state: an append-only log of role-tagged messages.

mod manager;

pub use manager::{ConversationManager, SharedConversation};

use crate::types::{FunctionCall, FunctionCallResult, Message};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default system prompt for conversations created without one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// Ordered messages plus the system prompt fixed at creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    system_prompt: Option<String>,
    #[serde(default)]
    messages: Vec<Message>,
}

/// One entry of the model-facing projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FormattedMessage<'a> {
    pub role: &'a str,
    pub content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<&'a FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_result: Option<&'a FunctionCallResult>,
}

impl Conversation {
    pub fn new(system_prompt: Option<String>) -> Self {
        Self {
            system_prompt,
            messages: Vec::new(),
        }
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn add_user(&mut self, text: impl Into<String>) {
        self.push(Message::user(text));
    }

    pub fn add_assistant(&mut self, text: impl Into<String>, call: Option<FunctionCall>) {
        let msg = match call {
            Some(call) => Message::assistant_call(text, call),
            None => Message::assistant(text),
        };
        self.push(msg);
    }

    pub fn add_function_result(&mut self, result: FunctionCallResult) {
        self.push(Message::function_result(result));
    }

    /// Drop every message; the system prompt stays.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Model-facing view: the system entry first (when set), then messages in order.
    ///
    /// The iterator is lazy and can be cloned to walk the projection again.
    pub fn formatted_for_model(&self) -> impl Iterator<Item = FormattedMessage<'_>> + Clone + '_ {
        let system = self.system_prompt.as_deref().map(|prompt| FormattedMessage {
            role: "system",
            content: Some(prompt),
            function_call: None,
            function_result: None,
        });
        system.into_iter().chain(self.messages.iter().map(|m| FormattedMessage {
            role: m.role.as_str(),
            content: m.content.as_deref(),
            function_call: m.function_call.as_ref(),
            function_result: m.function_result.as_ref(),
        }))
    }

    pub fn to_serialized(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_serialized(value: &Value) -> Result<Self> {
        Ok(Self::deserialize(value)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
