use super::{apply_stop, ModelProvider};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// One queued reply of a [`ScriptedModel`].
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    /// Fail the call with a model invocation error.
    Fail(String),
    /// Reply after a delay (for timeout and cancellation tests).
    Delayed(Duration, String),
}

/// In-process model returning queued replies in order and recording every prompt.
///
/// Once the queue is empty every call fails.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ScriptedReply>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_replies(replies.into_iter().map(|s| ScriptedReply::Text(s.into())))
    }

    pub fn from_replies(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, reply: ScriptedReply) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl ModelProvider for ScriptedModel {
    async fn generate(&self, prompt: &str, stop: &[String]) -> Result<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());
        let next = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match next {
            Some(ScriptedReply::Text(text)) => Ok(apply_stop(&text, stop)),
            Some(ScriptedReply::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(apply_stop(&text, stop))
            }
            Some(ScriptedReply::Fail(message)) => Err(Error::model_with_context(
                message,
                ErrorContext::new().with_source("scripted_model"),
            )),
            None => Err(Error::model_with_context(
                "script exhausted",
                ErrorContext::new().with_source("scripted_model"),
            )),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_in_order_then_exhausted() {
        let model = ScriptedModel::new(["one", "two Observation: x"]);
        let stop = vec!["Observation:".to_string()];
        assert_eq!(model.generate("p1", &stop).await.unwrap(), "one");
        assert_eq!(model.generate("p2", &stop).await.unwrap(), "two ");
        assert!(model.generate("p3", &stop).await.is_err());
        assert_eq!(model.prompts(), vec!["p1", "p2", "p3"]);
    }
}
