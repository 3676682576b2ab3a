//! Model providers: the text-generation seam of the runtime.
//!
//! | Provider | Use |
//! |----------|-----|
//! | [`HttpModelProvider`] | OpenAI-compatible `/completions` endpoint |
//! | [`ScriptedModel`] | Queued replies for tests and demos |

mod http;
mod scripted;

pub use http::HttpModelProvider;
pub use scripted::{ScriptedModel, ScriptedReply};

use crate::Result;
use async_trait::async_trait;

/// A text-completion model.
///
/// Implementations must be shareable across concurrent loop runs.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Complete `prompt`, stopping before any of `stop`.
    async fn generate(&self, prompt: &str, stop: &[String]) -> Result<String>;

    fn name(&self) -> &str {
        "model"
    }
}

/// Cut `text` at the earliest stop sequence.
///
/// Providers that ignore `stop` still produce usable turns this way.
pub fn apply_stop(text: &str, stop: &[String]) -> String {
    let cut = stop
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min()
        .unwrap_or(text.len());
    text[..cut].to_string()
}
