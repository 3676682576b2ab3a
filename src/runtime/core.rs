use crate::config::RuntimeConfig;
use crate::conversation::{ConversationManager, SharedConversation};
use crate::executor::FunctionExecutor;
use crate::model::ModelProvider;
use crate::parser::{CallEncoding, ResponseParser};
use crate::prompt::function_calling_prompt;
use crate::react::{
    ExecutionHistory, ExecutionRecord, LoopOutcome, OutcomeKind, ReactAgent, ReactReport,
};
use crate::registry::{Callable, FunctionRegistry};
use crate::types::{FunctionCallResult, FunctionDefinition};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Function-calling runtime.
///
/// Cheap to share behind an `Arc`: every method takes `&self`, the registry sits behind a
/// read-write lock and each conversation behind its own mutex.
pub struct Runtime {
    pub(crate) registry: Arc<RwLock<FunctionRegistry>>,
    pub(crate) model: Arc<dyn ModelProvider>,
    pub(crate) config: RuntimeConfig,
    pub(crate) conversations: ConversationManager,
    pub(crate) history: ExecutionHistory,
    pub(crate) executor: FunctionExecutor,
    pub(crate) agent: ReactAgent,
}

impl Runtime {
    pub fn builder() -> super::RuntimeBuilder {
        super::RuntimeBuilder::new()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn conversations(&self) -> &ConversationManager {
        &self.conversations
    }

    pub fn history(&self) -> &ExecutionHistory {
        &self.history
    }

    pub fn model(&self) -> &Arc<dyn ModelProvider> {
        &self.model
    }

    /// Shared handle to the registry, for hosts that register from other tasks.
    pub fn registry(&self) -> Arc<RwLock<FunctionRegistry>> {
        Arc::clone(&self.registry)
    }

    pub async fn register_function(&self, def: FunctionDefinition) -> Result<()> {
        self.registry.write().await.register(def)
    }

    pub async fn register_serialized(
        &self,
        data: &Value,
        implementation: Option<Arc<dyn Callable>>,
    ) -> Result<()> {
        self.registry
            .write()
            .await
            .register_serialized(data, implementation)
    }

    pub async fn register_json(
        &self,
        text: &str,
        implementation: Option<Arc<dyn Callable>>,
    ) -> Result<()> {
        self.registry.write().await.register_json(text, implementation)
    }

    pub async fn register_file(
        &self,
        path: impl AsRef<Path>,
        implementation: Option<Arc<dyn Callable>>,
    ) -> Result<()> {
        let text = tokio::fs::read_to_string(path).await?;
        self.register_json(&text, implementation).await
    }

    pub async fn register_many(
        &self,
        schemas: &[Value],
        implementations: HashMap<String, Arc<dyn Callable>>,
    ) -> Result<Vec<String>> {
        self.registry
            .write()
            .await
            .register_many(schemas, implementations)
    }

    pub async fn remove_function(&self, name: &str) -> Option<Arc<FunctionDefinition>> {
        self.registry.write().await.remove(name)
    }

    pub async fn catalog(&self) -> Vec<Arc<FunctionDefinition>> {
        self.registry.read().await.catalog()
    }

    pub async fn catalog_serialized(&self) -> Vec<Value> {
        self.registry.read().await.catalog_serialized()
    }

    /// Prompt asking the model for one call in `encoding` over the current catalog.
    pub async fn function_calling_prompt(&self, query: &str, encoding: CallEncoding) -> String {
        function_calling_prompt(&self.catalog_serialized().await, encoding, query)
    }

    /// Create a conversation under a fresh id and return the id.
    pub async fn new_conversation(&self, system_prompt: Option<String>) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.conversations.create(id.clone(), system_prompt).await?;
        Ok(id)
    }

    /// Single-shot function calling: prompt, generate, parse with `encoding` and execute the
    /// call when one is found.
    ///
    /// Returns the execution result (if a call was found) and the raw model response.
    pub async fn call_once(
        &self,
        query: &str,
        encoding: CallEncoding,
    ) -> Result<(Option<FunctionCallResult>, String)> {
        let prompt = self.function_calling_prompt(query, encoding).await;
        let timeout = self.config.model_timeout();
        let response = match tokio::time::timeout(timeout, self.model.generate(&prompt, &[])).await {
            Ok(response) => response?,
            Err(_) => {
                return Err(Error::Timeout {
                    operation: "model generation".to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        };

        let parsed = match ResponseParser::only(encoding).parse(&response) {
            Ok(parsed) => parsed,
            Err(failure) => {
                info!(encoding = %encoding, reason = %failure, "model response held no call");
                self.record(ExecutionRecord::new(query, response.trim(), OutcomeKind::NoCall, 1))
                    .await;
                return Ok((None, response));
            }
        };

        let def = self.registry.read().await.lookup(&parsed.call.name);
        let result = self.executor.execute_resolved(def, &parsed.call).await;
        let record = ExecutionRecord::new(query, result.observation(), OutcomeKind::FunctionCalled, 1)
            .with_function_call(parsed.call);
        self.record(record).await;
        Ok((Some(result), response))
    }

    /// Run the ReAct loop for `query` in conversation `conversation_id`, creating the
    /// conversation when needed, with the configured turn budget.
    pub async fn execute(&self, conversation_id: &str, query: &str) -> ReactReport {
        self.execute_with(
            conversation_id,
            query,
            self.config.max_turns,
            CancellationToken::new(),
        )
        .await
    }

    /// Like [`Runtime::execute`] with an explicit turn budget and cancellation token.
    ///
    /// The conversation stays locked for the whole run, so runs on the same id are
    /// serialized while different ids proceed concurrently.
    pub async fn execute_with(
        &self,
        conversation_id: &str,
        query: &str,
        max_turns: usize,
        cancel: CancellationToken,
    ) -> ReactReport {
        let conversation: SharedConversation = self.conversations.get_or_create(conversation_id).await;
        let report = {
            let mut conv = conversation.lock().await;
            self.agent.run(&mut conv, query, max_turns, &cancel).await
        };
        if let LoopOutcome::Failed(e) = &report.outcome {
            warn!(conversation_id, error = %e, "react loop failed");
        }
        self.record(report.record(query)).await;
        report
    }

    async fn record(&self, record: ExecutionRecord) {
        let Some(path) = &self.config.history_path else {
            self.history.append(record);
            return;
        };
        if let Err(e) = self.history.append_persisted(path, record).await {
            warn!(path = %path.display(), error = %e, "failed to persist execution record");
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("model", &self.model.name())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::ScriptedModel;
    use crate::parser::CallEncoding;
    use crate::react::OutcomeKind;
    use crate::registry::{sync_fn, CallArgs};
    use crate::runtime::Runtime;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_call_once_json() {
        let model = Arc::new(ScriptedModel::new([
            r#"{"name": "add", "parameters": {"a": 2, "b": "3"}}"#,
        ]));
        let runtime = Runtime::builder().model(model).build().unwrap();
        runtime
            .register_serialized(
                &json!({
                    "name": "add",
                    "description": "Add two integers",
                    "parameters": {
                        "type": "object",
                        "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}},
                        "required": ["a", "b"]
                    }
                }),
                Some(sync_fn(|args: &CallArgs| {
                    Ok(json!(args.i64("a").unwrap_or(0) + args.i64("b").unwrap_or(0)))
                })),
            )
            .await
            .unwrap();

        let (result, raw) = runtime.call_once("2 + 3?", CallEncoding::Json).await.unwrap();
        assert!(raw.contains("\"add\""));
        assert_eq!(result.unwrap().result, Some(json!(5)));
        let records = runtime.history().records();
        assert_eq!(records[0].outcome, OutcomeKind::FunctionCalled);
    }

    #[tokio::test]
    async fn test_call_once_without_call() {
        let model = Arc::new(ScriptedModel::new(["I cannot help with that."]));
        let runtime = Runtime::builder().model(model).build().unwrap();
        let (result, raw) = runtime
            .call_once("hello", CallEncoding::CallExpression)
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(raw, "I cannot help with that.");
        assert_eq!(runtime.history().records()[0].outcome, OutcomeKind::NoCall);
    }

    #[tokio::test]
    async fn test_new_conversation_ids_are_unique() {
        let runtime = Runtime::builder()
            .model(Arc::new(ScriptedModel::default()))
            .build()
            .unwrap();
        let a = runtime.new_conversation(None).await.unwrap();
        let b = runtime.new_conversation(None).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(runtime.conversations().len().await, 2);
    }
}
