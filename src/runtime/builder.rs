use crate::config::RuntimeConfig;
use crate::conversation::ConversationManager;
use crate::executor::{ArgumentValidator, FunctionExecutor};
use crate::image::ImageProcessor;
use crate::model::ModelProvider;
use crate::react::{ExecutionHistory, ReactAgent};
use crate::registry::FunctionRegistry;
use crate::runtime::core::Runtime;
use crate::{Error, ErrorContext, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Builder for [`Runtime`].
///
/// Configuration starts from [`RuntimeConfig::from_env`]; explicit setters win.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    model: Option<Arc<dyn ModelProvider>>,
    registry: Option<FunctionRegistry>,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config: RuntimeConfig::from_env(),
            model: None,
            registry: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Load configuration from a YAML file, then re-apply environment overrides.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Result<Self> {
        let mut config = RuntimeConfig::from_yaml_file(path.into())?;
        config.apply_env();
        self.config = config;
        Ok(self)
    }

    pub fn model(mut self, model: Arc<dyn ModelProvider>) -> Self {
        self.model = Some(model);
        self
    }

    /// Start from an already populated registry. Its duplicate policy is kept.
    pub fn registry(mut self, registry: FunctionRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn max_turns(mut self, max_turns: usize) -> Self {
        self.config.max_turns = max_turns;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn strict_arguments(mut self, strict: bool) -> Self {
        self.config.strict_arguments = strict;
        self
    }

    /// Append every execution record to this JSON file.
    pub fn history_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.history_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<Runtime> {
        let model = self.model.ok_or_else(|| {
            Error::configuration_with_context(
                "a model provider is required",
                ErrorContext::new().with_source("runtime_builder"),
            )
        })?;
        let config = self.config;
        if config.max_turns == 0 {
            debug!("max_turns is 0; every loop run ends before the first model call");
        }

        let registry = Arc::new(RwLock::new(
            self.registry
                .unwrap_or_else(|| FunctionRegistry::with_policy(config.duplicate_policy)),
        ));
        let executor = FunctionExecutor::new(
            ArgumentValidator::new(config.strict_arguments),
            ImageProcessor::new(config.image_timeout(), config.image.clone()),
            config.function_timeout(),
        );
        let agent = ReactAgent::new(Arc::clone(&registry), Arc::clone(&model), executor.clone())
            .with_model_timeout(config.model_timeout())
            .with_stop_sequences(config.stop_sequences.clone());

        Ok(Runtime {
            registry,
            model,
            conversations: ConversationManager::new(config.system_prompt.clone()),
            history: ExecutionHistory::new(),
            executor,
            agent,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_model() {
        let err = RuntimeBuilder::new().build().unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
