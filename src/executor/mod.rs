//! Function executor: resolve, validate, invoke, and wrap the outcome.
//!
//! Nothing below the executor escapes as an error. Unknown functions, invalid
//! arguments, image failures, callable errors and timeouts all come back as a
//! [`FunctionCallResult`] with `error` set.

mod validation;

pub use validation::{ArgumentError, ArgumentValidator};

use crate::image::{ImageProcessor, IMAGE_OPTIONS_KEY};
use crate::registry::{CallArgs, FunctionRegistry};
use crate::types::{FunctionCall, FunctionCallResult, FunctionDefinition};
use crate::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct FunctionExecutor {
    validator: ArgumentValidator,
    images: ImageProcessor,
    function_timeout: Duration,
}

impl Default for FunctionExecutor {
    fn default() -> Self {
        Self::new(
            ArgumentValidator::lenient(),
            ImageProcessor::default(),
            Duration::from_secs(30),
        )
    }
}

impl FunctionExecutor {
    pub fn new(
        validator: ArgumentValidator,
        images: ImageProcessor,
        function_timeout: Duration,
    ) -> Self {
        Self {
            validator,
            images,
            function_timeout,
        }
    }

    pub fn images(&self) -> &ImageProcessor {
        &self.images
    }

    pub fn function_timeout(&self) -> Duration {
        self.function_timeout
    }

    /// Resolve `call` in `registry` and execute it.
    pub async fn execute(&self, registry: &FunctionRegistry, call: &FunctionCall) -> FunctionCallResult {
        self.execute_resolved(registry.lookup(&call.name), call).await
    }

    /// Execute against an already resolved definition (`None` = unknown function).
    pub async fn execute_resolved(
        &self,
        def: Option<Arc<FunctionDefinition>>,
        call: &FunctionCall,
    ) -> FunctionCallResult {
        let started = Instant::now();
        let result = self.run(def.as_deref(), call).await;
        let duration_ms = started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64;

        let result = match def.as_deref() {
            Some(def) => self.images.postprocess_result(def, result).await,
            None => result,
        };

        info!(
            function = %call.name,
            success = result.is_success(),
            duration_ms,
            "function executed"
        );
        result.with_duration_ms(duration_ms)
    }

    async fn run(&self, def: Option<&FunctionDefinition>, call: &FunctionCall) -> FunctionCallResult {
        let name = call.name.as_str();
        let Some(def) = def else {
            warn!(function = %name, "unknown function requested");
            return FunctionCallResult::failure(name, call.parameters.clone(), format!("unknown function: {}", name));
        };
        let Some(implementation) = def.implementation.clone() else {
            return FunctionCallResult::failure(
                name,
                call.parameters.clone(),
                format!("function '{}' has no implementation", name),
            );
        };

        let mut raw = call.parameters.clone();
        let image_options = if def.supports_binary_input && def.parameters.property(IMAGE_OPTIONS_KEY).is_none() {
            raw.remove(IMAGE_OPTIONS_KEY)
        } else {
            None
        };

        let mut args = match self.validator.validate(&def.parameters, &raw) {
            Ok(args) => args,
            Err(errors) => {
                let err = Error::Validation {
                    function: name.to_string(),
                    errors: errors.iter().map(ToString::to_string).collect(),
                };
                warn!(function = %name, errors = errors.len(), "argument validation failed");
                return FunctionCallResult::failure(name, call.parameters.clone(), err.to_string());
            }
        };
        let resolved = args.clone();
        if let Some(options) = image_options {
            args.insert(IMAGE_OPTIONS_KEY.to_string(), options);
        }

        let (args, images) = match self.images.preprocess_call(def, args).await {
            Ok(prepared) => prepared,
            Err(e) => return FunctionCallResult::failure(name, resolved, e.to_string()),
        };

        let invocation = implementation.call(CallArgs::new(args).with_images(images));
        match tokio::time::timeout(self.function_timeout, invocation).await {
            Ok(Ok(value)) => FunctionCallResult::success(name, resolved, value),
            Ok(Err(e)) => {
                let err = Error::Execution {
                    function: name.to_string(),
                    message: format!("{:#}", e),
                };
                FunctionCallResult::failure(name, resolved, err.to_string())
            }
            Err(_) => {
                let err = Error::Timeout {
                    operation: format!("function '{}'", name),
                    timeout_ms: self.function_timeout.as_millis() as u64,
                };
                FunctionCallResult::failure(name, resolved, err.to_string())
            }
        }
    }
}
