//! Host callables bound to function definitions.

use crate::image::LoadedImage;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Validated arguments handed to a callable.
///
/// Binary parameters are available both as their normalized base64 string in
/// [`CallArgs::values`] and as a decoded image through [`CallArgs::image`].
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    values: Map<String, Value>,
    images: HashMap<String, LoadedImage>,
}

impl CallArgs {
    pub fn new(values: Map<String, Value>) -> Self {
        Self {
            values,
            images: HashMap::new(),
        }
    }

    pub fn with_images(mut self, images: HashMap<String, LoadedImage>) -> Self {
        self.images = images;
        self
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_values(self) -> Map<String, Value> {
        self.values
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.values.get(name).and_then(Value::as_i64)
    }

    pub fn f64(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(Value::as_f64)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.values.get(name).and_then(Value::as_bool)
    }

    /// String argument that the function cannot do without.
    pub fn require_str(&self, name: &str) -> anyhow::Result<&str> {
        self.str(name)
            .ok_or_else(|| anyhow::anyhow!("missing string argument '{}'", name))
    }

    pub fn image(&self, name: &str) -> Option<&LoadedImage> {
        self.images.get(name)
    }
}

/// A host function the runtime can invoke.
///
/// Failures are reported as `anyhow::Error` and turned into an error result by the executor.
#[async_trait]
pub trait Callable: Send + Sync {
    async fn call(&self, args: CallArgs) -> anyhow::Result<Value>;
}

struct SyncFn<F>(Arc<F>);

#[async_trait]
impl<F> Callable for SyncFn<F>
where
    F: Fn(&CallArgs) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    async fn call(&self, args: CallArgs) -> anyhow::Result<Value> {
        let f = Arc::clone(&self.0);
        // Host closures may block, keep them off the async workers.
        tokio::task::spawn_blocking(move || f(&args))
            .await
            .map_err(|e| anyhow::anyhow!("function panicked or was aborted: {}", e))?
    }
}

struct AsyncFn<F>(F);

#[async_trait]
impl<F, Fut> Callable for AsyncFn<F>
where
    F: Fn(CallArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn call(&self, args: CallArgs) -> anyhow::Result<Value> {
        (self.0)(args).await
    }
}

/// Wrap a blocking closure as a [`Callable`].
pub fn sync_fn<F>(f: F) -> Arc<dyn Callable>
where
    F: Fn(&CallArgs) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    Arc::new(SyncFn(Arc::new(f)))
}

/// Wrap an async closure as a [`Callable`].
pub fn async_fn<F, Fut>(f: F) -> Arc<dyn Callable>
where
    F: Fn(CallArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(AsyncFn(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> CallArgs {
        CallArgs::new(value.as_object().cloned().unwrap_or_default())
    }

    #[tokio::test]
    async fn test_sync_fn_runs() {
        let add = sync_fn(|a: &CallArgs| {
            let x = a.i64("x").unwrap_or(0);
            let y = a.i64("y").unwrap_or(0);
            Ok(json!(x + y))
        });
        let out = add.call(args(json!({"x": 2, "y": 3}))).await.unwrap();
        assert_eq!(out, json!(5));
    }

    #[tokio::test]
    async fn test_async_fn_propagates_error() {
        let f = async_fn(|a: CallArgs| async move {
            let city = a.require_str("city")?.to_string();
            Ok(json!(city))
        });
        let err = f.call(args(json!({}))).await.unwrap_err();
        assert!(err.to_string().contains("missing string argument 'city'"));
    }

    #[tokio::test]
    async fn test_sync_fn_panic_becomes_error() {
        let f = sync_fn(|_: &CallArgs| -> anyhow::Result<Value> { panic!("kaboom") });
        assert!(f.call(CallArgs::default()).await.is_err());
    }
}
