use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path that caused the error (e.g., "parameters.properties.location.items")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected kind, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "registry", "image_pipeline")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the function-calling runtime.
///
/// Only [`Error::ModelInvocation`], model-side [`Error::Timeout`] and [`Error::Cancelled`]
/// ever end a ReAct loop abnormally. Everything else is folded into a
/// [`FunctionCallResult`](crate::types::FunctionCallResult) and shown to the model.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Schema error: {message}{}", format_context(.context))]
    Schema {
        message: String,
        context: ErrorContext,
    },

    #[error("Function '{name}' is already registered")]
    DuplicateName { name: String },

    #[error("Argument validation failed for '{function}': {}", .errors.join("; "))]
    Validation {
        function: String,
        errors: Vec<String>,
    },

    #[error("Function '{function}' failed: {message}")]
    Execution { function: String, message: String },

    #[error("Model invocation failed: {message}{}", format_context(.context))]
    ModelInvocation {
        message: String,
        context: ErrorContext,
    },

    #[error("Failed to load image from {reference}: {reason}")]
    ImageLoad { reference: String, reason: String },

    #[error("Image format error: {0}")]
    ImageFormat(String),

    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Execution cancelled")]
    Cancelled,

    #[error("Conversation '{0}' already exists")]
    ConversationExists(String),

    #[error("Conversation '{0}' not found")]
    ConversationNotFound(String),

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a schema error rooted at a field path.
    pub fn schema(msg: impl Into<String>, field_path: impl Into<String>) -> Self {
        Error::Schema {
            message: msg.into(),
            context: ErrorContext::new()
                .with_field_path(field_path)
                .with_source("registry"),
        }
    }

    /// Create a model invocation error with structured context
    pub fn model_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::ModelInvocation {
            message: msg.into(),
            context,
        }
    }

    /// Create a configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn image_load(reference: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::ImageLoad {
            reference: reference.into(),
            reason: reason.to_string(),
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Schema { context, .. }
            | Error::ModelInvocation { context, .. }
            | Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Whether this error ends a ReAct loop instead of being reported to the model.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Error::ModelInvocation { .. } | Error::Cancelled | Error::Timeout { .. }
        )
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(value: serde_yaml::Error) -> Self {
        Error::configuration_with_context(
            value.to_string(),
            ErrorContext::new().with_source("yaml"),
        )
    }
}

impl From<::image::ImageError> for Error {
    fn from(value: ::image::ImageError) -> Self {
        Error::ImageFormat(value.to_string())
    }
}
