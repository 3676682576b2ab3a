//! Runtime configuration.
//!
//! Values come from defaults, then an optional YAML document, then environment overrides:
//!
//! - `FN_RUNTIME_MAX_TURNS` (default 5)
//! - `FN_RUNTIME_MODEL_TIMEOUT_MS` (default 120000)
//! - `FN_RUNTIME_FUNCTION_TIMEOUT_MS` (default 30000)
//! - `FN_RUNTIME_IMAGE_TIMEOUT_MS` (default 30000)
//! - `FN_RUNTIME_STRICT_ARGUMENTS` (`1`/`true` to reject undeclared arguments)
//! - `FN_RUNTIME_DUPLICATE_POLICY` (`overwrite` or `reject`)

use crate::conversation::DEFAULT_SYSTEM_PROMPT;
use crate::image::ImageOptions;
use crate::registry::RegistrationPolicy;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Stop sequence keeping the model from writing its own observations.
pub const OBSERVATION_STOP: &str = "Observation:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Model calls allowed per loop run.
    pub max_turns: usize,
    pub model_timeout_ms: u64,
    pub function_timeout_ms: u64,
    pub image_timeout_ms: u64,
    /// Reject arguments the schema does not declare.
    pub strict_arguments: bool,
    pub duplicate_policy: RegistrationPolicy,
    /// System prompt for conversations created without one.
    pub system_prompt: Option<String>,
    pub stop_sequences: Vec<String>,
    pub image: ImageOptions,
    /// When set, the execution history is appended to this JSON file after every run.
    pub history_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_turns: 5,
            model_timeout_ms: 120_000,
            function_timeout_ms: 30_000,
            image_timeout_ms: 30_000,
            strict_arguments: false,
            duplicate_policy: RegistrationPolicy::Overwrite,
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            stop_sequences: vec![OBSERVATION_STOP.to_string()],
            image: ImageOptions::default(),
            history_path: None,
        }
    }
}

impl RuntimeConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Apply `FN_RUNTIME_*` overrides. Unparseable values are ignored with a warning.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `FN_RUNTIME_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_override::<usize>(&lookup, "FN_RUNTIME_MAX_TURNS") {
            self.max_turns = v;
        }
        if let Some(v) =
            parse_override::<u64>(&lookup, "FN_RUNTIME_MODEL_TIMEOUT_MS").filter(|ms| *ms > 0)
        {
            self.model_timeout_ms = v;
        }
        if let Some(v) =
            parse_override::<u64>(&lookup, "FN_RUNTIME_FUNCTION_TIMEOUT_MS").filter(|ms| *ms > 0)
        {
            self.function_timeout_ms = v;
        }
        if let Some(v) =
            parse_override::<u64>(&lookup, "FN_RUNTIME_IMAGE_TIMEOUT_MS").filter(|ms| *ms > 0)
        {
            self.image_timeout_ms = v;
        }
        if let Some(v) = lookup("FN_RUNTIME_STRICT_ARGUMENTS") {
            self.strict_arguments = matches!(v.trim(), "1" | "true" | "TRUE" | "True" | "yes");
        }
        if let Some(v) = parse_override::<RegistrationPolicy>(&lookup, "FN_RUNTIME_DUPLICATE_POLICY") {
            self.duplicate_policy = v;
        }
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_strict_arguments(mut self, strict: bool) -> Self {
        self.strict_arguments = strict;
        self
    }

    pub fn with_duplicate_policy(mut self, policy: RegistrationPolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_millis(self.model_timeout_ms)
    }

    pub fn function_timeout(&self) -> Duration {
        Duration::from_millis(self.function_timeout_ms)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_millis(self.image_timeout_ms)
    }
}

fn parse_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}
