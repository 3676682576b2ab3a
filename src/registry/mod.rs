//! Function registry: owns the definitions the model may call.
//!
//! The registry is an explicitly owned value. Catalog order is first-registration
//! order; replacing a definition keeps its original position.

mod callable;

pub use callable::{async_fn, sync_fn, CallArgs, Callable};

use crate::types::{FunctionDefinition, FunctionSchema};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// What `register` does when the name is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationPolicy {
    /// Last write wins.
    #[default]
    Overwrite,
    /// Fail with [`Error::DuplicateName`].
    Reject,
}

impl std::str::FromStr for RegistrationPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "reject" => Ok(Self::Reject),
            other => Err(Error::configuration_with_context(
                format!("unknown duplicate policy '{}'", other),
                crate::ErrorContext::new().with_details("expected 'overwrite' or 'reject'"),
            )),
        }
    }
}

/// Name → definition map with stable catalog order.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<FunctionDefinition>>,
    order: Vec<String>,
    policy: RegistrationPolicy,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: RegistrationPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> RegistrationPolicy {
        self.policy
    }

    /// Register a definition under its name.
    pub fn register(&mut self, def: FunctionDefinition) -> Result<()> {
        if def.name.trim().is_empty() {
            return Err(Error::schema("name must not be empty", "name"));
        }
        let name = def.name.clone();
        let replaced = self.functions.contains_key(&name);
        if replaced && self.policy == RegistrationPolicy::Reject {
            return Err(Error::DuplicateName { name });
        }
        if !replaced {
            self.order.push(name.clone());
        }
        info!(
            function = %name,
            replaced,
            has_implementation = def.implementation.is_some(),
            "registered function"
        );
        self.functions.insert(name, Arc::new(def));
        Ok(())
    }

    /// Parse a serialized schema and bind `implementation` to it.
    pub fn register_serialized(
        &mut self,
        data: &Value,
        implementation: Option<Arc<dyn Callable>>,
    ) -> Result<()> {
        let schema = FunctionSchema::from_value(data)?;
        self.register(bind(schema, implementation))
    }

    pub fn register_json(
        &mut self,
        text: &str,
        implementation: Option<Arc<dyn Callable>>,
    ) -> Result<()> {
        let schema = FunctionSchema::from_json(text)?;
        self.register(bind(schema, implementation))
    }

    /// Register the schema stored in a JSON file.
    pub fn register_file(
        &mut self,
        path: impl AsRef<Path>,
        implementation: Option<Arc<dyn Callable>>,
    ) -> Result<()> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading function schema file");
        let text = std::fs::read_to_string(path)?;
        self.register_json(&text, implementation)
    }

    /// Register several serialized schemas, binding implementations by name.
    ///
    /// Every schema is parsed before anything is registered, so a malformed entry leaves
    /// the registry untouched. Returns the registered names.
    pub fn register_many(
        &mut self,
        schemas: &[Value],
        mut implementations: HashMap<String, Arc<dyn Callable>>,
    ) -> Result<Vec<String>> {
        let parsed = schemas
            .iter()
            .map(FunctionSchema::from_value)
            .collect::<Result<Vec<_>>>()?;

        if self.policy == RegistrationPolicy::Reject {
            let mut seen = std::collections::HashSet::new();
            for schema in &parsed {
                if self.functions.contains_key(&schema.name) || !seen.insert(schema.name.as_str()) {
                    return Err(Error::DuplicateName {
                        name: schema.name.clone(),
                    });
                }
            }
        }

        let mut names = Vec::with_capacity(parsed.len());
        for schema in parsed {
            let implementation = implementations.remove(&schema.name);
            names.push(schema.name.clone());
            self.register(bind(schema, implementation))?;
        }
        Ok(names)
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<FunctionDefinition>> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Definitions in registration order.
    pub fn catalog(&self) -> Vec<Arc<FunctionDefinition>> {
        self.order
            .iter()
            .filter_map(|name| self.functions.get(name).cloned())
            .collect()
    }

    /// Serialized projection of the catalog, without callables.
    pub fn catalog_serialized(&self) -> Vec<Value> {
        self.catalog().iter().map(|def| def.to_value()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Remove a definition. Absent names are a no-op.
    pub fn remove(&mut self, name: &str) -> Option<Arc<FunctionDefinition>> {
        let removed = self.functions.remove(name)?;
        self.order.retain(|n| n != name);
        debug!(function = %name, "removed function");
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.functions.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

fn bind(schema: FunctionSchema, implementation: Option<Arc<dyn Callable>>) -> FunctionDefinition {
    let def = FunctionDefinition::from_schema(schema);
    match implementation {
        Some(imp) => def.with_implementation(imp),
        None => def,
    }
}
