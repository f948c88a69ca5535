//! Name-keyed tool dispatch.

use crate::schema::ToolSchema;
use async_trait::async_trait;
use lexgen_core::{CancelToken, ToolError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// A typed, side-effecting capability.
///
/// Tools never mutate shared run state; the caller is responsible for
/// writing results back.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The declarative schema of this tool.
    fn schema(&self) -> &ToolSchema;

    /// Invoke with a pre-validated argument map.
    async fn invoke(
        &self,
        args: &serde_json::Map<String, Value>,
        cancel: &CancelToken,
    ) -> Result<Value, ToolError>;
}

/// Process-wide tool registry with copy-on-write reload.
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<Arc<HashMap<String, Arc<dyn Tool>>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its schema name, replacing any previous
    /// registration.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.schema().name.clone();
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next: HashMap<String, Arc<dyn Tool>> = (**guard).clone();
        next.insert(name, tool);
        *guard = Arc::new(next);
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let guard = self
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut names: Vec<String> = guard.keys().cloned().collect();
        names.sort();
        names
    }

    /// Schema of a registered tool.
    pub fn schema_of(&self, name: &str) -> Option<ToolSchema> {
        let guard = self
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.get(name).map(|t| t.schema().clone())
    }

    /// Validate arguments and dispatch to the named tool.
    pub async fn invoke(
        &self,
        name: &str,
        args: Value,
        cancel: &CancelToken,
    ) -> Result<Value, ToolError> {
        let tool = {
            let guard = self
                .inner
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.get(name).cloned()
        }
        .ok_or_else(|| ToolError::NotFound {
            name: name.to_string(),
        })?;

        let args = match args {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            _ => {
                return Err(ToolError::InvalidArguments {
                    tool: name.to_string(),
                    reason: "arguments must be an object".to_string(),
                })
            }
        };

        tool.schema().validate(&args)?;
        debug!(tool = name, "invoking tool");
        tool.invoke(&args, cancel).await
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
