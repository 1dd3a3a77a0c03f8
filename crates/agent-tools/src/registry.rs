//! Tool registry for managing available tools

use crate::Tool;
use agent_core::{Error, Result};
use agent_llm::ToolDefinition;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Registry for managing tools, keyed by tool name
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<BTreeMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    /// Create a new tool registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool of the same name
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        if tools.insert(tool.name().to_string(), tool).is_some() {
            debug!("Replaced previously registered tool");
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        tools.get(name).cloned()
    }

    /// All registered tools, sorted by name
    pub fn list_tools(&self) -> Vec<Arc<dyn Tool>> {
        let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        tools.values().cloned().collect()
    }

    /// Definitions of all registered tools, sorted by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.list_tools().iter().map(|tool| tool.definition()).collect()
    }

    /// Decode `arguments` and run the tool called `name`
    ///
    /// Blank arguments decode to an empty object.
    pub async fn dispatch(&self, name: &str, arguments: &str) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| Error::ToolNotFound(name.to_string()))?;

        let params = if arguments.trim().is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(arguments).map_err(|e| Error::MalformedToolArguments {
                tool: name.to_string(),
                reason: e.to_string(),
            })?
        };

        debug!(tool = name, "Dispatching tool call");
        tool.execute(params).await
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
