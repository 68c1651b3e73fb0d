mod client;
pub mod prompt_builder;
pub(crate) mod types;

pub use prompt_builder::ClaudePromptBuilder;

use crate::tool::{DynTool, Tool, ToolWrapper};
use crate::traits::Agent;
use std::sync::Arc;

use client::ClaudeClient;

// =============================================================================
// Claude Agent
// =============================================================================

#[derive(Clone)]
pub struct Claude {
    api_key: String,
    pub(crate) model: String,
    pub(crate) tools: Vec<Arc<dyn DynTool>>,
    base_url: Option<String>,
}

impl std::fmt::Debug for Claude {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Claude")
            .field("model", &self.model)
            .field(
                "tools",
                &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            tools: Vec::new(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub(crate) fn client(&self) -> ClaudeClient {
        let client = ClaudeClient::new(&self.api_key);
        if let Some(ref url) = self.base_url {
            client.with_base_url(url)
        } else {
            client
        }
    }
}

// =============================================================================
// Agent Implementation
// =============================================================================

impl Agent for Claude {
    type PromptBuilder = ClaudePromptBuilder;

    fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.push(Arc::new(ToolWrapper(tool)));
        self
    }

    fn dyn_tool(mut self, tool: Arc<dyn DynTool>) -> Self {
        self.tools.push(tool);
        self
    }

    fn prompt(&self, input: impl Into<String>) -> ClaudePromptBuilder {
        ClaudePromptBuilder::new(self.clone(), input.into())
    }
}
