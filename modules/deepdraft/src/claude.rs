//! [`Generator`] over the Anthropic Messages API.

use std::sync::Arc;

use ai_client::{Agent, Claude, Completion, DynTool, PromptBuilder};
use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::config::{ResearchConfig, DEFAULT_MAX_TOOL_TURNS};
use crate::error::ResearchError;
use crate::generator::{AgentRole, Generator};

/// Each role is sent with its own system prompt. Only the answerer sees the
/// search tools; every other role gets exactly one turn.
#[derive(Debug, Clone)]
pub struct ClaudeGenerator {
    claude: Claude,
    answerer: Claude,
    max_tool_turns: usize,
}

impl ClaudeGenerator {
    pub fn new(claude: Claude) -> Self {
        Self {
            answerer: claude.clone(),
            claude,
            max_tool_turns: DEFAULT_MAX_TOOL_TURNS,
        }
    }

    pub fn from_config(config: &ResearchConfig) -> Result<Self, ResearchError> {
        if config.anthropic_api_key.trim().is_empty() {
            return Err(ResearchError::Config(
                "anthropic_api_key is required for the Claude generator".to_string(),
            ));
        }
        let claude = Claude::new(&config.anthropic_api_key, &config.model);
        Ok(Self::new(claude).with_max_tool_turns(config.max_tool_turns))
    }

    pub fn with_search_tool(mut self, tool: Arc<dyn DynTool>) -> Self {
        self.answerer = self.answerer.dyn_tool(tool);
        self
    }

    pub fn with_max_tool_turns(mut self, max_tool_turns: usize) -> Self {
        self.max_tool_turns = max_tool_turns.max(1);
        self
    }

    pub fn model(&self) -> &str {
        self.claude.model()
    }

    pub fn answerer_tools(&self) -> Vec<&str> {
        self.answerer.tool_names()
    }
}

#[async_trait]
impl Generator for ClaudeGenerator {
    async fn generate(&self, role: AgentRole, input: &str) -> Result<Completion> {
        debug!(%role, model = self.claude.model(), "Generating");

        let completion = match role {
            AgentRole::Answerer => {
                self.answerer
                    .prompt(input)
                    .preamble(role.system_prompt())
                    .multi_turn(self.max_tool_turns)
                    .send()
                    .await?
            }
            AgentRole::Evaluator => {
                self.claude
                    .prompt(input)
                    .preamble(role.system_prompt())
                    .temperature(0.0)
                    .send()
                    .await?
            }
            _ => {
                self.claude
                    .prompt(input)
                    .preamble(role.system_prompt())
                    .send()
                    .await?
            }
        };

        Ok(completion)
    }
}
