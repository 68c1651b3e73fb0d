use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::completion::{Completion, ToolInvocation, Usage};
use crate::error::AiError;
use crate::traits::PromptBuilder;

use super::types::*;
use super::Claude;

pub struct ClaudePromptBuilder {
    agent: Claude,
    input: String,
    preamble: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    max_turns: usize,
}

impl ClaudePromptBuilder {
    pub(crate) fn new(agent: Claude, input: String) -> Self {
        Self {
            agent,
            input,
            preamble: None,
            temperature: None,
            max_tokens: None,
            max_turns: 1,
        }
    }

    async fn build_request(&self) -> ChatRequest {
        let mut request = ChatRequest::new(&self.agent.model);

        if let Some(temp) = self.temperature {
            request = request.temperature(temp);
        }

        if let Some(max_tokens) = self.max_tokens {
            request = request.max_tokens(max_tokens);
        }

        if let Some(ref preamble) = self.preamble {
            request = request.system(preamble);
        }

        if !self.input.is_empty() {
            request = request.message(WireMessage::user(&self.input));
        }

        for tool in &self.agent.tools {
            let def = tool.definition().await;
            request = request.tool(ToolDefinitionWire {
                name: def.name,
                description: def.description,
                input_schema: def.parameters,
            });
        }

        if request.tools.is_some() {
            request.tool_choice = Some(serde_json::json!({"type": "auto"}));
        }

        request
    }

    /// Run every tool the model asked for, in order. Returns the tool_result
    /// blocks for the next turn and the invocation records for the caller.
    async fn execute_tools(
        &self,
        response: &ChatResponse,
    ) -> Result<(Vec<ContentBlock>, Vec<ToolInvocation>)> {
        let mut results = Vec::new();
        let mut invocations = Vec::new();

        for block in &response.content {
            let ContentBlock::ToolUse { id, name, input } = block else {
                continue;
            };

            let tool = self
                .agent
                .tools
                .iter()
                .find(|t| t.name() == name.as_str())
                .ok_or_else(|| AiError::ToolNotFound(name.clone()))?;

            debug!(tool = %name, "Executing tool call");

            let (content, result, is_error) = match tool.call_json(input.clone()).await {
                Ok(v) => (serde_json::to_string(&v).map_err(AiError::from)?, v, false),
                Err(e) => {
                    warn!(tool = %name, error = %e, "Tool call failed");
                    let message = format!("Error: {}", e);
                    (message.clone(), Value::String(message), true)
                }
            };

            results.push(ContentBlock::ToolResult {
                tool_use_id: id.clone(),
                content,
                is_error,
            });
            invocations.push(ToolInvocation {
                tool_name: name.clone(),
                input: input.clone(),
                result,
            });
        }

        Ok((results, invocations))
    }
}

#[async_trait]
impl PromptBuilder for ClaudePromptBuilder {
    fn preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }

    fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn multi_turn(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    async fn send(self) -> Result<Completion> {
        let client = self.agent.client();
        let mut request = self.build_request().await;

        let mut usage: Option<Usage> = None;
        let mut tool_calls = Vec::new();

        // Multi-turn tool loop
        let mut turn = 0;
        loop {
            turn += 1;
            if turn > self.max_turns {
                return Err(AiError::MaxTurns(self.max_turns).into());
            }

            let response = client.chat(&request).await?;

            if let Some(turn_usage) = response.usage {
                *usage.get_or_insert_with(Usage::default) += turn_usage;
            }

            if response.wants_tools() {
                request
                    .messages
                    .push(WireMessage::assistant_blocks(response.content.clone()));

                let (results, invocations) = self.execute_tools(&response).await?;
                tool_calls.extend(invocations);
                request.messages.push(WireMessage::tool_results(results));
                continue;
            }

            debug!(
                turns = turn,
                tool_calls = tool_calls.len(),
                "Claude prompt complete"
            );

            return Ok(Completion {
                text: response.text(),
                usage,
                tool_calls,
            });
        }
    }
}
