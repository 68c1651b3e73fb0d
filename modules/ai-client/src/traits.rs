use crate::completion::Completion;
use crate::tool::{DynTool, Tool};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A model endpoint with a set of registered tools.
pub trait Agent: Clone + Send + Sync {
    type PromptBuilder: PromptBuilder;

    fn tool<T: Tool + 'static>(self, tool: T) -> Self;
    fn dyn_tool(self, tool: Arc<dyn DynTool>) -> Self;
    fn prompt(&self, input: impl Into<String>) -> Self::PromptBuilder;
}

/// One request, configured fluently and consumed by `send`.
///
/// `multi_turn(n)` lets the model call tools for up to `n` round trips
/// before a final answer is required; the default is a single turn.
#[async_trait]
pub trait PromptBuilder: Send + Sized {
    fn preamble(self, preamble: impl Into<String>) -> Self;
    fn temperature(self, temperature: f32) -> Self;
    fn max_tokens(self, max_tokens: u32) -> Self;
    fn multi_turn(self, max_turns: usize) -> Self;
    async fn send(self) -> Result<Completion>;
}
