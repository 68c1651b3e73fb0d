use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::error::Error;

#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A statically typed tool. Wrap it in [`ToolWrapper`] to hand it to an agent.
#[async_trait]
pub trait Tool: Send + Sync {
    const NAME: &'static str;
    type Error: Error + Send + Sync + 'static;
    type Args: DeserializeOwned + Send + Sync;
    type Output: Serialize + Send + Sync;

    async fn definition(&self) -> ToolDefinition;
    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error>;
}

/// Object-safe tool interface used by the tool loop.
///
/// The name is borrowed from the tool rather than fixed at compile time so a
/// tool can be registered under a configured identifier.
#[async_trait]
pub trait DynTool: Send + Sync {
    fn name(&self) -> &str;
    async fn definition(&self) -> ToolDefinition;
    async fn call_json(&self, args: Value) -> Result<Value, String>;
}

pub struct ToolWrapper<T: Tool>(pub T);

#[async_trait]
impl<T: Tool> DynTool for ToolWrapper<T> {
    fn name(&self) -> &str {
        T::NAME
    }

    async fn definition(&self) -> ToolDefinition {
        self.0.definition().await
    }

    async fn call_json(&self, args: Value) -> Result<Value, String> {
        let parsed_args: T::Args =
            serde_json::from_value(args).map_err(|e| format!("Failed to parse args: {}", e))?;

        let result = self
            .0
            .call(parsed_args)
            .await
            .map_err(|e| format!("Tool error: {}", e))?;

        serde_json::to_value(result).map_err(|e| format!("Failed to serialize result: {}", e))
    }
}
