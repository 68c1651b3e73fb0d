//! Search capability seams.
//!
//! `Searcher` is whatever backend answers queries; `SearchTool` exposes one to
//! the answering model as a tool whose result is a list of `{title, url,
//! content}` objects, which is the shape citation extraction reads.
//! `SearchSession` brackets a run when the backend holds a connection.

use std::sync::Arc;

use ai_client::{DynTool, ToolDefinition};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

pub const DEFAULT_SEARCH_TOOL: &str = "tavily-search";
const DEFAULT_MAX_RESULTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
}

#[async_trait]
pub trait Searcher: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
}

/// Connection lifetime for a search backend. `open` runs before the first
/// stage of a run and `close` after the last, whether the run succeeded or not.
#[async_trait]
pub trait SearchSession: Send + Sync {
    async fn open(&self) -> Result<()>;
    async fn close(&self) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    max_results: Option<usize>,
}

/// Adapts a [`Searcher`] into a tool registered under a configurable name.
pub struct SearchTool<S> {
    name: String,
    searcher: S,
    max_results: usize,
}

impl<S: Searcher> SearchTool<S> {
    pub fn new(searcher: S) -> Self {
        Self {
            name: DEFAULT_SEARCH_TOOL.to_string(),
            searcher,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    pub fn into_dyn(self) -> Arc<dyn DynTool>
    where
        S: 'static,
    {
        Arc::new(self)
    }
}

#[async_trait]
impl<S: Searcher> DynTool for SearchTool<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: "Search the web. Returns a list of results with title, url and content."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Search query" },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of results",
                        "minimum": 1
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn call_json(&self, args: Value) -> Result<Value, String> {
        let args: SearchArgs =
            serde_json::from_value(args).map_err(|e| format!("Failed to parse args: {}", e))?;
        let limit = args
            .max_results
            .unwrap_or(self.max_results)
            .clamp(1, self.max_results);

        debug!(tool = %self.name, query = %args.query, limit, "Running search");

        let hits = self.searcher.search(&args.query, limit).await.map_err(|e| {
            warn!(tool = %self.name, error = %e, "Search failed");
            format!("Search failed: {}", e)
        })?;

        serde_json::to_value(hits).map_err(|e| format!("Failed to serialize result: {}", e))
    }
}
