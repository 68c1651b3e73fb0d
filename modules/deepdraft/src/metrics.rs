//! Token and citation bookkeeping applied after every capability call.
//!
//! Best-effort: a payload in an unexpected shape is skipped, never an error.

use ai_client::{Completion, ToolInvocation};
use serde_json::Value;
use tracing::debug;

use crate::state::ResearchState;

/// Fold one completion's usage and search citations into the run state.
pub fn update_metrics(state: &mut ResearchState, completion: &Completion, search_tool: &str) {
    state.record_usage(completion.usage);
    record_search_citations(state, &completion.tool_calls, search_tool);
}

/// Append the URLs of every `search_tool` call in `calls` to the run's citations.
pub fn record_search_citations(
    state: &mut ResearchState,
    calls: &[ToolInvocation],
    search_tool: &str,
) {
    for call in calls.iter().filter(|call| call.tool_name == search_tool) {
        match extract_citations(call) {
            Some(urls) => state.record_citations(urls),
            None => debug!(
                tool = %call.tool_name,
                "Search result not a list of objects, no citations taken"
            ),
        }
    }
}

/// URLs from a search tool result.
///
/// The result must be an array of objects. Objects without a `url` key are
/// skipped; anything else (a non-array, a non-object item, a non-string url)
/// yields `None` for the whole call.
pub fn extract_citations(call: &ToolInvocation) -> Option<Vec<String>> {
    let items = call.result.as_array()?;

    let mut urls = Vec::with_capacity(items.len());
    for item in items {
        match item.as_object()?.get("url") {
            None => {}
            Some(Value::String(url)) => urls.push(url.clone()),
            Some(_) => return None,
        }
    }
    Some(urls)
}
