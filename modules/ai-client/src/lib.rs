pub mod claude;
pub mod completion;
pub mod error;
pub mod tool;
pub mod traits;

pub use claude::Claude;
pub use completion::{Completion, ToolInvocation, Usage};
pub use error::AiError;
pub use tool::{DynTool, Tool, ToolDefinition, ToolWrapper};
pub use traits::{Agent, PromptBuilder};
