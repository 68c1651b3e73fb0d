pub mod claude;
pub mod config;
pub mod controller;
pub mod error;
pub mod evaluator;
pub mod evolution;
pub mod generator;
pub mod metrics;
pub mod policy;
pub mod prompts;
pub mod search;
pub mod state;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use claude::ClaudeGenerator;
pub use config::{EvolutionSettings, ResearchConfig};
pub use controller::ResearchController;
pub use error::{ResearchError, Result, Stage};
pub use evaluator::{Evaluate, Evaluation, QualityEvaluator, Scores};
pub use evolution::{EvolutionSelector, Selection};
pub use generator::{AgentRole, Generator};
pub use policy::{decide, evaluate_decision, Decision};
pub use search::{SearchHit, SearchSession, SearchTool, Searcher};
pub use state::{EvolutionVariant, QaPair, ResearchState};
