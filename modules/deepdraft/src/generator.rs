use std::fmt;

use ai_client::Completion;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::prompts;

/// Who is being asked. Each role has its own system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Planner,
    Drafter,
    Questioner,
    Answerer,
    Reviser,
    Reporter,
    Evaluator,
}

impl AgentRole {
    pub fn system_prompt(&self) -> &'static str {
        match self {
            AgentRole::Planner => prompts::PLAN_SYSTEM,
            AgentRole::Drafter => prompts::DRAFT_SYSTEM,
            AgentRole::Questioner => prompts::QUESTION_SYSTEM,
            AgentRole::Answerer => prompts::ANSWER_SYSTEM,
            AgentRole::Reviser => prompts::REVISE_SYSTEM,
            AgentRole::Reporter => prompts::FINAL_REPORT_SYSTEM,
            AgentRole::Evaluator => prompts::EVALUATOR_SYSTEM,
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentRole::Planner => "planner",
            AgentRole::Drafter => "drafter",
            AgentRole::Questioner => "questioner",
            AgentRole::Answerer => "answerer",
            AgentRole::Reviser => "reviser",
            AgentRole::Reporter => "reporter",
            AgentRole::Evaluator => "evaluator",
        };
        f.write_str(name)
    }
}

/// Text generation behind a uniform call. Failures are opaque collaborator
/// errors and abort the run.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, role: AgentRole, input: &str) -> Result<Completion>;
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for std::sync::Arc<G> {
    async fn generate(&self, role: AgentRole, input: &str) -> Result<Completion> {
        (**self).generate(role, input).await
    }
}
