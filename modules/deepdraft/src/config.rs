use std::env;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ResearchError, Result, Stage};
use crate::search::DEFAULT_SEARCH_TOOL;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_MAX_ITERATIONS: usize = 5;
pub const DEFAULT_MAX_TOOL_TURNS: usize = 5;

/// Stages that may generate through the evolution selector.
pub const EVOLVABLE_STAGES: [Stage; 3] = [Stage::Plan, Stage::Draft, Stage::Question];

/// Which stages evolve, and how hard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionSettings {
    pub num_variants: usize,
    pub num_rounds: usize,
    pub stages: Vec<Stage>,
}

impl Default for EvolutionSettings {
    fn default() -> Self {
        Self {
            num_variants: 3,
            num_rounds: 1,
            stages: Vec::new(),
        }
    }
}

impl EvolutionSettings {
    pub fn applies_to(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }

    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Ok(());
        }
        if self.num_variants == 0 {
            return Err(ResearchError::InvalidArgument(
                "evolution needs at least one variant".to_string(),
            ));
        }
        if let Some(stage) = self.stages.iter().find(|s| !EVOLVABLE_STAGES.contains(*s)) {
            return Err(ResearchError::InvalidArgument(format!(
                "stage '{stage}' cannot be evolved"
            )));
        }
        Ok(())
    }
}

/// Run configuration. Built explicitly or loaded from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    pub anthropic_api_key: String,
    pub model: String,
    pub max_iterations: usize,
    pub search_tool_name: String,
    pub max_tool_turns: usize,
    /// Pass the evaluator's feedback to the reviser alongside the new Q/A pair.
    pub fold_feedback_into_revision: bool,
    pub evolution: EvolutionSettings,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            anthropic_api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            search_tool_name: DEFAULT_SEARCH_TOOL.to_string(),
            max_tool_turns: DEFAULT_MAX_TOOL_TURNS,
            fold_feedback_into_revision: true,
            evolution: EvolutionSettings::default(),
        }
    }
}

impl ResearchConfig {
    /// Load configuration from environment variables.
    /// `ANTHROPIC_API_KEY` is required; everything else has a default.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let anthropic_api_key = var("ANTHROPIC_API_KEY").ok_or_else(|| {
            ResearchError::Config("ANTHROPIC_API_KEY environment variable is required".to_string())
        })?;

        let max_iterations = match var("DEEPDRAFT_MAX_ITERATIONS") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                ResearchError::Config(format!(
                    "DEEPDRAFT_MAX_ITERATIONS must be a non-negative number, got '{raw}'"
                ))
            })?,
            None => defaults.max_iterations,
        };

        Ok(Self {
            anthropic_api_key,
            model: var("DEEPDRAFT_MODEL").unwrap_or(defaults.model),
            max_iterations,
            search_tool_name: var("DEEPDRAFT_SEARCH_TOOL").unwrap_or(defaults.search_tool_name),
            ..defaults
        })
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_evolution(mut self, evolution: EvolutionSettings) -> Self {
        self.evolution = evolution;
        self
    }

    /// Log the effective configuration with secrets masked.
    pub fn log_redacted(&self) {
        info!(
            model = %self.model,
            max_iterations = self.max_iterations,
            search_tool = %self.search_tool_name,
            max_tool_turns = self.max_tool_turns,
            fold_feedback = self.fold_feedback_into_revision,
            evolved_stages = ?self.evolution.stages,
            num_variants = self.evolution.num_variants,
            num_rounds = self.evolution.num_rounds,
            anthropic_api_key = %redact(&self.anthropic_api_key),
            "Research configuration"
        );
    }
}

fn redact(secret: &str) -> String {
    if secret.is_empty() {
        "(unset)".to_string()
    } else if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        let start = secret.char_indices().rev().nth(3).map_or(0, |(i, _)| i);
        format!("****{}", &secret[start..])
    }
}
