//! Research state threaded through one end-to-end run.

use std::collections::{BTreeMap, HashSet};

use ai_client::Usage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One retrieval question and the answer synthesized for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

impl QaPair {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// A candidate competing in an evolution run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionVariant {
    pub content: String,
    #[serde(default)]
    pub fitness_score: f64,
    #[serde(default)]
    pub feedback: String,
}

impl EvolutionVariant {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            fitness_score: 0.0,
            feedback: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchState {
    pub run_id: Uuid,
    pub initial_query: String,
    pub plan: Vec<String>,
    pub draft: String,
    pub qa_history: Vec<QaPair>,
    pub final_report: String,
    pub total_tokens: u64,
    pub citations: Vec<String>,
    #[serde(default)]
    pub evolution_variants: BTreeMap<String, Vec<EvolutionVariant>>,
    /// Loop passes that got past the decision policy.
    pub iterations_run: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ResearchState {
    pub fn new(initial_query: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            initial_query: initial_query.into(),
            plan: Vec::new(),
            draft: String::new(),
            qa_history: Vec::new(),
            final_report: String::new(),
            total_tokens: 0,
            citations: Vec::new(),
            evolution_variants: BTreeMap::new(),
            iterations_run: 0,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn record_usage(&mut self, usage: Option<Usage>) {
        if let Some(usage) = usage {
            self.total_tokens = self.total_tokens.saturating_add(usage.total());
        }
    }

    pub fn record_citations(&mut self, urls: impl IntoIterator<Item = String>) {
        self.citations.extend(urls);
    }

    /// Citations with duplicates removed, first occurrence wins.
    pub fn unique_citations(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.citations
            .iter()
            .map(String::as_str)
            .filter(|url| seen.insert(*url))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Plan text is one step per line; blank lines carry no step.
pub fn split_plan(plan: &str) -> Vec<String> {
    plan.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}
