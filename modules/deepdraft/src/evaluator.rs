//! LLM-as-judge quality evaluation.
//!
//! The judge answers in a small text format (`Helpfulness: N`,
//! `Comprehensiveness: N`, `<feedback>...</feedback>`). Parsing that format
//! lives in [`parse_evaluation`] and never fails: missing scores count as the
//! worst score so the caller keeps iterating.

use std::sync::LazyLock;

use ai_client::Usage;
use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::generator::{AgentRole, Generator};
use crate::prompts;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;
pub const NO_FEEDBACK: &str = "No specific feedback provided.";

static RE_HELPFULNESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Helpfulness:[ \t]*(\d)").expect("valid regex"));
static RE_COMPREHENSIVENESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Comprehensiveness:[ \t]*(\d)").expect("valid regex"));
static RE_FEEDBACK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<feedback>(.*?)</feedback>").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub helpfulness: u8,
    pub comprehensiveness: u8,
}

impl Scores {
    pub fn new(helpfulness: u8, comprehensiveness: u8) -> Self {
        Self {
            helpfulness,
            comprehensiveness,
        }
    }

    /// Fitness of a candidate: the mean of both axes.
    pub fn mean(&self) -> f64 {
        (f64::from(self.helpfulness) + f64::from(self.comprehensiveness)) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub scores: Scores,
    pub feedback: String,
    /// Tokens spent producing this evaluation, when the judge reported them.
    #[serde(skip)]
    pub usage: Option<Usage>,
}

impl Evaluation {
    pub fn new(helpfulness: u8, comprehensiveness: u8, feedback: impl Into<String>) -> Self {
        Self {
            scores: Scores::new(helpfulness, comprehensiveness),
            feedback: feedback.into(),
            usage: None,
        }
    }
}

/// Scores a text against a query.
#[async_trait]
pub trait Evaluate: Send + Sync {
    async fn evaluate(&self, query: &str, text: &str) -> Result<Evaluation>;
}

#[async_trait]
impl<E: Evaluate + ?Sized> Evaluate for std::sync::Arc<E> {
    async fn evaluate(&self, query: &str, text: &str) -> Result<Evaluation> {
        (**self).evaluate(query, text).await
    }
}

/// Evaluator backed by a [`Generator`] answering as [`AgentRole::Evaluator`].
pub struct QualityEvaluator<G> {
    generator: G,
}

impl<G: Generator> QualityEvaluator<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl<G: Generator> Evaluate for QualityEvaluator<G> {
    async fn evaluate(&self, query: &str, text: &str) -> Result<Evaluation> {
        let prompt = prompts::evaluation_prompt(query, text);
        let completion = self.generator.generate(AgentRole::Evaluator, &prompt).await?;

        let mut evaluation = parse_evaluation(&completion.text);
        evaluation.usage = completion.usage;

        debug!(
            helpfulness = evaluation.scores.helpfulness,
            comprehensiveness = evaluation.scores.comprehensiveness,
            "Text scored"
        );
        Ok(evaluation)
    }
}

/// Parse a judge response. Missing or out-of-range scores become
/// [`MIN_SCORE`]; a missing feedback block becomes [`NO_FEEDBACK`].
pub fn parse_evaluation(response: &str) -> Evaluation {
    let helpfulness = parse_score(&RE_HELPFULNESS, response);
    let comprehensiveness = parse_score(&RE_COMPREHENSIVENESS, response);

    let feedback = match RE_FEEDBACK.captures(response) {
        Some(caps) => caps[1].trim().to_string(),
        None => {
            debug!("Judge response has no feedback block");
            NO_FEEDBACK.to_string()
        }
    };

    Evaluation::new(helpfulness, comprehensiveness, feedback)
}

fn parse_score(re: &Regex, response: &str) -> u8 {
    re.captures(response)
        .and_then(|caps| caps[1].parse::<u8>().ok())
        .filter(|score| (MIN_SCORE..=MAX_SCORE).contains(score))
        .unwrap_or(MIN_SCORE)
}
