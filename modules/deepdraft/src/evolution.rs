//! Self-evolution: generate several candidates, let each evaluate-and-revise
//! itself for a few rounds, keep the fittest.
//!
//! Candidates in one round run concurrently. Each task writes only its own
//! variant, and the round ends when every candidate has finished, so fitness
//! values compared at selection time all come from the same round.
//!
//! The winner's fitness is measured *before* its last revision while the
//! returned content is the revised text. The final revision is trusted
//! without a re-score.

use std::future::Future;

use ai_client::{Completion, ToolInvocation, Usage};
use anyhow::{ensure, Result};
use futures::future::try_join_all;
use tracing::{debug, info};

use crate::evaluator::Evaluate;
use crate::prompts;
use crate::state::EvolutionVariant;

/// Outcome of one evolution run.
#[derive(Debug, Clone)]
pub struct Selection {
    pub content: String,
    pub winner: usize,
    /// Every candidate as it stood after the last round.
    pub variants: Vec<EvolutionVariant>,
    /// Tokens spent on generation, evaluation and revision, summed.
    pub usage: Option<Usage>,
    /// Tool calls made by every generation and revision, in call order.
    pub tool_calls: Vec<ToolInvocation>,
}

pub struct EvolutionSelector<'a> {
    evaluator: &'a dyn Evaluate,
}

impl<'a> EvolutionSelector<'a> {
    pub fn new(evaluator: &'a dyn Evaluate) -> Self {
        Self { evaluator }
    }

    /// Run `num_rounds` evaluate/revise rounds over `num_variants` candidates
    /// produced by `generate(context)` and return the fittest.
    pub async fn select_best<G, GFut, R, RFut>(
        &self,
        query: &str,
        context: &str,
        generate: G,
        revise: R,
        num_variants: usize,
        num_rounds: usize,
    ) -> Result<Selection>
    where
        G: Fn(String) -> GFut,
        GFut: Future<Output = Result<Completion>>,
        R: Fn(String) -> RFut,
        RFut: Future<Output = Result<Completion>>,
    {
        ensure!(num_variants >= 1, "evolution needs at least one variant");

        let generated = try_join_all((0..num_variants).map(|_| generate(context.to_string()))).await?;

        let mut spent = Spend::default();
        let mut variants = Vec::with_capacity(generated.len());
        for completion in generated {
            variants.push(EvolutionVariant::new(spent.absorb(completion)));
        }

        info!(variants = variants.len(), rounds = num_rounds, "Evolution started");

        for round in 1..=num_rounds {
            let round_spend = try_join_all(
                variants
                    .iter_mut()
                    .map(|variant| self.evolve_variant(query, variant, &revise)),
            )
            .await?;

            for variant_spend in round_spend {
                spent.merge(variant_spend);
            }

            debug!(
                round,
                fitness = ?variants.iter().map(|v| v.fitness_score).collect::<Vec<_>>(),
                "Evolution round complete"
            );
        }

        let winner = select_fittest(&variants).unwrap_or(0);
        info!(
            winner,
            fitness = variants[winner].fitness_score,
            "Evolution winner selected"
        );

        Ok(Selection {
            content: variants[winner].content.clone(),
            winner,
            variants,
            usage: spent.usage,
            tool_calls: spent.tool_calls,
        })
    }

    /// One round for one candidate: score it, then revise it from its own feedback.
    async fn evolve_variant<R, RFut>(
        &self,
        query: &str,
        variant: &mut EvolutionVariant,
        revise: &R,
    ) -> Result<Spend>
    where
        R: Fn(String) -> RFut,
        RFut: Future<Output = Result<Completion>>,
    {
        let evaluation = self.evaluator.evaluate(query, &variant.content).await?;
        variant.fitness_score = evaluation.scores.mean();
        variant.feedback = evaluation.feedback;

        let revised = revise(prompts::variant_revision_prompt(
            &variant.content,
            &variant.feedback,
        ))
        .await?;

        let mut spent = Spend::default();
        spent.add_usage(evaluation.usage);
        variant.content = spent.absorb(revised);
        Ok(spent)
    }
}

/// Index of the highest fitness; ties go to the earliest candidate.
pub fn select_fittest(variants: &[EvolutionVariant]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, variant) in variants.iter().enumerate() {
        match best {
            Some(b) if variant.fitness_score <= variants[b].fitness_score => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Usage and tool calls accumulated across one evolution run.
#[derive(Default)]
struct Spend {
    usage: Option<Usage>,
    tool_calls: Vec<ToolInvocation>,
}

impl Spend {
    fn add_usage(&mut self, usage: Option<Usage>) {
        if let Some(usage) = usage {
            *self.usage.get_or_insert_with(Usage::default) += usage;
        }
    }

    /// Keep the completion's usage and tool calls, hand back its text.
    fn absorb(&mut self, completion: Completion) -> String {
        self.add_usage(completion.usage);
        self.tool_calls.extend(completion.tool_calls);
        completion.text
    }

    fn merge(&mut self, other: Spend) {
        self.add_usage(other.usage);
        self.tool_calls.extend(other.tool_calls);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Evaluation;
    use crate::testing::{FixedEvaluator, ScriptedEvaluator};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn variant(score: f64) -> EvolutionVariant {
        EvolutionVariant {
            content: format!("v{score}"),
            fitness_score: score,
            feedback: String::new(),
        }
    }

    #[test]
    fn picks_first_of_equal_best() {
        let variants = vec![variant(3.5), variant(4.0), variant(4.0)];
        assert_eq!(select_fittest(&variants), Some(1));
    }

    #[test]
    fn picks_strict_maximum() {
        let variants = vec![variant(2.0), variant(1.0), variant(4.5)];
        assert_eq!(select_fittest(&variants), Some(2));
    }

    #[test]
    fn empty_pool_has_no_winner() {
        assert_eq!(select_fittest(&[]), None);
    }

    #[tokio::test]
    async fn returns_revised_content_of_fittest_candidate() {
        let counter = AtomicUsize::new(0);
        let generate = |_context: String| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move { anyhow::Ok(Completion::text(format!("candidate-{n}")).with_usage(1, 1)) }
        };
        let revise = |prompt: String| async move {
            let content = prompt.rsplit("Text:\n").next().unwrap_or_default().to_string();
            anyhow::Ok(Completion::text(format!("{content}+r")).with_usage(2, 2))
        };

        // candidate-1 scores best, the others tie lower
        let evaluator = ScriptedEvaluator::by_text(|text| {
            if text.starts_with("candidate-1") {
                Evaluation::new(5, 4, "strong")
            } else {
                Evaluation::new(3, 3, "weak")
            }
        });
        let selector = EvolutionSelector::new(&evaluator);

        let selection = selector
            .select_best("q", "ctx", generate, revise, 3, 2)
            .await
            .unwrap();

        assert_eq!(selection.winner, 1);
        assert_eq!(selection.content, "candidate-1+r+r");
        assert_eq!(selection.variants.len(), 3);
        assert_eq!(selection.variants[1].fitness_score, 4.5);
        assert_eq!(selection.variants[1].feedback, "strong");
        assert_eq!(selection.variants[0].fitness_score, 3.0);
        // 3 generations at 2 tokens + 6 revisions at 4 tokens
        assert_eq!(selection.usage.map(|u| u.total()), Some(30));
    }

    #[tokio::test]
    async fn revision_prompt_carries_own_feedback_and_content() {
        let prompts_seen = Mutex::new(Vec::new());
        let generate = |_c: String| async { anyhow::Ok(Completion::text("only")) };
        let revise = |prompt: String| {
            prompts_seen.lock().unwrap().push(prompt);
            async { anyhow::Ok(Completion::text("revised")) }
        };
        let evaluator = FixedEvaluator::new(Evaluation::new(2, 2, "add numbers"));

        EvolutionSelector::new(&evaluator)
            .select_best("q", "ctx", generate, revise, 1, 1)
            .await
            .unwrap();

        let seen = prompts_seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![prompts::variant_revision_prompt("only", "add numbers")]
        );
    }

    #[tokio::test]
    async fn zero_rounds_returns_first_generated() {
        let counter = AtomicUsize::new(0);
        let generate = |_c: String| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move { anyhow::Ok(Completion::text(format!("g{n}"))) }
        };
        let revise = |_p: String| async { anyhow::Ok(Completion::text("never")) };
        let evaluator = FixedEvaluator::new(Evaluation::new(5, 5, "fine"));

        let selection = EvolutionSelector::new(&evaluator)
            .select_best("q", "ctx", generate, revise, 2, 0)
            .await
            .unwrap();

        assert_eq!(selection.winner, 0);
        assert_eq!(selection.content, "g0");
        assert!(selection.variants.iter().all(|v| v.fitness_score == 0.0));
        assert_eq!(evaluator.calls(), 0);
    }

    #[tokio::test]
    async fn zero_variants_is_rejected() {
        let generate = |_c: String| async { anyhow::Ok(Completion::text("x")) };
        let revise = |_p: String| async { anyhow::Ok(Completion::text("x")) };
        let evaluator = FixedEvaluator::new(Evaluation::new(5, 5, "fine"));

        let result = EvolutionSelector::new(&evaluator)
            .select_best("q", "ctx", generate, revise, 0, 1)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn revise_failure_aborts_selection() {
        let generate = |_c: String| async { anyhow::Ok(Completion::text("x")) };
        let revise = |_p: String| async { Err::<Completion, _>(anyhow::anyhow!("model unavailable")) };
        let evaluator = FixedEvaluator::new(Evaluation::new(3, 3, "meh"));

        let err = EvolutionSelector::new(&evaluator)
            .select_best("q", "ctx", generate, revise, 2, 1)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "model unavailable");
    }

    #[tokio::test]
    async fn tool_calls_from_generation_and_revision_are_kept() {
        let generate = |_c: String| async {
            anyhow::Ok(
                Completion::text("draft")
                    .with_tool_call(ToolInvocation::new("tavily-search", serde_json::json!([]))),
            )
        };
        let revise = |_p: String| async {
            anyhow::Ok(
                Completion::text("revised")
                    .with_tool_call(ToolInvocation::new("calculator", serde_json::json!(4))),
            )
        };
        let evaluator = FixedEvaluator::new(Evaluation::new(4, 4, "ok"));

        let selection = EvolutionSelector::new(&evaluator)
            .select_best("q", "ctx", generate, revise, 2, 1)
            .await
            .unwrap();

        let names: Vec<_> = selection
            .tool_calls
            .iter()
            .map(|c| c.tool_name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["tavily-search", "tavily-search", "calculator", "calculator"]
        );
    }

    #[tokio::test]
    async fn every_candidate_finishes_a_round_before_the_next_starts() {
        let counter = AtomicUsize::new(0);
        let generate = |_c: String| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move { anyhow::Ok(Completion::text(format!("c{n}"))) }
        };
        // yield inside revision so candidates interleave within a round
        let revise = |prompt: String| async move {
            tokio::task::yield_now().await;
            let content = prompt.rsplit("Text:\n").next().unwrap_or_default().to_string();
            anyhow::Ok(Completion::text(format!("{content}+r")))
        };
        let evaluator = ScriptedEvaluator::by_text(|_| Evaluation::new(3, 3, "again"));

        EvolutionSelector::new(&evaluator)
            .select_best("q", "ctx", generate, revise, 3, 2)
            .await
            .unwrap();

        let seen = evaluator.texts_seen();
        assert_eq!(seen.len(), 6);
        let (first, second) = seen.split_at(3);
        assert!(first.iter().all(|t| !t.ends_with("+r")), "{seen:?}");
        assert!(second.iter().all(|t| t.ends_with("+r")), "{seen:?}");

        let mut round_one = first.to_vec();
        round_one.sort();
        assert_eq!(round_one, vec!["c0", "c1", "c2"]);
    }
}
