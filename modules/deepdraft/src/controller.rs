//! The research pipeline: plan, draft, then evaluate/question/answer/revise
//! until the decision policy stops, then write the final report.

use std::sync::Arc;

use ai_client::DynTool;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use crate::claude::ClaudeGenerator;
use crate::config::ResearchConfig;
use crate::error::{ResearchError, Result, Stage, StageContext};
use crate::evaluator::{Evaluate, QualityEvaluator};
use crate::evolution::EvolutionSelector;
use crate::generator::{AgentRole, Generator};
use crate::metrics::{record_search_citations, update_metrics};
use crate::policy::evaluate_decision;
use crate::prompts;
use crate::search::SearchSession;
use crate::state::{split_plan, QaPair, ResearchState};

const PREVIEW_CHARS: usize = 120;

#[derive(TypedBuilder)]
pub struct ResearchController {
    generator: Arc<dyn Generator>,
    evaluator: Arc<dyn Evaluate>,
    #[builder(default)]
    config: ResearchConfig,
    #[builder(default, setter(strip_option))]
    session: Option<Arc<dyn SearchSession>>,
}

impl ResearchController {
    /// Controller backed by Claude for every role, judging drafts with the
    /// same model. `search_tool` is offered to the answering stage.
    pub fn with_claude(
        config: ResearchConfig,
        search_tool: Option<Arc<dyn DynTool>>,
    ) -> Result<Self> {
        let mut generator = ClaudeGenerator::from_config(&config)?;
        if let Some(tool) = search_tool {
            if tool.name() != config.search_tool_name {
                return Err(ResearchError::Config(format!(
                    "search tool is named '{}' but citations are read from '{}'",
                    tool.name(),
                    config.search_tool_name
                )));
            }
            generator = generator.with_search_tool(tool);
        }
        let generator = Arc::new(generator);

        Ok(Self {
            evaluator: Arc::new(QualityEvaluator::new(generator.clone())),
            generator,
            config,
            session: None,
        })
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// Run with the configured iteration budget.
    pub async fn research(&self, query: &str) -> Result<ResearchState> {
        self.run(query, self.config.max_iterations).await
    }

    /// Run the full pipeline for `query`. The search session, if any, is
    /// open for the whole run and closed on every exit path.
    pub async fn run(&self, query: &str, max_iterations: usize) -> Result<ResearchState> {
        self.config.evolution.validate()?;

        if let Some(session) = &self.session {
            session.open().await.map_err(ResearchError::Session)?;
        }

        let result = self.run_inner(query, max_iterations).await;

        // Always close the session
        if let Some(session) = &self.session {
            if let Err(e) = session.close().await {
                warn!(error = %e, "Failed to close search session");
            }
        }

        result
    }

    async fn run_inner(&self, query: &str, max_iterations: usize) -> Result<ResearchState> {
        let mut state = ResearchState::new(query);
        info!(
            run_id = %state.run_id,
            query = preview(query),
            max_iterations,
            "Research run started"
        );

        let plan = self
            .generate_stage(&mut state, Stage::Plan, AgentRole::Planner, prompts::query_context(query))
            .await?;
        state.plan = split_plan(&plan);
        info!(steps = state.plan.len(), "Plan ready");

        state.draft = self
            .generate_stage(&mut state, Stage::Draft, AgentRole::Drafter, prompts::query_context(query))
            .await?;
        info!(chars = state.draft.len(), "Initial draft ready");

        for iteration in 1..=max_iterations {
            let evaluation = self
                .evaluator
                .evaluate(query, &state.draft)
                .await
                .with_stage(Stage::Evaluate)?;
            state.record_usage(evaluation.usage);

            let decision = evaluate_decision(
                iteration,
                max_iterations,
                evaluation.scores,
                &evaluation.feedback,
            );
            info!(
                iteration,
                helpfulness = evaluation.scores.helpfulness,
                comprehensiveness = evaluation.scores.comprehensiveness,
                %decision,
                "Draft evaluated"
            );
            if !decision.should_continue() {
                break;
            }
            state.iterations_run += 1;

            let context = prompts::question_context(query, &state.plan, &state.draft);
            let question = self
                .generate_stage(&mut state, Stage::Question, AgentRole::Questioner, context)
                .await?;
            debug!(iteration, question = preview(&question), "Question generated");

            let citations_before = state.citations.len();
            let answer = self
                .generate_stage(
                    &mut state,
                    Stage::Answer,
                    AgentRole::Answerer,
                    prompts::answer_context(&question),
                )
                .await?;
            debug!(
                iteration,
                new_citations = state.citations.len() - citations_before,
                "Question answered"
            );

            let feedback = self
                .config
                .fold_feedback_into_revision
                .then_some(evaluation.feedback.as_str());
            let context = prompts::revise_context(&state.draft, &question, &answer, feedback);
            state.qa_history.push(QaPair::new(question, answer));

            state.draft = self
                .generate_stage(&mut state, Stage::Revise, AgentRole::Reviser, context)
                .await?;
            debug!(iteration, chars = state.draft.len(), "Draft revised");
        }

        let context = prompts::final_context(query, &state.plan, &state.qa_history);
        let report = self
            .generate_stage(&mut state, Stage::Finalize, AgentRole::Reporter, context)
            .await?;
        if report.trim().is_empty() {
            return Err(ResearchError::EmptyOutput(Stage::Finalize));
        }
        state.final_report = report;
        state.completed_at = Some(chrono::Utc::now());

        info!(
            run_id = %state.run_id,
            iterations = state.iterations_run,
            qa_pairs = state.qa_history.len(),
            total_tokens = state.total_tokens,
            citations = state.unique_citations().len(),
            "Research run complete"
        );

        Ok(state)
    }

    /// One capability call for `stage`, through the evolution selector when
    /// the stage is configured for it. Usage and citations land in `state`.
    async fn generate_stage(
        &self,
        state: &mut ResearchState,
        stage: Stage,
        role: AgentRole,
        context: String,
    ) -> Result<String> {
        let evolution = &self.config.evolution;
        if evolution.applies_to(stage) {
            let generator = &self.generator;
            let selection = EvolutionSelector::new(self.evaluator.as_ref())
                .select_best(
                    &state.initial_query,
                    &context,
                    move |ctx: String| async move { generator.generate(role, &ctx).await },
                    move |prompt: String| async move {
                        generator.generate(AgentRole::Reviser, &prompt).await
                    },
                    evolution.num_variants,
                    evolution.num_rounds,
                )
                .await
                .with_stage(stage)?;

            state.record_usage(selection.usage);
            record_search_citations(state, &selection.tool_calls, &self.config.search_tool_name);
            state
                .evolution_variants
                .insert(stage.as_str().to_string(), selection.variants);
            return Ok(selection.content);
        }

        let completion = self
            .generator
            .generate(role, &context)
            .await
            .with_stage(stage)?;
        update_metrics(state, &completion, &self.config.search_tool_name);
        Ok(completion.text)
    }
}

/// At most [`PREVIEW_CHARS`] characters of `text`, cut on a char boundary.
fn preview(text: &str) -> &str {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
