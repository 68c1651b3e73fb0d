//! End-to-end runs of the research pipeline against scripted collaborators.

use std::sync::Arc;

use ai_client::{Completion, ToolInvocation};
use deepdraft::testing::{
    FixedEvaluator, RecordingSession, ScriptedEvaluator, ScriptedGenerator, StaticSearcher,
};
use deepdraft::{
    AgentRole, Evaluation, EvolutionSettings, QualityEvaluator, ResearchConfig,
    ResearchController, ResearchError, SearchTool, Stage,
};
use serde_json::json;

fn fine() -> Evaluation {
    Evaluation::new(5, 5, "fine")
}

fn search_call(name: &str, urls: &[&str]) -> ToolInvocation {
    let hits: Vec<_> = urls.iter().map(|url| json!({"title": "t", "url": url})).collect();
    ToolInvocation::new(name, json!(hits))
}

#[tokio::test]
async fn good_first_draft_goes_straight_to_report() {
    let generator = ScriptedGenerator::new()
        .on(AgentRole::Planner, Completion::text("1. Background\n2. Outlook"))
        .on(AgentRole::Drafter, Completion::text("draft about X"))
        .on(AgentRole::Reporter, Completion::text("FINAL REPORT"));
    let evaluator = Arc::new(FixedEvaluator::new(fine()));

    let controller = ResearchController::builder()
        .generator(Arc::new(generator.clone()))
        .evaluator(evaluator.clone())
        .build();

    let state = controller.run("X", 2).await.unwrap();

    assert_eq!(evaluator.calls(), 1);
    assert!(state.qa_history.is_empty());
    assert_eq!(state.iterations_run, 0);
    assert_eq!(state.plan, vec!["1. Background", "2. Outlook"]);
    assert_eq!(state.draft, "draft about X");
    assert_eq!(state.final_report, "FINAL REPORT");
    assert!(state.is_complete());
    assert!(generator.calls_for(AgentRole::Questioner).is_empty());
}

#[tokio::test]
async fn qa_history_never_exceeds_budget() {
    for max_iterations in 0..=4 {
        let controller = ResearchController::builder()
            .generator(Arc::new(ScriptedGenerator::new()))
            .evaluator(Arc::new(FixedEvaluator::new(Evaluation::new(1, 1, "poor"))))
            .build();

        let state = controller.run("X", max_iterations).await.unwrap();

        // the pass at the budget stops before asking
        assert_eq!(state.qa_history.len(), max_iterations.saturating_sub(1));
        assert!(state.qa_history.len() <= max_iterations);
        assert_eq!(state.iterations_run, state.qa_history.len());
    }
}

#[tokio::test]
async fn early_stop_counts_executed_passes() {
    let evaluator = ScriptedEvaluator::sequence(vec![
        Evaluation::new(2, 2, "thin"),
        Evaluation::new(4, 4, "costs are missing"),
        fine(),
    ]);
    let generator = ScriptedGenerator::new().script(
        AgentRole::Questioner,
        vec![Completion::text("q1"), Completion::text("q2")],
    );

    let controller = ResearchController::builder()
        .generator(Arc::new(generator.clone()))
        .evaluator(Arc::new(evaluator))
        .build();

    let state = controller.run("X", 5).await.unwrap();

    let questions: Vec<_> = state.qa_history.iter().map(|qa| qa.question.as_str()).collect();
    assert_eq!(questions, vec!["q1", "q2"]);
    assert_eq!(state.iterations_run, 2);

    let report_input = generator.calls_for(AgentRole::Reporter);
    assert_eq!(report_input.len(), 1);
    assert!(report_input[0].contains("Q: q1\nA: answerer output\n\nQ: q2\nA: answerer output"));
}

#[tokio::test]
async fn citations_flow_from_search_calls() {
    let answer = Completion::text("answer")
        .with_tool_call(search_call("tavily-search", &["https://a", "https://b"]))
        .with_tool_call(search_call("calculator", &["https://ignored"]));
    let generator = ScriptedGenerator::new().on(AgentRole::Answerer, answer);
    let evaluator = ScriptedEvaluator::sequence(vec![
        Evaluation::new(3, 3, "thin"),
        Evaluation::new(3, 3, "thin"),
        fine(),
    ]);

    let controller = ResearchController::builder()
        .generator(Arc::new(generator))
        .evaluator(Arc::new(evaluator))
        .build();

    let state = controller.run("X", 5).await.unwrap();

    assert_eq!(
        state.citations,
        vec!["https://a", "https://b", "https://a", "https://b"]
    );
    assert_eq!(state.unique_citations(), vec!["https://a", "https://b"]);
}

#[tokio::test]
async fn search_tool_name_is_configurable() {
    let answer = Completion::text("answer")
        .with_tool_call(search_call("tavily-search", &["https://a"]))
        .with_tool_call(search_call("web-search", &["https://b"]));
    let generator = ScriptedGenerator::new().on(AgentRole::Answerer, answer);
    let config = ResearchConfig {
        search_tool_name: "web-search".to_string(),
        ..Default::default()
    };

    let controller = ResearchController::builder()
        .generator(Arc::new(generator))
        .evaluator(Arc::new(ScriptedEvaluator::sequence(vec![
            Evaluation::new(1, 1, "poor"),
            fine(),
        ])))
        .config(config)
        .build();

    let state = controller.run("X", 3).await.unwrap();
    assert_eq!(state.citations, vec!["https://b"]);
}

#[tokio::test]
async fn malformed_search_result_does_not_fail_the_run() {
    let answer = Completion::text("answer")
        .with_tool_call(ToolInvocation::new("tavily-search", json!("not a list")));
    let controller = ResearchController::builder()
        .generator(Arc::new(ScriptedGenerator::new().on(AgentRole::Answerer, answer)))
        .evaluator(Arc::new(FixedEvaluator::new(Evaluation::new(2, 2, "poor"))))
        .build();

    let state = controller.run("X", 2).await.unwrap();
    assert_eq!(state.qa_history.len(), 1);
    assert!(state.citations.is_empty());
}

#[tokio::test]
async fn token_totals_cover_every_call() {
    let generator = ScriptedGenerator::new()
        .on(AgentRole::Planner, Completion::text("1. a").with_usage(10, 10))
        .on(AgentRole::Drafter, Completion::text("draft").with_usage(5, 5))
        .on(AgentRole::Questioner, Completion::text("q").with_usage(1, 1))
        .on(AgentRole::Answerer, Completion::text("a").with_usage(4, 4))
        .on(AgentRole::Reviser, Completion::text("better draft").with_usage(2, 2))
        .on(AgentRole::Reporter, Completion::text("report").with_usage(7, 7))
        .script(
            AgentRole::Evaluator,
            vec![
                Completion::text("Helpfulness: 2\nComprehensiveness: 2\n<feedback>thin</feedback>")
                    .with_usage(3, 3),
                Completion::text("Helpfulness: 5\nComprehensiveness: 5\n<feedback>fine</feedback>")
                    .with_usage(3, 3),
            ],
        );
    let generator = Arc::new(generator);

    let controller = ResearchController::builder()
        .generator(generator.clone())
        .evaluator(Arc::new(QualityEvaluator::new(generator)))
        .build();

    let state = controller.run("X", 3).await.unwrap();

    // plan 20 + draft 10 + two evaluations 12 + question 2 + answer 8 + revise 4 + report 14
    assert_eq!(state.total_tokens, 70);
    assert_eq!(state.draft, "better draft");
}

#[tokio::test]
async fn stage_failure_names_the_stage_and_closes_session() {
    let session = Arc::new(RecordingSession::new());
    let generator = ScriptedGenerator::new().fail_with(AgentRole::Answerer, "search backend down");

    let controller = ResearchController::builder()
        .generator(Arc::new(generator.clone()))
        .evaluator(Arc::new(FixedEvaluator::new(Evaluation::new(1, 1, "poor"))))
        .session(session.clone())
        .build();

    let err = controller.run("X", 3).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Answer));
    assert!(err.to_string().contains("search backend down"));
    assert!(generator.calls_for(AgentRole::Reporter).is_empty());
    assert_eq!(session.opened(), 1);
    assert_eq!(session.closed(), 1);
}

#[tokio::test]
async fn evaluator_failure_is_an_evaluate_stage_error() {
    let controller = ResearchController::builder()
        .generator(Arc::new(ScriptedGenerator::new()))
        .evaluator(Arc::new(ScriptedEvaluator::failing("judge offline")))
        .build();

    let err = controller.run("X", 2).await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Evaluate));
}

#[tokio::test]
async fn session_open_failure_aborts_before_any_stage() {
    let session = Arc::new(RecordingSession::failing_open());
    let generator = ScriptedGenerator::new();

    let controller = ResearchController::builder()
        .generator(Arc::new(generator.clone()))
        .evaluator(Arc::new(FixedEvaluator::new(fine())))
        .session(session.clone())
        .build();

    let err = controller.run("X", 2).await.unwrap_err();

    assert!(matches!(err, ResearchError::Session(_)));
    assert!(generator.calls().is_empty());
    assert_eq!(session.closed(), 0);
}

#[tokio::test]
async fn session_close_failure_keeps_the_result() {
    let session = Arc::new(RecordingSession::failing_close());

    let controller = ResearchController::builder()
        .generator(Arc::new(ScriptedGenerator::new()))
        .evaluator(Arc::new(FixedEvaluator::new(fine())))
        .session(session.clone())
        .build();

    let state = controller.run("X", 2).await.unwrap();

    assert_eq!(state.final_report, "reporter output");
    assert_eq!(session.closed(), 1);
}

#[tokio::test]
async fn evolved_draft_keeps_all_variants() {
    let generator = ScriptedGenerator::new().script(
        AgentRole::Drafter,
        vec![
            Completion::text("d0"),
            Completion::text("d1"),
            Completion::text("d2"),
        ],
    );
    let evaluator = ScriptedEvaluator::by_text(|text| {
        if text == "d1" {
            Evaluation::new(5, 4, "strong")
        } else {
            Evaluation::new(3, 3, "weak")
        }
    });
    let config = ResearchConfig::default().with_evolution(EvolutionSettings {
        num_variants: 3,
        num_rounds: 1,
        stages: vec![Stage::Draft],
    });

    let controller = ResearchController::builder()
        .generator(Arc::new(generator.clone()))
        .evaluator(Arc::new(evaluator))
        .config(config)
        .build();

    let state = controller.run("X", 1).await.unwrap();

    let variants = &state.evolution_variants["draft"];
    assert_eq!(variants.len(), 3);
    assert_eq!(variants[1].fitness_score, 4.5);
    assert_eq!(variants[1].feedback, "strong");
    assert_eq!(state.draft, "reviser output");

    let revisions = generator.calls_for(AgentRole::Reviser);
    assert_eq!(revisions.len(), 3);
    assert!(revisions.iter().any(|p| p.ends_with("Text:\nd1")));
    assert!(!state.evolution_variants.contains_key("plan"));
}

#[tokio::test]
async fn evolved_stage_keeps_search_citations() {
    let drafted = Completion::text("draft")
        .with_tool_call(search_call("tavily-search", &["https://a"]));
    let evolved = ResearchConfig::default().with_evolution(EvolutionSettings {
        num_variants: 2,
        num_rounds: 1,
        stages: vec![Stage::Draft],
    });

    for (config, expected) in [
        (ResearchConfig::default(), vec!["https://a"]),
        (evolved, vec!["https://a", "https://a"]),
    ] {
        let controller = ResearchController::builder()
            .generator(Arc::new(
                ScriptedGenerator::new().on(AgentRole::Drafter, drafted.clone()),
            ))
            .evaluator(Arc::new(FixedEvaluator::new(fine())))
            .config(config)
            .build();

        let state = controller.run("X", 1).await.unwrap();
        assert_eq!(state.citations, expected);
    }
}

#[tokio::test]
async fn research_uses_configured_budget() {
    let controller = ResearchController::builder()
        .generator(Arc::new(ScriptedGenerator::new()))
        .evaluator(Arc::new(FixedEvaluator::new(Evaluation::new(1, 1, "poor"))))
        .config(ResearchConfig::default().with_max_iterations(3))
        .build();

    let state = controller.research("X").await.unwrap();
    assert_eq!(state.qa_history.len(), 2);
}

#[test]
fn claude_controller_needs_an_api_key() {
    let result = ResearchController::with_claude(ResearchConfig::default(), None);
    assert!(matches!(result, Err(ResearchError::Config(_))));
}

#[test]
fn claude_controller_rejects_misnamed_search_tool() {
    let config = ResearchConfig {
        anthropic_api_key: "sk-ant-test".to_string(),
        search_tool_name: "web-search".to_string(),
        ..Default::default()
    };

    let misnamed = SearchTool::new(StaticSearcher::new(vec![])).into_dyn();
    let result = ResearchController::with_claude(config.clone(), Some(misnamed));
    assert!(matches!(result, Err(ResearchError::Config(_))));

    let named = SearchTool::new(StaticSearcher::new(vec![]))
        .named("web-search")
        .into_dyn();
    assert!(ResearchController::with_claude(config, Some(named)).is_ok());
}
