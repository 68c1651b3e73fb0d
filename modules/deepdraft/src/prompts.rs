//! System prompts and context builders for each role.

use crate::state::QaPair;

pub const PLAN_SYSTEM: &str = "\
You are a strategic planner. Based on the user's query, create a structured research plan. \
Outline the key sections and topics the final report should cover, one per line.";

pub const DRAFT_SYSTEM: &str = "\
You are an expert researcher. Based on the user's query, write a preliminary, high-level \
draft of a research report. It is a starting point and will be refined later.";

pub const QUESTION_SYSTEM: &str = "\
You are a curious researcher. Based on the research plan and the current draft, write one \
targeted search query that fills an information gap or verifies an existing claim. \
Reply with the query only.";

pub const ANSWER_SYSTEM: &str = "\
You are a diligent research assistant. Use the search tool to gather sources for the given \
question, then synthesize a concise and accurate answer grounded in those results.";

pub const REVISE_SYSTEM: &str = "\
You are a meticulous editor. Using the new information and the reviewer feedback, revise \
the previous draft to improve its accuracy, coherence, and comprehensiveness. \
Reply with the full revised draft.";

pub const FINAL_REPORT_SYSTEM: &str = "\
You are a professional writer. Synthesize the research plan and every question-answer pair \
into a final, comprehensive, well-structured research report.";

pub const EVALUATOR_SYSTEM: &str = "\
You are an expert evaluator. Score texts strictly against the rubric and follow the output \
format exactly.";

/// Rubric prompt. The parser in `evaluator` relies on the output format
/// section staying as written.
pub fn evaluation_prompt(query: &str, text: &str) -> String {
    format!(
        "\
Evaluate the quality of the text below against the user's query.

**Criteria:**
- **Helpfulness:** Does the text directly address the user's intent? Is it accurate and easy to understand?
- **Comprehensiveness:** Is any important information missing?

**User query:**
{query}

**Text to evaluate:**
{text}

**Instructions:**
First give your reasoning in a <thinking> block.
Then score Helpfulness and Comprehensiveness from 1 (lowest) to 5 (highest).
Finally give constructive feedback for improvement in a <feedback> block.

**Output format:**
<thinking>...</thinking>
<scores>
Helpfulness: [1-5]
Comprehensiveness: [1-5]
</scores>
<feedback>...</feedback>"
    )
}

pub fn query_context(query: &str) -> String {
    format!("Query: {query}")
}

fn format_plan(plan: &[String]) -> String {
    if plan.is_empty() {
        return "(no plan)".to_string();
    }
    plan.join("\n")
}

pub fn question_context(query: &str, plan: &[String], draft: &str) -> String {
    format!(
        "Query: {query}\n\nPlan:\n{}\n\nDraft:\n{draft}",
        format_plan(plan)
    )
}

pub fn answer_context(question: &str) -> String {
    format!("Question: {question}")
}

pub fn revise_context(draft: &str, question: &str, answer: &str, feedback: Option<&str>) -> String {
    let mut context = format!("Previous Draft:\n{draft}\n\nNew Info:\nQ: {question}\nA: {answer}");
    if let Some(feedback) = feedback.filter(|f| !f.trim().is_empty()) {
        context.push_str("\n\nReviewer Feedback:\n");
        context.push_str(feedback);
    }
    context
}

pub fn final_context(query: &str, plan: &[String], qa_history: &[QaPair]) -> String {
    let evidence = qa_history
        .iter()
        .map(|qa| format!("Q: {}\nA: {}", qa.question, qa.answer))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Query: {query}\n\nPlan:\n{}\n\nResearch:\n{}",
        format_plan(plan),
        if evidence.is_empty() { "(none)" } else { evidence.as_str() }
    )
}

/// Revision prompt for one evolution candidate, built from its own feedback.
pub fn variant_revision_prompt(content: &str, feedback: &str) -> String {
    format!(
        "Improve the following text using the reviewer feedback.\n\n\
         Reviewer Feedback:\n{feedback}\n\nText:\n{content}"
    )
}
