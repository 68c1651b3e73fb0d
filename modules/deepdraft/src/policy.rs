//! Continue/stop rule consulted once per loop pass.
//!
//! Rules, first match wins:
//! 1. iteration budget reached → stop
//! 2. either score below [`SCORE_THRESHOLD`] → continue
//! 3. feedback mentions a [`CONTINUE_TRIGGERS`] phrase → continue
//! 4. otherwise → stop

use std::fmt;

use crate::evaluator::Scores;

pub const SCORE_THRESHOLD: u8 = 4;

/// Case-insensitive phrases that keep a good-scoring draft in the loop.
pub const CONTINUE_TRIGGERS: [&str; 2] = ["missing", "more detailed"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue(ContinueReason),
    Stop(StopReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinueReason {
    LowScores,
    ActionableFeedback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    BudgetExhausted,
    QualityReached,
}

impl Decision {
    pub fn should_continue(&self) -> bool {
        matches!(self, Decision::Continue(_))
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Continue(ContinueReason::LowScores) => {
                f.write_str("continue: scores below threshold")
            }
            Decision::Continue(ContinueReason::ActionableFeedback) => {
                f.write_str("continue: feedback asks for more")
            }
            Decision::Stop(StopReason::BudgetExhausted) => {
                f.write_str("stop: iteration budget reached")
            }
            Decision::Stop(StopReason::QualityReached) => {
                f.write_str("stop: scores good, feedback general")
            }
        }
    }
}

/// Decide with the reason attached. `current_iteration` is 1-indexed.
pub fn evaluate_decision(
    current_iteration: usize,
    max_iterations: usize,
    scores: Scores,
    feedback: &str,
) -> Decision {
    if current_iteration >= max_iterations {
        return Decision::Stop(StopReason::BudgetExhausted);
    }

    if scores.helpfulness < SCORE_THRESHOLD || scores.comprehensiveness < SCORE_THRESHOLD {
        return Decision::Continue(ContinueReason::LowScores);
    }

    let feedback = feedback.to_lowercase();
    if CONTINUE_TRIGGERS
        .iter()
        .any(|trigger| feedback.contains(trigger))
    {
        return Decision::Continue(ContinueReason::ActionableFeedback);
    }

    Decision::Stop(StopReason::QualityReached)
}

/// `true` to run another revise pass.
pub fn decide(
    current_iteration: usize,
    max_iterations: usize,
    scores: Scores,
    feedback: &str,
) -> bool {
    evaluate_decision(current_iteration, max_iterations, scores, feedback).should_continue()
}
