use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline stage, used to name where a run failed and to key evolution scratch space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Plan,
    Draft,
    Evaluate,
    Question,
    Answer,
    Revise,
    Finalize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Plan => "plan",
            Stage::Draft => "draft",
            Stage::Evaluate => "evaluate",
            Stage::Question => "question",
            Stage::Answer => "answer",
            Stage::Revise => "revise",
            Stage::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Stage '{stage}' failed: {source:#}")]
    Stage {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },

    #[error("Stage '{0}' produced empty output")]
    EmptyOutput(Stage),

    #[error("Search session error: {0:#}")]
    Session(anyhow::Error),
}

impl ResearchError {
    /// The stage a run failed in, if the failure came from one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ResearchError::Stage { stage, .. } | ResearchError::EmptyOutput(stage) => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T, E = ResearchError> = std::result::Result<T, E>;

/// Tag a collaborator failure with the stage it happened in.
pub trait StageContext<T> {
    fn with_stage(self, stage: Stage) -> Result<T>;
}

impl<T> StageContext<T> for anyhow::Result<T> {
    fn with_stage(self, stage: Stage) -> Result<T> {
        self.map_err(|source| ResearchError::Stage { stage, source })
    }
}
