// Deterministic doubles for the research pipeline.
//
// - ScriptedGenerator (Generator): per-role replies, call log, injectable failures
// - FixedEvaluator / ScriptedEvaluator (Evaluate): canned or computed verdicts
// - RecordingSession (SearchSession): counts open/close, optional failures
// - StaticSearcher (Searcher): fixed hits
//
// No network, no model. Everything here is safe to share across tasks.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ai_client::Completion;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::evaluator::{Evaluate, Evaluation};
use crate::generator::{AgentRole, Generator};
use crate::search::{SearchHit, SearchSession, Searcher};

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorCall {
    pub role: AgentRole,
    pub input: String,
}

#[derive(Default)]
struct Script {
    /// Consumed front to back; the last reply repeats once the queue runs dry.
    replies: HashMap<AgentRole, VecDeque<Completion>>,
    failing: HashMap<AgentRole, String>,
    calls: Vec<GeneratorCall>,
}

/// Generator answering from a per-role script. Unscripted roles reply
/// `"<role> output"` so a pipeline runs end to end with no setup.
#[derive(Clone, Default)]
pub struct ScriptedGenerator {
    inner: Arc<Mutex<Script>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `role` with `reply`.
    pub fn on(self, role: AgentRole, reply: Completion) -> Self {
        self.script(role, vec![reply])
    }

    /// Answer `role` with `replies` in order, repeating the last one.
    pub fn script(self, role: AgentRole, replies: Vec<Completion>) -> Self {
        self.lock().replies.insert(role, replies.into());
        self
    }

    pub fn fail_on(self, role: AgentRole) -> Self {
        self.fail_with(role, format!("{role} unavailable"))
    }

    pub fn fail_with(self, role: AgentRole, message: impl Into<String>) -> Self {
        self.lock().failing.insert(role, message.into());
        self
    }

    pub fn calls(&self) -> Vec<GeneratorCall> {
        self.lock().calls.clone()
    }

    pub fn calls_for(&self, role: AgentRole) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.role == role)
            .map(|c| c.input.clone())
            .collect()
    }

    pub fn roles_called(&self) -> Vec<AgentRole> {
        self.lock().calls.iter().map(|c| c.role).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, role: AgentRole, input: &str) -> Result<Completion> {
        let mut script = self.lock();
        script.calls.push(GeneratorCall {
            role,
            input: input.to_string(),
        });

        if let Some(message) = script.failing.get(&role) {
            bail!("{message}");
        }

        let reply = match script.replies.get_mut(&role) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        Ok(reply.unwrap_or_else(|| Completion::text(format!("{role} output"))))
    }
}

// ---------------------------------------------------------------------------
// Evaluators
// ---------------------------------------------------------------------------

/// Returns the same evaluation for every text.
pub struct FixedEvaluator {
    evaluation: Evaluation,
    calls: AtomicUsize,
}

impl FixedEvaluator {
    pub fn new(evaluation: Evaluation) -> Self {
        Self {
            evaluation,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Evaluate for FixedEvaluator {
    async fn evaluate(&self, _query: &str, _text: &str) -> Result<Evaluation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.evaluation.clone())
    }
}

enum Verdicts {
    Sequence(VecDeque<Evaluation>),
    ByText(Box<dyn Fn(&str) -> Evaluation + Send + Sync>),
    Failing(String),
}

/// Evaluator driven by a sequence or a function of the evaluated text.
/// Records every text it was asked to score.
pub struct ScriptedEvaluator {
    verdicts: Mutex<Verdicts>,
    seen: Mutex<Vec<String>>,
}

impl ScriptedEvaluator {
    /// Hand out `evaluations` in order, repeating the last one.
    pub fn sequence(evaluations: Vec<Evaluation>) -> Self {
        Self::with(Verdicts::Sequence(evaluations.into()))
    }

    pub fn by_text(f: impl Fn(&str) -> Evaluation + Send + Sync + 'static) -> Self {
        Self::with(Verdicts::ByText(Box::new(f)))
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with(Verdicts::Failing(message.into()))
    }

    fn with(verdicts: Verdicts) -> Self {
        Self {
            verdicts: Mutex::new(verdicts),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn texts_seen(&self) -> Vec<String> {
        self.seen
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Evaluate for ScriptedEvaluator {
    async fn evaluate(&self, _query: &str, text: &str) -> Result<Evaluation> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(text.to_string());
        }

        let mut verdicts = self
            .verdicts
            .lock()
            .map_err(|_| anyhow!("ScriptedEvaluator poisoned"))?;
        match &mut *verdicts {
            Verdicts::Sequence(queue) if queue.len() > 1 => {
                queue.pop_front().ok_or_else(|| anyhow!("no evaluation scripted"))
            }
            Verdicts::Sequence(queue) => queue
                .front()
                .cloned()
                .ok_or_else(|| anyhow!("no evaluation scripted")),
            Verdicts::ByText(f) => Ok(f(text)),
            Verdicts::Failing(message) => bail!("{message}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Search doubles
// ---------------------------------------------------------------------------

/// Session that counts its open/close calls.
#[derive(Default)]
pub struct RecordingSession {
    opened: AtomicUsize,
    closed: AtomicUsize,
    fail_open: bool,
    fail_close: bool,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    pub fn failing_close() -> Self {
        Self {
            fail_close: true,
            ..Self::default()
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchSession for RecordingSession {
    async fn open(&self) -> Result<()> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            bail!("search server did not start");
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            bail!("search server did not stop cleanly");
        }
        Ok(())
    }
}

/// Searcher returning the same hits for every query.
pub struct StaticSearcher {
    hits: Vec<SearchHit>,
    failure: Option<String>,
}

impl StaticSearcher {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            failure: None,
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            hits: Vec::new(),
            failure: Some(message.into()),
        }
    }
}

#[async_trait]
impl Searcher for StaticSearcher {
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        if let Some(message) = &self.failure {
            bail!("{message}");
        }
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }
}
