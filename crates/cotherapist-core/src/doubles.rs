//! Deterministic stand-ins for the external services.

use crate::clients::{GenerationClient, GenerationParams, RetrievalClient, RetrievedContext, ToxicityClassifier};
use crate::error::{Service, ServiceError, ServiceResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const DEFAULT_REPLY: &str = "It sounds like you are carrying a lot right now. I am here to listen.";

/// One recorded generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub prompt: String,
    pub params: GenerationParams,
}

/// Replies from a queue; once empty, repeats the fallback reply.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<String>>,
    fallback: String,
    calls: AtomicUsize,
    fail_at: Option<usize>,
    delay: Option<Duration>,
    recorded: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            fallback: DEFAULT_REPLY.to_string(),
            calls: AtomicUsize::new(0),
            fail_at: None,
            delay: None,
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Always answers `reply`.
    pub fn constant(reply: &str) -> Self {
        Self::new(Vec::<String>::new()).with_fallback(reply)
    }

    pub fn with_fallback(mut self, reply: &str) -> Self {
        self.fallback = reply.to_string();
        self
    }

    /// Fail the `n`th call (1-based) with `ServiceError::Failed`.
    pub fn failing_at(mut self, n: usize) -> Self {
        self.fail_at = Some(n);
        self
    }

    /// Sleep before answering; used to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.recorded.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl GenerationClient for ScriptedGenerator {
    async fn generate(&self, prompt: &str, params: GenerationParams) -> ServiceResult<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut recorded) = self.recorded.lock() {
            recorded.push(RecordedCall {
                prompt: prompt.to_string(),
                params,
            });
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_at == Some(n) {
            return Err(ServiceError::failed(
                Service::Generation,
                format!("scripted failure at call {}", n),
            ));
        }
        let next = self.replies.lock().ok().and_then(|mut q| q.pop_front());
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Returns the same snippets for every query, truncated to `top_k`.
pub struct StaticRetriever {
    snippets: Vec<RetrievedContext>,
    calls: AtomicUsize,
}

impl StaticRetriever {
    pub fn new(snippets: Vec<RetrievedContext>) -> Self {
        Self {
            snippets,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn from_pairs(pairs: &[(&str, f64)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|(text, similarity)| RetrievedContext {
                    text: text.to_string(),
                    similarity: *similarity,
                })
                .collect(),
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RetrievalClient for StaticRetriever {
    async fn retrieve(&self, _query: &str, top_k: usize) -> ServiceResult<Vec<RetrievedContext>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.snippets.iter().take(top_k).cloned().collect())
    }
}

pub struct FailingRetriever;

#[async_trait]
impl RetrievalClient for FailingRetriever {
    async fn retrieve(&self, _query: &str, _top_k: usize) -> ServiceResult<Vec<RetrievedContext>> {
        Err(ServiceError::failed(Service::Retrieval, "index unavailable"))
    }
}

/// Scores every text with the same value.
pub struct FixedToxicity(pub f64);

#[async_trait]
impl ToxicityClassifier for FixedToxicity {
    async fn score(&self, _text: &str) -> ServiceResult<f64> {
        Ok(self.0)
    }
}

/// Scores 1.0 when the text contains any marker (case-insensitive), else 0.0.
pub struct MarkerToxicity(pub Vec<String>);

#[async_trait]
impl ToxicityClassifier for MarkerToxicity {
    async fn score(&self, text: &str) -> ServiceResult<f64> {
        let lowered = text.to_lowercase();
        let hit = self.0.iter().any(|m| lowered.contains(&m.to_lowercase()));
        Ok(if hit { 1.0 } else { 0.0 })
    }
}

pub struct FailingToxicity;

#[async_trait]
impl ToxicityClassifier for FailingToxicity {
    async fn score(&self, _text: &str) -> ServiceResult<f64> {
        Err(ServiceError::failed(Service::Toxicity, "classifier offline"))
    }
}
