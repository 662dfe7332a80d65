//! Interfaces to the external collaborators: generation, retrieval, toxicity scoring.
//!
//! The core only depends on these traits. Concrete backends live in `openrouter` (live) and
//! `doubles` (deterministic, for tests and offline runs).

use crate::error::{Service, ServiceError, ServiceResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

const TARGET: &str = "cotherapist::clients";

/// Sampling parameters for one generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_new_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_new_tokens: 512,
        }
    }
}

/// Turns a prompt into response text.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, prompt: &str, params: GenerationParams) -> ServiceResult<String>;

    /// Backend name for logs.
    fn name(&self) -> &str {
        "generation"
    }
}

/// One retrieved snippet with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub text: String,
    pub similarity: f64,
}

/// Returns ranked context snippets for a query, best first.
#[async_trait]
pub trait RetrievalClient: Send + Sync {
    async fn retrieve(&self, query: &str, top_k: usize) -> ServiceResult<Vec<RetrievedContext>>;
}

/// Scores text toxicity in [0, 1].
#[async_trait]
pub trait ToxicityClassifier: Send + Sync {
    async fn score(&self, text: &str) -> ServiceResult<f64>;
}

/// Run `fut` with a deadline; elapsed maps to `ServiceError::Timeout` for `service`.
pub async fn with_timeout<T, F>(service: Service, timeout_ms: u64, fut: F) -> ServiceResult<T>
where
    F: Future<Output = ServiceResult<T>>,
{
    match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(target: TARGET, %service, timeout_ms, "call timed out");
            Err(ServiceError::Timeout {
                service,
                timeout_ms,
            })
        }
    }
}

/// Keep snippets at or above `threshold`, in retrieval order, at most `top_k`.
pub fn filter_context(
    snippets: Vec<RetrievedContext>,
    threshold: f64,
    top_k: usize,
) -> Vec<RetrievedContext> {
    snippets
        .into_iter()
        .filter(|c| c.similarity.is_finite() && c.similarity >= threshold && !c.text.trim().is_empty())
        .take(top_k)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(text: &str, similarity: f64) -> RetrievedContext {
        RetrievedContext {
            text: text.to_string(),
            similarity,
        }
    }

    #[test]
    fn filter_applies_threshold_then_cap() {
        let kept = filter_context(
            vec![ctx("a", 0.9), ctx("b", 0.2), ctx("c", 0.6), ctx("d", 0.55), ctx("e", 0.8)],
            0.5,
            3,
        );
        let texts: Vec<&str> = kept.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "c", "d"]);
    }

    #[test]
    fn filter_drops_nan_scores() {
        assert!(filter_context(vec![ctx("x", f64::NAN)], 0.0, 3).is_empty());
    }

    #[tokio::test]
    async fn timeout_maps_to_service_error() {
        let result: ServiceResult<()> = with_timeout(Service::Retrieval, 10, async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;
        assert_eq!(
            result,
            Err(ServiceError::Timeout {
                service: Service::Retrieval,
                timeout_ms: 10
            })
        );
    }
}
