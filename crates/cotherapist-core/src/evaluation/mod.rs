//! COTHERF: six weighted heuristic dimensions scored over a (query, response) pair.
//!
//! Scorers are registered in an ordered table with their weights. Aggregation and batch
//! reduction never look at a scorer's internals, so dimensions can be swapped or added
//! by constructing the evaluator with a different table.

pub mod scorers;

use crate::config::{validate_weights, EvaluationConfig};
use crate::error::{ConfigResult, ConfigurationError, EvaluationError};
use crate::lexicon::{DimensionLexicon, Lexicon, TextView};
use crate::stats::Summary;
use futures_util::{future, stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const TARGET: &str = "cotherapist::evaluation";

/// Key under which batch statistics for the weighted total are stored.
pub const OVERALL: &str = "overall";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Empathy,
    Relevance,
    Informativeness,
    Safety,
    TherapeuticAlliance,
    ClinicalAccuracy,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Empathy,
        Dimension::Relevance,
        Dimension::Informativeness,
        Dimension::Safety,
        Dimension::TherapeuticAlliance,
        Dimension::ClinicalAccuracy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Empathy => "empathy",
            Dimension::Relevance => "relevance",
            Dimension::Informativeness => "informativeness",
            Dimension::Safety => "safety",
            Dimension::TherapeuticAlliance => "therapeutic_alliance",
            Dimension::ClinicalAccuracy => "clinical_accuracy",
        }
    }

    pub fn default_weight(&self) -> f64 {
        match self {
            Dimension::Empathy | Dimension::Safety => 0.25,
            Dimension::Relevance | Dimension::Informativeness => 0.15,
            Dimension::TherapeuticAlliance | Dimension::ClinicalAccuracy => 0.10,
        }
    }

    pub fn from_name(name: &str) -> Option<Dimension> {
        Dimension::ALL.iter().copied().find(|d| d.as_str() == name)
    }
}

/// Safety facts about the exchange being scored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationContext {
    pub crisis_detected: bool,
    pub toxicity_score: Option<f64>,
}

/// Everything a scorer may look at. Views are normalized once per evaluation.
pub struct Exchange<'a> {
    pub query: &'a str,
    pub response: &'a str,
    pub query_view: &'a TextView,
    pub response_view: &'a TextView,
    pub context: &'a EvaluationContext,
    pub lexicon: &'a DimensionLexicon,
}

/// One COTHERF dimension. Must be deterministic; the evaluator clamps the result to [0, 1].
pub trait DimensionScorer: Send + Sync {
    fn name(&self) -> &str;
    fn score(&self, exchange: &Exchange<'_>) -> f64;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationScore {
    pub dimension_scores: BTreeMap<String, f64>,
    pub weights: BTreeMap<String, f64>,
    pub overall: f64,
}

impl EvaluationScore {
    pub fn get(&self, dimension: Dimension) -> Option<f64> {
        self.dimension_scores.get(dimension.as_str()).copied()
    }
}

/// Input row for batch evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationItem {
    pub query: String,
    pub response: String,
    #[serde(default)]
    pub context: EvaluationContext,
}

impl EvaluationItem {
    pub fn new(query: &str, response: &str) -> Self {
        Self {
            query: query.to_string(),
            response: response.to_string(),
            context: EvaluationContext::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEvaluation {
    /// Scores in input order. Shorter than the input when cancelled.
    pub scores: Vec<EvaluationScore>,
    /// Per dimension plus `overall`. Empty when nothing completed.
    pub stats: BTreeMap<String, Summary>,
    pub cancelled: bool,
}

/// NaN and infinities are errors; everything else is clamped into [0, 1].
fn clamp_score(name: &str, value: f64) -> Result<f64, EvaluationError> {
    if value.is_finite() {
        Ok(value.clamp(0.0, 1.0))
    } else {
        Err(EvaluationError::NonFinite {
            name: name.to_string(),
        })
    }
}

pub struct CotherfEvaluator {
    scorers: Vec<(Box<dyn DimensionScorer>, f64)>,
    lexicon: Arc<Lexicon>,
}

impl CotherfEvaluator {
    /// The six built-in dimensions weighted by `config.weights`.
    pub fn new(config: &EvaluationConfig, lexicon: Arc<Lexicon>) -> ConfigResult<Self> {
        let builtin: Vec<Box<dyn DimensionScorer>> = vec![
            Box::new(scorers::Empathy),
            Box::new(scorers::Relevance),
            Box::new(scorers::Informativeness),
            Box::new(scorers::Safety),
            Box::new(scorers::TherapeuticAlliance),
            Box::new(scorers::ClinicalAccuracy),
        ];
        Self::with_scorers(builtin, &config.weights, lexicon)
    }

    /// Custom scorer table. Every scorer needs a weight and every weight a scorer.
    pub fn with_scorers(
        scorers: Vec<Box<dyn DimensionScorer>>,
        weights: &BTreeMap<String, f64>,
        lexicon: Arc<Lexicon>,
    ) -> ConfigResult<Self> {
        validate_weights(weights)?;

        let mut seen = Vec::with_capacity(scorers.len());
        let mut table = Vec::with_capacity(scorers.len());
        for scorer in scorers {
            let name = scorer.name().to_string();
            if seen.contains(&name) {
                return Err(ConfigurationError::WeightKeys(format!(
                    "dimension `{}` registered twice",
                    name
                )));
            }
            let weight = weights.get(&name).copied().ok_or_else(|| {
                ConfigurationError::WeightKeys(format!("no weight for dimension `{}`", name))
            })?;
            seen.push(name);
            table.push((scorer, weight));
        }
        if let Some(extra) = weights.keys().find(|k| !seen.contains(k)) {
            return Err(ConfigurationError::WeightKeys(format!(
                "weight `{}` has no registered scorer",
                extra
            )));
        }

        Ok(Self {
            scorers: table,
            lexicon,
        })
    }

    pub fn dimension_names(&self) -> Vec<&str> {
        self.scorers.iter().map(|(s, _)| s.name()).collect()
    }

    pub fn evaluate(&self, query: &str, response: &str) -> Result<EvaluationScore, EvaluationError> {
        self.evaluate_in_context(query, response, &EvaluationContext::default())
    }

    pub fn evaluate_in_context(
        &self,
        query: &str,
        response: &str,
        context: &EvaluationContext,
    ) -> Result<EvaluationScore, EvaluationError> {
        let query_view = TextView::new(query);
        let response_view = TextView::new(response);
        let exchange = Exchange {
            query,
            response,
            query_view: &query_view,
            response_view: &response_view,
            context,
            lexicon: &self.lexicon.dimensions,
        };

        let mut dimension_scores = BTreeMap::new();
        let mut weights = BTreeMap::new();
        let mut overall = 0.0;
        for (scorer, weight) in &self.scorers {
            let value = clamp_score(scorer.name(), scorer.score(&exchange))?;
            overall += weight * value;
            dimension_scores.insert(scorer.name().to_string(), value);
            weights.insert(scorer.name().to_string(), *weight);
        }
        let overall = clamp_score(OVERALL, overall)?;

        debug!(target: TARGET, overall, "exchange evaluated");
        Ok(EvaluationScore {
            dimension_scores,
            weights,
            overall,
        })
    }

    /// Sequential batch evaluation.
    pub fn batch_evaluate(&self, items: &[EvaluationItem]) -> Result<BatchEvaluation, EvaluationError> {
        if items.is_empty() {
            return Err(EvaluationError::EmptyBatch);
        }
        let scores = items
            .iter()
            .map(|i| self.evaluate_in_context(&i.query, &i.response, &i.context))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.reduce(scores, false))
    }

    /// Batch evaluation on at most `workers` blocking tasks. Cancelling `cancel` stops new
    /// items from being scheduled; items already running finish and are included.
    pub async fn batch_evaluate_concurrent(
        self: Arc<Self>,
        items: Vec<EvaluationItem>,
        workers: usize,
        cancel: CancellationToken,
    ) -> Result<BatchEvaluation, EvaluationError> {
        if items.is_empty() {
            return Err(EvaluationError::EmptyBatch);
        }
        let total = items.len();
        let gate = cancel.clone();

        let mut indexed: Vec<(usize, EvaluationScore)> = stream::iter(items.into_iter().enumerate())
            .take_while(move |_| future::ready(!gate.is_cancelled()))
            .map(|(index, item)| {
                let evaluator = Arc::clone(&self);
                async move {
                    tokio::task::spawn_blocking(move || {
                        evaluator
                            .evaluate_in_context(&item.query, &item.response, &item.context)
                            .map(|score| (index, score))
                    })
                    .await
                    .map_err(|e| EvaluationError::Worker(e.to_string()))?
                }
            })
            .buffer_unordered(workers.max(1))
            .try_collect()
            .await?;

        indexed.sort_by_key(|(index, _)| *index);
        let cancelled = indexed.len() < total;
        if cancelled {
            info!(
                target: TARGET,
                completed = indexed.len(),
                total,
                "batch evaluation cancelled"
            );
        }
        let scores = indexed.into_iter().map(|(_, s)| s).collect();
        Ok(self.reduce(scores, cancelled))
    }

    fn reduce(&self, scores: Vec<EvaluationScore>, cancelled: bool) -> BatchEvaluation {
        let mut stats = BTreeMap::new();
        for (scorer, _) in &self.scorers {
            let values: Vec<f64> = scores
                .iter()
                .filter_map(|s| s.dimension_scores.get(scorer.name()).copied())
                .collect();
            if let Some(summary) = Summary::of(&values) {
                stats.insert(scorer.name().to_string(), summary);
            }
        }
        let overall: Vec<f64> = scores.iter().map(|s| s.overall).collect();
        if let Some(summary) = Summary::of(&overall) {
            stats.insert(OVERALL.to_string(), summary);
        }
        BatchEvaluation {
            scores,
            stats,
            cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator() -> CotherfEvaluator {
        CotherfEvaluator::new(&EvaluationConfig::default(), Lexicon::shared()).unwrap()
    }

    struct Broken;

    impl DimensionScorer for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn score(&self, _exchange: &Exchange<'_>) -> f64 {
            f64::NAN
        }
    }

    struct Overshoot;

    impl DimensionScorer for Overshoot {
        fn name(&self) -> &str {
            "overshoot"
        }

        fn score(&self, _exchange: &Exchange<'_>) -> f64 {
            7.5
        }
    }

    #[test]
    fn overall_is_weighted_sum() {
        let score = evaluator()
            .evaluate("I feel anxious", "I understand. Try slow breathing together.")
            .unwrap();
        let expected: f64 = score
            .dimension_scores
            .iter()
            .map(|(k, v)| v * score.weights[k])
            .sum();
        assert!((score.overall - expected).abs() < 1e-12);
        assert_eq!(score.dimension_scores.len(), 6);
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let e = evaluator();
        let long = "understand feel valid together care research ".repeat(200);
        for (q, r) in [
            ("", ""),
            ("?", "you have definitely diagnose prescribe your fault blame"),
            ("word", long.as_str()),
        ] {
            let s = e.evaluate(q, r).unwrap();
            assert!((0.0..=1.0).contains(&s.overall));
            assert!(s.dimension_scores.values().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn evaluation_is_deterministic() {
        let e = evaluator();
        let a = e.evaluate("How can I sleep?", "You might try a routine.").unwrap();
        let b = e.evaluate("How can I sleep?", "You might try a routine.").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn out_of_range_scorer_is_clamped() {
        let mut weights = BTreeMap::new();
        weights.insert("overshoot".to_string(), 1.0);
        let e = CotherfEvaluator::with_scorers(vec![Box::new(Overshoot)], &weights, Lexicon::shared()).unwrap();
        assert_eq!(e.evaluate("q", "r").unwrap().overall, 1.0);
    }

    #[test]
    fn non_finite_scorer_is_an_error() {
        let mut weights = BTreeMap::new();
        weights.insert("broken".to_string(), 1.0);
        let e = CotherfEvaluator::with_scorers(vec![Box::new(Broken)], &weights, Lexicon::shared()).unwrap();
        assert!(matches!(
            e.evaluate("q", "r"),
            Err(EvaluationError::NonFinite { .. })
        ));
    }

    #[test]
    fn missing_weight_is_rejected() {
        let mut weights = BTreeMap::new();
        weights.insert("empathy".to_string(), 1.0);
        let err = CotherfEvaluator::new(&EvaluationConfig { weights }, Lexicon::shared())
            .err()
            .unwrap();
        assert!(matches!(err, ConfigurationError::WeightKeys(_)));
    }

    #[test]
    fn batch_of_identical_pairs_matches_single() {
        let e = evaluator();
        let single = e.evaluate("I feel low", "That sounds hard; I'm here for you.").unwrap();
        let items = vec![EvaluationItem::new("I feel low", "That sounds hard; I'm here for you."); 5];
        let batch = e.batch_evaluate(&items).unwrap();
        assert_eq!(batch.stats[OVERALL].mean, single.overall);
        assert_eq!(batch.stats[OVERALL].std, 0.0);
        for (name, value) in &single.dimension_scores {
            assert_eq!(batch.stats[name].mean, *value);
            assert_eq!(batch.stats[name].std, 0.0);
        }
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert_eq!(evaluator().batch_evaluate(&[]), Err(EvaluationError::EmptyBatch));
    }
}
