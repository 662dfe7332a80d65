//! Integration test: COTHERF batch scoring, trait batches, and configuration validation.
//!
//! ## Scenario
//! 1. Identical exchanges give a mean equal to the single score and zero deviation.
//! 2. The concurrent batch keeps input order and matches the sequential batch.
//! 3. A token cancelled up front yields an empty, cancelled batch.
//! 4. A token cancelled mid-batch keeps the item in flight and stops scheduling the rest.
//! 5. Weights that do not sum to one are rejected at load time.

use cotherapist_core::config::{EvaluationConfig, PsychometricConfig};
use cotherapist_core::evaluation::{DimensionScorer, EvaluationItem, Exchange};
use cotherapist_core::{
    ConfigurationError, CotherfEvaluator, Dimension, EvaluationError, Lexicon, Pipeline,
    PipelineConfig, Trait, TraitsAnalyzer,
};
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn evaluator() -> Arc<CotherfEvaluator> {
    Arc::new(CotherfEvaluator::new(&EvaluationConfig::default(), Lexicon::shared()).unwrap())
}

fn analyzer() -> Arc<TraitsAnalyzer> {
    Arc::new(TraitsAnalyzer::new(PsychometricConfig::default(), Lexicon::shared()).unwrap())
}

fn varied_items(n: usize) -> Vec<EvaluationItem> {
    let responses = [
        "I understand. That sounds really difficult, and it makes sense to feel this way.",
        "Try a short walk.",
        "It sounds like work has been overwhelming. Would it help to plan one small step together?",
        "Many people find that journaling helps. First, write what happened. Then, note how you felt.",
    ];
    (0..n)
        .map(|i| {
            EvaluationItem::new(
                &format!("I feel anxious about work, day {}", i),
                responses[i % responses.len()],
            )
        })
        .collect()
}

#[test]
fn identical_pairs_have_zero_spread() {
    let e = evaluator();
    let single = e.evaluate("I feel sad", "I hear you. Feeling sad is valid.").unwrap();
    let items: Vec<EvaluationItem> = (0..7)
        .map(|_| EvaluationItem::new("I feel sad", "I hear you. Feeling sad is valid."))
        .collect();
    let batch = e.batch_evaluate(&items).unwrap();
    let overall = &batch.stats["overall"];
    assert_eq!(overall.mean, single.overall);
    assert_eq!(overall.std, 0.0);
    assert_eq!(overall.count, 7);
    for d in Dimension::ALL {
        let s = &batch.stats[d.as_str()];
        assert_eq!(Some(s.mean), single.get(d), "{} mean", d.as_str());
        assert_eq!(s.std, 0.0, "{} std", d.as_str());
    }
}

#[test]
fn scores_stay_in_unit_interval_and_repeat_exactly() {
    let e = evaluator();
    for item in varied_items(8) {
        let a = e.evaluate(&item.query, &item.response).unwrap();
        let b = e.evaluate(&item.query, &item.response).unwrap();
        assert_eq!(a, b, "evaluation must be deterministic");
        assert!((0.0..=1.0).contains(&a.overall));
        for value in a.dimension_scores.values() {
            assert!((0.0..=1.0).contains(value));
        }
    }
}

#[test]
fn empty_batch_is_an_error() {
    assert_eq!(evaluator().batch_evaluate(&[]), Err(EvaluationError::EmptyBatch));
}

#[tokio::test]
async fn concurrent_batch_matches_sequential() {
    let items = varied_items(40);
    let e = evaluator();
    let sequential = e.batch_evaluate(&items).unwrap();
    let concurrent = Arc::clone(&e)
        .batch_evaluate_concurrent(items, 4, CancellationToken::new())
        .await
        .unwrap();
    assert!(!concurrent.cancelled);
    assert_eq!(concurrent.scores, sequential.scores, "input order is preserved");
    assert_eq!(concurrent.stats, sequential.stats);
}

#[tokio::test]
async fn cancelled_token_stops_scheduling() {
    let token = CancellationToken::new();
    token.cancel();
    let batch = evaluator()
        .batch_evaluate_concurrent(varied_items(10), 2, token)
        .await
        .unwrap();
    assert!(batch.cancelled);
    assert!(batch.scores.is_empty());
    assert!(batch.stats.is_empty());
}

/// Scores by response length and cancels `token` while scoring the item whose query
/// contains `trigger`.
struct CancelOnQuery {
    trigger: &'static str,
    token: CancellationToken,
}

impl DimensionScorer for CancelOnQuery {
    fn name(&self) -> &str {
        "length"
    }

    fn score(&self, exchange: &Exchange<'_>) -> f64 {
        if exchange.query.contains(self.trigger) {
            self.token.cancel();
        }
        (exchange.response.len() as f64 / 100.0).min(1.0)
    }
}

fn cancelling_evaluator(token: CancellationToken) -> Arc<CotherfEvaluator> {
    let weights = BTreeMap::from([("length".to_string(), 1.0)]);
    let scorer = CancelOnQuery {
        trigger: "day 2",
        token,
    };
    Arc::new(CotherfEvaluator::with_scorers(vec![Box::new(scorer) as Box<dyn DimensionScorer>], &weights, Lexicon::shared()).unwrap())
}

#[tokio::test]
async fn cancelling_mid_batch_keeps_completed_items_in_order() {
    let items = varied_items(10);
    let token = CancellationToken::new();
    let batch = cancelling_evaluator(token.clone())
        .batch_evaluate_concurrent(items.clone(), 1, token.clone())
        .await
        .unwrap();

    assert!(token.is_cancelled());
    assert!(batch.cancelled);
    // items 0 and 1 completed, item 2 was in flight when the token fired
    assert_eq!(batch.scores.len(), 3);
    assert!(batch.scores.len() < items.len());
    assert_eq!(batch.stats["overall"].count, 3);

    let reference = cancelling_evaluator(CancellationToken::new())
        .batch_evaluate(&items[..3])
        .unwrap();
    assert_eq!(batch.scores, reference.scores, "completed items keep input order");
}

#[test]
fn neutral_text_scores_exactly_half() {
    let profile = analyzer().analyze("The meeting is on Tuesday at noon.").unwrap();
    for t in Trait::ALL {
        assert_eq!(profile.get(t), 0.5, "{}", t.as_str());
    }
}

#[tokio::test]
async fn concurrent_trait_batch_matches_sequential() {
    let texts: Vec<String> = varied_items(12).into_iter().map(|i| i.response).collect();
    let a = analyzer();
    let sequential = a.batch_analyze(&texts).unwrap();
    let concurrent = Arc::clone(&a)
        .batch_analyze_concurrent(texts, 3, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(concurrent.profiles, sequential.profiles);
    assert_eq!(concurrent.labels, sequential.labels);
}

#[test]
fn weights_off_by_more_than_epsilon_are_rejected() {
    let toml = r#"
        [evaluation.weights]
        empathy = 0.30
        relevance = 0.20
        informativeness = 0.15
        safety = 0.20
        therapeutic_alliance = 0.10
        clinical_accuracy = 0.10
    "#;
    let err = PipelineConfig::from_toml_str(toml).unwrap_err();
    assert!(matches!(err, ConfigurationError::WeightSum { .. }), "got {err:?}");
}

#[test]
fn config_file_overrides_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        "[agentic]\nmax_reasoning_steps = 4\n\n[retrieval]\ntop_k = 2\nsimilarity_threshold = 0.8"
    )
    .unwrap();
    let cfg = PipelineConfig::load_from(file.path()).unwrap();
    assert_eq!(cfg.agentic.max_reasoning_steps, 4);
    assert_eq!(cfg.retrieval.top_k, 2);
    assert_eq!(cfg.retrieval.similarity_threshold, 0.8);
    assert_eq!(cfg.agentic.refinement_budget, 1, "unspecified fields keep defaults");

    let pipeline = Pipeline::builder(cfg)
        .generator(Arc::new(cotherapist_core::doubles::ScriptedGenerator::constant("ok")))
        .build();
    assert!(pipeline.is_ok());
}
