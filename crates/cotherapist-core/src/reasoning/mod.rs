//! Bounded analyze → assess → draft → critique → refine → reflect loop.
//!
//! The controller is an explicit state machine (`state::next`) driven by a step counter.
//! Every trace entry consumes one unit of `max_reasoning_steps`; only `AssessNeeds` is
//! non-generative, so generative calls never exceed the trace length.

pub mod critique;
pub mod needs;
pub mod prompts;
pub mod state;

pub use needs::{NeedCategory, NeedsAssessment};
pub use state::{ReasoningState, Signal, StepName, TransitionContext};

use crate::clients::{with_timeout, GenerationClient, GenerationParams, RetrievedContext};
use crate::config::{AgenticConfig, GenerationConfig};
use crate::error::{ConfigResult, ConfigurationError, Service, ServiceError, ServiceResult};
use crate::lexicon::Lexicon;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const TARGET: &str = "cotherapist::reasoning";

const ANALYZE_TOKENS: u32 = 200;
const CRITIQUE_TOKENS: u32 = 150;
const CRITIQUE_TEMPERATURE: f32 = 0.2;
const REFINE_TOKENS: u32 = 300;
const REFLECT_TOKENS: u32 = 150;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub step: StepName,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasoningTrace {
    entries: Vec<TraceEntry>,
}

impl ReasoningTrace {
    fn push(&mut self, step: StepName, content: impl Into<String>) {
        self.entries.push(TraceEntry {
            step,
            content: content.into(),
        });
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn steps(&self) -> Vec<StepName> {
        self.entries.iter().map(|e| e.step).collect()
    }

    pub fn count(&self, step: StepName) -> usize {
        self.entries.iter().filter(|e| e.step == step).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReasoningOutcome {
    Completed {
        response: String,
        trace: ReasoningTrace,
        generative_calls: usize,
        refinements: usize,
    },
    /// Needs assessment flagged crisis; the caller must use the fixed crisis message.
    Crisis { trace: ReasoningTrace },
}

impl ReasoningOutcome {
    pub fn trace(&self) -> &ReasoningTrace {
        match self {
            ReasoningOutcome::Completed { trace, .. } | ReasoningOutcome::Crisis { trace } => trace,
        }
    }
}

pub struct ReasoningController {
    config: AgenticConfig,
    generation: GenerationConfig,
    lexicon: Arc<Lexicon>,
    generator: Arc<dyn GenerationClient>,
}

/// Per-request working state.
#[derive(Default)]
struct Scratch {
    trace: ReasoningTrace,
    generative_calls: usize,
    refinements: usize,
    analysis: Option<String>,
    needs: String,
    latest: Option<String>,
    last_critique: String,
}

impl ReasoningController {
    pub fn new(
        config: AgenticConfig,
        generation: GenerationConfig,
        lexicon: Arc<Lexicon>,
        generator: Arc<dyn GenerationClient>,
    ) -> ConfigResult<Self> {
        if config.max_reasoning_steps < 2 {
            return Err(ConfigurationError::Threshold {
                name: "agentic.max_reasoning_steps".to_string(),
                value: config.max_reasoning_steps as f64,
                expected: ">= 2",
            });
        }
        let threshold = config.critique_threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigurationError::Threshold {
                name: "agentic.critique_threshold".to_string(),
                value: threshold,
                expected: "within [0, 1]",
            });
        }
        Ok(Self {
            config,
            generation,
            lexicon,
            generator,
        })
    }

    fn transition_context(&self, scratch: &Scratch) -> TransitionContext {
        TransitionContext {
            remaining_steps: self
                .config
                .max_reasoning_steps
                .saturating_sub(scratch.trace.len()),
            refinements_used: scratch.refinements,
            refinement_budget: self.config.refinement_budget,
            chain_of_thought: self.config.chain_of_thought,
            self_critique: self.config.self_critique,
            reflection: self.config.reflection,
        }
    }

    async fn call(
        &self,
        scratch: &mut Scratch,
        prompt: &str,
        params: GenerationParams,
    ) -> ServiceResult<String> {
        scratch.generative_calls += 1;
        with_timeout(
            Service::Generation,
            self.generation.timeout_ms,
            self.generator.generate(prompt, params),
        )
        .await
    }

    fn params(&self, max_new_tokens: u32) -> GenerationParams {
        GenerationParams {
            temperature: self.generation.temperature,
            max_new_tokens,
        }
    }

    /// Run the loop for one query. Any generation failure aborts the whole run.
    pub async fn run(
        &self,
        request_id: Uuid,
        query: &str,
        context: &[RetrievedContext],
    ) -> ServiceResult<ReasoningOutcome> {
        let mut scratch = Scratch::default();
        let mut state = state::initial(&self.transition_context(&scratch));

        loop {
            let step = match state {
                ReasoningState::Step(step) => step,
                ReasoningState::Done => break,
                ReasoningState::Crisis => {
                    warn!(
                        target: TARGET,
                        %request_id,
                        "needs assessment flagged crisis, abandoning generation"
                    );
                    return Ok(ReasoningOutcome::Crisis {
                        trace: scratch.trace,
                    });
                }
            };
            debug!(
                target: TARGET,
                %request_id,
                step = step.as_str(),
                used = scratch.trace.len(),
                max = self.config.max_reasoning_steps,
                "reasoning step"
            );

            let signal = self.execute(step, query, context, &mut scratch).await?;
            state = state::next(state, signal, &self.transition_context(&scratch));
        }

        let response = scratch.latest.ok_or_else(|| {
            ServiceError::failed(Service::Generation, "reasoning finished without a draft")
        })?;
        Ok(ReasoningOutcome::Completed {
            response,
            trace: scratch.trace,
            generative_calls: scratch.generative_calls,
            refinements: scratch.refinements,
        })
    }

    async fn execute(
        &self,
        step: StepName,
        query: &str,
        context: &[RetrievedContext],
        scratch: &mut Scratch,
    ) -> ServiceResult<Signal> {
        match step {
            StepName::Analyze => {
                let prompt = prompts::analyze(query, context);
                let out = self.call(scratch, &prompt, self.params(ANALYZE_TOKENS)).await?;
                scratch.trace.push(StepName::Analyze, out.clone());
                scratch.analysis = Some(out);
                Ok(Signal::Completed)
            }
            StepName::AssessNeeds => {
                let assessment = needs::classify(query, &self.lexicon.needs);
                scratch.needs = assessment.summary();
                let content = match &scratch.analysis {
                    Some(analysis) => format!("{}; model assessment: {}", scratch.needs, analysis.trim()),
                    None => scratch.needs.clone(),
                };
                scratch.trace.push(StepName::AssessNeeds, content);
                if assessment.is_crisis() {
                    Ok(Signal::CrisisFlagged)
                } else {
                    Ok(Signal::Completed)
                }
            }
            StepName::Draft => {
                let prompt = prompts::draft(query, context, &scratch.needs, scratch.analysis.as_deref());
                let params = self.params(self.generation.max_new_tokens);
                let out = self.call(scratch, &prompt, params).await?;
                scratch.trace.push(StepName::Draft, out.clone());
                scratch.latest = Some(out);
                Ok(Signal::Completed)
            }
            StepName::Critique => {
                let current = scratch.latest.clone().unwrap_or_default();
                let prompt = prompts::critique(&current, &scratch.needs);
                let params = GenerationParams {
                    temperature: CRITIQUE_TEMPERATURE,
                    max_new_tokens: CRITIQUE_TOKENS,
                };
                let out = self.call(scratch, &prompt, params).await?;
                let adequacy = critique::adequacy(&out);
                debug!(target: TARGET, adequacy, threshold = self.config.critique_threshold, "critique scored");
                scratch.trace.push(StepName::Critique, out.clone());
                scratch.last_critique = out;
                if adequacy < self.config.critique_threshold {
                    Ok(Signal::Inadequate)
                } else {
                    Ok(Signal::Adequate)
                }
            }
            StepName::Refine => {
                let current = scratch.latest.clone().unwrap_or_default();
                let prompt = prompts::refine(&current, &scratch.last_critique, &scratch.needs);
                let out = self.call(scratch, &prompt, self.params(REFINE_TOKENS)).await?;
                scratch.trace.push(StepName::Refine, out.clone());
                scratch.latest = Some(out);
                scratch.refinements += 1;
                Ok(Signal::Completed)
            }
            StepName::Reflect => {
                let current = scratch.latest.clone().unwrap_or_default();
                let prompt = prompts::reflect(&current, query);
                let out = self.call(scratch, &prompt, self.params(REFLECT_TOKENS)).await?;
                scratch.trace.push(StepName::Reflect, out);
                Ok(Signal::Completed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doubles::ScriptedGenerator;

    fn controller(config: AgenticConfig, generator: Arc<ScriptedGenerator>) -> ReasoningController {
        ReasoningController::new(config, GenerationConfig::default(), Lexicon::shared(), generator).unwrap()
    }

    #[tokio::test]
    async fn adequate_draft_skips_refinement() {
        let generator = Arc::new(ScriptedGenerator::new([
            "analysis",
            "draft reply",
            "Warm and safe. score: 0.9",
            "reflection",
        ]));
        let c = controller(AgenticConfig::default(), generator.clone());
        let outcome = c.run(Uuid::new_v4(), "I feel tired lately", &[]).await.unwrap();
        match outcome {
            ReasoningOutcome::Completed {
                response,
                trace,
                generative_calls,
                refinements,
            } => {
                assert_eq!(response, "draft reply");
                assert_eq!(
                    trace.steps(),
                    vec![
                        StepName::Analyze,
                        StepName::AssessNeeds,
                        StepName::Draft,
                        StepName::Critique,
                        StepName::Reflect
                    ]
                );
                assert_eq!(generative_calls, 4);
                assert_eq!(refinements, 0);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(generator.calls(), 4);
    }

    #[tokio::test]
    async fn inadequate_draft_is_refined_within_budget() {
        let generator = Arc::new(ScriptedGenerator::new([
            "analysis",
            "draft",
            "score: 0.2",
            "refined reply",
        ]));
        let c = controller(AgenticConfig::default(), generator.clone());
        let outcome = c.run(Uuid::new_v4(), "I feel tired lately", &[]).await.unwrap();
        let ReasoningOutcome::Completed {
            response,
            trace,
            refinements,
            ..
        } = outcome
        else {
            panic!("expected completion");
        };
        assert_eq!(response, "refined reply");
        assert_eq!(refinements, 1);
        assert_eq!(trace.len(), 5);
        assert_eq!(trace.entries()[4].step, StepName::Refine);
    }

    #[tokio::test]
    async fn critique_uses_low_temperature() {
        let generator = Arc::new(ScriptedGenerator::constant("score: 1.0"));
        let c = controller(AgenticConfig::default(), generator.clone());
        c.run(Uuid::new_v4(), "I feel tired lately", &[]).await.unwrap();
        let critique_call = &generator.recorded()[2];
        assert!(critique_call.prompt.starts_with("Evaluate this therapeutic response"));
        assert_eq!(critique_call.params.max_new_tokens, 150);
        assert_eq!(critique_call.params.temperature, 0.2);
    }

    #[tokio::test]
    async fn crisis_need_stops_before_draft() {
        let generator = Arc::new(ScriptedGenerator::constant("analysis"));
        let c = controller(AgenticConfig::default(), generator.clone());
        let outcome = c
            .run(Uuid::new_v4(), "I think about suicide sometimes", &[])
            .await
            .unwrap();
        assert!(matches!(outcome, ReasoningOutcome::Crisis { .. }));
        assert_eq!(outcome.trace().count(StepName::Draft), 0);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn generation_failure_aborts() {
        let generator = Arc::new(ScriptedGenerator::constant("x").failing_at(2));
        let c = controller(AgenticConfig::default(), generator);
        let err = c.run(Uuid::new_v4(), "I feel tired lately", &[]).await.unwrap_err();
        assert_eq!(err.service(), Service::Generation);
    }

    #[test]
    fn rejects_tiny_step_budget() {
        let config = AgenticConfig {
            max_reasoning_steps: 1,
            ..AgenticConfig::default()
        };
        let generator: Arc<dyn GenerationClient> = Arc::new(ScriptedGenerator::constant("x"));
        assert!(ReasoningController::new(config, GenerationConfig::default(), Lexicon::shared(), generator).is_err());
    }
}
