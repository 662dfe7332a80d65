//! Request orchestration: input gate → retrieval → reasoning or direct generation →
//! output gate → optional evaluation and trait analysis.

use crate::clients::{
    filter_context, with_timeout, GenerationClient, GenerationParams, RetrievalClient,
    RetrievedContext, ToxicityClassifier,
};
use crate::config::PipelineConfig;
use crate::error::{ConfigResult, ConfigurationError, PipelineError, Service};
use crate::evaluation::{BatchEvaluation, CotherfEvaluator, EvaluationContext, EvaluationItem, EvaluationScore};
use crate::lexicon::{CompiledLexicon, Lexicon};
use crate::psychometric::{BatchTraits, TraitProfile, TraitsAnalyzer};
use crate::reasoning::{prompts, ReasoningController, ReasoningOutcome, ReasoningTrace};
use crate::safety::{
    CrisisDirectory, CrisisSafetyGate, SafetyAssessment, Violation, BOUNDARY_MESSAGE,
    REPHRASE_FALLBACK,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

const TARGET: &str = "cotherapist::pipeline";

/// Per-request switches. A stage runs only when its option and its config flag both allow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateOptions {
    pub use_retrieval: bool,
    pub use_reasoning: bool,
    pub evaluate: bool,
    pub analyze_traits: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            use_retrieval: true,
            use_reasoning: true,
            evaluate: false,
            analyze_traits: false,
        }
    }
}

impl GenerateOptions {
    /// Everything on, including evaluation and trait analysis.
    pub fn full() -> Self {
        Self {
            evaluate: true,
            analyze_traits: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub request_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub response: String,
    /// Output-stage assessment.
    pub safety: SafetyAssessment,
    pub input_safety: SafetyAssessment,
    /// True if the input gate short-circuited, or needs assessment or the output gate found
    /// a crisis.
    pub crisis_detected: bool,
    pub trace: Option<ReasoningTrace>,
    pub context_used: Vec<RetrievedContext>,
    pub evaluation: Option<EvaluationScore>,
    pub traits: Option<TraitProfile>,
    pub profile_summary: Option<String>,
    /// Evaluation or trait analysis failed; the response itself is unaffected.
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetReport {
    pub results: Vec<PipelineResult>,
    /// Examples whose `generate` call returned an error.
    pub failures: usize,
    pub evaluation: Option<BatchEvaluation>,
    pub traits: Option<BatchTraits>,
}

pub struct PipelineBuilder {
    config: PipelineConfig,
    lexicon: Arc<Lexicon>,
    directory: Option<CrisisDirectory>,
    generator: Option<Arc<dyn GenerationClient>>,
    retriever: Option<Arc<dyn RetrievalClient>>,
    toxicity: Option<Arc<dyn ToxicityClassifier>>,
    evaluator: Option<CotherfEvaluator>,
    analyzer: Option<TraitsAnalyzer>,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            lexicon: Lexicon::shared(),
            directory: None,
            generator: None,
            retriever: None,
            toxicity: None,
            evaluator: None,
            analyzer: None,
        }
    }

    pub fn lexicon(mut self, lexicon: Arc<Lexicon>) -> Self {
        self.lexicon = lexicon;
        self
    }

    pub fn crisis_directory(mut self, directory: CrisisDirectory) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn GenerationClient>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn retriever(mut self, retriever: Arc<dyn RetrievalClient>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn toxicity(mut self, classifier: Arc<dyn ToxicityClassifier>) -> Self {
        self.toxicity = Some(classifier);
        self
    }

    /// Replace the evaluator built from `config.evaluation`.
    pub fn evaluator(mut self, evaluator: CotherfEvaluator) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Replace the analyzer built from `config.psychometric`.
    pub fn analyzer(mut self, analyzer: TraitsAnalyzer) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn build(self) -> ConfigResult<Pipeline> {
        self.config.validate()?;
        let generator = self
            .generator
            .ok_or_else(|| ConfigurationError::Invalid("a generation client is required".to_string()))?;

        let compiled = CompiledLexicon::new(Arc::clone(&self.lexicon))?;
        let mut gate = CrisisSafetyGate::new(self.config.safety.clone(), compiled)?;
        if let Some(directory) = &self.directory {
            gate = gate.with_directory(directory);
        }
        if let Some(classifier) = self.toxicity {
            gate = gate.with_classifier(classifier);
        }

        let reasoning = ReasoningController::new(
            self.config.agentic.clone(),
            self.config.generation.clone(),
            Arc::clone(&self.lexicon),
            Arc::clone(&generator),
        )?;
        let evaluator = match self.evaluator {
            Some(evaluator) => evaluator,
            None => CotherfEvaluator::new(&self.config.evaluation, Arc::clone(&self.lexicon))?,
        };
        let analyzer = match self.analyzer {
            Some(analyzer) => analyzer,
            None => TraitsAnalyzer::new(self.config.psychometric.clone(), Arc::clone(&self.lexicon))?,
        };

        info!(
            target: TARGET,
            generator = generator.name(),
            retrieval = self.retriever.is_some(),
            reasoning = self.config.agentic.enabled,
            "pipeline ready"
        );

        Ok(Pipeline {
            config: self.config,
            gate,
            reasoning,
            evaluator: Arc::new(evaluator),
            analyzer: Arc::new(analyzer),
            generator,
            retriever: self.retriever,
        })
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    gate: CrisisSafetyGate,
    reasoning: ReasoningController,
    evaluator: Arc<CotherfEvaluator>,
    analyzer: Arc<TraitsAnalyzer>,
    generator: Arc<dyn GenerationClient>,
    retriever: Option<Arc<dyn RetrievalClient>>,
}

/// What the generation stages produced before the output gate.
struct Draft {
    response: String,
    fixed: bool,
    crisis: bool,
    trace: Option<ReasoningTrace>,
    context: Vec<RetrievedContext>,
}

impl Pipeline {
    pub fn builder(config: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn gate(&self) -> &CrisisSafetyGate {
        &self.gate
    }

    pub fn evaluator(&self) -> Arc<CotherfEvaluator> {
        Arc::clone(&self.evaluator)
    }

    pub fn analyzer(&self) -> Arc<TraitsAnalyzer> {
        Arc::clone(&self.analyzer)
    }

    pub async fn generate(
        &self,
        query: &str,
        options: GenerateOptions,
    ) -> Result<PipelineResult, PipelineError> {
        if query.trim().is_empty() {
            return Err(PipelineError::InputValidation(
                "query must not be empty".to_string(),
            ));
        }
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        info!(target: TARGET, %request_id, chars = query.chars().count(), "request received");

        let input_safety = self.gate.check(query).await;
        let draft = if input_safety.crisis_detected {
            warn!(target: TARGET, %request_id, category = input_safety.crisis_category.as_str(), "crisis on input, returning crisis resources");
            self.fixed_draft(self.gate.crisis_message(), true, None)
        } else if !input_safety.is_safe {
            warn!(target: TARGET, %request_id, violation = ?input_safety.violation, "unsafe input, returning boundary message");
            self.fixed_draft(BOUNDARY_MESSAGE, true, None)
        } else {
            self.produce(request_id, query, options).await?
        };

        let safety = self.gate.check(&draft.response).await;
        let mut crisis_detected = draft.crisis;
        let response = if draft.fixed {
            draft.response
        } else if !safety.is_safe {
            warn!(target: TARGET, %request_id, violation = ?safety.violation, "generated response failed the output gate");
            if safety.violation == Some(Violation::Crisis) {
                crisis_detected = true;
                self.gate.crisis_message().to_string()
            } else {
                REPHRASE_FALLBACK.to_string()
            }
        } else {
            self.gate.apply_disclaimer(&draft.response)
        };
        if !safety.advisories.is_empty() {
            info!(target: TARGET, %request_id, advisories = ?safety.advisories, "medical-advice phrasing in response");
        }

        let mut degraded = false;
        let evaluation = if options.evaluate {
            let ctx = EvaluationContext {
                crisis_detected,
                toxicity_score: safety.toxicity_score,
            };
            match self.evaluator.evaluate_in_context(query, &response, &ctx) {
                Ok(score) => Some(score),
                Err(e) => {
                    warn!(target: TARGET, %request_id, error = %e, "evaluation failed");
                    degraded = true;
                    None
                }
            }
        } else {
            None
        };

        let traits = if options.analyze_traits && self.config.psychometric.enabled {
            match self.analyzer.analyze(&response) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    warn!(target: TARGET, %request_id, error = %e, "trait analysis failed");
                    degraded = true;
                    None
                }
            }
        } else {
            None
        };
        let profile_summary = traits.as_ref().map(|p| self.analyzer.therapeutic_profile(p));

        info!(
            target: TARGET,
            %request_id,
            crisis_detected,
            degraded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request complete"
        );

        Ok(PipelineResult {
            request_id,
            completed_at: Utc::now(),
            response,
            safety,
            input_safety,
            crisis_detected,
            trace: draft.trace,
            context_used: draft.context,
            evaluation,
            traits,
            profile_summary,
            degraded,
        })
    }

    fn fixed_draft(&self, message: &str, crisis: bool, trace: Option<ReasoningTrace>) -> Draft {
        Draft {
            response: message.to_string(),
            fixed: true,
            crisis,
            trace,
            context: Vec::new(),
        }
    }

    async fn produce(
        &self,
        request_id: Uuid,
        query: &str,
        options: GenerateOptions,
    ) -> Result<Draft, PipelineError> {
        let context = if options.use_retrieval && self.config.retrieval.enabled {
            self.retrieve(request_id, query).await
        } else {
            Vec::new()
        };

        if options.use_reasoning && self.config.agentic.enabled {
            let outcome = self.reasoning.run(request_id, query, &context).await?;
            return Ok(match outcome {
                ReasoningOutcome::Completed { response, trace, .. } => Draft {
                    response,
                    fixed: false,
                    crisis: false,
                    trace: Some(trace),
                    context,
                },
                ReasoningOutcome::Crisis { trace } => {
                    let mut draft = self.fixed_draft(self.gate.crisis_message(), true, Some(trace));
                    draft.context = context;
                    draft
                }
            });
        }

        let prompt = prompts::single_shot(query, &context);
        let params = GenerationParams {
            temperature: self.config.generation.temperature,
            max_new_tokens: self.config.generation.max_new_tokens,
        };
        let response = with_timeout(
            Service::Generation,
            self.config.generation.timeout_ms,
            self.generator.generate(&prompt, params),
        )
        .await?;
        Ok(Draft {
            response,
            fixed: false,
            crisis: false,
            trace: None,
            context,
        })
    }

    /// Retrieval never fails a request; errors and timeouts yield no context.
    async fn retrieve(&self, request_id: Uuid, query: &str) -> Vec<RetrievedContext> {
        let Some(retriever) = &self.retriever else {
            return Vec::new();
        };
        let cfg = &self.config.retrieval;
        match with_timeout(Service::Retrieval, cfg.timeout_ms, retriever.retrieve(query, cfg.top_k)).await {
            Ok(snippets) => {
                let kept = filter_context(snippets, cfg.similarity_threshold, cfg.top_k);
                debug!(target: TARGET, %request_id, kept = kept.len(), "context retrieved");
                kept
            }
            Err(e) => {
                warn!(target: TARGET, %request_id, error = %e, "retrieval failed, continuing without context");
                Vec::new()
            }
        }
    }

    /// Run `generate` over each query, then summarize the produced responses.
    pub async fn evaluate_dataset(&self, queries: &[String], options: GenerateOptions) -> DatasetReport {
        let mut results = Vec::with_capacity(queries.len());
        let mut items = Vec::with_capacity(queries.len());
        let mut failures = 0;
        for query in queries {
            match self.generate(query, options).await {
                Ok(result) => {
                    items.push(EvaluationItem {
                        query: query.clone(),
                        response: result.response.clone(),
                        context: EvaluationContext {
                            crisis_detected: result.crisis_detected,
                            toxicity_score: result.safety.toxicity_score,
                        },
                    });
                    results.push(result);
                }
                Err(e) => {
                    warn!(target: TARGET, error = %e, "dataset example failed");
                    failures += 1;
                }
            }
        }

        let responses: Vec<String> = results.iter().map(|r| r.response.clone()).collect();

        let evaluation = match self.evaluator.batch_evaluate(&items) {
            Ok(batch) => Some(batch),
            Err(e) => {
                warn!(target: TARGET, error = %e, "dataset evaluation summary unavailable");
                None
            }
        };
        let traits = match self.analyzer.batch_analyze(&responses) {
            Ok(batch) => Some(batch),
            Err(e) => {
                warn!(target: TARGET, error = %e, "dataset trait summary unavailable");
                None
            }
        };
        info!(
            target: TARGET,
            examples = queries.len(),
            failures,
            "dataset evaluated"
        );

        DatasetReport {
            results,
            failures,
            evaluation,
            traits,
        }
    }
}
