//! Co-therapist reply pipeline.
//!
//! A free-text message passes a crisis/safety gate, optional retrieval, a bounded
//! reasoning loop (or a single generation call), a second safety gate, and optional
//! COTHERF scoring and trait analysis.
//!
//! - **safety**: crisis lexicon, blocked content, toxicity, fixed crisis resources.
//! - **reasoning**: analyze → assess needs → draft → critique → refine → reflect.
//! - **evaluation**: six weighted COTHERF dimensions.
//! - **psychometric**: five Big-Five style traits.
//! - **pipeline**: composition root.

pub mod clients;
pub mod config;
pub mod doubles;
pub mod error;
pub mod evaluation;
pub mod lexicon;
#[cfg(feature = "openrouter")]
pub mod openrouter;
pub mod pipeline;
pub mod psychometric;
pub mod reasoning;
pub mod safety;
pub mod stats;

pub use clients::{GenerationClient, GenerationParams, RetrievalClient, RetrievedContext, ToxicityClassifier};
pub use config::PipelineConfig;
pub use error::{
    ConfigResult, ConfigurationError, EvaluationError, PipelineError, Service, ServiceError,
    ServiceResult,
};
pub use evaluation::{CotherfEvaluator, Dimension, EvaluationContext, EvaluationScore};
pub use lexicon::{CompiledLexicon, Lexicon};
#[cfg(feature = "openrouter")]
pub use openrouter::OpenRouterGenerator;
pub use pipeline::{GenerateOptions, Pipeline, PipelineBuilder, PipelineResult};
pub use psychometric::{Trait, TraitProfile, TraitsAnalyzer};
pub use reasoning::{ReasoningController, ReasoningOutcome, ReasoningTrace, StepName};
pub use safety::{CrisisCategory, CrisisSafetyGate, SafetyAssessment};
