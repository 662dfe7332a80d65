//! Pipeline configuration.
//!
//! Every field has a default, so an empty TOML document (or no file at all) yields a working
//! configuration. `validate` runs in every constructor that consumes a config section.
//!
//! | Key | Default |
//! |-----|---------|
//! | safety.toxicity_threshold | 0.7 |
//! | agentic.max_reasoning_steps | 5 |
//! | agentic.refinement_budget | 1 |
//! | agentic.critique_threshold | 0.7 |
//! | retrieval.top_k | 3 |
//! | retrieval.similarity_threshold | 0.5 |
//! | evaluation.weights | empathy .25, relevance .15, informativeness .15, safety .25, therapeutic_alliance .10, clinical_accuracy .10 |
//! | psychometric.cutoffs | `[0.30, 0.45, 0.55, 0.70]` per trait |
//!
//! Environment overrides use the `COTHERAPIST` prefix with `__` between path segments,
//! e.g. `COTHERAPIST__SAFETY__TOXICITY_THRESHOLD=0.5`.

use crate::error::{ConfigResult, ConfigurationError};
use crate::evaluation::Dimension;
use crate::psychometric::Trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Tolerance for the weight-sum check.
pub const WEIGHT_EPSILON: f64 = 1e-6;

const DEFAULT_CONFIG_PATH: &str = "config/cotherapist";

fn default_true() -> bool {
    true
}

fn default_toxicity_threshold() -> f64 {
    0.7
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_toxicity_timeout_ms() -> u64 {
    2_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// When false the gate reports every text as safe.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Lexicon crisis matching. Toxicity scoring is unaffected.
    #[serde(default = "default_true")]
    pub crisis_detection: bool,
    #[serde(default = "default_toxicity_threshold")]
    pub toxicity_threshold: f64,
    /// Blocked-content markers make text unsafe.
    #[serde(default = "default_true")]
    pub block_harmful_content: bool,
    #[serde(default = "default_true")]
    pub disclaimer_enabled: bool,
    /// Crisis-resource directory locale, falls back to en-US.
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_toxicity_timeout_ms")]
    pub toxicity_timeout_ms: u64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            crisis_detection: true,
            toxicity_threshold: default_toxicity_threshold(),
            block_harmful_content: true,
            disclaimer_enabled: true,
            locale: default_locale(),
            toxicity_timeout_ms: default_toxicity_timeout_ms(),
        }
    }
}

fn default_max_reasoning_steps() -> usize {
    5
}

fn default_refinement_budget() -> usize {
    1
}

fn default_critique_threshold() -> f64 {
    0.7
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgenticConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Hard cap on trace entries, and therefore on generative calls, per request.
    #[serde(default = "default_max_reasoning_steps")]
    pub max_reasoning_steps: usize,
    #[serde(default = "default_refinement_budget")]
    pub refinement_budget: usize,
    /// Critique adequacy below this value triggers a refinement.
    #[serde(default = "default_critique_threshold")]
    pub critique_threshold: f64,
    #[serde(default = "default_true")]
    pub chain_of_thought: bool,
    #[serde(default = "default_true")]
    pub self_critique: bool,
    #[serde(default = "default_true")]
    pub reflection: bool,
}

impl Default for AgenticConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_reasoning_steps: default_max_reasoning_steps(),
            refinement_budget: default_refinement_budget(),
            critique_threshold: default_critique_threshold(),
            chain_of_thought: true,
            self_critique: true,
            reflection: true,
        }
    }
}

fn default_top_k() -> usize {
    3
}

fn default_similarity_threshold() -> f64 {
    0.5
}

fn default_retrieval_timeout_ms() -> u64 {
    2_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_retrieval_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
            timeout_ms: default_retrieval_timeout_ms(),
        }
    }
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_new_tokens() -> u32 {
    512
}

fn default_generation_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,
    #[serde(default = "default_generation_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_new_tokens: default_max_new_tokens(),
            timeout_ms: default_generation_timeout_ms(),
        }
    }
}

fn default_weights() -> BTreeMap<String, f64> {
    Dimension::ALL
        .iter()
        .map(|d| (d.as_str().to_string(), d.default_weight()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default = "default_weights")]
    pub weights: BTreeMap<String, f64>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            weights: default_weights(),
        }
    }
}

fn default_saturation_scale() -> f64 {
    3.0
}

/// Cutoffs separating low | moderately_low | moderate | moderately_high | high.
pub const DEFAULT_TRAIT_CUTOFFS: [f64; 4] = [0.30, 0.45, 0.55, 0.70];

fn default_cutoffs() -> BTreeMap<String, [f64; 4]> {
    Trait::ALL
        .iter()
        .map(|t| (t.as_str().to_string(), DEFAULT_TRAIT_CUTOFFS))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsychometricConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Raw score at which the logistic transform reaches ~0.73.
    #[serde(default = "default_saturation_scale")]
    pub saturation_scale: f64,
    /// Traits left out use `DEFAULT_TRAIT_CUTOFFS`.
    #[serde(default = "default_cutoffs")]
    pub cutoffs: BTreeMap<String, [f64; 4]>,
}

impl Default for PsychometricConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            saturation_scale: default_saturation_scale(),
            cutoffs: default_cutoffs(),
        }
    }
}

impl PsychometricConfig {
    pub fn cutoffs_for(&self, t: Trait) -> [f64; 4] {
        self.cutoffs
            .get(t.as_str())
            .copied()
            .unwrap_or(DEFAULT_TRAIT_CUTOFFS)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub agentic: AgenticConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub psychometric: PsychometricConfig,
}

impl PipelineConfig {
    /// Load from `COTHERAPIST_CONFIG` (default `config/cotherapist`, any extension the `config`
    /// crate recognizes) and `COTHERAPIST__*` environment variables, then validate.
    pub fn load() -> ConfigResult<Self> {
        let path = std::env::var("COTHERAPIST_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    /// Like [`PipelineConfig::load`] with an explicit file path. A missing file is not an error.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let built = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("COTHERAPIST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: PipelineConfig = built.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        let cfg: PipelineConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        unit_interval("safety.toxicity_threshold", self.safety.toxicity_threshold)?;
        unit_interval("agentic.critique_threshold", self.agentic.critique_threshold)?;
        unit_interval(
            "retrieval.similarity_threshold",
            self.retrieval.similarity_threshold,
        )?;

        if self.agentic.max_reasoning_steps < 2 {
            return Err(ConfigurationError::Threshold {
                name: "agentic.max_reasoning_steps".to_string(),
                value: self.agentic.max_reasoning_steps as f64,
                expected: ">= 2",
            });
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigurationError::Threshold {
                name: "retrieval.top_k".to_string(),
                value: 0.0,
                expected: ">= 1",
            });
        }
        for (name, ms) in [
            ("safety.toxicity_timeout_ms", self.safety.toxicity_timeout_ms),
            ("retrieval.timeout_ms", self.retrieval.timeout_ms),
            ("generation.timeout_ms", self.generation.timeout_ms),
        ] {
            if ms == 0 {
                return Err(ConfigurationError::Threshold {
                    name: name.to_string(),
                    value: 0.0,
                    expected: "> 0",
                });
            }
        }
        let temperature = f64::from(self.generation.temperature);
        if !temperature.is_finite() || temperature < 0.0 {
            return Err(ConfigurationError::Threshold {
                name: "generation.temperature".to_string(),
                value: temperature,
                expected: "finite and >= 0",
            });
        }

        validate_weights(&self.evaluation.weights)?;
        self.validate_psychometric()
    }

    fn validate_psychometric(&self) -> ConfigResult<()> {
        let scale = self.psychometric.saturation_scale;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ConfigurationError::Threshold {
                name: "psychometric.saturation_scale".to_string(),
                value: scale,
                expected: "finite and > 0",
            });
        }
        for (name, cutoffs) in &self.psychometric.cutoffs {
            if Trait::from_name(name).is_none() {
                return Err(ConfigurationError::Invalid(format!(
                    "psychometric.cutoffs: unknown trait `{}`",
                    name
                )));
            }
            for value in cutoffs {
                unit_interval(&format!("psychometric.cutoffs.{}", name), *value)?;
            }
            if cutoffs.windows(2).any(|w| w[0] > w[1]) {
                return Err(ConfigurationError::Invalid(format!(
                    "psychometric.cutoffs.{} must be ascending",
                    name
                )));
            }
        }
        Ok(())
    }
}

fn unit_interval(name: &str, value: f64) -> ConfigResult<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigurationError::Threshold {
            name: name.to_string(),
            value,
            expected: "within [0, 1]",
        })
    }
}

/// Weights must be finite, non-negative, and sum to 1.0 within `WEIGHT_EPSILON`.
pub fn validate_weights(weights: &BTreeMap<String, f64>) -> ConfigResult<()> {
    if weights.is_empty() {
        return Err(ConfigurationError::WeightKeys("no weights configured".to_string()));
    }
    for (dimension, value) in weights {
        if !value.is_finite() || *value < 0.0 {
            return Err(ConfigurationError::Weight {
                dimension: dimension.clone(),
                value: *value,
            });
        }
    }
    let sum: f64 = weights.values().sum();
    if (sum - 1.0).abs() > WEIGHT_EPSILON {
        return Err(ConfigurationError::WeightSum { sum });
    }
    Ok(())
}
