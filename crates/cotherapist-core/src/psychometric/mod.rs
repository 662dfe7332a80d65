//! Big-Five style trait estimates from response text.
//!
//! Raw trait score is (distinct positive indicators − distinct negative indicators). It is
//! mapped through `1 / (1 + e^(-raw / scale))`, so a text with no indicators for a trait
//! sits at exactly 0.5.

use crate::config::PsychometricConfig;
use crate::error::{ConfigResult, ConfigurationError, EvaluationError};
use crate::lexicon::{Lexicon, TextView, TraitIndicators};
use crate::stats::Summary;
use futures_util::{future, stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const TARGET: &str = "cotherapist::psychometric";

pub const NEUTRAL: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trait {
    Agreeableness,
    Conscientiousness,
    EmotionalStability,
    Openness,
    Extraversion,
}

impl Trait {
    pub const ALL: [Trait; 5] = [
        Trait::Agreeableness,
        Trait::Conscientiousness,
        Trait::EmotionalStability,
        Trait::Openness,
        Trait::Extraversion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Trait::Agreeableness => "agreeableness",
            Trait::Conscientiousness => "conscientiousness",
            Trait::EmotionalStability => "emotional_stability",
            Trait::Openness => "openness",
            Trait::Extraversion => "extraversion",
        }
    }

    pub fn from_name(name: &str) -> Option<Trait> {
        Trait::ALL.iter().copied().find(|t| t.as_str() == name)
    }

    fn indicators(self, lexicon: &Lexicon) -> &TraitIndicators {
        let traits = &lexicon.traits;
        match self {
            Trait::Agreeableness => &traits.agreeableness,
            Trait::Conscientiousness => &traits.conscientiousness,
            Trait::EmotionalStability => &traits.emotional_stability,
            Trait::Openness => &traits.openness,
            Trait::Extraversion => &traits.extraversion,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitLevel {
    Low,
    ModeratelyLow,
    Moderate,
    ModeratelyHigh,
    High,
}

impl TraitLevel {
    /// Bucket `value` using four ascending cutoffs.
    pub fn from_score(value: f64, cutoffs: [f64; 4]) -> TraitLevel {
        if value >= cutoffs[3] {
            TraitLevel::High
        } else if value >= cutoffs[2] {
            TraitLevel::ModeratelyHigh
        } else if value >= cutoffs[1] {
            TraitLevel::Moderate
        } else if value >= cutoffs[0] {
            TraitLevel::ModeratelyLow
        } else {
            TraitLevel::Low
        }
    }
}

impl fmt::Display for TraitLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TraitLevel::Low => "Low",
            TraitLevel::ModeratelyLow => "Moderately Low",
            TraitLevel::Moderate => "Moderate",
            TraitLevel::ModeratelyHigh => "Moderately High",
            TraitLevel::High => "High",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitProfile {
    pub scores: BTreeMap<Trait, f64>,
}

impl TraitProfile {
    pub fn neutral() -> Self {
        Self {
            scores: Trait::ALL.iter().map(|t| (*t, NEUTRAL)).collect(),
        }
    }

    pub fn get(&self, t: Trait) -> f64 {
        self.scores.get(&t).copied().unwrap_or(NEUTRAL)
    }
}

/// Raw (unnormalized) score for one trait.
pub trait TraitScorer: Send + Sync {
    fn kind(&self) -> Trait;
    fn raw(&self, text: &TextView) -> f64;
}

/// Counts distinct positive and negative indicators.
pub struct IndicatorScorer {
    kind: Trait,
    indicators: TraitIndicators,
}

impl IndicatorScorer {
    pub fn new(kind: Trait, indicators: TraitIndicators) -> Self {
        Self { kind, indicators }
    }
}

impl TraitScorer for IndicatorScorer {
    fn kind(&self) -> Trait {
        self.kind
    }

    fn raw(&self, text: &TextView) -> f64 {
        let positive = text.count_distinct(&self.indicators.positive) as f64;
        let negative = text.count_distinct(&self.indicators.negative) as f64;
        positive - negative
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchTraits {
    /// Profiles in input order. Shorter than the input when cancelled.
    pub profiles: Vec<TraitProfile>,
    pub stats: BTreeMap<Trait, Summary>,
    /// Level of each trait's mean.
    pub labels: BTreeMap<Trait, TraitLevel>,
    pub cancelled: bool,
}

pub struct TraitsAnalyzer {
    config: PsychometricConfig,
    scorers: Vec<Box<dyn TraitScorer>>,
}

impl TraitsAnalyzer {
    pub fn new(config: PsychometricConfig, lexicon: Arc<Lexicon>) -> ConfigResult<Self> {
        lexicon.traits.validate()?;
        let scorers: Vec<Box<dyn TraitScorer>> = Trait::ALL
            .iter()
            .map(|t| {
                Box::new(IndicatorScorer::new(*t, t.indicators(&lexicon).clone()))
                    as Box<dyn TraitScorer>
            })
            .collect();
        Self::with_scorers(config, scorers)
    }

    pub fn with_scorers(
        config: PsychometricConfig,
        scorers: Vec<Box<dyn TraitScorer>>,
    ) -> ConfigResult<Self> {
        let scale = config.saturation_scale;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ConfigurationError::Threshold {
                name: "psychometric.saturation_scale".to_string(),
                value: scale,
                expected: "finite and > 0",
            });
        }
        for t in Trait::ALL {
            let registered = scorers.iter().filter(|s| s.kind() == t).count();
            if registered != 1 {
                return Err(ConfigurationError::Invalid(format!(
                    "trait `{}` needs exactly one scorer (found {})",
                    t.as_str(),
                    registered
                )));
            }
        }
        Ok(Self { config, scorers })
    }

    fn normalize(&self, raw: f64) -> f64 {
        1.0 / (1.0 + (-raw / self.config.saturation_scale).exp())
    }

    pub fn analyze(&self, text: &str) -> Result<TraitProfile, EvaluationError> {
        if !self.config.enabled {
            return Ok(TraitProfile::neutral());
        }
        let view = TextView::new(text);
        let mut scores = BTreeMap::new();
        for scorer in &self.scorers {
            let raw = scorer.raw(&view);
            let value = self.normalize(raw);
            if !value.is_finite() {
                return Err(EvaluationError::NonFinite {
                    name: scorer.kind().as_str().to_string(),
                });
            }
            scores.insert(scorer.kind(), value.clamp(0.0, 1.0));
        }
        debug!(target: TARGET, "traits analyzed");
        Ok(TraitProfile { scores })
    }

    /// Level per trait using the configured cutoffs.
    pub fn interpret(&self, profile: &TraitProfile) -> BTreeMap<Trait, TraitLevel> {
        Trait::ALL
            .iter()
            .map(|t| (*t, TraitLevel::from_score(profile.get(*t), self.config.cutoffs_for(*t))))
            .collect()
    }

    /// Narrative summary of the therapeutic style the profile suggests.
    pub fn therapeutic_profile(&self, profile: &TraitProfile) -> String {
        let agreeable = profile.get(Trait::Agreeableness) >= 0.6;
        let conscientious = profile.get(Trait::Conscientiousness) >= 0.6;
        let mut lines = Vec::new();
        if agreeable {
            lines.push("Demonstrates high empathy and supportiveness characteristic of effective therapeutic communication.");
        }
        if conscientious {
            lines.push("Shows structured and organized approach, providing clear guidance and actionable strategies.");
        }
        if profile.get(Trait::EmotionalStability) >= 0.6 {
            lines.push("Maintains calm and balanced tone, modeling emotional regulation.");
        }
        // 0.5 is neutral, so only a lean towards openness counts.
        if profile.get(Trait::Openness) > NEUTRAL {
            lines.push("Encourages exploration of different perspectives and possibilities.");
        }
        if agreeable && conscientious {
            lines.push("Exhibits expert-like therapeutic behavior combining compassion with professional structure.");
        }
        if lines.is_empty() {
            lines.push("Displays moderate therapeutic characteristics.");
        }
        lines.join(" ")
    }

    pub fn batch_analyze(&self, texts: &[String]) -> Result<BatchTraits, EvaluationError> {
        if texts.is_empty() {
            return Err(EvaluationError::EmptyBatch);
        }
        let profiles = texts
            .iter()
            .map(|t| self.analyze(t))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.reduce(profiles, false))
    }

    /// Like `batch_analyze` on at most `workers` blocking tasks, with cooperative cancellation.
    pub async fn batch_analyze_concurrent(
        self: Arc<Self>,
        texts: Vec<String>,
        workers: usize,
        cancel: CancellationToken,
    ) -> Result<BatchTraits, EvaluationError> {
        if texts.is_empty() {
            return Err(EvaluationError::EmptyBatch);
        }
        let total = texts.len();
        let gate = cancel.clone();

        let mut indexed: Vec<(usize, TraitProfile)> = stream::iter(texts.into_iter().enumerate())
            .take_while(move |_| future::ready(!gate.is_cancelled()))
            .map(|(index, text)| {
                let analyzer = Arc::clone(&self);
                async move {
                    tokio::task::spawn_blocking(move || analyzer.analyze(&text).map(|p| (index, p)))
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
                "batch trait analysis cancelled"
            );
        }
        let profiles = indexed.into_iter().map(|(_, p)| p).collect();
        Ok(self.reduce(profiles, cancelled))
    }

    fn reduce(&self, profiles: Vec<TraitProfile>, cancelled: bool) -> BatchTraits {
        let mut stats = BTreeMap::new();
        let mut labels = BTreeMap::new();
        for t in Trait::ALL {
            let values: Vec<f64> = profiles.iter().map(|p| p.get(t)).collect();
            if let Some(summary) = Summary::of(&values) {
                labels.insert(t, TraitLevel::from_score(summary.mean, self.config.cutoffs_for(t)));
                stats.insert(t, summary);
            }
        }
        BatchTraits {
            profiles,
            stats,
            labels,
            cancelled,
        }
    }
}
