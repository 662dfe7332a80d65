use super::{
    CrisisCategory, CrisisDirectory, SafetyAssessment, Violation, BOUNDARY_MESSAGE,
    DISCLAIMER_PREFIX, REPHRASE_FALLBACK,
};
use crate::clients::{with_timeout, ToxicityClassifier};
use crate::config::SafetyConfig;
use crate::error::{ConfigResult, ConfigurationError, Service};
use crate::lexicon::{CategoryLexicon, CompiledLexicon, TextView};
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

const TARGET: &str = "cotherapist::safety";

/// Crisis and content gate. Lexicon checks are pure; the optional toxicity classifier is the
/// only external call and its failure never blocks a check.
pub struct CrisisSafetyGate {
    config: SafetyConfig,
    lexicon: CompiledLexicon,
    classifier: Option<Arc<dyn ToxicityClassifier>>,
    crisis_message: String,
}

impl CrisisSafetyGate {
    pub fn new(config: SafetyConfig, lexicon: CompiledLexicon) -> ConfigResult<Self> {
        let threshold = config.toxicity_threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigurationError::Threshold {
                name: "safety.toxicity_threshold".to_string(),
                value: threshold,
                expected: "within [0, 1]",
            });
        }
        if config.toxicity_timeout_ms == 0 {
            return Err(ConfigurationError::Threshold {
                name: "safety.toxicity_timeout_ms".to_string(),
                value: 0.0,
                expected: "> 0",
            });
        }
        let crisis_message = CrisisDirectory::default().render(&config.locale);
        Ok(Self {
            config,
            lexicon,
            classifier: None,
            crisis_message,
        })
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ToxicityClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Re-render the crisis message from a custom directory.
    pub fn with_directory(mut self, directory: &CrisisDirectory) -> Self {
        self.crisis_message = directory.render(&self.config.locale);
        self
    }

    pub fn config(&self) -> &SafetyConfig {
        &self.config
    }

    pub fn crisis_message(&self) -> &str {
        &self.crisis_message
    }

    /// True for the statically configured replies (crisis, boundary, rephrase).
    pub fn is_fixed_message(&self, text: &str) -> bool {
        text == self.crisis_message || text == BOUNDARY_MESSAGE || text == REPHRASE_FALLBACK
    }

    /// Full check: score toxicity (if a classifier is attached), then assess.
    pub async fn check(&self, text: &str) -> SafetyAssessment {
        if !self.config.enabled || text.trim().is_empty() {
            return SafetyAssessment::safe();
        }
        let toxicity = self.score_toxicity(text).await;
        self.assess(text, toxicity)
    }

    async fn score_toxicity(&self, text: &str) -> Option<f64> {
        let classifier = self.classifier.as_ref()?;
        let result = with_timeout(
            Service::Toxicity,
            self.config.toxicity_timeout_ms,
            classifier.score(text),
        )
        .await;
        match result {
            Ok(score) if score.is_finite() => Some(score.clamp(0.0, 1.0)),
            Ok(_) => {
                warn!(target: TARGET, "toxicity classifier returned a non-finite score");
                None
            }
            Err(e) => {
                warn!(target: TARGET, error = %e, "toxicity unavailable, lexicon-only check");
                None
            }
        }
    }

    /// Deterministic assessment given an already computed toxicity score.
    pub fn assess(&self, text: &str, toxicity: Option<f64>) -> SafetyAssessment {
        let mut assessment = SafetyAssessment::safe();
        if !self.config.enabled {
            return assessment;
        }
        let view = TextView::new(text);
        if view.is_empty() {
            return assessment;
        }
        assessment.toxicity_score = toxicity.filter(|t| t.is_finite()).map(|t| t.clamp(0.0, 1.0));

        if self.config.crisis_detection {
            let (category, triggers) = self.detect_crisis_in(&view);
            if category != CrisisCategory::None {
                warn!(
                    target: TARGET,
                    category = category.as_str(),
                    triggers = triggers.len(),
                    "crisis indicators detected"
                );
                assessment.crisis_detected = true;
                assessment.crisis_category = category;
                assessment.matched_triggers.extend(triggers);
                assessment.violation = Some(Violation::Crisis);
            }
        }

        if self.config.block_harmful_content {
            let blocked: Vec<String> = self
                .lexicon
                .lexicon()
                .blocked_content
                .iter()
                .filter(|m| view.contains_raw(m))
                .cloned()
                .collect();
            if !blocked.is_empty() {
                debug!(target: TARGET, markers = blocked.len(), "blocked content markers found");
                assessment.matched_triggers.extend(blocked);
                assessment.violation.get_or_insert(Violation::BlockedContent);
            }
        }

        if let Some(score) = assessment.toxicity_score {
            if score >= self.config.toxicity_threshold {
                debug!(target: TARGET, score, "toxicity above threshold");
                assessment.violation.get_or_insert(Violation::Toxicity);
            }
        }

        assessment.advisories = self
            .lexicon
            .lexicon()
            .medical_red_flags
            .iter()
            .filter(|p| view.contains_phrase(p))
            .cloned()
            .collect();

        assessment.is_safe = assessment.violation.is_none();
        assessment
    }

    /// Crisis category and the triggers that matched. Suicide is checked before self-harm.
    pub fn detect_crisis(&self, text: &str) -> (CrisisCategory, Vec<String>) {
        self.detect_crisis_in(&TextView::new(text))
    }

    fn detect_crisis_in(&self, view: &TextView) -> (CrisisCategory, Vec<String>) {
        let crisis = &self.lexicon.lexicon().crisis;
        let suicide = category_matches(
            view,
            &crisis.suicide,
            self.lexicon.suicide_patterns(),
            crisis.max_gap,
        );
        if !suicide.is_empty() {
            return (CrisisCategory::Suicide, suicide);
        }
        let self_harm = category_matches(
            view,
            &crisis.self_harm,
            self.lexicon.self_harm_patterns(),
            crisis.max_gap,
        );
        if !self_harm.is_empty() {
            return (CrisisCategory::SelfHarm, self_harm);
        }
        (CrisisCategory::None, Vec::new())
    }

    /// Prefix generated advice with the AI disclaimer. Idempotent; fixed replies pass through.
    pub fn apply_disclaimer(&self, response: &str) -> String {
        if !self.config.disclaimer_enabled
            || response.starts_with(DISCLAIMER_PREFIX)
            || self.is_fixed_message(response)
        {
            return response.to_string();
        }
        let view = TextView::new(response);
        if view.any_phrase(&self.lexicon.lexicon().advice_indicators) {
            format!("{}{}", DISCLAIMER_PREFIX, response)
        } else {
            response.to_string()
        }
    }
}

fn category_matches(
    view: &TextView,
    category: &CategoryLexicon,
    patterns: &[Regex],
    max_gap: usize,
) -> Vec<String> {
    let mut triggers: Vec<String> = category
        .phrases
        .iter()
        .filter(|p| view.contains_phrase_loosely(p, max_gap))
        .cloned()
        .collect();
    for pattern in patterns {
        if let Some(m) = pattern.find(view.normalized()) {
            let matched = m.as_str().to_string();
            if !triggers.contains(&matched) {
                triggers.push(matched);
            }
        }
    }
    triggers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doubles::{FailingToxicity, FixedToxicity};

    fn gate() -> CrisisSafetyGate {
        CrisisSafetyGate::new(SafetyConfig::default(), CompiledLexicon::builtin().unwrap()).unwrap()
    }

    #[test]
    fn detects_suicide_phrase() {
        let a = gate().assess("I want to kill myself", None);
        assert!(a.crisis_detected);
        assert!(!a.is_safe);
        assert_eq!(a.crisis_category, CrisisCategory::Suicide);
        assert!(a.matched_triggers.iter().any(|t| t == "kill myself"));
    }

    #[test]
    fn suicide_wins_over_self_harm() {
        let (category, _) = gate().detect_crisis("I keep cutting myself and I want to die");
        assert_eq!(category, CrisisCategory::Suicide);
    }

    #[test]
    fn detects_self_harm() {
        let (category, triggers) = gate().detect_crisis("Lately I've been hurting myself again");
        assert_eq!(category, CrisisCategory::SelfHarm);
        assert!(!triggers.is_empty());
    }

    #[test]
    fn paraphrase_with_filler_words_still_flags() {
        let a = gate().assess("honestly I just want to really die", None);
        assert!(a.crisis_detected);
    }

    #[test]
    fn paraphrases_sharing_lexicon_words_flag_crisis() {
        let g = gate();
        for text in [
            "I am thinking about ending it all",
            "some days I just want to end it",
            "I want to end things",
            "maybe I should just end everything",
            "I've been having suicidal thoughts",
        ] {
            let a = g.assess(text, None);
            assert!(a.crisis_detected, "{text}");
            assert_eq!(a.crisis_category, CrisisCategory::Suicide, "{text}");
        }
    }

    #[test]
    fn ordinary_text_is_safe() {
        for text in [
            "I had a stressful day at work and want to relax.",
            "My diet plan is going well.",
            "Can you help me manage my anxiety before exams?",
        ] {
            let a = gate().assess(text, None);
            assert!(a.is_safe, "{text}");
            assert!(!a.crisis_detected, "{text}");
        }
    }

    #[test]
    fn empty_text_is_trivially_safe() {
        assert_eq!(gate().assess("   \n\t", Some(0.99)), SafetyAssessment::safe());
    }

    #[test]
    fn blocked_marker_is_unsafe_without_crisis() {
        let a = gate().assess("Here is a [BLOCKED] section", None);
        assert!(!a.is_safe);
        assert!(!a.crisis_detected);
        assert_eq!(a.violation, Some(Violation::BlockedContent));
    }

    #[test]
    fn toxicity_threshold_is_inclusive() {
        let g = gate();
        assert_eq!(g.assess("some words", Some(0.7)).violation, Some(Violation::Toxicity));
        assert!(g.assess("some words", Some(0.69)).is_safe);
    }

    #[test]
    fn disabled_gate_reports_safe() {
        let cfg = SafetyConfig {
            enabled: false,
            ..SafetyConfig::default()
        };
        let g = CrisisSafetyGate::new(cfg, CompiledLexicon::builtin().unwrap()).unwrap();
        assert!(g.assess("I want to kill myself", None).is_safe);
    }

    #[test]
    fn crisis_detection_toggle_keeps_blocking() {
        let cfg = SafetyConfig {
            crisis_detection: false,
            ..SafetyConfig::default()
        };
        let g = CrisisSafetyGate::new(cfg, CompiledLexicon::builtin().unwrap()).unwrap();
        assert!(!g.assess("I want to kill myself", None).crisis_detected);
        assert!(!g.assess("the lethal dose is", None).is_safe);
    }

    #[test]
    fn medical_advice_is_advisory_only() {
        let a = gate().assess("I cannot diagnose anything, but talking helps.", None);
        assert!(a.is_safe);
        assert_eq!(a.advisories, vec!["diagnose".to_string()]);
    }

    #[test]
    fn rejects_invalid_threshold() {
        let cfg = SafetyConfig {
            toxicity_threshold: -0.1,
            ..SafetyConfig::default()
        };
        assert!(CrisisSafetyGate::new(cfg, CompiledLexicon::builtin().unwrap()).is_err());
    }

    #[test]
    fn disclaimer_is_idempotent_and_skips_fixed_messages() {
        let g = gate();
        let once = g.apply_disclaimer("You should try a short walk.");
        assert!(once.starts_with(DISCLAIMER_PREFIX));
        assert_eq!(g.apply_disclaimer(&once), once);
        assert_eq!(g.apply_disclaimer("That sounds hard."), "That sounds hard.");
        let crisis = g.crisis_message().to_string();
        assert_eq!(g.apply_disclaimer(&crisis), crisis);
    }

    #[tokio::test]
    async fn failing_classifier_reports_unavailable() {
        let g = gate().with_classifier(Arc::new(FailingToxicity));
        let a = g.check("a calm sentence").await;
        assert!(a.is_safe);
        assert_eq!(a.toxicity_score, None);
    }

    #[tokio::test]
    async fn classifier_score_is_recorded() {
        let g = gate().with_classifier(Arc::new(FixedToxicity(0.9)));
        let a = g.check("a sentence").await;
        assert_eq!(a.toxicity_score, Some(0.9));
        assert!(!a.is_safe);
    }
}
