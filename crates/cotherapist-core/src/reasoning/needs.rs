//! Rule-based therapeutic needs classifier.

use crate::lexicon::{NeedsLexicon, TextView};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedCategory {
    EmotionalValidation,
    InformationSeeking,
    CopingRequest,
    CrisisSupport,
    EmpathyAndSupport,
}

impl NeedCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NeedCategory::EmotionalValidation => "emotional_validation",
            NeedCategory::InformationSeeking => "information_seeking",
            NeedCategory::CopingRequest => "coping_request",
            NeedCategory::CrisisSupport => "crisis_support",
            NeedCategory::EmpathyAndSupport => "empathy_and_support",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeedsAssessment {
    pub categories: Vec<NeedCategory>,
}

impl NeedsAssessment {
    /// A crisis flag here is authoritative, even if the gate passed the text.
    pub fn is_crisis(&self) -> bool {
        self.categories.contains(&NeedCategory::CrisisSupport)
    }

    pub fn summary(&self) -> String {
        self.categories
            .iter()
            .map(NeedCategory::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub fn classify(query: &str, lexicon: &NeedsLexicon) -> NeedsAssessment {
    let view = TextView::new(query);
    let mut categories = Vec::new();

    if view.any_phrase(&lexicon.emotion_words) {
        categories.push(NeedCategory::EmotionalValidation);
    }
    if query.contains('?') || view.any_phrase(&lexicon.question_words) {
        categories.push(NeedCategory::InformationSeeking);
    }
    if view.any_phrase(&lexicon.coping_words) {
        categories.push(NeedCategory::CopingRequest);
    }
    if view.any_phrase(&lexicon.crisis_indicators) {
        categories.push(NeedCategory::CrisisSupport);
    }
    if categories.is_empty() || view.any_phrase(&lexicon.feeling_words) {
        categories.push(NeedCategory::EmpathyAndSupport);
    }

    NeedsAssessment { categories }
}
