//! Crisis and content safety: the gate run on every input and every produced response.

mod gate;
mod resources;

pub use gate::CrisisSafetyGate;
pub use resources::{CrisisDirectory, CrisisResource, FALLBACK_LOCALE};

use serde::{Deserialize, Serialize};

/// Reply to abusive input that is not a crisis.
pub const BOUNDARY_MESSAGE: &str =
    "I'm here to provide support in a respectful way. Let's keep our conversation constructive.";

/// Replacement for a generated response that failed the output gate.
pub const REPHRASE_FALLBACK: &str =
    "I apologize, but I need to rephrase my response. How can I better support you?";

/// Prefix added to generated advice.
pub const DISCLAIMER_PREFIX: &str = "Please note: I'm an AI assistant, not a licensed therapist. ";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrisisCategory {
    #[default]
    None,
    Suicide,
    SelfHarm,
}

impl CrisisCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrisisCategory::None => "none",
            CrisisCategory::Suicide => "suicide",
            CrisisCategory::SelfHarm => "self_harm",
        }
    }
}

/// Why a text was judged unsafe. Crisis outranks blocked content, which outranks toxicity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Violation {
    Crisis,
    BlockedContent,
    Toxicity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyAssessment {
    pub is_safe: bool,
    pub crisis_detected: bool,
    pub crisis_category: CrisisCategory,
    /// `None` when no classifier ran or it failed.
    pub toxicity_score: Option<f64>,
    /// Phrases, regex matches, and markers that fired, in detection order.
    pub matched_triggers: Vec<String>,
    pub violation: Option<Violation>,
    /// Medical-advice phrases found. Informational only.
    pub advisories: Vec<String>,
}

impl SafetyAssessment {
    pub fn safe() -> Self {
        Self {
            is_safe: true,
            crisis_detected: false,
            crisis_category: CrisisCategory::None,
            toxicity_score: None,
            matched_triggers: Vec::new(),
            violation: None,
            advisories: Vec::new(),
        }
    }
}
