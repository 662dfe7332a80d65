//! Lexicon store: immutable phrase tables shared by the gate, the evaluator and the analyzer.
//!
//! The built-in lexicon is constructed once per process and handed out as `Arc<Lexicon>`.
//! A custom lexicon can be loaded from TOML; any table left out keeps its built-in contents.

mod defaults;

use crate::error::{ConfigResult, ConfigurationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

static DEFAULT_LEXICON: Lazy<Arc<Lexicon>> = Lazy::new(|| Arc::new(Lexicon::builtin()));

/// Phrases and regexes for one crisis category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryLexicon {
    /// Normalized phrases matched word-by-word (see `TextView::contains_phrase_loosely`).
    #[serde(default)]
    pub phrases: Vec<String>,
    /// Regexes applied to normalized text.
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrisisLexicon {
    pub suicide: CategoryLexicon,
    pub self_harm: CategoryLexicon,
    /// Words allowed between consecutive words of a crisis phrase.
    #[serde(default = "default_max_gap")]
    pub max_gap: usize,
}

fn default_max_gap() -> usize {
    2
}

impl Default for CrisisLexicon {
    fn default() -> Self {
        defaults::crisis()
    }
}

/// Keyword lists for the rule-based needs classifier used while reasoning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeedsLexicon {
    pub emotion_words: Vec<String>,
    pub question_words: Vec<String>,
    pub coping_words: Vec<String>,
    pub crisis_indicators: Vec<String>,
    pub feeling_words: Vec<String>,
}

impl Default for NeedsLexicon {
    fn default() -> Self {
        defaults::needs()
    }
}

/// Indicator lists for the COTHERF dimension scorers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionLexicon {
    pub empathy: Vec<String>,
    pub reflective_emotions: Vec<String>,
    pub judgmental: Vec<String>,
    pub answer_markers: Vec<String>,
    pub action_words: Vec<String>,
    /// Raw substrings (not normalized): list bullets, numbered steps.
    pub structure_markers: Vec<String>,
    pub safety_red_flags: Vec<String>,
    pub crisis_resource_markers: Vec<String>,
    pub alliance: Vec<String>,
    pub collaborative: Vec<String>,
    pub warmth: Vec<String>,
    pub evidence_terms: Vec<String>,
    pub boundary_phrases: Vec<String>,
    pub qualifiers: Vec<String>,
    pub stop_words: Vec<String>,
}

impl Default for DimensionLexicon {
    fn default() -> Self {
        defaults::dimensions()
    }
}

/// Positive and negative indicators for one trait. The two lists must be disjoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraitIndicators {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraitLexicon {
    pub agreeableness: TraitIndicators,
    pub conscientiousness: TraitIndicators,
    pub emotional_stability: TraitIndicators,
    pub openness: TraitIndicators,
    pub extraversion: TraitIndicators,
}

impl Default for TraitLexicon {
    fn default() -> Self {
        defaults::traits()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lexicon {
    #[serde(default)]
    pub crisis: CrisisLexicon,
    /// Markers that make text unsafe on their own. Matched on lowercased raw text.
    #[serde(default = "defaults::blocked_content")]
    pub blocked_content: Vec<String>,
    /// Medical-advice phrases reported as advisories on generated text.
    #[serde(default = "defaults::medical_red_flags")]
    pub medical_red_flags: Vec<String>,
    /// Advice phrasing that triggers the safety disclaimer.
    #[serde(default = "defaults::advice_indicators")]
    pub advice_indicators: Vec<String>,
    #[serde(default)]
    pub needs: NeedsLexicon,
    #[serde(default)]
    pub dimensions: DimensionLexicon,
    #[serde(default)]
    pub traits: TraitLexicon,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Lexicon {
    fn builtin() -> Self {
        Self {
            crisis: defaults::crisis(),
            blocked_content: defaults::blocked_content(),
            medical_red_flags: defaults::medical_red_flags(),
            advice_indicators: defaults::advice_indicators(),
            needs: defaults::needs(),
            dimensions: defaults::dimensions(),
            traits: defaults::traits(),
        }
    }

    /// Process-wide built-in lexicon.
    pub fn shared() -> Arc<Lexicon> {
        Arc::clone(&DEFAULT_LEXICON)
    }

    /// Parse a lexicon from TOML. Tables that are left out keep their built-in lists.
    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        let lexicon: Lexicon = toml::from_str(s)?;
        if lexicon.crisis.suicide.phrases.is_empty() && lexicon.crisis.suicide.patterns.is_empty() {
            return Err(ConfigurationError::Invalid(
                "crisis.suicide must define at least one phrase or pattern".to_string(),
            ));
        }
        Ok(lexicon)
    }
}

/// A validated lexicon with its crisis regexes compiled.
#[derive(Debug, Clone)]
pub struct CompiledLexicon {
    lexicon: Arc<Lexicon>,
    suicide_patterns: Vec<Regex>,
    self_harm_patterns: Vec<Regex>,
}

impl CompiledLexicon {
    pub fn new(lexicon: Arc<Lexicon>) -> ConfigResult<Self> {
        let suicide_patterns = compile_all(&lexicon.crisis.suicide.patterns)?;
        let self_harm_patterns = compile_all(&lexicon.crisis.self_harm.patterns)?;
        lexicon.traits.validate()?;
        Ok(Self {
            lexicon,
            suicide_patterns,
            self_harm_patterns,
        })
    }

    /// Compiled form of the process-wide built-in lexicon.
    pub fn builtin() -> ConfigResult<Self> {
        Self::new(Lexicon::shared())
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn suicide_patterns(&self) -> &[Regex] {
        &self.suicide_patterns
    }

    pub fn self_harm_patterns(&self) -> &[Regex] {
        &self.self_harm_patterns
    }
}

fn compile_all(patterns: &[String]) -> ConfigResult<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| ConfigurationError::Pattern {
                pattern: p.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

fn check_disjoint(name: &str, indicators: &TraitIndicators) -> ConfigResult<()> {
    let positive: HashSet<String> = indicators.positive.iter().map(|p| normalize(p)).collect();
    if let Some(shared) = indicators
        .negative
        .iter()
        .map(|n| normalize(n))
        .find(|n| positive.contains(n))
    {
        return Err(ConfigurationError::TraitIndicators {
            name: name.to_string(),
            reason: format!("`{}` is both a positive and a negative indicator", shared),
        });
    }
    Ok(())
}

impl TraitLexicon {
    /// Trait tables in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &TraitIndicators)> {
        [
            ("agreeableness", &self.agreeableness),
            ("conscientiousness", &self.conscientiousness),
            ("emotional_stability", &self.emotional_stability),
            ("openness", &self.openness),
            ("extraversion", &self.extraversion),
        ]
        .into_iter()
    }

    /// Positive and negative lists of each trait must not share an indicator.
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, indicators) in self.iter() {
            check_disjoint(name, indicators)?;
        }
        Ok(())
    }
}

/// Lowercase, drop apostrophes, map every other non-alphanumeric character to a space,
/// and collapse runs of whitespace.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars() {
        if ch == '\'' || ch == '\u{2019}' {
            continue;
        }
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out
}

/// Pre-normalized views of one piece of text.
#[derive(Debug, Clone)]
pub struct TextView {
    lowered: String,
    normalized: String,
    padded: String,
    tokens: Vec<String>,
}

impl TextView {
    pub fn new(text: &str) -> Self {
        let lowered = text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        let normalized = normalize(text);
        let padded = format!(" {} ", normalized);
        let tokens = normalized.split(' ').filter(|t| !t.is_empty()).map(str::to_string).collect();
        Self {
            lowered,
            normalized,
            padded,
            tokens,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn word_count(&self) -> usize {
        self.tokens.len()
    }

    /// Word-start match: `feel` matches `feeling`, `agree` does not match `disagree`.
    pub fn contains_phrase(&self, phrase: &str) -> bool {
        let needle = normalize(phrase);
        if needle.is_empty() {
            return false;
        }
        self.padded.contains(&format!(" {}", needle))
    }

    /// Substring match on lowercased text with punctuation kept.
    pub fn contains_raw(&self, marker: &str) -> bool {
        let needle = marker.trim().to_lowercase();
        !needle.is_empty() && self.lowered.contains(&needle)
    }

    /// Number of distinct indicators present (word-start semantics).
    pub fn count_distinct(&self, indicators: &[String]) -> usize {
        indicators.iter().filter(|p| self.contains_phrase(p)).count()
    }

    pub fn any_phrase(&self, indicators: &[String]) -> bool {
        indicators.iter().any(|p| self.contains_phrase(p))
    }

    pub fn first_phrase<'a>(&self, indicators: &'a [String]) -> Option<&'a str> {
        indicators
            .iter()
            .find(|p| self.contains_phrase(p))
            .map(String::as_str)
    }

    /// Ordered match of `phrase` where up to `max_gap` extra words may sit between
    /// consecutive phrase words. The first word matches on word start ("ending" for "end"),
    /// later words must match whole. "want to just die" matches "want to die".
    pub fn contains_phrase_loosely(&self, phrase: &str, max_gap: usize) -> bool {
        let needle = normalize(phrase);
        let words: Vec<&str> = needle.split(' ').filter(|w| !w.is_empty()).collect();
        let Some((first, rest)) = words.split_first() else {
            return false;
        };
        'start: for (i, token) in self.tokens.iter().enumerate() {
            if !token.starts_with(first) {
                continue;
            }
            let mut pos = i;
            for word in rest {
                let window_end = (pos + 1 + max_gap).min(self.tokens.len().saturating_sub(1));
                let found = (pos + 1..=window_end).find(|&j| self.tokens[j] == *word);
                match found {
                    Some(j) => pos = j,
                    None => continue 'start,
                }
            }
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_punctuation_and_apostrophes() {
        assert_eq!(normalize("  I DON'T   want...to live!  "), "i dont want to live");
        assert_eq!(normalize("self-harm"), "self harm");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn word_start_matching() {
        let view = TextView::new("I'm feeling like I disagree.");
        assert!(view.contains_phrase("feel"));
        assert!(!view.contains_phrase("agree"));
        assert!(view.contains_phrase("disagree"));
    }

    #[test]
    fn loose_phrase_allows_small_gaps() {
        let view = TextView::new("I want to just die");
        assert!(view.contains_phrase_loosely("want to die", 2));
        assert!(!view.contains_phrase_loosely("want to die", 0));
        let far = TextView::new("I want to go to the store and die my hair");
        assert!(!far.contains_phrase_loosely("want to die", 2));
    }

    #[test]
    fn loose_phrase_requires_whole_words() {
        let view = TextView::new("I want to diet");
        assert!(!view.contains_phrase_loosely("want to die", 2));
    }

    #[test]
    fn loose_phrase_first_word_matches_inflections() {
        let view = TextView::new("I am thinking about ending it all");
        assert!(view.contains_phrase_loosely("end it all", 2));
        assert!(TextView::new("I wanted to die").contains_phrase_loosely("want to die", 2));
        assert!(!TextView::new("the killer app").contains_phrase_loosely("kill myself", 2));
    }

    #[test]
    fn raw_markers_keep_punctuation() {
        let view = TextView::new("Here is the [BLOCKED] part");
        assert!(view.contains_raw("[blocked]"));
        assert!(!TextView::new("I felt blocked at work").contains_raw("[blocked]"));
    }

    #[test]
    fn shared_lexicon_is_single_instance() {
        let a = Lexicon::shared();
        let b = Lexicon::shared();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn builtin_lexicon_compiles() {
        let compiled = CompiledLexicon::builtin().unwrap();
        assert!(!compiled.suicide_patterns().is_empty());
        assert!(!compiled.self_harm_patterns().is_empty());
    }

    #[test]
    fn bad_pattern_is_a_configuration_error() {
        let mut lexicon = Lexicon::default();
        lexicon.crisis.suicide.patterns.push("(unclosed".to_string());
        let err = CompiledLexicon::new(Arc::new(lexicon)).unwrap_err();
        assert!(matches!(err, ConfigurationError::Pattern { .. }));
    }

    #[test]
    fn overlapping_trait_indicators_are_rejected() {
        let mut lexicon = Lexicon::default();
        lexicon.traits.openness.negative.push("Explore".to_string());
        let err = CompiledLexicon::new(Arc::new(lexicon)).unwrap_err();
        assert!(matches!(err, ConfigurationError::TraitIndicators { .. }));
    }

    #[test]
    fn toml_override_keeps_other_tables() {
        let lexicon = Lexicon::from_toml_str(
            r#"
            blocked_content = ["forbidden marker"]
            "#,
        )
        .unwrap();
        assert_eq!(lexicon.blocked_content, vec!["forbidden marker".to_string()]);
        assert!(!lexicon.crisis.suicide.phrases.is_empty());
        assert!(!lexicon.traits.openness.positive.is_empty());
    }
}
