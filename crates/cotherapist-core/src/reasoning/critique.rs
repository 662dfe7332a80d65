//! Critique adequacy scoring.

use crate::lexicon::TextView;

const DEFICIENCY_MARKERS: &[&str] = &[
    "needs improvement",
    "consider",
    "lacks",
    "missing",
    "could be more",
    "not empathetic",
    "unsafe",
    "too brief",
    "too long",
];

const PENALTY_PER_MARKER: f64 = 0.25;

/// Adequacy in [0, 1] of a draft as judged by its critique. An explicit `score: x` wins,
/// otherwise each distinct deficiency marker costs 0.25.
pub fn adequacy(critique: &str) -> f64 {
    if let Some(score) = explicit_score(critique) {
        return score.clamp(0.0, 1.0);
    }
    let view = TextView::new(critique);
    let hits = DEFICIENCY_MARKERS
        .iter()
        .filter(|m| view.contains_phrase(m))
        .count();
    (1.0 - PENALTY_PER_MARKER * hits as f64).clamp(0.0, 1.0)
}

/// First `score: <number>` (or `score = <number>`), case-insensitive.
fn explicit_score(text: &str) -> Option<f64> {
    let lowered = text.to_lowercase();
    let mut search_from = 0;
    while let Some(pos) = lowered[search_from..].find("score") {
        let after = &lowered[search_from + pos + "score".len()..];
        let rest = after.trim_start();
        if let Some(rest) = rest.strip_prefix(':').or_else(|| rest.strip_prefix('=')) {
            let number: String = rest
                .trim_start()
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            // "0.3." at the end of a sentence
            if let Ok(value) = number.trim_end_matches('.').parse::<f64>() {
                if value.is_finite() {
                    return Some(value);
                }
            }
        }
        search_from += pos + "score".len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_critique_is_fully_adequate() {
        assert_eq!(adequacy("Warm, validating, and safe."), 1.0);
    }

    #[test]
    fn markers_reduce_adequacy() {
        assert_eq!(adequacy("It lacks warmth and is too brief."), 0.5);
        assert_eq!(
            adequacy("needs improvement; lacks warmth; missing resources; unsafe; too long"),
            0.0
        );
    }

    #[test]
    fn explicit_score_wins() {
        assert_eq!(adequacy("Lacks detail. Score: 0.9"), 0.9);
        assert_eq!(adequacy("SCORE = 0.3"), 0.3);
        assert_eq!(adequacy("score: 7"), 1.0);
    }

    #[test]
    fn sentence_final_period_is_not_part_of_the_score() {
        assert_eq!(adequacy("It is warm. Score: 0.3."), 0.3);
        assert_eq!(adequacy("Too cold for this user. Score: 0.2."), 0.2);
        assert_eq!(adequacy("score: 1."), 1.0);
    }

    #[test]
    fn score_word_without_number_falls_back() {
        assert_eq!(adequacy("The score is hard to judge, but it lacks warmth"), 0.75);
    }
}
