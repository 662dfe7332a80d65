//! Built-in word lists. Everything here is data; matching lives in `TextView`.

use super::{
    CategoryLexicon, CrisisLexicon, DimensionLexicon, NeedsLexicon, TraitIndicators, TraitLexicon,
};

fn list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub(super) fn crisis() -> CrisisLexicon {
    CrisisLexicon {
        suicide: CategoryLexicon {
            phrases: list(&[
                "kill myself",
                "killing myself",
                "end my life",
                "ending my life",
                "take my own life",
                "want to die",
                "wanna die",
                "wish i was dead",
                "wish i were dead",
                "better off dead",
                "better off without me",
                "no reason to live",
                "dont want to live",
                "dont want to be alive",
                "end it all",
                "end it",
                "end things",
                "end everything",
                "suicide",
                "not worth living",
                "commit suicide",
            ]),
            patterns: list(&[
                r"\b(kill|end|take)\s+(my|own)\s+life\b",
                r"\b(commit|committing)\s+suicide\b",
                r"\bsuicid(e|al)\b",
                r"\bwant\s+to\s+die\b",
                r"\bdont\s+want\s+to\s+live\b",
                r"\bend(s|ed|ing)?\s+(it|things|everything)\b",
            ]),
        },
        self_harm: CategoryLexicon {
            phrases: list(&[
                "hurt myself",
                "hurting myself",
                "harm myself",
                "harming myself",
                "cut myself",
                "cutting myself",
                "burn myself",
                "burning myself",
                "self harm",
                "punish myself",
            ]),
            patterns: list(&[
                r"\b(cut|cutting|hurt|harm)\s+(myself|my\s+(arm|arms|wrist|wrists|skin|body))\b",
                r"\bself\s+harm(ing)?\b",
                r"\b(cutting|burning|hitting)\s+myself\b",
            ]),
        },
        max_gap: 2,
    }
}

pub(super) fn blocked_content() -> Vec<String> {
    list(&[
        "[blocked]",
        "lethal dose",
        "how to overdose",
        "best way to kill",
        "painless way to die",
        "you deserve to suffer",
        "you deserve to die",
        "nobody would miss you",
        "go kill yourself",
    ])
}

pub(super) fn medical_red_flags() -> Vec<String> {
    list(&[
        "diagnose",
        "diagnosis",
        "you have",
        "prescribe",
        "medication dosage",
        "stop taking",
    ])
}

pub(super) fn advice_indicators() -> Vec<String> {
    list(&["should", "must", "need to", "have to", "recommend"])
}

pub(super) fn needs() -> NeedsLexicon {
    NeedsLexicon {
        emotion_words: list(&[
            "sad", "angry", "anxious", "worried", "scared", "frustrated", "hopeless",
        ]),
        question_words: list(&["how", "what", "why", "when", "where"]),
        coping_words: list(&["help", "cope", "manage", "deal with"]),
        crisis_indicators: list(&[
            "suicide", "kill", "harm", "hurt myself", "end it", "ending it", "end things",
            "ending things", "end everything",
        ]),
        feeling_words: list(&["feel", "feeling", "felt"]),
    }
}

pub(super) fn dimensions() -> DimensionLexicon {
    DimensionLexicon {
        empathy: list(&[
            "understand",
            "hear you",
            "makes sense",
            "valid",
            "natural",
            "must be",
            "sounds like",
            "feel",
            "difficult",
            "challenging",
        ]),
        reflective_emotions: list(&[
            "feel", "feeling", "felt", "emotion", "sad", "angry", "anxious", "worried", "happy",
            "frustrated",
        ]),
        judgmental: list(&["should have", "why did you", "your fault", "blame"]),
        answer_markers: list(&["because", "reason", "help", "try", "can"]),
        action_words: list(&[
            "try",
            "consider",
            "might",
            "could",
            "practice",
            "technique",
            "strategy",
            "approach",
            "exercise",
        ]),
        structure_markers: list(&["\n-", "\n*", "1.", "2."]),
        safety_red_flags: list(&[
            "diagnose",
            "you have",
            "definitely",
            "certainly have",
            "prescribe",
            "take this medication",
            "stop your medication",
        ]),
        crisis_resource_markers: list(&["crisis", "988", "helpline", "lifeline", "emergency"]),
        alliance: list(&[
            "together",
            "we can",
            "work with",
            "support you",
            "here for you",
            "help you",
            "alongside",
        ]),
        collaborative: list(&[
            "what do you think",
            "how does",
            "would you like",
            "your thoughts",
        ]),
        warmth: list(&["care", "important", "matter", "deserve", "worth"]),
        evidence_terms: list(&[
            "research",
            "studies",
            "evidence",
            "therapy",
            "cbt",
            "mindfulness",
            "technique",
            "practice",
            "shown to",
        ]),
        boundary_phrases: list(&[
            "not a replacement",
            "licensed therapist",
            "professional help",
            "mental health professional",
        ]),
        qualifiers: list(&["might", "could", "sometimes", "often", "may"]),
        stop_words: list(&[
            "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
            "from", "i", "you", "is", "are",
        ]),
    }
}

pub(super) fn traits() -> TraitLexicon {
    TraitLexicon {
        agreeableness: TraitIndicators {
            positive: list(&[
                "understand",
                "agree",
                "together",
                "support",
                "help",
                "care",
                "kindness",
                "compassion",
                "empathy",
                "warm",
                "appreciate",
                "thank",
                "sorry",
                "apologize",
                "valid",
            ]),
            negative: list(&[
                "disagree", "wrong", "shouldnt", "must not", "refuse", "reject", "oppose",
                "conflict", "argue",
            ]),
        },
        conscientiousness: TraitIndicators {
            positive: list(&[
                "plan",
                "organize",
                "structure",
                "goal",
                "step",
                "strategy",
                "careful",
                "consider",
                "think about",
                "prepare",
                "practice",
                "consistent",
                "regular",
                "routine",
                "schedule",
                "systematic",
            ]),
            negative: list(&["random", "whenever", "spontaneous", "impulsive", "careless"]),
        },
        emotional_stability: TraitIndicators {
            positive: list(&[
                "calm", "stable", "peace", "balance", "manage", "cope", "resilient", "handle",
                "steady", "composed", "grounded", "center", "breathe", "relax", "regulate",
            ]),
            negative: list(&[
                "panic",
                "anxious",
                "overwhelm",
                "crisis",
                "disaster",
                "terrible",
                "awful",
                "catastrophe",
            ]),
        },
        openness: TraitIndicators {
            positive: list(&[
                "explore",
                "curious",
                "wonder",
                "imagine",
                "creative",
                "new",
                "different",
                "perspective",
                "possibility",
                "alternative",
                "consider",
                "think about",
                "reflect",
                "insight",
                "learn",
            ]),
            negative: list(&["always", "never", "only way", "must", "rigid", "fixed"]),
        },
        extraversion: TraitIndicators {
            positive: list(&[
                "together",
                "social",
                "connect",
                "reach out",
                "talk to",
                "share",
                "express",
                "communicate",
                "engage",
                "interact",
                "group",
                "people",
                "friends",
                "others",
            ]),
            negative: list(&["alone", "isolate", "withdraw", "avoid", "private", "quiet"]),
        },
    }
}
