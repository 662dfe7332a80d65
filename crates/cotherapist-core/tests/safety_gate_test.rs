//! Integration test: crisis gate behaviour on input and output text.
//!
//! Covers the literal crisis phrase, paraphrases of lexicon phrases, byte-stable crisis
//! messages, blocked content on output, and the absence of false crisis flags on everyday text.

use cotherapist_core::config::SafetyConfig;
use cotherapist_core::doubles::ScriptedGenerator;
use cotherapist_core::safety::{CrisisDirectory, CrisisResource, Violation};
use cotherapist_core::{
    CompiledLexicon, CrisisCategory, CrisisSafetyGate, GenerateOptions, Pipeline, PipelineConfig,
};
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn gate() -> CrisisSafetyGate {
    CrisisSafetyGate::new(SafetyConfig::default(), CompiledLexicon::builtin().unwrap()).unwrap()
}

#[tokio::test]
async fn literal_crisis_phrase_is_flagged_as_suicide() {
    let a = gate().check("I want to kill myself").await;
    assert!(a.crisis_detected);
    assert!(!a.is_safe);
    assert_eq!(a.crisis_category, CrisisCategory::Suicide);
    assert_eq!(a.violation, Some(Violation::Crisis));
}

#[tokio::test]
async fn crisis_response_is_byte_identical_across_calls() {
    init_tracing();
    let generator = Arc::new(ScriptedGenerator::constant("should never be used"));
    let pipeline = Pipeline::builder(PipelineConfig::default())
        .generator(generator.clone())
        .build()
        .unwrap();

    let first = pipeline
        .generate("I want to kill myself", GenerateOptions::default())
        .await
        .unwrap();
    let second = pipeline
        .generate("I want to kill myself", GenerateOptions::default())
        .await
        .unwrap();

    assert!(first.crisis_detected);
    assert_eq!(first.input_safety.crisis_category, CrisisCategory::Suicide);
    assert_eq!(first.response, pipeline.gate().crisis_message());
    assert_eq!(first.response.as_bytes(), second.response.as_bytes());
    assert_eq!(generator.calls(), 0, "crisis input must not reach generation");
    assert!(first.trace.is_none());
}

#[tokio::test]
async fn crisis_message_uses_configured_directory() {
    let directory = CrisisDirectory::empty().with_locale(
        "en-US",
        vec![CrisisResource::new("Campus line", "555-0100")],
    );
    let pipeline = Pipeline::builder(PipelineConfig::default())
        .generator(Arc::new(ScriptedGenerator::constant("unused")))
        .crisis_directory(directory)
        .build()
        .unwrap();
    let result = pipeline
        .generate("I have been cutting myself", GenerateOptions::default())
        .await
        .unwrap();
    assert!(result.crisis_detected);
    assert_eq!(result.input_safety.crisis_category, CrisisCategory::SelfHarm);
    assert!(result.response.contains("Campus line: 555-0100"));
}

#[tokio::test]
async fn blocked_marker_fails_output_gate_after_safe_input() {
    let pipeline = Pipeline::builder(PipelineConfig::default())
        .generator(Arc::new(ScriptedGenerator::constant(
            "Sure, here is the [BLOCKED] material you asked about.",
        )))
        .build()
        .unwrap();
    let options = GenerateOptions {
        use_reasoning: false,
        ..GenerateOptions::default()
    };
    let result = pipeline.generate("I had a hard week at work", options).await.unwrap();

    assert!(result.input_safety.is_safe);
    assert!(!result.safety.is_safe);
    assert_eq!(result.safety.violation, Some(Violation::BlockedContent));
    assert!(!result.crisis_detected);
    assert_eq!(
        result.response,
        "I apologize, but I need to rephrase my response. How can I better support you?"
    );
}

#[tokio::test]
async fn paraphrased_crisis_never_reaches_generation() {
    let generator = Arc::new(ScriptedGenerator::constant("Here is a generated reply."));
    let pipeline = Pipeline::builder(PipelineConfig::default())
        .generator(generator.clone())
        .build()
        .unwrap();
    let options = GenerateOptions {
        use_reasoning: false,
        ..GenerateOptions::default()
    };
    for query in [
        "I am thinking about ending it all",
        "some days I just want to end it",
        "I want to end things",
    ] {
        let result = pipeline.generate(query, options).await.unwrap();
        assert!(result.input_safety.crisis_detected, "gate missed: {}", query);
        assert!(result.crisis_detected);
        assert_eq!(result.response, pipeline.gate().crisis_message());
    }
    assert_eq!(generator.calls(), 0);
}

#[test]
fn everyday_text_never_flags_crisis() {
    let g = gate();
    let corpus = [
        "I'm stressed about my thesis deadline.",
        "My sister and I argued about dinner plans.",
        "I want to do better at my job.",
        "I feel like I'm always tired in the mornings.",
        "Can we talk about how to set boundaries with friends?",
        "I'm dying to see the new movie this weekend.",
        "The killer feature of my phone is the camera.",
        "I want to get better sleep and diet.",
    ];
    for text in corpus {
        let a = g.assess(text, None);
        assert!(!a.crisis_detected, "false crisis flag for: {}", text);
        assert_eq!(a.crisis_category, CrisisCategory::None);
    }
}

#[test]
fn assessment_is_deterministic() {
    let g = gate();
    let a = g.assess("Sometimes I wish I were dead", Some(0.1));
    let b = g.assess("Sometimes I wish I were dead", Some(0.1));
    assert_eq!(a, b);
    assert!(a.crisis_detected);
}
