//! Prompt templates for each generative reasoning state.

use crate::clients::RetrievedContext;

fn context_block(context: &[RetrievedContext]) -> String {
    if context.is_empty() {
        return String::new();
    }
    let mut block = String::from("\n\nRelevant context:\n");
    for (i, c) in context.iter().enumerate() {
        block.push_str(&format!("[{}] {}\n", i + 1, c.text.trim()));
    }
    block
}

pub fn analyze(query: &str, context: &[RetrievedContext]) -> String {
    format!(
        "Analyze this therapeutic situation step by step:\n\n\
         User's message: {query}{ctx}\n\n\
         Consider:\n\
         1. What emotions might the person be experiencing?\n\
         2. What are the underlying concerns or needs?\n\
         3. Are there any crisis indicators?\n\
         4. What would be most helpful right now?\n\n\
         Provide a brief analysis:",
        query = query,
        ctx = context_block(context),
    )
}

pub fn draft(
    query: &str,
    context: &[RetrievedContext],
    needs: &str,
    analysis: Option<&str>,
) -> String {
    let analysis = analysis
        .map(|a| format!("\n\nSituation analysis: {}", a.trim()))
        .unwrap_or_default();
    format!(
        "User's message: {query}{ctx}{analysis}\n\n\
         Therapeutic needs identified: {needs}\n\n\
         Provide a compassionate, empathetic response that addresses these needs.",
        query = query,
        ctx = context_block(context),
        analysis = analysis,
        needs = needs,
    )
}

/// Prompt for direct generation when the reasoning loop is off.
pub fn single_shot(query: &str, context: &[RetrievedContext]) -> String {
    format!(
        "User's message: {query}{ctx}\n\n\
         Respond with warmth and empathy. Validate the person's feelings and, if helpful, \
         offer one or two gentle suggestions.",
        query = query,
        ctx = context_block(context),
    )
}

pub fn critique(response: &str, needs: &str) -> String {
    format!(
        "Evaluate this therapeutic response:\n\n\
         Response: {response}\n\n\
         Needs to address: {needs}\n\n\
         Critique checklist:\n\
         - Is it empathetic and validating?\n\
         - Does it address the identified needs?\n\
         - Is it safe and appropriate?\n\
         - Is it actionable if needed?\n\
         - Does it maintain boundaries?\n\n\
         Provide brief critique, ending with `score: <0-1>`:",
        response = response,
        needs = needs,
    )
}

pub fn refine(initial: &str, critique: &str, needs: &str) -> String {
    format!(
        "Original response: {initial}\n\n\
         Critique: {critique}\n\n\
         Needs: {needs}\n\n\
         Provide an improved response that addresses the critique:",
        initial = initial,
        critique = critique,
        needs = needs,
    )
}

pub fn reflect(response: &str, query: &str) -> String {
    format!(
        "User's message: {query}\n\n\
         Final response: {response}\n\n\
         Briefly reflect on whether the response shows empathy, offers actionable \
         suggestions, and has an appropriate length:",
        query = query,
        response = response,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_includes_needs_and_numbered_context() {
        let ctx = vec![RetrievedContext {
            text: " Grounding exercises help. ".to_string(),
            similarity: 0.9,
        }];
        let prompt = draft("I feel lost", &ctx, "empathy_and_support", Some("sadness"));
        assert!(prompt.contains("[1] Grounding exercises help."));
        assert!(prompt.contains("Therapeutic needs identified: empathy_and_support"));
        assert!(prompt.contains("Situation analysis: sadness"));
    }

    #[test]
    fn no_context_block_when_empty() {
        assert!(!analyze("hello", &[]).contains("Relevant context"));
    }
}
