//! Reasoning states and the transition table.
//!
//! Every trace entry costs one unit of the step budget. `next` only moves into a state
//! when at least one unit remains, so the controller can never exceed the budget.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    Analyze,
    AssessNeeds,
    Draft,
    Critique,
    Refine,
    Reflect,
}

impl StepName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::Analyze => "analyze",
            StepName::AssessNeeds => "assess_needs",
            StepName::Draft => "draft",
            StepName::Critique => "critique",
            StepName::Refine => "refine",
            StepName::Reflect => "reflect",
        }
    }

    /// Steps that call the generation service.
    pub fn is_generative(&self) -> bool {
        !matches!(self, StepName::AssessNeeds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningState {
    Step(StepName),
    Done,
    Crisis,
}

/// Outcome of running the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Completed,
    CrisisFlagged,
    /// Critique adequacy at or above the threshold.
    Adequate,
    /// Critique adequacy below the threshold.
    Inadequate,
}

/// Inputs the transition table reads. Built fresh before every transition.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext {
    pub remaining_steps: usize,
    pub refinements_used: usize,
    pub refinement_budget: usize,
    pub chain_of_thought: bool,
    pub self_critique: bool,
    pub reflection: bool,
}

impl TransitionContext {
    fn can_take(&self, step: StepName) -> bool {
        match step {
            // analyze + assess_needs + draft
            StepName::Analyze => self.chain_of_thought && self.remaining_steps >= 3,
            StepName::AssessNeeds | StepName::Draft => self.remaining_steps >= 1,
            StepName::Critique => self.self_critique && self.remaining_steps >= 1,
            StepName::Refine => {
                self.self_critique
                    && self.refinements_used < self.refinement_budget
                    && self.remaining_steps >= 1
            }
            StepName::Reflect => self.reflection && self.remaining_steps >= 1,
        }
    }

    fn first_of(&self, candidates: &[StepName]) -> ReasoningState {
        candidates
            .iter()
            .copied()
            .find(|s| self.can_take(*s))
            .map(ReasoningState::Step)
            .unwrap_or(ReasoningState::Done)
    }
}

pub fn initial(ctx: &TransitionContext) -> ReasoningState {
    ctx.first_of(&[StepName::Analyze, StepName::AssessNeeds])
}

pub fn next(state: ReasoningState, signal: Signal, ctx: &TransitionContext) -> ReasoningState {
    use ReasoningState::{Crisis, Done, Step};
    use StepName::*;

    match (state, signal) {
        (Step(Analyze), Signal::Completed) => ctx.first_of(&[AssessNeeds]),
        (Step(AssessNeeds), Signal::CrisisFlagged) => Crisis,
        (Step(AssessNeeds), Signal::Completed) => ctx.first_of(&[Draft]),
        (Step(Draft), Signal::Completed) => ctx.first_of(&[Critique, Reflect]),
        (Step(Critique), Signal::Inadequate) => ctx.first_of(&[Refine, Reflect]),
        (Step(Critique), Signal::Adequate) => ctx.first_of(&[Reflect]),
        // A refinement is judged once more when budget allows.
        (Step(Refine), Signal::Completed) => ctx.first_of(&[Critique, Reflect]),
        (Step(Reflect), Signal::Completed) => Done,
        (Crisis, _) => Crisis,
        _ => Done,
    }
}
