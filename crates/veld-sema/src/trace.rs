//! Tracing types for solver observability.
//!
//! These types capture a step-by-step record of constraint solving so
//! tooling can expose how a program was typed. Tracing is opt-in via
//! `CompilerContext::trace_solver`; when disabled, no steps are recorded.

use serde::Serialize;

/// A single step in a solve trace.
#[derive(Debug, Clone, Serialize)]
pub struct SolveStep {
    pub step: usize,
    pub action: SolveAction,
    pub left: String,
    pub right: String,
    pub detail: String,
}

/// What the solver did at a step.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveAction {
    /// Types were already identical.
    Identity,
    /// The error type absorbed the constraint.
    Absorb,
    /// A type variable was bound (e.g. `$0 := Int`).
    Bind,
    /// A compound constraint decomposed into component constraints.
    Decompose,
    /// A generic type was opened with fresh variables.
    Open,
    /// A member or construction constraint waited for its owner to resolve.
    Defer,
    /// A disjunction forked into branch exploration.
    Fork,
    /// The occurs check rejected a binding.
    OccursCheck,
    /// A constraint failed.
    Error,
}
