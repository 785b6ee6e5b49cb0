//! Adaptive question selection
//!
//! Picks the next survey field from the answers collected so far. Each
//! field may carry branching rules (a tagged predicate plus a target); the
//! first matching rule wins, otherwise the static declaration order
//! applies, skipping fields that are only reachable through a rule.
//!
//! The selector is a pure function of (survey, current field, answers).

mod errors;
mod rules;
mod selector;

pub use errors::{AdaptiveError, AdaptiveResult};
pub use rules::{BranchRule, RulePredicate, ThresholdOp};
pub use selector::{AdaptiveDecision, AdaptiveSelector};
