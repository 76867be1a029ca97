//! BDI-Rust: matching and execution core of a BDI agent interpreter.
//!
//! This crate provides:
//! - Term representation (values, variables, literals with annotations)
//! - A concurrent belief base partitioned by sign and functor path
//! - Three-tier hash-pruned unification with guard evaluation
//! - Rules, a two-pass rule registry and proxy calls between rules
//! - Graded truth values and the execution protocol

pub mod agent;
pub mod aggregation;
pub mod beliefbase;
pub mod context;
pub mod execution;
pub mod expression;
pub mod path;
pub mod proxy;
pub mod rule;
pub mod term;
pub mod truth;
pub mod unify;


// Re-exports for convenience
pub use agent::{Agent, AgentBuilder, AgentConfig, AgentStats};
pub use aggregation::{Aggregation, Max, Mean, Min, Sum};
pub use beliefbase::{BeliefBase, Storage};
pub use context::Context;
pub use execution::{
    BeliefAction, BeliefOp, Execution, ExecutionError, RawAction, RulePlaceholder, TestGoal,
};
pub use expression::{BinaryOp, Expression, Increment, IncrementOp, UnaryOp};
pub use path::{Path, PathError};
pub use proxy::{ProxyPolicy, ProxyRule};
pub use rule::{Rule, RuleError, RuleId, RuleRegistry, RuleSet, Scorer};
pub use term::{descend, Descend, Literal, Term, Value, Variable};
pub use truth::Truth;
pub use unify::{match_head, Bindings, HeadMatch, Tier, Unifier};
