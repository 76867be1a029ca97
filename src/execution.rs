//! The execution protocol.
//!
//! Every executable element (raw actions, belief actions, test goals,
//! expressions, rules and proxies) implements [`Execution`]. A call runs
//! against a mutable [`Context`], appends zero or more terms to the
//! caller's result sink and returns a graded [`Truth`]. Faults are not
//! truth values: they are returned as [`ExecutionError`] and propagate.

use crate::context::Context;
use crate::path::Path;
use crate::rule::{RuleError, Scorer};
use crate::term::{Literal, Term, Value};
use crate::truth::Truth;
use crate::unify::Unifier;
use rustc_hash::FxHasher;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use thiserror::Error;

/// Execution faults.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    #[error("unknown {kind} `{token}`")]
    UnknownToken { kind: &'static str, token: String },

    #[error("variable `{name}` is not allocated in {context}")]
    Unallocated { name: Arc<str>, context: Context },

    #[error("{message} in {context}")]
    Runtime { message: String, context: Context },

    #[error("`{literal}` executed before linking")]
    Unlinked { literal: Literal },

    #[error(transparent)]
    Rule(#[from] RuleError),
}

impl ExecutionError {
    /// Runtime fault carrying a copy of the failing context.
    pub fn runtime(message: impl Into<String>, context: &Context) -> Self {
        let message = message.into();
        tracing::warn!(%message, %context, "runtime fault");
        ExecutionError::Runtime {
            message,
            context: context.duplicate(),
        }
    }

    pub fn unallocated(name: impl Into<Arc<str>>, context: &Context) -> Self {
        let name = name.into();
        tracing::warn!(%name, %context, "unallocated variable");
        ExecutionError::Unallocated {
            name,
            context: context.duplicate(),
        }
    }

    pub fn unknown_token(kind: &'static str, token: impl Into<String>) -> Self {
        ExecutionError::UnknownToken {
            kind,
            token: token.into(),
        }
    }
}

/// Anything that can be run inside a context.
pub trait Execution: Send + Sync + Debug {
    /// Run against `context`.
    ///
    /// `parallel` is a hint that nested work may be spread over the rayon
    /// pool. Produced terms are appended to `results`.
    fn execute(
        &self,
        context: &mut Context,
        parallel: bool,
        arguments: &[Term],
        results: &mut Vec<Term>,
        annotations: &[Term],
    ) -> Result<Truth, ExecutionError>;

    /// Cost estimate, one unit unless overridden.
    fn score(&self, _scorer: &mut Scorer<'_>) -> f64 {
        1.0
    }

    /// Stable structural fingerprint, used to identify rules.
    fn fingerprint(&self) -> u64;

    /// Unresolved rule reference, if this is one.
    fn placeholder(&self) -> Option<&Literal> {
        None
    }
}

/// Fingerprint of a tagged hashable payload.
pub(crate) fn fingerprint_of<T: Hash + ?Sized>(tag: &str, payload: &T) -> u64 {
    let mut hasher = FxHasher::default();
    tag.hash(&mut hasher);
    payload.hash(&mut hasher);
    hasher.finish()
}

/// A bare term used as a step.
///
/// A boolean value yields its own truth, a variable yields the truth of its
/// boolean binding (false when unbound, true for non-boolean bindings).
/// Values and booleans are also appended to the sink.
#[derive(Clone, Debug, PartialEq)]
pub struct RawAction {
    value: Term,
}

impl RawAction {
    pub fn new(value: Term) -> Self {
        RawAction { value }
    }

    pub fn value(&self) -> &Term {
        &self.value
    }
}

impl Execution for RawAction {
    fn execute(
        &self,
        context: &mut Context,
        _parallel: bool,
        _arguments: &[Term],
        results: &mut Vec<Term>,
        _annotations: &[Term],
    ) -> Result<Truth, ExecutionError> {
        match &self.value {
            Term::Variable(_) => Ok(match context.resolve(&self.value) {
                Term::Variable(_) => Truth::FALSE,
                resolved => match resolved.raw() {
                    Some(Value::Bool(b)) => Truth::from(*b),
                    _ => Truth::TRUE,
                },
            }),
            Term::Value(Value::Bool(b)) => {
                results.push(self.value.clone());
                Ok(Truth::from(*b))
            }
            other => {
                results.push(context.resolve(other));
                Ok(Truth::TRUE)
            }
        }
    }

    fn fingerprint(&self) -> u64 {
        fingerprint_of("raw", &self.value)
    }
}

/// Belief base mutation kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BeliefOp {
    Add,
    Delete,
}

impl BeliefOp {
    /// Parse `+` or `-`.
    pub fn from_token(token: &str) -> Result<Self, ExecutionError> {
        match token {
            "+" => Ok(BeliefOp::Add),
            "-" => Ok(BeliefOp::Delete),
            other => Err(ExecutionError::unknown_token("belief action", other)),
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            BeliefOp::Add => "+",
            BeliefOp::Delete => "-",
        }
    }
}

/// Add or delete a fact, resolved against the context first.
/// Always succeeds; whether the base actually changed is not reported.
#[derive(Clone, Debug, PartialEq)]
pub struct BeliefAction {
    op: BeliefOp,
    literal: Literal,
}

impl BeliefAction {
    pub fn new(op: BeliefOp, literal: Literal) -> Self {
        BeliefAction { op, literal }
    }

    pub fn add(literal: Literal) -> Self {
        BeliefAction::new(BeliefOp::Add, literal)
    }

    pub fn delete(literal: Literal) -> Self {
        BeliefAction::new(BeliefOp::Delete, literal)
    }

    pub fn op(&self) -> BeliefOp {
        self.op
    }

    pub fn literal(&self) -> &Literal {
        &self.literal
    }
}

impl Execution for BeliefAction {
    fn execute(
        &self,
        context: &mut Context,
        _parallel: bool,
        _arguments: &[Term],
        _results: &mut Vec<Term>,
        _annotations: &[Term],
    ) -> Result<Truth, ExecutionError> {
        let literal = context.instantiate(&self.literal);
        let beliefs = context.agent().beliefbase();
        match self.op {
            BeliefOp::Add => beliefs.add(literal),
            BeliefOp::Delete => beliefs.remove(&literal),
        };
        Ok(Truth::TRUE)
    }

    fn fingerprint(&self) -> u64 {
        fingerprint_of(self.op.token(), &self.literal)
    }
}

/// Query the belief base, binding variables of the literal on success.
#[derive(Clone, Debug)]
pub struct TestGoal {
    literal: Literal,
    guard: Option<Arc<dyn Execution>>,
}

impl TestGoal {
    pub fn new(literal: Literal) -> Self {
        TestGoal {
            literal,
            guard: None,
        }
    }

    /// Only accept binding sets for which `guard` yields true.
    pub fn with_guard(mut self, guard: Arc<dyn Execution>) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn literal(&self) -> &Literal {
        &self.literal
    }
}

impl Execution for TestGoal {
    fn execute(
        &self,
        context: &mut Context,
        parallel: bool,
        _arguments: &[Term],
        _results: &mut Vec<Term>,
        _annotations: &[Term],
    ) -> Result<Truth, ExecutionError> {
        Unifier.unify(context, &self.literal, self.guard.as_deref(), parallel)
    }

    fn fingerprint(&self) -> u64 {
        let guard = self.guard.as_ref().map(|g| g.fingerprint());
        fingerprint_of("?", &(&self.literal, guard))
    }
}

/// Reference to a rule by path, resolved into a proxy when the rule set is
/// linked. Executing one before linking is a fault.
#[derive(Clone, Debug, PartialEq)]
pub struct RulePlaceholder {
    literal: Literal,
}

impl RulePlaceholder {
    pub fn new(literal: Literal) -> Self {
        RulePlaceholder { literal }
    }

    /// Path of the referenced rule.
    pub fn path(&self) -> &Path {
        self.literal.functor()
    }
}

impl Execution for RulePlaceholder {
    fn execute(
        &self,
        _context: &mut Context,
        _parallel: bool,
        _arguments: &[Term],
        _results: &mut Vec<Term>,
        _annotations: &[Term],
    ) -> Result<Truth, ExecutionError> {
        Err(ExecutionError::Unlinked {
            literal: self.literal.clone(),
        })
    }

    fn fingerprint(&self) -> u64 {
        fingerprint_of("!", &self.literal)
    }

    fn placeholder(&self) -> Option<&Literal> {
        Some(&self.literal)
    }
}
