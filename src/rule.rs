//! Rule representation and the rule registry.
//!
//! A rule is an identifier literal (its head pattern) and an ordered list
//! of executable steps. Rules may reference other rules, including ones
//! registered later and themselves, through placeholder steps. The
//! registry collects every rule first; linking is a second pass that
//! patches each placeholder into a proxy holding indices into the final
//! rule arena, so the ownership graph never contains a cycle.

use crate::aggregation::Aggregation;
use crate::context::Context;
use crate::execution::{Execution, ExecutionError};
use crate::path::Path;
use crate::proxy::ProxyRule;
use crate::term::{Literal, Term};
use crate::truth::Truth;
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use thiserror::Error;

/// Index of a rule in a linked [`RuleSet`].
pub type RuleId = usize;

/// Rule registration and linking errors.
#[derive(Debug, Clone, Error)]
pub enum RuleError {
    #[error("unknown rule `{path}` referenced by `{literal}`")]
    UnknownRule { path: Path, literal: Literal },
}

/// An agent rule: identifier and body steps.
#[derive(Clone, Debug)]
pub struct Rule {
    identifier: Literal,
    steps: Vec<Arc<dyn Execution>>,
    variables: FxHashSet<Arc<str>>,
    fingerprint: u64,
}

impl Rule {
    pub fn new(identifier: Literal, steps: Vec<Arc<dyn Execution>>) -> Self {
        let variables = identifier.variables();
        let mut hasher = FxHasher::default();
        identifier.hash(&mut hasher);
        for step in &steps {
            step.fingerprint().hash(&mut hasher);
        }
        Rule {
            identifier,
            steps,
            variables,
            fingerprint: hasher.finish(),
        }
    }

    /// A rule without steps, always true.
    pub fn fact(identifier: Literal) -> Self {
        Rule::new(identifier, Vec::new())
    }

    pub fn identifier(&self) -> &Literal {
        &self.identifier
    }

    pub fn path(&self) -> &Path {
        self.identifier.functor()
    }

    pub fn steps(&self) -> &[Arc<dyn Execution>] {
        &self.steps
    }

    /// Variables of the identifier.
    pub fn variables(&self) -> &FxHashSet<Arc<str>> {
        &self.variables
    }

    /// Rules referenced by not yet linked placeholder steps.
    pub fn placeholders(&self) -> impl Iterator<Item = &Literal> {
        self.steps.iter().filter_map(|step| step.placeholder())
    }

    /// Same rule with the steps replaced; the fingerprint is kept.
    fn relink(&self, steps: Vec<Arc<dyn Execution>>) -> Rule {
        Rule {
            identifier: self.identifier.clone(),
            steps,
            variables: self.variables.clone(),
            fingerprint: self.fingerprint,
        }
    }
}

impl Execution for Rule {
    /// Run the steps in order, and-combining their truths; stops at the
    /// first false step.
    fn execute(
        &self,
        context: &mut Context,
        parallel: bool,
        _arguments: &[Term],
        results: &mut Vec<Term>,
        _annotations: &[Term],
    ) -> Result<Truth, ExecutionError> {
        let mut truth = Truth::TRUE;
        for step in &self.steps {
            truth = truth * step.execute(context, parallel, &[], results, &[])?;
            if !truth.is_true() {
                break;
            }
        }
        Ok(truth)
    }

    fn score(&self, scorer: &mut Scorer<'_>) -> f64 {
        scorer.score_steps(&self.steps)
    }

    fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier)?;
        if !self.steps.is_empty() {
            write!(f, " <- {} steps", self.steps.len())?;
        }
        Ok(())
    }
}

/// First pass: collects rules grouped by identifier path.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
    by_path: FxHashMap<Path, Vec<RuleId>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        RuleRegistry::default()
    }

    /// Add a rule. Several rules may share a path.
    pub fn register(&mut self, rule: Rule) -> RuleId {
        let id = self.rules.len();
        self.by_path.entry(rule.path().clone()).or_default().push(id);
        self.rules.push(rule);
        id
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Second pass: resolve every placeholder against the complete registry.
    pub fn link(self) -> Result<RuleSet, RuleError> {
        let mut linked = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let steps = rule
                .steps
                .iter()
                .map(|step| match step.placeholder() {
                    Some(literal) => {
                        let proxy = proxy_for(&self.by_path, literal)?;
                        Ok(Arc::new(proxy) as Arc<dyn Execution>)
                    }
                    None => Ok(step.clone()),
                })
                .collect::<Result<Vec<_>, RuleError>>()?;
            linked.push(rule.relink(steps));
        }
        tracing::debug!(rules = linked.len(), paths = self.by_path.len(), "rules linked");
        Ok(RuleSet {
            rules: linked,
            by_path: self.by_path,
        })
    }
}

fn proxy_for(
    by_path: &FxHashMap<Path, Vec<RuleId>>,
    literal: &Literal,
) -> Result<ProxyRule, RuleError> {
    match by_path.get(literal.functor()) {
        Some(ids) => Ok(ProxyRule::new(literal.clone(), ids.clone())),
        None => Err(RuleError::UnknownRule {
            path: literal.functor().clone(),
            literal: literal.clone(),
        }),
    }
}

/// Linked, immutable rule arena.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    by_path: FxHashMap<Path, Vec<RuleId>>,
}

impl RuleSet {
    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id)
    }

    /// Rules registered under `path`, in registration order.
    pub fn candidates(&self, path: &Path) -> &[RuleId] {
        self.by_path.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Proxy for a call to `literal`, for calls made outside a rule body.
    pub fn proxy(&self, literal: &Literal) -> Result<ProxyRule, RuleError> {
        proxy_for(&self.by_path, literal)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }
}

/// Scores rules by aggregating the scores of their steps.
///
/// Rules currently being scored are tracked, a rule reached again through
/// its own candidates contributes nothing.
pub struct Scorer<'a> {
    rules: &'a RuleSet,
    aggregation: &'a dyn Aggregation,
    active: FxHashSet<RuleId>,
}

impl<'a> Scorer<'a> {
    pub fn new(rules: &'a RuleSet, aggregation: &'a dyn Aggregation) -> Self {
        Scorer {
            rules,
            aggregation,
            active: FxHashSet::default(),
        }
    }

    /// Score one rule; zero for unknown ids and rules already on the stack.
    pub fn score_rule(&mut self, id: RuleId) -> f64 {
        let rules = self.rules;
        let rule = match rules.get(id) {
            Some(rule) => rule,
            None => return 0.0,
        };
        if !self.active.insert(id) {
            return 0.0;
        }
        let score = rule.score(self);
        self.active.remove(&id);
        score
    }

    /// Aggregate the scores of candidate rules not already being scored.
    pub fn score_candidates(&mut self, ids: &[RuleId]) -> f64 {
        let mut scores = Vec::with_capacity(ids.len());
        for &id in ids {
            if !self.active.contains(&id) {
                scores.push(self.score_rule(id));
            }
        }
        self.aggregation.evaluate(&scores)
    }

    pub fn score_steps(&mut self, steps: &[Arc<dyn Execution>]) -> f64 {
        let scores: Vec<f64> = steps.iter().map(|step| step.score(self)).collect();
        self.aggregation.evaluate(&scores)
    }
}
