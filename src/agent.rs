//! The agent: belief base, linked rules and matching configuration.

use crate::aggregation::{Aggregation, Sum};
use crate::beliefbase::BeliefBase;
use crate::context::Context;
use crate::execution::{Execution, ExecutionError};
use crate::path::Path;
use crate::proxy::ProxyPolicy;
use crate::rule::{Rule, RuleError, RuleId, RuleRegistry, RuleSet, Scorer};
use crate::term::{Literal, Term};
use crate::truth::Truth;
use crate::unify::Unifier;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Configuration for an agent.
#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    /// Fan out candidate matching over the rayon pool.
    pub parallel: bool,
    /// Completion policy for rule calls.
    pub proxy_policy: ProxyPolicy,
}

/// Counters about matching and execution.
#[derive(Debug, Default)]
pub struct AgentStats {
    unify_attempts: AtomicUsize,
    unify_successes: AtomicUsize,
    rule_executions: AtomicUsize,
}

impl AgentStats {
    pub fn unify_attempts(&self) -> usize {
        self.unify_attempts.load(Ordering::Relaxed)
    }

    pub fn unify_successes(&self) -> usize {
        self.unify_successes.load(Ordering::Relaxed)
    }

    pub fn rule_executions(&self) -> usize {
        self.rule_executions.load(Ordering::Relaxed)
    }

    pub(crate) fn record_unify(&self, success: bool) {
        self.unify_attempts.fetch_add(1, Ordering::Relaxed);
        if success {
            self.unify_successes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_rule(&self) {
        self.rule_executions.fetch_add(1, Ordering::Relaxed);
    }
}

/// A BDI agent core.
#[derive(Debug)]
pub struct Agent {
    beliefbase: BeliefBase,
    rules: RuleSet,
    unifier: Unifier,
    aggregation: Arc<dyn Aggregation>,
    config: AgentConfig,
    stats: AgentStats,
}

impl Agent {
    pub fn beliefbase(&self) -> &BeliefBase {
        &self.beliefbase
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn aggregation(&self) -> &dyn Aggregation {
        self.aggregation.as_ref()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn stats(&self) -> &AgentStats {
        &self.stats
    }

    /// Fresh empty context bound to this agent.
    pub fn context(self: &Arc<Self>) -> Context {
        Context::new(self.clone())
    }

    pub fn add(&self, literal: Literal) -> bool {
        self.beliefbase.add(literal)
    }

    pub fn remove(&self, literal: &Literal) -> bool {
        self.beliefbase.remove(literal)
    }

    /// Facts with the given sign under `path`, in insertion order.
    pub fn query(&self, negated: bool, path: &Path) -> impl Iterator<Item = Arc<Literal>> {
        self.beliefbase.query(negated, path)
    }

    /// Unify `goal` against the belief base, committing into `context`.
    pub fn unify(
        &self,
        context: &mut Context,
        goal: &Literal,
        guard: Option<&dyn Execution>,
    ) -> Result<Truth, ExecutionError> {
        self.unifier
            .unify(context, goal, guard, self.config.parallel)
    }

    /// Call the rules matching `literal`, as a rule body would.
    pub fn call(
        &self,
        context: &mut Context,
        literal: &Literal,
        results: &mut Vec<Term>,
    ) -> Result<Truth, ExecutionError> {
        let proxy = self.rules.proxy(literal)?;
        proxy.execute(context, self.config.parallel, &[], results, &[])
    }

    /// Score of one rule under the agent's aggregation.
    pub fn score(&self, id: RuleId) -> f64 {
        Scorer::new(&self.rules, self.aggregation.as_ref()).score_rule(id)
    }
}

/// Builder for agents.
#[derive(Debug)]
pub struct AgentBuilder {
    rules: RuleRegistry,
    beliefs: Vec<Literal>,
    aggregation: Arc<dyn Aggregation>,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        AgentBuilder {
            rules: RuleRegistry::new(),
            beliefs: Vec::new(),
            aggregation: Arc::new(Sum),
            config: AgentConfig::default(),
        }
    }

    pub fn rules(mut self, rules: RuleRegistry) -> Self {
        self.rules = rules;
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.register(rule);
        self
    }

    pub fn belief(mut self, literal: Literal) -> Self {
        self.beliefs.push(literal);
        self
    }

    pub fn beliefs(mut self, literals: impl IntoIterator<Item = Literal>) -> Self {
        self.beliefs.extend(literals);
        self
    }

    pub fn aggregation(mut self, aggregation: impl Aggregation + 'static) -> Self {
        self.aggregation = Arc::new(aggregation);
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    pub fn proxy_policy(mut self, policy: ProxyPolicy) -> Self {
        self.config.proxy_policy = policy;
        self
    }

    /// Link the rules and seed the belief base.
    pub fn build(self) -> Result<Arc<Agent>, RuleError> {
        let rules = self.rules.link()?;
        let beliefbase = BeliefBase::new();
        for literal in self.beliefs {
            beliefbase.add(literal);
        }
        tracing::debug!(
            rules = rules.len(),
            beliefs = beliefbase.size(),
            parallel = self.config.parallel,
            "agent built"
        );
        Ok(Arc::new(Agent {
            beliefbase,
            rules,
            unifier: Unifier::new(),
            aggregation: self.aggregation,
            config: self.config,
            stats: AgentStats::default(),
        }))
    }
}
