//! Proxy rules: calls from a rule body to the rules of a path.
//!
//! A proxy resolves the call-site literal against the caller's context,
//! keeps the candidate rules whose identifier matches it structurally and
//! runs them according to the agent's [`ProxyPolicy`]. Each candidate runs
//! in a fresh context with a private result sink; a sink only reaches the
//! caller once its candidate has finished.

use crate::agent::Agent;
use crate::context::Context;
use crate::execution::{fingerprint_of, Execution, ExecutionError};
use crate::rule::{Rule, RuleId, Scorer};
use crate::term::{Literal, Term};
use crate::truth::Truth;
use crate::unify::{match_head, HeadMatch};
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use std::cmp::Reverse;
use std::sync::Arc;

/// Completion policy when several rules match a call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProxyPolicy {
    /// Candidates in registration order, the first true one wins.
    #[default]
    FirstMatch,
    /// Candidates ranked by descending score, then first match.
    BestScore,
    /// Every candidate runs; truths are or-combined and sinks concatenated.
    AggregateAll,
}

/// Linked call to the rules registered under one path.
#[derive(Clone, Debug)]
pub struct ProxyRule {
    literal: Literal,
    candidates: Vec<RuleId>,
}

struct Candidate<'a> {
    id: RuleId,
    rule: &'a Rule,
    head: HeadMatch,
}

struct Outcome {
    truth: Truth,
    results: Vec<Term>,
    exports: Vec<(Arc<str>, Term)>,
}

impl ProxyRule {
    pub fn new(literal: Literal, candidates: Vec<RuleId>) -> Self {
        ProxyRule {
            literal,
            candidates,
        }
    }

    pub fn literal(&self) -> &Literal {
        &self.literal
    }

    pub fn candidates(&self) -> &[RuleId] {
        &self.candidates
    }

    /// Try candidates in order until one succeeds.
    fn first_match(
        &self,
        context: &mut Context,
        agent: &Arc<Agent>,
        candidates: &[Candidate<'_>],
        parallel: bool,
        results: &mut Vec<Term>,
    ) -> Result<Truth, ExecutionError> {
        for candidate in candidates {
            let outcome = run(agent, candidate, parallel)?;
            if outcome.truth.is_true() {
                results.extend(outcome.results);
                context.commit(&outcome.exports);
                return Ok(outcome.truth);
            }
        }
        Ok(Truth::FALSE)
    }

    fn aggregate_all(
        &self,
        context: &mut Context,
        agent: &Arc<Agent>,
        candidates: &[Candidate<'_>],
        parallel: bool,
        results: &mut Vec<Term>,
    ) -> Result<Truth, ExecutionError> {
        let outcomes: Vec<Outcome> = if self.literal.is_ordered() {
            candidates
                .iter()
                .map(|c| run(agent, c, parallel))
                .collect::<Result<_, _>>()?
        } else {
            candidates
                .par_iter()
                .map(|c| run(agent, c, parallel))
                .collect::<Result<_, _>>()?
        };

        let mut truth = Truth::FALSE;
        let mut exported = false;
        for outcome in outcomes {
            if outcome.truth.is_true() {
                results.extend(outcome.results);
                if !exported {
                    context.commit(&outcome.exports);
                    exported = true;
                }
            }
            truth = truth + outcome.truth;
        }
        Ok(truth)
    }
}

/// Run one candidate in a fresh context seeded from its head bindings.
fn run(agent: &Arc<Agent>, candidate: &Candidate<'_>, parallel: bool) -> Result<Outcome, ExecutionError> {
    let mut context = Context::with_variables(
        agent.clone(),
        candidate.rule.variables().iter().cloned(),
    );
    context.commit(&candidate.head.bindings);

    let mut results = Vec::new();
    let truth = candidate
        .rule
        .execute(&mut context, parallel, &[], &mut results, &[])?;
    agent.stats().record_rule();
    tracing::trace!(rule = %candidate.rule, %truth, "candidate finished");

    let exports = candidate
        .head
        .exports
        .iter()
        .filter_map(|(name, term)| match context.resolve(term) {
            Term::Variable(_) => None,
            value => Some((name.clone(), value)),
        })
        .collect();
    Ok(Outcome {
        truth,
        results,
        exports,
    })
}

impl Execution for ProxyRule {
    fn execute(
        &self,
        context: &mut Context,
        parallel: bool,
        _arguments: &[Term],
        results: &mut Vec<Term>,
        _annotations: &[Term],
    ) -> Result<Truth, ExecutionError> {
        let agent = context.agent().clone();
        let call = context.instantiate(&self.literal);
        let rules = agent.rules();

        let head_of = |id: &RuleId| {
            let rule = rules.get(*id)?;
            let head = match_head(rule.identifier(), &call)?;
            Some(Candidate { id: *id, rule, head })
        };
        let mut candidates: Vec<Candidate<'_>> = if self.literal.is_ordered() {
            self.candidates.iter().filter_map(&head_of).collect()
        } else {
            self.candidates.par_iter().filter_map(&head_of).collect()
        };

        let policy = agent.config().proxy_policy;
        tracing::debug!(%call, candidates = candidates.len(), ?policy, "proxy call");

        match policy {
            ProxyPolicy::FirstMatch => {
                self.first_match(context, &agent, &candidates, parallel, results)
            }
            ProxyPolicy::BestScore => {
                candidates.sort_by_cached_key(|c| Reverse(OrderedFloat(agent.score(c.id))));
                self.first_match(context, &agent, &candidates, parallel, results)
            }
            ProxyPolicy::AggregateAll => {
                self.aggregate_all(context, &agent, &candidates, parallel, results)
            }
        }
    }

    fn score(&self, scorer: &mut Scorer<'_>) -> f64 {
        scorer.score_candidates(&self.candidates)
    }

    fn fingerprint(&self) -> u64 {
        fingerprint_of("proxy", &(&self.literal, &self.candidates))
    }
}
