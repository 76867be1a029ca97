//! Unification of goal literals against the belief base.
//!
//! Candidates are looked up by sign and functor path and pruned by hash
//! before any positional work is done. Three tiers are tried in order,
//! the first tier producing a binding set wins. Sets are non-empty except
//! for ground goals, which match on equal values and bind nothing:
//!
//! 1. exact: value hash and annotation hash equal
//! 2. value-exact: value hash equal, annotations compared fuzzily
//! 3. any: no hash precondition, everything compared fuzzily
//!
//! The fuzzy comparator yields no bindings, so in practice only the first
//! two tiers can produce a winner.

use crate::context::Context;
use crate::execution::{Execution, ExecutionError};
use crate::term::{descend, Literal, Term, Value};
use crate::truth::Truth;
use rayon::prelude::*;
use std::sync::Arc;

/// Variables bound by one successful match, in pairing order.
pub type Bindings = Vec<(Arc<str>, Term)>;

/// Matching tier that produced a binding set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    Exact,
    ValueExact,
    Any,
}

/// Three-tier unifier.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unifier;

impl Unifier {
    pub fn new() -> Self {
        Unifier
    }

    /// Find one binding set for `goal` and commit it into `context`.
    ///
    /// Without a guard the first binding set is committed. With a guard,
    /// each binding set is applied to a duplicate of the context and the
    /// guard evaluated there; the first accepted set is committed into the
    /// original. Returns false, leaving `context` untouched, when nothing
    /// matches or every candidate is rejected.
    pub fn unify(
        &self,
        context: &mut Context,
        goal: &Literal,
        guard: Option<&dyn Execution>,
        parallel: bool,
    ) -> Result<Truth, ExecutionError> {
        let agent = context.agent().clone();
        let goal = context.instantiate(goal);

        let (tier, candidates) = self.candidates(context, &goal, parallel);
        tracing::debug!(goal = %goal, ?tier, candidates = candidates.len(), "unify");
        let winner = select(context, candidates, guard, parallel)?;

        agent.stats().record_unify(winner.is_some());
        match winner {
            Some(bindings) => {
                context.commit(&bindings);
                Ok(Truth::TRUE)
            }
            None => Ok(Truth::FALSE),
        }
    }

    /// All binding sets of the first productive tier.
    ///
    /// A ground goal has nothing to bind: a fact counts as a match in the
    /// exact and value-exact tiers when its leaf values equal the goal's,
    /// and yields an empty binding set.
    pub fn candidates(
        &self,
        context: &Context,
        goal: &Literal,
        parallel: bool,
    ) -> (Option<Tier>, Vec<Bindings>) {
        let ground = goal.is_ground();
        let goal_annotations = goal.annotation_terms();
        let tiers: [(Tier, &(dyn Fn(&Literal) -> Option<Bindings> + Sync)); 3] = [
            (Tier::Exact, &|fact: &Literal| {
                if !goal.matches_exact(fact) || (ground && !same_values(goal, fact)) {
                    return None;
                }
                let mut bindings = pair_exact(goal.descend_values(), fact.descend_values());
                let fact_annotations = fact.annotation_terms();
                extend(
                    &mut bindings,
                    pair_exact(descend(&goal_annotations), descend(&fact_annotations)),
                );
                if ground {
                    Some(bindings)
                } else {
                    non_empty(bindings)
                }
            }),
            (Tier::ValueExact, &|fact: &Literal| {
                if !goal.matches_value(fact) || (ground && !same_values(goal, fact)) {
                    return None;
                }
                let mut bindings = pair_exact(goal.descend_values(), fact.descend_values());
                extend(
                    &mut bindings,
                    pair_fuzzy(goal.annotations(), fact.annotations()),
                );
                if ground {
                    Some(bindings)
                } else {
                    non_empty(bindings)
                }
            }),
            (Tier::Any, &|fact: &Literal| {
                let mut bindings = pair_fuzzy(goal.values(), fact.values());
                extend(
                    &mut bindings,
                    pair_fuzzy(goal.annotations(), fact.annotations()),
                );
                non_empty(bindings)
            }),
        ];

        let beliefs = context.agent().beliefbase();
        for (tier, matcher) in tiers {
            let found: Vec<Bindings> = if parallel {
                beliefs
                    .par_query(goal.is_negated(), goal.functor())
                    .filter_map(|fact| matcher(fact.as_ref()))
                    .collect()
            } else {
                beliefs
                    .query(goal.is_negated(), goal.functor())
                    .filter_map(|fact| matcher(fact.as_ref()))
                    .collect()
            };
            if !found.is_empty() {
                return (Some(tier), found);
            }
        }
        (None, Vec::new())
    }
}

/// Pick the winning binding set.
fn select(
    context: &Context,
    candidates: Vec<Bindings>,
    guard: Option<&dyn Execution>,
    parallel: bool,
) -> Result<Option<Bindings>, ExecutionError> {
    let guard = match guard {
        None => return Ok(candidates.into_iter().next()),
        Some(guard) => guard,
    };

    if parallel {
        return candidates
            .into_par_iter()
            .find_map_any(|bindings| match accepts(context, &bindings, guard) {
                Ok(true) => Some(Ok(bindings)),
                Ok(false) => None,
                Err(e) => Some(Err(e)),
            })
            .transpose();
    }

    for bindings in candidates {
        if accepts(context, &bindings, guard)? {
            return Ok(Some(bindings));
        }
    }
    Ok(None)
}

/// Evaluate `guard` on a duplicate of `context` with `bindings` applied.
/// Accepted iff the guard yields exactly one result which is boolean true.
fn accepts(
    context: &Context,
    bindings: &Bindings,
    guard: &dyn Execution,
) -> Result<bool, ExecutionError> {
    let mut trial = context.duplicate();
    trial.commit(bindings);
    let mut results = Vec::new();
    guard.execute(&mut trial, false, &[], &mut results, &[])?;
    Ok(results.len() == 1 && results[0].raw().and_then(Value::as_bool) == Some(true))
}

/// Positional pairing; a goal-side variable binds to the fact-side term.
/// Other positions are not compared. An unbound fact-side variable carries
/// no value and binds nothing.
fn pair_exact<'a>(
    target: impl Iterator<Item = &'a Term>,
    source: impl Iterator<Item = &'a Term>,
) -> Bindings {
    let mut bindings = Bindings::new();
    for (t, s) in target.zip(source) {
        if let Term::Variable(v) = t {
            let free = matches!(s, Term::Variable(sv) if !sv.is_allocated());
            if !v.is_allocated() && !free {
                push(&mut bindings, v.name().clone(), s.clone());
            }
        }
    }
    bindings
}

/// Leaf-wise equality of the flattened values, raw values compared
/// through bound variables.
fn same_values(goal: &Literal, fact: &Literal) -> bool {
    let mut goal_leaves = goal.descend_values();
    let mut fact_leaves = fact.descend_values();
    loop {
        match (goal_leaves.next(), fact_leaves.next()) {
            (None, None) => return true,
            (Some(g), Some(f)) => {
                let equal = match (g.raw(), f.raw()) {
                    (Some(a), Some(b)) => a == b,
                    _ => g == f,
                };
                if !equal {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

/// Approximate pairing, not implemented: never binds anything.
fn pair_fuzzy<T>(_target: &[T], _source: &[T]) -> Bindings {
    Bindings::new()
}

fn push(bindings: &mut Bindings, name: Arc<str>, value: Term) {
    if !bindings.iter().any(|(n, _)| *n == name) {
        bindings.push((name, value));
    }
}

fn extend(bindings: &mut Bindings, more: Bindings) {
    for (name, value) in more {
        push(bindings, name, value);
    }
}

fn non_empty(bindings: Bindings) -> Option<Bindings> {
    if bindings.is_empty() {
        None
    } else {
        Some(bindings)
    }
}

/// Result of matching a rule head against a call-site literal.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HeadMatch {
    /// Rule variables bound from the call site.
    pub bindings: Bindings,
    /// Caller variables to fill after the rule ran, with the rule-side
    /// term that supplies their value.
    pub exports: Vec<(Arc<str>, Term)>,
}

/// Match a rule identifier `pattern` against a resolved call literal.
///
/// Requires equal functor, sign and value hash. Positions are paired over
/// the flattened values: raw values on both sides must be equal, a
/// pattern variable binds to the call-side term, and an unbound call-side
/// variable is exported back to the caller.
pub fn match_head(pattern: &Literal, call: &Literal) -> Option<HeadMatch> {
    if pattern.functor() != call.functor()
        || pattern.is_negated() != call.is_negated()
        || !pattern.matches_value(call)
    {
        return None;
    }

    let mut head = HeadMatch::default();
    for (p, c) in pattern.descend_values().zip(call.descend_values()) {
        match (p, c) {
            (Term::Variable(pv), Term::Variable(cv)) if !cv.is_allocated() => {
                head.exports.push((cv.name().clone(), Term::Variable(pv.clone())));
            }
            (Term::Variable(pv), _) if !pv.is_allocated() => {
                match head.bindings.iter().find(|(n, _)| n == pv.name()) {
                    Some((_, existing)) if existing != c => return None,
                    Some(_) => {}
                    None => head.bindings.push((pv.name().clone(), c.clone())),
                }
            }
            (_, Term::Variable(cv)) if !cv.is_allocated() => {
                head.exports.push((cv.name().clone(), p.clone()));
            }
            (Term::Value(a), Term::Value(b)) if a != b => return None,
            _ => {}
        }
    }
    Some(head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentBuilder;
    use crate::expression::Expression;

    fn point(x: i64, y: i64) -> Literal {
        Literal::new("point", vec![Term::int(x), Term::int(y)])
    }

    fn goal() -> Literal {
        Literal::new("point", vec![Term::var("X"), Term::var("Y")])
    }

    fn context_with(facts: Vec<Literal>) -> Context {
        let agent = AgentBuilder::new().beliefs(facts).build().unwrap();
        agent.context()
    }

    #[test]
    fn test_exact_tier_first_match() {
        let mut ctx = context_with(vec![point(1, 2), point(3, 4)]);
        let truth = Unifier.unify(&mut ctx, &goal(), None, false).unwrap();
        assert!(truth.is_true());
        assert_eq!(ctx.value("X"), Some(&Term::int(1)));
        assert_eq!(ctx.value("Y"), Some(&Term::int(2)));
    }

    #[test]
    fn test_deterministic_sequential() {
        let ctx = context_with(vec![point(1, 2), point(3, 4), point(5, 6)]);
        let first = {
            let mut c = ctx.duplicate();
            Unifier.unify(&mut c, &goal(), None, false).unwrap();
            c.snapshot()
        };
        for _ in 0..10 {
            let mut c = ctx.duplicate();
            Unifier.unify(&mut c, &goal(), None, false).unwrap();
            assert_eq!(c.snapshot(), first);
        }
    }

    #[test]
    fn test_hash_bucket_contract() {
        let a = Literal::new(
            "info",
            vec![Term::literal(Literal::new("name", vec![Term::string("a")])), Term::int(1)],
        );
        let b = Literal::new(
            "info",
            vec![Term::literal(Literal::new("name", vec![Term::string("b")])), Term::int(2)],
        );
        assert!(a.matches_exact(&b));

        let ctx = context_with(vec![a, b]);
        let pattern = Literal::new(
            "info",
            vec![Term::literal(Literal::new("name", vec![Term::var("N")])), Term::var("V")],
        );
        let (tier, sets) = Unifier.candidates(&ctx, &pattern, false);
        assert_eq!(tier, Some(Tier::Exact));
        assert_eq!(sets.len(), 2);
        assert_eq!(
            sets[0],
            vec![(Arc::from("N"), Term::string("a")), (Arc::from("V"), Term::int(1))]
        );
        assert_eq!(
            sets[1],
            vec![(Arc::from("N"), Term::string("b")), (Arc::from("V"), Term::int(2))]
        );
    }

    #[test]
    fn test_guard_selects_later_candidate() {
        let mut ctx = context_with(vec![point(1, 2), point(3, 4)]);
        let guard = Expression::binary(">", Expression::var("X"), Expression::constant(2)).unwrap();
        let truth = Unifier.unify(&mut ctx, &goal(), Some(&guard), false).unwrap();
        assert!(truth.is_true());
        assert_eq!(ctx.value("X"), Some(&Term::int(3)));
        assert_eq!(ctx.value("Y"), Some(&Term::int(4)));
    }

    #[test]
    fn test_guard_rejection_leaves_context_untouched() {
        let mut ctx = context_with(vec![point(1, 2), point(3, 4)]);
        ctx.bind("Z", Term::int(9));
        let before = ctx.snapshot();
        let guard = Expression::binary(">", Expression::var("X"), Expression::constant(100)).unwrap();
        let truth = Unifier.unify(&mut ctx, &goal(), Some(&guard), false).unwrap();
        assert!(!truth.is_true());
        assert_eq!(ctx.snapshot(), before);
    }

    #[test]
    fn test_guard_with_non_boolean_result_rejects() {
        let mut ctx = context_with(vec![point(1, 2)]);
        let guard = Expression::binary("+", Expression::var("X"), Expression::constant(1)).unwrap();
        let truth = Unifier.unify(&mut ctx, &goal(), Some(&guard), false).unwrap();
        assert!(!truth.is_true());
        assert!(!ctx.is_allocated("X"));
    }

    #[test]
    fn test_guard_fault_propagates() {
        let mut ctx = context_with(vec![point(1, 2)]);
        let guard = Expression::binary(">", Expression::var("Q"), Expression::constant(1)).unwrap();
        let result = Unifier.unify(&mut ctx, &goal(), Some(&guard), false);
        assert!(matches!(result, Err(ExecutionError::Unallocated { .. })));
    }

    #[test]
    fn test_parallel_mode_finds_valid_match() {
        let facts: Vec<_> = (0..50).map(|i| point(i, i * 10)).collect();
        let mut ctx = context_with(facts);
        let guard = Expression::binary(">=", Expression::var("X"), Expression::constant(40)).unwrap();
        let truth = Unifier.unify(&mut ctx, &goal(), Some(&guard), true).unwrap();
        assert!(truth.is_true());
        let x = match ctx.value("X").and_then(Term::raw) {
            Some(Value::Int(n)) => *n,
            other => panic!("unexpected binding {:?}", other),
        };
        assert!(x >= 40);
        assert_eq!(ctx.value("Y"), Some(&Term::int(x * 10)));
    }

    #[test]
    fn test_value_exact_tier_ignores_annotations() {
        let fact = point(1, 2).with_annotations(vec![Literal::new("source", vec![Term::string("self")])]);
        let ctx = context_with(vec![fact]);
        let (tier, sets) = Unifier.candidates(&ctx, &goal(), false);
        assert_eq!(tier, Some(Tier::ValueExact));
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].len(), 2);
    }

    #[test]
    fn test_exact_tier_binds_annotation_variables() {
        let fact = point(1, 2).with_annotations(vec![Literal::new("source", vec![Term::string("self")])]);
        let mut ctx = context_with(vec![fact]);
        let pattern = goal().with_annotations(vec![Literal::new("source", vec![Term::var("S")])]);
        assert!(Unifier.unify(&mut ctx, &pattern, None, false).unwrap().is_true());
        assert_eq!(ctx.value("S"), Some(&Term::string("self")));
    }

    #[test]
    fn test_fuzzy_tier_yields_nothing() {
        let ctx = context_with(vec![Literal::new("point", vec![Term::int(1)])]);
        let (tier, sets) = Unifier.candidates(&ctx, &goal(), false);
        assert_eq!(tier, None);
        assert!(sets.is_empty());
    }

    #[test]
    fn test_sign_partitions() {
        let mut ctx = context_with(vec![point(1, 2).negated(true)]);
        assert!(!Unifier.unify(&mut ctx, &goal(), None, false).unwrap().is_true());
        let negated = goal().negated(true);
        assert!(Unifier.unify(&mut ctx, &negated, None, false).unwrap().is_true());
        assert_eq!(ctx.value("X"), Some(&Term::int(1)));
    }

    #[test]
    fn test_ground_goal_compares_values() {
        let mut ctx = context_with(vec![point(1, 2)]);
        assert!(Unifier.unify(&mut ctx, &point(1, 2), None, false).unwrap().is_true());
        assert!(!Unifier.unify(&mut ctx, &point(5, 5), None, false).unwrap().is_true());
        assert!(!Unifier.unify(&mut ctx, &point(2, 1), None, false).unwrap().is_true());
        assert!(ctx.is_empty());

        let (tier, sets) = Unifier.candidates(&ctx, &point(1, 2), false);
        assert_eq!(tier, Some(Tier::Exact));
        assert_eq!(sets, vec![Bindings::new()]);
    }

    #[test]
    fn test_ground_goal_ignores_fact_annotations() {
        let fact = point(1, 2).with_annotations(vec![Literal::new("source", vec![Term::string("self")])]);
        let mut ctx = context_with(vec![fact]);

        let (tier, sets) = Unifier.candidates(&ctx, &point(1, 2), false);
        assert_eq!(tier, Some(Tier::ValueExact));
        assert_eq!(sets.len(), 1);
        assert!(Unifier.unify(&mut ctx, &point(1, 2), None, false).unwrap().is_true());

        let partial = Literal::new("point", vec![Term::var("X"), Term::int(2)]);
        assert!(Unifier.unify(&mut ctx, &partial, None, false).unwrap().is_true());
        assert_eq!(ctx.value("X"), Some(&Term::int(1)));

        assert!(!Unifier.unify(&mut ctx.duplicate(), &point(5, 5), None, false).unwrap().is_true());
    }

    #[test]
    fn test_ground_goal_with_guard() {
        let mut ctx = context_with(vec![point(1, 2)]);
        ctx.bind("L", Term::int(3));
        let pass = Expression::binary(">", Expression::var("L"), Expression::constant(2)).unwrap();
        let fail = Expression::binary(">", Expression::var("L"), Expression::constant(5)).unwrap();
        assert!(Unifier.unify(&mut ctx, &point(1, 2), Some(&pass), false).unwrap().is_true());
        assert!(!Unifier.unify(&mut ctx, &point(1, 2), Some(&fail), true).unwrap().is_true());
    }

    #[test]
    fn test_unbound_fact_variables_bind_nothing() {
        let fact = Literal::new("pair", vec![Term::var("Y"), Term::var("X")]);
        let mut ctx = context_with(vec![fact]);
        let goal = Literal::new("pair", vec![Term::var("X"), Term::var("Y")]);

        let (tier, sets) = Unifier.candidates(&ctx, &goal, false);
        assert_eq!(tier, None);
        assert!(sets.is_empty());
        assert!(!Unifier.unify(&mut ctx, &goal, None, false).unwrap().is_true());
        assert!(!ctx.is_allocated("X"));
        assert!(!ctx.is_allocated("Y"));

        // a partly bound fact still binds the positions that carry a value
        let mixed = Literal::new("pair", vec![Term::var("A"), Term::int(4)]);
        let mut ctx = context_with(vec![mixed]);
        assert!(Unifier.unify(&mut ctx, &goal, None, false).unwrap().is_true());
        assert!(!ctx.is_allocated("X"));
        assert_eq!(ctx.value("Y"), Some(&Term::int(4)));
    }

    #[test]
    fn test_exact_pairing_only_binds_variables() {
        let mut ctx = context_with(vec![point(1, 2)]);
        ctx.bind("X", Term::int(7));
        assert!(Unifier.unify(&mut ctx, &goal(), None, false).unwrap().is_true());
        assert_eq!(ctx.value("X"), Some(&Term::int(7)));
        assert_eq!(ctx.value("Y"), Some(&Term::int(2)));
    }

    #[test]
    fn test_match_head() {
        let pattern = Literal::new("foo", vec![Term::var("N"), Term::int(1)]);
        let call = Literal::new("foo", vec![Term::int(5), Term::var("R")]);
        let head = match_head(&pattern, &call).unwrap();
        assert_eq!(head.bindings, vec![(Arc::from("N"), Term::int(5))]);
        assert_eq!(head.exports, vec![(Arc::from("R"), Term::int(1))]);

        let mismatch = Literal::new("foo", vec![Term::int(5), Term::int(2)]);
        assert!(match_head(&pattern, &mismatch).is_none());

        let other_arity = Literal::new("foo", vec![Term::int(5)]);
        assert!(match_head(&pattern, &other_arity).is_none());

        let repeated = Literal::new("eq", vec![Term::var("A"), Term::var("A")]);
        assert!(match_head(&repeated, &Literal::new("eq", vec![Term::int(1), Term::int(1)])).is_some());
        assert!(match_head(&repeated, &Literal::new("eq", vec![Term::int(1), Term::int(2)])).is_none());
    }
}
