//! Execution contexts.
//!
//! A context is the per-call frame of variable bindings. Bindings are kept
//! by variable name, separate from the shared literal templates, so any
//! number of executions can run against the same rule tree at once.

use crate::agent::Agent;
use crate::term::{Literal, Term, Variable};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// A mutable frame of named variable slots owned by one execution attempt.
#[derive(Clone)]
pub struct Context {
    agent: Arc<Agent>,
    variables: FxHashMap<Arc<str>, Variable>,
}

impl Context {
    /// Create an empty context for `agent`.
    pub fn new(agent: Arc<Agent>) -> Self {
        Context {
            agent,
            variables: FxHashMap::default(),
        }
    }

    /// Create a context with the given variables declared unbound.
    pub fn with_variables<I>(agent: Arc<Agent>, names: I) -> Self
    where
        I: IntoIterator<Item = Arc<str>>,
    {
        let mut context = Context::new(agent);
        context.declare(names);
        context
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    /// Independent copy for speculative evaluation.
    pub fn duplicate(&self) -> Context {
        self.clone()
    }

    /// Declare unbound slots; already declared slots keep their value.
    pub fn declare<I>(&mut self, names: I)
    where
        I: IntoIterator<Item = Arc<str>>,
    {
        for name in names {
            self.variables
                .entry(name.clone())
                .or_insert_with(|| Variable::new(name));
        }
    }

    /// Bind a slot by name, creating it when absent.
    pub fn bind(&mut self, name: impl Into<Arc<str>>, value: Term) {
        let name = name.into();
        self.variables
            .insert(name.clone(), Variable::bound(name, value));
    }

    /// Bind every pair of a binding set.
    pub fn commit<'a, I>(&mut self, bindings: I)
    where
        I: IntoIterator<Item = &'a (Arc<str>, Term)>,
    {
        for (name, value) in bindings {
            self.bind(name.clone(), value.clone());
        }
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// Bound value of a slot.
    pub fn value(&self, name: &str) -> Option<&Term> {
        self.variables.get(name).and_then(Variable::value)
    }

    pub fn is_allocated(&self, name: &str) -> bool {
        self.value(name).is_some()
    }

    /// Number of declared slots.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Iterate over all slots.
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    /// Resolve a term against this context: allocated variables are
    /// replaced by their values, literals are resolved recursively.
    ///
    /// A chain of bindings that leads back to a variable already being
    /// resolved stops there and yields that variable unresolved.
    pub fn resolve(&self, term: &Term) -> Term {
        self.resolve_from(term, &mut Vec::new())
    }

    /// Copy of `literal` with every allocated variable replaced.
    pub fn instantiate(&self, literal: &Literal) -> Literal {
        self.instantiate_from(literal, &mut Vec::new())
    }

    fn resolve_from(&self, term: &Term, active: &mut Vec<Arc<str>>) -> Term {
        match term {
            Term::Variable(v) => {
                if active.contains(v.name()) {
                    return Term::var(v.name().clone());
                }
                match self.value(v.name()).or_else(|| v.value()) {
                    Some(bound) => {
                        active.push(v.name().clone());
                        let resolved = self.resolve_from(bound, active);
                        active.pop();
                        resolved
                    }
                    None => term.clone(),
                }
            }
            Term::Literal(l) if !l.is_ground() => Term::literal(self.instantiate_from(l, active)),
            _ => term.clone(),
        }
    }

    fn instantiate_from(&self, literal: &Literal, active: &mut Vec<Arc<str>>) -> Literal {
        if literal.is_ground() {
            return literal.clone();
        }
        let values = literal
            .values()
            .iter()
            .map(|t| self.resolve_from(t, active))
            .collect();
        let annotations = literal
            .annotations()
            .iter()
            .map(|a| self.instantiate_from(a, active))
            .collect();
        literal
            .clone()
            .with_values(values)
            .with_annotations(annotations)
    }

    /// Slots sorted by name, for stable comparison and display.
    pub fn snapshot(&self) -> Vec<Variable> {
        let mut vars: Vec<Variable> = self.variables.values().cloned().collect();
        vars.sort_by(|a, b| a.name().cmp(b.name()));
        vars
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("variables", &self.snapshot())
            .finish()
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, var) in self.snapshot().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match var.value() {
                Some(v) => write!(f, "{} -> {}", var.name(), v)?,
                None => write!(f, "{}", var.name())?,
            }
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentBuilder;

    fn context() -> Context {
        let agent = AgentBuilder::new().build().unwrap();
        Context::new(agent)
    }

    #[test]
    fn test_bind_and_get() {
        let mut ctx = context();
        ctx.declare(vec![Arc::from("X"), Arc::from("Y")]);
        assert_eq!(ctx.len(), 2);
        assert!(!ctx.is_allocated("X"));

        ctx.bind("X", Term::int(1));
        assert_eq!(ctx.value("X"), Some(&Term::int(1)));
        assert!(ctx.get("Y").is_some());
        assert!(ctx.value("Y").is_none());

        // declaring again keeps the value
        ctx.declare(vec![Arc::from("X")]);
        assert_eq!(ctx.value("X"), Some(&Term::int(1)));
    }

    #[test]
    fn test_duplicate_is_independent() {
        let mut ctx = context();
        ctx.bind("X", Term::int(1));
        let before = ctx.snapshot();

        let mut copy = ctx.duplicate();
        copy.bind("X", Term::int(2));
        copy.bind("Z", Term::int(3));

        assert_eq!(ctx.snapshot(), before);
        assert_eq!(copy.value("X"), Some(&Term::int(2)));
    }

    #[test]
    fn test_instantiate() {
        let mut ctx = context();
        ctx.bind("X", Term::int(5));
        let literal = Literal::new(
            "foo",
            vec![
                Term::var("X"),
                Term::var("Y"),
                Term::literal(Literal::new("bar", vec![Term::var("X")])),
            ],
        );
        let resolved = ctx.instantiate(&literal);
        assert_eq!(
            resolved,
            Literal::new(
                "foo",
                vec![
                    Term::int(5),
                    Term::var("Y"),
                    Term::literal(Literal::new("bar", vec![Term::int(5)])),
                ],
            )
        );
        // the template is untouched
        assert_eq!(literal.values()[0], Term::var("X"));
    }

    #[test]
    fn test_resolve_stops_on_binding_cycle() {
        let mut ctx = context();
        ctx.bind("X", Term::var("Y"));
        ctx.bind("Y", Term::var("X"));
        ctx.bind("Z", Term::var("Z"));

        assert_eq!(ctx.resolve(&Term::var("X")), Term::var("X"));
        assert_eq!(ctx.resolve(&Term::var("Y")), Term::var("Y"));
        assert_eq!(ctx.resolve(&Term::var("Z")), Term::var("Z"));

        let literal = Literal::new("seen", vec![Term::var("X"), Term::var("Z")]);
        assert_eq!(
            ctx.instantiate(&literal),
            Literal::new("seen", vec![Term::var("X"), Term::var("Z")])
        );

        // a cycle through a nested literal also terminates
        ctx.bind(
            "W",
            Term::literal(Literal::new("wrap", vec![Term::var("W")])),
        );
        assert_eq!(
            ctx.resolve(&Term::var("W")),
            Term::literal(Literal::new("wrap", vec![Term::var("W")]))
        );
    }

    #[test]
    fn test_display() {
        let mut ctx = context();
        ctx.bind("Y", Term::int(2));
        ctx.bind("X", Term::int(1));
        ctx.declare(vec![Arc::from("Z")]);
        assert_eq!(format!("{}", ctx), "{X -> 1, Y -> 2, Z}");
    }
}
