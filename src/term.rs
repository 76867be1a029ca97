//! Core term representation for agent programs.
//!
//! A term is a raw value, a named variable, or a literal (functor path,
//! sign, ordered arguments and annotations). Literal trees are built once
//! and shared read-only between executions; bindings never mutate them.

use crate::path::Path;
use ordered_float::OrderedFloat;
use rustc_hash::{FxHashSet, FxHasher};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Atomic values.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(Arc<str>),
    Bool(bool),
}

impl Value {
    pub fn int(n: i64) -> Self {
        Value::Int(n)
    }

    pub fn float(f: f64) -> Self {
        Value::Float(OrderedFloat(f))
    }

    pub fn str(s: impl Into<Arc<str>>) -> Self {
        Value::Str(s.into())
    }

    pub fn bool(b: bool) -> Self {
        Value::Bool(b)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view, ints widen to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(x.into_inner()),
            _ => None,
        }
    }

    /// Name of the value type, used in fault messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// A named variable slot, optionally holding its bound value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Variable {
    name: Arc<str>,
    value: Option<Arc<Term>>,
}

impl Variable {
    /// Create an unbound variable.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Variable {
            name: name.into(),
            value: None,
        }
    }

    /// Create a variable already bound to `value`.
    pub fn bound(name: impl Into<Arc<str>>, value: Term) -> Self {
        Variable {
            name: name.into(),
            value: Some(Arc::new(value)),
        }
    }

    /// Fully-qualified name; contexts index their slots by it.
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn value(&self) -> Option<&Term> {
        self.value.as_deref()
    }

    pub fn is_allocated(&self) -> bool {
        self.value.is_some()
    }

    /// Return a copy of this slot bound to `value`.
    pub fn set(&self, value: Term) -> Variable {
        Variable::bound(self.name.clone(), value)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{}({})", self.name, v),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A named structured fact or goal.
///
/// Matching compares literals by two cached hashes rather than by
/// structure: the value hash covers the shape of the flattened
/// arguments, the annotation hash covers the annotations.
#[derive(Clone, Debug)]
pub struct Literal {
    functor: Path,
    negated: bool,
    ordered: bool,
    values: Vec<Term>,
    annotations: Vec<Literal>,
    value_hash: u64,
    annotation_hash: u64,
}

impl Literal {
    /// Create a positive literal.
    pub fn new(functor: impl Into<Path>, values: Vec<Term>) -> Self {
        Literal {
            functor: functor.into(),
            negated: false,
            ordered: false,
            values,
            annotations: Vec::new(),
            value_hash: 0,
            annotation_hash: 0,
        }
        .rehash()
    }

    /// Create a literal without arguments.
    pub fn atom(functor: impl Into<Path>) -> Self {
        Literal::new(functor, Vec::new())
    }

    /// Set the sign.
    pub fn negated(mut self, negated: bool) -> Self {
        self.negated = negated;
        self
    }

    /// Mark the literal as ordering-sensitive.
    pub fn ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    /// Replace the annotations. They are kept sorted by functor path.
    pub fn with_annotations(mut self, mut annotations: Vec<Literal>) -> Self {
        annotations.sort_by(|a, b| a.functor.cmp(&b.functor));
        self.annotations = annotations;
        self.rehash()
    }

    /// Replace the ordered values, keeping sign, marker and annotations.
    pub fn with_values(mut self, values: Vec<Term>) -> Self {
        self.values = values;
        self.rehash()
    }

    fn rehash(mut self) -> Self {
        self.value_hash = shape_hash(&self.functor, &self.values);
        let mut hasher = FxHasher::default();
        self.annotations.len().hash(&mut hasher);
        for annotation in &self.annotations {
            annotation.functor.hash(&mut hasher);
            annotation.value_hash.hash(&mut hasher);
        }
        self.annotation_hash = hasher.finish();
        self
    }

    pub fn functor(&self) -> &Path {
        &self.functor
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    pub fn values(&self) -> &[Term] {
        &self.values
    }

    pub fn annotations(&self) -> &[Literal] {
        &self.annotations
    }

    pub fn arity(&self) -> usize {
        self.values.len()
    }

    /// Hash over the shape of the flattened argument sequence.
    pub fn value_hash(&self) -> u64 {
        self.value_hash
    }

    /// Hash over the annotations only.
    pub fn annotation_hash(&self) -> u64 {
        self.annotation_hash
    }

    /// Both hashes equal.
    pub fn matches_exact(&self, other: &Literal) -> bool {
        self.value_hash == other.value_hash && self.annotation_hash == other.annotation_hash
    }

    /// Value hash equal, annotations ignored.
    pub fn matches_value(&self, other: &Literal) -> bool {
        self.value_hash == other.value_hash
    }

    /// Leaf terms of the ordered values, nested literals flattened.
    pub fn descend_values(&self) -> Descend<'_> {
        descend(&self.values)
    }

    /// Annotations in the form used for positional pairing.
    pub fn annotation_terms(&self) -> Vec<Term> {
        self.annotations
            .iter()
            .map(|a| Term::Literal(Arc::new(a.clone())))
            .collect()
    }

    /// Check if this literal contains no variables.
    pub fn is_ground(&self) -> bool {
        self.values.iter().all(|t| t.is_ground())
            && self.annotations.iter().all(|a| a.is_ground())
    }

    /// Collect the names of all variables in values and annotations.
    pub fn variables(&self) -> FxHashSet<Arc<str>> {
        let mut result = FxHashSet::default();
        self.collect_variables(&mut result);
        result
    }

    fn collect_variables(&self, result: &mut FxHashSet<Arc<str>>) {
        for value in &self.values {
            value.collect_variables(result);
        }
        for annotation in &self.annotations {
            annotation.collect_variables(result);
        }
    }
}

/// Shape hash: top-level arity, functor path and arity of every nested
/// literal entered, one marker per leaf. Leaf content is ignored.
///
/// An atom has no shape to hash, so its own functor is hashed instead.
fn shape_hash(functor: &Path, values: &[Term]) -> u64 {
    let mut hasher = FxHasher::default();
    values.len().hash(&mut hasher);
    if values.is_empty() {
        functor.hash(&mut hasher);
    }
    let mut stack = vec![values.iter()];
    while let Some(top) = stack.last_mut() {
        match top.next() {
            Some(Term::Literal(l)) => {
                1u8.hash(&mut hasher);
                l.functor.hash(&mut hasher);
                l.negated.hash(&mut hasher);
                l.values.len().hash(&mut hasher);
                stack.push(l.values.iter());
            }
            Some(_) => 0u8.hash(&mut hasher),
            None => {
                stack.pop();
            }
        }
    }
    hasher.finish()
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        self.functor == other.functor
            && self.negated == other.negated
            && self.values == other.values
            && self.annotations == other.annotations
    }
}

impl Eq for Literal {}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.functor.hash(state);
        self.negated.hash(state);
        self.values.hash(state);
        self.annotations.hash(state);
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "~")?;
        }
        write!(f, "{}", self.functor)?;
        if !self.values.is_empty() {
            write!(f, "(")?;
            for (i, value) in self.values.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", value)?;
            }
            write!(f, ")")?;
        }
        if !self.annotations.is_empty() {
            write!(f, "[")?;
            for (i, annotation) in self.annotations.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", annotation)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

/// A term: raw value, variable, or literal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Term {
    Value(Value),
    Variable(Variable),
    Literal(Arc<Literal>),
}

impl Term {
    pub fn int(n: i64) -> Self {
        Term::Value(Value::Int(n))
    }

    pub fn float(f: f64) -> Self {
        Term::Value(Value::float(f))
    }

    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Term::Value(Value::str(s))
    }

    pub fn boolean(b: bool) -> Self {
        Term::Value(Value::Bool(b))
    }

    /// Create an unbound variable term.
    pub fn var(name: impl Into<Arc<str>>) -> Self {
        Term::Variable(Variable::new(name))
    }

    pub fn literal(literal: Literal) -> Self {
        Term::Literal(Arc::new(literal))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Term::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Raw value of the term, looking through bound variables.
    pub fn raw(&self) -> Option<&Value> {
        match self {
            Term::Value(v) => Some(v),
            Term::Variable(v) => v.value().and_then(Term::raw),
            Term::Literal(_) => None,
        }
    }

    /// Check if this term contains no unbound variables.
    pub fn is_ground(&self) -> bool {
        match self {
            Term::Value(_) => true,
            Term::Variable(v) => v.is_allocated(),
            Term::Literal(l) => l.is_ground(),
        }
    }

    fn collect_variables(&self, result: &mut FxHashSet<Arc<str>>) {
        match self {
            Term::Value(_) => {}
            Term::Variable(v) => {
                result.insert(v.name().clone());
            }
            Term::Literal(l) => l.collect_variables(result),
        }
    }
}

impl From<Value> for Term {
    fn from(v: Value) -> Self {
        Term::Value(v)
    }
}

impl From<Literal> for Term {
    fn from(l: Literal) -> Self {
        Term::literal(l)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Value(v) => write!(f, "{}", v),
            Term::Variable(v) => write!(f, "{}", v),
            Term::Literal(l) => write!(f, "{}", l),
        }
    }
}

/// Lazy depth-first flattening of a term sequence.
///
/// Nested literals are expanded into their own ordered values; every other
/// term is yielded as is. The iterator is finite and cannot be restarted.
pub struct Descend<'a> {
    stack: Vec<std::slice::Iter<'a, Term>>,
}

/// Flatten `values`, descending into nested literals.
pub fn descend(values: &[Term]) -> Descend<'_> {
    Descend {
        stack: vec![values.iter()],
    }
}

impl<'a> Iterator for Descend<'a> {
    type Item = &'a Term;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                Some(Term::Literal(l)) => self.stack.push(l.values.iter()),
                Some(term) => return Some(term),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(functor: &str, values: Vec<Term>) -> Term {
        Term::literal(Literal::new(functor, values))
    }

    #[test]
    fn test_term_creation() {
        let x = Term::var("X");
        assert!(x.is_variable());
        assert!(!x.is_ground());

        let c = Term::int(42);
        assert!(c.is_ground());
        assert_eq!(c.raw(), Some(&Value::Int(42)));

        let l = Literal::new("f", vec![Term::var("X"), Term::int(1)]);
        assert_eq!(l.functor(), &Path::new("f"));
        assert_eq!(l.arity(), 2);
        assert!(!l.is_ground());
    }

    #[test]
    fn test_descend_flattens_nested() {
        let l = Literal::new(
            "toplevel",
            vec![
                lit("first", vec![Term::string("Hello")]),
                Term::int(7),
                lit("second/sub", vec![lit("deep", vec![Term::int(1), Term::int(2)])]),
            ],
        );
        let leaves: Vec<_> = l.descend_values().cloned().collect();
        assert_eq!(
            leaves,
            vec![Term::string("Hello"), Term::int(7), Term::int(1), Term::int(2)]
        );
    }

    #[test]
    fn test_value_hash_ignores_leaf_content() {
        let first = Literal::new(
            "foo",
            vec![
                lit("sub", vec![Term::int(3)]),
                lit("sub", vec![Term::var("X")]),
                lit("test", vec![Term::int(1235)]),
                lit("data", vec![lit("value", vec![Term::string("data string")])]),
            ],
        );
        let second = Literal::new(
            "another",
            vec![
                lit("sub", vec![Term::int(3)]),
                lit("sub", vec![Term::var("X")]),
                lit("test", vec![Term::int(123)]),
                lit("data", vec![lit("value", vec![Term::string("other")])]),
            ],
        );
        assert_eq!(first.value_hash(), second.value_hash());

        let goal = Literal::new("point", vec![Term::var("X"), Term::var("Y")]);
        let fact = Literal::new("point", vec![Term::int(1), Term::int(2)]);
        assert!(goal.matches_exact(&fact));
    }

    #[test]
    fn test_value_hash_distinguishes_shape() {
        let flat = Literal::new("p", vec![Term::int(1), Term::int(2)]);
        let nested = Literal::new("p", vec![lit("q", vec![Term::int(1), Term::int(2)])]);
        let split = Literal::new("p", vec![lit("q", vec![Term::int(1)]), Term::int(2)]);
        assert_ne!(flat.value_hash(), nested.value_hash());
        assert_ne!(nested.value_hash(), split.value_hash());
        assert_ne!(
            Literal::new("p", vec![Term::int(1)]).value_hash(),
            flat.value_hash()
        );
    }

    #[test]
    fn test_atoms_hash_by_functor() {
        let foo = Literal::new("foo", vec![]);
        let hallo = Literal::new("hallo", vec![]);
        assert_ne!(foo.value_hash(), hallo.value_hash());
        assert!(!foo.matches_value(&hallo));
        assert_eq!(foo.value_hash(), Literal::new("foo", vec![]).value_hash());

        // functors of non-empty literals still do not reach the hash
        let first = Literal::new("foo", vec![Term::int(1)]);
        let second = Literal::new("hallo", vec![Term::int(2)]);
        assert_eq!(first.value_hash(), second.value_hash());
    }

    #[test]
    fn test_annotation_hash() {
        let first = Literal::new("foo", vec![]).with_annotations(vec![
            Literal::new("anno", vec![Term::int(1)]),
            Literal::new("xvalue", vec![Term::string("test")]),
        ]);
        let second = Literal::new("foo", vec![]).with_annotations(vec![
            Literal::new("foo", vec![Term::int(13)]),
            Literal::new("valuenew", vec![Term::string("test2")]),
        ]);
        assert_ne!(first.annotation_hash(), second.annotation_hash());
        assert!(first.matches_value(&second));
        assert!(!first.matches_exact(&second));

        // annotation order does not matter
        let reordered = Literal::new("foo", vec![]).with_annotations(vec![
            Literal::new("xvalue", vec![Term::string("test")]),
            Literal::new("anno", vec![Term::int(1)]),
        ]);
        assert_eq!(first.annotation_hash(), reordered.annotation_hash());
        assert_eq!(first, reordered);
    }

    #[test]
    fn test_structural_equality_is_separate_from_matching() {
        let a = Literal::new("point", vec![Term::int(1), Term::int(2)]);
        let b = Literal::new("point", vec![Term::int(3), Term::int(4)]);
        assert!(a.matches_exact(&b));
        assert_ne!(a, b);
        assert_ne!(a.clone().negated(true), a);
    }

    #[test]
    fn test_literal_variables() {
        let l = Literal::new(
            "f",
            vec![Term::var("X"), lit("g", vec![Term::var("Y"), Term::var("X")])],
        )
        .with_annotations(vec![Literal::new("source", vec![Term::var("S")])]);
        let vars = l.variables();
        assert_eq!(vars.len(), 3);
        assert!(vars.contains("X"));
        assert!(vars.contains("Y"));
        assert!(vars.contains("S"));
    }

    #[test]
    fn test_literal_display() {
        let l = Literal::new("foo", vec![Term::var("X"), Term::int(42), Term::string("s")])
            .negated(true)
            .with_annotations(vec![Literal::atom("self")]);
        assert_eq!(format!("{}", l), "~foo(X, 42, \"s\")[self]");
        assert_eq!(format!("{}", Literal::atom("a/b")), "a/b");
    }
}
