//! Arithmetic and boolean expressions over raw values.
//!
//! Expressions are evaluated against a context. Used as an execution step
//! or guard, an expression appends its value to the result sink and
//! succeeds; faults (unbound variables, type mismatches, division by zero)
//! are returned as errors.
//!
//! `X++` and `X--` are steps of their own: they rebind a numeric variable
//! in place and push nothing.

use crate::context::Context;
use crate::execution::{fingerprint_of, Execution, ExecutionError};
use crate::term::{Term, Value};
use crate::truth::Truth;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
    Abs,
}

impl UnaryOp {
    pub fn from_token(token: &str) -> Result<Self, ExecutionError> {
        match token {
            "!" => Ok(UnaryOp::Not),
            "-" => Ok(UnaryOp::Neg),
            "abs" => Ok(UnaryOp::Abs),
            other => Err(ExecutionError::unknown_token("unary operator", other)),
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
            UnaryOp::Abs => "abs",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Xor,
}

impl BinaryOp {
    pub fn from_token(token: &str) -> Result<Self, ExecutionError> {
        Ok(match token {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            "^" => BinaryOp::Xor,
            other => return Err(ExecutionError::unknown_token("binary operator", other)),
        })
    }

    pub fn token(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Xor => "^",
        }
    }
}

/// An expression tree.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Expression {
    Constant(Value),
    Variable(Arc<str>),
    Unary(UnaryOp, Box<Expression>),
    Binary(BinaryOp, Box<Expression>, Box<Expression>),
}

impl Expression {
    pub fn constant(value: impl Into<Value>) -> Self {
        Expression::Constant(value.into())
    }

    pub fn var(name: impl Into<Arc<str>>) -> Self {
        Expression::Variable(name.into())
    }

    /// Build a unary node from its operator token.
    pub fn unary(token: &str, operand: Expression) -> Result<Self, ExecutionError> {
        Ok(Expression::Unary(UnaryOp::from_token(token)?, Box::new(operand)))
    }

    /// Build a binary node from its operator token.
    pub fn binary(token: &str, lhs: Expression, rhs: Expression) -> Result<Self, ExecutionError> {
        Ok(Expression::Binary(
            BinaryOp::from_token(token)?,
            Box::new(lhs),
            Box::new(rhs),
        ))
    }

    /// Evaluate to a raw value.
    pub fn evaluate(&self, context: &Context) -> Result<Value, ExecutionError> {
        match self {
            Expression::Constant(v) => Ok(v.clone()),
            Expression::Variable(name) => lookup(name, context),
            Expression::Unary(op, operand) => unary(*op, operand.evaluate(context)?, context),
            Expression::Binary(op, lhs, rhs) => {
                let left = lhs.evaluate(context)?;
                // && and || short-circuit
                match (op, left.as_bool()) {
                    (BinaryOp::And, Some(false)) => return Ok(Value::Bool(false)),
                    (BinaryOp::Or, Some(true)) => return Ok(Value::Bool(true)),
                    _ => {}
                }
                binary(*op, left, rhs.evaluate(context)?, context)
            }
        }
    }
}

fn lookup(name: &Arc<str>, context: &Context) -> Result<Value, ExecutionError> {
    let term = match context.value(name) {
        Some(term) => context.resolve(term),
        None => return Err(ExecutionError::unallocated(name.clone(), context)),
    };
    match term {
        Term::Value(v) => Ok(v),
        other => Err(ExecutionError::runtime(
            format!("variable `{}` is bound to non-value `{}`", name, other),
            context,
        )),
    }
}

fn unary(op: UnaryOp, value: Value, context: &Context) -> Result<Value, ExecutionError> {
    match (op, value) {
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Neg, Value::Int(n)) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| ExecutionError::runtime("integer overflow", context)),
        (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnaryOp::Abs, Value::Int(n)) => n
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| ExecutionError::runtime("integer overflow", context)),
        (UnaryOp::Abs, Value::Float(x)) => Ok(Value::float(x.into_inner().abs())),
        (op, v) => Err(ExecutionError::runtime(
            format!("operator `{}` not defined for {}", op.token(), v.type_name()),
            context,
        )),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value, context: &Context) -> Result<Value, ExecutionError> {
    let mismatch = |left: &Value, right: &Value| {
        ExecutionError::runtime(
            format!(
                "operator `{}` not defined for {} and {}",
                op.token(),
                left.type_name(),
                right.type_name()
            ),
            context,
        )
    };

    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            arithmetic(op, &left, &right, context)?.ok_or_else(|| mismatch(&left, &right))
        }
        BinaryOp::Eq => Ok(Value::Bool(equals(&left, &right))),
        BinaryOp::Ne => Ok(Value::Bool(!equals(&left, &right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(&left, &right).ok_or_else(|| mismatch(&left, &right))?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => match (left.as_bool(), right.as_bool()) {
            (Some(a), Some(b)) => Ok(Value::Bool(match op {
                BinaryOp::And => a && b,
                BinaryOp::Or => a || b,
                _ => a ^ b,
            })),
            _ => Err(mismatch(&left, &right)),
        },
    }
}

/// Numeric operators with int/float promotion; `Ok(None)` on a type mismatch.
fn arithmetic(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    context: &Context,
) -> Result<Option<Value>, ExecutionError> {
    let overflow = || ExecutionError::runtime("integer overflow", context);
    let by_zero = || ExecutionError::runtime("division by zero", context);

    match (left, right) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            let result = match op {
                BinaryOp::Add => a.checked_add(b).ok_or_else(overflow)?,
                BinaryOp::Sub => a.checked_sub(b).ok_or_else(overflow)?,
                BinaryOp::Mul => a.checked_mul(b).ok_or_else(overflow)?,
                BinaryOp::Div if b == 0 => return Err(by_zero()),
                BinaryOp::Div => a.checked_div(b).ok_or_else(overflow)?,
                BinaryOp::Mod if b == 0 => return Err(by_zero()),
                _ => a.checked_rem_euclid(b).ok_or_else(overflow)?,
            };
            Ok(Some(Value::Int(result)))
        }
        (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => {
            Ok(Some(Value::str(format!("{}{}", a, b))))
        }
        _ => {
            let (a, b) = match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => (a, b),
                _ => return Ok(None),
            };
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div if b == 0.0 => return Err(by_zero()),
                BinaryOp::Div => a / b,
                BinaryOp::Mod if b == 0.0 => return Err(by_zero()),
                _ => a.rem_euclid(b),
            };
            Ok(Some(Value::float(result)))
        }
    }
}

/// Equality with numeric promotion.
fn equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
            left.as_f64() == right.as_f64()
        }
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => left.as_f64()?.partial_cmp(&right.as_f64()?),
    }
}

impl Execution for Expression {
    fn execute(
        &self,
        context: &mut Context,
        _parallel: bool,
        _arguments: &[Term],
        results: &mut Vec<Term>,
        _annotations: &[Term],
    ) -> Result<Truth, ExecutionError> {
        results.push(Term::Value(self.evaluate(context)?));
        Ok(Truth::TRUE)
    }

    fn fingerprint(&self) -> u64 {
        fingerprint_of("expression", self)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Constant(v) => write!(f, "{}", v),
            Expression::Variable(name) => write!(f, "{}", name),
            Expression::Unary(UnaryOp::Abs, e) => write!(f, "abs({})", e),
            Expression::Unary(op, e) => write!(f, "{}{}", op.token(), e),
            Expression::Binary(op, l, r) => write!(f, "({} {} {})", l, op.token(), r),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IncrementOp {
    Increment,
    Decrement,
}

impl IncrementOp {
    pub fn from_token(token: &str) -> Result<Self, ExecutionError> {
        match token {
            "++" => Ok(IncrementOp::Increment),
            "--" => Ok(IncrementOp::Decrement),
            other => Err(ExecutionError::unknown_token("increment operator", other)),
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            IncrementOp::Increment => "++",
            IncrementOp::Decrement => "--",
        }
    }
}

/// Postfix `X++` / `X--` on a bound numeric variable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Increment {
    variable: Arc<str>,
    op: IncrementOp,
}

impl Increment {
    /// Build the step from its operator token.
    pub fn new(token: &str, variable: impl Into<Arc<str>>) -> Result<Self, ExecutionError> {
        Ok(Increment {
            variable: variable.into(),
            op: IncrementOp::from_token(token)?,
        })
    }

    pub fn increment(variable: impl Into<Arc<str>>) -> Self {
        Increment {
            variable: variable.into(),
            op: IncrementOp::Increment,
        }
    }

    pub fn decrement(variable: impl Into<Arc<str>>) -> Self {
        Increment {
            variable: variable.into(),
            op: IncrementOp::Decrement,
        }
    }

    pub fn variable(&self) -> &Arc<str> {
        &self.variable
    }

    pub fn op(&self) -> IncrementOp {
        self.op
    }

    fn apply(&self, value: Value, context: &Context) -> Result<Value, ExecutionError> {
        let overflow = || ExecutionError::runtime("integer overflow", context);
        match (self.op, value) {
            (IncrementOp::Increment, Value::Int(n)) => {
                n.checked_add(1).map(Value::Int).ok_or_else(overflow)
            }
            (IncrementOp::Decrement, Value::Int(n)) => {
                n.checked_sub(1).map(Value::Int).ok_or_else(overflow)
            }
            (IncrementOp::Increment, Value::Float(x)) => Ok(Value::float(x.into_inner() + 1.0)),
            (IncrementOp::Decrement, Value::Float(x)) => Ok(Value::float(x.into_inner() - 1.0)),
            (op, v) => Err(ExecutionError::runtime(
                format!("operator `{}` not defined for {}", op.token(), v.type_name()),
                context,
            )),
        }
    }
}

impl Execution for Increment {
    fn execute(
        &self,
        context: &mut Context,
        _parallel: bool,
        _arguments: &[Term],
        _results: &mut Vec<Term>,
        _annotations: &[Term],
    ) -> Result<Truth, ExecutionError> {
        let current = lookup(&self.variable, context)?;
        let next = self.apply(current, context)?;
        context.bind(self.variable.clone(), Term::Value(next));
        Ok(Truth::TRUE)
    }

    fn fingerprint(&self) -> u64 {
        fingerprint_of(self.op.token(), &self.variable)
    }
}

impl fmt::Display for Increment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.variable, self.op.token())
    }
}
