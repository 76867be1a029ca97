//! Graded truth values.
//!
//! Every executable unit reports a `Truth` instead of a plain boolean, so
//! a confidence degree can be attached later without touching signatures.
//! Combination follows the boolean semiring: `+` is disjunction and `*`
//! is conjunction. Degrees combine by max under `+` and min under `*`.

use ordered_float::OrderedFloat;
use std::fmt;
use std::ops::{Add, Mul, Not};

/// A truth value with an optional confidence degree in `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Truth {
    value: bool,
    degree: Option<OrderedFloat<f64>>,
}

impl Truth {
    pub const TRUE: Truth = Truth {
        value: true,
        degree: None,
    };

    pub const FALSE: Truth = Truth {
        value: false,
        degree: None,
    };

    pub fn new(value: bool) -> Self {
        Truth {
            value,
            degree: None,
        }
    }

    /// Truth with a confidence degree, clamped to `[0, 1]`.
    pub fn with_degree(value: bool, degree: f64) -> Self {
        Truth {
            value,
            degree: Some(OrderedFloat(degree.clamp(0.0, 1.0))),
        }
    }

    pub fn value(&self) -> bool {
        self.value
    }

    pub fn is_true(&self) -> bool {
        self.value
    }

    pub fn degree(&self) -> Option<f64> {
        self.degree.map(|d| d.into_inner())
    }

    /// Additive identity (false).
    pub fn zero() -> Self {
        Truth::FALSE
    }

    /// Multiplicative identity (true).
    pub fn one() -> Self {
        Truth::TRUE
    }
}

fn combine(
    a: Option<OrderedFloat<f64>>,
    b: Option<OrderedFloat<f64>>,
    f: fn(OrderedFloat<f64>, OrderedFloat<f64>) -> OrderedFloat<f64>,
) -> Option<OrderedFloat<f64>> {
    match (a, b) {
        (Some(x), Some(y)) => Some(f(x, y)),
        (x, None) => x,
        (None, y) => y,
    }
}

impl Add for Truth {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Truth {
            value: self.value || other.value,
            degree: combine(self.degree, other.degree, std::cmp::max),
        }
    }
}

impl Mul for Truth {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        Truth {
            value: self.value && other.value,
            degree: combine(self.degree, other.degree, std::cmp::min),
        }
    }
}

impl Not for Truth {
    type Output = Self;

    fn not(self) -> Self {
        Truth {
            value: !self.value,
            degree: self.degree.map(|d| OrderedFloat(1.0 - d.into_inner())),
        }
    }
}

impl From<bool> for Truth {
    fn from(value: bool) -> Self {
        Truth::new(value)
    }
}

impl From<Truth> for bool {
    fn from(t: Truth) -> Self {
        t.value
    }
}

impl fmt::Display for Truth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.degree {
            Some(d) => write!(f, "{}({})", self.value, d),
            None => write!(f, "{}", self.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_algebra() {
        assert_eq!(Truth::TRUE + Truth::FALSE, Truth::TRUE);
        assert_eq!(Truth::TRUE * Truth::FALSE, Truth::FALSE);
        assert_eq!(Truth::FALSE + Truth::FALSE, Truth::FALSE);
        assert_eq!(Truth::TRUE * Truth::TRUE, Truth::TRUE);
        assert_eq!(!Truth::TRUE, Truth::FALSE);
        assert_eq!(Truth::one() * Truth::from(true), Truth::TRUE);
        assert_eq!(Truth::zero() + Truth::from(false), Truth::FALSE);
    }

    #[test]
    fn test_degrees() {
        let a = Truth::with_degree(true, 0.8);
        let b = Truth::with_degree(true, 0.3);
        assert_eq!((a * b).degree(), Some(0.3));
        assert_eq!((a + b).degree(), Some(0.8));
        assert_eq!((a * Truth::TRUE).degree(), Some(0.8));
        assert_eq!(Truth::with_degree(true, 4.0).degree(), Some(1.0));
        assert!(((!a).degree().unwrap() - 0.2).abs() < 1e-10);
    }
}
