//! Score aggregation.
//!
//! Rules are ranked by combining the scores of their steps. The combinator
//! is injected into the agent, common choices are sum, max, min and mean.

use std::fmt::Debug;

/// Combines a sequence of step scores into one score.
pub trait Aggregation: Debug + Send + Sync {
    /// Aggregate `scores`. An empty input yields the identity.
    fn evaluate(&self, scores: &[f64]) -> f64;
}

/// Sum of all scores.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sum;

impl Aggregation for Sum {
    fn evaluate(&self, scores: &[f64]) -> f64 {
        scores.iter().sum()
    }
}

/// Largest score, zero on empty input.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Max;

impl Aggregation for Max {
    fn evaluate(&self, scores: &[f64]) -> f64 {
        scores
            .iter()
            .copied()
            .fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |a| a.max(x))))
            .unwrap_or(0.0)
    }
}

/// Smallest score, zero on empty input.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Min;

impl Aggregation for Min {
    fn evaluate(&self, scores: &[f64]) -> f64 {
        scores
            .iter()
            .copied()
            .fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |a| a.min(x))))
            .unwrap_or(0.0)
    }
}

/// Arithmetic mean, zero on empty input.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Mean;

impl Aggregation for Mean {
    fn evaluate(&self, scores: &[f64]) -> f64 {
        if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        }
    }
}
