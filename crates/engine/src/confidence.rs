//! Evidence scores and their aggregation.
//!
//! A [`Confidence`] is a list of `(claimant, score)` claims plus the
//! function that folds them into one value. An empty confidence has no
//! value at all, which is different from a confidence of `0.0`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::agent::AgentKind;

/// The heuristic that contributed a claim.
pub type Claimant = AgentKind;

/// How the claims of one [`Confidence`] combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    Max,
    Min,
    Average,
    /// Sum of scores, clamped to 1.0.
    Sum,
}

impl Aggregation {
    /// Fold scores into a value. `None` when there are no scores.
    pub fn apply(self, scores: impl IntoIterator<Item = f64>) -> Option<f64> {
        let mut iter = scores.into_iter();
        let first = iter.next()?;
        let value = match self {
            Self::Max => iter.fold(first, f64::max),
            Self::Min => iter.fold(first, f64::min),
            Self::Average => {
                let (sum, count) = iter.fold((first, 1usize), |(s, n), x| (s + x, n + 1));
                sum / count as f64
            }
            Self::Sum => iter.fold(first, |s, x| s + x).min(1.0),
        };
        Some(value)
    }
}

impl std::fmt::Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Max => write!(f, "max"),
            Self::Min => write!(f, "min"),
            Self::Average => write!(f, "average"),
            Self::Sum => write!(f, "sum"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Claim {
    pub claimant: Claimant,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Confidence {
    aggregation: Aggregation,
    claims: Vec<Claim>,
    value: Option<f64>,
}

impl Confidence {
    pub fn new(aggregation: Aggregation) -> Self {
        Self {
            aggregation,
            claims: Vec::new(),
            value: None,
        }
    }

    pub fn with_claim(aggregation: Aggregation, claimant: Claimant, score: f64) -> Self {
        let mut confidence = Self::new(aggregation);
        confidence.add(claimant, score);
        confidence
    }

    /// Record a claim. Scores are clamped to `[0, 1]`; non-finite scores
    /// are dropped.
    pub fn add(&mut self, claimant: Claimant, score: f64) {
        if !score.is_finite() {
            warn!(%claimant, score, "dropping non-finite score");
            return;
        }
        self.claims.push(Claim {
            claimant,
            score: score.clamp(0.0, 1.0),
        });
        self.recompute();
    }

    /// Absorb every claim of `other`. The aggregation of `self` wins.
    pub fn combine(&mut self, other: &Confidence) {
        if other.claims.is_empty() {
            return;
        }
        self.claims.extend_from_slice(&other.claims);
        self.recompute();
    }

    pub fn combined(&self, other: &Confidence) -> Confidence {
        let mut out = self.clone();
        out.combine(other);
        out
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Value, or `0.0` for an empty confidence. Only for ranking.
    pub fn value_or_zero(&self) -> f64 {
        self.value.unwrap_or(0.0)
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn claimants(&self) -> BTreeSet<Claimant> {
        self.claims.iter().map(|c| c.claimant).collect()
    }

    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    fn recompute(&mut self) {
        self.value = self.aggregation.apply(self.claims.iter().map(|c| c.score));
    }
}
