//! Comparison of pipeline output against a gold standard.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::connection::ConnectionState;

/// Confusion counts. `true_negatives` is only known when the caller
/// supplies the size of the candidate universe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationResult {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_negatives: Option<usize>,
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

impl EvaluationResult {
    pub fn compare<T: Ord>(found: &BTreeSet<T>, expected: &BTreeSet<T>) -> Self {
        let true_positives = found.intersection(expected).count();
        Self {
            true_positives,
            false_positives: found.len() - true_positives,
            false_negatives: expected.len() - true_positives,
            true_negatives: None,
        }
    }

    /// Derive true negatives from the number of possible candidates.
    pub fn with_universe(mut self, universe: usize) -> Self {
        let counted = self.true_positives + self.false_positives + self.false_negatives;
        self.true_negatives = Some(universe.saturating_sub(counted));
        self
    }

    /// Precision; `0.0` when nothing was found.
    pub fn precision(&self) -> f64 {
        let tp = self.true_positives as f64;
        ratio(tp, tp + self.false_positives as f64)
    }

    /// Recall; `0.0` when nothing was expected.
    pub fn recall(&self) -> f64 {
        let tp = self.true_positives as f64;
        ratio(tp, tp + self.false_negatives as f64)
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        ratio(2.0 * p * r, p + r)
    }

    pub fn accuracy(&self) -> Option<f64> {
        let tn = self.true_negatives? as f64;
        let tp = self.true_positives as f64;
        let total = tp + tn + (self.false_positives + self.false_negatives) as f64;
        Some(ratio(tp + tn, total))
    }

    pub fn specificity(&self) -> Option<f64> {
        let tn = self.true_negatives? as f64;
        Some(ratio(tn, tn + self.false_positives as f64))
    }

    /// Matthews correlation (phi coefficient).
    pub fn phi(&self) -> Option<f64> {
        let tn = self.true_negatives? as f64;
        let tp = self.true_positives as f64;
        let fp = self.false_positives as f64;
        let fn_ = self.false_negatives as f64;
        let den = ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();
        Some(ratio(tp * tn - fp * fn_, den))
    }
}

impl std::ops::Add for EvaluationResult {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            true_positives: self.true_positives + other.true_positives,
            false_positives: self.false_positives + other.false_positives,
            false_negatives: self.false_negatives + other.false_negatives,
            true_negatives: match (self.true_negatives, other.true_negatives) {
                (Some(a), Some(b)) => Some(a + b),
                _ => None,
            },
        }
    }
}

/// Expected (model element id, sentence) pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoldStandard {
    links: BTreeSet<(String, u32)>,
}

impl GoldStandard {
    pub fn new(links: impl IntoIterator<Item = (String, u32)>) -> Self {
        Self {
            links: links.into_iter().collect(),
        }
    }

    pub fn links(&self) -> &BTreeSet<(String, u32)> {
        &self.links
    }

    pub fn contains(&self, element_id: &str, sentence_no: u32) -> bool {
        self.links.contains(&(element_id.to_string(), sentence_no))
    }

    pub fn sentences_for(&self, element_id: &str) -> BTreeSet<u32> {
        self.links
            .iter()
            .filter(|(id, _)| id == element_id)
            .map(|(_, s)| *s)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// Score the accepted links of one model against the gold standard.
pub fn evaluate_links(
    connections: &ConnectionState,
    gold: &GoldStandard,
    acceptance_threshold: f64,
) -> EvaluationResult {
    let found: BTreeSet<(String, u32)> = connections
        .accepted_links(acceptance_threshold)
        .into_iter()
        .map(|l| (l.model_element_id().to_string(), l.sentence_no()))
        .collect();
    EvaluationResult::compare(&found, gold.links())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(tp: usize, fp: usize, fn_: usize) -> EvaluationResult {
        EvaluationResult {
            true_positives: tp,
            false_positives: fp,
            false_negatives: fn_,
            true_negatives: None,
        }
    }

    #[test]
    fn compare_counts_sets() {
        let found = BTreeSet::from([1, 2, 3]);
        let expected = BTreeSet::from([2, 3, 4, 5]);
        let r = EvaluationResult::compare(&found, &expected);
        assert_eq!(r, result(2, 1, 2));
        assert!((r.precision() - 2.0 / 3.0).abs() < 1e-9);
        assert!((r.recall() - 0.5).abs() < 1e-9);
        assert!((r.f1() - 4.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_denominators_are_zero() {
        let r = result(0, 0, 0);
        assert_eq!(r.precision(), 0.0);
        assert_eq!(r.recall(), 0.0);
        assert_eq!(r.f1(), 0.0);
        assert_eq!(r.accuracy(), None);
    }

    #[test]
    fn extended_metrics_need_universe() {
        let r = result(2, 1, 1).with_universe(10);
        assert_eq!(r.true_negatives, Some(6));
        assert!((r.accuracy().unwrap() - 0.8).abs() < 1e-9);
        assert!((r.specificity().unwrap() - 6.0 / 7.0).abs() < 1e-9);
        let phi = r.phi().unwrap();
        let expected = (2.0 * 6.0 - 1.0) / (3.0f64 * 3.0 * 7.0 * 7.0).sqrt();
        assert!((phi - expected).abs() < 1e-9);
    }

    #[test]
    fn results_add_up() {
        let sum = result(1, 2, 3) + result(4, 5, 6);
        assert_eq!(sum, result(5, 7, 9));
        let with_tn = result(1, 0, 0).with_universe(3) + result(1, 0, 0).with_universe(2);
        assert_eq!(with_tn.true_negatives, Some(3));
    }

    #[test]
    fn gold_lookup_by_element() {
        let gold = GoldStandard::new([("c1".to_string(), 1), ("c1".to_string(), 4), ("c2".to_string(), 2)]);
        assert_eq!(gold.sentences_for("c1"), BTreeSet::from([1, 4]));
        assert!(gold.contains("c2", 2));
        assert!(!gold.contains("c2", 1));
        assert_eq!(gold.len(), 3);
    }
}
