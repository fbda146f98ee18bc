//! Name similarity between text references and model identifiers.

use ordered_float::OrderedFloat;
use tracelink_core::split_identifier;

use crate::config::SimilarityConfig;

/// Lowercased, separator-free form: `"Payment-Gateway"` -> `"paymentgateway"`.
pub fn normalize(name: &str) -> String {
    split_identifier(name).concat()
}

/// Normalized Levenshtein similarity of the normalized forms, in `[0, 1]`.
/// Empty names are similar to nothing.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let (a, b) = (normalize(a), normalize(b));
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&a, &b)
}

/// Two names are similar when their normalized forms are close, or when
/// both consist of several parts that pair up one-to-one regardless of
/// order (`"gateway payment"` vs `PaymentGateway`).
pub fn are_similar(a: &str, b: &str, config: &SimilarityConfig) -> bool {
    if name_similarity(a, b) >= config.threshold {
        return true;
    }
    let (pa, pb) = (split_identifier(a), split_identifier(b));
    if pa.len() < 2 || pa.len() != pb.len() {
        return false;
    }
    parts_pair_up(&pa, &pb, config.part_threshold)
}

/// True if some part of `name` (or the whole name) is similar to `word`.
/// Used to spot type words: `"component"` matches `BasicComponent`.
pub fn matches_any_part(word: &str, name: &str, threshold: f64) -> bool {
    if name_similarity(word, name) >= threshold {
        return true;
    }
    split_identifier(name)
        .iter()
        .any(|part| name_similarity(word, part) >= threshold)
}

/// Highest similarity between `name` and any of `forms`.
pub fn max_similarity<'a>(forms: impl IntoIterator<Item = &'a str>, name: &str) -> f64 {
    forms
        .into_iter()
        .map(|f| OrderedFloat(name_similarity(f, name)))
        .max()
        .map_or(0.0, |s| s.0)
}

/// Indices of the best scores, if the best reaches `threshold`. Ties are
/// all returned, in input order.
pub fn best_matches(scores: impl IntoIterator<Item = f64>, threshold: f64) -> Vec<usize> {
    let scored: Vec<(usize, OrderedFloat<f64>)> = scores
        .into_iter()
        .enumerate()
        .map(|(i, s)| (i, OrderedFloat(s)))
        .collect();
    let Some(best) = scored.iter().map(|(_, s)| *s).max() else {
        return Vec::new();
    };
    if best.0 < threshold {
        return Vec::new();
    }
    scored
        .into_iter()
        .filter(|(_, s)| *s == best)
        .map(|(i, _)| i)
        .collect()
}

fn parts_pair_up(a: &[String], b: &[String], threshold: f64) -> bool {
    let mut used = vec![false; b.len()];
    for part in a {
        let hit = b.iter().enumerate().find(|(j, other)| {
            !used[*j] && strsim::normalized_levenshtein(part, other) >= threshold
        });
        match hit {
            Some((j, _)) => used[j] = true,
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SimilarityConfig {
        SimilarityConfig::default()
    }

    #[test]
    fn identical_after_normalization() {
        assert_eq!(name_similarity("AuthService", "auth service"), 1.0);
        assert_eq!(name_similarity("payment_gateway", "PaymentGateway"), 1.0);
        assert_eq!(name_similarity("", "x"), 0.0);
    }

    #[test]
    fn similar_tolerates_small_typos() {
        assert!(are_similar("AuthServise", "AuthService", &cfg()));
        assert!(!are_similar("Token", "AuthService", &cfg()));
    }

    #[test]
    fn reordered_parts_are_similar() {
        assert!(are_similar("gateway payment", "PaymentGateway", &cfg()));
        assert!(!are_similar("gateway", "PaymentGateway", &cfg()));
        assert!(!are_similar("payment service", "PaymentGateway", &cfg()));
    }

    #[test]
    fn type_word_matches_part() {
        assert!(matches_any_part("component", "BasicComponent", 0.85));
        assert!(matches_any_part("interface", "Interface", 0.85));
        assert!(!matches_any_part("service", "BasicComponent", 0.85));
    }

    #[test]
    fn best_matches_keeps_ties() {
        let scores = ["AuthService", "auth-service", "Token"]
            .map(|n| name_similarity("authservice", n));
        assert_eq!(best_matches(scores, 0.85), vec![0, 1]);
        assert!(best_matches([0.2, 0.4], 0.85).is_empty());
        assert!(best_matches(std::iter::empty(), 0.5).is_empty());
    }

    #[test]
    fn max_similarity_over_forms() {
        assert_eq!(max_similarity(["Token", "auth service"], "AuthService"), 1.0);
        assert_eq!(max_similarity(std::iter::empty(), "AuthService"), 0.0);
    }
}
