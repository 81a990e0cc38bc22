use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::LevelThresholds;
use crate::types::{round1, ComplexityLevel};

/// Normalized position of one repository within its comparison set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedScore {
    pub normalized_score: f64,
    pub level: ComplexityLevel,
}

/// Normalization basis of one run: the maximum raw score of the comparison set
/// and the level thresholds. Built once, then passed to every normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonContext {
    max_raw: f64,
    degenerate: bool,
    thresholds: LevelThresholds,
}

impl ComparisonContext {
    /// Derive the basis from every (repository, raw score) pair in the set.
    pub fn new<'a, I>(scores: I, thresholds: LevelThresholds) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let raws: Vec<f64> = scores.into_iter().map(|(_, raw)| raw).collect();
        let max_raw = raws.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let all_equal = raws.windows(2).all(|w| w[0] == w[1]);
        let degenerate = raws.len() <= 1 || all_equal || max_raw <= 0.0;
        Self {
            max_raw: if max_raw.is_finite() { max_raw } else { 0.0 },
            degenerate,
            thresholds,
        }
    }

    pub fn max_raw(&self) -> f64 {
        self.max_raw
    }

    pub fn thresholds(&self) -> &LevelThresholds {
        &self.thresholds
    }

    /// Scale a raw score against the set maximum, rounded to one decimal.
    pub fn normalize(&self, raw_score: f64) -> NormalizedScore {
        let normalized_score = if self.degenerate {
            100.0
        } else {
            round1(raw_score / self.max_raw * 100.0)
        };
        NormalizedScore {
            normalized_score,
            level: self.thresholds.level_for(normalized_score),
        }
    }
}

/// Normalize a whole comparison set in one call.
pub fn normalize(
    scores: &[(String, f64)],
    thresholds: LevelThresholds,
) -> BTreeMap<String, NormalizedScore> {
    let context = ComparisonContext::new(
        scores.iter().map(|(id, raw)| (id.as_str(), *raw)),
        thresholds,
    );
    scores
        .iter()
        .map(|(id, raw)| (id.clone(), context.normalize(*raw)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(pairs: &[(&str, f64)]) -> Vec<(String, f64)> {
        pairs.iter().map(|(id, raw)| (id.to_string(), *raw)).collect()
    }

    #[test]
    fn test_reference_example() {
        let result = normalize(
            &set(&[("hello", 14.0), ("metaffi", 149.0), ("jni", 51.0)]),
            LevelThresholds::default(),
        );
        assert!((result["hello"].normalized_score - 9.4).abs() < 1e-9);
        assert_eq!(result["hello"].level, ComplexityLevel::Low);
        assert!((result["metaffi"].normalized_score - 100.0).abs() < f64::EPSILON);
        assert_eq!(result["metaffi"].level, ComplexityLevel::High);
        assert!((result["jni"].normalized_score - 34.2).abs() < 1e-9);
    }

    #[test]
    fn test_maximum_is_always_100() {
        for scores in [
            vec![("a", 3.0)],
            vec![("a", 3.0), ("b", 7.5)],
            vec![("a", 120.0), ("b", 44.0), ("c", 0.0), ("d", 119.9)],
        ] {
            let result = normalize(&set(&scores), LevelThresholds::default());
            let max = result
                .values()
                .map(|n| n.normalized_score)
                .fold(f64::MIN, f64::max);
            assert!((max - 100.0).abs() < f64::EPSILON, "{scores:?}");
        }
    }

    #[test]
    fn test_single_and_equal_sets_are_all_100() {
        let result = normalize(&set(&[("only", 42.0)]), LevelThresholds::default());
        assert!((result["only"].normalized_score - 100.0).abs() < f64::EPSILON);

        let result = normalize(
            &set(&[("a", 20.0), ("b", 20.0), ("c", 20.0)]),
            LevelThresholds::default(),
        );
        assert!(result.values().all(|n| (n.normalized_score - 100.0).abs() < f64::EPSILON));

        let result = normalize(&set(&[("a", 0.0), ("b", 0.0)]), LevelThresholds::default());
        assert!(result.values().all(|n| n.normalized_score.is_finite()));
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let already = set(&[("a", 100.0), ("b", 50.0), ("c", 9.4)]);
        let result = normalize(&already, LevelThresholds::default());
        for (id, raw) in &already {
            assert!((result[id].normalized_score - raw).abs() < 1e-9, "{id}");
        }
    }

    #[test]
    fn test_level_depends_only_on_normalized_score() {
        // Same normalized score (50.0) from different raw scores and set sizes.
        let first = normalize(&set(&[("x", 10.0), ("max", 20.0)]), LevelThresholds::default());
        let second = normalize(
            &set(&[("y", 150.0), ("max", 300.0), ("z", 1.0)]),
            LevelThresholds::default(),
        );
        assert!((first["x"].normalized_score - second["y"].normalized_score).abs() < f64::EPSILON);
        assert_eq!(first["x"].level, second["y"].level);
        assert_eq!(first["x"].level, ComplexityLevel::Medium);
    }

    #[test]
    fn test_raw_score_never_bucketed_directly() {
        // Raw 60 would be MEDIUM on the raw scale but is LOW once normalized.
        let result = normalize(&set(&[("a", 60.0), ("b", 200.0)]), LevelThresholds::default());
        assert!((result["a"].normalized_score - 30.0).abs() < f64::EPSILON);
        assert_eq!(result["a"].level, ComplexityLevel::Low);
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = LevelThresholds {
            low: 20.0,
            medium: 50.0,
        };
        let context = ComparisonContext::new([("a", 30.0), ("b", 100.0)], thresholds);
        assert_eq!(context.normalize(30.0).level, ComplexityLevel::Medium);
        assert!((context.max_raw() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_context_depends_on_scores_and_thresholds() {
        let scores = [("a", 30.0), ("b", 100.0)];
        let first = ComparisonContext::new(scores, LevelThresholds::default());
        let second = ComparisonContext::new(scores, LevelThresholds::default());
        assert_eq!(first, second);
        assert_eq!(*first.thresholds(), LevelThresholds::default());

        let custom = LevelThresholds {
            low: 20.0,
            medium: 50.0,
        };
        assert_ne!(first, ComparisonContext::new(scores, custom));
        assert_ne!(first, ComparisonContext::new([("a", 30.0)], LevelThresholds::default()));
    }
}
