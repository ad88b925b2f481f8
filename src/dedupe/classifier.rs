use super::scorers::ScorerResult;
use super::{Dimension, Weights};
use itertools::Itertools;

/// The duplicate/distinct decision for one candidate pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub is_duplicate: bool,
    /// Weighted score in `[0, 1]`; 1.0 for a DOI match.
    pub score: f64,
    pub reason: String,
    /// Scorer results in dimension order
    pub scores: Vec<ScorerResult>,
}

/// Combines scorer results into a [`Verdict`].
///
/// A matching DOI decides the pair on its own. Otherwise the score is the
/// weighted mean over the active dimensions (non-zero weight; the abstract
/// only when both references have one), compared against the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Classifier {
    weights: Weights,
    threshold: f64,
}

impl Classifier {
    pub fn new(weights: Weights, threshold: f64) -> Self {
        Self { weights, threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn is_active(&self, result: &ScorerResult) -> bool {
        let weight = self.weights.get(result.dimension);
        weight > 0.0 && (result.dimension != Dimension::Abstract || result.both_present)
    }

    pub fn classify(&self, scores: Vec<ScorerResult>) -> Verdict {
        let doi_match = scores
            .iter()
            .any(|r| r.dimension == Dimension::Doi && r.both_present && r.score >= 1.0);
        if doi_match {
            return Verdict {
                is_duplicate: true,
                score: 1.0,
                reason: "DOI match".to_string(),
                scores,
            };
        }

        let contributions: Vec<(Dimension, f64)> = scores
            .iter()
            .filter(|r| self.is_active(r))
            .map(|r| (r.dimension, self.weights.get(r.dimension) * r.score))
            .collect();
        let total_weight: f64 = scores
            .iter()
            .filter(|r| self.is_active(r))
            .map(|r| self.weights.get(r.dimension))
            .sum();

        let score = if total_weight > 0.0 {
            contributions.iter().map(|(_, c)| c).sum::<f64>() / total_weight
        } else {
            0.0
        };
        let is_duplicate = total_weight > 0.0 && score >= self.threshold;

        // Highest contributions first; ties keep dimension order.
        let leading = contributions
            .iter()
            .filter(|(_, contribution)| *contribution > 0.0)
            .sorted_by(|a, b| b.1.total_cmp(&a.1))
            .map(|(dimension, contribution)| format!("{dimension} {contribution:.2}"))
            .join(", ");
        let reason = if leading.is_empty() {
            format!("score {score:.2}: no contributing fields")
        } else {
            format!("score {score:.2}: {leading}")
        };

        Verdict {
            is_duplicate,
            score,
            reason,
            scores,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedupe::NEUTRAL_SCORE;
    use pretty_assertions::assert_eq;

    fn result(dimension: Dimension, score: f64) -> ScorerResult {
        ScorerResult::new(dimension, score)
    }

    fn classifier() -> Classifier {
        Classifier::new(Weights::default(), 0.75)
    }

    #[test]
    fn test_doi_match_short_circuits() {
        let verdict = classifier().classify(vec![
            result(Dimension::Title, 0.0),
            result(Dimension::Authors, 0.0),
            result(Dimension::Year, 0.0),
            result(Dimension::Doi, 1.0),
        ]);
        assert!(verdict.is_duplicate);
        assert_eq!(verdict.reason, "DOI match");
        assert_eq!(verdict.scores.len(), 4);
    }

    #[test]
    fn test_weighted_duplicate() {
        let verdict = classifier().classify(vec![
            result(Dimension::Title, 1.0),
            result(Dimension::Authors, 1.0),
            result(Dimension::Year, 1.0),
            ScorerResult::missing(Dimension::Doi),
            ScorerResult::missing(Dimension::Abstract),
            ScorerResult::missing(Dimension::Journal),
        ]);
        assert!(verdict.is_duplicate);
        assert!((verdict.score - 0.9).abs() < 1e-9);
        assert_eq!(
            verdict.reason,
            "score 0.90: title 0.40, authors 0.30, year 0.10, doi 0.10"
        );
    }

    #[test]
    fn test_below_threshold() {
        let verdict = classifier().classify(vec![
            result(Dimension::Title, 0.2),
            result(Dimension::Authors, 1.0),
            result(Dimension::Year, 1.0),
            ScorerResult::missing(Dimension::Doi),
        ]);
        assert!(!verdict.is_duplicate);
        assert!(verdict.reason.starts_with("score 0.58: authors 0.30"));
    }

    #[test]
    fn test_abstract_only_counts_when_present() {
        let missing = classifier().classify(vec![
            result(Dimension::Title, 1.0),
            ScorerResult::missing(Dimension::Abstract),
        ]);
        // only the title is active
        assert_eq!(missing.score, 1.0);

        let present = classifier().classify(vec![
            result(Dimension::Title, 1.0),
            result(Dimension::Abstract, 0.0),
        ]);
        assert!((present.score - 0.4 / 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_no_active_weights_is_not_duplicate() {
        let mut weights = Weights::default();
        for dimension in Dimension::ALL {
            weights.set(dimension, 0.0);
        }
        let verdict = Classifier::new(weights, 0.0).classify(vec![result(Dimension::Title, 1.0)]);
        assert!(!verdict.is_duplicate);
        assert_eq!(verdict.reason, "score 0.00: no contributing fields");
    }

    #[test]
    fn test_neutral_doi_is_not_a_match() {
        let verdict = classifier().classify(vec![ScorerResult {
            score: NEUTRAL_SCORE,
            ..ScorerResult::missing(Dimension::Doi)
        }]);
        assert_eq!(verdict.reason, "score 0.50: doi 0.10");
    }
}
