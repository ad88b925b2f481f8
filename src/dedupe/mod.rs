//! Reference deduplication engine.
//!
//! Compares every candidate pair of a reference set, scores each pair field by
//! field, classifies it as duplicate or distinct and resolves the duplicates
//! according to a [`ResolutionPolicy`].
//!
//! ## Pipeline
//!
//! 1. Each reference is normalized once ([`NormalizedFields`]).
//! 2. Candidate pairs `(i, j)` with `i < j` are visited in ascending `i`, then
//!    ascending `j`. With a [`BlockingKey`] only pairs sharing a key are visited.
//! 3. Every [`FieldScorer`] scores the pair on one [`Dimension`].
//! 4. The [`Classifier`] combines the scores into a [`Verdict`].
//! 5. Duplicate verdicts are streamed as [`DedupeEvent::DuplicatePair`] and fed
//!    to the resolution policy; the run ends with exactly one terminal event.
//!
//! ## Usage
//!
//! ```rust
//! use refdedupe::{Author, Reference};
//! use refdedupe::dedupe::{CancellationToken, DedupeEvent, Deduplicator};
//!
//! let smith = Author { family_name: "Smith".into(), given_name: "J".into() };
//! let references = vec![
//!     Reference { title: "Machine Learning Basics".into(), authors: vec![smith.clone()], year: Some(2023), ..Default::default() },
//!     Reference { title: "Machine Learning Basics.".into(), authors: vec![smith], year: Some(2023), ..Default::default() },
//!     Reference { title: "Unrelated Topic".into(), ..Default::default() },
//! ];
//!
//! let deduplicator = Deduplicator::new();
//! for event in deduplicator.compare(references, CancellationToken::new()).unwrap() {
//!     match event {
//!         DedupeEvent::DuplicatePair(pair) => {
//!             println!("#{} duplicates #{}: {}", pair.later.index, pair.earlier.index, pair.verdict.reason);
//!         }
//!         DedupeEvent::End(result) => assert_eq!(result.duplicates_found, 1),
//!         _ => {}
//!     }
//! }
//! ```
//!
//! ## Tuning
//!
//! The weight table and the threshold are the tunable surface of the engine.
//! The defaults are a reasonable starting point, not a calibrated model; check
//! them against a labelled library before relying on them.

mod classifier;
mod engine;
pub mod resolution;
mod scorers;

use crate::error::{DedupeError, ScorerError};
use crate::utils::normalize_surname;
use crate::Reference;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

pub use classifier::{Classifier, Verdict};
pub use engine::{
    CancellationToken, Comparison, DedupeEvent, DuplicatePair, ProgressSnapshot, RecordRef,
    RunOutcome, RunResult,
};
pub use resolution::{ResolutionPolicy, Resolver};
pub use scorers::{
    AbstractScorer, AuthorScorer, Candidate, DoiScorer, FieldScorer, JournalScorer,
    NEUTRAL_SCORE, NormalizedFields, ScorerResult, TitleScorer, YearScorer, text_similarity,
};

/// One field along which two references are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Title,
    Authors,
    Year,
    Doi,
    Abstract,
    Journal,
}

impl Dimension {
    /// All dimensions, in scoring order.
    pub const ALL: [Dimension; 6] = [
        Dimension::Title,
        Dimension::Authors,
        Dimension::Year,
        Dimension::Doi,
        Dimension::Abstract,
        Dimension::Journal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Title => "title",
            Dimension::Authors => "authors",
            Dimension::Year => "year",
            Dimension::Doi => "doi",
            Dimension::Abstract => "abstract",
            Dimension::Journal => "journal",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = DedupeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        Dimension::ALL
            .into_iter()
            .find(|dimension| dimension.as_str() == name)
            .ok_or_else(|| DedupeError::UnknownDimension(s.to_string()))
    }
}

/// Weight of each dimension in the classifier's weighted score.
///
/// The abstract weight only counts when both references carry an abstract.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub title: f64,
    pub authors: f64,
    pub year: f64,
    pub doi: f64,
    #[serde(rename = "abstract")]
    pub abstract_text: f64,
    pub journal: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            title: 0.4,
            authors: 0.3,
            year: 0.1,
            doi: 0.2,
            abstract_text: 0.1,
            journal: 0.0,
        }
    }
}

impl Weights {
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Title => self.title,
            Dimension::Authors => self.authors,
            Dimension::Year => self.year,
            Dimension::Doi => self.doi,
            Dimension::Abstract => self.abstract_text,
            Dimension::Journal => self.journal,
        }
    }

    pub fn set(&mut self, dimension: Dimension, weight: f64) -> &mut Self {
        let slot = match dimension {
            Dimension::Title => &mut self.title,
            Dimension::Authors => &mut self.authors,
            Dimension::Year => &mut self.year,
            Dimension::Doi => &mut self.doi,
            Dimension::Abstract => &mut self.abstract_text,
            Dimension::Journal => &mut self.journal,
        };
        *slot = weight;
        self
    }

    fn validate(&self) -> Result<(), DedupeError> {
        for dimension in Dimension::ALL {
            let value = self.get(dimension);
            if !(0.0..=1.0).contains(&value) {
                return Err(DedupeError::InvalidWeight { dimension, value });
            }
        }
        Ok(())
    }
}

fn panic_message<'a>(payload: &'a (dyn Any + Send + 'static)) -> &'a str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause")
}

type KeyFn = dyn Fn(&Reference) -> String + Send + Sync;

/// Groups references into buckets; only references in the same bucket are compared.
///
/// Blocking is an explicit approximation: duplicates whose keys differ (a
/// misspelled first author, a year off by one) are never compared and
/// therefore never found. It is off unless configured.
#[derive(Clone)]
pub struct BlockingKey {
    name: String,
    key: Arc<KeyFn>,
}

impl BlockingKey {
    pub const FIRST_AUTHOR_YEAR: &'static str = "first_author_year";

    pub fn new(
        name: impl Into<String>,
        key: impl Fn(&Reference) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            key: Arc::new(key),
        }
    }

    /// Normalized surname of the first author plus the publication year.
    pub fn first_author_year() -> Self {
        Self::new(Self::FIRST_AUTHOR_YEAR, |reference: &Reference| {
            let surname = reference
                .authors
                .first()
                .map(|author| normalize_surname(&author.family_name))
                .unwrap_or_default();
            let year = reference.year.map(|y| y.to_string()).unwrap_or_default();
            format!("{surname}|{year}")
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_for(&self, reference: &Reference) -> String {
        (self.key)(reference)
    }
}

impl fmt::Debug for BlockingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingKey")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl FromStr for BlockingKey {
    type Err = DedupeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            Self::FIRST_AUTHOR_YEAR => Ok(Self::first_author_year()),
            other => Err(DedupeError::ConfigError(format!(
                "Unknown blocking key: {other}"
            ))),
        }
    }
}

impl Serialize for BlockingKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

impl<'de> Deserialize<'de> for BlockingKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Configuration options for a deduplication run.
///
/// # Examples
///
/// ```
/// use refdedupe::dedupe::{BlockingKey, DeduplicatorConfig, ResolutionPolicy};
///
/// let config = DeduplicatorConfig {
///     threshold: 0.8,
///     blocking: Some(BlockingKey::first_author_year()),
///     batch_size: 500,
///     policy: ResolutionPolicy::Mark,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
///
/// # Performance Impact
///
/// - `blocking`: reduces comparisons to pairs within a bucket, at the cost of recall
/// - `run_in_parallel`: scores the pairs of each batch on the rayon pool; only
///   worthwhile with a `batch_size` in the hundreds or more
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeduplicatorConfig {
    pub weights: Weights,
    /// Minimum weighted score for a duplicate verdict.
    pub threshold: f64,
    /// Maximum year difference still scored as equal.
    pub year_tolerance: u32,
    /// Optional blocking key; `None` compares all pairs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocking: Option<BlockingKey>,
    /// Number of comparisons between progress events and cancellation checks.
    pub batch_size: usize,
    /// What happens to duplicates once found.
    pub policy: ResolutionPolicy,
    /// Score the pairs of a batch in parallel.
    pub run_in_parallel: bool,
}

impl Default for DeduplicatorConfig {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
            threshold: 0.75,
            year_tolerance: 0,
            blocking: None,
            batch_size: 1,
            policy: ResolutionPolicy::Count,
            run_in_parallel: false,
        }
    }
}

impl DeduplicatorConfig {
    /// Checks weights, threshold and batch size.
    ///
    /// # Errors
    ///
    /// Returns the first offending setting as a `DedupeError`.
    pub fn validate(&self) -> Result<(), DedupeError> {
        self.weights.validate()?;
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(DedupeError::InvalidThreshold(self.threshold));
        }
        if self.batch_size == 0 {
            return Err(DedupeError::InvalidBatchSize);
        }
        Ok(())
    }
}

/// Deduplication engine.
///
/// Holds a validated configuration, the scorers and the classifier. It keeps
/// no state between runs; each call to [`Deduplicator::compare`] is independent.
///
/// # Examples
///
/// ```
/// use refdedupe::dedupe::{Deduplicator, DeduplicatorConfig};
///
/// let deduplicator = Deduplicator::new();
///
/// let config = DeduplicatorConfig { threshold: 0.9, ..Default::default() };
/// let strict = Deduplicator::with_config(config).unwrap();
/// assert_eq!(strict.config().threshold, 0.9);
/// ```
///
/// # Performance
///
/// - Time complexity: O(n²) comparisons without blocking
/// - With blocking: O(Σ n_b²) where n_b is the size of each bucket
#[derive(Debug)]
pub struct Deduplicator {
    config: DeduplicatorConfig,
    classifier: Classifier,
    scorers: Vec<Box<dyn FieldScorer>>,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Deduplicator {
    /// Creates a deduplicator with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(DeduplicatorConfig::default())
    }

    /// Creates a deduplicator with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns `DedupeError` when the configuration is invalid.
    pub fn with_config(config: DeduplicatorConfig) -> Result<Self, DedupeError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: DeduplicatorConfig) -> Self {
        let scorers: Vec<Box<dyn FieldScorer>> = vec![
            Box::new(TitleScorer),
            Box::new(AuthorScorer),
            Box::new(YearScorer::new(config.year_tolerance)),
            Box::new(DoiScorer),
            Box::new(AbstractScorer),
            Box::new(JournalScorer),
        ];
        Self {
            classifier: Classifier::new(config.weights, config.threshold),
            config,
            scorers,
        }
    }

    /// Replaces the scorer for `scorer.dimension()` with a custom one.
    #[must_use]
    pub fn with_scorer(mut self, scorer: impl FieldScorer + 'static) -> Self {
        let dimension = scorer.dimension();
        self.scorers.retain(|existing| existing.dimension() != dimension);
        self.scorers.push(Box::new(scorer));
        self.scorers.sort_by_key(|s| s.dimension());
        self
    }

    pub fn config(&self) -> &DeduplicatorConfig {
        &self.config
    }

    /// Scores one pair with every scorer and classifies it.
    ///
    /// A scorer that panics is reported like one that returns an error.
    ///
    /// # Errors
    ///
    /// Returns the first `ScorerError` raised by a scorer.
    pub fn judge(
        &self,
        earlier: &Candidate<'_>,
        later: &Candidate<'_>,
    ) -> Result<Verdict, ScorerError> {
        let scores = self
            .scorers
            .iter()
            .map(|scorer| {
                panic::catch_unwind(AssertUnwindSafe(|| scorer.score(earlier, later)))
                    .unwrap_or_else(|payload| {
                        Err(ScorerError::new(
                            scorer.dimension(),
                            format!("panicked: {}", panic_message(payload.as_ref())),
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.classifier.classify(scores))
    }

    /// Starts a run over `records`, returning a lazy sequence of events.
    ///
    /// The records are owned by the run and handed back, resolved, in the
    /// terminal event.
    ///
    /// # Errors
    ///
    /// Returns `DedupeError::TooFewRecords` for fewer than two records. No
    /// events are produced in that case.
    pub fn compare(
        &self,
        records: Vec<Reference>,
        cancel: CancellationToken,
    ) -> Result<Comparison<'_>, DedupeError> {
        if records.len() < 2 {
            return Err(DedupeError::TooFewRecords(records.len()));
        }
        debug!(
            records = records.len(),
            policy = %self.config.policy,
            blocking = self.config.blocking.as_ref().map(BlockingKey::name),
            "starting deduplication run"
        );
        Ok(Comparison::new(self, records, cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("title", Dimension::Title)]
    #[case("Authors", Dimension::Authors)]
    #[case(" doi ", Dimension::Doi)]
    #[case("abstract", Dimension::Abstract)]
    fn test_dimension_from_str(#[case] input: &str, #[case] expected: Dimension) {
        assert_eq!(input.parse::<Dimension>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_dimension() {
        assert_eq!(
            "colour".parse::<Dimension>(),
            Err(DedupeError::UnknownDimension("colour".to_string()))
        );
    }

    #[test]
    fn test_default_weights() {
        let weights = Weights::default();
        assert_eq!(weights.get(Dimension::Title), 0.4);
        assert_eq!(weights.get(Dimension::Authors), 0.3);
        assert_eq!(weights.get(Dimension::Year), 0.1);
        assert_eq!(weights.get(Dimension::Doi), 0.2);
        assert_eq!(weights.get(Dimension::Journal), 0.0);
    }

    #[rstest]
    #[case(DeduplicatorConfig { threshold: 1.2, ..Default::default() }, DedupeError::InvalidThreshold(1.2))]
    #[case(DeduplicatorConfig { threshold: -0.1, ..Default::default() }, DedupeError::InvalidThreshold(-0.1))]
    #[case(DeduplicatorConfig { batch_size: 0, ..Default::default() }, DedupeError::InvalidBatchSize)]
    fn test_invalid_config(#[case] config: DeduplicatorConfig, #[case] expected: DedupeError) {
        assert_eq!(config.validate(), Err(expected));
    }

    #[test]
    fn test_invalid_weight() {
        let mut config = DeduplicatorConfig::default();
        config.weights.set(Dimension::Year, 2.0);
        assert_eq!(
            Deduplicator::with_config(config).err(),
            Some(DedupeError::InvalidWeight {
                dimension: Dimension::Year,
                value: 2.0
            })
        );
    }

    #[test]
    fn test_too_few_records() {
        let deduplicator = Deduplicator::new();
        let result = deduplicator.compare(vec![Reference::default()], CancellationToken::new());
        assert_eq!(result.err(), Some(DedupeError::TooFewRecords(1)));
    }

    #[test]
    fn test_config_from_json() {
        let config: DeduplicatorConfig = serde_json::from_str(
            r#"{"threshold": 0.8, "weights": {"title": 0.5}, "policy": "remove", "blocking": "first_author_year"}"#,
        )
        .unwrap();
        assert_eq!(config.threshold, 0.8);
        assert_eq!(config.weights.title, 0.5);
        assert_eq!(config.weights.authors, 0.3);
        assert_eq!(config.policy, ResolutionPolicy::Remove);
        assert_eq!(config.blocking.unwrap().name(), "first_author_year");
        assert_eq!(config.batch_size, 1);
    }

    #[test]
    fn test_config_rejects_unknown_policy() {
        let result = serde_json::from_str::<DeduplicatorConfig>(r#"{"policy": "merge"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_first_author_year_key() {
        let key = BlockingKey::first_author_year();
        let reference = Reference {
            authors: vec![crate::Author::parse("O'Brien, K")],
            year: Some(2021),
            ..Default::default()
        };
        assert_eq!(key.key_for(&reference), "obrien|2021");
        assert_eq!(key.key_for(&Reference::default()), "|");
    }

    #[derive(Debug)]
    struct ConstantTitle;

    impl FieldScorer for ConstantTitle {
        fn dimension(&self) -> Dimension {
            Dimension::Title
        }

        fn score(
            &self,
            _: &Candidate<'_>,
            _: &Candidate<'_>,
        ) -> Result<ScorerResult, crate::ScorerError> {
            Ok(ScorerResult::new(Dimension::Title, 1.0))
        }
    }

    #[test]
    fn test_with_scorer_replaces_dimension() {
        let deduplicator = Deduplicator::new().with_scorer(ConstantTitle);
        assert_eq!(deduplicator.scorers.len(), Dimension::ALL.len());
        let dimensions: Vec<_> = deduplicator.scorers.iter().map(|s| s.dimension()).collect();
        assert_eq!(dimensions, Dimension::ALL.to_vec());
    }
}
