//! Field similarity scorers.
//!
//! Every scorer is a pure function of two references returning a score in
//! `[0, 1]`. A field missing on either side yields [`NEUTRAL_SCORE`] instead of
//! a mismatch.

use super::Dimension;
use crate::utils::{format_doi, normalize_journal, normalize_surname, normalize_text};
use crate::{Reference, ScorerError};
use std::collections::HashSet;
use std::fmt;
use strsim::normalized_levenshtein;

/// Score reported when a field is absent on at least one side.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// The score of one pair along one dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct ScorerResult {
    pub dimension: Dimension,
    /// Similarity in `[0, 1]`
    pub score: f64,
    /// `false` when the field was missing on either side and the score is neutral
    pub both_present: bool,
    /// Short explanation, e.g. `title levenshtein ratio 0.92`
    pub reason: Option<String>,
}

impl ScorerResult {
    pub fn new(dimension: Dimension, score: f64) -> Self {
        Self {
            dimension,
            score,
            both_present: true,
            reason: None,
        }
    }

    /// The neutral result for a field missing on either side.
    pub fn missing(dimension: Dimension) -> Self {
        Self {
            dimension,
            score: NEUTRAL_SCORE,
            both_present: false,
            reason: Some(format!("{dimension} missing")),
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Normalized copies of the fields the scorers read, computed once per run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedFields {
    pub title: Option<String>,
    pub surnames: Vec<String>,
    pub year: Option<i32>,
    pub doi: Option<String>,
    pub abstract_text: Option<String>,
    pub journal: Option<String>,
}

impl NormalizedFields {
    pub fn from_reference(reference: &Reference) -> Self {
        let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };
        Self {
            title: non_empty(normalize_text(&reference.title)),
            surnames: reference
                .authors
                .iter()
                .map(|author| normalize_surname(&author.family_name))
                .filter(|surname| !surname.is_empty())
                .collect(),
            year: reference.year,
            doi: reference.doi.as_deref().and_then(format_doi),
            abstract_text: reference
                .abstract_text
                .as_deref()
                .map(normalize_text)
                .and_then(non_empty),
            journal: reference
                .journal
                .as_deref()
                .map(normalize_journal)
                .and_then(non_empty),
        }
    }
}

/// A reference as seen by the scorers: its position, the raw record and its normalized fields.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub index: usize,
    pub reference: &'a Reference,
    pub fields: &'a NormalizedFields,
}

/// Scores the similarity of two references along one dimension.
///
/// Implementations must be pure: no side effects and no shared mutable state,
/// so pairs can be scored in any order and on any thread.
pub trait FieldScorer: Send + Sync + fmt::Debug {
    fn dimension(&self) -> Dimension;

    /// # Errors
    ///
    /// A `ScorerError` marks this pair as distinct; the run continues.
    fn score(&self, a: &Candidate<'_>, b: &Candidate<'_>) -> Result<ScorerResult, ScorerError>;
}

/// Normalized Levenshtein similarity of two normalized strings.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b)
}

fn score_text(dimension: Dimension, a: Option<&str>, b: Option<&str>) -> ScorerResult {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ratio = text_similarity(a, b);
            ScorerResult::new(dimension, ratio)
                .with_reason(format!("{dimension} levenshtein ratio {ratio:.2}"))
        }
        _ => ScorerResult::missing(dimension),
    }
}

/// Case-insensitive, punctuation-free edit-distance ratio of the titles.
#[derive(Debug, Clone, Copy, Default)]
pub struct TitleScorer;

impl FieldScorer for TitleScorer {
    fn dimension(&self) -> Dimension {
        Dimension::Title
    }

    fn score(&self, a: &Candidate<'_>, b: &Candidate<'_>) -> Result<ScorerResult, ScorerError> {
        Ok(score_text(
            Dimension::Title,
            a.fields.title.as_deref(),
            b.fields.title.as_deref(),
        ))
    }
}

/// Overlap of normalized surnames: shared surnames over the shorter list.
///
/// Order is ignored and a truncated list ("Smith et al.") is not penalized
/// for its missing names.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorScorer;

impl FieldScorer for AuthorScorer {
    fn dimension(&self) -> Dimension {
        Dimension::Authors
    }

    fn score(&self, a: &Candidate<'_>, b: &Candidate<'_>) -> Result<ScorerResult, ScorerError> {
        let left: HashSet<&str> = a.fields.surnames.iter().map(String::as_str).collect();
        let right: HashSet<&str> = b.fields.surnames.iter().map(String::as_str).collect();
        if left.is_empty() || right.is_empty() {
            return Ok(ScorerResult::missing(Dimension::Authors));
        }

        let shared = left.intersection(&right).count();
        let shorter = left.len().min(right.len());
        Ok(
            ScorerResult::new(Dimension::Authors, shared as f64 / shorter as f64)
                .with_reason(format!("authors {shared}/{shorter} surnames shared")),
        )
    }
}

/// Publication years equal within a tolerance.
#[derive(Debug, Clone, Copy, Default)]
pub struct YearScorer {
    tolerance: u32,
}

impl YearScorer {
    pub fn new(tolerance: u32) -> Self {
        Self { tolerance }
    }
}

impl FieldScorer for YearScorer {
    fn dimension(&self) -> Dimension {
        Dimension::Year
    }

    fn score(&self, a: &Candidate<'_>, b: &Candidate<'_>) -> Result<ScorerResult, ScorerError> {
        let (Some(left), Some(right)) = (a.fields.year, b.fields.year) else {
            return Ok(ScorerResult::missing(Dimension::Year));
        };
        let result = if left.abs_diff(right) <= self.tolerance {
            ScorerResult::new(Dimension::Year, 1.0)
        } else {
            ScorerResult::new(Dimension::Year, 0.0)
        };
        Ok(result.with_reason(format!("year {left} vs {right}")))
    }
}

/// Exact match of normalized DOIs.
///
/// The classifier treats a 1.0 from this scorer as a duplicate on its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoiScorer;

impl FieldScorer for DoiScorer {
    fn dimension(&self) -> Dimension {
        Dimension::Doi
    }

    fn score(&self, a: &Candidate<'_>, b: &Candidate<'_>) -> Result<ScorerResult, ScorerError> {
        Ok(match (&a.fields.doi, &b.fields.doi) {
            (Some(left), Some(right)) if left == right => {
                ScorerResult::new(Dimension::Doi, 1.0).with_reason("doi match")
            }
            (Some(_), Some(_)) => ScorerResult::new(Dimension::Doi, 0.0).with_reason("doi differs"),
            _ => ScorerResult::missing(Dimension::Doi),
        })
    }
}

/// Same measure as [`TitleScorer`], applied to abstracts.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbstractScorer;

impl FieldScorer for AbstractScorer {
    fn dimension(&self) -> Dimension {
        Dimension::Abstract
    }

    fn score(&self, a: &Candidate<'_>, b: &Candidate<'_>) -> Result<ScorerResult, ScorerError> {
        Ok(score_text(
            Dimension::Abstract,
            a.fields.abstract_text.as_deref(),
            b.fields.abstract_text.as_deref(),
        ))
    }
}

/// Equality of normalized journal names.
#[derive(Debug, Clone, Copy, Default)]
pub struct JournalScorer;

impl FieldScorer for JournalScorer {
    fn dimension(&self) -> Dimension {
        Dimension::Journal
    }

    fn score(&self, a: &Candidate<'_>, b: &Candidate<'_>) -> Result<ScorerResult, ScorerError> {
        Ok(match (&a.fields.journal, &b.fields.journal) {
            (Some(left), Some(right)) if left == right => {
                ScorerResult::new(Dimension::Journal, 1.0).with_reason("journal match")
            }
            (Some(_), Some(_)) => {
                ScorerResult::new(Dimension::Journal, 0.0).with_reason("journal differs")
            }
            _ => ScorerResult::missing(Dimension::Journal),
        })
    }
}
