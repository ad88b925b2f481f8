//! Read, deduplicate and convert bibliographic reference libraries.
//!
//! `refdedupe` loads reference libraries from several citation formats, finds
//! duplicate references with a configurable pairwise scoring engine, resolves
//! them (count, mark or remove) and writes the library back out.
//!
//! # Key Features
//!
//! - **Library formats**: read and write
//!   - RIS (Research Information Systems)
//!   - EndNote XML
//!   - CSV with configurable header mappings
//!   - JSON
//!
//! - **Deduplication engine**:
//!   - Per-field similarity scorers (title, authors, year, DOI, abstract, journal)
//!   - Weighted classifier with a DOI short-circuit
//!   - Deterministic all-pairs comparison with opt-in blocking
//!   - Progress events, cooperative cancellation, optional parallel scoring
//!
//! # Basic Usage
//!
//! ```rust
//! use refdedupe::{LibraryCodec, RisCodec};
//!
//! let input = r#"TY  - JOUR
//! TI  - Example Article
//! AU  - Smith, John
//! ER  -"#;
//!
//! let references = RisCodec::new().parse(input).unwrap();
//! assert_eq!(references[0].title, "Example Article");
//! ```
//!
//! # Deduplication
//!
//! ```rust
//! use refdedupe::Reference;
//! use refdedupe::dedupe::{CancellationToken, Deduplicator, DeduplicatorConfig, ResolutionPolicy};
//!
//! let references = vec![
//!     Reference { title: "Deep Learning for X".into(), year: Some(2020), ..Default::default() },
//!     Reference { title: "Deep Learning for X.".into(), year: Some(2020), ..Default::default() },
//! ];
//!
//! let config = DeduplicatorConfig {
//!     policy: ResolutionPolicy::Remove,
//!     ..Default::default()
//! };
//! let deduplicator = Deduplicator::with_config(config).unwrap();
//! let outcome = deduplicator
//!     .compare(references, CancellationToken::new())
//!     .unwrap()
//!     .finish();
//! assert_eq!(outcome.result.duplicates_found, 1);
//! assert_eq!(outcome.result.records.len(), 1);
//! ```
//!
//! # Error Handling
//!
//! Reading and writing return [`Result`], wrapping [`LibraryError`]. The
//! deduplication engine reports invalid input or configuration with
//! [`DedupeError`] before any comparison takes place.

use serde::{Deserialize, Serialize};

#[cfg(feature = "csv")]
pub mod csv;
pub mod dedupe;
#[cfg(feature = "xml")]
pub mod endnote_xml;
mod error;
pub mod format;
pub mod json;
mod regex;
pub mod ris;
mod utils;

// Reexports
#[cfg(feature = "csv")]
pub use csv::CsvCodec;
#[cfg(feature = "xml")]
pub use endnote_xml::EndNoteXmlCodec;
pub use error::{DedupeError, LibraryError, Result, ScorerError};
pub use format::{Format, read_file, write_file};
pub use json::JsonCodec;
pub use ris::RisCodec;

/// An author of a reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    /// The author's family name (surname)
    pub family_name: String,
    /// The author's given name(s) or initials
    #[serde(default)]
    pub given_name: String,
}

impl Author {
    /// Builds an author from a free-form name such as `"Smith, John"` or `"Smith J"`.
    pub fn parse(name: &str) -> Self {
        let (family_name, given_name) = utils::parse_author_name(name);
        Self {
            family_name,
            given_name,
        }
    }

    /// Renders the author as `"Family, Given"`, or just the family name.
    pub fn display_name(&self) -> String {
        if self.given_name.is_empty() {
            self.family_name.clone()
        } else {
            format!("{}, {}", self.family_name, self.given_name)
        }
    }
}

/// A single bibliographic reference.
///
/// Within a deduplication run a reference is identified by its position in the
/// input; [`Reference::stable_id`] names it in annotations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reference {
    pub id: String,
    /// Record number assigned by the originating library
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rec_number: Option<u64>,
    /// Type of the reference, e.g. `JOUR` or `Journal Article`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_type: Option<String>,
    pub title: String,
    pub authors: Vec<Author>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Journal or other container title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<String>,
    /// Digital Object Identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    /// ISSN or ISBN values
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub isbn: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Free-text annotation; the `mark` policy writes duplicate markers here
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Set by the `remove` policy; flagged references are filtered out at the end of a run
    #[serde(skip)]
    pub deleted: bool,
}

impl Reference {
    /// The identifier used to point at this reference from another one:
    /// the record number when known, otherwise the generated id.
    pub fn stable_id(&self) -> String {
        match self.rec_number {
            Some(number) => number.to_string(),
            None => self.id.clone(),
        }
    }
}

/// A codec that turns library text into references and back.
pub trait LibraryCodec {
    /// Parse a string containing zero or more references.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError` if the input is malformed
    fn parse(&self, input: &str) -> Result<Vec<Reference>>;

    /// Serialize references into the codec's format.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError` if the output could not be produced
    fn write(&self, references: &[Reference]) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_author_parse() {
        let author = Author::parse("Smith, John");
        assert_eq!(author.family_name, "Smith");
        assert_eq!(author.given_name, "John");
        assert_eq!(author.display_name(), "Smith, John");
        assert_eq!(Author::parse("Plato").display_name(), "Plato");
    }

    #[test]
    fn test_stable_id_prefers_rec_number() {
        let mut reference = Reference {
            id: "abc".to_string(),
            ..Default::default()
        };
        assert_eq!(reference.stable_id(), "abc");
        reference.rec_number = Some(42);
        assert_eq!(reference.stable_id(), "42");
    }

    #[test]
    fn test_deleted_flag_is_not_serialized() {
        let reference = Reference {
            id: "x".to_string(),
            title: "T".to_string(),
            deleted: true,
            ..Default::default()
        };
        let json = serde_json::to_string(&reference).unwrap();
        assert!(!json.contains("deleted"));
        let back: Reference = serde_json::from_str(&json).unwrap();
        assert!(!back.deleted);
        assert_eq!(back.title, "T");
    }
}
