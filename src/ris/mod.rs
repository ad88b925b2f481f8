//! RIS format codec.
//!
//! Reads and writes the tagged-line RIS format exported by most reference
//! managers and databases.
//!
//! # Example
//!
//! ```
//! use refdedupe::{LibraryCodec, RisCodec};
//!
//! let input = r#"TY  - JOUR
//! TI  - Example Title
//! AU  - Smith, John
//! ER  -"#;
//!
//! let codec = RisCodec::new();
//! let references = codec.parse(input).unwrap();
//! assert_eq!(references[0].title, "Example Title");
//! assert!(codec.write(&references).unwrap().starts_with("TY  - JOUR\nTI  - Example Title\n"));
//! ```

mod parse;
mod tags;
mod write;

use crate::{LibraryCodec, LibraryError, Reference, Result};
use parse::ris_parse;
use write::write_reference;

/// Codec for RIS libraries.
///
/// RIS is a standardized format for bibliographic references that uses two-letter
/// tags at the start of each line to denote different fields.
#[derive(Debug, Clone, Default)]
pub struct RisCodec;

impl RisCodec {
    /// Creates a new RIS codec instance.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LibraryCodec for RisCodec {
    /// Parses a string containing one or more references in RIS format.
    ///
    /// Blank input yields no references.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError` if the input has content but no references, or if
    /// a field value cannot be interpreted
    fn parse(&self, input: &str) -> Result<Vec<Reference>> {
        let raw_references = ris_parse(input);
        if raw_references.is_empty() && !input.trim().is_empty() {
            return Err(LibraryError::InvalidFormat(
                "No valid RIS references found".into(),
            ));
        }

        raw_references.into_iter().map(Reference::try_from).collect()
    }

    fn write(&self, references: &[Reference]) -> Result<String> {
        let mut out = String::new();
        for reference in references {
            write_reference(&mut out, reference);
        }
        Ok(out)
    }
}
