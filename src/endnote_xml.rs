//! EndNote XML format codec.
//!
//! # Example
//!
//! ```
//! use refdedupe::{EndNoteXmlCodec, LibraryCodec};
//!
//! let input = r#"<?xml version="1.0" encoding="UTF-8"?>
//! <xml><records><record>
//! <rec-number>4</rec-number>
//! <titles><title>Example Title</title></titles>
//! <contributors><authors><author>Smith, John</author></authors></contributors>
//! </record></records></xml>"#;
//!
//! let references = EndNoteXmlCodec::new().parse(input).unwrap();
//! assert_eq!(references[0].title, "Example Title");
//! assert_eq!(references[0].rec_number, Some(4));
//! ```

mod parse;
mod write;

use crate::{LibraryCodec, Reference, Result};
use parse::parse_endnote_xml;
use write::write_endnote_xml;

/// Codec for EndNote XML libraries.
#[derive(Debug, Default, Clone)]
pub struct EndNoteXmlCodec;

impl EndNoteXmlCodec {
    /// Creates a new EndNote XML codec instance.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LibraryCodec for EndNoteXmlCodec {
    fn parse(&self, input: &str) -> Result<Vec<Reference>> {
        parse_endnote_xml(input)
    }

    fn write(&self, references: &[Reference]) -> Result<String> {
        write_endnote_xml(references)
    }
}
