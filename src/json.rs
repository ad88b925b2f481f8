//! JSON codec.
//!
//! A library is a JSON array of references, written with tab indentation.

use crate::{LibraryCodec, LibraryError, Reference, Result};
use nanoid::nanoid;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

#[derive(Debug, Clone, Default)]
pub struct JsonCodec;

impl JsonCodec {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Serializes any value as tab-indented JSON.
pub fn to_tab_indented<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"\t"));
    value
        .serialize(&mut serializer)
        .map_err(|e| LibraryError::Write(e.to_string()))?;
    String::from_utf8(out).map_err(|e| LibraryError::Write(e.to_string()))
}

impl LibraryCodec for JsonCodec {
    /// Accepts an array of references or a single reference object.
    fn parse(&self, input: &str) -> Result<Vec<Reference>> {
        if input.trim().is_empty() {
            return Ok(Vec::new());
        }
        let value: serde_json::Value = serde_json::from_str(input)?;
        let mut references: Vec<Reference> = if value.is_array() {
            serde_json::from_value(value)?
        } else {
            vec![serde_json::from_value(value)?]
        };
        for reference in references.iter_mut().filter(|r| r.id.is_empty()) {
            reference.id = nanoid!();
        }
        Ok(references)
    }

    fn write(&self, references: &[Reference]) -> Result<String> {
        to_tab_indented(references)
    }
}
