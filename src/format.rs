//! Library format selection and file helpers.

use crate::{JsonCodec, LibraryCodec, LibraryError, Reference, Result, RisCodec};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// A reference library format with a codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ris,
    #[cfg(feature = "xml")]
    EndNoteXml,
    #[cfg(feature = "csv")]
    Csv,
    Json,
}

impl Format {
    /// Every format compiled into this build.
    pub const ALL: &'static [Format] = &[
        Format::Ris,
        #[cfg(feature = "xml")]
        Format::EndNoteXml,
        #[cfg(feature = "csv")]
        Format::Csv,
        Format::Json,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Format::Ris => "ris",
            #[cfg(feature = "xml")]
            Format::EndNoteXml => "endnotexml",
            #[cfg(feature = "csv")]
            Format::Csv => "csv",
            Format::Json => "json",
        }
    }

    fn extensions(self) -> &'static [&'static str] {
        match self {
            Format::Ris => &["ris"],
            #[cfg(feature = "xml")]
            Format::EndNoteXml => &["xml"],
            #[cfg(feature = "csv")]
            Format::Csv => &["csv"],
            Format::Json => &["json"],
        }
    }

    /// Identifies a format from a file name's extension, case-insensitively.
    pub fn identify(path: impl AsRef<Path>) -> Option<Format> {
        let extension = path.as_ref().extension()?.to_str()?.to_lowercase();
        Format::ALL
            .iter()
            .copied()
            .find(|format| format.extensions().contains(&extension.as_str()))
    }

    pub fn codec(self) -> Box<dyn LibraryCodec> {
        match self {
            Format::Ris => Box::new(RisCodec::new()),
            #[cfg(feature = "xml")]
            Format::EndNoteXml => Box::new(crate::EndNoteXmlCodec::new()),
            #[cfg(feature = "csv")]
            Format::Csv => Box::new(crate::CsvCodec::new()),
            Format::Json => Box::new(JsonCodec::new()),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_lowercase();
        Format::ALL
            .iter()
            .copied()
            .find(|format| format.name() == name)
            .ok_or_else(|| LibraryError::UnknownFormat(s.to_string()))
    }
}

/// Reads a library file, choosing the codec from its extension.
///
/// # Errors
///
/// Returns `LibraryError::UnknownFormat` for unrecognized extensions, or any
/// I/O or parse error of the file.
pub fn read_file(path: impl AsRef<Path>) -> Result<Vec<Reference>> {
    let path = path.as_ref();
    let format = Format::identify(path)
        .ok_or_else(|| LibraryError::UnknownFormat(path.display().to_string()))?;
    let content = std::fs::read_to_string(path)?;
    let references = format.codec().parse(&content)?;
    debug!(path = %path.display(), %format, count = references.len(), "read library");
    Ok(references)
}

/// Writes a library file, choosing the codec from its extension.
///
/// # Errors
///
/// Returns `LibraryError::UnknownFormat` for unrecognized extensions, or any
/// I/O or serialization error.
pub fn write_file(path: impl AsRef<Path>, references: &[Reference]) -> Result<()> {
    let path = path.as_ref();
    let format = Format::identify(path)
        .ok_or_else(|| LibraryError::UnknownFormat(path.display().to_string()))?;
    std::fs::write(path, format.codec().write(references)?)?;
    debug!(path = %path.display(), %format, count = references.len(), "wrote library");
    Ok(())
}
