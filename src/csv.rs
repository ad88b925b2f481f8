//! CSV format codec.
//!
//! Columns are matched to reference fields through case-insensitive header
//! aliases, which can be customized with [`CsvConfig`].
//!
//! # Example
//!
//! ```
//! use refdedupe::{CsvCodec, LibraryCodec};
//!
//! let input = "Title,Author,Year\nExample Paper,Smith J,2023";
//!
//! let references = CsvCodec::new().parse(input).unwrap();
//! assert_eq!(references[0].title, "Example Paper");
//! assert_eq!(references[0].year, Some(2023));
//! ```

use ::csv::{ReaderBuilder, StringRecord, WriterBuilder};
use nanoid::nanoid;
use std::collections::HashMap;

use crate::utils::{format_doi, format_page_numbers, parse_year};
use crate::{Author, LibraryCodec, LibraryError, Reference, Result};

/// Separator for multi-valued cells (authors, keywords, URLs, ISBNs).
const LIST_SEPARATOR: &str = "; ";

/// Reference fields a CSV column can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CsvField {
    Id,
    RecNumber,
    RefType,
    Title,
    Authors,
    Year,
    Journal,
    Volume,
    Issue,
    Pages,
    Doi,
    Abstract,
    Keywords,
    Urls,
    Isbn,
    Label,
    Caption,
}

impl CsvField {
    /// Column order used when writing.
    pub const ALL: [CsvField; 17] = [
        CsvField::Id,
        CsvField::RecNumber,
        CsvField::RefType,
        CsvField::Title,
        CsvField::Authors,
        CsvField::Year,
        CsvField::Journal,
        CsvField::Volume,
        CsvField::Issue,
        CsvField::Pages,
        CsvField::Doi,
        CsvField::Abstract,
        CsvField::Keywords,
        CsvField::Urls,
        CsvField::Isbn,
        CsvField::Label,
        CsvField::Caption,
    ];

    /// Header written for this field.
    pub fn header(self) -> &'static str {
        match self {
            CsvField::Id => "id",
            CsvField::RecNumber => "rec_number",
            CsvField::RefType => "type",
            CsvField::Title => "title",
            CsvField::Authors => "authors",
            CsvField::Year => "year",
            CsvField::Journal => "journal",
            CsvField::Volume => "volume",
            CsvField::Issue => "issue",
            CsvField::Pages => "pages",
            CsvField::Doi => "doi",
            CsvField::Abstract => "abstract",
            CsvField::Keywords => "keywords",
            CsvField::Urls => "url",
            CsvField::Isbn => "isbn",
            CsvField::Label => "label",
            CsvField::Caption => "caption",
        }
    }

    fn default_aliases(self) -> &'static [&'static str] {
        match self {
            CsvField::Id => &["id", "citation_id"],
            CsvField::RecNumber => &["rec_number", "rec-number", "record number"],
            CsvField::RefType => &["type", "reference type", "ref-type"],
            CsvField::Title => &["title", "article title", "publication title"],
            CsvField::Authors => &["author", "authors", "creator", "creators"],
            CsvField::Year => &["year", "publication year", "pub year"],
            CsvField::Journal => &["journal", "journal title", "source title", "publication"],
            CsvField::Volume => &["volume", "vol"],
            CsvField::Issue => &["issue", "number", "no"],
            CsvField::Pages => &["pages", "page numbers", "page range"],
            CsvField::Doi => &["doi", "digital object identifier"],
            CsvField::Abstract => &["abstract", "summary"],
            CsvField::Keywords => &["keywords", "tags"],
            CsvField::Urls => &["url", "urls", "link", "web link"],
            CsvField::Isbn => &["isbn", "issn"],
            CsvField::Label => &["label"],
            CsvField::Caption => &["caption", "notes"],
        }
    }
}

/// Configuration for CSV reading and writing.
///
/// # Examples
///
/// ```
/// use refdedupe::csv::{CsvConfig, CsvField};
///
/// let mut config = CsvConfig::new();
/// config
///     .set_header_mapping(CsvField::Title, vec!["Article Name".to_string()])
///     .set_delimiter(b';');
/// ```
#[derive(Debug, Clone)]
pub struct CsvConfig {
    header_map: HashMap<CsvField, Vec<String>>,
    delimiter: u8,
    has_header: bool,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvConfig {
    /// Creates a configuration with the default header aliases and `,` as delimiter.
    #[must_use]
    pub fn new() -> Self {
        let header_map = CsvField::ALL
            .into_iter()
            .map(|field| {
                let aliases = field.default_aliases().iter().map(|s| s.to_string());
                (field, aliases.collect())
            })
            .collect();
        Self {
            header_map,
            delimiter: b',',
            has_header: true,
        }
    }

    /// Replaces the aliases recognized for `field`.
    pub fn set_header_mapping(&mut self, field: CsvField, aliases: Vec<String>) -> &mut Self {
        self.header_map.insert(field, aliases);
        self
    }

    pub fn set_delimiter(&mut self, delimiter: u8) -> &mut Self {
        self.delimiter = delimiter;
        self
    }

    /// Without a header row, columns are read in [`CsvField::ALL`] order.
    pub fn set_has_header(&mut self, has_header: bool) -> &mut Self {
        self.has_header = has_header;
        self
    }

    /// Finds the field for a header. Fields are tried in column order so an
    /// alias shared by two fields resolves the same way every time.
    fn field_for_header(&self, header: &str) -> Option<CsvField> {
        let header = header.trim().to_lowercase();
        CsvField::ALL.into_iter().find(|field| {
            self.header_map
                .get(field)
                .is_some_and(|aliases| aliases.iter().any(|a| a.to_lowercase() == header))
        })
    }
}

/// Codec for CSV libraries.
#[derive(Debug, Clone, Default)]
pub struct CsvCodec {
    config: CsvConfig,
}

impl CsvCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: CsvConfig) -> Self {
        self.config = config;
        self
    }

    fn parse_record(&self, columns: &[Option<CsvField>], record: &StringRecord) -> Result<Reference> {
        let mut reference = Reference::default();

        for (field, value) in columns.iter().zip(record.iter()) {
            let (Some(field), value) = (field, value.trim()) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            match field {
                CsvField::Id => reference.id = value.to_string(),
                CsvField::RecNumber => {
                    reference.rec_number =
                        Some(value.parse().map_err(|_| LibraryError::InvalidFieldValue {
                            field: "rec_number".into(),
                            message: format!("expected a record number, got '{value}'"),
                        })?);
                }
                CsvField::RefType => reference.ref_type = Some(value.to_string()),
                CsvField::Title => reference.title = value.to_string(),
                CsvField::Authors => reference.authors.extend(
                    split_list(value).map(Author::parse),
                ),
                CsvField::Year => reference.year = parse_year(value),
                CsvField::Journal => reference.journal = Some(value.to_string()),
                CsvField::Volume => reference.volume = Some(value.to_string()),
                CsvField::Issue => reference.issue = Some(value.to_string()),
                CsvField::Pages => reference.pages = Some(format_page_numbers(value)),
                CsvField::Doi => reference.doi = format_doi(value),
                CsvField::Abstract => reference.abstract_text = Some(value.to_string()),
                CsvField::Keywords => reference.keywords.extend(split_list(value).map(String::from)),
                CsvField::Urls => reference.urls.extend(split_list(value).map(String::from)),
                CsvField::Isbn => reference.isbn.extend(split_list(value).map(String::from)),
                CsvField::Label => reference.label = Some(value.to_string()),
                CsvField::Caption => reference.caption = Some(value.to_string()),
            }
        }

        if reference.id.is_empty() {
            reference.id = nanoid!();
        }
        Ok(reference)
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(';').map(str::trim).filter(|s| !s.is_empty())
}

fn cell(reference: &Reference, field: CsvField) -> String {
    let optional = |value: &Option<String>| value.clone().unwrap_or_default();
    match field {
        CsvField::Id => reference.id.clone(),
        CsvField::RecNumber => reference.rec_number.map(|n| n.to_string()).unwrap_or_default(),
        CsvField::RefType => optional(&reference.ref_type),
        CsvField::Title => reference.title.clone(),
        CsvField::Authors => reference
            .authors
            .iter()
            .map(Author::display_name)
            .collect::<Vec<_>>()
            .join(LIST_SEPARATOR),
        CsvField::Year => reference.year.map(|y| y.to_string()).unwrap_or_default(),
        CsvField::Journal => optional(&reference.journal),
        CsvField::Volume => optional(&reference.volume),
        CsvField::Issue => optional(&reference.issue),
        CsvField::Pages => optional(&reference.pages),
        CsvField::Doi => optional(&reference.doi),
        CsvField::Abstract => optional(&reference.abstract_text),
        CsvField::Keywords => reference.keywords.join(LIST_SEPARATOR),
        CsvField::Urls => reference.urls.join(LIST_SEPARATOR),
        CsvField::Isbn => reference.isbn.join(LIST_SEPARATOR),
        CsvField::Label => optional(&reference.label),
        CsvField::Caption => optional(&reference.caption),
    }
}

impl LibraryCodec for CsvCodec {
    fn parse(&self, input: &str) -> Result<Vec<Reference>> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.config.delimiter)
            .has_headers(self.config.has_header)
            .flexible(true)
            .from_reader(input.as_bytes());

        let columns: Vec<Option<CsvField>> = if self.config.has_header {
            reader
                .headers()?
                .iter()
                .map(|header| self.config.field_for_header(header))
                .collect()
        } else {
            CsvField::ALL.into_iter().map(Some).collect()
        };

        let mut references = Vec::new();
        for result in reader.records() {
            let record = result?;
            references.push(self.parse_record(&columns, &record)?);
        }
        Ok(references)
    }

    fn write(&self, references: &[Reference]) -> Result<String> {
        let mut writer = WriterBuilder::new()
            .delimiter(self.config.delimiter)
            .from_writer(Vec::new());

        if self.config.has_header {
            writer.write_record(CsvField::ALL.map(CsvField::header))?;
        }
        for reference in references {
            writer.write_record(CsvField::ALL.map(|field| cell(reference, field)))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| LibraryError::Write(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| LibraryError::Write(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_basic_csv() {
        let input = "\
Title,Author,Year,Journal
Test Paper,Smith J,2023,Test Journal
Another Paper,\"Doe, Jane\",2022,Another Journal";

        let references = CsvCodec::new().parse(input).unwrap();
        assert_eq!(references.len(), 2);
        assert_eq!(references[0].title, "Test Paper");
        assert_eq!(references[0].authors[0].family_name, "Smith");
        assert_eq!(references[0].year, Some(2023));
        assert_eq!(references[0].journal, Some("Test Journal".to_string()));
        assert_eq!(references[1].authors[0].given_name, "Jane");
        assert!(!references[0].id.is_empty());
    }

    #[test]
    fn test_custom_headers() {
        let input = "\
Article Name,Writers,Published,Source
Test Paper,Smith J,2023,Test Journal";

        let mut config = CsvConfig::new();
        config
            .set_header_mapping(CsvField::Title, vec!["Article Name".to_string()])
            .set_header_mapping(CsvField::Authors, vec!["Writers".to_string()])
            .set_header_mapping(CsvField::Year, vec!["Published".to_string()])
            .set_header_mapping(CsvField::Journal, vec!["Source".to_string()]);

        let references = CsvCodec::new().with_config(config).parse(input).unwrap();
        assert_eq!(references[0].title, "Test Paper");
        assert_eq!(references[0].authors[0].family_name, "Smith");
        assert_eq!(references[0].year, Some(2023));
        assert_eq!(references[0].journal, Some("Test Journal".to_string()));
    }

    #[test]
    fn test_multiple_authors() {
        let input = "\
Title,Authors,Year
Test Paper,\"Smith, John; Doe, Jane\",2023";

        let references = CsvCodec::new().parse(input).unwrap();
        assert_eq!(references[0].authors.len(), 2);
        assert_eq!(references[0].authors[0].family_name, "Smith");
        assert_eq!(references[0].authors[1].family_name, "Doe");
    }

    #[test]
    fn test_custom_delimiter() {
        let input = "Title;Author;Year\nTest Paper;Smith J;2023";

        let mut config = CsvConfig::new();
        config.set_delimiter(b';');

        let references = CsvCodec::new().with_config(config).parse(input).unwrap();
        assert_eq!(references[0].title, "Test Paper");
        assert_eq!(references[0].year, Some(2023));
    }

    #[test]
    fn test_invalid_record_number() {
        let input = "title,rec_number\nTest,seven";
        assert!(matches!(
            CsvCodec::new().parse(input),
            Err(LibraryError::InvalidFieldValue { .. })
        ));
    }

    #[test]
    fn test_write_header_and_quoting() {
        let reference = Reference {
            id: "abc".into(),
            rec_number: Some(3),
            title: "Cats, Dogs".into(),
            authors: vec![Author::parse("Smith, John"), Author::parse("Doe, Jane")],
            year: Some(2020),
            caption: Some("DUPE OF 1".into()),
            ..Default::default()
        };
        let output = CsvCodec::new().write(&[reference]).unwrap();
        let mut lines = output.lines();
        assert_eq!(
            lines.next(),
            Some("id,rec_number,type,title,authors,year,journal,volume,issue,pages,doi,abstract,keywords,url,isbn,label,caption")
        );
        assert_eq!(
            lines.next(),
            Some("abc,3,,\"Cats, Dogs\",\"Smith, John; Doe, Jane\",2020,,,,,,,,,,,DUPE OF 1")
        );
    }

    #[test]
    fn test_written_library_reads_back() {
        let codec = CsvCodec::new();
        let original = Reference {
            id: "r1".into(),
            rec_number: Some(9),
            title: "A title".into(),
            authors: vec![Author::parse("Smith, John")],
            year: Some(2011),
            doi: Some("10.1/abc".into()),
            keywords: vec!["one".into(), "two".into()],
            ..Default::default()
        };
        let reparsed = codec.parse(&codec.write(&[original.clone()]).unwrap()).unwrap();
        assert_eq!(reparsed, vec![original]);
    }
}
