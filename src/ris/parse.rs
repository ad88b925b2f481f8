//! Low-level RIS parsing.

use super::tags::RisTag;
use crate::utils::{format_doi, format_page_numbers, parse_year};
use crate::{Author, LibraryError, Reference, Result};
use nanoid::nanoid;
use tracing::debug;

/// The tagged lines of one reference, in file order.
#[derive(Debug, Default)]
pub(crate) struct RawRis {
    fields: Vec<(RisTag, String)>,
}

impl RawRis {
    fn has_content(&self) -> bool {
        !self.fields.is_empty()
    }

    fn first(&self, tag: &RisTag) -> Option<&str> {
        self.fields
            .iter()
            .find(|(t, value)| t == tag && !value.is_empty())
            .map(|(_, value)| value.as_str())
    }

    fn all(&self, tag: &RisTag) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(move |(t, value)| t == tag && !value.is_empty())
            .map(|(_, value)| value.as_str())
    }
}

/// Splits RIS text into raw references. Lines that are not `TAG  - value` are skipped.
pub(crate) fn ris_parse(text: &str) -> Vec<RawRis> {
    let mut references = Vec::new();
    let mut current = RawRis::default();

    for (line_number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || is_metadata_line(line) {
            continue;
        }

        let Some((tag, content)) = parse_ris_line(line) else {
            debug!(line = line_number + 1, "skipping unparsable RIS line");
            continue;
        };

        match tag {
            RisTag::Type => {
                if current.has_content() {
                    references.push(std::mem::take(&mut current));
                }
                current.fields.push((tag, content));
            }
            RisTag::EndOfReference => {
                if current.has_content() {
                    references.push(std::mem::take(&mut current));
                }
            }
            _ => current.fields.push((tag, content)),
        }
    }

    if current.has_content() {
        references.push(current);
    }
    references
}

/// Parses `"TY  - JOUR"` and its looser variants (`"TY- JOUR"`, `"TY-JOUR"`, `"ER  -"`).
fn parse_ris_line(line: &str) -> Option<(RisTag, String)> {
    let tag = line.get(..2)?;
    if !tag.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
        return None;
    }

    let rest = &line[2..];
    let content = rest.trim_start().strip_prefix('-')?;
    if !rest.starts_with([' ', '-']) {
        return None;
    }
    Some((RisTag::from_tag(tag), content.trim().to_string()))
}

fn is_metadata_line(line: &str) -> bool {
    line.starts_with("Record #")
        || line.starts_with("Provider:")
        || line.starts_with("Content:")
        || line.starts_with("Database:")
}

impl TryFrom<RawRis> for Reference {
    type Error = LibraryError;

    fn try_from(raw: RawRis) -> Result<Self> {
        let rec_number = match raw.first(&RisTag::ReferenceId) {
            Some(id) => Some(id.parse::<u64>().map_err(|_| {
                LibraryError::InvalidFieldValue {
                    field: "ID".into(),
                    message: format!("expected a record number, got '{id}'"),
                }
            })?),
            None => None,
        };

        let pages = match (raw.first(&RisTag::StartPage), raw.first(&RisTag::EndPage)) {
            (Some(start), Some(end)) => Some(format_page_numbers(&format!("{start}-{end}"))),
            (Some(start), None) => Some(format_page_numbers(start)),
            _ => None,
        };

        let urls: Vec<String> = raw.all(&RisTag::Url).map(String::from).collect();
        let doi = raw.first(&RisTag::Doi).and_then(format_doi).or_else(|| {
            urls.iter()
                .find(|url| url.contains("doi.org"))
                .and_then(|url| format_doi(url))
        });

        Ok(Reference {
            id: nanoid!(),
            rec_number,
            ref_type: raw.first(&RisTag::Type).map(String::from),
            title: raw.first(&RisTag::Title).unwrap_or_default().to_string(),
            authors: raw.all(&RisTag::Author).map(Author::parse).collect(),
            year: raw.first(&RisTag::Date).and_then(parse_year),
            journal: raw
                .first(&RisTag::Journal)
                .or_else(|| raw.first(&RisTag::JournalAbbreviation))
                .map(String::from),
            volume: raw.first(&RisTag::Volume).map(String::from),
            issue: raw.first(&RisTag::Issue).map(String::from),
            pages,
            doi,
            abstract_text: raw.first(&RisTag::Abstract).map(String::from),
            keywords: raw.all(&RisTag::Keyword).map(String::from).collect(),
            urls,
            isbn: raw.all(&RisTag::SerialNumber).map(String::from).collect(),
            label: raw.first(&RisTag::Label).map(String::from),
            caption: raw.first(&RisTag::Caption).map(String::from),
            deleted: false,
        })
    }
}
