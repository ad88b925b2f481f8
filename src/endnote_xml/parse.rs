//! EndNote XML reading.

use crate::utils::{format_doi, format_page_numbers, parse_year};
use crate::{Author, LibraryError, Reference, Result};
use nanoid::nanoid;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use std::io::BufRead;

/// Parses every `<record>` in the document. Empty input yields no references.
pub(crate) fn parse_endnote_xml(content: &str) -> Result<Vec<Reference>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut references = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name() == QName(b"record") => {
                references.push(parse_record(&mut reader, &mut buf)?);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(LibraryError::from(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(references)
}

/// Collects the text below the current element until `closing_tag` closes it.
///
/// Nested `<style>` wrappers, as written by EndNote, are flattened.
fn extract_text<B: BufRead>(
    reader: &mut Reader<B>,
    buf: &mut Vec<u8>,
    closing_tag: &[u8],
) -> Result<String> {
    let mut text = String::new();

    loop {
        match reader.read_event_into(buf) {
            Ok(Event::Text(e)) => {
                let unescaped = e.unescape().map_err(|e| {
                    LibraryError::InvalidFormat(format!("Invalid XML text content: {e}"))
                })?;
                text.push_str(&unescaped);
            }
            Ok(Event::CData(e)) => text.push_str(&String::from_utf8_lossy(&e)),
            Ok(Event::End(e)) if e.name() == QName(closing_tag) => break,
            Ok(Event::Eof) => {
                return Err(LibraryError::InvalidFormat(format!(
                    "Unexpected EOF while looking for closing tag '{}'",
                    String::from_utf8_lossy(closing_tag)
                )));
            }
            Err(e) => return Err(LibraryError::from(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(text.trim().to_string())
}

fn ref_type_name(e: &BytesStart) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"name" {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn parse_record<B: BufRead>(reader: &mut Reader<B>, buf: &mut Vec<u8>) -> Result<Reference> {
    let mut reference = Reference {
        id: nanoid!(),
        ..Default::default()
    };

    loop {
        match reader.read_event_into(buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"rec-number" => {
                    let number = extract_text(reader, buf, b"rec-number")?;
                    reference.rec_number =
                        Some(number.parse().map_err(|_| LibraryError::InvalidFieldValue {
                            field: "rec-number".into(),
                            message: format!("expected a record number, got '{number}'"),
                        })?);
                }
                b"ref-type" => {
                    reference.ref_type = ref_type_name(e)?;
                    extract_text(reader, buf, b"ref-type")?;
                }
                b"title" => {
                    reference.title = extract_text(reader, buf, b"title")?;
                }
                b"author" => {
                    let name = extract_text(reader, buf, b"author")?;
                    reference.authors.push(Author::parse(&name));
                }
                b"secondary-title" => {
                    let secondary = extract_text(reader, buf, b"secondary-title")?;
                    if !secondary.is_empty() {
                        reference.journal = Some(secondary);
                    }
                }
                b"full-title" => {
                    let full = extract_text(reader, buf, b"full-title")?;
                    if reference.journal.is_none() && !full.is_empty() {
                        reference.journal = Some(full);
                    }
                }
                b"volume" => {
                    reference.volume = Some(extract_text(reader, buf, b"volume")?);
                }
                b"number" => {
                    reference.issue = Some(extract_text(reader, buf, b"number")?);
                }
                b"pages" => {
                    let pages = extract_text(reader, buf, b"pages")?;
                    reference.pages = Some(format_page_numbers(&pages));
                }
                b"electronic-resource-num" => {
                    let doi = extract_text(reader, buf, b"electronic-resource-num")?;
                    reference.doi = format_doi(&doi);
                }
                b"url" => {
                    let url = extract_text(reader, buf, b"url")?;
                    if reference.doi.is_none() && url.contains("doi.org") {
                        reference.doi = format_doi(&url);
                    }
                    reference.urls.push(url);
                }
                b"year" => {
                    let year = extract_text(reader, buf, b"year")?;
                    reference.year = parse_year(&year);
                }
                b"abstract" => {
                    reference.abstract_text = Some(extract_text(reader, buf, b"abstract")?);
                }
                b"keyword" => {
                    reference
                        .keywords
                        .push(extract_text(reader, buf, b"keyword")?);
                }
                b"isbn" => {
                    let isbn = extract_text(reader, buf, b"isbn")?;
                    reference.isbn.extend(
                        isbn.split(['\r', '\n', ';'])
                            .map(str::trim)
                            .filter(|value| !value.is_empty())
                            .map(String::from),
                    );
                }
                b"label" => {
                    reference.label = Some(extract_text(reader, buf, b"label")?);
                }
                b"caption" => {
                    reference.caption = Some(extract_text(reader, buf, b"caption")?);
                }
                _ => (),
            },
            Ok(Event::End(ref e)) if e.name() == QName(b"record") => break,
            Ok(Event::Eof) => {
                return Err(LibraryError::InvalidFormat(
                    "Unexpected EOF inside <record>".into(),
                ));
            }
            Err(e) => return Err(LibraryError::from(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_styled_text_is_flattened() {
        let input = r#"<xml><records><record>
<titles><title><style face="normal" font="default" size="100%">Styled Title</style></title></titles>
</record></records></xml>"#;
        let references = parse_endnote_xml(input).unwrap();
        assert_eq!(references[0].title, "Styled Title");
    }

    #[test]
    fn test_periodical_full_title_is_fallback() {
        let input = r#"<xml><records><record>
<titles><title>T</title></titles>
<periodical><full-title>Fallback Journal</full-title></periodical>
</record><record>
<titles><title>T</title><secondary-title>Secondary Journal</secondary-title></titles>
<periodical><full-title>Fallback Journal</full-title></periodical>
</record></records></xml>"#;
        let references = parse_endnote_xml(input).unwrap();
        assert_eq!(references[0].journal.as_deref(), Some("Fallback Journal"));
        assert_eq!(references[1].journal.as_deref(), Some("Secondary Journal"));
    }

    #[test]
    fn test_invalid_record_number() {
        let input = "<xml><records><record><rec-number>x1</rec-number></record></records></xml>";
        assert!(matches!(
            parse_endnote_xml(input),
            Err(LibraryError::InvalidFieldValue { .. })
        ));
    }

    #[test]
    fn test_truncated_record() {
        let input = "<xml><records><record><titles><title>T</title></titles>";
        assert!(parse_endnote_xml(input).is_err());
    }
}
