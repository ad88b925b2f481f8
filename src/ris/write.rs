use super::tags::RisTag;
use crate::Reference;
use std::fmt::Write;

const DEFAULT_TYPE: &str = "JOUR";

fn push_line(out: &mut String, tag: RisTag, value: &str) {
    if !value.is_empty() {
        // Writing into a String cannot fail.
        let _ = writeln!(out, "{}  - {}", tag.as_tag(), value);
    }
}

/// Renders one reference as a `TY` ... `ER` block followed by a blank line.
pub(crate) fn write_reference(out: &mut String, reference: &Reference) {
    push_line(
        out,
        RisTag::Type,
        reference.ref_type.as_deref().unwrap_or(DEFAULT_TYPE),
    );
    push_line(out, RisTag::Title, &reference.title);
    for author in &reference.authors {
        push_line(out, RisTag::Author, &author.display_name());
    }
    if let Some(year) = reference.year {
        push_line(out, RisTag::Date, &year.to_string());
    }
    push_line(out, RisTag::Journal, reference.journal.as_deref().unwrap_or_default());
    push_line(out, RisTag::Volume, reference.volume.as_deref().unwrap_or_default());
    push_line(out, RisTag::Issue, reference.issue.as_deref().unwrap_or_default());
    if let Some(pages) = &reference.pages {
        match pages.split_once('-') {
            Some((start, end)) => {
                push_line(out, RisTag::StartPage, start.trim());
                push_line(out, RisTag::EndPage, end.trim());
            }
            None => push_line(out, RisTag::StartPage, pages),
        }
    }
    push_line(out, RisTag::Doi, reference.doi.as_deref().unwrap_or_default());
    push_line(
        out,
        RisTag::Abstract,
        reference.abstract_text.as_deref().unwrap_or_default(),
    );
    for keyword in &reference.keywords {
        push_line(out, RisTag::Keyword, keyword);
    }
    for url in &reference.urls {
        push_line(out, RisTag::Url, url);
    }
    for isbn in &reference.isbn {
        push_line(out, RisTag::SerialNumber, isbn);
    }
    if let Some(number) = reference.rec_number {
        push_line(out, RisTag::ReferenceId, &number.to_string());
    }
    push_line(out, RisTag::Label, reference.label.as_deref().unwrap_or_default());
    push_line(out, RisTag::Caption, reference.caption.as_deref().unwrap_or_default());
    out.push_str("ER  - \n\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Author;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_write_reference() {
        let reference = Reference {
            rec_number: Some(12),
            title: "Test Article".into(),
            authors: vec![Author::parse("Smith, John"), Author::parse("Doe")],
            year: Some(2021),
            journal: Some("Journal of Tests".into()),
            pages: Some("100-110".into()),
            doi: Some("10.1000/test".into()),
            caption: Some("DUPE OF 3".into()),
            ..Default::default()
        };
        let mut out = String::new();
        write_reference(&mut out, &reference);
        assert_eq!(
            out,
            "TY  - JOUR\n\
             TI  - Test Article\n\
             AU  - Smith, John\n\
             AU  - Doe\n\
             PY  - 2021\n\
             JO  - Journal of Tests\n\
             SP  - 100\n\
             EP  - 110\n\
             DO  - 10.1000/test\n\
             ID  - 12\n\
             CA  - DUPE OF 3\n\
             ER  - \n\n"
        );
    }

    #[test]
    fn test_single_page() {
        let reference = Reference {
            ref_type: Some("BOOK".into()),
            pages: Some("e1234".into()),
            ..Default::default()
        };
        let mut out = String::new();
        write_reference(&mut out, &reference);
        assert_eq!(out, "TY  - BOOK\nSP  - e1234\nER  - \n\n");
    }
}
