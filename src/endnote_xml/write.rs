//! EndNote XML writing.

use crate::{LibraryError, Reference, Result};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

const DEFAULT_REF_TYPE: &str = "Journal Article";

struct RecordWriter {
    writer: Writer<Vec<u8>>,
}

impl RecordWriter {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<()> {
        self.writer
            .write_event(event)
            .map_err(|e| LibraryError::Write(e.to_string()))
    }

    fn open(&mut self, name: &str) -> Result<()> {
        self.event(Event::Start(BytesStart::new(name)))
    }

    fn close(&mut self, name: &str) -> Result<()> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    /// Writes `<name>text</name>`, skipping empty values.
    fn text(&mut self, name: &str, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.open(name)?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    /// Writes `<outer><name>..</name>...</outer>` when `values` is not empty.
    fn list<'a>(
        &mut self,
        outer: &str,
        name: &str,
        values: impl IntoIterator<Item = &'a str>,
    ) -> Result<()> {
        let mut values = values.into_iter().filter(|v| !v.is_empty()).peekable();
        if values.peek().is_none() {
            return Ok(());
        }
        self.open(outer)?;
        for value in values {
            self.text(name, value)?;
        }
        self.close(outer)
    }

    fn record(&mut self, reference: &Reference) -> Result<()> {
        self.open("record")?;
        if let Some(number) = reference.rec_number {
            self.text("rec-number", &number.to_string())?;
        }

        let mut ref_type = BytesStart::new("ref-type");
        ref_type.push_attribute((
            "name",
            reference.ref_type.as_deref().unwrap_or(DEFAULT_REF_TYPE),
        ));
        self.event(Event::Start(ref_type))?;
        self.event(Event::Text(BytesText::new("17")))?;
        self.close("ref-type")?;

        if !reference.authors.is_empty() {
            self.open("contributors")?;
            let names: Vec<String> = reference.authors.iter().map(|a| a.display_name()).collect();
            self.list("authors", "author", names.iter().map(String::as_str))?;
            self.close("contributors")?;
        }

        self.open("titles")?;
        self.text("title", &reference.title)?;
        self.text(
            "secondary-title",
            reference.journal.as_deref().unwrap_or_default(),
        )?;
        self.close("titles")?;
        if let Some(journal) = reference.journal.as_deref().filter(|j| !j.is_empty()) {
            self.open("periodical")?;
            self.text("full-title", journal)?;
            self.close("periodical")?;
        }

        self.text("pages", reference.pages.as_deref().unwrap_or_default())?;
        self.text("volume", reference.volume.as_deref().unwrap_or_default())?;
        self.text("number", reference.issue.as_deref().unwrap_or_default())?;
        self.list("keywords", "keyword", reference.keywords.iter().map(String::as_str))?;
        if let Some(year) = reference.year {
            self.open("dates")?;
            self.text("year", &year.to_string())?;
            self.close("dates")?;
        }
        self.text("isbn", &reference.isbn.join("\n"))?;
        self.text(
            "electronic-resource-num",
            reference.doi.as_deref().unwrap_or_default(),
        )?;
        self.text(
            "abstract",
            reference.abstract_text.as_deref().unwrap_or_default(),
        )?;
        self.text("label", reference.label.as_deref().unwrap_or_default())?;
        self.text("caption", reference.caption.as_deref().unwrap_or_default())?;
        if !reference.urls.is_empty() {
            self.open("urls")?;
            self.list("related-urls", "url", reference.urls.iter().map(String::as_str))?;
            self.close("urls")?;
        }
        self.close("record")
    }
}

pub(crate) fn write_endnote_xml(references: &[Reference]) -> Result<String> {
    let mut out = RecordWriter::new();
    out.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    out.open("xml")?;
    out.open("records")?;
    for reference in references {
        out.record(reference)?;
    }
    out.close("records")?;
    out.close("xml")?;

    String::from_utf8(out.writer.into_inner()).map_err(|e| LibraryError::Write(e.to_string()))
}
