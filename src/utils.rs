use crate::regex::{Captures, Regex};
use std::sync::LazyLock;

static DOI_URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://(?:dx\.)?doi\.org/(.+)$").unwrap());

static UNICODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<U\+([0-9A-Fa-f]+)>").unwrap());

static YEAR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^0-9])([0-9]{4})(?:[^0-9]|$)").unwrap());

/// Markup and greek letter spellings folded away before comparing text.
const TEXT_REPLACEMENTS: [(&str, &str); 13] = [
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("<sup>", ""),
    ("</sup>", ""),
    ("<sub>", ""),
    ("</sub>", ""),
    ("<inf>", ""),
    ("</inf>", ""),
    ("beta", "b"),
    ("alpha", "a"),
    ("α", "a"),
    ("ß", "b"),
    ("γ", "g"),
];

/// Normalizes a DOI: lowercase, whitespace removed, `doi:`/URL prefixes and
/// `[doi]` suffixes stripped. Returns `None` when no `10.` prefix is present.
pub fn format_doi(doi_str: &str) -> Option<String> {
    let doi = doi_str
        .trim()
        .trim_end_matches("[doi]")
        .replace(char::is_whitespace, "")
        .to_lowercase();

    let start = doi.find("10.")?;
    let doi = &doi[start..];
    match DOI_URL_REGEX.captures(doi) {
        Some(captures) => Some(captures[1].to_string()),
        None => Some(doi.to_string()),
    }
}

/// Completes abbreviated page ranges, e.g. `"1234-45"` becomes `"1234-1245"`
/// and `"R575-82"` becomes `"R575-R582"`.
pub fn format_page_numbers(page_range: &str) -> String {
    let Some((from, to)) = page_range.split_once('-') else {
        return page_range.to_string();
    };
    if to.contains('-') {
        return page_range.to_string();
    }

    let (from_prefix, from_num) = split_prefix_and_number(from);
    let (to_prefix, to_num) = split_prefix_and_number(to);
    if from_prefix != to_prefix && !from_prefix.is_empty() && !to_prefix.is_empty() {
        return page_range.to_string();
    }
    let (Some(from_num), Some(to_num)) = (from_num, to_num) else {
        return page_range.to_string();
    };

    let completed_to = if to_num.len() < from_num.len() {
        format!("{}{}", &from_num[..from_num.len() - to_num.len()], to_num)
    } else {
        to_num.to_string()
    };

    if from_num == completed_to {
        format!("{from_prefix}{from_num}")
    } else {
        format!("{from_prefix}{from_num}-{from_prefix}{completed_to}")
    }
}

fn split_prefix_and_number(input: &str) -> (&str, Option<&str>) {
    match input.find(|c: char| c.is_ascii_digit()) {
        Some(index) => (&input[..index], Some(&input[index..])),
        None => (input, None),
    }
}

/// Splits a name written as `"Family, Given"` or `"Family Given"`.
pub fn parse_author_name(name: &str) -> (String, String) {
    let parts: Vec<&str> = if name.contains(',') {
        name.split(',').collect()
    } else {
        name.split_whitespace().collect()
    };

    match parts.as_slice() {
        [] => (String::new(), String::new()),
        [family] => (family.trim().to_string(), String::new()),
        [family, given @ ..] => (
            family.trim().to_string(),
            given
                .iter()
                .map(|part| part.trim())
                .collect::<Vec<_>>()
                .join(" ")
                .trim()
                .to_string(),
        ),
    }
}

/// Extracts the first standalone four digit year, e.g. from `"2023/12/25/"`.
pub fn parse_year(value: &str) -> Option<i32> {
    YEAR_REGEX
        .captures(value.trim())
        .and_then(|caps| caps[1].parse().ok())
}

/// Replaces `<U+XXXX>` escapes (as exported by some databases) with the character.
pub fn convert_unicode_string(input: &str) -> String {
    UNICODE_REGEX
        .replace_all(input, |caps: &Captures| {
            u32::from_str_radix(&caps[1], 16)
                .ok()
                .and_then(char::from_u32)
                .map(|c| c.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string()
}

/// Lowercases text, folds markup, and reduces it to alphanumeric words
/// separated by single spaces.
pub fn normalize_text(text: &str) -> String {
    let mut s = convert_unicode_string(text.trim()).to_lowercase();
    for (from, to) in TEXT_REPLACEMENTS {
        s = s.replace(from, to);
    }
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reduces a surname to lowercase alphanumerics so `"O'Brien"` and `"OBrien"` agree.
pub fn normalize_surname(surname: &str) -> String {
    convert_unicode_string(surname.trim())
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Lowercases a journal name and drops conference suffixes and punctuation.
pub fn normalize_journal(name: &str) -> String {
    name.split(". Conference")
        .next()
        .unwrap_or(name)
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1234-45", "1234-1245")]
    #[case("1234", "1234")]
    #[case("123-456", "123-456")]
    #[case("e071674", "e071674")]
    #[case("R575-82", "R575-R582")]
    #[case("12-345", "12-345")]
    #[case("A94-A95", "A94-A95")]
    #[case("01-Apr", "01-Apr")]
    #[case("101-101", "101")]
    fn test_format_page_numbers(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(format_page_numbers(input), expected);
    }

    #[rstest]
    #[case("10.1000/test", Some("10.1000/test"))]
    #[case("10.1000/test [doi]", Some("10.1000/test"))]
    #[case("https://doi.org/10.1000/test", Some("10.1000/test"))]
    #[case("http://dx.doi.org/10.1000/test", Some("10.1000/test"))]
    #[case("doi: 10.1000/TEST", Some("10.1000/test"))]
    #[case("HTTPS://DOI.ORG/10.1000/TEST", Some("10.1000/test"))]
    #[case("", None)]
    #[case("invalid", None)]
    fn test_format_doi(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(format_doi(input).as_deref(), expected);
    }

    #[rstest]
    #[case("Smith, John", "Smith", "John")]
    #[case("Duan, J.J.", "Duan", "J.J.")]
    #[case("Smith John", "Smith", "John")]
    #[case("Smith", "Smith", "")]
    #[case("Smith-Jones, John-Paul", "Smith-Jones", "John-Paul")]
    #[case("", "", "")]
    #[case("von  Neumann,    John", "von  Neumann", "John")]
    fn test_parse_author_name(#[case] input: &str, #[case] family: &str, #[case] given: &str) {
        assert_eq!(
            parse_author_name(input),
            (family.to_string(), given.to_string())
        );
    }

    #[rstest]
    #[case("2023", Some(2023))]
    #[case("2023/12/25/Christmas edition", Some(2023))]
    #[case("1998///", Some(1998))]
    #[case("c. 12345", None)]
    #[case("", None)]
    fn test_parse_year(#[case] input: &str, #[case] expected: Option<i32>) {
        assert_eq!(parse_year(input), expected);
    }

    #[test]
    fn test_convert_unicode_string() {
        assert_eq!(convert_unicode_string("2<U+0391>-amino"), "2Α-amino");
        assert_eq!(convert_unicode_string("<U+0391><U+0392>"), "ΑΒ");
        assert_eq!(convert_unicode_string("Normal String"), "Normal String");
        assert_eq!(convert_unicode_string(""), "");
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("Deep Learning for X."), "deep learning for x");
        assert_eq!(
            normalize_text("Machine Learning! (2<sup>nd</sup> Edition)"),
            "machine learning 2nd edition"
        );
        assert_eq!(normalize_text("  --  "), "");
    }

    #[test]
    fn test_normalize_surname_and_journal() {
        assert_eq!(normalize_surname("O'Brien"), "obrien");
        assert_eq!(
            normalize_journal("The FASEB Journal. Conference: Experimental Biology"),
            "thefasebjournal"
        );
    }
}
