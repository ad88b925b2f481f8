//! Two-letter RIS tags, folded into the fields a [`crate::Reference`] carries.
//!
//! Synonymous tags share a variant: `TI`/`T1` are both titles, `JF`/`JO`/`T2`
//! are container titles, `PY`/`Y1`/`DA` are dates, `AB`/`N2` are abstracts and
//! `UR`/`L1`/`L2`/`LK` are links. Editors (`A2`-`A4`) are kept apart from authors.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RisTag {
    Type,
    Title,
    Author,
    Contributor,
    Journal,
    /// Only used when no full container title is present
    JournalAbbreviation,
    Date,
    Volume,
    Issue,
    StartPage,
    EndPage,
    Doi,
    /// Record number assigned by the exporting library
    ReferenceId,
    Abstract,
    Keyword,
    SerialNumber,
    Url,
    Label,
    Caption,
    EndOfReference,
    Unknown(String),
}

impl RisTag {
    pub fn from_tag(tag: &str) -> Self {
        use RisTag::*;
        match tag {
            "TY" => Type,
            "TI" | "T1" => Title,
            "AU" | "A1" => Author,
            "A2" | "A3" | "A4" => Contributor,
            "JF" | "JO" | "T2" => Journal,
            "JA" | "J2" => JournalAbbreviation,
            "PY" | "Y1" | "DA" => Date,
            "VL" => Volume,
            "IS" => Issue,
            "SP" => StartPage,
            "EP" => EndPage,
            "DO" => Doi,
            "ID" => ReferenceId,
            "AB" | "N2" => Abstract,
            "KW" => Keyword,
            "SN" => SerialNumber,
            "UR" | "L1" | "L2" | "LK" => Url,
            "LB" => Label,
            "CA" => Caption,
            "ER" => EndOfReference,
            other => Unknown(other.to_string()),
        }
    }

    /// Canonical tag for writing; synonyms collapse to one spelling.
    pub fn as_tag(&self) -> &str {
        use RisTag::*;
        match self {
            Type => "TY",
            Title => "TI",
            Author => "AU",
            Contributor => "A2",
            Journal => "JO",
            JournalAbbreviation => "J2",
            Date => "PY",
            Volume => "VL",
            Issue => "IS",
            StartPage => "SP",
            EndPage => "EP",
            Doi => "DO",
            ReferenceId => "ID",
            Abstract => "AB",
            Keyword => "KW",
            SerialNumber => "SN",
            Url => "UR",
            Label => "LB",
            Caption => "CA",
            EndOfReference => "ER",
            Unknown(tag) => tag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("T1", RisTag::Title)]
    #[case("A1", RisTag::Author)]
    #[case("A3", RisTag::Contributor)]
    #[case("JF", RisTag::Journal)]
    #[case("Y1", RisTag::Date)]
    #[case("N2", RisTag::Abstract)]
    #[case("CA", RisTag::Caption)]
    #[case("PB", RisTag::Unknown("PB".to_string()))]
    fn synonyms_fold_into_one_variant(#[case] tag: &str, #[case] expected: RisTag) {
        assert_eq!(RisTag::from_tag(tag), expected);
    }

    #[rstest]
    #[case("T2", "JO")]
    #[case("Y1", "PY")]
    #[case("L1", "UR")]
    #[case("PB", "PB")]
    fn written_tag_is_canonical(#[case] tag: &str, #[case] written: &str) {
        assert_eq!(RisTag::from_tag(tag).as_tag(), written);
    }
}
