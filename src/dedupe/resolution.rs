//! What happens to a library once its duplicate pairs are known.
//!
//! The policy only ever touches the later record of a pair. Decisions are
//! collected while the run progresses and written to the records in a single
//! pass at the end, so scoring always sees the records as they were supplied.

use crate::error::DedupeError;
use crate::Reference;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resolution policy, chosen before a run starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionPolicy {
    /// Leave the library untouched; only count duplicates.
    #[default]
    Count,
    /// Annotate each duplicate's caption with the record it duplicates.
    Mark,
    /// Drop duplicates from the surviving records.
    Remove,
}

impl ResolutionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ResolutionPolicy::Count => "count",
            ResolutionPolicy::Mark => "mark",
            ResolutionPolicy::Remove => "remove",
        }
    }

    /// Resolves `records` from already known duplicate pairs `(earlier, later)`.
    ///
    /// Lets a caller apply a different policy to the pairs of a finished run
    /// without comparing again.
    pub fn resolve(
        self,
        records: Vec<Reference>,
        pairs: impl IntoIterator<Item = (usize, usize)>,
    ) -> Vec<Reference> {
        let mut resolver = Resolver::new(self, records.len());
        for (earlier, later) in pairs {
            resolver.record(&records[earlier], later);
        }
        resolver.apply(records)
    }
}

impl fmt::Display for ResolutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionPolicy {
    type Err = DedupeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "count" => Ok(ResolutionPolicy::Count),
            "mark" => Ok(ResolutionPolicy::Mark),
            "remove" => Ok(ResolutionPolicy::Remove),
            _ => Err(DedupeError::UnknownPolicy(s.to_string())),
        }
    }
}

/// Accumulates the decisions of one policy over one run.
#[derive(Debug, Clone)]
pub struct Resolver {
    policy: ResolutionPolicy,
    deleted: Vec<bool>,
    marks: Vec<Option<String>>,
}

impl Resolver {
    pub fn new(policy: ResolutionPolicy, len: usize) -> Self {
        let (deleted, marks) = match policy {
            ResolutionPolicy::Count => (Vec::new(), Vec::new()),
            ResolutionPolicy::Mark => (Vec::new(), vec![None; len]),
            ResolutionPolicy::Remove => (vec![false; len], Vec::new()),
        };
        Self {
            policy,
            deleted,
            marks,
        }
    }

    pub fn policy(&self) -> ResolutionPolicy {
        self.policy
    }

    /// Records that the reference at `later` duplicates `earlier`.
    ///
    /// A later mark replaces an earlier one, so a record ends up pointing at
    /// the last record it duplicates. Deletion flags are OR'd, so recording a
    /// pair twice changes nothing.
    pub fn record(&mut self, earlier: &Reference, later: usize) {
        match self.policy {
            ResolutionPolicy::Count => {}
            ResolutionPolicy::Mark => {
                self.marks[later] = Some(format!("DUPE OF {}", earlier.stable_id()));
            }
            ResolutionPolicy::Remove => self.deleted[later] = true,
        }
    }

    /// Writes the decisions to `records` and returns the surviving sequence.
    pub fn apply(self, mut records: Vec<Reference>) -> Vec<Reference> {
        match self.policy {
            ResolutionPolicy::Count => records,
            ResolutionPolicy::Mark => {
                for (record, mark) in records.iter_mut().zip(self.marks) {
                    if let Some(mark) = mark {
                        record.caption = Some(mark);
                    }
                }
                records
            }
            ResolutionPolicy::Remove => {
                for (record, deleted) in records.iter_mut().zip(self.deleted) {
                    record.deleted |= deleted;
                }
                records.retain(|record| !record.deleted);
                records
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn library() -> Vec<Reference> {
        ["A", "B", "C"]
            .into_iter()
            .enumerate()
            .map(|(i, title)| Reference {
                id: title.to_lowercase(),
                rec_number: Some(i as u64 + 1),
                title: title.to_string(),
                ..Default::default()
            })
            .collect()
    }

    fn titles(records: &[Reference]) -> Vec<&str> {
        records.iter().map(|r| r.title.as_str()).collect()
    }

    #[rstest]
    #[case("count", ResolutionPolicy::Count)]
    #[case("MARK", ResolutionPolicy::Mark)]
    #[case(" remove", ResolutionPolicy::Remove)]
    fn test_policy_from_str(#[case] input: &str, #[case] expected: ResolutionPolicy) {
        assert_eq!(input.parse::<ResolutionPolicy>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_policy() {
        assert_eq!(
            "merge".parse::<ResolutionPolicy>(),
            Err(DedupeError::UnknownPolicy("merge".to_string()))
        );
    }

    #[test]
    fn test_count_leaves_records_untouched() {
        let records = ResolutionPolicy::Count.resolve(library(), [(0, 1), (1, 2)]);
        assert_eq!(records, library());
    }

    #[test]
    fn test_mark_chain() {
        let records = ResolutionPolicy::Mark.resolve(library(), [(0, 1), (1, 2)]);
        assert_eq!(titles(&records), vec!["A", "B", "C"]);
        assert_eq!(records[0].caption, None);
        assert_eq!(records[1].caption.as_deref(), Some("DUPE OF 1"));
        assert_eq!(records[2].caption.as_deref(), Some("DUPE OF 2"));
    }

    #[test]
    fn test_mark_points_at_last_marker() {
        let records = ResolutionPolicy::Mark.resolve(library(), [(0, 1), (0, 2), (1, 2)]);
        assert_eq!(records[1].caption.as_deref(), Some("DUPE OF 1"));
        assert_eq!(records[2].caption.as_deref(), Some("DUPE OF 2"));
    }

    #[test]
    fn test_mark_falls_back_to_id() {
        let mut records = library();
        records[0].rec_number = None;
        let records = ResolutionPolicy::Mark.resolve(records, [(0, 1)]);
        assert_eq!(records[1].caption.as_deref(), Some("DUPE OF a"));
    }

    #[test]
    fn test_remove_chain() {
        let records = ResolutionPolicy::Remove.resolve(library(), [(0, 1), (1, 2)]);
        assert_eq!(titles(&records), vec!["A"]);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let records = ResolutionPolicy::Remove.resolve(library(), [(0, 2), (1, 2), (0, 2)]);
        assert_eq!(titles(&records), vec!["A", "B"]);
    }

    #[test]
    fn test_remove_keeps_caller_deletions() {
        let mut records = library();
        records[0].deleted = true;
        let records = ResolutionPolicy::Remove.resolve(records, [(1, 2)]);
        assert_eq!(titles(&records), vec!["B"]);
    }
}
