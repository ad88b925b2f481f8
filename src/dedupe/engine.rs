//! The comparison loop behind [`Deduplicator::compare`].

use super::classifier::Verdict;
use super::resolution::Resolver;
use super::scorers::{Candidate, NormalizedFields};
use super::{BlockingKey, Deduplicator};
use crate::{Reference, ScorerError};
use rayon::prelude::*;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Caller-controlled cancellation flag, polled before every batch.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Comparisons done so far out of the total fixed at the start of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub completed: u64,
    pub total: u64,
}

/// Position and stable identifier of a record within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRef {
    pub index: usize,
    pub stable_id: String,
}

/// A pair classified as duplicate. `earlier.index < later.index` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicatePair {
    pub earlier: RecordRef,
    pub later: RecordRef,
    pub verdict: Verdict,
}

/// The authoritative output of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    /// Surviving records after the resolution policy, in input order
    pub records: Vec<Reference>,
    pub duplicates_found: usize,
    /// Pairs skipped because a scorer failed
    pub scorer_errors: usize,
    pub progress: ProgressSnapshot,
}

/// Events produced by a [`Comparison`].
///
/// Exactly one terminal event (`End` or `Cancelled`) closes every run.
#[derive(Debug, Clone, PartialEq)]
pub enum DedupeEvent {
    Progress(ProgressSnapshot),
    DuplicatePair(DuplicatePair),
    End(RunResult),
    Cancelled(RunResult),
}

impl DedupeEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DedupeEvent::End(_) | DedupeEvent::Cancelled(_))
    }
}

/// A drained run: its terminal result plus every duplicate pair it emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub result: RunResult,
    pub pairs: Vec<DuplicatePair>,
    pub cancelled: bool,
}

/// Which later records each record is compared against.
enum PairSchedule {
    All { len: usize },
    /// `slots[i]` is the bucket of record `i` and its position in that bucket.
    Blocked {
        buckets: Vec<Vec<usize>>,
        slots: Vec<(usize, usize)>,
    },
}

impl PairSchedule {
    fn new(records: &[Reference], blocking: Option<&BlockingKey>) -> Self {
        let Some(blocking) = blocking else {
            return PairSchedule::All { len: records.len() };
        };

        let mut bucket_of: HashMap<String, usize> = HashMap::new();
        let mut buckets: Vec<Vec<usize>> = Vec::new();
        let mut slots = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let bucket = *bucket_of
                .entry(blocking.key_for(record))
                .or_insert_with(|| {
                    buckets.push(Vec::new());
                    buckets.len() - 1
                });
            slots.push((bucket, buckets[bucket].len()));
            buckets[bucket].push(index);
        }
        PairSchedule::Blocked { buckets, slots }
    }

    fn len(&self) -> usize {
        match self {
            PairSchedule::All { len } => *len,
            PairSchedule::Blocked { slots, .. } => slots.len(),
        }
    }

    /// Number of later records `index` is compared against.
    fn partner_count(&self, index: usize) -> usize {
        match self {
            PairSchedule::All { len } => len - index - 1,
            PairSchedule::Blocked { buckets, slots } => {
                let (bucket, position) = slots[index];
                buckets[bucket].len() - position - 1
            }
        }
    }

    fn partner(&self, index: usize, nth: usize) -> usize {
        match self {
            PairSchedule::All { .. } => index + 1 + nth,
            PairSchedule::Blocked { buckets, slots } => {
                let (bucket, position) = slots[index];
                buckets[bucket][position + 1 + nth]
            }
        }
    }

    fn total(&self) -> u64 {
        match self {
            PairSchedule::All { len } => {
                let n = *len as u64;
                n * n.saturating_sub(1) / 2
            }
            PairSchedule::Blocked { buckets, .. } => buckets
                .iter()
                .map(|bucket| {
                    let n = bucket.len() as u64;
                    n * n.saturating_sub(1) / 2
                })
                .sum(),
        }
    }
}

/// Walks the schedule in ascending `i`, then ascending `j`.
#[derive(Debug, Default)]
struct PairCursor {
    index: usize,
    nth: usize,
}

impl PairCursor {
    fn next_pair(&mut self, schedule: &PairSchedule) -> Option<(usize, usize)> {
        while self.index < schedule.len() {
            if self.nth < schedule.partner_count(self.index) {
                let pair = (self.index, schedule.partner(self.index, self.nth));
                self.nth += 1;
                return Some(pair);
            }
            self.index += 1;
            self.nth = 0;
        }
        None
    }
}

/// A running deduplication pass, consumed as an iterator of [`DedupeEvent`]s.
///
/// Each call to `next` that needs new events processes one batch of
/// comparisons, then yields the batch's duplicate pairs followed by one
/// progress snapshot. Cancellation is checked before every batch.
pub struct Comparison<'a> {
    deduplicator: &'a Deduplicator,
    records: Vec<Reference>,
    fields: Vec<NormalizedFields>,
    schedule: PairSchedule,
    cursor: PairCursor,
    resolver: Option<Resolver>,
    cancel: CancellationToken,
    pending: VecDeque<DedupeEvent>,
    completed: u64,
    total: u64,
    duplicates_found: usize,
    scorer_errors: usize,
    started: bool,
    /// Set together with the terminal event; `true` when the run was cancelled.
    terminal: Option<(RunResult, bool)>,
}

impl<'a> Comparison<'a> {
    pub(super) fn new(
        deduplicator: &'a Deduplicator,
        records: Vec<Reference>,
        cancel: CancellationToken,
    ) -> Self {
        let config = deduplicator.config();
        let fields = records.iter().map(NormalizedFields::from_reference).collect();
        let schedule = PairSchedule::new(&records, config.blocking.as_ref());
        let total = schedule.total();
        debug!(total, "comparison schedule built");
        Self {
            deduplicator,
            resolver: Some(Resolver::new(config.policy, records.len())),
            records,
            fields,
            schedule,
            cursor: PairCursor::default(),
            cancel,
            pending: VecDeque::new(),
            completed: 0,
            total,
            duplicates_found: 0,
            scorer_errors: 0,
            started: false,
            terminal: None,
        }
    }

    /// The progress at this point of the run.
    pub fn progress(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            completed: self.completed,
            total: self.total,
        }
    }

    /// Runs to the end (or to cancellation), collecting the duplicate pairs.
    ///
    /// Safe to call on a partly or fully consumed comparison: `pairs` then
    /// holds only the pairs not yet yielded, while `result` is always the
    /// run's terminal result.
    pub fn finish(mut self) -> RunOutcome {
        let pairs = self
            .by_ref()
            .filter_map(|event| match event {
                DedupeEvent::DuplicatePair(pair) => Some(pair),
                _ => None,
            })
            .collect();
        let (result, cancelled) = match self.terminal.take() {
            Some(terminal) => terminal,
            None => (self.take_result(), self.cancel.is_cancelled()),
        };
        RunOutcome {
            result,
            pairs,
            cancelled,
        }
    }

    fn candidate(&self, index: usize) -> Candidate<'_> {
        Candidate {
            index,
            reference: &self.records[index],
            fields: &self.fields[index],
        }
    }

    fn judge_pair(&self, earlier: usize, later: usize) -> Result<Verdict, ScorerError> {
        self.deduplicator
            .judge(&self.candidate(earlier), &self.candidate(later))
    }

    fn record_ref(&self, index: usize) -> RecordRef {
        RecordRef {
            index,
            stable_id: self.records[index].stable_id(),
        }
    }

    fn run_batch(&mut self) {
        let batch_size = self.deduplicator.config().batch_size;
        let mut batch = Vec::with_capacity(batch_size.min(4096));
        while batch.len() < batch_size {
            match self.cursor.next_pair(&self.schedule) {
                Some(pair) => batch.push(pair),
                None => break,
            }
        }

        // Verdicts come back in batch order, which is (i, j) order.
        let verdicts: Vec<Result<Verdict, ScorerError>> = {
            let this = &*self;
            if this.deduplicator.config().run_in_parallel && batch.len() > 1 {
                batch
                    .par_iter()
                    .map(|&(earlier, later)| this.judge_pair(earlier, later))
                    .collect()
            } else {
                batch
                    .iter()
                    .map(|&(earlier, later)| this.judge_pair(earlier, later))
                    .collect()
            }
        };

        for ((earlier, later), verdict) in batch.into_iter().zip(verdicts) {
            self.completed += 1;
            match verdict {
                Ok(verdict) if verdict.is_duplicate => {
                    self.duplicates_found += 1;
                    if let Some(resolver) = self.resolver.as_mut() {
                        resolver.record(&self.records[earlier], later);
                    }
                    let pair = DuplicatePair {
                        earlier: self.record_ref(earlier),
                        later: self.record_ref(later),
                        verdict,
                    };
                    self.pending.push_back(DedupeEvent::DuplicatePair(pair));
                }
                Ok(_) => {}
                Err(error) => {
                    self.scorer_errors += 1;
                    warn!(earlier, later, %error, "scorer error, pair treated as distinct");
                }
            }
        }
        self.pending.push_back(DedupeEvent::Progress(self.progress()));
    }

    fn take_result(&mut self) -> RunResult {
        let records = std::mem::take(&mut self.records);
        let records = match self.resolver.take() {
            Some(resolver) => resolver.apply(records),
            None => records,
        };
        RunResult {
            records,
            duplicates_found: self.duplicates_found,
            scorer_errors: self.scorer_errors,
            progress: self.progress(),
        }
    }

    fn advance(&mut self) {
        if !self.started {
            self.started = true;
            if self.total == 0 {
                self.pending.push_back(DedupeEvent::Progress(self.progress()));
                return;
            }
        }

        if self.completed == self.total {
            info!(
                comparisons = self.completed,
                duplicates = self.duplicates_found,
                scorer_errors = self.scorer_errors,
                "deduplication finished"
            );
            let result = self.take_result();
            self.pending.push_back(DedupeEvent::End(result.clone()));
            self.terminal = Some((result, false));
        } else if self.cancel.is_cancelled() {
            info!(
                comparisons = self.completed,
                total = self.total,
                duplicates = self.duplicates_found,
                "deduplication cancelled"
            );
            let result = self.take_result();
            self.pending.push_back(DedupeEvent::Cancelled(result.clone()));
            self.terminal = Some((result, true));
        } else {
            self.run_batch();
        }
    }
}

impl Iterator for Comparison<'_> {
    type Item = DedupeEvent;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if self.terminal.is_some() {
                return None;
            }
            self.advance();
        }
    }
}
