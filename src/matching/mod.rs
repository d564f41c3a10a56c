//! Batch classification of two corpora
//!
//! [`MatchModel::classify`] pairs files of corpus A with files of corpus B
//! in three phases:
//!
//! 1. **Exact**: files whose palms are equal.
//! 2. **Partial**: among files left over, pairs whose hands share at least
//!    one fingerprint value, scored by hand similarity.
//! 3. **Non-match**: everything still unpaired.
//!
//! Each phase fans out over a fixed-size worker pool and waits for every
//! file before the next phase starts, so files paired in phase 1 are never
//! seen by phase 2. Pairing is greedy: buckets are visited in ascending
//! fingerprint order and the first available counterpart wins. This is not
//! an optimal assignment.
//!
//! A file that cannot be read is excluded and reported in [`BatchStats`];
//! the rest of the batch carries on.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::chunker::{ByteSource, FileSource};
use crate::fingerprint::RabinFingerprint;
use crate::handprint::{hand_similarity, Handprint};
use crate::HandprintError;

/// How a pair (or a lone file) was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    /// Identical palms.
    Exact,
    /// Hands share at least one fingerprint.
    Partial,
    /// No counterpart found.
    NonMatch,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exact => "exact",
            Self::Partial => "partial",
            Self::NonMatch => "none",
        })
    }
}

/// One classification result. A non-match has exactly one side set.
#[derive(Debug)]
pub struct Match<F, S = FileSource> {
    /// Classification.
    pub kind: MatchKind,
    /// File from corpus A.
    pub a: Option<Arc<Handprint<F, S>>>,
    /// File from corpus B.
    pub b: Option<Arc<Handprint<F, S>>>,
    /// 1.0 for exact matches, hand similarity for partial ones, 0.0 otherwise.
    pub similarity: f64,
}

impl<F: RabinFingerprint, S: ByteSource> fmt::Display for Match<F, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |h: &Option<Arc<Handprint<F, S>>>| {
            h.as_ref()
                .map_or_else(|| "-".to_string(), |h| h.label().into_owned())
        };
        write!(
            f,
            "{:<7} {:.3}  {}  {}",
            self.kind,
            self.similarity,
            side(&self.a),
            side(&self.b)
        )
    }
}

/// A file dropped from the batch.
#[derive(Debug)]
pub struct Exclusion {
    /// Label of the source that failed.
    pub label: String,
    /// Why it failed.
    pub error: HandprintError,
}

/// Counts for a batch run.
#[derive(Debug, Default)]
pub struct BatchStats {
    /// Files classified in some list of the report.
    pub processed: usize,
    /// Files dropped because they could not be read.
    pub excluded: Vec<Exclusion>,
}

/// Output of [`MatchModel::classify`].
#[derive(Debug)]
pub struct MatchReport<F, S = FileSource> {
    /// Palm-equal pairs.
    pub exact: Vec<Match<F, S>>,
    /// Hand-overlapping pairs.
    pub partial: Vec<Match<F, S>>,
    /// Unpaired files from either corpus.
    pub unmatched: Vec<Match<F, S>>,
    /// Processed and excluded counts.
    pub stats: BatchStats,
}

impl<F, S> MatchReport<F, S> {
    /// Every result: exact, then partial, then non-matches.
    pub fn iter(&self) -> impl Iterator<Item = &Match<F, S>> {
        self.exact.iter().chain(&self.partial).chain(&self.unmatched)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Pending,
    Matched,
    Excluded,
}

/// Greedy three-phase matcher over a dedicated thread pool.
#[derive(Debug)]
pub struct MatchModel {
    pool: ThreadPool,
}

impl MatchModel {
    /// Matcher running on `workers` threads.
    pub fn new(workers: usize) -> Result<Self, HandprintError> {
        if workers == 0 {
            return Err(HandprintError::InvalidConfig(
                "worker count must be non-zero".to_string(),
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("handprint-{i}"))
            .build()?;
        Ok(Self { pool })
    }

    /// Worker threads in the pool.
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Classify every file of both corpora.
    pub fn classify<F, S>(
        &self,
        corpus_a: &[Arc<Handprint<F, S>>],
        corpus_b: &[Arc<Handprint<F, S>>],
    ) -> MatchReport<F, S>
    where
        F: RabinFingerprint,
        S: ByteSource,
    {
        let mut report = MatchReport {
            exact: Vec::new(),
            partial: Vec::new(),
            unmatched: Vec::new(),
            stats: BatchStats::default(),
        };
        let mut slots_a = vec![Slot::Pending; corpus_a.len()];
        let mut slots_b = vec![Slot::Pending; corpus_b.len()];

        tracing::info!(
            files_a = corpus_a.len(),
            files_b = corpus_b.len(),
            workers = self.workers(),
            "exact match phase"
        );
        let palms_a = self.bucket_palms(corpus_a, &mut slots_a, &mut report.stats);
        let palms_b = self.bucket_palms(corpus_b, &mut slots_b, &mut report.stats);
        for (palm, &i) in &palms_a {
            if let Some(&j) = palms_b.get(palm) {
                slots_a[i] = Slot::Matched;
                slots_b[j] = Slot::Matched;
                let m = Match {
                    kind: MatchKind::Exact,
                    a: Some(Arc::clone(&corpus_a[i])),
                    b: Some(Arc::clone(&corpus_b[j])),
                    similarity: 1.0,
                };
                tracing::debug!(palm, "{m}");
                report.exact.push(m);
            }
        }

        tracing::info!(exact = report.exact.len(), "partial match phase");
        let hands_a = self.index_hands(corpus_a, &mut slots_a, &mut report.stats);
        let hands_b = self.index_hands(corpus_b, &mut slots_b, &mut report.stats);
        for (value, owners_a) in &hands_a {
            let Some(owners_b) = hands_b.get(value) else {
                continue;
            };
            for &i in owners_a {
                if slots_a[i] != Slot::Pending {
                    continue;
                }
                let Some(&j) = owners_b.iter().find(|&&j| slots_b[j] == Slot::Pending) else {
                    break;
                };
                slots_a[i] = Slot::Matched;
                slots_b[j] = Slot::Matched;
                let score = match (corpus_a[i].hand(), corpus_b[j].hand()) {
                    (Ok(a), Ok(b)) => hand_similarity(a, b),
                    _ => 0.0,
                };
                let m = Match {
                    kind: MatchKind::Partial,
                    a: Some(Arc::clone(&corpus_a[i])),
                    b: Some(Arc::clone(&corpus_b[j])),
                    similarity: score,
                };
                tracing::debug!(finger = value, "{m}");
                report.partial.push(m);
            }
        }

        tracing::info!(partial = report.partial.len(), "non-match phase");
        let lone_a = pending(&slots_a).map(|i| Match {
            kind: MatchKind::NonMatch,
            a: Some(Arc::clone(&corpus_a[i])),
            b: None,
            similarity: 0.0,
        });
        let lone_b = pending(&slots_b).map(|j| Match {
            kind: MatchKind::NonMatch,
            a: None,
            b: Some(Arc::clone(&corpus_b[j])),
            similarity: 0.0,
        });
        report.unmatched = lone_a.chain(lone_b).collect();

        report.stats.processed =
            2 * (report.exact.len() + report.partial.len()) + report.unmatched.len();
        tracing::info!(
            exact = report.exact.len(),
            partial = report.partial.len(),
            unmatched = report.unmatched.len(),
            processed = report.stats.processed,
            excluded = report.stats.excluded.len(),
            "classification finished"
        );
        report
    }

    /// Palm of every pending file, bucketed by value. The first file with a
    /// given palm owns the bucket; later duplicates stay pending.
    fn bucket_palms<F, S>(
        &self,
        corpus: &[Arc<Handprint<F, S>>],
        slots: &mut [Slot],
        stats: &mut BatchStats,
    ) -> BTreeMap<u64, usize>
    where
        F: RabinFingerprint,
        S: ByteSource,
    {
        let palms: Vec<(usize, Result<u64, HandprintError>)> = self.pool.install(|| {
            corpus
                .par_iter()
                .enumerate()
                .map(|(i, handprint)| (i, handprint.palm()))
                .collect()
        });

        let mut buckets = BTreeMap::new();
        for (i, palm) in palms {
            match palm {
                Ok(palm) => {
                    buckets.entry(palm).or_insert(i);
                }
                Err(error) => exclude(&corpus[i], error, &mut slots[i], stats),
            }
        }
        buckets
    }

    /// Inverted index from hand fingerprint to the pending files holding it,
    /// owners in corpus order.
    fn index_hands<F, S>(
        &self,
        corpus: &[Arc<Handprint<F, S>>],
        slots: &mut [Slot],
        stats: &mut BatchStats,
    ) -> BTreeMap<u64, Vec<usize>>
    where
        F: RabinFingerprint,
        S: ByteSource,
    {
        let todo: Vec<usize> = pending(slots).collect();
        let hands: Vec<(usize, Result<Vec<u64>, HandprintError>)> = self.pool.install(|| {
            todo.par_iter()
                .map(|&i| {
                    let values = corpus[i]
                        .hand()
                        .map(|hand| hand.iter().map(|chunk| chunk.fingerprint).collect::<Vec<u64>>());
                    (i, values)
                })
                .collect()
        });

        let mut index: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
        for (i, values) in hands {
            match values {
                Ok(values) => {
                    for value in values {
                        index.entry(value).or_default().push(i);
                    }
                }
                Err(error) => exclude(&corpus[i], error, &mut slots[i], stats),
            }
        }
        index
    }
}

fn pending(slots: &[Slot]) -> impl Iterator<Item = usize> + '_ {
    slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| **slot == Slot::Pending)
        .map(|(i, _)| i)
}

fn exclude<F, S>(handprint: &Handprint<F, S>, error: HandprintError, slot: &mut Slot, stats: &mut BatchStats)
where
    F: RabinFingerprint,
    S: ByteSource,
{
    let label = handprint.label().into_owned();
    tracing::warn!(source = %label, %error, "excluding file");
    *slot = Slot::Excluded;
    stats.excluded.push(Exclusion { label, error });
}
