//! Per-file handprints
//!
//! A handprint summarizes one stream at three levels of detail:
//!
//! - **palm**: the fingerprint of the whole stream, for exact duplicates
//! - **fingers**: every chunk fingerprint, highest value first
//! - **hand**: the first K fingers, a fixed-size similarity sketch
//!
//! Fingers are ordered by descending fingerprint because low values are
//! over-represented (long runs of zero bytes fingerprint to small numbers);
//! the high end is sparser and makes a more discriminating prefix.

mod similarity;

pub use similarity::{count_overlap, hand_similarity, similarity};

use std::borrow::Cow;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use crate::chunker::{read_some, BoundaryRule, ByteSource, Chunk, Chunker, FileSource};
use crate::config::HandprintConfig;
use crate::fingerprint::RabinFingerprint;
use crate::matching::{BatchStats, Exclusion};
use crate::HandprintError;

/// Default number of fingers in a hand.
pub const DEFAULT_HAND_SIZE: usize = 10;

/// Configured engines and parameters for building handprints.
///
/// Holds one template engine of each kind and hands out reset clones, so
/// concurrent callers never share mutable fingerprint state. Precomputed
/// tables are shared by every clone.
#[derive(Debug, Clone)]
pub struct FingerFactory<F> {
    detector: F,
    hasher: F,
    rule: BoundaryRule,
    hand_size: usize,
    buffer_size: usize,
}

impl<F: RabinFingerprint> FingerFactory<F> {
    /// Validate `config` and build both template engines.
    pub fn new(config: &HandprintConfig) -> Result<Self, HandprintError> {
        config.validate()?;
        Ok(Self {
            detector: F::windowed(&config.modulus, config.window_size)?,
            hasher: F::new(&config.modulus)?,
            rule: config.boundary_rule(),
            hand_size: config.hand_size,
            buffer_size: config.buffer_size,
        })
    }

    /// Fresh non-windowed engine.
    pub fn hasher(&self) -> F {
        let mut hasher = self.hasher.clone();
        hasher.reset();
        hasher
    }

    /// Fresh windowed boundary detector.
    pub fn detector(&self) -> F {
        let mut detector = self.detector.clone();
        detector.reset();
        detector
    }

    /// Chunker with private engines.
    pub fn chunker(&self) -> Chunker<F> {
        Chunker::new(self.detector(), self.hasher(), self.rule).with_buffer_size(self.buffer_size)
    }

    /// Fingers kept in a hand.
    pub fn hand_size(&self) -> usize {
        self.hand_size
    }

    /// Fingerprint of the entire stream.
    pub fn palm<S: ByteSource + ?Sized>(&self, source: &S) -> Result<u64, HandprintError> {
        let label = source.label();
        let mut reader = source.open().map_err(|err| HandprintError::io(&label, err))?;
        let mut hasher = self.hasher();
        let mut buffer = vec![0u8; self.buffer_size];
        loop {
            let n = read_some(&mut reader, &mut buffer)
                .map_err(|err| HandprintError::io(&label, err))?;
            if n == 0 {
                break;
            }
            hasher.push_bytes(&buffer[..n]);
        }
        Ok(hasher.value())
    }

    /// Palm of every source in `sources`, in input order. A source that
    /// cannot be read is excluded and logged; the rest are still processed.
    pub fn palms<S: ByteSource>(&self, sources: &[S]) -> PalmBatch {
        let mut batch = PalmBatch::default();
        for source in sources {
            let label = source.label().into_owned();
            match self.palm(source) {
                Ok(palm) => {
                    batch.palms.push((label, palm));
                    batch.stats.processed += 1;
                }
                Err(error) => {
                    tracing::warn!(source = %label, %error, "excluding file");
                    batch.stats.excluded.push(Exclusion { label, error });
                }
            }
        }
        tracing::info!(
            processed = batch.stats.processed,
            excluded = batch.stats.excluded.len(),
            "palms finished"
        );
        batch
    }

    /// Chunks of the stream, one per distinct fingerprint value, in
    /// descending fingerprint order. When several chunks share a value the
    /// latest one is kept.
    pub fn fingers<S: ByteSource + ?Sized>(&self, source: &S) -> Result<Vec<Chunk>, HandprintError> {
        let chunks = self.chunker().chunk(source)?;
        let mut by_value: BTreeMap<Reverse<u64>, Chunk> = BTreeMap::new();
        for chunk in chunks {
            by_value.insert(Reverse(chunk.fingerprint), chunk);
        }
        Ok(by_value.into_values().collect())
    }
}

/// Output of [`FingerFactory::palms`].
#[derive(Debug, Default)]
pub struct PalmBatch {
    /// `(label, palm)` of each readable source, in input order.
    pub palms: Vec<(String, u64)>,
    /// Processed and excluded counts.
    pub stats: BatchStats,
}

/// Lazily computed handprint of one source.
///
/// Palm and fingers are each computed on first use and cached; the hand is a
/// prefix of the cached fingers. Safe to share between threads: concurrent
/// first calls may both compute, but only one result is kept.
#[derive(Debug)]
pub struct Handprint<F, S = FileSource> {
    source: S,
    factory: Arc<FingerFactory<F>>,
    palm: OnceLock<u64>,
    fingers: OnceLock<Vec<Chunk>>,
}

impl<F: RabinFingerprint, S: ByteSource> Handprint<F, S> {
    /// Handprint of `source` built with `factory`'s settings. Nothing is read
    /// until a value is requested.
    pub fn new(source: S, factory: Arc<FingerFactory<F>>) -> Self {
        Self {
            source,
            factory,
            palm: OnceLock::new(),
            fingers: OnceLock::new(),
        }
    }

    /// The underlying source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The source's label.
    pub fn label(&self) -> Cow<'_, str> {
        self.source.label()
    }

    /// Whole-stream fingerprint.
    pub fn palm(&self) -> Result<u64, HandprintError> {
        if let Some(&palm) = self.palm.get() {
            return Ok(palm);
        }
        let palm = self.factory.palm(&self.source)?;
        Ok(*self.palm.get_or_init(|| palm))
    }

    /// All distinct chunk fingerprints, descending.
    pub fn fingers(&self) -> Result<&[Chunk], HandprintError> {
        if let Some(fingers) = self.fingers.get() {
            return Ok(fingers);
        }
        let fingers = self.factory.fingers(&self.source)?;
        Ok(self.fingers.get_or_init(|| fingers))
    }

    /// The top `hand_size` fingers.
    pub fn hand(&self) -> Result<&[Chunk], HandprintError> {
        let fingers = self.fingers()?;
        Ok(&fingers[..fingers.len().min(self.factory.hand_size())])
    }

    /// Number of distinct chunk fingerprints.
    pub fn finger_count(&self) -> Result<usize, HandprintError> {
        Ok(self.fingers()?.len())
    }

    /// Compute and cache every value.
    pub fn build_all(&self) -> Result<(), HandprintError> {
        self.palm()?;
        self.hand()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::MemorySource;
    use crate::fingerprint::TableFingerprint;

    fn factory(hand_size: usize) -> Arc<FingerFactory<TableFingerprint>> {
        let config = HandprintConfig {
            boundary_mask: 0x3F,
            boundary_pattern: 0x15,
            hand_size,
            ..HandprintConfig::default()
        };
        Arc::new(FingerFactory::new(&config).unwrap())
    }

    fn text(len: usize) -> Vec<u8> {
        let mut state = 0x2545_F491_4F6C_DD1Du64;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 32) as u8
            })
            .collect()
    }

    #[test]
    fn test_palm_is_whole_stream_fingerprint() {
        let factory = factory(10);
        let handprint = Handprint::new(MemorySource::new("hello", b"hello".to_vec()), factory);
        assert_eq!(handprint.palm().unwrap(), 0x68_656c_6c6f);
    }

    #[test]
    fn test_fingers_sorted_descending_and_distinct() {
        let handprint = Handprint::new(MemorySource::new("text", text(20_000)), factory(10));
        let fingers = handprint.fingers().unwrap();
        assert!(fingers.len() > 10);
        assert!(fingers.windows(2).all(|w| w[0].fingerprint > w[1].fingerprint));
    }

    #[test]
    fn test_hand_is_prefix_of_fingers() {
        let handprint = Handprint::new(MemorySource::new("text", text(20_000)), factory(4));
        handprint.build_all().unwrap();
        let hand = handprint.hand().unwrap();
        assert_eq!(hand.len(), 4);
        assert_eq!(hand, &handprint.fingers().unwrap()[..4]);
    }

    #[test]
    fn test_short_stream_hand_has_all_fingers() {
        let handprint = Handprint::new(MemorySource::new("tiny", b"ab".to_vec()), factory(10));
        assert_eq!(handprint.finger_count().unwrap(), 1);
        assert_eq!(handprint.hand().unwrap().len(), 1);
    }

    #[test]
    fn test_repeated_chunks_keep_last_interval() {
        // The same block twice yields identical chunk fingerprints.
        let block = text(5_000);
        let mut data = block.clone();
        data.extend_from_slice(&[0u8; 64]);
        data.extend_from_slice(&block);
        let factory = factory(10);

        let all = factory.chunker().chunk(&MemorySource::new("data", data.clone())).unwrap();
        let fingers = factory.fingers(&MemorySource::new("data", data)).unwrap();
        assert!(fingers.len() < all.len());
        for finger in &fingers {
            let last = all
                .iter()
                .rev()
                .find(|chunk| chunk.fingerprint == finger.fingerprint)
                .unwrap();
            assert_eq!(last, finger);
        }
        assert!(fingers.iter().any(|finger| finger.start > 5_064));
    }

    #[test]
    fn test_palms_skip_unreadable_sources() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.bin");
        std::fs::write(&present, b"hello").unwrap();
        let sources = [
            FileSource::new(dir.path().join("missing.bin")),
            FileSource::new(&present),
            FileSource::new(dir.path().join("also-missing.bin")),
        ];

        let batch = factory(10).palms(&sources);
        assert_eq!(batch.palms.len(), 1);
        assert!(batch.palms[0].0.ends_with("present.bin"));
        assert_eq!(batch.palms[0].1, 0x68_656c_6c6f);
        assert_eq!(batch.stats.processed, 1);
        assert_eq!(batch.stats.excluded.len(), 2);
        assert!(batch.stats.excluded[0].label.ends_with("missing.bin"));
        assert!(matches!(batch.stats.excluded[1].error, HandprintError::Io { .. }));
    }

    #[test]
    fn test_hasher_clones_are_fresh() {
        let factory = factory(10);
        let mut a = factory.hasher();
        a.push_bytes(b"dirty");
        let b = factory.hasher();
        assert_eq!(b.value(), 0);
        assert_eq!(b.bytes_fingerprinted(), 0);
    }
}
