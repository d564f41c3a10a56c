//! Content-defined chunking
//!
//! A stream is cut wherever the rolling fingerprint of the last W bytes
//! matches a bit pattern, so cut points follow the content rather than fixed
//! offsets. An edit shifts only the boundaries whose window it touches;
//! boundaries elsewhere keep their fingerprints and merely move by the
//! length delta.
//!
//! Chunking takes two sequential passes over the source:
//!
//! 1. **Boundary pass**: push every byte into a windowed detector and
//!    record offset `i + 1` whenever `(fingerprint & mask) == pattern`
//!    after byte `i`.
//! 2. **Fingerprint pass**: re-open the source and fingerprint each range
//!    between consecutive boundaries with a fresh non-windowed hasher.
//!
//! The last chunk always closes at end of stream. An empty stream yields the
//! single chunk `[0, 0)`. There is no minimum or maximum chunk size; with a
//! k-bit mask the expected chunk size is `2^k` bytes.

use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::fingerprint::RabinFingerprint;
use crate::HandprintError;

/// Default read buffer per stream.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Default boundary mask: the low 12 bits.
pub const DEFAULT_BOUNDARY_MASK: u64 = 0xFFF;

/// Default boundary pattern within [`DEFAULT_BOUNDARY_MASK`].
pub const DEFAULT_BOUNDARY_PATTERN: u64 = 0xABC;

/// A re-readable byte stream.
///
/// Chunking opens the source twice, so every `open` must yield the same
/// bytes. Traversal of directories is the caller's business; a source is
/// exactly one stream.
pub trait ByteSource: Send + Sync {
    /// Reader handed out by [`ByteSource::open`]. Dropping it closes the
    /// underlying stream.
    type Reader: Read;

    /// Start reading from the first byte.
    fn open(&self) -> io::Result<Self::Reader>;

    /// Human-readable name used in errors and logs.
    fn label(&self) -> Cow<'_, str>;
}

/// A file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Source reading `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    type Reader = BufReader<File>;

    fn open(&self) -> io::Result<Self::Reader> {
        File::open(&self.path).map(BufReader::new)
    }

    fn label(&self) -> Cow<'_, str> {
        self.path.to_string_lossy()
    }
}

/// An in-memory buffer, cheap to clone.
#[derive(Debug, Clone)]
pub struct MemorySource {
    label: String,
    bytes: Arc<[u8]>,
}

impl MemorySource {
    /// Source over `bytes`, reported as `label`.
    pub fn new(label: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            label: label.into(),
            bytes: bytes.into(),
        }
    }

    /// The buffered bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl ByteSource for MemorySource {
    type Reader = Cursor<Arc<[u8]>>;

    fn open(&self) -> io::Result<Self::Reader> {
        Ok(Cursor::new(Arc::clone(&self.bytes)))
    }

    fn label(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.label)
    }
}

/// A half-open byte range `[start, end)` of a stream and its fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Chunk {
    /// First byte offset.
    pub start: u64,
    /// One past the last byte offset.
    pub end: u64,
    /// Non-windowed fingerprint of the bytes in range.
    pub fingerprint: u64,
}

impl Chunk {
    /// Length in bytes.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// True only for the chunk of an empty stream.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The byte range.
    pub fn range(&self) -> Range<u64> {
        self.start..self.end
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}) {:#x}", self.start, self.end, self.fingerprint)
    }
}

/// Cut-point test `(fingerprint & mask) == pattern`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundaryRule {
    /// Bits of the fingerprint that are compared.
    pub mask: u64,
    /// Required value of the masked bits.
    pub pattern: u64,
}

impl BoundaryRule {
    /// Rule matching `pattern` under `mask`.
    pub fn new(mask: u64, pattern: u64) -> Self {
        Self { mask, pattern }
    }

    /// Whether a fingerprint value marks a boundary.
    #[inline]
    pub fn is_boundary(&self, fingerprint: u64) -> bool {
        fingerprint & self.mask == self.pattern
    }

    /// A pattern with bits outside the mask can never match.
    pub fn is_satisfiable(&self) -> bool {
        self.pattern & !self.mask == 0
    }

    /// Mean distance between boundaries on random input, `2^popcount(mask)`.
    pub fn expected_chunk_size(&self) -> f64 {
        2f64.powi(self.mask.count_ones() as i32)
    }
}

impl Default for BoundaryRule {
    fn default() -> Self {
        Self::new(DEFAULT_BOUNDARY_MASK, DEFAULT_BOUNDARY_PATTERN)
    }
}

/// Result of the boundary pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Boundaries {
    /// Content-defined cut offsets, strictly increasing, each in
    /// `1..=stream_len`.
    pub offsets: Vec<u64>,
    /// Total bytes seen.
    pub stream_len: u64,
}

impl Boundaries {
    /// The ranges the cuts produce, tiling `0..stream_len` with a trailing
    /// range that closes at end of stream.
    pub fn ranges(&self) -> Vec<Range<u64>> {
        if self.stream_len == 0 {
            return vec![0..0];
        }
        let mut ranges = Vec::with_capacity(self.offsets.len() + 1);
        let mut start = 0;
        for &end in &self.offsets {
            ranges.push(start..end);
            start = end;
        }
        if start < self.stream_len {
            ranges.push(start..self.stream_len);
        }
        ranges
    }
}

/// Two-pass content-defined chunker.
///
/// Owns its engines; give each worker its own chunker (or clones of the
/// engines) since the engines are mutated as bytes are pushed.
#[derive(Debug, Clone)]
pub struct Chunker<F> {
    detector: F,
    hasher: F,
    rule: BoundaryRule,
    buffer_size: usize,
}

impl<F: RabinFingerprint> Chunker<F> {
    /// Chunker cutting where `detector` (windowed) satisfies `rule`, with
    /// chunks fingerprinted by `hasher` (non-windowed).
    pub fn new(detector: F, hasher: F, rule: BoundaryRule) -> Self {
        Self {
            detector,
            hasher,
            rule,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Read buffer size for both passes; zero is bumped to one byte.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    /// The cut-point rule.
    pub fn rule(&self) -> BoundaryRule {
        self.rule
    }

    /// Boundary pass over `reader`.
    pub fn find_boundaries<R: Read>(&mut self, mut reader: R) -> io::Result<Boundaries> {
        self.detector.reset();
        let mut buffer = vec![0u8; self.buffer_size];
        let mut boundaries = Boundaries::default();
        let mut offset = 0u64;

        loop {
            let n = read_some(&mut reader, &mut buffer)?;
            if n == 0 {
                break;
            }
            for &byte in &buffer[..n] {
                self.detector.push_byte(byte);
                offset += 1;
                if self.rule.is_boundary(self.detector.value()) {
                    boundaries.offsets.push(offset);
                }
            }
        }

        boundaries.stream_len = offset;
        Ok(boundaries)
    }

    /// Fingerprint pass: hash each of `ranges` (contiguous from offset 0)
    /// from `reader`. Also returns the number of bytes the reader produced,
    /// which differs from the ranges' end if the stream changed.
    pub fn fingerprint_ranges<R: Read>(
        &mut self,
        mut reader: R,
        ranges: &[Range<u64>],
    ) -> io::Result<(Vec<Chunk>, u64)> {
        let mut chunks = Vec::with_capacity(ranges.len());
        let mut pending = ranges.iter().filter(|range| !range.is_empty());
        let mut current = pending.next();
        let mut buffer = vec![0u8; self.buffer_size];
        let mut offset = 0u64;

        self.hasher.reset();
        loop {
            let n = read_some(&mut reader, &mut buffer)?;
            if n == 0 {
                break;
            }
            for &byte in &buffer[..n] {
                self.hasher.push_byte(byte);
                offset += 1;
                if let Some(range) = current.filter(|range| range.end == offset) {
                    chunks.push(Chunk {
                        start: range.start,
                        end: range.end,
                        fingerprint: self.hasher.value(),
                    });
                    self.hasher.reset();
                    current = pending.next();
                }
            }
        }

        if offset == 0 && ranges.iter().all(|range| range.is_empty()) {
            chunks.push(Chunk {
                start: 0,
                end: 0,
                fingerprint: self.hasher.value(),
            });
        }
        Ok((chunks, offset))
    }

    /// Both passes over `source`.
    ///
    /// Fails with [`HandprintError::SourceChanged`] if the second pass reads
    /// a different number of bytes than the first.
    pub fn chunk<S: ByteSource + ?Sized>(&mut self, source: &S) -> Result<Vec<Chunk>, HandprintError> {
        let label = source.label();

        let reader = source.open().map_err(|err| HandprintError::io(&label, err))?;
        let boundaries = self
            .find_boundaries(reader)
            .map_err(|err| HandprintError::io(&label, err))?;

        let reader = source.open().map_err(|err| HandprintError::io(&label, err))?;
        let (chunks, consumed) = self
            .fingerprint_ranges(reader, &boundaries.ranges())
            .map_err(|err| HandprintError::io(&label, err))?;

        if consumed != boundaries.stream_len {
            return Err(HandprintError::SourceChanged {
                label: label.into_owned(),
                expected: boundaries.stream_len,
                actual: consumed,
            });
        }

        tracing::trace!(
            source = %label,
            bytes = boundaries.stream_len,
            chunks = chunks.len(),
            "chunked"
        );
        Ok(chunks)
    }
}

/// One `read` call, retried on `Interrupted`.
pub(crate) fn read_some<R: Read>(reader: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buffer) {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}
