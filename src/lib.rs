//! # Handprint: Rabin fingerprints and near-duplicate detection
//!
//! This library fingerprints byte streams with Rabin's polynomial method over
//! GF(2), splits them into content-defined chunks, and compares files by a
//! small sketch of their chunk fingerprints.
//!
//! ## Pipeline
//!
//! 1. **Polynomials**: arithmetic in GF(2)\[x\] and an irreducible modulus
//! 2. **Fingerprints**: rolling `m(x) mod p(x)` over bytes, by reference
//!    polynomial math or by precomputed tables
//! 3. **Chunking**: cut where the windowed fingerprint matches a pattern
//! 4. **Handprints**: whole-file palm, sorted fingers, top-K hand
//! 5. **Matching**: exact, partial and non-matches between two corpora
//!
//! ## Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use handprint::{FileSource, FingerFactory, Handprint, HandprintConfig, TableFingerprint};
//!
//! let config = HandprintConfig::default();
//! let factory = Arc::new(FingerFactory::<TableFingerprint>::new(&config)?);
//! let a = Handprint::new(FileSource::new("a.bin"), Arc::clone(&factory));
//! let b = Handprint::new(FileSource::new("b.bin"), factory);
//! println!("similarity: {:.3}", handprint::similarity(&a, &b)?);
//! # Ok::<(), handprint::HandprintError>(())
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod polynomial;   // GF(2) polynomials and irreducibility
pub mod fingerprint;  // Rabin fingerprint engines
pub mod chunker;      // Content-defined chunking
pub mod handprint;    // Palm, fingers and hand of one file
pub mod matching;     // Batch classification
pub mod config;       // Parameters

// Re-exports for convenience
pub use polynomial::{Polynomial, PolynomialError, Reducibility, DEFAULT_MODULUS};
pub use fingerprint::{FingerprintError, PolynomialFingerprint, RabinFingerprint, TableFingerprint};
pub use chunker::{BoundaryRule, ByteSource, Chunk, Chunker, FileSource, MemorySource};
pub use handprint::{count_overlap, hand_similarity, similarity, FingerFactory, Handprint, PalmBatch};
pub use matching::{BatchStats, Exclusion, Match, MatchKind, MatchModel, MatchReport};
pub use config::HandprintConfig;

use std::io;

use thiserror::Error;

/// Errors from handprinting and matching.
#[derive(Debug, Error)]
pub enum HandprintError {
    /// Opening or reading one source failed.
    #[error("I/O error on {source_label}: {source}")]
    Io {
        /// Label of the source.
        source_label: String,
        /// Underlying error.
        source: io::Error,
    },

    /// The second chunking pass read a different length than the first.
    #[error("{label} changed while being read: expected {expected} bytes, read {actual}")]
    SourceChanged {
        /// Label of the source.
        label: String,
        /// Length seen by the boundary pass.
        expected: u64,
        /// Length seen by the fingerprint pass.
        actual: u64,
    },

    /// Engine construction failed.
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    /// Rejected configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The worker pool could not be started.
    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl HandprintError {
    /// Wrap an I/O error with the label of the source it concerns.
    pub fn io(source_label: &str, source: io::Error) -> Self {
        Self::Io {
            source_label: source_label.to_string(),
            source,
        }
    }
}
