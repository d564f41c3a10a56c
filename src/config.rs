//! Configuration
//!
//! Every field that changes fingerprint values (modulus, window, boundary
//! rule, hand size) must be stored next to any persisted output, or the
//! output cannot be reproduced or compared.

use std::num::NonZeroUsize;

use crate::chunker::{BoundaryRule, DEFAULT_BOUNDARY_MASK, DEFAULT_BOUNDARY_PATTERN, DEFAULT_BUFFER_SIZE};
use crate::handprint::DEFAULT_HAND_SIZE;
use crate::polynomial::Polynomial;
use crate::HandprintError;

/// Default rolling window of the boundary detector, in bytes.
pub const DEFAULT_WINDOW_SIZE: usize = 8;

/// Parameters for fingerprinting, chunking and matching.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HandprintConfig {
    /// Fingerprint modulus. Should be irreducible.
    pub modulus: Polynomial,

    /// Rolling window of the boundary detector in bytes.
    pub window_size: usize,

    /// Fingerprint bits compared at each position.
    pub boundary_mask: u64,

    /// Value the masked bits must equal for a cut.
    pub boundary_pattern: u64,

    /// Fingers kept in a hand.
    pub hand_size: usize,

    /// Read buffer per stream in bytes.
    pub buffer_size: usize,

    /// Worker threads for batch matching.
    pub workers: usize,
}

impl Default for HandprintConfig {
    fn default() -> Self {
        Self {
            modulus: Polynomial::default_modulus(),
            window_size: DEFAULT_WINDOW_SIZE,
            boundary_mask: DEFAULT_BOUNDARY_MASK,
            boundary_pattern: DEFAULT_BOUNDARY_PATTERN,
            hand_size: DEFAULT_HAND_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            workers: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }
}

impl HandprintConfig {
    /// Defaults with a different modulus.
    pub fn with_modulus(modulus: Polynomial) -> Self {
        Self {
            modulus,
            ..Self::default()
        }
    }

    /// Reject settings that cannot work.
    ///
    /// Irreducibility of the modulus is not checked here; it costs a full
    /// Ben-Or test and a reducible modulus still yields valid, if weaker,
    /// fingerprints.
    pub fn validate(&self) -> Result<(), HandprintError> {
        let degree = self.modulus.degree();
        if degree < 1 {
            return Err(HandprintError::InvalidConfig(format!(
                "modulus {:#x} has degree {degree}, need at least 1",
                self.modulus
            )));
        }
        if self.window_size == 0 {
            return Err(HandprintError::InvalidConfig(
                "window size must be non-zero".to_string(),
            ));
        }
        if self.hand_size == 0 {
            return Err(HandprintError::InvalidConfig(
                "hand size must be non-zero".to_string(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(HandprintError::InvalidConfig(
                "buffer size must be non-zero".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(HandprintError::InvalidConfig(
                "worker count must be non-zero".to_string(),
            ));
        }

        let rule = self.boundary_rule();
        if !rule.is_satisfiable() {
            return Err(HandprintError::InvalidConfig(format!(
                "boundary pattern {:#x} has bits outside mask {:#x}",
                rule.pattern, rule.mask
            )));
        }
        let mask_bits = u64::BITS - rule.mask.leading_zeros();
        if i64::from(mask_bits) > degree {
            return Err(HandprintError::InvalidConfig(format!(
                "boundary mask {:#x} is wider than the {degree}-bit fingerprint",
                rule.mask
            )));
        }
        Ok(())
    }

    /// The cut-point rule built from mask and pattern.
    pub fn boundary_rule(&self) -> BoundaryRule {
        BoundaryRule::new(self.boundary_mask, self.boundary_pattern)
    }

    /// Mean chunk size on random input.
    pub fn expected_chunk_size(&self) -> f64 {
        self.boundary_rule().expected_chunk_size()
    }
}
