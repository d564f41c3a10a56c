//! Rabin fingerprint engines
//!
//! A message m(x) is fingerprinted as m(x) mod p(x) for a fixed irreducible
//! p of degree k, so the fingerprint is always a k-bit value. Appending a
//! byte b to the message turns the fingerprint f into
//!
//! ```text
//! f' = (f * x^8 + b) mod p
//! ```
//!
//! and, in a sliding window of W bytes, dropping the oldest byte b0 is
//!
//! ```text
//! f' = f - (b0 * x^(8W) mod p)      (subtraction is XOR)
//! ```
//!
//! Two interchangeable backends implement [`RabinFingerprint`]:
//! - [`PolynomialFingerprint`] does the arithmetic with [`Polynomial`] values
//!   and supports any degree. It is the reference.
//! - [`TableFingerprint`] keeps the register in a `u64` and replaces each
//!   reduction with one table lookup. Degrees 8 through 54 only.
//!
//! Both produce the same bits for the same modulus and input. Callers pick
//! one by type; there is no run-time dispatch between them.
//!
//! M. O. Rabin, "Fingerprinting by Random Polynomials" (1981);
//! A. Z. Broder, "Some applications of Rabin's fingerprinting method" (1993).

mod reference;
mod table;
mod window;

pub use reference::PolynomialFingerprint;
pub use table::{FingerprintTables, TableFingerprint, MAX_TABLE_DEGREE, MIN_TABLE_DEGREE};
pub use window::ByteWindow;

use std::fmt;

use thiserror::Error;

use crate::polynomial::Polynomial;

/// Errors raised by fingerprint engines.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FingerprintError {
    /// Modulus too wide for the 64-bit table register.
    #[error("modulus degree {degree} exceeds the table engine maximum of {max}")]
    DegreeExceeded {
        /// Degree of the rejected modulus.
        degree: i64,
        /// Largest supported degree.
        max: u32,
    },

    /// Modulus too narrow for byte-wise table reduction.
    #[error("modulus degree {degree} is below the table engine minimum of {min}")]
    DegreeTooSmall {
        /// Degree of the rejected modulus.
        degree: i64,
        /// Smallest supported degree.
        min: u32,
    },

    /// The zero polynomial cannot be a modulus.
    #[error("fingerprint modulus must be non-zero")]
    ZeroModulus,

    /// `pop_byte` was called with nothing in the window.
    #[error("pop_byte called with an empty window")]
    WindowUnderflow,
}

/// Stateful rolling fingerprint modulo a fixed polynomial.
///
/// Clones copy the remainder and window but share any precomputed tables,
/// so an engine configured once can be handed to many workers by cloning.
pub trait RabinFingerprint: Clone + Send + Sync + fmt::Debug {
    /// Engine without a window: every pushed byte stays in the fingerprint.
    fn new(modulus: &Polynomial) -> Result<Self, FingerprintError> {
        Self::windowed(modulus, 0)
    }

    /// Engine over the most recent `window_size` bytes. Zero disables
    /// windowing.
    fn windowed(modulus: &Polynomial, window_size: usize) -> Result<Self, FingerprintError>;

    /// Shift in one byte. Once more than `window_size` bytes are held, the
    /// oldest one is popped automatically.
    fn push_byte(&mut self, byte: u8);

    /// Push every byte of `bytes` in order.
    fn push_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push_byte(byte);
        }
    }

    /// Remove the oldest buffered byte's contribution.
    fn pop_byte(&mut self) -> Result<(), FingerprintError>;

    /// Back to the zero fingerprint with an empty window.
    fn reset(&mut self);

    /// Current remainder as a polynomial of degree below the modulus degree.
    fn fingerprint(&self) -> Polynomial;

    /// Current remainder as an integer. Exact for moduli of degree <= 64,
    /// otherwise the low 64 coefficients.
    fn value(&self) -> u64;

    /// Bytes currently represented: pushes minus pops since the last reset.
    fn bytes_fingerprinted(&self) -> u64;

    /// Configured window in bytes, zero when windowing is off.
    fn window_size(&self) -> usize;

    /// The fixed modulus.
    fn modulus(&self) -> &Polynomial;
}

/// Contribution of `byte` sitting `depth` bytes behind the leading edge:
/// `byte * x^(8 * depth) mod modulus`.
pub(crate) fn removal_term(modulus: &Polynomial, byte: u8, depth: usize) -> Polynomial {
    Polynomial::from_u64(u64::from(byte))
        .shift_left(8 * depth)
        .modulo(modulus)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lazy_dog() -> &'static [u8] {
        b"The quick brown fox jumps over the lazy dog"
    }

    fn check_known_answers<F: RabinFingerprint>() {
        let modulus = Polynomial::default_modulus();

        // Under 53 bits the message is its own remainder.
        let mut engine = F::new(&modulus).unwrap();
        engine.push_bytes(b"hello");
        assert_eq!(engine.value(), 0x68_656c_6c6f);

        engine.reset();
        engine.push_bytes(lazy_dog());
        assert_eq!(engine.value(), 0x1_6501_4ec1_0795);
        assert_eq!(engine.bytes_fingerprinted(), lazy_dog().len() as u64);

        let mut windowed = F::windowed(&modulus, 8).unwrap();
        windowed.push_bytes(lazy_dog());
        assert_eq!(windowed.value(), 0xb_39c6_f1ae_52ea);
        assert_eq!(windowed.bytes_fingerprinted(), 8);

        let mut aes = F::new(&Polynomial::from_u64(0x11B)).unwrap();
        aes.push_bytes(&[0x53, 0xCA]);
        assert_eq!(aes.value(), 0xd6);
    }

    #[test]
    fn test_known_answers_reference() {
        check_known_answers::<PolynomialFingerprint>();
    }

    #[test]
    fn test_known_answers_table() {
        check_known_answers::<TableFingerprint>();
    }

    #[test]
    fn test_removal_term_matches_direct_computation() {
        let modulus = Polynomial::default_modulus();
        // 0x41 * x^64 mod p, computed both ways
        let direct = Polynomial::from_bytes(&[0x41, 0, 0, 0, 0, 0, 0, 0, 0]).modulo(&modulus);
        assert_eq!(removal_term(&modulus, 0x41, 8), direct);
    }
}
