//! Accelerated engine: a `u64` register with table-driven reduction.
//!
//! After `f << 8`, the bits that spill past the modulus degree d are exactly
//! the old top byte of `f`. The push table maps every such pattern `i` to
//! `(i << d) ^ ((i << d) mod p)`, so one XOR both clears the spilled bits
//! and adds their reduction. The pop table holds `b * x^(8W) mod p` for
//! every byte value b.

use std::fmt;
use std::sync::Arc;

use super::{removal_term, ByteWindow, FingerprintError, RabinFingerprint};
use crate::polynomial::Polynomial;

/// Widest modulus the register can reduce: 64 bits, minus 8 bits of shift
/// headroom, minus one spare top bit, minus one for the difference between
/// degree and bit count.
pub const MAX_TABLE_DEGREE: u32 = 54;

/// Narrowest modulus the register can reduce; the push index is the top
/// byte of the register.
pub const MIN_TABLE_DEGREE: u32 = 8;

const PUSH_ENTRIES: usize = 512;
const POP_ENTRIES: usize = 256;

/// Immutable reduction tables for one modulus and window size.
///
/// Built once from [`Polynomial`] arithmetic and shared through an `Arc` by
/// every clone of the engine that owns them.
pub struct FingerprintTables {
    degree: u32,
    window_size: usize,
    push: [u64; PUSH_ENTRIES],
    pop: [u64; POP_ENTRIES],
}

impl FingerprintTables {
    /// Precompute both tables, rejecting moduli outside
    /// `MIN_TABLE_DEGREE..=MAX_TABLE_DEGREE`.
    pub fn new(modulus: &Polynomial, window_size: usize) -> Result<Self, FingerprintError> {
        let degree = modulus.degree();
        if modulus.is_zero() {
            return Err(FingerprintError::ZeroModulus);
        }
        if degree > i64::from(MAX_TABLE_DEGREE) {
            return Err(FingerprintError::DegreeExceeded {
                degree,
                max: MAX_TABLE_DEGREE,
            });
        }
        if degree < i64::from(MIN_TABLE_DEGREE) {
            return Err(FingerprintError::DegreeTooSmall {
                degree,
                min: MIN_TABLE_DEGREE,
            });
        }
        let degree = degree as u32;

        let mut push = [0u64; PUSH_ENTRIES];
        for (i, slot) in push.iter_mut().enumerate() {
            let spilled = Polynomial::from_u64(i as u64).shift_left(degree as usize);
            *slot = spilled.xor(&spilled.modulo(modulus)).low_u64();
        }

        let mut pop = [0u64; POP_ENTRIES];
        for (b, slot) in pop.iter_mut().enumerate() {
            *slot = removal_term(modulus, b as u8, window_size).low_u64();
        }

        tracing::trace!(degree, window_size, "built fingerprint tables");
        Ok(Self {
            degree,
            window_size,
            push,
            pop,
        })
    }

    /// Degree of the modulus the tables reduce by.
    pub fn degree(&self) -> u32 {
        self.degree
    }

    /// Window size the pop table was built for.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    #[inline]
    fn push(&self, register: u64, byte: u8) -> u64 {
        let index = ((register >> (self.degree - 8)) & 0x1FF) as usize;
        ((register << 8) | u64::from(byte)) ^ self.push[index]
    }

    #[inline]
    fn pop(&self, byte: u8) -> u64 {
        self.pop[usize::from(byte)]
    }
}

impl fmt::Debug for FingerprintTables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FingerprintTables")
            .field("degree", &self.degree)
            .field("window_size", &self.window_size)
            .finish_non_exhaustive()
    }
}

/// Rabin fingerprint held in a `u64`, for moduli of degree 8 to 54.
#[derive(Debug, Clone)]
pub struct TableFingerprint {
    modulus: Polynomial,
    tables: Arc<FingerprintTables>,
    register: u64,
    window: Option<ByteWindow>,
    byte_count: u64,
}

impl TableFingerprint {
    /// Engine over prebuilt tables, for callers that keep tables around
    /// across engine lifetimes.
    pub fn with_tables(modulus: &Polynomial, tables: Arc<FingerprintTables>) -> Self {
        let window_size = tables.window_size();
        Self {
            modulus: modulus.clone(),
            tables,
            register: 0,
            window: (window_size > 0).then(|| ByteWindow::new(window_size)),
            byte_count: 0,
        }
    }

    /// The shared tables.
    pub fn tables(&self) -> &Arc<FingerprintTables> {
        &self.tables
    }
}

impl RabinFingerprint for TableFingerprint {
    fn windowed(modulus: &Polynomial, window_size: usize) -> Result<Self, FingerprintError> {
        let tables = FingerprintTables::new(modulus, window_size)?;
        Ok(Self::with_tables(modulus, Arc::new(tables)))
    }

    #[inline]
    fn push_byte(&mut self, byte: u8) {
        self.register = self.tables.push(self.register, byte);
        self.byte_count += 1;

        if let Some(window) = self.window.as_mut() {
            window.push(byte);
            if window.overflowing() {
                if let Some(oldest) = window.pop() {
                    self.register ^= self.tables.pop(oldest);
                    self.byte_count -= 1;
                }
            }
        }
    }

    fn pop_byte(&mut self) -> Result<(), FingerprintError> {
        let window = self.window.as_mut().ok_or(FingerprintError::WindowUnderflow)?;
        let depth = window.len().saturating_sub(1);
        let byte = window.pop().ok_or(FingerprintError::WindowUnderflow)?;

        // Only the trailing edge of a full window is tabulated.
        self.register ^= if depth == self.tables.window_size() {
            self.tables.pop(byte)
        } else {
            removal_term(&self.modulus, byte, depth).low_u64()
        };
        self.byte_count -= 1;
        Ok(())
    }

    fn reset(&mut self) {
        self.register = 0;
        if let Some(window) = self.window.as_mut() {
            window.clear();
        }
        self.byte_count = 0;
    }

    fn fingerprint(&self) -> Polynomial {
        Polynomial::from_u64(self.register)
    }

    #[inline]
    fn value(&self) -> u64 {
        self.register
    }

    fn bytes_fingerprinted(&self) -> u64 {
        self.byte_count
    }

    fn window_size(&self) -> usize {
        self.tables.window_size()
    }

    fn modulus(&self) -> &Polynomial {
        &self.modulus
    }
}

impl fmt::Display for TableFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.register)
    }
}
