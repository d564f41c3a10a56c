//! Reference engine: every step is done with [`Polynomial`] arithmetic.

use std::fmt;

use super::{removal_term, ByteWindow, FingerprintError, RabinFingerprint};
use crate::polynomial::Polynomial;

/// Rabin fingerprint over an arbitrary-degree modulus.
///
/// Slow (one long division per byte) but free of any width limit, which
/// makes it the oracle the table engine is checked against.
#[derive(Debug, Clone)]
pub struct PolynomialFingerprint {
    modulus: Polynomial,
    /// `x^(8W) mod p`, the weight of the byte leaving a full window.
    trailing_weight: Polynomial,
    remainder: Polynomial,
    window: Option<ByteWindow>,
    byte_count: u64,
}

impl PolynomialFingerprint {
    /// Drop the oldest buffered byte's contribution. Returns false when
    /// nothing is buffered.
    fn remove_oldest(&mut self) -> bool {
        let Some(window) = self.window.as_mut() else {
            return false;
        };
        let depth = window.len().saturating_sub(1);
        let full = depth == window.window_size();
        let Some(byte) = window.pop() else {
            return false;
        };

        let term = if full {
            Polynomial::from_u64(u64::from(byte))
                .multiply(&self.trailing_weight)
                .modulo(&self.modulus)
        } else {
            removal_term(&self.modulus, byte, depth)
        };
        self.remainder = self.remainder.xor(&term);
        self.byte_count -= 1;
        true
    }
}

impl RabinFingerprint for PolynomialFingerprint {
    fn windowed(modulus: &Polynomial, window_size: usize) -> Result<Self, FingerprintError> {
        if modulus.is_zero() {
            return Err(FingerprintError::ZeroModulus);
        }
        Ok(Self {
            modulus: modulus.clone(),
            trailing_weight: Polynomial::monomial(8 * window_size).modulo(modulus),
            remainder: Polynomial::zero(),
            window: (window_size > 0).then(|| ByteWindow::new(window_size)),
            byte_count: 0,
        })
    }

    fn push_byte(&mut self, byte: u8) {
        let shifted = self.remainder.shift_left(8);
        self.remainder = shifted
            .xor(&Polynomial::from_u64(u64::from(byte)))
            .modulo(&self.modulus);
        self.byte_count += 1;

        let overflowing = match self.window.as_mut() {
            Some(window) => {
                window.push(byte);
                window.overflowing()
            }
            None => false,
        };
        if overflowing {
            self.remove_oldest();
        }
    }

    fn pop_byte(&mut self) -> Result<(), FingerprintError> {
        if self.remove_oldest() {
            Ok(())
        } else {
            Err(FingerprintError::WindowUnderflow)
        }
    }

    fn reset(&mut self) {
        self.remainder = Polynomial::zero();
        if let Some(window) = self.window.as_mut() {
            window.clear();
        }
        self.byte_count = 0;
    }

    fn fingerprint(&self) -> Polynomial {
        self.remainder.clone()
    }

    fn value(&self) -> u64 {
        self.remainder.low_u64()
    }

    fn bytes_fingerprinted(&self) -> u64 {
        self.byte_count
    }

    fn window_size(&self) -> usize {
        self.window.as_ref().map_or(0, ByteWindow::window_size)
    }

    fn modulus(&self) -> &Polynomial {
        &self.modulus
    }
}

impl fmt::Display for PolynomialFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.remainder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_modulus_rejected() {
        let err = PolynomialFingerprint::new(&Polynomial::zero()).unwrap_err();
        assert_eq!(err, FingerprintError::ZeroModulus);
    }

    #[test]
    fn test_wide_modulus() {
        // x^127 + x + 1 is irreducible and far past any 64-bit register
        let modulus = Polynomial::monomial(127).set_bit(1).set_bit(0);
        let mut fp = PolynomialFingerprint::new(&modulus).unwrap();
        fp.push_bytes(&[0xFF; 32]);
        assert!(fp.fingerprint().degree() < 127);
        assert!(fp.fingerprint().degree() > 64);
    }

    #[test]
    fn test_pop_without_window_underflows() {
        let mut fp = PolynomialFingerprint::new(&Polynomial::default_modulus()).unwrap();
        fp.push_byte(1);
        assert_eq!(fp.pop_byte(), Err(FingerprintError::WindowUnderflow));
    }

    #[test]
    fn test_manual_pops_drain_to_zero() {
        let mut fp = PolynomialFingerprint::windowed(&Polynomial::default_modulus(), 16).unwrap();
        fp.push_bytes(b"rolling");
        for _ in 0..7 {
            fp.pop_byte().unwrap();
        }
        assert!(fp.fingerprint().is_zero());
        assert_eq!(fp.bytes_fingerprinted(), 0);
        assert_eq!(fp.pop_byte(), Err(FingerprintError::WindowUnderflow));
    }

    #[test]
    fn test_rolling_then_manual_pop() {
        let modulus = Polynomial::default_modulus();
        let mut rolling = PolynomialFingerprint::windowed(&modulus, 4).unwrap();
        rolling.push_bytes(b"abcdefgh");
        assert_eq!(rolling.bytes_fingerprinted(), 4);
        assert_eq!(rolling.value(), 0x6566_6768);

        rolling.pop_byte().unwrap();
        assert_eq!(rolling.value(), 0x66_6768);
        assert_eq!(rolling.bytes_fingerprinted(), 3);
    }

    #[test]
    fn test_display_is_hex() {
        let mut fp = PolynomialFingerprint::new(&Polynomial::default_modulus()).unwrap();
        fp.push_bytes(b"abc");
        assert_eq!(fp.to_string(), "616263");
    }
}
