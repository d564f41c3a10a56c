//! Polynomials over GF(2)
//!
//! A [`Polynomial`] is an element of GF(2)[x]. Bit `i` of the backing
//! storage is the coefficient of `x^i`, so the integer `0x11B` is the AES
//! field polynomial `x^8 + x^4 + x^3 + x + 1`.
//!
//! Arithmetic in characteristic 2:
//! - addition and subtraction are both XOR
//! - multiplication is carry-less (shift and XOR)
//! - remainders come from synthetic long division
//!
//! Values are immutable: every operation returns a new polynomial. The
//! storage is always trimmed so the highest stored bit is set, which makes
//! equality, hashing and ordering structural.

mod irreducible;

pub use irreducible::{Reducibility, DEFAULT_MODULUS};

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, BitXor, Mul, Rem, Shl};
use std::str::FromStr;

use bitvec::prelude::*;
use thiserror::Error;

const WORD_BITS: usize = u64::BITS as usize;

/// Errors raised when converting polynomials to and from other representations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolynomialError {
    /// Textual input contained no digits.
    #[error("polynomial literal has no digits")]
    EmptyInput,

    /// Textual input contained a character that is not a hex digit.
    #[error("invalid hex digit '{ch}' at position {position}")]
    InvalidHex {
        /// Offending character.
        ch: char,
        /// Byte position of the character in the input.
        position: usize,
    },

    /// Narrowing conversion would drop set coefficients.
    #[error("polynomial of degree {degree} does not fit in {bits} bits")]
    DegreeTooLarge {
        /// Degree of the polynomial.
        degree: i64,
        /// Width of the target integer.
        bits: u32,
    },
}

/// Element of GF(2)[x] with unbounded degree.
#[derive(Clone)]
pub struct Polynomial {
    /// Coefficients, least significant first. Empty for the zero polynomial,
    /// otherwise the last bit is set.
    bits: BitVec<u64, Lsb0>,
}

impl Polynomial {
    /// The zero polynomial (degree -1).
    pub fn zero() -> Self {
        Self {
            bits: BitVec::new(),
        }
    }

    /// The constant polynomial `1`.
    pub fn one() -> Self {
        Self::from_u64(1)
    }

    /// The polynomial `x`.
    pub fn x() -> Self {
        Self::from_u64(2)
    }

    /// The single term `x^degree`.
    pub fn monomial(degree: usize) -> Self {
        let mut bits = bitvec![u64, Lsb0; 0; degree + 1];
        bits.set(degree, true);
        Self { bits }
    }

    /// Interpret the bits of `value` as coefficients.
    pub fn from_u64(value: u64) -> Self {
        Self::from_words(vec![value])
    }

    /// Interpret a big-endian byte string as coefficients: the last bit of
    /// the last byte is the constant term.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut words = vec![0u64; bytes.len().div_ceil(8)];
        for (i, &byte) in bytes.iter().rev().enumerate() {
            words[i / 8] |= u64::from(byte) << ((i % 8) * 8);
        }
        Self::from_words(words)
    }

    /// Big-endian bytes, exactly as many as the degree needs.
    ///
    /// `Polynomial::from_bytes(&p.to_bytes()) == p` for every `p`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let words = self.words();
        let len = self.bits.len().div_ceil(8);
        (0..len)
            .rev()
            .map(|i| (words[i / 8] >> ((i % 8) * 8)) as u8)
            .collect()
    }

    /// Parse a hex bit pattern such as `0x3cd6663b52a999`. Underscores are
    /// ignored.
    pub fn from_hex(text: &str) -> Result<Self, PolynomialError> {
        let text = text.trim();
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(text);

        let mut words: Vec<u64> = Vec::new();
        let mut nibbles = 0usize;
        for (position, ch) in digits.char_indices().rev() {
            if ch == '_' {
                continue;
            }
            let value = ch
                .to_digit(16)
                .ok_or(PolynomialError::InvalidHex { ch, position })?;
            let slot = nibbles / 16;
            if slot == words.len() {
                words.push(0);
            }
            words[slot] |= u64::from(value) << ((nibbles % 16) * 4);
            nibbles += 1;
        }

        if nibbles == 0 {
            return Err(PolynomialError::EmptyInput);
        }
        Ok(Self::from_words(words))
    }

    /// Exact conversion to `u64`.
    pub fn to_u64(&self) -> Result<u64, PolynomialError> {
        if self.bits.len() > WORD_BITS {
            return Err(PolynomialError::DegreeTooLarge {
                degree: self.degree(),
                bits: u64::BITS,
            });
        }
        Ok(self.low_u64())
    }

    /// The coefficients of `x^0 ..= x^63`, dropping anything higher.
    pub fn low_u64(&self) -> u64 {
        self.words().first().copied().unwrap_or(0)
    }

    /// Index of the highest set coefficient, or -1 for the zero polynomial.
    pub fn degree(&self) -> i64 {
        self.bits.len() as i64 - 1
    }

    /// True for the zero polynomial.
    pub fn is_zero(&self) -> bool {
        self.bits.is_empty()
    }

    /// True for the constant `1`.
    pub fn is_one(&self) -> bool {
        self.bits.len() == 1
    }

    /// Coefficient of `x^index`.
    pub fn bit(&self, index: usize) -> bool {
        self.bits.get(index).map_or(false, |bit| *bit)
    }

    /// Copy with the coefficient of `x^index` set.
    pub fn set_bit(&self, index: usize) -> Self {
        let mut bits = self.bits.clone();
        if index >= bits.len() {
            bits.resize(index + 1, false);
        }
        bits.set(index, true);
        Self { bits }
    }

    /// Copy with the coefficient of `x^index` cleared.
    pub fn clear_bit(&self, index: usize) -> Self {
        if index >= self.bits.len() {
            return self.clone();
        }
        let mut bits = self.bits.clone();
        bits.set(index, false);
        Self::normalized(bits)
    }

    /// Number of non-zero terms.
    pub fn weight(&self) -> usize {
        self.bits.count_ones()
    }

    /// Sum (and difference) in GF(2): bitwise XOR.
    pub fn xor(&self, other: &Self) -> Self {
        let mut acc = self.words();
        xor_shifted_into(&mut acc, &other.words(), 0);
        Self::from_words(acc)
    }

    /// Multiply by `x^shift`.
    pub fn shift_left(&self, shift: usize) -> Self {
        if self.is_zero() {
            return Self::zero();
        }
        let mut acc = Vec::new();
        xor_shifted_into(&mut acc, &self.words(), shift);
        Self::from_words(acc)
    }

    /// Carry-less product: for each set bit `i` of `other`, XOR in
    /// `self << i`.
    pub fn multiply(&self, other: &Self) -> Self {
        let lhs = self.words();
        let mut acc = Vec::with_capacity(lhs.len() + other.bits.len() / WORD_BITS + 1);
        for shift in other.bits.iter_ones() {
            xor_shifted_into(&mut acc, &lhs, shift);
        }
        Self::from_words(acc)
    }

    /// `self * self`.
    pub fn square(&self) -> Self {
        self.multiply(self)
    }

    /// Remainder of long division by `modulus`, or `None` for a zero modulus.
    pub fn checked_rem(&self, modulus: &Self) -> Option<Self> {
        let modulus_degree = modulus.bits.len().checked_sub(1)?;
        let divisor = modulus.words();
        let mut acc = self.words();

        while let Some(degree) = words_degree(&acc) {
            if degree < modulus_degree {
                break;
            }
            xor_shifted_into(&mut acc, &divisor, degree - modulus_degree);
            while acc.last() == Some(&0) {
                acc.pop();
            }
        }

        Some(Self::from_words(acc))
    }

    /// Remainder of long division by `modulus`.
    ///
    /// # Panics
    ///
    /// Panics if `modulus` is zero, like integer division by zero.
    pub fn modulo(&self, modulus: &Self) -> Self {
        match self.checked_rem(modulus) {
            Some(remainder) => remainder,
            None => panic!("polynomial remainder by the zero polynomial"),
        }
    }

    /// Greatest common divisor by Euclid's algorithm.
    pub fn gcd(&self, other: &Self) -> Self {
        let mut a = self.clone();
        let mut b = other.clone();
        while !b.is_zero() {
            let r = a.modulo(&b);
            a = b;
            b = r;
        }
        a
    }

    fn from_words(words: Vec<u64>) -> Self {
        Self::normalized(BitVec::from_vec(words))
    }

    fn normalized(mut bits: BitVec<u64, Lsb0>) -> Self {
        match bits.last_one() {
            Some(top) => bits.truncate(top + 1),
            None => bits.clear(),
        }
        Self { bits }
    }

    /// Live coefficient words, with bits past the degree masked off.
    fn words(&self) -> Vec<u64> {
        let len = self.bits.len().div_ceil(WORD_BITS);
        let mut words = self.bits.as_raw_slice().to_vec();
        words.truncate(len);
        let tail = self.bits.len() % WORD_BITS;
        if tail != 0 {
            if let Some(last) = words.last_mut() {
                *last &= (1u64 << tail) - 1;
            }
        }
        words
    }
}

/// `acc ^= src << shift`, growing `acc` as needed.
fn xor_shifted_into(acc: &mut Vec<u64>, src: &[u64], shift: usize) {
    let word_shift = shift / WORD_BITS;
    let bit_shift = shift % WORD_BITS;
    let needed = src.len() + word_shift + 1;
    if acc.len() < needed {
        acc.resize(needed, 0);
    }
    for (i, &word) in src.iter().enumerate() {
        acc[i + word_shift] ^= word << bit_shift;
        if bit_shift != 0 {
            acc[i + word_shift + 1] ^= word >> (WORD_BITS - bit_shift);
        }
    }
}

fn words_degree(words: &[u64]) -> Option<usize> {
    words
        .iter()
        .rposition(|&word| word != 0)
        .map(|i| i * WORD_BITS + (WORD_BITS - 1) - words[i].leading_zeros() as usize)
}

impl Default for Polynomial {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<u64> for Polynomial {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl TryFrom<&Polynomial> for u64 {
    type Error = PolynomialError;

    fn try_from(value: &Polynomial) -> Result<Self, Self::Error> {
        value.to_u64()
    }
}

impl FromStr for Polynomial {
    type Err = PolynomialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// Polynomials order by the integer value of their bit pattern.
impl Ord for Polynomial {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bits.len().cmp(&other.bits.len()).then_with(|| {
            let lhs = self.words();
            let rhs = other.words();
            lhs.iter().rev().cmp(rhs.iter().rev())
        })
    }
}

impl PartialOrd for Polynomial {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Polynomial {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Polynomial {}

impl Hash for Polynomial {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.words().hash(state);
    }
}

impl Add for &Polynomial {
    type Output = Polynomial;

    fn add(self, rhs: Self) -> Polynomial {
        self.xor(rhs)
    }
}

impl BitXor for &Polynomial {
    type Output = Polynomial;

    fn bitxor(self, rhs: Self) -> Polynomial {
        self.xor(rhs)
    }
}

impl Mul for &Polynomial {
    type Output = Polynomial;

    fn mul(self, rhs: Self) -> Polynomial {
        self.multiply(rhs)
    }
}

impl Rem for &Polynomial {
    type Output = Polynomial;

    fn rem(self, rhs: Self) -> Polynomial {
        self.modulo(rhs)
    }
}

impl Shl<usize> for &Polynomial {
    type Output = Polynomial;

    fn shl(self, rhs: usize) -> Polynomial {
        self.shift_left(rhs)
    }
}

/// Renders terms from the highest degree down, e.g. `x^8 + x^4 + x^3 + x + 1`.
impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }
        let exponents: Vec<usize> = self.bits.iter_ones().collect();
        for (n, &exponent) in exponents.iter().rev().enumerate() {
            if n > 0 {
                f.write_str(" + ")?;
            }
            match exponent {
                0 => f.write_str("1")?,
                1 => f.write_str("x")?,
                _ => write!(f, "x^{exponent}")?,
            }
        }
        Ok(())
    }
}

impl fmt::LowerHex for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            f.write_str("0x")?;
        }
        let words = self.words();
        match words.split_last() {
            None => f.write_str("0"),
            Some((top, rest)) => {
                write!(f, "{top:x}")?;
                for word in rest.iter().rev() {
                    write!(f, "{word:016x}")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::UpperHex for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            f.write_str("0x")?;
        }
        let words = self.words();
        match words.split_last() {
            None => f.write_str("0"),
            Some((top, rest)) => {
                write!(f, "{top:X}")?;
                for word in rest.iter().rev() {
                    write!(f, "{word:016X}")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Polynomial({self:#x})")
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Polynomial {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{self:#x}"))
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Polynomial {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = <String as serde::Deserialize>::deserialize(deserializer)?;
        Self::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degree() {
        assert_eq!(Polynomial::zero().degree(), -1);
        assert_eq!(Polynomial::one().degree(), 0);
        assert_eq!(Polynomial::from_u64((1 << 7) - 1).degree(), 6);
        assert_eq!(Polynomial::from_u64(1 << 7).degree(), 7);
        assert_eq!(Polynomial::monomial(200).degree(), 200);
    }

    #[test]
    fn test_addition_is_xor() {
        let a = Polynomial::from_u64(0b1011);
        let b = Polynomial::from_u64(0b0110);
        assert_eq!(&a + &b, Polynomial::from_u64(0b1101));
        assert!((&a + &a).is_zero());
    }

    #[test]
    fn test_rijndael_product() {
        // {53} * {CA} = {01} in the AES field
        let a = Polynomial::from_u64(0x53);
        let b = Polynomial::from_u64(0xCA);
        let m = Polynomial::from_u64(0x11B);
        assert_eq!((&a * &b).modulo(&m), Polynomial::one());
    }

    #[test]
    fn test_modulo_small() {
        let p = |v| Polynomial::from_u64(v);
        assert_eq!(p(7).modulo(&p(3)), p(1));
        assert_eq!(p(7).modulo(&p(4)), p(3));
        assert_eq!(p(16).modulo(&p(8)), p(0));
        assert_eq!(p(19).modulo(&p(8)), p(3));
        assert!(p(19).checked_rem(&Polynomial::zero()).is_none());
    }

    #[test]
    fn test_shift_across_words() {
        let p = Polynomial::from_u64(0xFF);
        let shifted = p.shift_left(60);
        assert_eq!(shifted.degree(), 67);
        assert!(shifted.bit(60) && shifted.bit(67));
        assert!(!shifted.bit(59));
        assert_eq!(shifted.to_u64().unwrap_err(), PolynomialError::DegreeTooLarge { degree: 67, bits: 64 });
    }

    #[test]
    fn test_gcd() {
        // (x + 1)(x^2 + x + 1) and (x + 1)^2 share x + 1
        let a = &Polynomial::from_u64(0b11) * &Polynomial::from_u64(0b111);
        let b = &Polynomial::from_u64(0b11) * &Polynomial::from_u64(0b11);
        assert_eq!(a.gcd(&b), Polynomial::from_u64(0b11));
    }

    #[test]
    fn test_bit_set_and_clear() {
        let p = Polynomial::zero().set_bit(70).set_bit(3);
        assert_eq!(p.degree(), 70);
        assert_eq!(p.weight(), 2);
        let q = p.clear_bit(70);
        assert_eq!(q, Polynomial::from_u64(8));
    }

    #[test]
    fn test_ordering_by_value() {
        let mut polys = vec![
            Polynomial::monomial(64),
            Polynomial::from_u64(5),
            Polynomial::zero(),
            Polynomial::from_u64(u64::MAX),
        ];
        polys.sort();
        assert_eq!(polys[0], Polynomial::zero());
        assert_eq!(polys[1], Polynomial::from_u64(5));
        assert_eq!(polys[3], Polynomial::monomial(64));
    }

    #[test]
    fn test_bytes_round_trip() {
        let p = Polynomial::from_hex("0x1_0000_0000_0000_0001_8000").unwrap();
        assert_eq!(p.to_bytes(), vec![0x01, 0, 0, 0, 0, 0, 0, 0, 0x01, 0x80, 0x00]);
        assert_eq!(Polynomial::from_bytes(&p.to_bytes()), p);
        assert!(Polynomial::zero().to_bytes().is_empty());
    }

    #[test]
    fn test_text_forms() {
        let p = Polynomial::from_u64(0x11B);
        assert_eq!(p.to_string(), "x^8 + x^4 + x^3 + x + 1");
        assert_eq!(format!("{p:#x}"), "0x11b");
        assert_eq!(format!("{:X}", Polynomial::monomial(64)), "10000000000000000");
        assert_eq!("0x11B".parse::<Polynomial>().unwrap(), p);
        assert_eq!(Polynomial::from_hex("0x"), Err(PolynomialError::EmptyInput));
        assert!(matches!(
            Polynomial::from_hex("12g4"),
            Err(PolynomialError::InvalidHex { ch: 'g', .. })
        ));
    }
}
