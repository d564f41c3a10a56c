//! Irreducibility testing and random irreducible generation
//!
//! Ben-Or's test: a degree-n polynomial f over GF(2) is irreducible iff
//! gcd(f, x^(2^i) - x mod f) = 1 for every i in 1..=n/2, and
//! x^(2^n) = x (mod f).
//!
//! The powers x^(2^i) mod f are produced by repeated squaring modulo f, so
//! each step costs one multiply and one reduction.
//!
//! References: M. O. Rabin, "Probabilistic algorithms in finite fields"
//! (1980); S. Gao, D. Panario, "Tests and constructions of irreducible
//! polynomials over finite fields" (1997).

use rand::Rng;

use super::Polynomial;

/// Bit pattern of the degree-53 irreducible polynomial used when no modulus
/// is configured.
pub const DEFAULT_MODULUS: u64 = 0x003c_d666_3b52_a999;

/// Outcome of an irreducibility test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reducibility {
    /// Has a non-trivial factor.
    Reducible,
    /// No non-trivial factors.
    Irreducible,
}

impl Polynomial {
    /// The built-in degree-53 modulus, see [`DEFAULT_MODULUS`].
    pub fn default_modulus() -> Self {
        Self::from_u64(DEFAULT_MODULUS)
    }

    /// Full Ben-Or irreducibility test.
    ///
    /// Constants (including zero) are reducible by convention.
    pub fn reducibility(&self) -> Reducibility {
        let degree = self.degree();
        if degree < 1 {
            return Reducibility::Reducible;
        }
        let n = degree as usize;

        let x = Self::x().modulo(self);
        let mut power = x.clone();
        for _ in 1..=n / 2 {
            power = power.square().modulo(self);
            if !self.gcd(&(&power + &x)).is_one() {
                return Reducibility::Reducible;
            }
        }
        for _ in n / 2 + 1..=n {
            power = power.square().modulo(self);
        }

        if power == x {
            Reducibility::Irreducible
        } else {
            Reducibility::Reducible
        }
    }

    /// Shorthand for `reducibility() == Reducibility::Irreducible`.
    pub fn is_irreducible(&self) -> bool {
        self.reducibility() == Reducibility::Irreducible
    }

    /// Only the final condition of the test: x^(2^n) = x (mod f).
    ///
    /// Every irreducible polynomial passes, but so does any product of
    /// distinct irreducibles whose degrees divide n. Use
    /// [`Polynomial::is_irreducible`] to choose a modulus.
    pub fn satisfies_field_identity(&self) -> bool {
        let degree = self.degree();
        if degree < 1 {
            return false;
        }
        let x = Self::x().modulo(self);
        let mut power = x.clone();
        for _ in 0..degree {
            power = power.square().modulo(self);
        }
        power == x
    }

    /// Random polynomial of exactly `degree`: the top bit is set and bits
    /// `0..degree` are uniform.
    pub fn random<R: Rng + ?Sized>(degree: usize, rng: &mut R) -> Self {
        let top_word = degree / 64;
        let mut words: Vec<u64> = (0..=top_word).map(|_| rng.gen()).collect();
        let tail = degree % 64;
        words[top_word] &= (1u64 << tail) - 1;
        words[top_word] |= 1u64 << tail;
        Self::from_words(words)
    }

    /// Draw random polynomials of `degree` until one is irreducible.
    ///
    /// About `degree` draws are expected.
    ///
    /// # Panics
    ///
    /// Panics if `degree` is zero; there are no irreducible constants.
    pub fn random_irreducible<R: Rng + ?Sized>(degree: usize, rng: &mut R) -> Self {
        assert!(degree >= 1, "irreducible polynomials have degree >= 1");
        let mut trials = 0usize;
        loop {
            trials += 1;
            let candidate = Self::random(degree, rng);
            if candidate.is_irreducible() {
                tracing::debug!(degree, trials, modulus = ?candidate, "found irreducible polynomial");
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_known_irreducibles() {
        // AES polynomial and the Reed-Solomon GF(256) polynomial
        assert!(Polynomial::from_u64(0x11B).is_irreducible());
        assert!(Polynomial::from_u64(0x11D).is_irreducible());
        assert!(Polynomial::from_u64(0b10).is_irreducible());
        assert!(Polynomial::from_u64(0b11).is_irreducible());
        assert!(Polynomial::default_modulus().is_irreducible());
        assert_eq!(Polynomial::default_modulus().degree(), 53);
    }

    #[test]
    fn test_known_reducibles() {
        // x^2 + 1 = (x + 1)^2
        assert_eq!(Polynomial::from_u64(0b101).reducibility(), Reducibility::Reducible);
        // x^4 + x^2 + 1 = (x^2 + x + 1)^2
        assert_eq!(Polynomial::from_u64(0b10101).reducibility(), Reducibility::Reducible);
        assert_eq!(Polynomial::one().reducibility(), Reducibility::Reducible);
        assert_eq!(Polynomial::zero().reducibility(), Reducibility::Reducible);
    }

    #[test]
    fn test_field_identity_alone_is_too_weak() {
        // (x + 1)(x^2 + x + 1)(x^3 + x + 1): factor degrees all divide 6
        let f = Polynomial::from_u64(0x53);
        assert_eq!(f.degree(), 6);
        assert!(f.satisfies_field_identity());
        assert!(!f.is_irreducible());
    }

    #[test]
    fn test_random_has_exact_degree() {
        let mut rng = StdRng::seed_from_u64(7);
        for degree in [1usize, 8, 63, 64, 65, 130] {
            let p = Polynomial::random(degree, &mut rng);
            assert_eq!(p.degree(), degree as i64);
        }
    }

    #[test]
    fn test_random_irreducible() {
        let mut rng = StdRng::seed_from_u64(2008);
        for degree in [15usize, 31] {
            let p = Polynomial::random_irreducible(degree, &mut rng);
            assert_eq!(p.degree(), degree as i64);
            assert!(p.is_irreducible());
        }
    }
}
