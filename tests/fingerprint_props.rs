use handprint::{
    FingerprintError, Polynomial, PolynomialFingerprint, RabinFingerprint, TableFingerprint,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Any modulus the table engine accepts. Irreducibility does not matter for
/// agreement between engines.
fn table_modulus() -> impl Strategy<Value = Polynomial> {
    (8usize..=54, any::<u64>()).prop_map(|(degree, seed)| {
        Polynomial::random(degree, &mut StdRng::seed_from_u64(seed))
    })
}

fn bytes(max: usize) -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 0..max)
}

fn fingerprint_of<F: RabinFingerprint>(modulus: &Polynomial, bytes: &[u8]) -> u64 {
    let mut engine = F::new(modulus).expect("engine builds");
    engine.push_bytes(bytes);
    engine.value()
}

proptest! {
    #[test]
    fn backends_agree(modulus in table_modulus(), data in bytes(512)) {
        let reference = fingerprint_of::<PolynomialFingerprint>(&modulus, &data);
        let table = fingerprint_of::<TableFingerprint>(&modulus, &data);
        prop_assert_eq!(reference, table);
        prop_assert!(reference.leading_zeros() as i64 >= 64 - modulus.degree());
    }

    #[test]
    fn windowed_backends_agree(modulus in table_modulus(), window in 1usize..48, data in bytes(512)) {
        let mut reference = PolynomialFingerprint::windowed(&modulus, window).expect("engine builds");
        let mut table = TableFingerprint::windowed(&modulus, window).expect("engine builds");
        for &b in &data {
            reference.push_byte(b);
            table.push_byte(b);
            prop_assert_eq!(reference.value(), table.value());
        }
        prop_assert_eq!(reference.bytes_fingerprinted(), table.bytes_fingerprinted());
    }

    #[test]
    fn window_keeps_only_last_bytes(window in 1usize..64, data in bytes(400)) {
        prop_assume!(window <= data.len());
        let modulus = Polynomial::default_modulus();
        let mut rolling = TableFingerprint::windowed(&modulus, window).expect("engine builds");
        rolling.push_bytes(&data);
        let tail = &data[data.len() - window..];
        prop_assert_eq!(rolling.value(), fingerprint_of::<TableFingerprint>(&modulus, tail));
        prop_assert_eq!(rolling.bytes_fingerprinted(), window as u64);
    }

    #[test]
    fn manual_pops_leave_suffix(data in bytes(64), pops in 0usize..64) {
        let pops = pops.min(data.len());
        let modulus = Polynomial::default_modulus();
        let expected = fingerprint_of::<PolynomialFingerprint>(&modulus, &data[pops..]);

        let mut reference = PolynomialFingerprint::windowed(&modulus, 64).expect("engine builds");
        let mut table = TableFingerprint::windowed(&modulus, 64).expect("engine builds");
        reference.push_bytes(&data);
        table.push_bytes(&data);
        for _ in 0..pops {
            reference.pop_byte().expect("byte buffered");
            table.pop_byte().expect("byte buffered");
        }
        prop_assert_eq!(reference.value(), expected);
        prop_assert_eq!(table.value(), expected);
    }
}

#[test]
fn engines_render_identically() {
    let modulus = Polynomial::default_modulus();
    let mut reference = PolynomialFingerprint::new(&modulus).expect("engine builds");
    let mut table = TableFingerprint::new(&modulus).expect("engine builds");
    let data = b"The quick brown fox jumps over the lazy dog";
    reference.push_bytes(data);
    table.push_bytes(data);
    assert_eq!(reference.fingerprint(), table.fingerprint());
    assert_eq!(reference.to_string(), table.to_string());
}

#[test]
fn table_engine_limits() {
    let wide = Polynomial::monomial(64).set_bit(0);
    assert!(matches!(
        TableFingerprint::new(&wide),
        Err(FingerprintError::DegreeExceeded { degree: 64, max: 54 })
    ));
    // The reference engine has no ceiling.
    assert!(PolynomialFingerprint::new(&wide).is_ok());
}

#[test]
fn underflow_is_an_error() {
    let modulus = Polynomial::default_modulus();
    let mut engine = TableFingerprint::windowed(&modulus, 4).expect("engine builds");
    assert_eq!(engine.pop_byte(), Err(FingerprintError::WindowUnderflow));
    engine.push_byte(7);
    engine.pop_byte().expect("one byte buffered");
    assert_eq!(engine.value(), 0);
    assert_eq!(engine.pop_byte(), Err(FingerprintError::WindowUnderflow));
}
