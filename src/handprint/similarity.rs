//! Hand-to-hand similarity.

use crate::chunker::{ByteSource, Chunk};
use crate::fingerprint::RabinFingerprint;
use crate::HandprintError;

use super::Handprint;

/// Number of fingerprint values present in both lists.
///
/// Both lists must be sorted by descending fingerprint, as fingers and hands
/// are. A single merge scan: while the heads differ, step past the larger
/// one, since it cannot occur further down the other list.
pub fn count_overlap(a: &[Chunk], b: &[Chunk]) -> usize {
    let (mut i, mut j) = (0, 0);
    let mut overlap = 0;
    while i < a.len() && j < b.len() {
        let (x, y) = (a[i].fingerprint, b[j].fingerprint);
        if x == y {
            overlap += 1;
            i += 1;
            j += 1;
        } else if x > y {
            i += 1;
        } else {
            j += 1;
        }
    }
    overlap
}

/// Overlap coefficient `|a ∩ b| / max(|a|, |b|)` over fingerprint values.
///
/// Two empty hands score 0.0; there is nothing to compare.
pub fn hand_similarity(a: &[Chunk], b: &[Chunk]) -> f64 {
    let largest = a.len().max(b.len());
    if largest == 0 {
        return 0.0;
    }
    count_overlap(a, b) as f64 / largest as f64
}

/// Similarity of two handprints' hands, computing them if needed.
pub fn similarity<F, SA, SB>(a: &Handprint<F, SA>, b: &Handprint<F, SB>) -> Result<f64, HandprintError>
where
    F: RabinFingerprint,
    SA: ByteSource,
    SB: ByteSource,
{
    Ok(hand_similarity(a.hand()?, b.hand()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand(values: &[u64]) -> Vec<Chunk> {
        values
            .iter()
            .enumerate()
            .map(|(i, &fingerprint)| Chunk {
                start: i as u64,
                end: i as u64 + 1,
                fingerprint,
            })
            .collect()
    }

    #[test]
    fn test_overlap_ignores_intervals() {
        let a = hand(&[90, 70, 50, 10]);
        let mut b = hand(&[80, 70, 10]);
        b[1].start = 1_000;
        b[1].end = 2_000;
        assert_eq!(count_overlap(&a, &b), 2);
        assert_eq!(count_overlap(&b, &a), 2);
    }

    #[test]
    fn test_similarity_bounds() {
        let a = hand(&[9, 8, 7]);
        assert_eq!(hand_similarity(&a, &a), 1.0);
        assert_eq!(hand_similarity(&a, &hand(&[6, 5])), 0.0);
        assert_eq!(hand_similarity(&a, &hand(&[8])), 1.0 / 3.0);
        assert_eq!(hand_similarity(&[], &[]), 0.0);
        assert_eq!(hand_similarity(&a, &[]), 0.0);
    }
}
