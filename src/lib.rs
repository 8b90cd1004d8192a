//! Distributed representations of documents: word and paragraph vectors
//! trained jointly from a tagged corpus, with nearest-neighbor search and a
//! relaxed Word Mover's Distance re-ranker on top.
//!
//! The training math follows the classic word2vec conventions exactly, LCG
//! and all, so runs are reproducible given the same corpus and thread count.

pub mod binfmt;
pub mod corpus;
pub mod knn;
pub mod model;
pub mod nn;
pub mod trainer;
pub mod vocab;
pub mod wmd;

pub use corpus::{FileSource, LineSource, MemorySource, TaggedCorpus, TaggedDocument};
pub use knn::KnnItem;
pub use model::{Doc2Vec, TrainConfig};
pub use vocab::Vocabulary;

#[allow(non_camel_case_types)]
pub type real = f32; // Precision of float numbers

pub const EXP_TABLE_SIZE: usize = 1000;
pub const MAX_EXP: real = 6.0;
pub const MAX_CODE_LENGTH: usize = 40;

/// Shortlist size for the two-stage WMD search: cosine candidates fetched
/// before re-ranking.
pub const MAX_DOC2VEC_KNN: usize = 2000;

/// Number of entries in the negative-sampling unigram table.
pub const NEG_TABLE_SIZE: usize = 10_000_000;

/// The word2vec linear congruential generator. Every random decision in
/// training and inference draws from one of these, so identical seeds give
/// identical streams.
pub struct Rng {
    next: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        Rng { next: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.next = self.next.wrapping_mul(25214903917).wrapping_add(11);
        self.next
    }

    /// Uniform in [0, 1), 16 bits of resolution.
    pub fn next_real(&mut self) -> real {
        (self.next_u64() & 0xFFFF) as real / 65536.0
    }
}

pub fn norm(v: &[real]) -> real {
    v.iter().copied().map(|e| e * e).sum::<real>().sqrt()
}

/// Scales `v` to unit length. A zero vector has no direction and is left
/// untouched rather than filled with NaN.
pub fn normalize(v: &mut [real]) {
    let len = norm(v);
    if len == 0.0 {
        return;
    }
    for e in v {
        *e /= len;
    }
}

pub fn dot(a: &[real], b: &[real]) -> real {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(&a, &b)| a * b).sum()
}

/// Cosine similarity of two unit-length vectors.
pub fn similarity(a: &[real], b: &[real]) -> real {
    dot(a, b)
}

/// Euclidean distance between two vectors.
pub fn distance(a: &[real], b: &[real]) -> real {
    assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(&a, &b)| (a - b) * (a - b))
        .sum::<real>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lcg_matches_reference_sequence() {
        let mut rng = Rng::new(1);
        assert_eq!(rng.next_u64(), 25214903928);
        assert_eq!(
            rng.next_u64(),
            25214903928u64.wrapping_mul(25214903917).wrapping_add(11)
        );
    }

    #[test]
    fn next_real_is_in_unit_interval() {
        let mut rng = Rng::new(7);
        for _ in 0..1000 {
            let x = rng.next_real();
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn normalize_handles_zero_vector() {
        let mut v = [0.0, 0.0, 0.0];
        normalize(&mut v);
        assert_eq!(v, [0.0, 0.0, 0.0]);

        let mut v = [3.0, 4.0];
        normalize(&mut v);
        assert!((norm(&v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn distance_is_euclidean() {
        assert_eq!(distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(distance(&[1.0, 1.0], &[1.0, 1.0]), 0.0);
    }
}
