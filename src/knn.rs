//! Exact top-k selection over a scanned candidate stream: a fixed-capacity
//! binary min-heap keyed on similarity, O(N log k) for N candidates.

use crate::real;

/// One nearest-neighbor result.
#[derive(Debug, Clone, PartialEq)]
pub struct KnnItem {
    pub word: String,
    pub idx: usize,
    pub similarity: real,
}

/// Bounded top-k collector. Candidates are appended until capacity, the
/// buffer is heapified once, and from then on a candidate replaces the
/// heap root only if strictly greater than the current minimum — so on
/// ties the first-discovered candidate is kept.
pub struct TopK {
    k: usize,
    items: Vec<(usize, real)>,
    heaped: bool,
}

impl TopK {
    pub fn new(k: usize) -> Self {
        TopK {
            k,
            items: Vec::with_capacity(k),
            heaped: false,
        }
    }

    pub fn collect(&mut self, idx: usize, similarity: real) {
        if self.k == 0 {
            return;
        }
        if self.items.len() < self.k {
            self.items.push((idx, similarity));
            if self.items.len() == self.k {
                self.heapify();
            }
        } else if similarity > self.items[0].1 {
            self.items[0] = (idx, similarity);
            self.sift_down(0, self.items.len());
        }
    }

    fn heapify(&mut self) {
        for s in (0..self.items.len() / 2).rev() {
            self.sift_down(s, self.items.len());
        }
        self.heaped = true;
    }

    fn sift_down(&mut self, mut s: usize, m: usize) {
        loop {
            let mut j = 2 * s + 1;
            if j >= m {
                break;
            }
            if j + 1 < m && self.items[j].1 > self.items[j + 1].1 {
                j += 1;
            }
            if self.items[s].1 <= self.items[j].1 {
                break;
            }
            self.items.swap(s, j);
            s = j;
        }
    }

    /// Heap-sorts the collected candidates into descending similarity.
    /// Shorter than k when fewer candidates were seen.
    pub fn into_sorted(mut self) -> Vec<(usize, real)> {
        if !self.heaped {
            self.heapify();
        }
        for i in (1..self.items.len()).rev() {
            self.items.swap(0, i);
            self.sift_down(0, i);
        }
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Rng;
    use ordered_float::OrderedFloat;
    use std::cmp::Reverse;

    fn oracle(scores: &[real], k: usize) -> Vec<(usize, real)> {
        let mut all: Vec<(usize, real)> = scores.iter().copied().enumerate().collect();
        all.sort_by_key(|&(_, s)| Reverse(OrderedFloat(s)));
        all.truncate(k);
        all
    }

    /// Pseudo-random but pairwise-distinct scores, so ranking by score
    /// determines a unique ranking by index too.
    fn random_scores(n: usize, seed: u64) -> Vec<real> {
        let mut rng = Rng::new(seed);
        let mut seen = std::collections::HashSet::new();
        let mut scores = Vec::with_capacity(n);
        while scores.len() < n {
            let bits = (rng.next_u64() & 0xFFFF) as u16;
            if seen.insert(bits) {
                scores.push(bits as real / 65536.0 * 2.0 - 1.0);
            }
        }
        scores
    }

    #[test]
    fn matches_brute_force_for_boundary_ks() {
        let n = 57;
        let scores = random_scores(n, 42);
        for k in [0, 1, 8, n, n + 7] {
            let mut top = TopK::new(k);
            for (idx, &s) in scores.iter().enumerate() {
                top.collect(idx, s);
            }
            let got = top.into_sorted();
            let want = oracle(&scores, k);
            assert_eq!(got.len(), want.len(), "k = {k}");
            for (g, w) in got.iter().zip(&want) {
                assert_eq!(g.1, w.1, "k = {k}");
            }
            // Scores from the LCG are distinct, so indexes must agree too.
            assert_eq!(got, want, "k = {k}");
        }
    }

    #[test]
    fn ties_keep_first_discovered() {
        let mut top = TopK::new(2);
        for (idx, s) in [(0, 0.5), (1, 0.5), (2, 0.5), (3, 0.5)] {
            top.collect(idx, s);
        }
        let got = top.into_sorted();
        let mut idxs: Vec<usize> = got.iter().map(|&(i, _)| i).collect();
        idxs.sort_unstable();
        assert_eq!(idxs, [0, 1]);
    }

    #[test]
    fn fewer_candidates_than_capacity() {
        let mut top = TopK::new(10);
        top.collect(3, 0.1);
        top.collect(7, 0.9);
        top.collect(5, -0.4);
        assert_eq!(top.into_sorted(), vec![(7, 0.9), (3, 0.1), (5, -0.4)]);
    }
}
