//! Relaxed Word Mover's Distance re-ranking over bag-of-words projections
//! of the training corpus.
//!
//! The relaxation drops the full transport problem: each query word simply
//! moves all of its weight to the closest target word, making the distance
//! a cheap lower bound on true WMD.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};

use anyhow::Result;
use ordered_float::OrderedFloat;

use crate::binfmt;
use crate::corpus::{LineSource, TaggedCorpus, TaggedDocument};
use crate::model::Core;
use crate::nn::Norms;
use crate::real;
use crate::vocab::Vocabulary;

/// A document as its distinct in-vocabulary word indexes, in first-seen
/// order, truncated at the end-of-sentence marker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnweightedDocument {
    pub words_idx: Vec<usize>,
}

impl UnweightedDocument {
    pub fn new(vocab: &Vocabulary, doc: &TaggedDocument) -> Self {
        let mut words_idx = Vec::new();
        let mut seen = HashSet::new();
        for word in &doc.words {
            match vocab.search(word) {
                None => continue,
                Some(0) => break,
                Some(idx) => {
                    if seen.insert(idx) {
                        words_idx.push(idx);
                    }
                }
            }
        }
        UnweightedDocument { words_idx }
    }

    pub fn is_empty(&self) -> bool {
        self.words_idx.is_empty()
    }

    fn save(&self, w: &mut impl Write) -> Result<()> {
        binfmt::write_u32(w, self.words_idx.len() as u32)?;
        for &idx in &self.words_idx {
            binfmt::write_i64(w, idx as i64)?;
        }
        Ok(())
    }

    fn load(r: &mut impl Read) -> Result<Self> {
        let count = binfmt::read_u32(r)? as usize;
        let mut words_idx = Vec::with_capacity(count);
        for _ in 0..count {
            words_idx.push(binfmt::read_i64(r)? as usize);
        }
        Ok(UnweightedDocument { words_idx })
    }
}

/// A query document with a per-word importance weight, derived by
/// leave-one-out inference: a word whose removal moves the inferred
/// document vector far carries more weight.
#[derive(Debug, Clone)]
pub struct WeightedDocument {
    pub doc: UnweightedDocument,
    /// Parallel to `doc.words_idx`; non-negative, sums to 1 when nonempty.
    pub weights: Vec<real>,
}

impl WeightedDocument {
    pub(crate) fn new(core: &Core, doc: &TaggedDocument) -> Self {
        let full = core.infer_doc(doc, None);

        let mut scores: HashMap<usize, real> = HashMap::new();
        for (a, word) in doc.words.iter().enumerate() {
            match core.word_vocab.search(word) {
                None => continue,
                Some(0) => break,
                Some(idx) => {
                    let loo = core.infer_doc(doc, Some(a));
                    let sim = crate::similarity(&full, &loo);
                    // Later duplicates overwrite; any occurrence's score
                    // serves equally well.
                    scores.insert(idx, (1.0 - sim).max(0.0).powf(1.5));
                }
            }
        }

        let base = UnweightedDocument::new(&core.word_vocab, doc);
        let mut weights: Vec<real> = base
            .words_idx
            .iter()
            .map(|idx| scores.get(idx).copied().unwrap_or(0.0))
            .collect();
        let total: real = weights.iter().sum();
        if total > 0.0 && total.is_finite() {
            for w in &mut weights {
                *w /= total;
            }
        } else if !weights.is_empty() {
            // Degenerate weight mass: fall back to a uniform distribution.
            let uniform = 1.0 / weights.len() as real;
            weights.fill(uniform);
        }
        WeightedDocument { doc: base, weights }
    }
}

/// Relaxed WMD from a weighted query to an unweighted target: each query
/// word pays its weight times the distance to the closest target word.
/// Infinity when either bag is empty, so such pairs sort last.
pub fn rwmd(norms: &Norms, src: &WeightedDocument, target: &UnweightedDocument) -> real {
    if src.doc.is_empty() || target.is_empty() {
        return real::INFINITY;
    }
    let mut total = 0.0;
    for (&q, &weight) in src.doc.words_idx.iter().zip(&src.weights) {
        let qv = norms.word(q);
        let closest = target
            .words_idx
            .iter()
            .map(|&t| OrderedFloat(crate::distance(qv, norms.word(t))))
            .min()
            .map(|m| m.0)
            .unwrap_or(real::INFINITY);
        total += weight * closest;
    }
    total
}

/// The persisted WMD side index: one bag-of-words per training document,
/// absent for documents with no in-vocabulary words.
pub struct Wmd {
    corpus: Vec<Option<UnweightedDocument>>,
}

impl Wmd {
    /// Re-reads the corpus and projects every document onto its bag of
    /// distinct word indexes.
    pub(crate) fn build(core: &Core, source: &dyn LineSource) -> Result<Self> {
        let mut corpus: Vec<Option<UnweightedDocument>> =
            (0..core.doc_vocab.len()).map(|_| None).collect();
        let mut tagged = TaggedCorpus::new(source.fork()?)?;
        while let Some(doc) = tagged.next()? {
            if let Some(doc_idx) = core.doc_vocab.search(&doc.tag) {
                let bag = UnweightedDocument::new(&core.word_vocab, &doc);
                corpus[doc_idx] = if bag.is_empty() { None } else { Some(bag) };
            }
        }
        Ok(Wmd { corpus })
    }

    pub fn document(&self, doc_idx: usize) -> Option<&UnweightedDocument> {
        self.corpus.get(doc_idx).and_then(|d| d.as_ref())
    }

    pub fn len(&self) -> usize {
        self.corpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corpus.is_empty()
    }

    pub fn save(&self, w: &mut impl Write) -> Result<()> {
        for doc in &self.corpus {
            match doc {
                Some(bag) => bag.save(w)?,
                // An absent bag round-trips as a zero-length one.
                None => binfmt::write_u32(w, 0)?,
            }
        }
        Ok(())
    }

    pub fn load(r: &mut impl Read, corpus_size: usize) -> Result<Self> {
        let mut corpus = Vec::with_capacity(corpus_size);
        for _ in 0..corpus_size {
            let bag = UnweightedDocument::load(r)?;
            corpus.push(if bag.is_empty() { None } else { Some(bag) });
        }
        Ok(Wmd { corpus })
    }
}
