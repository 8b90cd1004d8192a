//! The per-thread SGD worker. One `TrainThread` owns the thread-local
//! training state (LCG, sentence buffers, hidden-layer scratch) and runs the
//! CBOW / skip-gram updates against the shared parameter matrices.
//!
//! The same worker, constructed in frozen mode, drives inference for novel
//! documents and the likelihood diagnostics: the update math is identical
//! except that every matrix but the document vector is left untouched.

use std::io::Write as _;
use std::sync::atomic::Ordering;

use anyhow::Result;

use crate::corpus::{TaggedCorpus, TaggedDocument};
use crate::model::Core;
use crate::nn::Real;
use crate::{real, Rng, MAX_EXP};

/// Redraws allowed when a negative sample collides with the positive target
/// before the collision is accepted as an ordinary label-0 example.
const NEG_SAMPLE_ATTEMPTS: usize = 3;

pub(crate) struct TrainThread<'a> {
    core: &'a Core,
    /// Frozen mode: only the document vector learns.
    infer: bool,
    rng: Rng,
    /// Sub-sampled word indexes of the current document.
    sen: Vec<usize>,
    /// All in-vocabulary word indexes of the current document, used by the
    /// likelihood diagnostics which must see every word.
    sen_nosample: Vec<usize>,
    doc_vector: Option<&'a [Real]>,
    word_count: u64,
    last_word_count: u64,
    alpha: real,
    neu1: Vec<real>,
    neu1e: Vec<real>,
}

impl<'a> TrainThread<'a> {
    pub(crate) fn new(core: &'a Core, id: u64, infer: bool) -> Self {
        let dim = core.nn.dim();
        TrainThread {
            core,
            infer,
            rng: Rng::new(id),
            sen: Vec::new(),
            sen_nosample: Vec::new(),
            doc_vector: None,
            word_count: 0,
            last_word_count: 0,
            alpha: core.start_alpha,
            neu1: vec![0.0; dim],
            neu1e: vec![0.0; dim],
        }
    }

    pub(crate) fn set_doc_vector(&mut self, vector: &'a [Real]) {
        self.doc_vector = Some(vector);
    }

    pub(crate) fn set_alpha(&mut self, alpha: real) {
        self.alpha = alpha;
    }

    pub(crate) fn sen_nosample(&self) -> &[usize] {
        &self.sen_nosample
    }

    /// Worker entry point: `iter` epochs over this thread's partition.
    pub(crate) fn train(&mut self, corpus: &mut TaggedCorpus) -> Result<()> {
        for _ in 0..self.core.iter {
            corpus.rewind()?;
            while let Some(doc) = corpus.next()? {
                self.update_lr();
                self.build_document(&doc, None);
                self.train_document();
            }
        }
        self.core
            .word_count_actual
            .fetch_add(self.word_count - self.last_word_count, Ordering::Relaxed);
        Ok(())
    }

    /// Tokenized document -> word indexes. Unknown words are dropped, the
    /// scan stops at the end-of-sentence index, and `sen` additionally
    /// applies frequency sub-sampling. `skip` omits one word position, for
    /// the leave-one-out inference done by the WMD weighting.
    pub(crate) fn build_document(&mut self, doc: &TaggedDocument, skip: Option<usize>) {
        let core = self.core;
        self.sen.clear();
        self.sen_nosample.clear();
        for (a, word) in doc.words.iter().enumerate() {
            if Some(a) == skip {
                continue;
            }
            let Some(word_idx) = core.word_vocab.search(word) else {
                continue;
            };
            if word_idx == 0 {
                break;
            }
            self.word_count += 1;
            self.sen_nosample.push(word_idx);
            if !self.down_sample(core.word_vocab.word(word_idx).cn) {
                self.sen.push(word_idx);
            }
        }
        // Diagnostics over an already-trained document read its learned
        // vector; inference pre-sets its own instead, which wins here.
        if !self.infer || self.doc_vector.is_none() {
            self.doc_vector = core
                .doc_vocab
                .search(&doc.tag)
                .map(|doc_idx| core.nn.dsyn0_row(doc_idx));
        }
    }

    // The subsampling randomly discards frequent words while keeping the ranking same
    fn down_sample(&mut self, cn: u64) -> bool {
        let sample = self.core.sample;
        if sample <= 0.0 {
            return false;
        }
        let f = cn as real;
        let k = sample * self.core.word_vocab.train_words() as real;
        let ran = ((f / k).sqrt() + 1.0) * k / f;
        ran < self.rng.next_real()
    }

    /// One pass of updates over the current `sen`.
    pub(crate) fn train_document(&mut self) {
        if self.doc_vector.is_none() {
            return;
        }
        let window = self.core.window;
        for pos in 0..self.sen.len() {
            let b = self.rng.next_u64() as usize % window;
            let start = pos.saturating_sub(window - b);
            let end = (pos + window - b + 1).min(self.sen.len());
            if self.core.cbow {
                self.train_sample_cbow(pos, start, end);
            } else {
                self.train_sample_sg(pos, start, end);
            }
        }
    }

    // train the cbow architecture: the document vector joins the averaged
    // context as one more input
    fn train_sample_cbow(&mut self, central: usize, start: usize, end: usize) {
        let core = self.core;
        let nn = &core.nn;
        let dim = nn.dim();
        let Some(doc_vector) = self.doc_vector else {
            return;
        };

        // in -> hidden
        self.neu1.fill(0.0);
        self.neu1e.fill(0.0);
        let mut cw = 0u32;
        for a in start..end {
            if a == central {
                continue;
            }
            let last_word = self.sen[a];
            for c in 0..dim {
                self.neu1[c] += nn.syn0[last_word * dim + c].get();
            }
            cw += 1;
        }
        for c in 0..dim {
            self.neu1[c] += doc_vector[c].get();
        }
        cw += 1;
        for c in 0..dim {
            self.neu1[c] /= cw as real;
        }

        self.predict(self.sen[central]);

        // hidden -> in
        if !self.infer {
            for a in start..end {
                if a == central {
                    continue;
                }
                let last_word = self.sen[a];
                for c in 0..dim {
                    nn.syn0[last_word * dim + c].add(self.neu1e[c]);
                }
            }
        }
        for c in 0..dim {
            doc_vector[c].add(self.neu1e[c]);
        }
    }

    // train skip-gram: each context word is predicted twice, once from the
    // central word vector and once from the document vector
    fn train_sample_sg(&mut self, central: usize, start: usize, end: usize) {
        let core = self.core;
        let nn = &core.nn;
        let dim = nn.dim();
        let Some(doc_vector) = self.doc_vector else {
            return;
        };
        let central_word = self.sen[central];

        for a in start..end {
            if a == central {
                continue;
            }
            let target = self.sen[a];
            if !self.infer {
                let input = &nn.syn0[central_word * dim..][..dim];
                self.train_pair_sg(target, input);
            }
            self.train_pair_sg(target, doc_vector);
        }
    }

    fn train_pair_sg(&mut self, target: usize, input: &[Real]) {
        let dim = self.core.nn.dim();
        for c in 0..dim {
            self.neu1[c] = input[c].get();
        }
        self.neu1e.fill(0.0);
        self.predict(target);
        for c in 0..dim {
            input[c].add(self.neu1e[c]);
        }
    }

    /// Predicts `target` from the hidden vector in `neu1`, accumulating the
    /// input-side error into `neu1e`. Output matrices learn unless frozen.
    fn predict(&mut self, target: usize) {
        let core = self.core;
        let nn = &core.nn;
        let dim = nn.dim();
        let alpha = self.alpha;

        // HIERARCHICAL SOFTMAX
        if let Some(syn1) = nn.syn1.as_ref() {
            let vw = core.word_vocab.word(target);
            for d in 0..vw.code.len() {
                let l2 = vw.point[d] as usize * dim;
                // Propagate hidden -> output
                let mut f = 0.0;
                for c in 0..dim {
                    f += self.neu1[c] * syn1[l2 + c].get();
                }
                if f <= -MAX_EXP || f >= MAX_EXP {
                    continue;
                }
                let f = core.sigmoid(f);
                // 'g' is the gradient multiplied by the learning rate
                let g = ((1 - vw.code[d] as i32) as real - f) * alpha;
                // Propagate errors output -> hidden
                for c in 0..dim {
                    self.neu1e[c] += g * syn1[l2 + c].get();
                }
                // Learn weights hidden -> output
                if !self.infer {
                    for c in 0..dim {
                        syn1[l2 + c].add(g * self.neu1[c]);
                    }
                }
            }
        }

        // NEGATIVE SAMPLING
        if let Some(syn1neg) = nn.syn1neg.as_ref() {
            for d in 0..=core.negative {
                let (sample, label) = if d == 0 {
                    (target, 1.0)
                } else {
                    (self.negative_sample(target), 0.0)
                };
                let l2 = sample * dim;
                let mut f = 0.0;
                for c in 0..dim {
                    f += self.neu1[c] * syn1neg[l2 + c].get();
                }
                let yh = core.sigmoid(f);
                let g = (label - yh) * alpha;
                for c in 0..dim {
                    self.neu1e[c] += g * syn1neg[l2 + c].get();
                }
                if !self.infer {
                    for c in 0..dim {
                        syn1neg[l2 + c].add(g * self.neu1[c]);
                    }
                }
            }
        }
    }

    /// Draws from the unigram table, remapping the end-of-sentence index to
    /// a uniform pick. A draw equal to `exclude` is retried a bounded number
    /// of times and then accepted, so the number of updates per positive
    /// example stays fixed.
    fn negative_sample(&mut self, exclude: usize) -> usize {
        let core = self.core;
        let vocab_size = core.word_vocab.len();
        let mut target = exclude;
        for _ in 0..NEG_SAMPLE_ATTEMPTS {
            let r = self.rng.next_u64();
            target = core.neg_table[(r >> 16) as usize % core.neg_table.len()] as usize;
            if target == 0 {
                target = r as usize % (vocab_size - 1) + 1;
            }
            if target != exclude {
                break;
            }
        }
        target
    }

    /// Pulls the shared progress counter forward and decays the learning
    /// rate linearly, floored at 1/10000 of the starting rate.
    fn update_lr(&mut self) {
        if self.word_count - self.last_word_count > 10_000 {
            let n = self.word_count - self.last_word_count;
            let word_count_actual = self.core.word_count_actual.fetch_add(n, Ordering::Relaxed) + n;
            self.last_word_count = self.word_count;

            let denom = (self.core.iter as u64 * self.core.word_vocab.train_words() + 1) as real;
            if self.core.debug_mode > 1 {
                eprint!(
                    "\rAlpha: {:.6}  Progress: {:.2}%  Words/thread/sec: {:.2}k  ",
                    self.alpha,
                    word_count_actual as real / denom * 100.0,
                    word_count_actual as real
                        / ((self.core.start.elapsed().as_secs_f64() + 1.0) as real * 1000.0),
                );
                let _ = std::io::stderr().flush();
            }
            self.alpha = self.core.start_alpha * (1.0 - word_count_actual as real / denom).max(0.0001);
        }
    }

    /// Sum of log-probabilities of every Huffman-path decision for every
    /// word of the current document, predicted from the document vector
    /// alone. Zero when hierarchical softmax is off.
    pub(crate) fn doc_likelihood(&self) -> real {
        let Some(doc_vector) = self.doc_vector else {
            return 0.0;
        };
        let hidden: Vec<real> = doc_vector.iter().map(Real::get).collect();
        self.sen_nosample
            .iter()
            .map(|&word| self.likelihood_pair(word, &hidden))
            .sum()
    }

    /// Log-probability of the word at `position` (into `sen_nosample`)
    /// given its CBOW hidden vector: averaged context words plus the
    /// document vector.
    pub(crate) fn context_likelihood(&mut self, position: usize) -> real {
        let core = self.core;
        let nn = &core.nn;
        let dim = nn.dim();
        let Some(doc_vector) = self.doc_vector else {
            return 0.0;
        };
        if position >= self.sen_nosample.len() {
            return 0.0;
        }

        let window = core.window;
        let b = self.rng.next_u64() as usize % window;
        let start = position.saturating_sub(window - b);
        let end = (position + window - b + 1).min(self.sen_nosample.len());

        self.neu1.fill(0.0);
        let mut cw = 0u32;
        for a in start..end {
            if a == position {
                continue;
            }
            let last_word = self.sen_nosample[a];
            for c in 0..dim {
                self.neu1[c] += nn.syn0[last_word * dim + c].get();
            }
            cw += 1;
        }
        for c in 0..dim {
            self.neu1[c] += doc_vector[c].get();
        }
        cw += 1;
        for c in 0..dim {
            self.neu1[c] /= cw as real;
        }

        self.likelihood_pair(self.sen_nosample[position], &self.neu1)
    }

    fn likelihood_pair(&self, central: usize, hidden: &[real]) -> real {
        let core = self.core;
        let dim = core.nn.dim();
        let Some(syn1) = core.nn.syn1.as_ref() else {
            return 0.0;
        };
        let vw = core.word_vocab.word(central);
        let mut likelihood = 0.0;
        for d in 0..vw.code.len() {
            let l2 = vw.point[d] as usize * dim;
            let mut f = 0.0;
            for c in 0..dim {
                f += hidden[c] * syn1[l2 + c].get();
            }
            let p = core.sigmoid(f.clamp(-MAX_EXP, MAX_EXP));
            let p = if vw.code[d] == 0 { p } else { 1.0 - p };
            likelihood += p.ln();
        }
        likelihood
    }
}
