//! The trained model: joint word and document embeddings plus everything
//! needed to query them — nearest-neighbor search in both spaces, inference
//! for novel documents, likelihood diagnostics, and WMD re-ranking.

use std::io::{Read, Write};
use std::sync::atomic::AtomicU64;
use std::thread;
use std::time::Instant;

use anyhow::{bail, ensure, Result};

use crate::corpus::{partition, LineSource, TaggedCorpus, TaggedDocument};
use crate::knn::{KnnItem, TopK};
use crate::nn::{Nn, Norms, Real};
use crate::trainer::TrainThread;
use crate::vocab::Vocabulary;
use crate::wmd::{self, WeightedDocument, Wmd};
use crate::{binfmt, normalize, real, Rng, EXP_TABLE_SIZE, MAX_DOC2VEC_KNN, MAX_EXP, NEG_TABLE_SIZE};

/// Training hyperparameters.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Embedding dimensionality for both spaces.
    pub dim: usize,
    /// Continuous bag of words (otherwise, skip-gram).
    pub cbow: bool,
    /// Hierarchical softmax output layer.
    pub hs: bool,
    /// Number of negative examples per positive one (0 = not used).
    pub negative: i32,
    /// Max skip length between words.
    pub window: usize,
    /// Training epochs; also the number of inference passes later.
    pub iter: usize,
    /// Starting learning rate; default is 0.025 for skip-gram and 0.05 for
    /// CBOW.
    pub alpha: Option<real>,
    /// Threshold for down-sampling frequent words; 0 disables.
    pub sample: real,
    /// Discard words that appear less than this many times.
    pub min_count: i32,
    pub threads: usize,
    /// 0 = silent, 1 = summary, 2 = progress during training.
    pub debug_mode: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            dim: 100,
            cbow: true,
            hs: true,
            negative: 0,
            window: 5,
            iter: 50,
            alpha: None,
            sample: 1e-3,
            min_count: 1,
            threads: 4,
            debug_mode: 2,
        }
    }
}

/// Everything the training and inference workers share: vocabularies, the
/// parameter matrices, hyperparameters, and the precomputed tables.
pub(crate) struct Core {
    pub(crate) word_vocab: Vocabulary,
    pub(crate) doc_vocab: Vocabulary,
    pub(crate) nn: Nn,
    pub(crate) cbow: bool,
    pub(crate) negative: i32,
    pub(crate) window: usize,
    pub(crate) start_alpha: real,
    pub(crate) sample: real,
    pub(crate) iter: usize,
    pub(crate) debug_mode: usize,
    pub(crate) exp_table: Vec<real>,
    pub(crate) neg_table: Vec<u32>,
    pub(crate) word_count_actual: AtomicU64,
    pub(crate) start: Instant,
}

fn build_exp_table() -> Vec<real> {
    (0..EXP_TABLE_SIZE)
        .map(|i| {
            let e = ((i as real / EXP_TABLE_SIZE as real * 2.0 - 1.0) * MAX_EXP).exp(); // Precompute the exp() table
            e / (e + 1.0) // Precompute f(x) = x / (x + 1)
        })
        .collect()
}

/// Unigram-frequency table raised to the 3/4 power, for drawing negative
/// samples proportionally. Entry 0 (the sentinel, frequency 0) occupies the
/// first slot and is remapped at draw time.
fn build_neg_table(vocab: &Vocabulary) -> Vec<u32> {
    let power: f64 = 0.75;
    let train_words_pow = vocab
        .words()
        .iter()
        .map(|vw| (vw.cn as f64).powf(power))
        .sum::<f64>();

    let mut table = Vec::with_capacity(NEG_TABLE_SIZE);
    let mut i = 0;
    let mut d1 = (vocab.word(i).cn as f64).powf(power) / train_words_pow;
    for a in 0..NEG_TABLE_SIZE {
        table.push(i as u32);
        if a as f64 / NEG_TABLE_SIZE as f64 > d1 && i + 1 < vocab.len() {
            i += 1;
            d1 += (vocab.word(i).cn as f64).powf(power) / train_words_pow;
        }
    }
    table
}

impl Core {
    /// Table lookup of the logistic function, saturating outside
    /// [-MAX_EXP, MAX_EXP]. The integer index scale keeps every in-range
    /// argument, boundaries included, inside the table.
    pub(crate) fn sigmoid(&self, f: real) -> real {
        if f > MAX_EXP {
            1.0
        } else if f < -MAX_EXP {
            0.0
        } else {
            self.exp_table[((f + MAX_EXP) * (EXP_TABLE_SIZE / MAX_EXP as usize / 2) as real) as usize]
        }
    }

    /// Gradient-descends a fresh document vector against the frozen model.
    /// Deterministic: the vector initialization and window draws come from
    /// fixed-seed LCGs. Returns the unit-length result; a document with no
    /// usable words yields the normalized initialization.
    pub(crate) fn infer_doc(&self, doc: &TaggedDocument, skip: Option<usize>) -> Vec<real> {
        let dim = self.nn.dim();
        let cells: Vec<Real> = (0..dim).map(|_| Real::default()).collect();
        let mut rng = Rng::new(1);
        for cell in &cells {
            cell.set((rng.next_real() - 0.5) / dim as real);
        }

        let mut thread = TrainThread::new(self, 0, true);
        thread.set_doc_vector(&cells);
        thread.build_document(doc, skip);
        for a in 0..self.iter {
            thread.train_document();
            let alpha =
                self.start_alpha * (1.0 - (a as real + 1.0) / self.iter as real).max(0.0001);
            thread.set_alpha(alpha);
        }

        let mut vector: Vec<real> = cells.iter().map(Real::get).collect();
        normalize(&mut vector);
        vector
    }
}

/// A trained (or loaded) doc2vec model.
pub struct Doc2Vec {
    core: Core,
    norms: Norms,
    wmd: Wmd,
}

impl Doc2Vec {
    /// Trains a new model over the corpus behind `source`: vocabulary
    /// passes, multi-threaded SGD over per-thread document partitions, then
    /// the derived search structures.
    pub fn train(source: &dyn LineSource, config: &TrainConfig) -> Result<Doc2Vec> {
        ensure!(config.dim > 0, "embedding size must be positive");
        ensure!(config.window > 0, "window must be positive");
        ensure!(config.iter > 0, "iteration count must be positive");
        ensure!(
            config.hs || config.negative > 0,
            "no training signal: enable hierarchical softmax and/or negative sampling"
        );

        let word_vocab = Vocabulary::build(source, config.min_count, false)?;
        let doc_vocab = Vocabulary::build(source, 1, true)?;
        if config.debug_mode > 0 {
            eprintln!("Documents: {}", doc_vocab.len());
        }

        let nn = Nn::new(
            word_vocab.len(),
            doc_vocab.len(),
            config.dim,
            config.hs,
            config.negative,
        );
        let neg_table = if config.negative > 0 {
            build_neg_table(&word_vocab)
        } else {
            Vec::new()
        };
        let core = Core {
            word_vocab,
            doc_vocab,
            nn,
            cbow: config.cbow,
            negative: config.negative,
            window: config.window,
            start_alpha: config
                .alpha
                .unwrap_or(if config.cbow { 0.05 } else { 0.025 }),
            sample: config.sample,
            iter: config.iter,
            debug_mode: config.debug_mode,
            exp_table: build_exp_table(),
            neg_table,
            word_count_actual: AtomicU64::new(0),
            start: Instant::now(),
        };

        let partitions = partition(source, core.doc_vocab.train_words(), config.threads)?;
        let mut subs = Vec::with_capacity(partitions.len());
        for part in &partitions {
            subs.push(TaggedCorpus::with_range(source.fork()?, part.offset, part.limit)?);
        }
        if core.debug_mode > 0 {
            eprintln!("Training with {} threads", subs.len());
        }

        thread::scope(|s| -> Result<()> {
            let core = &core;
            let handles = subs
                .into_iter()
                .enumerate()
                .map(|(id, mut sub)| {
                    s.spawn(move || -> Result<()> {
                        let mut worker = TrainThread::new(core, id as u64, false);
                        worker.train(&mut sub)
                    })
                })
                .collect::<Vec<_>>();
            for handle in handles {
                if let Err(err) = handle.join().unwrap() {
                    bail!("error in worker thread: {err:#}");
                }
            }
            Ok(())
        })?;
        if core.debug_mode > 1 {
            eprintln!();
        }

        let norms = core.nn.norm();
        let wmd = Wmd::build(&core, source)?;
        Ok(Doc2Vec { core, norms, wmd })
    }

    pub(crate) fn core(&self) -> &Core {
        &self.core
    }

    pub fn dim(&self) -> usize {
        self.core.nn.dim()
    }

    pub fn word_vocab(&self) -> &Vocabulary {
        &self.core.word_vocab
    }

    pub fn doc_vocab(&self) -> &Vocabulary {
        &self.core.doc_vocab
    }

    pub fn wmd(&self) -> &Wmd {
        &self.wmd
    }

    pub fn save(&self, w: &mut impl Write) -> Result<()> {
        self.core.word_vocab.save(w)?;
        self.core.doc_vocab.save(w)?;
        self.core.nn.save(w)?;
        binfmt::write_i32(w, self.core.cbow as i32)?;
        binfmt::write_i32(w, self.core.nn.hs() as i32)?;
        binfmt::write_i32(w, self.core.negative)?;
        binfmt::write_i32(w, self.core.window as i32)?;
        binfmt::write_f32(w, self.core.start_alpha)?;
        binfmt::write_f32(w, self.core.sample)?;
        binfmt::write_i32(w, self.core.iter as i32)?;
        self.wmd.save(w)?;
        Ok(())
    }

    pub fn load(r: &mut impl Read) -> Result<Doc2Vec> {
        let word_vocab = Vocabulary::load(r)?;
        let doc_vocab = Vocabulary::load(r)?;
        let nn = Nn::load(r)?;
        ensure!(
            nn.vocab_size() == word_vocab.len() && nn.corpus_size() == doc_vocab.len(),
            "corrupt model: vocabulary and embedding sizes disagree"
        );
        let cbow = binfmt::read_i32(r)? != 0;
        let hs = binfmt::read_i32(r)? != 0;
        ensure!(hs == nn.hs(), "corrupt model: inconsistent hs flags");
        let negative = binfmt::read_i32(r)?;
        let window = binfmt::read_i32(r)?;
        ensure!(window > 0, "corrupt model: nonpositive window");
        let start_alpha = binfmt::read_f32(r)?;
        let sample = binfmt::read_f32(r)?;
        let iter = binfmt::read_i32(r)?;
        ensure!(iter > 0, "corrupt model: nonpositive iteration count");

        let neg_table = if negative > 0 {
            build_neg_table(&word_vocab)
        } else {
            Vec::new()
        };
        let core = Core {
            word_vocab,
            doc_vocab,
            nn,
            cbow,
            negative,
            window: window as usize,
            start_alpha,
            sample,
            iter: iter as usize,
            debug_mode: 0,
            exp_table: build_exp_table(),
            neg_table,
            word_count_actual: AtomicU64::new(0),
            start: Instant::now(),
        };
        let norms = core.nn.norm();
        let wmd = Wmd::load(r, core.doc_vocab.len())?;
        Ok(Doc2Vec { core, norms, wmd })
    }

    /// Unit-length vector for a novel document, inferred against the frozen
    /// model.
    pub fn infer_doc(&self, doc: &TaggedDocument) -> Vec<real> {
        self.core.infer_doc(doc, None)
    }

    /// Log-likelihood of a document's words under its document vector
    /// (trained if the tag is known, otherwise 0). Requires hierarchical
    /// softmax; 0 without it.
    pub fn doc_likelihood(&self, doc: &TaggedDocument) -> real {
        if !self.core.nn.hs() {
            return 0.0;
        }
        let mut thread = TrainThread::new(&self.core, 0, true);
        thread.build_document(doc, None);
        thread.doc_likelihood()
    }

    /// Log-likelihood of the word at `position` in `doc.words`, given its
    /// window context and the document vector. 0 for unknown words, the end
    /// marker, or without hierarchical softmax.
    pub fn context_likelihood(&self, doc: &TaggedDocument, position: usize) -> real {
        if !self.core.nn.hs() || position >= doc.words.len() {
            return 0.0;
        }
        match self.core.word_vocab.search(&doc.words[position]) {
            None | Some(0) => return 0.0,
            Some(_) => {}
        }
        // Re-derive the target's index in the built buffers: unknown words
        // before it are dropped, and an earlier end marker truncates the
        // buffers short of the target entirely.
        let mut adjusted = 0;
        for word in &doc.words[..position] {
            match self.core.word_vocab.search(word) {
                None => continue,
                Some(0) => return 0.0,
                Some(_) => adjusted += 1,
            }
        }
        let mut thread = TrainThread::new(&self.core, 0, true);
        thread.build_document(doc, None);
        thread.context_likelihood(adjusted)
    }

    /// Exact top-k cosine scan of one embedding space. The end-of-sentence
    /// sentinel is never reported as a word neighbor.
    fn knn(&self, src: &[real], exclude: Option<usize>, word_space: bool, k: usize) -> Vec<KnnItem> {
        let vocab = if word_space {
            &self.core.word_vocab
        } else {
            &self.core.doc_vocab
        };
        let first = usize::from(word_space);
        let mut top = TopK::new(k);
        for b in first..vocab.len() {
            if exclude == Some(b) {
                continue;
            }
            let target = if word_space {
                self.norms.word(b)
            } else {
                self.norms.doc(b)
            };
            top.collect(b, crate::similarity(src, target));
        }
        top.into_sorted()
            .into_iter()
            .map(|(idx, similarity)| KnnItem {
                word: vocab.word(idx).word.clone(),
                idx,
                similarity,
            })
            .collect()
    }

    /// Words most similar to a vocabulary word. `None` if the word is
    /// unknown (the end marker counts as unknown).
    pub fn word_knn_words(&self, search: &str, k: usize) -> Option<Vec<KnnItem>> {
        let a = self.core.word_vocab.search(search).filter(|&a| a > 0)?;
        Some(self.knn(self.norms.word(a), Some(a), true, k))
    }

    /// Documents most similar to a vocabulary word.
    pub fn word_knn_docs(&self, search: &str, k: usize) -> Option<Vec<KnnItem>> {
        let a = self.core.word_vocab.search(search).filter(|&a| a > 0)?;
        Some(self.knn(self.norms.word(a), None, false, k))
    }

    /// Documents most similar to a training document, identified by tag.
    pub fn doc_knn_docs(&self, search: &str, k: usize) -> Option<Vec<KnnItem>> {
        let a = self.core.doc_vocab.search(search)?;
        Some(self.knn(self.norms.doc(a), Some(a), false, k))
    }

    /// Words closest to a novel document's inferred vector.
    pub fn sent_knn_words(&self, doc: &TaggedDocument, k: usize) -> Vec<KnnItem> {
        let src = self.core.infer_doc(doc, None);
        self.knn(&src, None, true, k)
    }

    /// Training documents closest to a novel document's inferred vector.
    pub fn sent_knn_docs(&self, doc: &TaggedDocument, k: usize) -> Vec<KnnItem> {
        let src = self.core.infer_doc(doc, None);
        self.knn(&src, None, false, k)
    }

    /// Two-stage WMD search: a wide cosine shortlist in document space,
    /// re-ranked by relaxed Word Mover's Distance. Reported similarity is
    /// the negated distance, so larger still means closer.
    pub fn wmd_knn_docs(&self, doc: &TaggedDocument, k: usize) -> Vec<KnnItem> {
        let shortlist = self.sent_knn_docs(doc, MAX_DOC2VEC_KNN);
        let weighted = WeightedDocument::new(&self.core, doc);
        self.rerank(&weighted, shortlist.iter().map(|item| item.idx), k)
    }

    /// WMD search over the entire corpus, no shortlist.
    pub fn wmd_knn_docs_scan(&self, doc: &TaggedDocument, k: usize) -> Vec<KnnItem> {
        let weighted = WeightedDocument::new(&self.core, doc);
        self.rerank(&weighted, 0..self.core.doc_vocab.len(), k)
    }

    fn rerank(
        &self,
        weighted: &WeightedDocument,
        candidates: impl Iterator<Item = usize>,
        k: usize,
    ) -> Vec<KnnItem> {
        if weighted.doc.is_empty() {
            return Vec::new();
        }
        let mut top = TopK::new(k);
        for idx in candidates {
            let Some(target) = self.wmd.document(idx) else {
                continue;
            };
            top.collect(idx, -wmd::rwmd(&self.norms, weighted, target));
        }
        top.into_sorted()
            .into_iter()
            .map(|(idx, similarity)| KnnItem {
                word: self.core.doc_vocab.word(idx).word.clone(),
                idx,
                similarity,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::MemorySource;
    use crate::norm;

    const CORPUS: &str = "doc1 cat likes fish\ndoc2 dog likes bone\n";

    fn config() -> TrainConfig {
        TrainConfig {
            dim: 10,
            iter: 5,
            threads: 1,
            sample: 0.0,
            debug_mode: 0,
            ..TrainConfig::default()
        }
    }

    fn model() -> Doc2Vec {
        Doc2Vec::train(&MemorySource::new(CORPUS), &config()).unwrap()
    }

    #[test]
    fn trains_expected_vocabularies() {
        let model = model();
        // </s>, likes, cat, fish, dog, bone
        assert_eq!(model.word_vocab().len(), 6);
        assert_eq!(model.word_vocab().word(0).word, "</s>");
        assert_eq!(model.word_vocab().word(1).word, "likes");
        assert_eq!(model.word_vocab().word(1).cn, 2);
        assert_eq!(model.doc_vocab().len(), 2);
        assert_eq!(model.doc_vocab().word(0).word, "doc1");
    }

    #[test]
    fn empty_corpus_is_rejected() {
        assert!(Doc2Vec::train(&MemorySource::new(""), &config()).is_err());
    }

    #[test]
    fn rejects_config_without_training_signal() {
        let config = TrainConfig {
            hs: false,
            negative: 0,
            ..config()
        };
        assert!(Doc2Vec::train(&MemorySource::new(CORPUS), &config).is_err());
    }

    #[test]
    fn word_knn_words_excludes_self_and_sentinel() {
        let model = model();
        let items = model.word_knn_words("likes", 10).unwrap();
        // 6-word vocabulary minus the sentinel and the query itself.
        assert_eq!(items.len(), 4);
        assert!(items.iter().all(|item| item.word != "likes"));
        assert!(items.iter().all(|item| item.word != "</s>"));
        // Descending similarity, every score a valid cosine.
        for pair in items.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
        for item in &items {
            assert!((-1.0 - 1e-5..=1.0 + 1e-5).contains(&item.similarity));
        }

        assert!(model.word_knn_words("unknown", 10).is_none());
        assert!(model.word_knn_words("</s>", 10).is_none());
    }

    #[test]
    fn doc_knn_docs_excludes_self() {
        let model = model();
        let items = model.doc_knn_docs("doc1", 10).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].word, "doc2");
        assert!(model.doc_knn_docs("doc3", 10).is_none());
    }

    #[test]
    fn word_knn_docs_ranks_both_documents() {
        let model = model();
        let items = model.word_knn_docs("cat", 10).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn inference_is_deterministic_and_normalized() {
        let model = model();
        let doc = TaggedDocument::new("new", &["cat", "likes", "bone", "</s>"]);
        let v1 = model.infer_doc(&doc);
        let v2 = model.infer_doc(&doc);
        assert_eq!(v1, v2);
        assert_eq!(v1.len(), 10);
        assert!((norm(&v1) - 1.0).abs() < 1e-5);

        // No usable words: still a unit vector (the normalized init).
        let empty = TaggedDocument::new("new", &["zzz", "</s>"]);
        let v = model.infer_doc(&empty);
        assert!((norm(&v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn sent_knn_finds_neighbors_in_both_spaces() {
        let model = model();
        let doc = TaggedDocument::new("new", &["cat", "likes", "fish", "</s>"]);
        let words = model.sent_knn_words(&doc, 3);
        assert_eq!(words.len(), 3);
        assert!(words.iter().all(|item| item.word != "</s>"));
        let docs = model.sent_knn_docs(&doc, 10);
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn wmd_reranking_prefers_shared_words() {
        let model = model();
        let doc = TaggedDocument::new("new", &["cat", "likes", "fish", "</s>"]);
        let items = model.wmd_knn_docs(&doc, 10);
        assert_eq!(items.len(), 2);
        // doc1 shares every word with the query, so its relaxed WMD is 0.
        assert_eq!(items[0].word, "doc1");
        assert_eq!(items[0].similarity, 0.0);
        assert!(items[1].similarity < 0.0);

        let scan = model.wmd_knn_docs_scan(&doc, 10);
        assert_eq!(scan[0].word, "doc1");

        // A query with no vocabulary words has no meaningful distances.
        let empty = TaggedDocument::new("new", &["zzz", "</s>"]);
        assert!(model.wmd_knn_docs(&empty, 10).is_empty());
    }

    #[test]
    fn likelihoods_are_finite_log_probabilities() {
        let model = model();
        let doc = TaggedDocument::new("doc1", &["cat", "likes", "fish", "</s>"]);
        let dl = model.doc_likelihood(&doc);
        assert!(dl.is_finite() && dl < 0.0);

        let cl = model.context_likelihood(&doc, 1);
        assert!(cl.is_finite() && cl < 0.0);
        // Unknown word or the end marker: no likelihood.
        let with_unknown = TaggedDocument::new("doc1", &["zzz", "likes", "</s>"]);
        assert_eq!(model.context_likelihood(&with_unknown, 0), 0.0);
        assert_eq!(model.context_likelihood(&doc, 3), 0.0);
    }

    #[test]
    fn sigmoid_covers_the_boundaries_and_saturates() {
        let model = model();
        let core = model.core();
        // The largest f32 strictly below MAX_EXP.
        let just_below = real::from_bits(MAX_EXP.to_bits() - 1);
        for f in [-MAX_EXP, -just_below, -1.0, 0.0, 1.0, just_below, MAX_EXP] {
            let p = core.sigmoid(f);
            assert!((0.0..=1.0).contains(&p), "sigmoid({f}) = {p}");
        }
        assert!(core.sigmoid(MAX_EXP) < 1.0);
        assert!(core.sigmoid(-MAX_EXP) > 0.0);
        assert_eq!(core.sigmoid(MAX_EXP + 1.0), 1.0);
        assert_eq!(core.sigmoid(-MAX_EXP - 1.0), 0.0);
        assert!((core.sigmoid(0.0) - 0.5).abs() < 0.01);
    }

    #[test]
    fn context_likelihood_accounts_for_dropped_and_truncated_words() {
        let model = model();
        // An earlier end marker truncates the buffers before the target.
        let truncated = TaggedDocument::new("doc1", &["cat", "</s>", "likes", "fish"]);
        assert_eq!(model.context_likelihood(&truncated, 2), 0.0);

        // An unknown word before the target shifts it left by one; both
        // spellings must address the same buffer entry.
        let with_unknown = TaggedDocument::new("doc1", &["zzz", "cat", "likes", "</s>"]);
        let plain = TaggedDocument::new("doc1", &["cat", "likes", "</s>"]);
        assert_eq!(
            model.context_likelihood(&with_unknown, 2),
            model.context_likelihood(&plain, 1)
        );
    }

    #[test]
    fn wmd_skips_documents_without_vocabulary_words() {
        let source = MemorySource::new("doc1 cat likes fish\ndoc2 likes bone\ndoc3 zz\n");
        let config = TrainConfig {
            min_count: 2,
            ..config()
        };
        let model = Doc2Vec::train(&source, &config).unwrap();
        // Every word of doc3 was pruned, so it has no bag.
        assert!(model.wmd().document(2).is_none());

        let query = TaggedDocument::new("q", &["likes", "</s>"]);
        let items = model.wmd_knn_docs_scan(&query, 10);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.word != "doc3"));
    }

    #[test]
    fn multi_threaded_training_covers_all_documents() {
        let source = MemorySource::new(CORPUS);
        let config = TrainConfig {
            threads: 2,
            ..config()
        };
        let model = Doc2Vec::train(&source, &config).unwrap();
        assert_eq!(model.doc_vocab().len(), 2);
        assert!(model.doc_knn_docs("doc2", 10).is_some());
    }

    #[test]
    fn skip_gram_with_negative_sampling_trains() {
        let source = MemorySource::new(CORPUS);
        let config = TrainConfig {
            cbow: false,
            hs: false,
            negative: 5,
            ..config()
        };
        let model = Doc2Vec::train(&source, &config).unwrap();
        let doc = TaggedDocument::new("new", &["cat", "likes", "fish", "</s>"]);
        let v = model.infer_doc(&doc);
        assert!(v.iter().all(|x| x.is_finite()));
        assert_eq!(model.doc_likelihood(&doc), 0.0);
    }

    #[test]
    fn save_load_round_trip_preserves_queries() {
        let model = model();
        let mut buf = Vec::new();
        model.save(&mut buf).unwrap();
        let loaded = Doc2Vec::load(&mut std::io::Cursor::new(buf)).unwrap();

        assert_eq!(loaded.word_vocab().len(), model.word_vocab().len());
        assert_eq!(loaded.doc_vocab().len(), model.doc_vocab().len());
        assert_eq!(loaded.dim(), model.dim());

        let a = model.word_knn_words("cat", 10).unwrap();
        let b = loaded.word_knn_words("cat", 10).unwrap();
        assert_eq!(a, b);

        let doc = TaggedDocument::new("new", &["dog", "likes", "fish", "</s>"]);
        assert_eq!(model.infer_doc(&doc), loaded.infer_doc(&doc));
        assert_eq!(model.doc_likelihood(&doc), loaded.doc_likelihood(&doc));

        let w1 = model.wmd_knn_docs(&doc, 5);
        let w2 = loaded.wmd_knn_docs(&doc, 5);
        assert_eq!(w1, w2);
    }
}
