//! Vocabulary construction: frequency counting over the corpus, the
//! frequency sort with min-count pruning, and Huffman coding for
//! hierarchical softmax.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::io::{Read, Write};

use anyhow::{bail, Context, Result};

use crate::binfmt;
use crate::corpus::{LineSource, TaggedCorpus, END_OF_SENTENCE};
use crate::MAX_CODE_LENGTH;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VocabWord {
    pub word: String,
    /// Corpus frequency. Always 0 for the sentinel, 1 for doc tags.
    pub cn: u64,
    /// Huffman code bits, decision at the root first.
    pub code: Vec<u8>,
    /// Inner-node indexes visited from the root, aligned with `code`;
    /// `point[0]` is the root.
    pub point: Vec<i32>,
}

/// Token table for one embedding space.
///
/// Word mode: entry 0 is the reserved end-of-sentence sentinel (frequency
/// 0, never pruned); the rest are sorted by descending frequency, ties in
/// first-seen order, and carry Huffman codes. Doc-tag mode: entries are
/// distinct tags in first-seen order, no sentinel, no codes.
pub struct Vocabulary {
    words: Vec<VocabWord>,
    hash: HashMap<String, usize>,
    train_words: u64,
    min_count: i32,
    doctag: bool,
}

impl Vocabulary {
    pub fn build(source: &dyn LineSource, min_count: i32, doctag: bool) -> Result<Self> {
        let mut vocab = Vocabulary {
            words: Vec::with_capacity(1000),
            hash: HashMap::new(),
            train_words: 0,
            min_count: if doctag { 1 } else { min_count },
            doctag,
        };
        vocab.load_from_corpus(source)?;
        if !doctag {
            vocab.create_huffman_tree()?;
        }
        Ok(vocab)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Sum of word frequencies, sentinel excluded (doc mode: one per line).
    pub fn train_words(&self) -> u64 {
        self.train_words
    }

    pub fn is_doctag(&self) -> bool {
        self.doctag
    }

    pub fn words(&self) -> &[VocabWord] {
        &self.words
    }

    pub fn word(&self, idx: usize) -> &VocabWord {
        &self.words[idx]
    }

    /// Position of a token in the vocabulary, if present.
    pub fn search(&self, word: &str) -> Option<usize> {
        self.hash.get(word).copied()
    }

    fn add_word(&mut self, word: String, cn: u64) -> usize {
        let n = self.words.len();
        self.hash.insert(word.clone(), n);
        self.words.push(VocabWord {
            word,
            cn,
            code: Vec::new(),
            point: Vec::new(),
        });
        n
    }

    fn load_from_corpus(&mut self, source: &dyn LineSource) -> Result<()> {
        let mut corpus = TaggedCorpus::new(source.fork()?)?;
        if !self.doctag {
            self.add_word(END_OF_SENTENCE.to_string(), 0);
        }
        while let Some(doc) = corpus.next().context("error scanning corpus for vocabulary")? {
            if self.doctag {
                self.train_words += 1;
                if self.search(&doc.tag).is_none() {
                    self.add_word(doc.tag, 1);
                }
            } else {
                for word in &doc.words {
                    // The end marker keeps frequency 0 so it sorts last
                    // into the Huffman merge order.
                    if word == END_OF_SENTENCE {
                        continue;
                    }
                    self.train_words += 1;
                    if self.train_words % 100_000 == 0 {
                        eprint!("{}K\r", self.train_words / 1000);
                    }
                    match self.search(word) {
                        Some(i) => self.words[i].cn += 1,
                        None => {
                            self.add_word(word.clone(), 1);
                        }
                    }
                }
            }
        }
        if !self.doctag {
            self.sort_vocab();
            if self.words.len() <= 1 {
                bail!(
                    "vocabulary collapsed to the sentinel alone \
                     (no word occurs at least {} times)",
                    self.min_count
                );
            }
            eprintln!("Vocab size: {}", self.words.len());
            eprintln!("Words in train file: {}", self.train_words);
        }
        Ok(())
    }

    /// Sorts by frequency, prunes below `min_count`, rebuilds the hash and
    /// the training-word total.
    fn sort_vocab(&mut self) {
        // Sort the vocabulary and keep the sentinel at the first position.
        // The sort is stable, so ties keep first-seen order; Huffman codes
        // depend on this.
        self.words[1..].sort_by_key(|vw| Reverse(vw.cn));

        let min_count = self.min_count.max(0) as u64;
        while self.words.len() > 1 && self.words.last().map_or(false, |vw| vw.cn < min_count) {
            self.words.pop();
        }

        self.hash.clear();
        self.train_words = 0;
        for (i, vw) in self.words.iter().enumerate() {
            self.hash.insert(vw.word.clone(), i);
            self.train_words += vw.cn;
        }
        self.train_words -= self.words[0].cn; // sentinel excluded (cn 0)
    }

    /// Classic two-smallest-merge Huffman construction over an array of
    /// 2N−1 counts. The two-pointer scan (not a priority queue) fixes
    /// which node becomes the second child and therefore the 0/1 bits.
    fn create_huffman_tree(&mut self) -> Result<()> {
        let vocab_size = self.words.len();
        let mut count = vec![0u64; vocab_size * 2 + 1];
        let mut binary = vec![0u8; vocab_size * 2 + 1];
        let mut parent_node = vec![0usize; vocab_size * 2 + 1];

        for (a, vw) in self.words.iter().enumerate() {
            count[a] = vw.cn;
        }
        for slot in count[vocab_size..vocab_size * 2].iter_mut() {
            *slot = 1_000_000_000_000_000;
        }

        // pos1 scans leaves downward, pos2 scans filled inner slots upward.
        let mut pos1 = vocab_size;
        let mut pos2 = vocab_size;
        for a in 0..vocab_size.saturating_sub(1) {
            let min1i = if pos1 > 0 && count[pos1 - 1] < count[pos2] {
                pos1 -= 1;
                pos1
            } else {
                pos2 += 1;
                pos2 - 1
            };
            let min2i = if pos1 > 0 && count[pos1 - 1] < count[pos2] {
                pos1 -= 1;
                pos1
            } else {
                pos2 += 1;
                pos2 - 1
            };

            count[vocab_size + a] = count[min1i] + count[min2i];
            parent_node[min1i] = vocab_size + a;
            parent_node[min2i] = vocab_size + a;
            binary[min2i] = 1;
        }

        // Back-derive each leaf's code and inner-node path from the root.
        for a in 0..vocab_size {
            let mut code: Vec<u8> = Vec::new();
            let mut point: Vec<i32> = Vec::new();
            let mut b = a;
            loop {
                if !code.is_empty() {
                    point.push((b - vocab_size) as i32);
                }
                code.push(binary[b]);
                b = parent_node[b];
                if b == vocab_size * 2 - 2 {
                    break;
                }
            }
            if code.len() > MAX_CODE_LENGTH {
                bail!(
                    "Huffman code for {:?} exceeds {} bits",
                    self.words[a].word,
                    MAX_CODE_LENGTH
                );
            }
            code.reverse();
            point.push((vocab_size - 2) as i32);
            point.reverse();
            self.words[a].code = code;
            self.words[a].point = point;
        }
        Ok(())
    }

    pub fn save(&self, w: &mut impl Write) -> Result<()> {
        binfmt::write_u64(w, self.words.len() as u64)?;
        binfmt::write_u64(w, self.train_words)?;
        binfmt::write_u64(w, 0)?; // reserved
        binfmt::write_i32(w, self.min_count)?;
        binfmt::write_bool(w, self.doctag)?;
        for vw in &self.words {
            binfmt::write_u32(w, vw.word.len() as u32)?;
            w.write_all(vw.word.as_bytes())?;
            binfmt::write_u64(w, vw.cn)?;
            if !self.doctag {
                binfmt::write_u8(w, vw.code.len() as u8)?;
                for &p in &vw.point {
                    binfmt::write_i32(w, p)?;
                }
                for &c in &vw.code {
                    binfmt::write_u8(w, c)?;
                }
            }
        }
        Ok(())
    }

    pub fn load(r: &mut impl Read) -> Result<Self> {
        let size = binfmt::read_u64(r)? as usize;
        let train_words = binfmt::read_u64(r)?;
        let _reserved = binfmt::read_u64(r)?;
        let min_count = binfmt::read_i32(r)?;
        let doctag = binfmt::read_bool(r)?;

        let mut words = Vec::with_capacity(size);
        let mut hash = HashMap::with_capacity(size);
        for a in 0..size {
            let word_len = binfmt::read_u32(r)? as usize;
            let mut bytes = vec![0u8; word_len];
            r.read_exact(&mut bytes)?;
            let word = String::from_utf8_lossy(&bytes).into_owned();
            let cn = binfmt::read_u64(r)?;
            let mut vw = VocabWord {
                word: word.clone(),
                cn,
                code: Vec::new(),
                point: Vec::new(),
            };
            if !doctag {
                let code_len = binfmt::read_u8(r)? as usize;
                if code_len > MAX_CODE_LENGTH {
                    bail!("corrupt model: Huffman code length {code_len}");
                }
                let mut point = Vec::with_capacity(code_len);
                for _ in 0..code_len {
                    point.push(binfmt::read_i32(r)?);
                }
                let mut code = Vec::with_capacity(code_len);
                for _ in 0..code_len {
                    code.push(binfmt::read_u8(r)?);
                }
                vw.point = point;
                vw.code = code;
            }
            hash.insert(word, a);
            words.push(vw);
        }
        Ok(Vocabulary {
            words,
            hash,
            train_words,
            min_count,
            doctag,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::MemorySource;

    const CORPUS: &str = "doc1 cat likes fish\ndoc2 dog likes bone\n";

    #[test]
    fn word_vocab_shape_and_order() {
        let source = MemorySource::new(CORPUS);
        let vocab = Vocabulary::build(&source, 1, false).unwrap();
        assert_eq!(vocab.len(), 6);
        assert_eq!(vocab.word(0).word, END_OF_SENTENCE);
        assert_eq!(vocab.word(0).cn, 0);
        assert_eq!(vocab.word(1).word, "likes");
        assert_eq!(vocab.word(1).cn, 2);
        assert_eq!(vocab.train_words(), 6);
        // Singletons keep first-seen order behind "likes".
        let rest: Vec<&str> = vocab.words()[2..].iter().map(|w| w.word.as_str()).collect();
        assert_eq!(rest, ["cat", "fish", "dog", "bone"]);
        assert_eq!(vocab.search("likes"), Some(1));
        assert_eq!(vocab.search("zzz"), None);
    }

    #[test]
    fn doc_vocab_first_seen_order() {
        let source = MemorySource::new(CORPUS);
        let vocab = Vocabulary::build(&source, 5, true).unwrap();
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.word(0).word, "doc1");
        assert_eq!(vocab.word(1).word, "doc2");
        assert_eq!(vocab.word(0).cn, 1);
        assert!(vocab.word(0).code.is_empty());
    }

    #[test]
    fn min_count_prunes_singletons() {
        let source = MemorySource::new(CORPUS);
        let vocab = Vocabulary::build(&source, 2, false).unwrap();
        assert_eq!(vocab.len(), 2); // sentinel + "likes"
        assert_eq!(vocab.train_words(), 2);
        assert_eq!(vocab.search("cat"), None);
    }

    #[test]
    fn collapsed_vocabulary_is_rejected() {
        let source = MemorySource::new(CORPUS);
        assert!(Vocabulary::build(&source, 100, false).is_err());
    }

    #[test]
    fn huffman_codes_valid_and_prefix_free() {
        let source = MemorySource::new(
            "d1 a a a a b b b c c d e f g\nd2 a b c d e h i j k\n",
        );
        let vocab = Vocabulary::build(&source, 1, false).unwrap();
        let codes: Vec<Vec<u8>> = vocab.words().iter().map(|w| w.code.clone()).collect();
        for (vw, code) in vocab.words().iter().zip(&codes) {
            assert!(
                !code.is_empty() && code.len() <= MAX_CODE_LENGTH,
                "bad code length for {:?}",
                vw.word
            );
            assert_eq!(vw.point.len(), code.len());
        }
        for (i, a) in codes.iter().enumerate() {
            for (j, b) in codes.iter().enumerate() {
                if i != j {
                    assert!(!b.starts_with(a), "code {i} is a prefix of code {j}");
                }
            }
        }
    }

    #[test]
    fn builds_are_deterministic() {
        let text = "t1 the quick brown fox the lazy dog the end\nt2 quick quick brown end\n";
        let a = Vocabulary::build(&MemorySource::new(text), 1, false).unwrap();
        let b = Vocabulary::build(&MemorySource::new(text), 1, false).unwrap();
        assert_eq!(a.len(), b.len());
        assert_eq!(a.train_words(), b.train_words());
        for (x, y) in a.words().iter().zip(b.words().iter()) {
            assert_eq!(x, y);
        }
    }

    #[test]
    fn save_load_round_trip() {
        let source = MemorySource::new(CORPUS);
        let vocab = Vocabulary::build(&source, 1, false).unwrap();
        let mut buf = Vec::new();
        vocab.save(&mut buf).unwrap();
        let loaded = Vocabulary::load(&mut std::io::Cursor::new(buf)).unwrap();
        assert_eq!(loaded.len(), vocab.len());
        assert_eq!(loaded.train_words(), vocab.train_words());
        assert_eq!(loaded.is_doctag(), vocab.is_doctag());
        for (x, y) in vocab.words().iter().zip(loaded.words().iter()) {
            assert_eq!(x, y);
        }
        assert_eq!(loaded.search("likes"), Some(1));
    }
}
