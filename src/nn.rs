//! The embedding store: four flat row-major parameter matrices shared by
//! every worker thread, plus the derived L2-normalized copies used only by
//! similarity search.
//!
//! Workers read and write the matrices concurrently without locks; each
//! cell is an atomic f32 accessed with relaxed ordering, so concurrent
//! updates can occasionally lose an increment. That is the intended
//! word2vec concurrency model, not a bug to fix with synchronization.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicU32, Ordering};

use aligned_box::AlignedBox;
use anyhow::{bail, Result};

use crate::binfmt;
use crate::{real, Rng};

/// One shared parameter cell: an f32 stored as atomic bits.
#[derive(Default)]
#[repr(transparent)]
pub struct Real {
    bits: AtomicU32,
}

impl Real {
    pub fn get(&self) -> real {
        real::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn set(&self, value: real) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn add(&self, x: real) {
        let a = self.get();
        self.set(a + x);
    }
}

fn alloc_cells(len: usize) -> AlignedBox<[Real]> {
    AlignedBox::slice_from_default(128, len).expect("Memory allocation failed")
}

/// Parameter matrices: `syn0` word input vectors, `dsyn0` document input
/// vectors, `syn1` hierarchical-softmax outputs (iff hs), `syn1neg`
/// negative-sampling outputs (iff negative > 0).
pub struct Nn {
    hs: bool,
    negative: i32,
    vocab_size: usize,
    corpus_size: usize,
    dim: usize,
    pub(crate) syn0: AlignedBox<[Real]>,
    pub(crate) dsyn0: AlignedBox<[Real]>,
    pub(crate) syn1: Option<AlignedBox<[Real]>>,
    pub(crate) syn1neg: Option<AlignedBox<[Real]>>,
}

impl Nn {
    pub fn new(vocab_size: usize, corpus_size: usize, dim: usize, hs: bool, negative: i32) -> Self {
        let syn0 = alloc_cells(vocab_size * dim);
        let dsyn0 = alloc_cells(corpus_size * dim);

        // The exact word2vec initialization stream: one LCG seeded to 1,
        // run over syn0 first and then dsyn0.
        let mut rng = Rng::new(1);
        for cell in syn0.iter() {
            cell.set((rng.next_real() - 0.5) / dim as real);
        }
        for cell in dsyn0.iter() {
            cell.set((rng.next_real() - 0.5) / dim as real);
        }

        Nn {
            hs,
            negative,
            vocab_size,
            corpus_size,
            dim,
            syn0,
            dsyn0,
            syn1: hs.then(|| alloc_cells(vocab_size * dim)),
            syn1neg: (negative > 0).then(|| alloc_cells(vocab_size * dim)),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn corpus_size(&self) -> usize {
        self.corpus_size
    }

    pub fn hs(&self) -> bool {
        self.hs
    }

    pub fn negative(&self) -> i32 {
        self.negative
    }

    pub(crate) fn dsyn0_row(&self, doc: usize) -> &[Real] {
        &self.dsyn0[doc * self.dim..][..self.dim]
    }

    fn snapshot(cells: &[Real]) -> Vec<real> {
        cells.iter().map(Real::get).collect()
    }

    /// Derived unit-length copies of `syn0`/`dsyn0` for similarity search.
    /// Stale by definition if the source matrices mutate afterwards.
    pub fn norm(&self) -> Norms {
        let mut words = Self::snapshot(&self.syn0);
        let mut docs = Self::snapshot(&self.dsyn0);
        for row in words.chunks_mut(self.dim) {
            crate::normalize(row);
        }
        for row in docs.chunks_mut(self.dim) {
            crate::normalize(row);
        }
        Norms {
            dim: self.dim,
            words: words.into_boxed_slice(),
            docs: docs.into_boxed_slice(),
        }
    }

    pub fn save(&self, w: &mut impl Write) -> Result<()> {
        binfmt::write_i32(w, self.hs as i32)?;
        binfmt::write_i32(w, self.negative)?;
        binfmt::write_u64(w, self.vocab_size as u64)?;
        binfmt::write_u64(w, self.corpus_size as u64)?;
        binfmt::write_u64(w, self.dim as u64)?;
        binfmt::write_f32s(w, &Self::snapshot(&self.syn0))?;
        binfmt::write_f32s(w, &Self::snapshot(&self.dsyn0))?;
        if let Some(syn1) = &self.syn1 {
            binfmt::write_f32s(w, &Self::snapshot(syn1))?;
        }
        if let Some(syn1neg) = &self.syn1neg {
            binfmt::write_f32s(w, &Self::snapshot(syn1neg))?;
        }
        Ok(())
    }

    pub fn load(r: &mut impl Read) -> Result<Self> {
        let hs = binfmt::read_i32(r)? != 0;
        let negative = binfmt::read_i32(r)?;
        let vocab_size = binfmt::read_u64(r)? as usize;
        let corpus_size = binfmt::read_u64(r)? as usize;
        let dim = binfmt::read_u64(r)? as usize;
        if dim == 0 || vocab_size == 0 {
            bail!("corrupt model: empty embedding block");
        }

        let read_matrix = |r: &mut dyn Read, rows: usize| -> Result<AlignedBox<[Real]>> {
            let mut buf = vec![0.0 as real; rows * dim];
            binfmt::read_f32s(r, &mut buf)?;
            let cells = alloc_cells(buf.len());
            for (cell, v) in cells.iter().zip(buf) {
                cell.set(v);
            }
            Ok(cells)
        };

        let syn0 = read_matrix(&mut *r, vocab_size)?;
        let dsyn0 = read_matrix(&mut *r, corpus_size)?;
        let syn1 = if hs { Some(read_matrix(&mut *r, vocab_size)?) } else { None };
        let syn1neg = if negative > 0 {
            Some(read_matrix(&mut *r, vocab_size)?)
        } else {
            None
        };

        Ok(Nn {
            hs,
            negative,
            vocab_size,
            corpus_size,
            dim,
            syn0,
            dsyn0,
            syn1,
            syn1neg,
        })
    }
}

/// The normalized copies, valid for the parameter values at the time of
/// the `norm()` call.
pub struct Norms {
    dim: usize,
    words: Box<[real]>,
    docs: Box<[real]>,
}

impl Norms {
    pub fn word(&self, idx: usize) -> &[real] {
        &self.words[idx * self.dim..][..self.dim]
    }

    pub fn doc(&self, idx: usize) -> &[real] {
        &self.docs[idx * self.dim..][..self.dim]
    }
}
