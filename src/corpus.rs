//! Corpus access: a byte-level line source, the whitespace tokenizer, and
//! the tagged-document reader used everywhere a pass over the corpus is
//! needed (vocabulary build, partitioning, training, WMD indexing).

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

/// The end-of-sentence marker implicitly appended at each line end.
pub const END_OF_SENTENCE: &str = "</s>";

/// max length of a token in bytes; longer tokens are truncated
const MAX_STRING: usize = 100;

/// A seekable stream of corpus bytes. `fork` produces an independent cursor
/// over the same bytes so each worker thread can read its own partition.
pub trait LineSource: Send {
    fn fork(&self) -> Result<Box<dyn LineSource>>;

    /// Byte offset of the next unread byte.
    fn tell(&self) -> u64;

    fn seek(&mut self, pos: u64) -> Result<()>;

    fn next_byte(&mut self) -> Result<Option<u8>>;

    /// Push one byte back; the next `next_byte` returns it again.
    fn unread_byte(&mut self, byte: u8);
}

/// Reads a single word, assuming space + tab + EOL to be word boundaries.
///
/// A newline yields the end-of-sentence marker as its own token (after any
/// word the line ended with). Returns `Ok(None)` only at end of input.
pub fn read_word(src: &mut dyn LineSource) -> Result<Option<String>> {
    let mut word = Vec::<u8>::new();
    while let Some(b) = src.next_byte()? {
        if b == b'\r' {
            continue;
        }
        if b == b' ' || b == b'\t' || b == b'\n' {
            if !word.is_empty() {
                if b == b'\n' {
                    src.unread_byte(b);
                }
                break;
            }
            if b == b'\n' {
                return Ok(Some(END_OF_SENTENCE.to_string()));
            }
            continue;
        }
        if word.len() < MAX_STRING - 1 {
            word.push(b); // Truncate too long words
        }
    }
    Ok(if word.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(&word).into_owned())
    })
}

/// One corpus line as tokens: the tag first, then the words, with the
/// end-of-sentence marker as the final token (absent only when the input
/// ends without a newline). `Ok(None)` at end of input.
pub fn read_line_tokens(src: &mut dyn LineSource) -> Result<Option<Vec<String>>> {
    let Some(first) = read_word(src)? else {
        return Ok(None);
    };
    let mut tokens = vec![first];
    if tokens[0] == END_OF_SENTENCE {
        return Ok(Some(tokens));
    }
    while let Some(word) = read_word(src)? {
        let done = word == END_OF_SENTENCE;
        tokens.push(word);
        if done {
            break;
        }
    }
    Ok(Some(tokens))
}

/// A corpus line: the leading tag plus the remaining word tokens
/// (end-of-sentence marker included).
#[derive(Debug, Clone, Default)]
pub struct TaggedDocument {
    pub tag: String,
    pub words: Vec<String>,
}

impl TaggedDocument {
    pub fn new(tag: impl Into<String>, words: &[&str]) -> Self {
        TaggedDocument {
            tag: tag.into(),
            words: words.iter().map(|w| w.to_string()).collect(),
        }
    }
}

/// Streams `TaggedDocument`s from a window of a line source: a starting
/// byte offset plus an optional document-count limit.
pub struct TaggedCorpus {
    source: Box<dyn LineSource>,
    start: u64,
    limit: Option<u64>,
    doc_count: u64,
}

impl TaggedCorpus {
    pub fn new(source: Box<dyn LineSource>) -> Result<Self> {
        TaggedCorpus::with_range(source, 0, None)
    }

    pub fn with_range(mut source: Box<dyn LineSource>, start: u64, limit: Option<u64>) -> Result<Self> {
        source.seek(start).context("error seeking to corpus partition start")?;
        Ok(TaggedCorpus {
            source,
            start,
            limit,
            doc_count: 0,
        })
    }

    pub fn rewind(&mut self) -> Result<()> {
        self.source.seek(self.start)?;
        self.doc_count = 0;
        Ok(())
    }

    pub fn tell(&self) -> u64 {
        self.source.tell()
    }

    pub fn next(&mut self) -> Result<Option<TaggedDocument>> {
        if let Some(limit) = self.limit {
            if self.doc_count >= limit {
                return Ok(None);
            }
        }
        let Some(mut tokens) = read_line_tokens(&mut *self.source)? else {
            return Ok(None);
        };
        self.doc_count += 1;
        let tag = tokens.remove(0);
        Ok(Some(TaggedDocument { tag, words: tokens }))
    }
}

/// A contiguous slice of the document stream assigned to one worker.
#[derive(Debug, Clone, Copy)]
pub struct Partition {
    pub offset: u64,
    /// `None` on the final partition: run to end of input.
    pub limit: Option<u64>,
}

/// Single-threaded pre-pass dividing the document stream into near-equal
/// contiguous ranges, one per worker. Boundaries always fall between
/// documents; the final partition is unbounded.
pub fn partition(source: &dyn LineSource, total_docs: u64, threads: usize) -> Result<Vec<Partition>> {
    let threads = threads.max(1);
    let per_thread = (total_docs / threads as u64).max(1);
    let mut corpus = TaggedCorpus::new(source.fork()?)?;
    let mut partitions = Vec::with_capacity(threads);
    let mut offset = 0u64;
    let mut sub_size = 0u64;
    while partitions.len() + 1 < threads {
        if corpus.next()?.is_none() {
            break;
        }
        sub_size += 1;
        if sub_size >= per_thread {
            partitions.push(Partition {
                offset,
                limit: Some(sub_size),
            });
            offset = corpus.tell();
            sub_size = 0;
        }
    }
    partitions.push(Partition { offset, limit: None });
    Ok(partitions)
}

/// File-backed line source.
pub struct FileSource {
    path: PathBuf,
    reader: BufReader<File>,
    pos: u64,
    pushback: Option<u8>,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .with_context(|| format!("error opening training data file {}", path.display()))?;
        Ok(FileSource {
            path,
            reader: BufReader::new(file),
            pos: 0,
            pushback: None,
        })
    }
}

impl LineSource for FileSource {
    fn fork(&self) -> Result<Box<dyn LineSource>> {
        Ok(Box::new(FileSource::open(&self.path)?))
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.reader
            .seek(SeekFrom::Start(pos))
            .context("error seeking within training data file")?;
        self.pos = pos;
        self.pushback = None;
        Ok(())
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        if let Some(b) = self.pushback.take() {
            self.pos += 1;
            return Ok(Some(b));
        }
        let mut buf = [0u8; 1];
        let n = self
            .reader
            .read(&mut buf)
            .context("error reading training data file")?;
        if n == 0 {
            return Ok(None);
        }
        self.pos += 1;
        Ok(Some(buf[0]))
    }

    fn unread_byte(&mut self, byte: u8) {
        debug_assert!(self.pushback.is_none());
        self.pushback = Some(byte);
        self.pos -= 1;
    }
}

/// In-memory line source, for callers that already hold the corpus bytes
/// and for tests.
pub struct MemorySource {
    data: Arc<[u8]>,
    pos: usize,
}

impl MemorySource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        MemorySource {
            data: data.into().into(),
            pos: 0,
        }
    }
}

impl LineSource for MemorySource {
    fn fork(&self) -> Result<Box<dyn LineSource>> {
        Ok(Box::new(MemorySource {
            data: Arc::clone(&self.data),
            pos: 0,
        }))
    }

    fn tell(&self) -> u64 {
        self.pos as u64
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.pos = pos as usize;
        Ok(())
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        if self.pos >= self.data.len() {
            return Ok(None);
        }
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(Some(b))
    }

    fn unread_byte(&mut self, _byte: u8) {
        debug_assert!(self.pos > 0);
        self.pos -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_delimiters_and_end_marker() {
        let mut src = MemorySource::new("doc1 cat\tlikes  fish\r\n");
        let tokens = read_line_tokens(&mut src).unwrap().unwrap();
        assert_eq!(tokens, ["doc1", "cat", "likes", "fish", END_OF_SENTENCE]);
        assert!(read_line_tokens(&mut src).unwrap().is_none());
    }

    #[test]
    fn tokenizer_no_trailing_newline() {
        let mut src = MemorySource::new("doc1 cat");
        let tokens = read_line_tokens(&mut src).unwrap().unwrap();
        assert_eq!(tokens, ["doc1", "cat"]);
    }

    #[test]
    fn long_tokens_are_truncated() {
        let long = "x".repeat(500);
        let mut src = MemorySource::new(format!("tag {long}\n"));
        let tokens = read_line_tokens(&mut src).unwrap().unwrap();
        assert_eq!(tokens[1].len(), MAX_STRING - 1);
    }

    #[test]
    fn corpus_streams_documents_in_order() {
        let source = MemorySource::new("doc1 cat likes fish\ndoc2 dog likes bone\n");
        let mut corpus = TaggedCorpus::new(Box::new(source)).unwrap();
        let d1 = corpus.next().unwrap().unwrap();
        assert_eq!(d1.tag, "doc1");
        assert_eq!(d1.words, ["cat", "likes", "fish", END_OF_SENTENCE]);
        let d2 = corpus.next().unwrap().unwrap();
        assert_eq!(d2.tag, "doc2");
        assert!(corpus.next().unwrap().is_none());

        corpus.rewind().unwrap();
        assert_eq!(corpus.next().unwrap().unwrap().tag, "doc1");
    }

    #[test]
    fn corpus_range_limits_documents() {
        let text = "a x\nb y\nc z\n";
        let source = MemorySource::new(text);
        // Find the offset of the second document.
        let mut probe = TaggedCorpus::new(Box::new(MemorySource::new(text))).unwrap();
        probe.next().unwrap().unwrap();
        let offset = probe.tell();

        let mut corpus = TaggedCorpus::with_range(Box::new(source), offset, Some(1)).unwrap();
        assert_eq!(corpus.next().unwrap().unwrap().tag, "b");
        assert!(corpus.next().unwrap().is_none());
    }

    #[test]
    fn partitions_cover_every_document() {
        let text = "a 1\nbb 2\nccc 3\ndddd 4\neeeee 5\n";
        let source = MemorySource::new(text);
        let partitions = partition(&source, 5, 2).unwrap();
        assert_eq!(partitions.len(), 2);

        let mut seen = Vec::new();
        for part in &partitions {
            let sub = MemorySource::new(text);
            let mut corpus =
                TaggedCorpus::with_range(Box::new(sub), part.offset, part.limit).unwrap();
            while let Some(doc) = corpus.next().unwrap() {
                seen.push(doc.tag);
            }
        }
        assert_eq!(seen, ["a", "bb", "ccc", "dddd", "eeeee"]);
    }
}
