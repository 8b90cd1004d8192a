use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;

use doc2vec::{real, Doc2Vec, FileSource, TrainConfig};

#[derive(Parser)]
#[command(about = "PARAGRAPH VECTOR estimation toolkit", long_about = None)]
struct Options {
    /// Use tagged text data from FILE to train the model; each line is a
    /// document: a tag followed by its words
    #[arg(long = "train", value_name = "FILE")]
    train_file: PathBuf,

    /// Use FILE to save the resulting model
    #[arg(long = "output", value_name = "FILE")]
    output_file: PathBuf,

    /// Set size of word and document vectors
    #[arg(long = "size", default_value_t = 100)]
    dim: usize,

    /// Set max skip length between words
    #[arg(long, default_value_t = 5)]
    window: usize,

    /// Set threshold for occurrence of words. Those that appear with higher
    /// frequency in the training data will be randomly down-sampled; default
    /// is 1e-3, useful range is (0, 1e-5)
    #[arg(long, default_value_t = 1e-3)]
    sample: real,

    /// Use Hierarchical Softmax (on by default; pass `--hs false` to disable)
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    hs: bool,

    /// Number of negative examples; common values are 3 - 10 (0 = not used)
    #[arg(long, default_value_t = 0)]
    negative: i32,

    /// Use N threads
    #[arg(long = "threads", value_name = "N", default_value_t = 4)]
    num_threads: usize,

    /// Run more training iterations
    #[arg(long, default_value_t = 50)]
    iter: usize,

    /// Discard words that appear less than N times
    #[arg(long = "min-count", value_name = "N", default_value_t = 1)]
    min_count: i32,

    /// Set the starting learning rate; default is 0.025 for skip-gram and 0.05 for CBOW
    #[arg(long)]
    alpha: Option<real>,

    /// Set the debug mode (default = 2 = more info during training)
    #[arg(long = "debug", default_value_t = 2)]
    debug_mode: usize,

    /// Use the skip-gram model (otherwise, use continuous bag of words)
    #[arg(long = "skip-gram")]
    skip_gram: bool,
}

fn run(options: &Options) -> Result<()> {
    let config = TrainConfig {
        dim: options.dim,
        cbow: !options.skip_gram,
        hs: options.hs,
        negative: options.negative,
        window: options.window,
        iter: options.iter,
        alpha: options.alpha,
        sample: options.sample,
        min_count: options.min_count,
        threads: options.num_threads,
        debug_mode: options.debug_mode,
    };

    if options.debug_mode > 0 {
        eprintln!("Starting training using file {:?}", options.train_file);
    }
    let source = FileSource::open(&options.train_file)?;
    let model = Doc2Vec::train(&source, &config)?;

    let mut out = BufWriter::new(
        File::create(&options.output_file).context("error creating output file")?,
    );
    model.save(&mut out).context("error writing model file")?;
    Ok(())
}

fn main() {
    let options = Options::parse();
    if let Err(err) = run(&options) {
        eprintln!("{err:#}");
        process::exit(1);
    }
}
