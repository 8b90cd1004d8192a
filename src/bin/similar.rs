//! Interactive queries against a trained model: nearest words and
//! documents, inference for novel sentences, and WMD re-ranking.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;

use doc2vec::{Doc2Vec, KnnItem, TaggedDocument};

/// number of closest words / documents that will be shown
const N: usize = 40;

#[derive(Parser)]
#[command(about = "Query a trained doc2vec model", long_about = None)]
struct Options {
    /// Model file written by the trainer
    #[arg(value_name = "FILE")]
    model_file: PathBuf,
}

fn print_items(items: &[KnnItem]) {
    println!();
    println!("                                              Word       Cosine distance");
    println!("------------------------------------------------------------------------");
    for item in items.iter().take(N) {
        println!("{:50}\t\t{}", item.word, item.similarity);
    }
}

fn sentence(words: &[&str]) -> TaggedDocument {
    let mut words = words.to_vec();
    words.push("</s>");
    TaggedDocument::new("", &words)
}

fn query(model: &Doc2Vec, line: &str) {
    let mut tokens = line.split_whitespace();
    let Some(command) = tokens.next() else {
        return;
    };
    let rest: Vec<&str> = tokens.collect();

    match (command, rest.as_slice()) {
        ("word", [word]) => match model.word_knn_words(word, N) {
            None => println!("Out of dictionary word!"),
            Some(items) => print_items(&items),
        },
        ("wdocs", [word]) => match model.word_knn_docs(word, N) {
            None => println!("Out of dictionary word!"),
            Some(items) => print_items(&items),
        },
        ("doc", [tag]) => match model.doc_knn_docs(tag, N) {
            None => println!("Unknown document tag!"),
            Some(items) => print_items(&items),
        },
        ("sent", words) if !words.is_empty() => {
            let doc = sentence(words);
            println!("Nearest words:");
            print_items(&model.sent_knn_words(&doc, N));
            println!("Nearest documents:");
            print_items(&model.sent_knn_docs(&doc, N));
        }
        ("wmd", words) if !words.is_empty() => {
            let items = model.wmd_knn_docs(&sentence(words), N);
            if items.is_empty() {
                println!("No in-vocabulary words in the query!");
            } else {
                print_items(&items);
            }
        }
        _ => {
            println!("Commands:");
            println!("  word WORD      words nearest to a vocabulary word");
            println!("  wdocs WORD     documents nearest to a vocabulary word");
            println!("  doc TAG        documents nearest to a training document");
            println!("  sent WORD...   words and documents nearest to a novel sentence");
            println!("  wmd WORD...    documents nearest by relaxed Word Mover's Distance");
            println!("  EXIT");
        }
    }
}

fn run(options: &Options) -> Result<()> {
    let mut f = BufReader::new(File::open(&options.model_file).context("error opening model file")?);
    let model = Doc2Vec::load(&mut f).context("error reading model file")?;

    loop {
        print!("Enter query (EXIT to break): ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Err(err) => {
                eprintln!("error reading stdin: {err}");
                break;
            }
            Ok(0) => break,
            Ok(_) => {}
        }
        let line = line.trim();
        if line == "EXIT" {
            break;
        }
        query(&model, line);
    }
    Ok(())
}

fn main() {
    let options = Options::parse();
    if let Err(err) = run(&options) {
        eprintln!("{err:#}");
        process::exit(1);
    }
}
